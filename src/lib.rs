#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, load_config};
pub use ir::{RawGraph, SankeyInput};
pub use layout::{LayoutError, SankeyLayout, compute_layout};
pub use parser::{ParsedInput, parse_input};
