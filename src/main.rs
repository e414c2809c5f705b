fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    if let Err(err) = sankey_rs_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
