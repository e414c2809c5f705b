/// Failures raised by the layout pipeline. Each stage reports the first
/// problem it finds; nothing is retried or patched up internally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("config error: {message}")]
    Config { message: String },

    #[error("cannot infer segments: {message}")]
    Inference { message: String, nodes: Vec<String> },

    #[error("invalid graph: {message}")]
    Validation { message: String },

    #[error("generated dummy node id `{id}` collides with an existing node")]
    SplitCollision { id: String },
}

impl LayoutError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn inference(message: impl Into<String>, nodes: Vec<String>) -> Self {
        Self::Inference {
            message: message.into(),
            nodes,
        }
    }
}

pub type Result<T> = std::result::Result<T, LayoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = LayoutError::config("unknown segment `Z`");
        assert_eq!(err.to_string(), "config error: unknown segment `Z`");

        let err = LayoutError::inference("ambiguous nodes: B", vec!["B".to_string()]);
        assert!(err.to_string().contains("ambiguous nodes: B"));
        match err {
            LayoutError::Inference { nodes, .. } => assert_eq!(nodes, vec!["B".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
