pub type TonecraftResult<T> = Result<T, TonecraftError>;

#[derive(thiserror::Error, Debug)]
pub enum TonecraftError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Source image missing or unreadable. The only category the
    /// orchestrator fails fast on without attempting a renderer.
    #[error("input error: {0}")]
    Input(String),

    #[error("engine error: {0}")]
    Engine(String),

    /// External renderer step failure (probe, copy, exec, timeout,
    /// missing output). Always recoverable via engine fallback.
    #[error("adapter error: {0}")]
    Adapter(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TonecraftError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::Adapter(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            TonecraftError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(TonecraftError::input("x").to_string().contains("input error:"));
        assert!(
            TonecraftError::adapter("x")
                .to_string()
                .contains("adapter error:")
        );
        assert!(TonecraftError::cache("x").to_string().contains("cache error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = TonecraftError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
