use trackzone_core::MappingError;

/// Failure while loading parameters or building an [`crate::Engine`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid perspective calibration: {0}")]
    Mapping(#[from] MappingError),
}
