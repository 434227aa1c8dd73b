use metarev_store::StoreError;

pub type Result<T> = std::result::Result<T, MetaRevError>;

#[derive(Debug, thiserror::Error)]
pub enum MetaRevError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
