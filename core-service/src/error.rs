use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Rich-media error: {0}")]
    Media(#[from] core_richmedia::MediaError),

    #[error("Message store error: {0}")]
    Store(#[from] core_messages::MessageStoreError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
