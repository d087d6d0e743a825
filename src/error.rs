//! Application-wide error types.

use thiserror::Error;

use crate::subsystems::memory::DocStoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("gmail error: {0}")]
    Gmail(String),

    #[error("docstore error: {0}")]
    DocStore(#[from] DocStoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
