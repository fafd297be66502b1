//! Session-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    Core(#[from] r30x_core::Error),

    #[error("transport error: {0}")]
    Transport(#[from] r30x_transport::Error),

    #[error("data error: {0}")]
    Types(#[from] r30x_types::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed reply from the sensor: {0}")]
    InvalidResponse(String),

    #[error("image destination is not writable: {0}")]
    NotWritable(String),

    #[error("sensor storage is full")]
    StorageFull,
}
