use thiserror::Error;

use crate::api::GpuError;

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("GPU resource allocation failed: {0}")]
    Gpu(#[from] GpuError),
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),
    #[error("could not serialize configuration: {0}")]
    ConfigWrite(#[from] ron::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = LatticeError> = std::result::Result<T, E>;
