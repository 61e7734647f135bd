use thiserror::Error;

use tg_tensor::DType;

#[derive(Error, Debug)]
pub enum GemmError {
    #[error("[{backend}] on CPU does not support {dtype} outputs")]
    UnsupportedDType { backend: String, dtype: DType },
    #[error("invalid array descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("{op} expects {expected} inputs, got {got}")]
    InvalidArity {
        op: String,
        expected: String,
        got: usize,
    },
    #[error("tensor error: {0}")]
    Tensor(#[from] tg_tensor::TensorError),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GemmError>;
