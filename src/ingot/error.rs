use thiserror::Error;

use crate::ingot::types::StorageMode;

#[derive(Debug, Error)]
pub enum Error {
    #[error("metal is not supported on this system")]
    Unsupported,

    #[error("failed to create {0}")]
    Creation(&'static str),

    #[error("library compilation failed: {0}")]
    Compile(String),

    #[error("function {0:?} not found")]
    FunctionNotFound(String),

    #[error("compute pipeline creation failed: {0}")]
    Pipeline(String),

    #[error("command buffer failed: {0}")]
    CommandBuffer(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{what} out of bounds: need {needed} bytes, have {available}")]
    OutOfBounds {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("resource with {0:?} storage is not CPU accessible")]
    NotCpuAccessible(StorageMode),

    #[error("nextDrawable returned nil")]
    NoDrawable,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_message_names_sizes() {
        let err = Error::OutOfBounds { what: "buffer write", needed: 64, available: 16 };
        assert_eq!(err.to_string(), "buffer write out of bounds: need 64 bytes, have 16");
    }

    #[test]
    fn compile_error_keeps_native_text() {
        let native = "program_source:3:5: error: use of undeclared identifier 'x'";
        let err = Error::Compile(native.to_string());
        assert!(err.to_string().ends_with(native));
    }

    #[test]
    fn storage_mode_in_access_error() {
        let err = Error::NotCpuAccessible(StorageMode::Private);
        assert_eq!(err.to_string(), "resource with Private storage is not CPU accessible");
    }
}
