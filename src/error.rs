//! Crate-local error type. Parsing errors carry the offending line number so
//! a malformed scene file can be diagnosed without re-reading it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("obj parse error at line {line}: {message}")]
    ObjParse { line: usize, message: String },

    #[error("mtl parse error at line {line}: {message}")]
    MtlParse { line: usize, message: String },

    #[error("image format error ({path}): {message}")]
    ImageFormat { path: String, message: String },

    #[error("lens file error at line {line}: {message}")]
    LensFile { line: usize, message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}
