//! Error types and handling for the certificate analysis pipeline.
//!
//! Only document decoding may abort a request. Every analyzer is a total
//! function over its inputs: internal failures are caught at the analyzer
//! boundary and replaced by that analyzer's documented neutral output.

use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Custom result type for certificate analysis operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type for the analysis service
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

/// Fatal document decode failures. Raised before any analyzer runs;
/// everything downstream degrades instead of erroring.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("Unreadable document: {0}")]
    Unreadable(String),

    #[error("Document contains no pages")]
    EmptyDocument,
}
