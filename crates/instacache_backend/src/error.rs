// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error type for backend communication failures.

/// A failure talking to a cache backend.
///
/// The instance cache treats these as opaque faults: it does not retry them and
/// does not inspect the cause. Use [`std::error::Error::source()`] to reach the
/// underlying error if needed.
///
/// # Example
///
/// ```
/// use instacache_backend::Error;
///
/// let error = Error::from_message("connection reset");
/// assert!(error.to_string().contains("connection reset"));
/// ```
#[ohno::error]
pub struct Error {}

impl Error {
    /// Creates a new error from any type that can be converted to an error.
    ///
    /// Backend implementations in other crates use this to report their faults.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// A specialized [`Result`] type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
