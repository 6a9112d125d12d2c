// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for instance cache operations.

use std::fmt::{self, Display};

/// The category of an instance cache failure.
///
/// `NotFound` is the only kind callers are expected to recover from routinely;
/// type resolution and attribute failures point at programming errors, while
/// `Backend` and `Store` wrap faults raised by the external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No registered type matches the requested name.
    UnknownType,
    /// A bare type name matches more than one registered type.
    AmbiguousType,
    /// The type resolves but has no loader, serializer and invalidator registered.
    Unregistered,
    /// No entity exists for the requested lookup.
    NotFound,
    /// A single-object lookup matched more than one entity.
    MultipleFound,
    /// The cached entity has no attribute with the requested name.
    AttributeNotFound,
    /// Positional access past the end of a collection.
    IndexOutOfRange,
    /// Serializing an entity or rebuilding one from cached data failed.
    Serialization,
    /// The cache backend reported a fault.
    Backend,
    /// The backing store or a loader reported a fault.
    Store,
    /// The cache settings are invalid.
    Config,
}

impl ErrorKind {
    /// Returns a stable, lowercase label for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownType => "unknown type",
            Self::AmbiguousType => "ambiguous type",
            Self::Unregistered => "unregistered type",
            Self::NotFound => "not found",
            Self::MultipleFound => "multiple found",
            Self::AttributeNotFound => "attribute not found",
            Self::IndexOutOfRange => "index out of range",
            Self::Serialization => "serialization",
            Self::Backend => "cache backend",
            Self::Store => "backing store",
            Self::Config => "configuration",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by the instance cache, its facades or its strategies.
///
/// # Example
///
/// ```
/// use instacache::{Error, ErrorKind};
///
/// let error = Error::not_found("no widget with pk 7");
/// assert_eq!(error.kind(), ErrorKind::NotFound);
/// assert!(error.is_not_found());
/// ```
#[ohno::error]
#[display("{kind}: {detail}")]
pub struct Error {
    kind: ErrorKind,
    detail: String,
}

impl Error {
    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error signals a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Creates a `NotFound` error.
    ///
    /// Backing-store queries use this when a single-object lookup matches nothing.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    /// Creates a `MultipleFound` error.
    ///
    /// Backing-store queries use this when a single-object lookup matches several rows.
    pub fn multiple_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MultipleFound, detail)
    }

    /// Creates a `Store` error wrapping a fault raised by the backing store or a loader.
    pub fn store(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Store, "backing store failure", cause)
    }

    pub(crate) fn unknown_type(type_name: &str) -> Self {
        Self::new(ErrorKind::UnknownType, format!("no registered type matches '{type_name}'"))
    }

    pub(crate) fn ambiguous_type(type_name: &str, candidates: &[String]) -> Self {
        Self::new(
            ErrorKind::AmbiguousType,
            format!("'{type_name}' matches {}; qualify it with a namespace", candidates.join(", ")),
        )
    }

    pub(crate) fn unregistered(label: &str) -> Self {
        Self::new(ErrorKind::Unregistered, format!("no strategies registered for {label}"))
    }

    pub(crate) fn attribute_not_found(label: &str, name: &str) -> Self {
        Self::new(ErrorKind::AttributeNotFound, format!("{label} has no attribute '{name}'"))
    }

    pub(crate) fn index_out_of_range(index: usize) -> Self {
        Self::new(ErrorKind::IndexOutOfRange, format!("no entity at index {index}"))
    }

    pub(crate) fn serialization(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, detail)
    }

    pub(crate) fn serialization_caused_by(detail: impl Into<String>, cause: serde_json::Error) -> Self {
        Self::caused_by(ErrorKind::Serialization, detail, cause)
    }

    pub(crate) fn config(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, detail)
    }
}

impl From<instacache_backend::Error> for Error {
    fn from(error: instacache_backend::Error) -> Self {
        Self::caused_by(ErrorKind::Backend, "cache backend failure", error)
    }
}
