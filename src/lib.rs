//! Tabula Store is a lightweight, schema-less in-memory record store.
//!
//! Records are plain JSON objects kept in insertion order inside a [`Store`],
//! matched with flexible per-field [`Matcher`]s (literal, regex, predicate),
//! and optionally persisted to disk with password-based AES-256-GCM encryption.
//!
//! ## Core Components
//! - [`engine`]: The record container, match engine and persistence codec.
//! - [`server`]: REST gateway exposing named stores over HTTP.
//! - [`sdk`]: Thin HTTP client mirroring the gateway routes.

pub mod engine;
pub mod sdk;
pub mod server;

use std::path::PathBuf;

use thiserror::Error;

pub use engine::{load, Descriptor, FindOptions, Matcher, Record, ResultSet, Store, ID_FIELD};

/// Errors returned by Tabula Store.
#[derive(Error, Debug)]
pub enum Error {
    /// A delete-one descriptor matched more than one record.
    #[error("descriptor {0} matches more than one record")]
    AmbiguousDelete(String),
    /// A matcher or ordering referenced a field absent from a record.
    #[error("record has no field `{0}`")]
    MissingField(String),
    /// Two records carry values for the same field that cannot be ordered.
    #[error("values of field `{field}` are not comparable")]
    Incomparable { field: String },
    /// Two supplied records carry the same identifier.
    #[error("duplicate record id `{0}`")]
    DuplicateId(String),
    /// Wrong password or corrupted ciphertext.
    #[error("decryption failed: {0}")]
    Decryption(String),
    /// Filesystem failure during persist/load, with path context.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error outside the persistence paths.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A pattern matcher was built from an invalid regular expression.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    /// HTTP transport failure in the SDK client.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    /// The gateway rejected an SDK request.
    #[error("server error ({status}): {message}")]
    Remote { status: u16, message: String },
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for Tabula Store operations.
pub type Result<T> = std::result::Result<T, Error>;
