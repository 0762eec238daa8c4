//! Error types for the globe-stream crate.

use std::fmt;

use crate::surface::ObjectKind;

/// Result type for globe-stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while streaming tiles or building surfaces.
#[derive(Debug)]
pub enum Error {
    /// HTTP request failed.
    Http {
        /// The URL that failed.
        url: String,
        /// The error message.
        message: String,
    },
    /// HTTP response had a non-success status code.
    HttpStatus {
        /// The URL that returned the error.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
    /// Cache operation failed.
    Cache {
        /// The operation that failed.
        operation: &'static str,
        /// The error message.
        message: String,
    },
    /// Reading or writing a local file failed.
    Io {
        /// The file involved.
        path: String,
        /// The error message.
        message: String,
    },
    /// The quadcode could not be decoded.
    Quadcode(globe_quad::QuadError),
    /// A layer was configured with an empty server list.
    EmptyServerPool,
    /// A tile was requested before the layer was configured.
    NotConfigured {
        /// Name of the layer.
        layer: &'static str,
    },
    /// Layer configuration could not be parsed.
    Config {
        /// The error message.
        message: String,
    },
    /// A surface payload was malformed.
    Payload {
        /// Context for where the error occurred.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// Surface creation was attempted without options.
    MissingOptions,
    /// Surface creation was attempted without a parent object.
    MissingParent,
    /// The surface's parent is not the expected kind of object.
    WrongParentKind {
        /// The kind of parent required.
        expected: ObjectKind,
        /// The kind of parent found.
        found: ObjectKind,
    },
    /// Surface creation was attempted on an object that already has a resource.
    AlreadyInitialized,
    /// A surface build finished without reporting an outcome.
    Abandoned,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http { url, message } => {
                write!(f, "http request to {url} failed: {message}")
            }
            Error::HttpStatus { url, status } => {
                write!(f, "http request to {url} returned status {status}")
            }
            Error::Cache { operation, message } => {
                write!(f, "cache {operation} failed: {message}")
            }
            Error::Io { path, message } => write!(f, "i/o on {path} failed: {message}"),
            Error::Quadcode(e) => write!(f, "quadcode error: {e}"),
            Error::EmptyServerPool => write!(f, "server list must not be empty"),
            Error::NotConfigured { layer } => {
                write!(f, "layer {layer} has no servers configured")
            }
            Error::Config { message } => write!(f, "invalid layer configuration: {message}"),
            Error::Payload { context, detail } => {
                write!(f, "invalid {context}: {detail}")
            }
            Error::MissingOptions => write!(f, "no options for surface creation"),
            Error::MissingParent => write!(f, "surface has no parent"),
            Error::WrongParentKind { expected, found } => {
                write!(f, "surface parent must be a {expected}, found {found}")
            }
            Error::AlreadyInitialized => write!(f, "surface is already initialized"),
            Error::Abandoned => write!(f, "surface build ended without an outcome"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Quadcode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<globe_quad::QuadError> for Error {
    fn from(e: globe_quad::QuadError) -> Self {
        Error::Quadcode(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Payload {
            context: "json",
            detail: e.to_string(),
        }
    }
}
