//! Error types for quadcode conversion.

use std::fmt;

/// Errors that can occur while converting quadcodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuadError {
    /// A character outside `0..=3` was found.
    InvalidDigit { position: usize, found: char },
    /// The quadcode is deeper than the addressable tree.
    TooDeep { depth: usize, max: usize },
    /// A tile coordinate lies outside the grid for its level.
    OutOfRange { x: u32, y: u32, lod: u32 },
}

impl fmt::Display for QuadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDigit { position, found } => {
                write!(f, "invalid quadcode digit {found:?} at position {position}")
            }
            Self::TooDeep { depth, max } => {
                write!(f, "quadcode depth {depth} exceeds maximum of {max}")
            }
            Self::OutOfRange { x, y, lod } => {
                write!(f, "tile ({x}, {y}) is outside the grid at level {lod}")
            }
        }
    }
}

impl std::error::Error for QuadError {}

/// Result type for quadcode operations.
pub type QuadResult<T> = Result<T, QuadError>;
