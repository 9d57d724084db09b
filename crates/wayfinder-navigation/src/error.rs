//! This module defines the error types used by the `wayfinder-navigation` crate.

#![warn(missing_docs)]

/// Error type for navigation operations.
///
/// Invalid configuration is reported through this type. Broken internal
/// invariants (a projection with a zero homogeneous component, an index
/// computed outside a buffer) panic instead.
#[derive(Debug, PartialEq)]
pub enum NavigationError {
    /// Error for an invalid grid scale.
    /// This variant is returned when the grid-units-per-meter scale is not a positive finite number.
    InvalidScale(&'static str),
    /// Error for invalid grid dimensions.
    /// This variant is returned when grid width or height is zero or too large.
    InvalidDimensions(&'static str),
    /// Error for an invalid elevation range.
    /// This variant is returned when the elevation maximum does not exceed the minimum.
    InvalidElevation(&'static str),
    /// Error for a cost buffer whose length does not match the grid dimensions.
    BufferMismatch(&'static str),
    /// Error for world bounds that are empty or not finite.
    InvalidBounds(&'static str),
}

impl core::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NavigationError::InvalidScale(msg) => write!(f, "Invalid grid scale: {}", msg),
            NavigationError::InvalidDimensions(msg) => write!(f, "Invalid grid dimensions: {}", msg),
            NavigationError::InvalidElevation(msg) => write!(f, "Invalid elevation range: {}", msg),
            NavigationError::BufferMismatch(msg) => write!(f, "Cost buffer mismatch: {}", msg),
            NavigationError::InvalidBounds(msg) => write!(f, "Invalid world bounds: {}", msg),
        }
    }
}

impl core::error::Error for NavigationError {}
