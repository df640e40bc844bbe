//! # vellum-common
//!
//! Shared foundation for the vellum storage engine: typed identifiers,
//! system-wide constants, and the common error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// System-wide constants.
pub mod constants;

/// Common error types.
pub mod error;

/// Typed identifiers.
pub mod types;
