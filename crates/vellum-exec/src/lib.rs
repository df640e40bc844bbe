//! # vellum-exec
//!
//! The query-executor runtime for vellum: tuples and schemas, the catalog
//! and table heap, a family of batched pull operators, and the two
//! plan-rewrite rules.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Catalog: tables and secondary indexes.
pub mod catalog;

/// Expression trees and evaluation.
pub mod expr;

/// Batched pull operators.
pub mod executor;

/// Table heap storage.
pub mod heap;

/// Optimizer rewrite rules.
pub mod optimizer;

/// Physical plan nodes.
pub mod plan;

/// Column schemas.
pub mod schema;

/// Tuples and tuple metadata.
pub mod tuple;

/// Runtime values.
pub mod value;
