//! Read operations for retrieving rows.
//!
//! This module provides operations for reading rows:
//! - Getting individual rows by primary key
//! - Querying rows of one partition, on the table or a secondary index

/// Get item operation for retrieving a single row by primary key.
pub mod get_item;

/// Query operation for retrieving rows with key conditions.
pub mod query;
