#![deny(missing_docs)]

//! # DynamoDB Single Table
//!
//! A single-table-design access layer for Amazon DynamoDB.
//!
//! ## Overview
//!
//! Every row lives in one table keyed by a string partition key `PK` and a
//! string sort key `SK`, with up to five secondary indexes `GSI1`..`GSI5`.
//! This library:
//! - Composes conditions, field updates, filters, index selection, page size
//!   and return values into one [`common::options::Options`] value
//! - Renders them into expressions with generated placeholders, so no
//!   expression strings are written by hand
//! - Pages queries with an opaque cursor string
//! - Writes up to 100 rows atomically with an idempotency token
//! - Classifies every failure into an [`ErrorKind`]
//!
//! ## Quick Example
//!
//! ```no_run
//! use aws_sdk_dynamodb::Client;
//! use dynamodb_single_table::{Table, common};
//! use serde_json::{Value, json};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::from_conf(aws_sdk_dynamodb::config::Config::builder().build());
//! let table = Table::new(client, "app");
//! let options = common::options::Options::builder()
//!     .item_exists()
//!     .field_updates(json!({"name": "Jane", "age": 31}))
//!     .return_values(common::options::ReturnValue::AllNew)
//!     .build()?;
//! // Sends "SET #age = :set0, #name = :set1" guarded by "attribute_exists(#PK)"
//! let updated = table.update("USER#1", "PROFILE", options).await?;
//! let user: Option<Value> = updated.into_row()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@common`] - Keys, conditions, options and the cursor codec
//! - [`mod@read`] - Read operations (GetItem, Query)
//! - [`mod@write`] - Write operations (PutItem, UpdateItem, DeleteItem, TransactWriteItems)
//! - [`mod@store`] - The storage engine capability and its AWS SDK implementation

/// Common utilities for keys, conditions, options and pagination.
pub mod common;

/// Error kinds and classification.
pub mod error;

/// In-memory storage engine.
#[cfg(any(test, feature = "memory"))]
pub mod memory;

/// Read operations for retrieving rows.
///
/// This module provides operations for:
/// - Getting individual rows by primary key
/// - Querying rows by key condition, one page at a time
pub mod read;

/// The storage engine capability.
pub mod store;

/// Table handle exposing every operation.
pub mod table;

/// Write operations for modifying rows.
///
/// This module provides operations for:
/// - Putting new rows or replacing existing ones
/// - Setting attributes of existing rows
/// - Deleting rows by primary key
/// - Writing several rows atomically
pub mod write;

pub use error::{Error, ErrorKind, Result};
pub use store::Store;
pub use table::Table;
