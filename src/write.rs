//! Write operations for modifying rows.
//!
//! This module provides operations for writing rows:
//! - Putting new rows or replacing existing ones
//! - Setting attributes of existing rows
//! - Deleting rows by primary key
//! - Writing up to 100 rows in one transaction

/// Common utilities and types for write operations.
pub mod common;

/// Delete item operation for removing rows.
pub mod delete_item;

/// Put item operation for creating or replacing rows.
pub mod put_item;

/// Transactional write operation for all-or-nothing multi-row writes.
pub mod transact_write_items;

/// Update item operation for modifying existing rows.
pub mod update_item;
