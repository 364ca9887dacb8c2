//! The storage engine capability.
//!
//! Operations in [`mod@crate::read`] and [`mod@crate::write`] compose typed
//! requests and hand them to a [`Store`], issuing exactly one call each.
//! Requests carry condition trees rather than rendered expression strings so
//! that any implementation can interpret them: [`aws_sdk_dynamodb::Client`]
//! renders them into the native expression language, the in-memory store
//! evaluates them directly.

/// Store implementation over the AWS SDK client.
pub mod dynamodb;

use crate::common;

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use std::{error, fmt, future::Future};

/// Typed failure of a single storage engine call.
#[derive(Debug)]
pub enum StoreError {
    /// The condition of a single-item write was not satisfied.
    ConditionalCheckFailed,
    /// A transactional write was canceled as a whole.
    TransactionCanceled {
        /// Message reported by the store.
        message: Option<String>,
        /// One reason per transaction item, in request order.
        reasons: Vec<types::CancellationReason>,
    },
    /// Any other failure of the call.
    Service(crate::error::BoxError),
}

impl StoreError {
    /// Wrap any failure as a service error.
    pub fn service(err: impl error::Error + Send + Sync + 'static) -> Self {
        Self::Service(Box::new(err))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConditionalCheckFailed => f.write_str("conditional check failed"),
            Self::TransactionCanceled { message, .. } => match message {
                Some(message) => write!(f, "transaction canceled: {message}"),
                None => f.write_str("transaction canceled"),
            },
            Self::Service(err) => write!(f, "service error: {err}"),
        }
    }
}

impl error::Error for StoreError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Service(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Point lookup by primary key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetItemRequest {
    /// The table to read from.
    pub table_name: String,
    /// The primary key of the item.
    pub key: common::Item,
}

/// Full replacement of an item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PutItemRequest {
    /// The table to write to.
    pub table_name: String,
    /// The whole item, key columns included.
    pub item: common::Item,
    /// Condition the stored item must satisfy.
    pub condition: Option<common::condition::ConditionExpression>,
    /// Which version of the item to hand back.
    pub return_values: Option<types::ReturnValue>,
}

/// Partial update of an item: each entry replaces one top-level attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateItemRequest {
    /// The table to write to.
    pub table_name: String,
    /// The primary key of the item.
    pub key: common::Item,
    /// Attributes to set, in clause order.
    pub updates: IndexMap<String, types::AttributeValue>,
    /// Condition the stored item must satisfy.
    pub condition: Option<common::condition::ConditionExpression>,
    /// Which version of the item to hand back.
    pub return_values: Option<types::ReturnValue>,
}

/// Removal of an item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteItemRequest {
    /// The table to write to.
    pub table_name: String,
    /// The primary key of the item.
    pub key: common::Item,
    /// Condition the stored item must satisfy.
    pub condition: Option<common::condition::ConditionExpression>,
    /// Which version of the item to hand back.
    pub return_values: Option<types::ReturnValue>,
}

/// One page of a ranged read.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    /// The table to read from.
    pub table_name: String,
    /// Secondary index to read through, `None` for the primary key.
    pub index_name: Option<String>,
    /// Key condition already bound to concrete column names.
    pub key_condition: Vec<common::condition::AttributeCondition<types::AttributeValue>>,
    /// Filter applied to the items matched by the key condition.
    pub filter: Option<common::condition::ConditionMap<types::AttributeValue>>,
    /// Key to resume after.
    pub exclusive_start_key: Option<common::Item>,
    /// Upper bound on items evaluated.
    pub limit: Option<i32>,
    /// Ascending sort key order when `true`.
    pub scan_index_forward: bool,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            index_name: None,
            key_condition: Vec::new(),
            filter: None,
            exclusive_start_key: None,
            limit: None,
            scan_index_forward: true,
        }
    }
}

/// Items of one page, and the key to resume from when more remain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResponse {
    /// Matching items, in scan order.
    pub items: Vec<common::Item>,
    /// Present only when the store has more items beyond this page.
    pub last_evaluated_key: Option<common::Item>,
}

/// A put inside a transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactPut {
    /// The table to write to.
    pub table_name: String,
    /// The whole item, key columns included.
    pub item: common::Item,
    /// Condition the stored item must satisfy.
    pub condition: Option<common::condition::ConditionExpression>,
}

/// A delete inside a transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactDelete {
    /// The table to write to.
    pub table_name: String,
    /// The primary key of the item.
    pub key: common::Item,
    /// Condition the stored item must satisfy.
    pub condition: Option<common::condition::ConditionExpression>,
}

/// An update inside a transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactUpdate {
    /// The table to write to.
    pub table_name: String,
    /// The primary key of the item.
    pub key: common::Item,
    /// Attributes to set, in clause order.
    pub updates: IndexMap<String, types::AttributeValue>,
    /// Condition the stored item must satisfy.
    pub condition: Option<common::condition::ConditionExpression>,
}

/// One item of a transactional write.
#[derive(Clone, Debug, PartialEq)]
pub enum TransactWriteItem {
    /// Put a whole item.
    Put(TransactPut),
    /// Delete an item.
    Delete(TransactDelete),
    /// Update some attributes of an item.
    Update(TransactUpdate),
}

/// An all-or-nothing write of several items.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactWriteItemsRequest {
    /// Idempotency token, empty for none.
    pub client_request_token: String,
    /// Items written together, in request order.
    pub items: Vec<TransactWriteItem>,
}

/// A storage engine exposing the calls the table operations issue.
///
/// Every method issues exactly one call. Returned attributes are `None` when
/// the request asked for none or the store returned an empty map.
pub trait Store: Send + Sync {
    /// Read one item by primary key, `None` when absent.
    fn get_item(
        &self,
        request: GetItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send;

    /// Replace one item.
    fn put_item(
        &self,
        request: PutItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send;

    /// Set some attributes of one item, creating it when absent.
    fn update_item(
        &self,
        request: UpdateItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send;

    /// Remove one item; removing an absent item is not an error.
    fn delete_item(
        &self,
        request: DeleteItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send;

    /// Read one page of a partition.
    fn query(
        &self,
        request: QueryRequest,
    ) -> impl Future<Output = Result<QueryResponse, StoreError>> + Send;

    /// Apply every item or none.
    fn transact_write_items(
        &self,
        request: TransactWriteItemsRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: Store> Store for &S {
    fn get_item(
        &self,
        request: GetItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send {
        (**self).get_item(request)
    }

    fn put_item(
        &self,
        request: PutItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send {
        (**self).put_item(request)
    }

    fn update_item(
        &self,
        request: UpdateItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send {
        (**self).update_item(request)
    }

    fn delete_item(
        &self,
        request: DeleteItemRequest,
    ) -> impl Future<Output = Result<Option<common::Item>, StoreError>> + Send {
        (**self).delete_item(request)
    }

    fn query(
        &self,
        request: QueryRequest,
    ) -> impl Future<Output = Result<QueryResponse, StoreError>> + Send {
        (**self).query(request)
    }

    fn transact_write_items(
        &self,
        request: TransactWriteItemsRequest,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).transact_write_items(request)
    }
}
