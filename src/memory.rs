//! In-memory [`Store`](crate::store::Store) for tests.
//!
//! Items live per table in a map ordered by primary key. Condition trees are
//! evaluated directly against stored items, queries honour every registered
//! index, and transactions apply all items or none. Enabled by the `memory`
//! feature.

use crate::{common, store};

use aws_sdk_dynamodb::types;
use std::{
    cmp, collections,
    sync::{Mutex, PoisonError},
};

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";
const CONDITIONAL_CHECK_FAILED_MESSAGE: &str = "The conditional request failed";
const NO_CANCELLATION: &str = "None";

/// Failures the in-memory store reports as service errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A key map lacks a string key column.
    #[error("missing string key attribute {0}")]
    MissingKey(&'static str),
    /// The query names an index that was never registered.
    #[error("unknown index {0}")]
    UnknownIndex(String),
    /// A transaction writes the same item twice.
    #[error("transaction request cannot include multiple operations on one item")]
    DuplicateItem,
    /// An update names a primary key column.
    #[error("cannot update key attribute {0}")]
    KeyAttributeUpdate(&'static str),
    /// The write does not support the requested return-value mode.
    #[error("return values {0} are not supported by {1}")]
    UnsupportedReturnValue(String, &'static str),
    /// A token was reused for a different transaction.
    #[error("idempotent parameter mismatch for client request token {0}")]
    IdempotentParameterMismatch(String),
}

type Rows = collections::BTreeMap<(String, String), common::Item>;

#[derive(Debug, Default)]
struct State {
    calls: usize,
    tables: collections::HashMap<String, Rows>,
    transactions: collections::HashMap<String, store::TransactWriteItemsRequest>,
}

/// A fake storage engine holding every table in memory.
#[derive(Debug)]
pub struct MemoryStore {
    indexes: Vec<common::key::Index>,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store with the ordinal indexes `GSI1`..`GSI5` registered.
    pub fn new() -> Self {
        Self {
            indexes: common::key::Index::ordinals().collect(),
            state: Mutex::default(),
        }
    }

    /// Register one more queryable index.
    #[must_use]
    pub fn with_index(mut self, index: common::key::Index) -> Self {
        self.indexes.retain(|registered| registered.name != index.name);
        self.indexes.push(index);
        self
    }

    /// Number of calls the store has served, failed ones included.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Every item of a table, in primary key order.
    pub fn items(&self, table_name: &str) -> Vec<common::Item> {
        self.lock()
            .tables
            .get(table_name)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state, counting the call.
    fn call(&self) -> std::sync::MutexGuard<'_, State> {
        let mut state = self.lock();
        state.calls += 1;
        state
    }

    fn columns(&self, index_name: Option<&str>) -> Result<common::key::KeyColumns, MemoryError> {
        match index_name {
            None => Ok(common::key::KeyColumns::default()),
            Some(name) => self
                .indexes
                .iter()
                .find(|index| index.name == name)
                .map(|index| index.columns.clone())
                .ok_or_else(|| MemoryError::UnknownIndex(name.to_string())),
        }
    }
}

fn key_string(item: &common::Item, column: &'static str) -> Result<String, MemoryError> {
    item.get(column)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .ok_or(MemoryError::MissingKey(column))
}

fn primary_key(item: &common::Item) -> Result<(String, String), MemoryError> {
    Ok((
        key_string(item, common::key::PARTITION_KEY)?,
        key_string(item, common::key::SORT_KEY)?,
    ))
}

fn compare(left: &types::AttributeValue, right: &types::AttributeValue) -> Option<cmp::Ordering> {
    use types::AttributeValue::{B, N, S};
    match (left, right) {
        (S(left), S(right)) => Some(left.cmp(right)),
        (N(left), N(right)) => {
            let left: f64 = left.parse().ok()?;
            let right: f64 = right.parse().ok()?;
            left.partial_cmp(&right)
        }
        (B(left), B(right)) => Some(left.as_ref().cmp(right.as_ref())),
        _ => None,
    }
}

fn equals(left: &types::AttributeValue, right: &types::AttributeValue) -> bool {
    compare(left, right).map_or(left == right, cmp::Ordering::is_eq)
}

fn contains(attribute: &types::AttributeValue, operand: &types::AttributeValue) -> bool {
    use types::AttributeValue::{B, Bs, L, Ns, S, Ss};
    match (attribute, operand) {
        (S(attribute), S(operand)) => attribute.contains(operand.as_str()),
        (Ss(set), S(operand)) => set.contains(operand),
        (Ns(set), operand) => set
            .iter()
            .any(|member| equals(&types::AttributeValue::N(member.clone()), operand)),
        (Bs(set), B(operand)) => set.contains(operand),
        (L(list), operand) => list.iter().any(|element| equals(element, operand)),
        _ => false,
    }
}

fn matches_ordering(
    value: Option<&types::AttributeValue>,
    operand: &types::AttributeValue,
    accept: impl Fn(cmp::Ordering) -> bool,
) -> bool {
    value
        .and_then(|value| compare(value, operand))
        .is_some_and(accept)
}

fn evaluate_condition(
    condition: &common::condition::Condition<types::AttributeValue>,
    value: Option<&types::AttributeValue>,
) -> bool {
    use common::condition::Condition;
    match condition {
        Condition::BeginsWith(prefix) => value
            .and_then(|value| value.as_s().ok())
            .is_some_and(|value| value.starts_with(prefix.as_str())),
        Condition::Between(low, high) => {
            matches_ordering(value, low, cmp::Ordering::is_ge)
                && matches_ordering(value, high, cmp::Ordering::is_le)
        }
        Condition::Contains(operand) => value.is_some_and(|value| contains(value, operand)),
        Condition::Equals(operand) => value.is_some_and(|value| equals(value, operand)),
        Condition::GreaterThan(operand) => matches_ordering(value, operand, cmp::Ordering::is_gt),
        Condition::GreaterThanOrEqual(operand) => {
            matches_ordering(value, operand, cmp::Ordering::is_ge)
        }
        Condition::In(operands) => {
            value.is_some_and(|value| operands.iter().any(|operand| equals(value, operand)))
        }
        Condition::LessThan(operand) => matches_ordering(value, operand, cmp::Ordering::is_lt),
        Condition::LessThanOrEqual(operand) => {
            matches_ordering(value, operand, cmp::Ordering::is_le)
        }
        Condition::NotContains(operand) => !value.is_some_and(|value| contains(value, operand)),
        Condition::NotEqual(operand) => !value.is_some_and(|value| equals(value, operand)),
        Condition::NotNull => value.is_some(),
        Condition::Null => value.is_none(),
    }
}

fn resolve<'a>(item: &'a common::Item, path: &[&str]) -> Option<&'a types::AttributeValue> {
    let (first, rest) = path.split_first()?;
    let mut value = item.get(*first)?;
    for name in rest {
        value = value.as_m().ok()?.get(*name)?;
    }
    Some(value)
}

fn combine(
    operator: &common::condition::LogicalOperator,
    mut results: impl Iterator<Item = bool>,
) -> bool {
    match operator {
        common::condition::LogicalOperator::And => results.all(|result| result),
        common::condition::LogicalOperator::Or => results.any(|result| result),
    }
}

fn evaluate_map(
    condition_map: &common::condition::ConditionMap<types::AttributeValue>,
    item: &common::Item,
    path: &[&str],
) -> bool {
    match condition_map {
        common::condition::ConditionMap::Leaves(operator, leaves) => combine(
            operator,
            leaves.iter().map(|leaf| {
                let mut leaf_path = path.to_vec();
                leaf_path.push(&leaf.name);
                evaluate_condition(&leaf.condition, resolve(item, &leaf_path))
            }),
        ),
        common::condition::ConditionMap::Node(operator, map) => combine(
            operator,
            map.iter().map(|(name, child)| {
                let mut child_path = path.to_vec();
                child_path.push(name);
                evaluate_map(child, item, &child_path)
            }),
        ),
    }
}

fn satisfies(
    condition: Option<&common::condition::ConditionExpression>,
    item: Option<&common::Item>,
) -> bool {
    let empty = common::Item::new();
    let item = item.unwrap_or(&empty);
    condition.is_none_or(|condition| {
        condition
            .conditions()
            .iter()
            .all(|condition_map| evaluate_map(condition_map, item, &[]))
    })
}

fn check_updates(
    updates: &indexmap::IndexMap<String, types::AttributeValue>,
) -> Result<(), MemoryError> {
    [common::key::PARTITION_KEY, common::key::SORT_KEY]
        .into_iter()
        .find(|column| updates.contains_key(*column))
        .map_or(Ok(()), |column| Err(MemoryError::KeyAttributeUpdate(column)))
}

/// Put and delete only hand back the old item.
fn check_return_values(
    return_values: Option<&types::ReturnValue>,
    operation: &'static str,
) -> Result<(), MemoryError> {
    match return_values {
        None | Some(types::ReturnValue::None | types::ReturnValue::AllOld) => Ok(()),
        Some(other) => Err(MemoryError::UnsupportedReturnValue(
            other.as_str().to_string(),
            operation,
        )),
    }
}

fn apply_updates(
    existing: Option<&common::Item>,
    key: &common::Item,
    updates: &indexmap::IndexMap<String, types::AttributeValue>,
) -> common::Item {
    let mut item = existing.cloned().unwrap_or_else(|| key.clone());
    for (name, value) in updates {
        item.insert(name.clone(), value.clone());
    }
    item
}

fn updated_attributes(
    item: Option<&common::Item>,
    updates: &indexmap::IndexMap<String, types::AttributeValue>,
) -> common::Item {
    item.map(|item| {
        item.iter()
            .filter(|(name, _)| updates.contains_key(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    })
    .unwrap_or_default()
}

fn non_empty(item: Option<common::Item>) -> Option<common::Item> {
    item.filter(|item| !item.is_empty())
}

/// Orders rows by index sort key, ties broken by primary key.
fn compare_rows(
    columns: &common::key::KeyColumns,
    left: &common::Item,
    right: &common::Item,
) -> cmp::Ordering {
    let by_sort_key = match (left.get(&columns.sort_key), right.get(&columns.sort_key)) {
        (Some(left), Some(right)) => compare(left, right).unwrap_or(cmp::Ordering::Equal),
        _ => cmp::Ordering::Equal,
    };
    let key_column = |item: &common::Item, column: &str| {
        item.get(column)
            .and_then(|value| value.as_s().ok())
            .cloned()
            .unwrap_or_default()
    };
    by_sort_key
        .then_with(|| {
            key_column(left, common::key::PARTITION_KEY)
                .cmp(&key_column(right, common::key::PARTITION_KEY))
        })
        .then_with(|| {
            key_column(left, common::key::SORT_KEY).cmp(&key_column(right, common::key::SORT_KEY))
        })
}

fn last_evaluated_key(columns: &common::key::KeyColumns, item: &common::Item) -> common::Item {
    [
        common::key::PARTITION_KEY,
        common::key::SORT_KEY,
        columns.partition_key.as_str(),
        columns.sort_key.as_str(),
    ]
    .into_iter()
    .filter_map(|column| {
        item.get(column)
            .map(|value| (column.to_string(), value.clone()))
    })
    .collect()
}

fn cancellation_reason(failed: bool, item: Option<&common::Item>) -> types::CancellationReason {
    if failed {
        types::CancellationReason::builder()
            .code(CONDITIONAL_CHECK_FAILED)
            .message(CONDITIONAL_CHECK_FAILED_MESSAGE)
            .set_item(item.cloned())
            .build()
    } else {
        types::CancellationReason::builder()
            .code(NO_CANCELLATION)
            .build()
    }
}

fn transact_parts(
    item: &store::TransactWriteItem,
) -> (
    &String,
    &common::Item,
    &Option<common::condition::ConditionExpression>,
) {
    match item {
        store::TransactWriteItem::Put(put) => (&put.table_name, &put.item, &put.condition),
        store::TransactWriteItem::Delete(delete) => {
            (&delete.table_name, &delete.key, &delete.condition)
        }
        store::TransactWriteItem::Update(update) => {
            (&update.table_name, &update.key, &update.condition)
        }
    }
}

impl store::Store for MemoryStore {
    async fn get_item(
        &self,
        request: store::GetItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let state = self.call();
        let key = primary_key(&request.key).map_err(store::StoreError::service)?;
        Ok(state
            .tables
            .get(&request.table_name)
            .and_then(|rows| rows.get(&key))
            .cloned())
    }

    async fn put_item(
        &self,
        request: store::PutItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let mut state = self.call();
        check_return_values(request.return_values.as_ref(), "PutItem")
            .map_err(store::StoreError::service)?;
        let key = primary_key(&request.item).map_err(store::StoreError::service)?;
        let rows = state.tables.entry(request.table_name).or_default();
        if !satisfies(request.condition.as_ref(), rows.get(&key)) {
            return Err(store::StoreError::ConditionalCheckFailed);
        }
        let old = rows.insert(key, request.item);
        match request.return_values {
            Some(types::ReturnValue::AllOld) => Ok(non_empty(old)),
            _ => Ok(None),
        }
    }

    async fn update_item(
        &self,
        request: store::UpdateItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let mut state = self.call();
        let key = primary_key(&request.key).map_err(store::StoreError::service)?;
        check_updates(&request.updates).map_err(store::StoreError::service)?;
        let rows = state.tables.entry(request.table_name).or_default();
        let old = rows.get(&key);
        if !satisfies(request.condition.as_ref(), old) {
            return Err(store::StoreError::ConditionalCheckFailed);
        }
        let new = apply_updates(old, &request.key, &request.updates);
        let returned = match request.return_values {
            Some(types::ReturnValue::AllOld) => old.cloned(),
            Some(types::ReturnValue::AllNew) => Some(new.clone()),
            Some(types::ReturnValue::UpdatedOld) => Some(updated_attributes(old, &request.updates)),
            Some(types::ReturnValue::UpdatedNew) => {
                Some(updated_attributes(Some(&new), &request.updates))
            }
            _ => None,
        };
        rows.insert(key, new);
        Ok(non_empty(returned))
    }

    async fn delete_item(
        &self,
        request: store::DeleteItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let mut state = self.call();
        check_return_values(request.return_values.as_ref(), "DeleteItem")
            .map_err(store::StoreError::service)?;
        let key = primary_key(&request.key).map_err(store::StoreError::service)?;
        let rows = state.tables.entry(request.table_name).or_default();
        if !satisfies(request.condition.as_ref(), rows.get(&key)) {
            return Err(store::StoreError::ConditionalCheckFailed);
        }
        let old = rows.remove(&key);
        match request.return_values {
            Some(types::ReturnValue::AllOld) => Ok(non_empty(old)),
            _ => Ok(None),
        }
    }

    async fn query(
        &self,
        request: store::QueryRequest,
    ) -> Result<store::QueryResponse, store::StoreError> {
        let state = self.call();
        let columns = self
            .columns(request.index_name.as_deref())
            .map_err(store::StoreError::service)?;
        let mut matched: Vec<&common::Item> = state
            .tables
            .get(&request.table_name)
            .into_iter()
            .flat_map(|rows| rows.values())
            .filter(|item| {
                item.contains_key(&columns.partition_key) && item.contains_key(&columns.sort_key)
            })
            .filter(|item| {
                request.key_condition.iter().all(|key_condition| {
                    evaluate_condition(&key_condition.condition, item.get(&key_condition.name))
                })
            })
            .collect();
        matched.sort_by(|left, right| compare_rows(&columns, left, right));
        if !request.scan_index_forward {
            matched.reverse();
        }
        if let Some(start_key) = &request.exclusive_start_key {
            matched.retain(|item| {
                let ordering = compare_rows(&columns, item, start_key);
                if request.scan_index_forward {
                    ordering.is_gt()
                } else {
                    ordering.is_lt()
                }
            });
        }
        let limit = request
            .limit
            .and_then(|limit| usize::try_from(limit).ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(matched.len());
        let has_more = matched.len() > limit;
        matched.truncate(limit);
        let last_evaluated_key = matched
            .last()
            .filter(|_| has_more)
            .map(|item| last_evaluated_key(&columns, item));
        let items = matched
            .into_iter()
            .filter(|item| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|filter| evaluate_map(filter, item, &[]))
            })
            .cloned()
            .collect();
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %request.table_name, has_more, "served query page");
        Ok(store::QueryResponse {
            items,
            last_evaluated_key,
        })
    }

    async fn transact_write_items(
        &self,
        request: store::TransactWriteItemsRequest,
    ) -> Result<(), store::StoreError> {
        let mut state = self.call();
        if let Some(previous) = state.transactions.get(&request.client_request_token) {
            if *previous == request {
                return Ok(());
            }
            return Err(store::StoreError::service(
                MemoryError::IdempotentParameterMismatch(request.client_request_token),
            ));
        }
        let mut targets = collections::HashSet::with_capacity(request.items.len());
        let mut keys = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let (table_name, item_key, _) = transact_parts(item);
            let key = primary_key(item_key).map_err(store::StoreError::service)?;
            if let store::TransactWriteItem::Update(update) = item {
                check_updates(&update.updates).map_err(store::StoreError::service)?;
            }
            if !targets.insert((table_name.as_str(), key.clone())) {
                return Err(store::StoreError::service(MemoryError::DuplicateItem));
            }
            keys.push(key);
        }
        let reasons: Vec<_> = request
            .items
            .iter()
            .zip(&keys)
            .map(|(item, key)| {
                let (table_name, _, condition) = transact_parts(item);
                let existing = state
                    .tables
                    .get(table_name)
                    .and_then(|rows| rows.get(key));
                let failed = !satisfies(condition.as_ref(), existing);
                cancellation_reason(failed, existing)
            })
            .collect();
        if reasons
            .iter()
            .any(|reason| reason.code() != Some(NO_CANCELLATION))
        {
            let codes: Vec<_> = reasons
                .iter()
                .map(|reason| reason.code().unwrap_or(NO_CANCELLATION))
                .collect();
            let message = format!(
                "Transaction cancelled, please refer cancellation reasons for specific reasons [{}]",
                codes.join(", ")
            );
            return Err(store::StoreError::TransactionCanceled {
                message: Some(message),
                reasons,
            });
        }
        for (item, key) in request.items.iter().zip(keys) {
            match item {
                store::TransactWriteItem::Put(put) => {
                    let rows = state.tables.entry(put.table_name.clone()).or_default();
                    rows.insert(key, put.item.clone());
                }
                store::TransactWriteItem::Delete(delete) => {
                    let rows = state.tables.entry(delete.table_name.clone()).or_default();
                    rows.remove(&key);
                }
                store::TransactWriteItem::Update(update) => {
                    let rows = state.tables.entry(update.table_name.clone()).or_default();
                    let new = apply_updates(rows.get(&key), &update.key, &update.updates);
                    rows.insert(key, new);
                }
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(items = request.items.len(), "applied transaction");
        if !request.client_request_token.is_empty() {
            state
                .transactions
                .insert(request.client_request_token.clone(), request);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    use rstest::rstest;

    fn string(value: &str) -> types::AttributeValue {
        types::AttributeValue::S(value.to_string())
    }

    fn number(value: &str) -> types::AttributeValue {
        types::AttributeValue::N(value.to_string())
    }

    fn row(partition_key: &str, sort_key: &str) -> common::Item {
        common::key::PrimaryKey::new(partition_key, sort_key).into()
    }

    fn leaf(
        name: &str,
        condition: common::condition::Condition<types::AttributeValue>,
    ) -> common::condition::ConditionMap<types::AttributeValue> {
        common::condition::ConditionMap::Leaves(
            common::condition::LogicalOperator::And,
            vec![common::condition::AttributeCondition {
                condition,
                name: name.to_string(),
            }],
        )
    }

    #[rstest]
    #[case::equals(common::condition::Condition::Equals(number("1.0")), true)]
    #[case::not_equal(common::condition::Condition::NotEqual(number("1")), false)]
    #[case::greater_than(common::condition::Condition::GreaterThan(number("0")), true)]
    #[case::between(common::condition::Condition::Between(number("2"), number("3")), false)]
    #[case::in_list(common::condition::Condition::In(vec![number("5"), number("1")]), true)]
    #[case::type_mismatch(common::condition::Condition::LessThan(string("9")), false)]
    #[case::exists(common::condition::Condition::NotNull, true)]
    fn test_evaluate_condition(
        #[case] condition: common::condition::Condition<types::AttributeValue>,
        #[case] expected: bool,
    ) {
        let actual = evaluate_condition(&condition, Some(&number("1")));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_evaluate_nested_map() {
        let item = common::Item::from([(
            "a".to_string(),
            types::AttributeValue::M(collections::HashMap::from([(
                "b".to_string(),
                string("hello"),
            )])),
        )]);
        let condition_map = common::condition::ConditionMap::Node(
            common::condition::LogicalOperator::And,
            indexmap::IndexMap::from([(
                "a".to_string(),
                common::condition::ConditionMap::Leaves(
                    common::condition::LogicalOperator::Or,
                    vec![
                        common::condition::AttributeCondition {
                            condition: common::condition::Condition::Contains(string("ell")),
                            name: "b".to_string(),
                        },
                        common::condition::AttributeCondition {
                            condition: common::condition::Condition::Null,
                            name: "b".to_string(),
                        },
                    ],
                ),
            )]),
        );
        assert!(evaluate_map(&condition_map, &item, &[]));
        assert!(!evaluate_map(
            &leaf("a", common::condition::Condition::Null),
            &item,
            &[]
        ));
    }

    #[tokio::test]
    async fn test_update_returns_requested_version() {
        let memory = MemoryStore::new();
        let mut item = row("a", "b");
        item.insert("c".to_string(), string("d"));
        item.insert("e".to_string(), string("f"));
        memory
            .put_item(store::PutItemRequest {
                table_name: "t".to_string(),
                item,
                ..Default::default()
            })
            .await
            .unwrap();
        let returned = memory
            .update_item(store::UpdateItemRequest {
                table_name: "t".to_string(),
                key: row("a", "b"),
                updates: indexmap::IndexMap::from([("c".to_string(), string("g"))]),
                return_values: Some(types::ReturnValue::UpdatedOld),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            returned,
            Some(common::Item::from([("c".to_string(), string("d"))]))
        );
        let stored = memory.items("t");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get("c"), Some(&string("g")));
        assert_eq!(stored[0].get("e"), Some(&string("f")));
    }

    #[tokio::test]
    async fn test_query_index_is_sparse() {
        let memory = MemoryStore::new();
        for (sort_key, index_key) in [("1", Some("x")), ("2", None), ("3", Some("y"))] {
            let mut item = row("a", sort_key);
            if let Some(index_key) = index_key {
                item.insert("GSI1PK".to_string(), string("p"));
                item.insert("GSI1SK".to_string(), string(index_key));
            }
            memory
                .put_item(store::PutItemRequest {
                    table_name: "t".to_string(),
                    item,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let index = common::key::Index::gsi1();
        let response = memory
            .query(store::QueryRequest {
                table_name: "t".to_string(),
                index_name: Some(index.name.clone()),
                key_condition: common::key::KeyCondition::partition("p").resolve(&index.columns),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].get("SK"), Some(&string("1")));
        let expected_key = common::Item::from([
            ("PK".to_string(), string("a")),
            ("SK".to_string(), string("1")),
            ("GSI1PK".to_string(), string("p")),
            ("GSI1SK".to_string(), string("x")),
        ]);
        assert_eq!(response.last_evaluated_key, Some(expected_key.clone()));

        let response = memory
            .query(store::QueryRequest {
                table_name: "t".to_string(),
                index_name: Some(index.name.clone()),
                key_condition: common::key::KeyCondition::partition("p").resolve(&index.columns),
                exclusive_start_key: Some(expected_key),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].get("SK"), Some(&string("3")));
        assert_eq!(response.last_evaluated_key, None);
    }

    #[tokio::test]
    async fn test_query_unknown_index() {
        let memory = MemoryStore::new();
        let err = memory
            .query(store::QueryRequest {
                table_name: "t".to_string(),
                index_name: Some("GSI9".to_string()),
                key_condition: common::key::KeyCondition::partition("p")
                    .resolve(&common::key::KeyColumns::default()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, store::StoreError::Service(_)));
    }

    #[tokio::test]
    async fn test_transaction_token_is_idempotent() {
        let memory = MemoryStore::new();
        let request = store::TransactWriteItemsRequest {
            client_request_token: "token".to_string(),
            items: vec![store::TransactWriteItem::Put(store::TransactPut {
                table_name: "t".to_string(),
                item: row("a", "b"),
                condition: Some(common::condition::ConditionExpression::item_not_exists()),
            })],
        };
        memory.transact_write_items(request.clone()).await.unwrap();
        memory.transact_write_items(request).await.unwrap();
        assert_eq!(memory.items("t").len(), 1);

        let mismatch = store::TransactWriteItemsRequest {
            client_request_token: "token".to_string(),
            items: vec![store::TransactWriteItem::Delete(store::TransactDelete {
                table_name: "t".to_string(),
                key: row("a", "b"),
                condition: None,
            })],
        };
        let err = memory.transact_write_items(mismatch).await.unwrap_err();
        assert!(matches!(err, store::StoreError::Service(_)));
        assert_eq!(memory.calls(), 3);
    }

    #[tokio::test]
    async fn test_transaction_rejects_duplicate_items() {
        let memory = MemoryStore::new();
        let put = store::TransactWriteItem::Put(store::TransactPut {
            table_name: "t".to_string(),
            item: row("a", "b"),
            condition: None,
        });
        let err = memory
            .transact_write_items(store::TransactWriteItemsRequest {
                client_request_token: String::new(),
                items: vec![put.clone(), put],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, store::StoreError::Service(_)));
        assert!(memory.items("t").is_empty());
    }

    #[tokio::test]
    async fn test_put_rejects_new_return_values() {
        let memory = MemoryStore::new();
        for return_values in [types::ReturnValue::AllNew, types::ReturnValue::UpdatedNew] {
            let err = memory
                .put_item(store::PutItemRequest {
                    table_name: "t".to_string(),
                    item: row("a", "b"),
                    return_values: Some(return_values),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert!(matches!(err, store::StoreError::Service(_)));
        }
        assert!(memory.items("t").is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_key_attributes() {
        let memory = MemoryStore::new();
        memory
            .put_item(store::PutItemRequest {
                table_name: "t".to_string(),
                item: row("a", "b"),
                ..Default::default()
            })
            .await
            .unwrap();
        let err = memory
            .update_item(store::UpdateItemRequest {
                table_name: "t".to_string(),
                key: row("a", "b"),
                updates: indexmap::IndexMap::from([("PK".to_string(), string("c"))]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, store::StoreError::Service(_)));
        assert_eq!(memory.items("t"), vec![row("a", "b")]);
    }
}
