use crate::{common, store};

use aws_sdk_dynamodb::{Client, error, operation, types};
use indexmap::IndexMap;
use std::collections;

/// Separator between update clauses.
const CLAUSE_SEPARATOR: &str = ", ";

/// condition, placeholders and table shared by every write
#[derive(Clone, Debug, Default, PartialEq)]
struct WriteInput {
    condition_expression: Option<String>,
    expression_attribute_names: Option<collections::HashMap<String, String>>,
    expression_attribute_values: Option<common::Item>,
    table_name: String,
}

impl WriteInput {
    fn new(
        table_name: String,
        condition: Option<common::condition::ConditionExpression>,
        index: &mut usize,
    ) -> Self {
        let mut operation = Self {
            table_name,
            ..Default::default()
        };
        if let Some(condition) = condition {
            let condition_operation = condition.into_expression_input(index);
            operation.condition_expression = Some(operation.merge_expression(condition_operation));
        }
        operation
    }

    fn merge_expression(&mut self, operation: common::ExpressionInput) -> String {
        operation.merge_into(
            &mut self.expression_attribute_names,
            &mut self.expression_attribute_values,
        )
    }
}

/// apply the condition and table of a write to a builder
macro_rules! apply_write_input {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_condition_expression($write_operation.condition_expression)
            .set_expression_attribute_names($write_operation.expression_attribute_names)
            .set_expression_attribute_values($write_operation.expression_attribute_values)
            .table_name($write_operation.table_name)
    };
}

/// put item operation
#[derive(Clone, Debug, Default, PartialEq)]
struct PutItemInput {
    item: common::Item,
    write_operation: WriteInput,
}

impl PutItemInput {
    fn new(
        table_name: String,
        item: common::Item,
        condition: Option<common::condition::ConditionExpression>,
    ) -> Self {
        Self {
            item,
            write_operation: WriteInput::new(table_name, condition, &mut 0),
        }
    }
}

/// delete item operation
#[derive(Clone, Debug, Default, PartialEq)]
struct DeleteItemInput {
    key: common::Item,
    write_operation: WriteInput,
}

impl DeleteItemInput {
    fn new(
        table_name: String,
        key: common::Item,
        condition: Option<common::condition::ConditionExpression>,
    ) -> Self {
        Self {
            key,
            write_operation: WriteInput::new(table_name, condition, &mut 0),
        }
    }
}

/// update item operation
#[derive(Clone, Debug, Default, PartialEq)]
struct UpdateItemInput {
    key: common::Item,
    update_expression: String,
    write_operation: WriteInput,
}

impl UpdateItemInput {
    fn new(
        table_name: String,
        key: common::Item,
        updates: IndexMap<String, types::AttributeValue>,
        condition: Option<common::condition::ConditionExpression>,
    ) -> Self {
        let mut index = 0;
        let set_operation = Self::get_set_expression(updates, &mut index);
        let mut write_operation = WriteInput::new(table_name, condition, &mut index);
        let update_expression = format!("SET {}", write_operation.merge_expression(set_operation));
        Self {
            key,
            update_expression,
            write_operation,
        }
    }

    fn get_set_expression(
        updates: IndexMap<String, types::AttributeValue>,
        index: &mut usize,
    ) -> common::ExpressionInput {
        let mut operations = Vec::with_capacity(updates.len());
        for (key, value) in updates {
            let (placeholder, _) = common::add_placeholder(&[], &key);
            let value_placeholder = format!(":set{index}");
            *index += 1;
            let expression = format!("{placeholder} = {value_placeholder}");
            operations.push(common::ExpressionInput {
                expression,
                expression_attribute_names: collections::HashMap::from([(placeholder, key)]),
                expression_attribute_values: collections::HashMap::from([(
                    value_placeholder,
                    value,
                )]),
            });
        }
        common::ExpressionInput::merge(CLAUSE_SEPARATOR, operations)
    }
}

/// query operation
#[derive(Clone, Debug, Default, PartialEq)]
struct QueryInput {
    exclusive_start_key: Option<common::Item>,
    expression_attribute_names: Option<collections::HashMap<String, String>>,
    expression_attribute_values: Option<common::Item>,
    filter_expression: Option<String>,
    index_name: Option<String>,
    key_condition_expression: String,
    limit: Option<i32>,
    scan_index_forward: bool,
    table_name: String,
}

impl From<store::QueryRequest> for QueryInput {
    fn from(query: store::QueryRequest) -> Self {
        let mut index = 0;
        let mut operation = Self {
            exclusive_start_key: query.exclusive_start_key,
            index_name: query.index_name,
            limit: query.limit,
            scan_index_forward: query.scan_index_forward,
            table_name: query.table_name,
            ..Default::default()
        };
        let key_condition_operation = common::condition::AttributeCondition::get_expression_operation(
            query.key_condition,
            &mut index,
        );
        operation.key_condition_expression = key_condition_operation.merge_into(
            &mut operation.expression_attribute_names,
            &mut operation.expression_attribute_values,
        );
        if let Some(filter) = query.filter {
            let filter_operation = filter.get_expression_operation_recursive(&[], &mut index, false);
            operation.filter_expression = Some(filter_operation.merge_into(
                &mut operation.expression_attribute_names,
                &mut operation.expression_attribute_values,
            ));
        }
        operation
    }
}

fn transact_write_item(
    item: store::TransactWriteItem,
) -> Result<types::TransactWriteItem, error::BuildError> {
    let builder = types::TransactWriteItem::builder();
    let builder = match item {
        store::TransactWriteItem::Put(put) => {
            let put_item = PutItemInput::new(put.table_name, put.item, put.condition);
            let put_builder = types::Put::builder().set_item(Some(put_item.item));
            builder.put(apply_write_input!(put_builder, put_item.write_operation).build()?)
        }
        store::TransactWriteItem::Delete(delete) => {
            let delete_item = DeleteItemInput::new(delete.table_name, delete.key, delete.condition);
            let delete_builder = types::Delete::builder().set_key(Some(delete_item.key));
            builder.delete(apply_write_input!(delete_builder, delete_item.write_operation).build()?)
        }
        store::TransactWriteItem::Update(update) => {
            let update_item = UpdateItemInput::new(
                update.table_name,
                update.key,
                update.updates,
                update.condition,
            );
            let update_builder = types::Update::builder()
                .set_key(Some(update_item.key))
                .update_expression(update_item.update_expression);
            builder.update(apply_write_input!(update_builder, update_item.write_operation).build()?)
        }
    };
    Ok(builder.build())
}

macro_rules! conditional_write_error {
    ($($function:ident => $module:ident::$error:ident),* $(,)?) => {
        $(
            fn $function(err: operation::$module::$error) -> store::StoreError {
                match err {
                    operation::$module::$error::ConditionalCheckFailedException(_) => {
                        store::StoreError::ConditionalCheckFailed
                    }
                    err => store::StoreError::service(err),
                }
            }
        )*
    };
}

conditional_write_error!(
    put_item_error => put_item::PutItemError,
    update_item_error => update_item::UpdateItemError,
    delete_item_error => delete_item::DeleteItemError,
);

fn transact_write_items_error(
    err: operation::transact_write_items::TransactWriteItemsError,
) -> store::StoreError {
    match err {
        operation::transact_write_items::TransactWriteItemsError::TransactionCanceledException(
            canceled,
        ) => store::StoreError::TransactionCanceled {
            message: canceled.message().map(str::to_string),
            reasons: canceled.cancellation_reasons().to_vec(),
        },
        err => store::StoreError::service(err),
    }
}

fn returned_attributes(attributes: Option<common::Item>) -> Option<common::Item> {
    attributes.filter(|attributes| !attributes.is_empty())
}

impl store::Store for Client {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_single_table.store.get_item",
            level = "debug",
            skip_all,
            fields(table = %request.table_name),
            err
        )
    )]
    async fn get_item(
        &self,
        request: store::GetItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let output = self
            .get_item()
            .table_name(request.table_name)
            .set_key(Some(request.key))
            .send()
            .await
            .map_err(|err| store::StoreError::service(err.into_service_error()))?;
        Ok(returned_attributes(output.item))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_single_table.store.put_item",
            level = "debug",
            skip_all,
            fields(table = %request.table_name),
            err
        )
    )]
    async fn put_item(
        &self,
        request: store::PutItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let put_item = PutItemInput::new(request.table_name, request.item, request.condition);
        let builder = self
            .put_item()
            .set_item(Some(put_item.item))
            .set_return_values(request.return_values);
        let output = apply_write_input!(builder, put_item.write_operation)
            .send()
            .await
            .map_err(|err| put_item_error(err.into_service_error()))?;
        Ok(returned_attributes(output.attributes))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_single_table.store.update_item",
            level = "debug",
            skip_all,
            fields(table = %request.table_name),
            err
        )
    )]
    async fn update_item(
        &self,
        request: store::UpdateItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let update_item = UpdateItemInput::new(
            request.table_name,
            request.key,
            request.updates,
            request.condition,
        );
        let builder = self
            .update_item()
            .set_key(Some(update_item.key))
            .update_expression(update_item.update_expression)
            .set_return_values(request.return_values);
        let output = apply_write_input!(builder, update_item.write_operation)
            .send()
            .await
            .map_err(|err| update_item_error(err.into_service_error()))?;
        Ok(returned_attributes(output.attributes))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_single_table.store.delete_item",
            level = "debug",
            skip_all,
            fields(table = %request.table_name),
            err
        )
    )]
    async fn delete_item(
        &self,
        request: store::DeleteItemRequest,
    ) -> Result<Option<common::Item>, store::StoreError> {
        let delete_item = DeleteItemInput::new(request.table_name, request.key, request.condition);
        let builder = self
            .delete_item()
            .set_key(Some(delete_item.key))
            .set_return_values(request.return_values);
        let output = apply_write_input!(builder, delete_item.write_operation)
            .send()
            .await
            .map_err(|err| delete_item_error(err.into_service_error()))?;
        Ok(returned_attributes(output.attributes))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_single_table.store.query",
            level = "debug",
            skip_all,
            fields(table = %request.table_name, index = ?request.index_name),
            err
        )
    )]
    async fn query(
        &self,
        request: store::QueryRequest,
    ) -> Result<store::QueryResponse, store::StoreError> {
        let query: QueryInput = request.into();
        let output = self
            .query()
            .set_exclusive_start_key(query.exclusive_start_key)
            .set_expression_attribute_names(query.expression_attribute_names)
            .set_expression_attribute_values(query.expression_attribute_values)
            .set_filter_expression(query.filter_expression)
            .set_index_name(query.index_name)
            .key_condition_expression(query.key_condition_expression)
            .set_limit(query.limit)
            .scan_index_forward(query.scan_index_forward)
            .table_name(query.table_name)
            .send()
            .await
            .map_err(|err| store::StoreError::service(err.into_service_error()))?;
        Ok(store::QueryResponse {
            items: output.items.unwrap_or_default(),
            last_evaluated_key: returned_attributes(output.last_evaluated_key),
        })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_single_table.store.transact_write_items",
            level = "debug",
            skip_all,
            fields(items = request.items.len()),
            err
        )
    )]
    async fn transact_write_items(
        &self,
        request: store::TransactWriteItemsRequest,
    ) -> Result<(), store::StoreError> {
        let items = request
            .items
            .into_iter()
            .map(transact_write_item)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store::StoreError::service)?;
        let client_request_token =
            Some(request.client_request_token).filter(|token| !token.is_empty());
        self.transact_write_items()
            .set_client_request_token(client_request_token)
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(|err| transact_write_items_error(err.into_service_error()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    fn string(value: &str) -> types::AttributeValue {
        types::AttributeValue::S(value.to_string())
    }

    fn key(partition_key: &str, sort_key: &str) -> common::Item {
        common::key::PrimaryKey::new(partition_key, sort_key).into()
    }

    #[rstest]
    #[case::unconditional(
        None,
        WriteInput {
            table_name: "a".to_string(),
            ..Default::default()
        }
    )]
    #[case::item_not_exists(
        Some(
            common::condition::ConditionExpression::item_not_exists()
        ),
        WriteInput {
            condition_expression: Some(
                "attribute_not_exists(#PK)".to_string()
            ),
            expression_attribute_names: Some(
                collections::HashMap::from(
                    [
                        ("#PK".to_string(), "PK".to_string()),
                    ]
                )
            ),
            table_name: "a".to_string(),
            ..Default::default()
        }
    )]
    #[case::conjunction(
        Some(
            common::condition::ConditionExpression::item_exists().and(
                common::condition::ConditionMap::Leaves(
                    common::condition::LogicalOperator::And,
                    vec![
                        common::condition::AttributeCondition {
                            name: "b".to_string(),
                            condition: common::condition::Condition::Equals(
                                types::AttributeValue::S(
                                    "c".to_string()
                                )
                            ),
                        },
                    ]
                )
            )
        ),
        WriteInput {
            condition_expression: Some(
                "(attribute_exists(#PK)) AND (#b = :b_eq0)".to_string()
            ),
            expression_attribute_names: Some(
                collections::HashMap::from(
                    [
                        ("#PK".to_string(), "PK".to_string()),
                        ("#b".to_string(), "b".to_string()),
                    ]
                )
            ),
            expression_attribute_values: Some(
                collections::HashMap::from(
                    [
                        (
                            ":b_eq0".to_string(),
                            types::AttributeValue::S(
                                "c".to_string()
                            )
                        ),
                    ]
                )
            ),
            table_name: "a".to_string(),
        }
    )]
    fn test_write_input(
        #[case] condition: Option<common::condition::ConditionExpression>,
        #[case] expected: WriteInput,
    ) {
        let actual = WriteInput::new("a".to_string(), condition, &mut 0);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_update_item_input_shares_placeholder_counter() {
        let updates = IndexMap::from([
            ("a".to_string(), string("b")),
            ("c".to_string(), types::AttributeValue::N("1".to_string())),
        ]);
        let condition = common::condition::ConditionExpression::new(
            common::condition::ConditionMap::Leaves(
                common::condition::LogicalOperator::And,
                vec![common::condition::AttributeCondition {
                    name: "a".to_string(),
                    condition: common::condition::Condition::NotEqual(string("z")),
                }],
            ),
        );
        let actual = UpdateItemInput::new("t".to_string(), key("d", "e"), updates, Some(condition));
        let expected = UpdateItemInput {
            key: key("d", "e"),
            update_expression: "SET #a = :set0, #c = :set1".to_string(),
            write_operation: WriteInput {
                condition_expression: Some("#a <> :a_ne2".to_string()),
                expression_attribute_names: Some(collections::HashMap::from([
                    ("#a".to_string(), "a".to_string()),
                    ("#c".to_string(), "c".to_string()),
                ])),
                expression_attribute_values: Some(collections::HashMap::from([
                    (":set0".to_string(), string("b")),
                    (":set1".to_string(), types::AttributeValue::N("1".to_string())),
                    (":a_ne2".to_string(), string("z")),
                ])),
                table_name: "t".to_string(),
            },
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_update_item_input_escapes_attribute_names() {
        let updates = IndexMap::from([
            ("first-name".to_string(), string("x")),
            ("first_name".to_string(), string("y")),
        ]);
        let condition = common::condition::ConditionExpression::new(
            common::condition::ConditionMap::Leaves(
                common::condition::LogicalOperator::And,
                vec![common::condition::AttributeCondition {
                    name: "full name".to_string(),
                    condition: common::condition::Condition::Equals(string("z")),
                }],
            ),
        );
        let actual = UpdateItemInput::new("t".to_string(), key("d", "e"), updates, Some(condition));
        assert_eq!(
            actual.update_expression,
            "SET #first_2dname = :set0, #first__name = :set1"
        );
        assert_eq!(
            actual.write_operation.condition_expression.as_deref(),
            Some("#full_20name = :full_20name_eq2")
        );
        let expected_names = collections::HashMap::from([
            ("#first_2dname".to_string(), "first-name".to_string()),
            ("#first__name".to_string(), "first_name".to_string()),
            ("#full_20name".to_string(), "full name".to_string()),
        ]);
        assert_eq!(
            actual.write_operation.expression_attribute_names,
            Some(expected_names)
        );
    }

    #[rstest]
    #[case::primary_key(
        store::QueryRequest {
            table_name: "a".to_string(),
            key_condition: common::key::KeyCondition::partition("b")
                .resolve(&common::key::KeyColumns::default()),
            ..Default::default()
        },
        QueryInput {
            expression_attribute_names: Some(
                collections::HashMap::from(
                    [
                        ("#PK".to_string(), "PK".to_string()),
                    ]
                )
            ),
            expression_attribute_values: Some(
                collections::HashMap::from(
                    [
                        (
                            ":PK_eq0".to_string(),
                            types::AttributeValue::S(
                                "b".to_string()
                            )
                        ),
                    ]
                )
            ),
            key_condition_expression: "#PK = :PK_eq0".to_string(),
            scan_index_forward: true,
            table_name: "a".to_string(),
            ..Default::default()
        }
    )]
    #[case::index_with_filter(
        store::QueryRequest {
            table_name: "a".to_string(),
            index_name: Some(
                "GSI2".to_string()
            ),
            key_condition: common::key::KeyCondition::begins_with("b", "c")
                .resolve(&common::key::Index::gsi2().columns),
            filter: Some(
                common::condition::ConditionMap::Leaves(
                    common::condition::LogicalOperator::Or,
                    vec![
                        common::condition::AttributeCondition {
                            name: "d".to_string(),
                            condition: common::condition::Condition::Equals(
                                types::AttributeValue::S(
                                    "e".to_string()
                                )
                            ),
                        },
                        common::condition::AttributeCondition {
                            name: "f".to_string(),
                            condition: common::condition::Condition::Null,
                        },
                    ]
                )
            ),
            exclusive_start_key: Some(
                collections::HashMap::from(
                    [
                        (
                            "PK".to_string(),
                            types::AttributeValue::S(
                                "g".to_string()
                            )
                        ),
                    ]
                )
            ),
            limit: Some(10),
            scan_index_forward: false,
        },
        QueryInput {
            exclusive_start_key: Some(
                collections::HashMap::from(
                    [
                        (
                            "PK".to_string(),
                            types::AttributeValue::S(
                                "g".to_string()
                            )
                        ),
                    ]
                )
            ),
            expression_attribute_names: Some(
                collections::HashMap::from(
                    [
                        ("#GSI2PK".to_string(), "GSI2PK".to_string()),
                        ("#GSI2SK".to_string(), "GSI2SK".to_string()),
                        ("#d".to_string(), "d".to_string()),
                        ("#f".to_string(), "f".to_string()),
                    ]
                )
            ),
            expression_attribute_values: Some(
                collections::HashMap::from(
                    [
                        (
                            ":GSI2PK_eq0".to_string(),
                            types::AttributeValue::S(
                                "b".to_string()
                            )
                        ),
                        (
                            ":GSI2SK_begins_with1".to_string(),
                            types::AttributeValue::S(
                                "c".to_string()
                            )
                        ),
                        (
                            ":d_eq2".to_string(),
                            types::AttributeValue::S(
                                "e".to_string()
                            )
                        ),
                    ]
                )
            ),
            filter_expression: Some(
                "#d = :d_eq2 OR attribute_not_exists(#f)".to_string()
            ),
            index_name: Some(
                "GSI2".to_string()
            ),
            key_condition_expression: "#GSI2PK = :GSI2PK_eq0 AND begins_with(#GSI2SK, :GSI2SK_begins_with1)".to_string(),
            limit: Some(10),
            scan_index_forward: false,
            table_name: "a".to_string(),
        }
    )]
    fn test_query_input(#[case] request: store::QueryRequest, #[case] expected: QueryInput) {
        let actual: QueryInput = request.into();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_transact_write_item() {
        let item = store::TransactWriteItem::Put(store::TransactPut {
            table_name: "t".to_string(),
            item: key("a", "b"),
            condition: Some(common::condition::ConditionExpression::item_not_exists()),
        });
        let actual = transact_write_item(item).unwrap();
        let put = actual.put().unwrap();
        assert_eq!(put.table_name(), "t");
        assert_eq!(put.item(), &key("a", "b"));
        assert_eq!(put.condition_expression(), Some("attribute_not_exists(#PK)"));
        assert!(actual.delete().is_none());

        let item = store::TransactWriteItem::Update(store::TransactUpdate {
            table_name: "t".to_string(),
            key: key("a", "b"),
            updates: IndexMap::from([("c".to_string(), string("d"))]),
            condition: None,
        });
        let actual = transact_write_item(item).unwrap();
        let update = actual.update().unwrap();
        assert_eq!(update.update_expression(), "SET #c = :set0");
        assert_eq!(update.condition_expression(), None);
    }

    #[test]
    fn test_conditional_write_error() {
        let err = operation::put_item::PutItemError::ConditionalCheckFailedException(
            types::error::ConditionalCheckFailedException::builder()
                .message("m")
                .build(),
        );
        assert!(matches!(
            put_item_error(err),
            store::StoreError::ConditionalCheckFailed
        ));

        let err = operation::delete_item::DeleteItemError::ResourceNotFoundException(
            types::error::ResourceNotFoundException::builder()
                .message("m")
                .build(),
        );
        assert!(matches!(
            delete_item_error(err),
            store::StoreError::Service(_)
        ));
    }

    #[test]
    fn test_transaction_canceled_error() {
        let reason = types::CancellationReason::builder()
            .code("ConditionalCheckFailed")
            .build();
        let err = operation::transact_write_items::TransactWriteItemsError::TransactionCanceledException(
            types::error::TransactionCanceledException::builder()
                .message("canceled")
                .cancellation_reasons(reason.clone())
                .build(),
        );
        match transact_write_items_error(err) {
            store::StoreError::TransactionCanceled { message, reasons } => {
                assert_eq!(message.as_deref(), Some("canceled"));
                assert_eq!(reasons, vec![reason]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
