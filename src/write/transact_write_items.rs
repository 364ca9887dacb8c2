use crate::{Table, common, error, store, write};

use serde::Serialize;

/// Upper bound on the items of one transaction, matching the store's own limit.
pub const MAX_ITEMS: usize = 100;

/// A row to put inside a transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PutRow {
    item: common::Item,
    condition: Option<common::condition::ConditionExpression>,
}

impl PutRow {
    /// Marshal a row carrying its `PK` and `SK` columns.
    pub fn new<T: Serialize>(row: T) -> error::Result<Self> {
        let item = write::common::row_item(row, "put_row")?;
        Ok(Self {
            item,
            condition: None,
        })
    }

    /// Only put the row if the condition holds.
    #[must_use]
    pub fn with_condition(mut self, condition: common::condition::ConditionExpression) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// A row to delete inside a transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteRow {
    /// The primary key of the row.
    pub key: common::key::PrimaryKey,
    /// Condition the stored row must satisfy.
    pub condition: Option<common::condition::ConditionExpression>,
}

impl DeleteRow {
    /// Delete the row with this primary key.
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            key: common::key::PrimaryKey::new(partition_key, sort_key),
            condition: None,
        }
    }

    /// Only delete the row if the condition holds.
    #[must_use]
    pub fn with_condition(mut self, condition: common::condition::ConditionExpression) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// A row to update inside a transaction, composed like a single-item update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateRow {
    /// The primary key of the row.
    pub key: common::key::PrimaryKey,
    /// Field updates and conditions; at least one field update is required.
    pub options: common::options::Options,
}

impl UpdateRow {
    /// Update the row with this primary key.
    pub fn new(
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
        options: common::options::Options,
    ) -> Self {
        Self {
            key: common::key::PrimaryKey::new(partition_key, sort_key),
            options,
        }
    }
}

/// Transactional write operation: every item is applied or none is.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_single_table::{Table, common, write};
/// use serde_json::json;
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let table = Table::new(client, "app");
/// let puts = vec![
///     write::transact_write_items::PutRow::new(json!({"PK": "USER#1", "SK": "PROFILE"}))?
///         .with_condition(common::condition::ConditionExpression::item_not_exists()),
///     write::transact_write_items::PutRow::new(json!({"PK": "EMAIL#a@b.c", "SK": "USER#1"}))?,
/// ];
/// write::transact_write_items::TransactWriteItems::puts("signup-1", puts)
///     .send(&table)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactWriteItems {
    operation: &'static str,
    client_request_token: String,
    puts: Vec<PutRow>,
    deletes: Vec<DeleteRow>,
    updates: Vec<UpdateRow>,
}

impl TransactWriteItems {
    /// Put every row atomically.
    pub fn puts(client_request_token: impl Into<String>, rows: Vec<PutRow>) -> Self {
        Self {
            operation: "transact_puts",
            client_request_token: client_request_token.into(),
            puts: rows,
            ..Default::default()
        }
    }

    /// Delete every row atomically.
    pub fn deletes(client_request_token: impl Into<String>, rows: Vec<DeleteRow>) -> Self {
        Self {
            operation: "transact_deletes",
            client_request_token: client_request_token.into(),
            deletes: rows,
            ..Default::default()
        }
    }

    /// Put, delete and update rows in one atomic request.
    pub fn writes(
        client_request_token: impl Into<String>,
        puts: Vec<PutRow>,
        deletes: Vec<DeleteRow>,
        updates: Vec<UpdateRow>,
    ) -> Self {
        Self {
            operation: "transact_writes",
            client_request_token: client_request_token.into(),
            puts,
            deletes,
            updates,
        }
    }

    fn len(&self) -> usize {
        self.puts.len() + self.deletes.len() + self.updates.len()
    }

    fn into_request(self, table_name: &str) -> error::Result<store::TransactWriteItemsRequest> {
        let operation = self.operation;
        let len = self.len();
        if len == 0 {
            return Err(error::Error::invalid_argument(
                operation,
                "no rows provided",
            ));
        }
        if len > MAX_ITEMS {
            return Err(error::Error::invalid_argument(
                operation,
                format!("cannot exceed {MAX_ITEMS} rows, got {len}"),
            ));
        }
        let has_empty_condition = self
            .puts
            .iter()
            .map(|row| &row.condition)
            .chain(self.deletes.iter().map(|row| &row.condition))
            .flatten()
            .any(common::condition::ConditionExpression::has_empty_branch);
        if has_empty_condition {
            return Err(error::Error::invalid_argument(
                operation,
                "condition has an empty branch",
            ));
        }
        let mut items = Vec::with_capacity(len);
        items.extend(self.puts.into_iter().map(|row| {
            store::TransactWriteItem::Put(store::TransactPut {
                table_name: table_name.to_string(),
                item: row.item,
                condition: row.condition,
            })
        }));
        items.extend(self.deletes.into_iter().map(|row| {
            store::TransactWriteItem::Delete(store::TransactDelete {
                table_name: table_name.to_string(),
                key: row.key.into(),
                condition: row.condition,
            })
        }));
        for row in self.updates {
            if row.options.updates.is_empty() {
                return Err(error::Error::invalid_argument(
                    operation,
                    "no updates provided",
                ));
            }
            row.options.ensure_no_query_options(operation)?;
            row.options.ensure_return_values(operation, &[])?;
            items.push(store::TransactWriteItem::Update(store::TransactUpdate {
                table_name: table_name.to_string(),
                key: row.key.into(),
                updates: row.options.updates,
                condition: row.options.conditions,
            }));
        }
        let request = store::TransactWriteItemsRequest {
            client_request_token: self.client_request_token,
            items,
        };
        Ok(request)
    }

    /// Execute the transaction.
    ///
    /// Retrying with the same token does not apply the rows twice.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_single_table.transact_write_items",
            skip_all,
            fields(table = table.name(), operation = self.operation, rows = self.len()),
            err
        )
    )]
    pub async fn send<S: store::Store>(self, table: &Table<S>) -> error::Result<()> {
        let operation = self.operation;
        let request = self.into_request(table.name())?;
        table
            .store()
            .transact_write_items(request)
            .await
            .map_err(|err| error::Error::from_store(operation, err))
    }
}
