use crate::{common, error, read, store, write};

use serde::{Serialize, de::DeserializeOwned};

/// Handle on one table of a storage engine.
///
/// Every method issues exactly one call to the store. Client configuration
/// (region, credentials, endpoint) stays with the store itself.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_single_table::{Table, common};
/// use serde_json::{Value, json};
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let table = Table::new(client, "app");
/// let options = common::options::Options::builder().item_not_exists().build()?;
/// table
///     .put(json!({"PK": "USER#1", "SK": "PROFILE", "name": "John"}), options)
///     .await?;
/// let user: Value = table.get("USER#1", "PROFILE").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Table<S> {
    store: S,
    name: String,
}

impl<S> Table<S> {
    /// A handle on table `name` of `store`.
    pub fn new(store: S, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: store::Store> Table<S> {
    /// Read one row by primary key.
    pub async fn get<R: DeserializeOwned>(
        &self,
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> error::Result<R> {
        read::get_item::GetItem {
            key: common::key::PrimaryKey::new(partition_key, sort_key),
        }
        .send(self)
        .await
    }

    /// Replace one row.
    pub async fn put<T: Serialize>(
        &self,
        row: T,
        options: common::options::Options,
    ) -> error::Result<write::common::ReturnedAttributes> {
        write::put_item::PutItem { row, options }.send(self).await
    }

    /// Set some attributes of one row.
    pub async fn update(
        &self,
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
        options: common::options::Options,
    ) -> error::Result<write::common::ReturnedAttributes> {
        write::update_item::UpdateItem {
            key: common::key::PrimaryKey::new(partition_key, sort_key),
            options,
        }
        .send(self)
        .await
    }

    /// Delete one row.
    pub async fn delete(
        &self,
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
        options: common::options::Options,
    ) -> error::Result<write::common::ReturnedAttributes> {
        write::delete_item::DeleteItem {
            key: common::key::PrimaryKey::new(partition_key, sort_key),
            options,
        }
        .send(self)
        .await
    }

    /// Read one page of rows matching a key condition.
    pub async fn query<R: DeserializeOwned>(
        &self,
        key_condition: common::key::KeyCondition,
        options: common::options::Options,
    ) -> error::Result<read::query::Page<R>> {
        read::query::Query {
            key_condition,
            options,
        }
        .send(self)
        .await
    }

    /// Put every row or none.
    pub async fn transact_puts(
        &self,
        client_request_token: impl Into<String>,
        rows: Vec<write::transact_write_items::PutRow>,
    ) -> error::Result<()> {
        write::transact_write_items::TransactWriteItems::puts(client_request_token, rows)
            .send(self)
            .await
    }

    /// Delete every row or none.
    pub async fn transact_deletes(
        &self,
        client_request_token: impl Into<String>,
        rows: Vec<write::transact_write_items::DeleteRow>,
    ) -> error::Result<()> {
        write::transact_write_items::TransactWriteItems::deletes(client_request_token, rows)
            .send(self)
            .await
    }

    /// Put, delete and update rows in one atomic request.
    pub async fn transact_writes(
        &self,
        client_request_token: impl Into<String>,
        puts: Vec<write::transact_write_items::PutRow>,
        deletes: Vec<write::transact_write_items::DeleteRow>,
        updates: Vec<write::transact_write_items::UpdateRow>,
    ) -> error::Result<()> {
        write::transact_write_items::TransactWriteItems::writes(
            client_request_token,
            puts,
            deletes,
            updates,
        )
        .send(self)
        .await
    }
}
