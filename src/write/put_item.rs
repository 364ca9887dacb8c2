use crate::{Table, common, error, store, write};

use serde::Serialize;

const OPERATION: &str = "put_item";

/// Put item operation.
///
/// Replaces the whole item. Without a condition an existing item is
/// overwritten; field updates are rejected.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_single_table::{Table, common, write};
/// use serde_json::json;
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let table = Table::new(client, "app");
/// let put_item = write::put_item::PutItem {
///     row: json!({"PK": "USER#1", "SK": "PROFILE", "name": "John"}),
///     options: common::options::Options::builder().item_not_exists().build()?,
/// };
/// put_item.send(&table).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PutItem<T> {
    /// The row to put, carrying its `PK` and `SK` columns.
    pub row: T,
    /// Conditions and return values.
    pub options: common::options::Options,
}

impl<T: Serialize> PutItem<T> {
    fn into_request(self, table_name: &str) -> error::Result<store::PutItemRequest> {
        self.options.ensure_no_updates(OPERATION)?;
        self.options.ensure_no_query_options(OPERATION)?;
        self.options
            .ensure_return_values(OPERATION, &[common::options::ReturnValue::AllOld])?;
        let item = write::common::row_item(self.row, OPERATION)?;
        let request = store::PutItemRequest {
            table_name: table_name.to_string(),
            item,
            condition: self.options.conditions,
            return_values: self.options.return_values,
        };
        Ok(request)
    }

    /// Execute the put item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_single_table.put_item", skip_all, fields(table = table.name()), err)
    )]
    pub async fn send<S: store::Store>(
        self,
        table: &Table<S>,
    ) -> error::Result<write::common::ReturnedAttributes> {
        let request = self.into_request(table.name())?;
        let attributes = table
            .store()
            .put_item(request)
            .await
            .map_err(|err| error::Error::from_store(OPERATION, err))?;
        Ok(write::common::ReturnedAttributes::new(OPERATION, attributes))
    }
}
