use crate::{Table, common, error, store, write};

const OPERATION: &str = "update_item";

/// Update item operation.
///
/// Sets the attributes named by the field updates and leaves every other
/// attribute untouched. At least one field update is required.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_single_table::{Table, common, write};
/// use serde_json::json;
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let table = Table::new(client, "app");
/// let update_item = write::update_item::UpdateItem {
///     key: common::key::PrimaryKey::new("USER#1", "PROFILE"),
///     options: common::options::Options::builder()
///         .item_exists()
///         .field_updates(json!({"name": "Jane"}))
///         .return_values(common::options::ReturnValue::AllNew)
///         .build()?,
/// };
/// let updated = update_item.send(&table).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateItem {
    /// The primary key of the item to update.
    pub key: common::key::PrimaryKey,
    /// Field updates, conditions and return values.
    pub options: common::options::Options,
}

impl UpdateItem {
    fn into_request(self, table_name: &str) -> error::Result<store::UpdateItemRequest> {
        if self.options.updates.is_empty() {
            return Err(error::Error::invalid_argument(
                OPERATION,
                "no updates provided",
            ));
        }
        self.options.ensure_no_query_options(OPERATION)?;
        let request = store::UpdateItemRequest {
            table_name: table_name.to_string(),
            key: self.key.into(),
            updates: self.options.updates,
            condition: self.options.conditions,
            return_values: self.options.return_values,
        };
        Ok(request)
    }

    /// Execute the update item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_single_table.update_item", skip_all, fields(table = table.name()), err)
    )]
    pub async fn send<S: store::Store>(
        self,
        table: &Table<S>,
    ) -> error::Result<write::common::ReturnedAttributes> {
        let request = self.into_request(table.name())?;
        let attributes = table
            .store()
            .update_item(request)
            .await
            .map_err(|err| error::Error::from_store(OPERATION, err))?;
        Ok(write::common::ReturnedAttributes::new(OPERATION, attributes))
    }
}
