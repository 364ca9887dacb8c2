use crate::{Table, common, error, store, write};

const OPERATION: &str = "delete_item";

/// Delete item operation.
///
/// Deleting an absent item without a condition succeeds.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_single_table::{Table, common, write};
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let table = Table::new(client, "app");
/// let delete_item = write::delete_item::DeleteItem {
///     key: common::key::PrimaryKey::new("USER#1", "PROFILE"),
///     ..Default::default()
/// };
/// delete_item.send(&table).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteItem {
    /// The primary key of the item to delete.
    pub key: common::key::PrimaryKey,
    /// Conditions and return values.
    pub options: common::options::Options,
}

impl DeleteItem {
    fn into_request(self, table_name: &str) -> error::Result<store::DeleteItemRequest> {
        self.options.ensure_no_updates(OPERATION)?;
        self.options.ensure_no_query_options(OPERATION)?;
        self.options
            .ensure_return_values(OPERATION, &[common::options::ReturnValue::AllOld])?;
        let request = store::DeleteItemRequest {
            table_name: table_name.to_string(),
            key: self.key.into(),
            condition: self.options.conditions,
            return_values: self.options.return_values,
        };
        Ok(request)
    }

    /// Execute the delete item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_single_table.delete_item", skip_all, fields(table = table.name()), err)
    )]
    pub async fn send<S: store::Store>(
        self,
        table: &Table<S>,
    ) -> error::Result<write::common::ReturnedAttributes> {
        let request = self.into_request(table.name())?;
        let attributes = table
            .store()
            .delete_item(request)
            .await
            .map_err(|err| error::Error::from_store(OPERATION, err))?;
        Ok(write::common::ReturnedAttributes::new(OPERATION, attributes))
    }
}
