use crate::{Table, common, error, store};

use serde::de::DeserializeOwned;
use serde_dynamo::from_item;

const OPERATION: &str = "get_item";

/// Get item operation.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_single_table::{Table, common, read};
/// use serde_json::Value;
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let table = Table::new(client, "app");
/// let get_item = read::get_item::GetItem {
///     key: common::key::PrimaryKey::new("USER#1", "PROFILE"),
/// };
/// let row: Value = get_item.send(&table).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GetItem {
    /// The primary key of the item to retrieve.
    pub key: common::key::PrimaryKey,
}

impl GetItem {
    fn into_request(self, table_name: &str) -> store::GetItemRequest {
        store::GetItemRequest {
            table_name: table_name.to_string(),
            key: self.key.into(),
        }
    }

    /// Execute the get item operation.
    ///
    /// An absent item is [`error::Error::NotFound`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_single_table.get_item", skip_all, fields(table = table.name()), err)
    )]
    pub async fn send<S: store::Store, R: DeserializeOwned>(
        self,
        table: &Table<S>,
    ) -> error::Result<R> {
        let request = self.into_request(table.name());
        let item = table
            .store()
            .get_item(request)
            .await
            .map_err(|err| error::Error::from_store(OPERATION, err))?
            .filter(|item| !item.is_empty())
            .ok_or(error::Error::NotFound {
                operation: OPERATION,
            })?;
        from_item(item).map_err(|err| error::Error::internal(OPERATION, err))
    }
}
