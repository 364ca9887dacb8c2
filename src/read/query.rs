use crate::{Table, common, error, store};

use serde::de::DeserializeOwned;
use serde_dynamo::from_items;

const OPERATION: &str = "query";

/// One page of query results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page<R> {
    /// Rows of this page, in scan order.
    pub items: Vec<R>,
    /// Cursor of the next page, `None` when the store has no more items.
    ///
    /// Pass it to [`common::options::OptionsBuilder::page`] to resume.
    pub next_page: Option<String>,
}

/// Query operation.
///
/// The index selected in the options is resolved first; the key condition is
/// then bound to that index's key columns.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_single_table::{Table, common, read};
/// use serde_json::Value;
///
/// # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let table = Table::new(client, "app");
/// let query = read::query::Query {
///     key_condition: common::key::KeyCondition::begins_with("USER#1", "ORDER#"),
///     options: common::options::Options::builder()
///         .page_size(20)
///         .scan_backwards()
///         .build()?,
/// };
/// let page: read::query::Page<Value> = query.send(&table).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    /// Key condition, resolved against the selected index.
    pub key_condition: common::key::KeyCondition,
    /// Index, filter, pagination and scan direction.
    pub options: common::options::Options,
}

impl Query {
    fn into_request(self, table_name: &str) -> error::Result<store::QueryRequest> {
        if self.key_condition.partition_key.is_empty() {
            return Err(error::Error::invalid_argument(
                OPERATION,
                "partition key cannot be empty",
            ));
        }
        let options = self.options;
        options.ensure_no_updates(OPERATION)?;
        options.ensure_no_conditions(OPERATION)?;
        options.ensure_return_values(OPERATION, &[])?;
        let columns = options.key_columns();
        let request = store::QueryRequest {
            table_name: table_name.to_string(),
            index_name: options.index.map(|index| index.name),
            key_condition: self.key_condition.resolve(&columns),
            filter: options.filter,
            exclusive_start_key: options.start_key,
            limit: options.page_size,
            scan_index_forward: !options.scan_backwards,
        };
        Ok(request)
    }

    /// Execute the query operation, reading one page.
    ///
    /// A fresh query matching nothing is [`error::Error::NotFound`]; a resumed
    /// query past the last item returns an empty page.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_single_table.query", skip_all, fields(table = table.name()), err)
    )]
    pub async fn send<S: store::Store, R: DeserializeOwned>(
        self,
        table: &Table<S>,
    ) -> error::Result<Page<R>> {
        let request = self.into_request(table.name())?;
        let is_resumed = request.exclusive_start_key.is_some();
        let response = table
            .store()
            .query(request)
            .await
            .map_err(|err| error::Error::from_store(OPERATION, err))?;
        let next_page = response
            .last_evaluated_key
            .as_ref()
            .map(common::cursor::serialize)
            .transpose()?
            .filter(|cursor| !cursor.is_empty());
        if response.items.is_empty() && next_page.is_none() && !is_resumed {
            return Err(error::Error::NotFound {
                operation: OPERATION,
            });
        }
        let items = from_items(response.items).map_err(|err| error::Error::internal(OPERATION, err))?;
        Ok(Page { items, next_page })
    }
}
