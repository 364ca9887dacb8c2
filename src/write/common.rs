use crate::{common, error};

use serde::{Serialize, de::DeserializeOwned};
use serde_dynamo::{from_item, to_item};

/// Attributes handed back by a write, as selected by its return-value mode.
///
/// Empty when no return-value mode was requested or the store had nothing to
/// return (for instance the old version of an item that did not exist).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReturnedAttributes {
    operation: &'static str,
    attributes: Option<common::Item>,
}

impl ReturnedAttributes {
    pub(crate) fn new(operation: &'static str, attributes: Option<common::Item>) -> Self {
        Self {
            operation,
            attributes,
        }
    }

    /// Whether the store returned nothing.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_none()
    }

    /// Deserialize the returned attributes into a row.
    pub fn into_row<R: DeserializeOwned>(self) -> error::Result<Option<R>> {
        self.attributes
            .map(|attributes| from_item(attributes))
            .transpose()
            .map_err(|err| error::Error::internal(self.operation, err))
    }

    /// The returned attributes in their native representation.
    pub fn into_inner(self) -> Option<common::Item> {
        self.attributes
    }
}

/// Marshal a row, checking it carries both key columns as strings.
pub(crate) fn row_item<T: Serialize>(row: T, operation: &'static str) -> error::Result<common::Item> {
    let item: common::Item = to_item(row).map_err(|err| error::Error::internal(operation, err))?;
    for column in [common::key::PARTITION_KEY, common::key::SORT_KEY] {
        let is_string = item.get(column).is_some_and(|value| value.is_s());
        if !is_string {
            return Err(error::Error::invalid_argument(
                operation,
                format!("row must carry a string {column} attribute"),
            ));
        }
    }
    Ok(item)
}
