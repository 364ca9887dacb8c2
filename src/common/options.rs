use crate::{common, error};

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use serde::Serialize;
use serde_dynamo::to_item;

/// Resolved options of a single-item operation or a query.
///
/// Built with [`Options::builder`]; named options apply in the order they
/// are called.
///
/// ```rust
/// use dynamodb_single_table::common::{key, options};
/// use serde_json::json;
///
/// let options = options::Options::builder()
///     .item_exists()
///     .field_updates(json!({"name": "Jane"}))
///     .return_values(options::ReturnValue::AllNew)
///     .build()?;
/// assert_eq!(options.update_count(), 1);
///
/// let query_options = options::Options::builder()
///     .index(key::Index::gsi1())
///     .page_size(25)
///     .scan_backwards()
///     .build()?;
/// # Ok::<(), dynamodb_single_table::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    pub(crate) conditions: Option<common::condition::ConditionExpression>,
    pub(crate) updates: IndexMap<String, types::AttributeValue>,
    pub(crate) return_values: Option<ReturnValue>,
    pub(crate) page_size: Option<i32>,
    pub(crate) start_key: Option<common::Item>,
    pub(crate) scan_backwards: bool,
    pub(crate) index: Option<common::key::Index>,
    pub(crate) filter: Option<common::condition::ConditionMap<types::AttributeValue>>,
}

/// Which version of the item a write hands back.
pub use types::ReturnValue;

impl Options {
    /// Start building options.
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Number of conjoined conditions.
    pub fn condition_count(&self) -> usize {
        self.conditions
            .as_ref()
            .map_or(0, common::condition::ConditionExpression::len)
    }

    /// Number of attributes set by field updates.
    pub fn update_count(&self) -> usize {
        self.updates.len()
    }

    /// The composed condition, if any.
    pub fn conditions(&self) -> Option<&common::condition::ConditionExpression> {
        self.conditions.as_ref()
    }

    /// The selected index, if any.
    pub fn index(&self) -> Option<&common::key::Index> {
        self.index.as_ref()
    }

    /// Key columns the key condition resolves against: the selected index or the primary key.
    pub(crate) fn key_columns(&self) -> common::key::KeyColumns {
        self.index
            .as_ref()
            .map(|index| index.columns.clone())
            .unwrap_or_default()
    }

    /// Field updates only make sense for update operations.
    pub(crate) fn ensure_no_updates(&self, operation: &'static str) -> error::Result<()> {
        if self.updates.is_empty() {
            Ok(())
        } else {
            Err(error::Error::invalid_argument(
                operation,
                "field updates are only allowed on update",
            ))
        }
    }

    /// Conditions only make sense for writes.
    pub(crate) fn ensure_no_conditions(&self, operation: &'static str) -> error::Result<()> {
        if self.conditions.is_none() {
            Ok(())
        } else {
            Err(error::Error::invalid_argument(
                operation,
                "conditions are only allowed on writes",
            ))
        }
    }
}

impl Options {
    /// Index, filter and pagination only make sense for queries.
    pub(crate) fn ensure_no_query_options(&self, operation: &'static str) -> error::Result<()> {
        let query_options = [
            ("index", self.index.is_some()),
            ("filter", self.filter.is_some()),
            ("page", self.start_key.is_some()),
            ("page size", self.page_size.is_some()),
            ("scan backwards", self.scan_backwards),
        ];
        match query_options.into_iter().find(|(_, is_set)| *is_set) {
            Some((option, _)) => Err(error::Error::invalid_argument(
                operation,
                format!("{option} is only allowed on query"),
            )),
            None => Ok(()),
        }
    }

    /// Rejects a return-value mode the operation cannot honour.
    pub(crate) fn ensure_return_values(
        &self,
        operation: &'static str,
        supported: &[ReturnValue],
    ) -> error::Result<()> {
        match &self.return_values {
            Some(return_values)
                if *return_values != ReturnValue::None && !supported.contains(return_values) =>
            {
                Err(error::Error::invalid_argument(
                    operation,
                    format!("return values {} are not supported", return_values.as_str()),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Builder applying named options in order.
///
/// The first failing option is remembered; every later option is skipped and
/// [`OptionsBuilder::build`] returns that failure.
#[derive(Debug, Default)]
pub struct OptionsBuilder {
    options: Options,
    error: Option<error::Error>,
}

impl OptionsBuilder {
    fn apply(mut self, option: impl FnOnce(Options) -> error::Result<Options>) -> Self {
        if self.error.is_none() {
            let options = std::mem::take(&mut self.options);
            match option(options) {
                Ok(options) => self.options = options,
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    fn and_condition(self, condition: common::condition::ConditionMap<types::AttributeValue>) -> Self {
        self.apply(|options| {
            let conditions = common::condition::ConditionExpression::and_optional(
                options.conditions,
                condition,
            );
            Ok(Options {
                conditions: Some(conditions),
                ..options
            })
        })
    }

    /// The item must already exist. For put, update and delete.
    pub fn item_exists(self) -> Self {
        self.and_condition(common::condition::ConditionMap::item_exists())
    }

    /// The item must not exist yet. For put, update and delete.
    pub fn item_not_exists(self) -> Self {
        self.and_condition(common::condition::ConditionMap::item_not_exists())
    }

    /// An arbitrary condition, conjoined with the conditions added before.
    pub fn condition<T: Serialize>(self, condition: common::condition::ConditionMap<T>) -> Self {
        if condition.has_empty_branch() {
            return self.apply(|_| {
                Err(error::Error::invalid_argument(
                    "condition",
                    "condition has an empty branch",
                ))
            });
        }
        match condition.into_attribute_values() {
            Ok(condition) => self.and_condition(condition),
            Err(err) => self.apply(|_| Err(error::Error::internal("condition", err))),
        }
    }

    /// Set attributes of the item. For update only.
    ///
    /// `updates` must serialize to a map; each entry replaces the whole
    /// attribute of that name and leaves every other attribute untouched.
    /// The `PK` and `SK` columns cannot be updated.
    pub fn field_updates<T: Serialize>(self, updates: T) -> Self {
        self.apply(|mut options| {
            let item: common::Item =
                to_item(updates).map_err(|err| error::Error::internal("field_updates", err))?;
            for column in [common::key::PARTITION_KEY, common::key::SORT_KEY] {
                if item.contains_key(column) {
                    return Err(error::Error::invalid_argument(
                        "field_updates",
                        format!("key column {column} cannot be updated"),
                    ));
                }
            }
            let mut entries: Vec<_> = item.into_iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            options.updates.extend(entries);
            Ok(options)
        })
    }

    /// Filter applied to query results after the key condition. At most one.
    pub fn filter<T: Serialize>(self, filter: common::condition::ConditionMap<T>) -> Self {
        self.apply(|options| {
            if options.filter.is_some() {
                return Err(error::Error::invalid_argument(
                    "filter",
                    "at most one filter can be attached",
                ));
            }
            if filter.has_empty_branch() {
                return Err(error::Error::invalid_argument(
                    "filter",
                    "filter has an empty branch",
                ));
            }
            let filter = filter
                .into_attribute_values()
                .map_err(|err| error::Error::internal("filter", err))?;
            Ok(Options {
                filter: Some(filter),
                ..options
            })
        })
    }

    /// Query a secondary index instead of the primary key.
    pub fn index(self, index: common::key::Index) -> Self {
        self.apply(|options| {
            Ok(Options {
                index: Some(index),
                ..options
            })
        })
    }

    /// Resume a query from a cursor returned by a previous page. `""` starts over.
    pub fn page(self, cursor: &str) -> Self {
        self.apply(|options| {
            let start_key = common::cursor::deserialize(cursor)?;
            Ok(Options {
                start_key,
                ..options
            })
        })
    }

    /// Upper bound on items evaluated per query page. `0` keeps the store default.
    pub fn page_size(self, page_size: i64) -> Self {
        self.apply(|options| {
            if page_size < 0 {
                return Err(error::Error::invalid_argument(
                    "page_size",
                    "page size cannot be negative",
                ));
            }
            if page_size == 0 {
                return Ok(options);
            }
            let page_size = i32::try_from(page_size).map_err(|_| {
                error::Error::invalid_argument("page_size", "page size is too large")
            })?;
            Ok(Options {
                page_size: Some(page_size),
                ..options
            })
        })
    }

    /// Which version of the item a write hands back.
    pub fn return_values(self, return_values: ReturnValue) -> Self {
        self.apply(|options| {
            Ok(Options {
                return_values: Some(return_values),
                ..options
            })
        })
    }

    /// Return query results in descending sort key order.
    pub fn scan_backwards(self) -> Self {
        self.apply(|options| {
            Ok(Options {
                scan_backwards: true,
                ..options
            })
        })
    }

    /// Finish building, returning the first failure if any option failed.
    pub fn build(self) -> error::Result<Options> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.options),
        }
    }
}
