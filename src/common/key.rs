use crate::{common, error};

use aws_sdk_dynamodb::types;
use serde::{Deserialize, Serialize};

/// Partition key column shared by every row of the table.
pub const PARTITION_KEY: &str = "PK";

/// Sort key column shared by every row of the table.
pub const SORT_KEY: &str = "SK";

/// Number of ordinal secondary indexes (`GSI1`..`GSI5`).
pub const INDEX_COUNT: u8 = 5;

/// Composite primary key of a row.
///
/// ```rust
/// use dynamodb_single_table::common::key;
///
/// let key = key::PrimaryKey::new("USER#1", "PROFILE");
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct PrimaryKey {
    /// The partition key value.
    pub partition_key: String,
    /// The sort key value.
    pub sort_key: String,
}

impl PrimaryKey {
    /// Create a primary key from its two values.
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

impl From<PrimaryKey> for common::Item {
    fn from(key: PrimaryKey) -> Self {
        Self::from([
            (
                PARTITION_KEY.to_string(),
                types::AttributeValue::S(key.partition_key),
            ),
            (SORT_KEY.to_string(), types::AttributeValue::S(key.sort_key)),
        ])
    }
}

/// Concrete partition and sort key column names a key condition resolves against.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeyColumns {
    /// Partition key column name.
    pub partition_key: String,
    /// Sort key column name.
    pub sort_key: String,
}

impl Default for KeyColumns {
    fn default() -> Self {
        Self {
            partition_key: PARTITION_KEY.to_string(),
            sort_key: SORT_KEY.to_string(),
        }
    }
}

/// A secondary index projection: its name and key columns.
///
/// ```rust
/// use dynamodb_single_table::common::key;
///
/// let index = key::Index::gsi2();
/// assert_eq!(index.name, "GSI2");
/// assert_eq!(index.columns.partition_key, "GSI2PK");
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Index {
    /// The index name.
    pub name: String,
    /// The index key columns.
    pub columns: KeyColumns,
}

impl Index {
    /// A custom index with explicit column names.
    pub fn new(
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: KeyColumns {
                partition_key: partition_key.into(),
                sort_key: sort_key.into(),
            },
        }
    }

    /// The ordinal index `GSI<ordinal>`, keyed by `GSI<ordinal>PK`/`GSI<ordinal>SK`.
    pub fn gsi(ordinal: u8) -> error::Result<Self> {
        if !(1..=INDEX_COUNT).contains(&ordinal) {
            return Err(error::Error::invalid_argument(
                "index",
                format!("index ordinal must be between 1 and {INDEX_COUNT}, got {ordinal}"),
            ));
        }
        Ok(Self::ordinal(ordinal))
    }

    /// Every ordinal index, `GSI1` to `GSI5`.
    pub fn ordinals() -> impl Iterator<Item = Self> {
        (1..=INDEX_COUNT).map(Self::ordinal)
    }

    fn ordinal(ordinal: u8) -> Self {
        let name = format!("GSI{ordinal}");
        Self::new(&name, format!("{name}PK"), format!("{name}SK"))
    }
}

macro_rules! ordinal_index {
    ($($function:ident => $ordinal:literal),* $(,)?) => {
        impl Index {
            $(
                #[doc = concat!("The `GSI", $ordinal, "` index.")]
                pub fn $function() -> Self {
                    Self::ordinal($ordinal)
                }
            )*
        }
    };
}

ordinal_index!(gsi1 => 1, gsi2 => 2, gsi3 => 3, gsi4 => 4, gsi5 => 5);

/// Predicate on the sort key of a query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SortKeyCondition {
    /// Sort key starts with the prefix.
    BeginsWith(String),
    /// Sort key lies between both bounds, inclusive.
    Between(String, String),
    /// Sort key equals the value.
    Equals(String),
    /// Sort key is greater than the value.
    GreaterThan(String),
    /// Sort key is greater than or equal to the value.
    GreaterThanOrEqual(String),
    /// Sort key is less than the value.
    LessThan(String),
    /// Sort key is less than or equal to the value.
    LessThanOrEqual(String),
}

impl From<SortKeyCondition> for common::condition::Condition<types::AttributeValue> {
    fn from(condition: SortKeyCondition) -> Self {
        use types::AttributeValue::S;
        match condition {
            SortKeyCondition::BeginsWith(prefix) => Self::BeginsWith(prefix),
            SortKeyCondition::Between(low, high) => Self::Between(S(low), S(high)),
            SortKeyCondition::Equals(value) => Self::Equals(S(value)),
            SortKeyCondition::GreaterThan(value) => Self::GreaterThan(S(value)),
            SortKeyCondition::GreaterThanOrEqual(value) => Self::GreaterThanOrEqual(S(value)),
            SortKeyCondition::LessThan(value) => Self::LessThan(S(value)),
            SortKeyCondition::LessThanOrEqual(value) => Self::LessThanOrEqual(S(value)),
        }
    }
}

/// Key condition of a query, independent of the index it runs against.
///
/// Column names are only bound in [`KeyCondition::resolve`], once the index
/// selection is known.
///
/// ```rust
/// use dynamodb_single_table::common::key;
///
/// let whole_partition = key::KeyCondition::partition("USER#1");
/// let orders = key::KeyCondition::begins_with("USER#1", "ORDER#");
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyCondition {
    /// The partition key value, matched with equality.
    pub partition_key: String,
    /// Optional sort key predicate; `None` matches the whole partition.
    pub sort_key: Option<SortKeyCondition>,
}

impl KeyCondition {
    /// Match the whole partition.
    pub fn partition(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    fn with_sort_key(partition_key: impl Into<String>, sort_key: SortKeyCondition) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: Some(sort_key),
        }
    }

    /// Sort key starts with `prefix`.
    pub fn begins_with(partition_key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::with_sort_key(partition_key, SortKeyCondition::BeginsWith(prefix.into()))
    }

    /// Sort key between `low` and `high`, inclusive.
    pub fn between(
        partition_key: impl Into<String>,
        low: impl Into<String>,
        high: impl Into<String>,
    ) -> Self {
        Self::with_sort_key(
            partition_key,
            SortKeyCondition::Between(low.into(), high.into()),
        )
    }

    /// Sort key equal to `value`.
    pub fn equals(partition_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_sort_key(partition_key, SortKeyCondition::Equals(value.into()))
    }

    /// Sort key greater than `value`.
    pub fn greater_than(partition_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_sort_key(partition_key, SortKeyCondition::GreaterThan(value.into()))
    }

    /// Sort key greater than or equal to `value`.
    pub fn greater_than_or_equal(
        partition_key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::with_sort_key(
            partition_key,
            SortKeyCondition::GreaterThanOrEqual(value.into()),
        )
    }

    /// Sort key less than `value`.
    pub fn less_than(partition_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_sort_key(partition_key, SortKeyCondition::LessThan(value.into()))
    }

    /// Sort key less than or equal to `value`.
    pub fn less_than_or_equal(partition_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_sort_key(
            partition_key,
            SortKeyCondition::LessThanOrEqual(value.into()),
        )
    }

    /// Bind the condition to concrete key columns.
    pub fn resolve(
        self,
        columns: &KeyColumns,
    ) -> Vec<common::condition::AttributeCondition<types::AttributeValue>> {
        let mut conditions = Vec::with_capacity(2);
        conditions.push(common::condition::AttributeCondition {
            condition: common::condition::Condition::Equals(types::AttributeValue::S(
                self.partition_key,
            )),
            name: columns.partition_key.clone(),
        });
        if let Some(sort_key) = self.sort_key {
            conditions.push(common::condition::AttributeCondition {
                condition: sort_key.into(),
                name: columns.sort_key.clone(),
            });
        }
        conditions
    }
}

/// Columns every row carries: the composite primary key and the row type.
///
/// Flatten it into application rows:
///
/// ```rust
/// use dynamodb_single_table::common::key;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize, Serialize)]
/// struct User {
///     #[serde(flatten)]
///     header: key::RowHeader,
///     name: String,
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RowHeader {
    /// Partition key value.
    #[serde(rename = "PK")]
    pub partition_key: String,
    /// Sort key value.
    #[serde(rename = "SK")]
    pub sort_key: String,
    /// Entity type stored in this row.
    #[serde(rename = "RowType")]
    pub row_type: String,
}

impl RowHeader {
    /// The primary key of this row.
    pub fn key(&self) -> PrimaryKey {
        PrimaryKey::new(&self.partition_key, &self.sort_key)
    }
}

macro_rules! index_header {
    ($($header:ident => $partition_key:literal, $sort_key:literal;)*) => {
        $(
            #[doc = concat!("Columns that make a row visible through the `", $partition_key, "`/`", $sort_key, "` index.")]
            #[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
            pub struct $header {
                /// Index partition key value.
                #[serde(rename = $partition_key)]
                pub partition_key: String,
                /// Index sort key value.
                #[serde(rename = $sort_key)]
                pub sort_key: String,
            }
        )*
    };
}

index_header! {
    Gsi1Header => "GSI1PK", "GSI1SK";
    Gsi2Header => "GSI2PK", "GSI2SK";
    Gsi3Header => "GSI3PK", "GSI3SK";
    Gsi4Header => "GSI4PK", "GSI4SK";
    Gsi5Header => "GSI5PK", "GSI5SK";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::condition;

    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_primary_key_to_item() {
        let actual: common::Item = PrimaryKey::new("a", "b").into();
        let expected = common::Item::from([
            ("PK".to_string(), types::AttributeValue::S("a".to_string())),
            ("SK".to_string(), types::AttributeValue::S("b".to_string())),
        ]);
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case::first(1, Index::gsi1())]
    #[case::last(5, Index::gsi5())]
    fn test_gsi(#[case] ordinal: u8, #[case] expected: Index) {
        let actual = Index::gsi(ordinal).unwrap();
        assert_eq!(actual, expected);
        assert_eq!(
            actual.columns.partition_key,
            format!("GSI{ordinal}PK")
        );
    }

    #[rstest]
    #[case::zero(0)]
    #[case::six(6)]
    fn test_gsi_out_of_range(#[case] ordinal: u8) {
        let err = Index::gsi(ordinal).unwrap_err();
        assert_eq!(err.kind(), error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_ordinals() {
        let names: Vec<_> = Index::ordinals().map(|index| index.name).collect();
        assert_eq!(names, ["GSI1", "GSI2", "GSI3", "GSI4", "GSI5"]);
    }

    #[rstest]
    #[case::partition_only(
        KeyCondition::partition("a"),
        KeyColumns::default(),
        vec![
            condition::AttributeCondition {
                condition: condition::Condition::Equals(
                    types::AttributeValue::S(
                        "a".to_string()
                    )
                ),
                name: "PK".to_string(),
            },
        ]
    )]
    #[case::begins_with_on_index(
        KeyCondition::begins_with("a", "b"),
        Index::gsi3().columns,
        vec![
            condition::AttributeCondition {
                condition: condition::Condition::Equals(
                    types::AttributeValue::S(
                        "a".to_string()
                    )
                ),
                name: "GSI3PK".to_string(),
            },
            condition::AttributeCondition {
                condition: condition::Condition::BeginsWith(
                    "b".to_string()
                ),
                name: "GSI3SK".to_string(),
            },
        ]
    )]
    #[case::between(
        KeyCondition::between("a", "b", "c"),
        KeyColumns::default(),
        vec![
            condition::AttributeCondition {
                condition: condition::Condition::Equals(
                    types::AttributeValue::S(
                        "a".to_string()
                    )
                ),
                name: "PK".to_string(),
            },
            condition::AttributeCondition {
                condition: condition::Condition::Between(
                    types::AttributeValue::S(
                        "b".to_string()
                    ),
                    types::AttributeValue::S(
                        "c".to_string()
                    )
                ),
                name: "SK".to_string(),
            },
        ]
    )]
    fn test_key_condition_resolve(
        #[case] key_condition: KeyCondition,
        #[case] columns: KeyColumns,
        #[case] expected: Vec<condition::AttributeCondition<types::AttributeValue>>,
    ) {
        let actual = key_condition.resolve(&columns);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_key_condition_expression() {
        let conditions = KeyCondition::less_than_or_equal("a", "b").resolve(&Index::gsi1().columns);
        let actual = condition::AttributeCondition::get_expression_operation(conditions, &mut 0);
        assert_eq!(
            actual.expression,
            "#GSI1PK = :GSI1PK_eq0 AND #GSI1SK <= :GSI1SK_lte1"
        );
    }

    #[test]
    fn test_row_headers_flatten() {
        #[derive(Debug, Deserialize, PartialEq, Serialize)]
        struct Row {
            #[serde(flatten)]
            header: RowHeader,
            #[serde(flatten)]
            gsi2: Gsi2Header,
            value: String,
        }

        let row = Row {
            header: RowHeader {
                partition_key: "a".to_string(),
                sort_key: "b".to_string(),
                row_type: "c".to_string(),
            },
            gsi2: Gsi2Header {
                partition_key: "d".to_string(),
                sort_key: "e".to_string(),
            },
            value: "f".to_string(),
        };
        let actual = serde_json::to_value(&row).unwrap();
        let expected = json!(
            {
                "PK": "a",
                "SK": "b",
                "RowType": "c",
                "GSI2PK": "d",
                "GSI2SK": "e",
                "value": "f"
            }
        );
        assert_eq!(actual, expected);
        assert_eq!(row.header.key(), PrimaryKey::new("a", "b"));
    }
}
