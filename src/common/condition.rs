use crate::{common, error};

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use serde::Serialize;
use serde_dynamo::{Result, to_attribute_value};
use std::{collections, ops};

/// Logical operator for combining conditions.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalOperator {
    /// Logical AND - all conditions must be true.
    And,
    /// Logical OR - at least one condition must be true.
    Or,
}

impl ops::Deref for LogicalOperator {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// Condition types for DynamoDB expressions.
///
/// ```rust
/// use dynamodb_single_table::common::condition;
///
/// let eq = condition::Condition::Equals("value".to_string());
/// let gt = condition::Condition::GreaterThan(100);
/// let null: condition::Condition<String> = condition::Condition::Null;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition<T> {
    /// Checks if an attribute begins with a specified prefix (string types only).
    BeginsWith(String),
    /// Checks if an attribute value is between two values (inclusive).
    Between(T, T),
    /// Checks if an attribute contains a specified value.
    Contains(T),
    /// Checks if an attribute value equals a specified value.
    Equals(T),
    /// Checks if an attribute value is greater than a specified value.
    GreaterThan(T),
    /// Checks if an attribute value is greater than or equal to a specified value.
    GreaterThanOrEqual(T),
    /// Checks if an attribute value is in a list of specified values.
    In(Vec<T>),
    /// Checks if an attribute value is less than a specified value.
    LessThan(T),
    /// Checks if an attribute value is less than or equal to a specified value.
    LessThanOrEqual(T),
    /// Checks if an attribute does not contain a specified value.
    NotContains(T),
    /// Checks if an attribute value does not equal a specified value.
    NotEqual(T),
    /// Checks if an attribute exists (is not null).
    NotNull,
    /// Checks if an attribute does not exist (is null).
    Null,
}

impl<T: Serialize> Condition<T> {
    /// Marshal the operands into native attribute values.
    pub fn into_attribute_values(self) -> Result<Condition<types::AttributeValue>> {
        let condition = match self {
            Self::BeginsWith(prefix) => Condition::BeginsWith(prefix),
            Self::Between(low, high) => {
                Condition::Between(to_attribute_value(low)?, to_attribute_value(high)?)
            }
            Self::Contains(value) => Condition::Contains(to_attribute_value(value)?),
            Self::Equals(value) => Condition::Equals(to_attribute_value(value)?),
            Self::GreaterThan(value) => Condition::GreaterThan(to_attribute_value(value)?),
            Self::GreaterThanOrEqual(value) => {
                Condition::GreaterThanOrEqual(to_attribute_value(value)?)
            }
            Self::In(values) => Condition::In(
                values
                    .into_iter()
                    .map(to_attribute_value)
                    .collect::<Result<_>>()?,
            ),
            Self::LessThan(value) => Condition::LessThan(to_attribute_value(value)?),
            Self::LessThanOrEqual(value) => Condition::LessThanOrEqual(to_attribute_value(value)?),
            Self::NotContains(value) => Condition::NotContains(to_attribute_value(value)?),
            Self::NotEqual(value) => Condition::NotEqual(to_attribute_value(value)?),
            Self::NotNull => Condition::NotNull,
            Self::Null => Condition::Null,
        };
        Ok(condition)
    }
}

impl Condition<types::AttributeValue> {
    fn get_expression(
        self,
        key: &str,
        key_placeholder: &str,
        index: &mut usize,
    ) -> (String, common::Item) {
        let mut expression_attribute_values = collections::HashMap::new();
        let identifier = common::placeholder_identifier(key);
        let mut value_placeholder = |operator: &str, value: types::AttributeValue| {
            let placeholder = format!(":{identifier}_{operator}{index}");
            *index += 1;
            expression_attribute_values.insert(placeholder.clone(), value);
            placeholder
        };
        let expression = match self {
            Self::BeginsWith(prefix) => {
                let placeholder =
                    value_placeholder("begins_with", types::AttributeValue::S(prefix));
                format!("begins_with({key_placeholder}, {placeholder})")
            }
            Self::Between(low, high) => {
                let low = value_placeholder("between", low);
                let high = value_placeholder("between", high);
                format!("{key_placeholder} BETWEEN {low} AND {high}")
            }
            Self::Contains(value) => {
                let placeholder = value_placeholder("contains", value);
                format!("contains({key_placeholder}, {placeholder})")
            }
            Self::Equals(value) => {
                let placeholder = value_placeholder("eq", value);
                format!("{key_placeholder} = {placeholder}")
            }
            Self::GreaterThan(value) => {
                let placeholder = value_placeholder("gt", value);
                format!("{key_placeholder} > {placeholder}")
            }
            Self::GreaterThanOrEqual(value) => {
                let placeholder = value_placeholder("gte", value);
                format!("{key_placeholder} >= {placeholder}")
            }
            Self::In(values) => {
                let placeholders: Vec<_> = values
                    .into_iter()
                    .map(|value| value_placeholder("in", value))
                    .collect();
                format!("{key_placeholder} IN ({})", placeholders.join(", "))
            }
            Self::LessThan(value) => {
                let placeholder = value_placeholder("lt", value);
                format!("{key_placeholder} < {placeholder}")
            }
            Self::LessThanOrEqual(value) => {
                let placeholder = value_placeholder("lte", value);
                format!("{key_placeholder} <= {placeholder}")
            }
            Self::NotContains(value) => {
                let placeholder = value_placeholder("not_contains", value);
                format!("NOT contains({key_placeholder}, {placeholder})")
            }
            Self::NotEqual(value) => {
                let placeholder = value_placeholder("ne", value);
                format!("{key_placeholder} <> {placeholder}")
            }
            Self::NotNull => format!("attribute_exists({key_placeholder})"),
            Self::Null => format!("attribute_not_exists({key_placeholder})"),
        };
        (expression, expression_attribute_values)
    }
}

/// Condition applied to a named attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeCondition<T> {
    /// The condition to apply to the attribute.
    pub condition: Condition<T>,
    /// The name of the attribute to apply the condition to.
    pub name: String,
}

impl<T: Serialize> AttributeCondition<T> {
    /// Marshal the operands into native attribute values.
    pub fn into_attribute_values(self) -> Result<AttributeCondition<types::AttributeValue>> {
        let attribute_condition = AttributeCondition {
            condition: self.condition.into_attribute_values()?,
            name: self.name,
        };
        Ok(attribute_condition)
    }
}

impl AttributeCondition<types::AttributeValue> {
    /// Render top-level conditions joined with `AND`, as used by key conditions.
    pub(crate) fn get_expression_operation(
        conditions: Vec<Self>,
        index: &mut usize,
    ) -> common::ExpressionInput {
        let mut expressions = Vec::with_capacity(conditions.len());
        let mut expression_attribute_names = collections::HashMap::with_capacity(conditions.len());
        let mut expression_attribute_values = collections::HashMap::new();
        for attribute_condition in conditions {
            let (placeholder, _) = common::add_placeholder(&[], &attribute_condition.name);
            let (expression, condition_expression_attribute_values) = attribute_condition
                .condition
                .get_expression(&attribute_condition.name, &placeholder, index);
            expressions.push(expression);
            expression_attribute_names.insert(placeholder, attribute_condition.name);
            expression_attribute_values.extend(condition_expression_attribute_values);
        }
        common::ExpressionInput {
            expression: expressions.join(&*LogicalOperator::And),
            expression_attribute_names,
            expression_attribute_values,
        }
    }
}

/// Map of conditions with logical operators.
///
/// ```rust
/// use dynamodb_single_table::common::condition;
///
/// let map = condition::ConditionMap::Leaves(
///     condition::LogicalOperator::And,
///     vec![
///         condition::AttributeCondition {
///             name: "status".to_string(),
///             condition: condition::Condition::Equals("active".to_string()),
///         },
///     ],
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionMap<T> {
    /// Leaf conditions - flat list of conditions combined with the logical operator.
    Leaves(LogicalOperator, Vec<AttributeCondition<T>>),
    /// Node conditions - nested conditions for hierarchical attribute paths.
    Node(LogicalOperator, IndexMap<String, ConditionMap<T>>),
}

impl<T> ConditionMap<T> {
    fn partition_key(condition: Condition<T>) -> Self {
        Self::Leaves(
            LogicalOperator::And,
            vec![AttributeCondition {
                condition,
                name: common::key::PARTITION_KEY.to_string(),
            }],
        )
    }

    /// The item must already exist.
    pub fn item_exists() -> Self {
        Self::partition_key(Condition::NotNull)
    }

    /// The item must not exist yet.
    pub fn item_not_exists() -> Self {
        Self::partition_key(Condition::Null)
    }
}

impl<T: Serialize> ConditionMap<T> {
    /// Marshal every operand of the tree into native attribute values.
    pub fn into_attribute_values(self) -> Result<ConditionMap<types::AttributeValue>> {
        let condition_map = match self {
            Self::Leaves(operator, leaves) => ConditionMap::Leaves(
                operator,
                leaves
                    .into_iter()
                    .map(AttributeCondition::into_attribute_values)
                    .collect::<Result<_>>()?,
            ),
            Self::Node(operator, map) => {
                let mut converted = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    converted.insert(key, value.into_attribute_values()?);
                }
                ConditionMap::Node(operator, converted)
            }
        };
        Ok(condition_map)
    }
}

impl From<ConditionMap<types::AttributeValue>> for common::ExpressionInput {
    fn from(condition_map: ConditionMap<types::AttributeValue>) -> Self {
        condition_map.get_expression_operation_recursive(&[], &mut 0, false)
    }
}

impl<T> ConditionMap<T> {
    /// Whether some branch of the tree holds no condition at all.
    pub(crate) fn has_empty_branch(&self) -> bool {
        match self {
            Self::Leaves(_, leaves) => leaves.is_empty(),
            Self::Node(_, map) => map.is_empty() || map.values().any(Self::has_empty_branch),
        }
    }
}

impl ConditionMap<types::AttributeValue> {
    fn is_composite(&self, is_nested: bool) -> bool {
        match self {
            Self::Leaves(_, leaves) => is_nested && leaves.len() > 1,
            Self::Node(_, map) => {
                let has_multiple_keys = map.len() > 1;
                let child_is_nested = is_nested || has_multiple_keys;
                for value in map.values() {
                    if value.is_composite(child_is_nested) {
                        // a composite child is wrapped on its own
                        return false;
                    }
                }
                is_nested && has_multiple_keys
            }
        }
    }

    pub(crate) fn get_expression_operation_recursive(
        self,
        keys: &[String],
        index: &mut usize,
        mut is_nested: bool,
    ) -> common::ExpressionInput {
        let mut operations = Vec::new();
        let is_composite = self.is_composite(is_nested);
        let operator = match self {
            Self::Leaves(operator, attribute_conditions) => {
                for attribute_condition in attribute_conditions {
                    let (placeholder, new_keys) =
                        common::add_placeholder(keys, &attribute_condition.name);
                    let key_placeholder = new_keys.join(".");
                    let (expression, expression_attribute_values) = attribute_condition
                        .condition
                        .get_expression(&attribute_condition.name, &key_placeholder, index);
                    let expression_attribute_names =
                        collections::HashMap::from([(placeholder, attribute_condition.name)]);
                    operations.push(common::ExpressionInput {
                        expression,
                        expression_attribute_names,
                        expression_attribute_values,
                    });
                }
                operator
            }
            Self::Node(operator, map) => {
                operations.reserve(map.len());
                is_nested = is_nested || map.len() > 1;
                for (key, value) in map {
                    let (placeholder, new_keys) = common::add_placeholder(keys, &key);
                    let mut condition_operation =
                        value.get_expression_operation_recursive(&new_keys, index, is_nested);
                    condition_operation
                        .expression_attribute_names
                        .insert(placeholder, key);
                    operations.push(condition_operation);
                }
                operator
            }
        };
        let mut operation = common::ExpressionInput::merge(&operator, operations);
        if is_composite {
            operation.expression = format!("({})", operation.expression);
        }
        operation
    }
}

/// A non-empty conjunction of condition trees.
///
/// Every condition added with [`ConditionExpression::and`] must hold for the
/// whole expression to hold.
///
/// ```rust
/// use dynamodb_single_table::common::condition::{ConditionExpression, ConditionMap};
///
/// let expression = ConditionExpression::new(ConditionMap::item_exists())
///     .and(ConditionMap::item_not_exists());
/// assert_eq!(expression.len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionExpression {
    conditions: Vec<ConditionMap<types::AttributeValue>>,
}

impl ConditionExpression {
    /// Start a conjunction with a first condition.
    pub fn new(condition: ConditionMap<types::AttributeValue>) -> Self {
        Self {
            conditions: vec![condition],
        }
    }

    /// Conjoin one more condition, returning the combined expression.
    #[must_use]
    pub fn and(mut self, condition: ConditionMap<types::AttributeValue>) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Conjoin an optional accumulator with one more condition.
    pub(crate) fn and_optional(
        accumulator: Option<Self>,
        condition: ConditionMap<types::AttributeValue>,
    ) -> Self {
        match accumulator {
            Some(accumulator) => accumulator.and(condition),
            None => Self::new(condition),
        }
    }

    /// The item must already exist.
    pub fn item_exists() -> Self {
        Self::new(ConditionMap::item_exists())
    }

    /// The item must not exist yet.
    pub fn item_not_exists() -> Self {
        Self::new(ConditionMap::item_not_exists())
    }

    /// Number of conjoined conditions.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Always `false`: a condition expression holds at least one condition.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether some conjoined condition has a branch with no condition.
    pub(crate) fn has_empty_branch(&self) -> bool {
        self.conditions.iter().any(ConditionMap::has_empty_branch)
    }

    /// The conjoined conditions, in the order they were added.
    pub fn conditions(&self) -> &[ConditionMap<types::AttributeValue>] {
        &self.conditions
    }

    /// Render with a placeholder counter shared by the rest of the request.
    pub(crate) fn into_expression_input(self, index: &mut usize) -> common::ExpressionInput {
        let is_conjunction = self.conditions.len() > 1;
        let operations = self
            .conditions
            .into_iter()
            .map(|condition| {
                let mut operation = condition.get_expression_operation_recursive(&[], index, false);
                if is_conjunction {
                    operation.expression = format!("({})", operation.expression);
                }
                operation
            })
            .collect();
        common::ExpressionInput::merge(&LogicalOperator::And, operations)
    }
}

impl<T: Serialize> TryFrom<ConditionMap<T>> for ConditionExpression {
    type Error = error::Error;

    fn try_from(condition_map: ConditionMap<T>) -> error::Result<Self> {
        let condition_map = condition_map
            .into_attribute_values()
            .map_err(|err| error::Error::internal("condition", err))?;
        Ok(Self::new(condition_map))
    }
}
