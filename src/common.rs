//! Common utilities for single-table operations.
//!
//! This module provides shared types used across read and write operations,
//! including key handling, condition expressions, option composition and the
//! pagination cursor codec.

/// Condition expression building for filters and conditional writes.
pub mod condition;

/// Opaque pagination cursor codec.
pub mod cursor;

/// Fixed key columns, secondary indexes and key conditions.
pub mod key;

/// Option composition for single-item operations and queries.
pub mod options;

use aws_sdk_dynamodb::types;
use std::collections;

/// A row in the store's native attribute representation.
pub type Item = collections::HashMap<String, types::AttributeValue>;

/// Placeholder-safe form of an attribute name.
///
/// ASCII letters and digits pass through, `_` is doubled and every other byte
/// becomes `_xx`, so distinct names never share a placeholder.
pub(crate) fn placeholder_identifier(name: &str) -> String {
    let mut identifier = String::with_capacity(name.len());
    for character in name.chars() {
        if character.is_ascii_alphanumeric() {
            identifier.push(character);
        } else if character == '_' {
            identifier.push_str("__");
        } else {
            let mut buffer = [0; 4];
            for byte in character.encode_utf8(&mut buffer).bytes() {
                identifier.push_str(&format!("_{byte:02x}"));
            }
        }
    }
    identifier
}

pub(crate) fn add_placeholder(keys: &[String], identifier: &str) -> (String, Vec<String>) {
    let placeholder = format!("#{}", placeholder_identifier(identifier));
    let mut new_keys = Vec::with_capacity(keys.len() + 1);
    new_keys.extend_from_slice(keys);
    new_keys.push(placeholder.clone());
    (placeholder, new_keys)
}

fn get_expression(left: String, operator: &str, right: String) -> String {
    if left.is_empty() {
        right
    } else if right.is_empty() {
        left
    } else {
        format!("{left}{operator}{right}")
    }
}

/// A rendered expression together with its placeholder maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ExpressionInput {
    pub(crate) expression: String,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: Item,
}

impl ExpressionInput {
    pub(crate) fn merge(operator: &str, items: Vec<Self>) -> Self {
        let mut operation = Self::default();
        for item in items {
            operation
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            operation
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            operation.expression = get_expression(operation.expression, operator, item.expression);
        }
        operation
    }

    /// Move the placeholders into the request maps and hand back the expression.
    pub(crate) fn merge_into(
        self,
        names: &mut Option<collections::HashMap<String, String>>,
        values: &mut Option<Item>,
    ) -> String {
        if !self.expression_attribute_names.is_empty() {
            names
                .get_or_insert_with(collections::HashMap::new)
                .extend(self.expression_attribute_names);
        }
        if !self.expression_attribute_values.is_empty() {
            values
                .get_or_insert_with(collections::HashMap::new)
                .extend(self.expression_attribute_values);
        }
        self.expression
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::both("a", "b", "a AND b")]
    #[case::left_empty("", "b", "b")]
    #[case::right_empty("a", "", "a")]
    fn test_get_expression(#[case] left: &str, #[case] right: &str, #[case] expected: &str) {
        let actual = get_expression(left.to_string(), " AND ", right.to_string());
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case::plain("GSI1PK", "GSI1PK")]
    #[case::underscore("first_name", "first__name")]
    #[case::hyphen("first-name", "first_2dname")]
    #[case::dot_and_space("a.b c", "a_2eb_20c")]
    #[case::non_ascii("é", "_c3_a9")]
    fn test_placeholder_identifier(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(placeholder_identifier(name), expected);
    }

    #[test]
    fn test_placeholders_do_not_collide() {
        let (hyphen, _) = add_placeholder(&[], "a-b");
        let (underscore, _) = add_placeholder(&[], "a_2db");
        assert_eq!(hyphen, "#a_2db");
        assert_eq!(underscore, "#a__2db");
    }

    #[test]
    fn test_merge_into_skips_empty_maps() {
        let operation = ExpressionInput {
            expression: "attribute_exists(#PK)".to_string(),
            expression_attribute_names: collections::HashMap::from([(
                "#PK".to_string(),
                "PK".to_string(),
            )]),
            ..Default::default()
        };
        let mut names = None;
        let mut values = None;
        let expression = operation.merge_into(&mut names, &mut values);
        assert_eq!(expression, "attribute_exists(#PK)");
        assert_eq!(
            names,
            Some(collections::HashMap::from([(
                "#PK".to_string(),
                "PK".to_string()
            )]))
        );
        assert_eq!(values, None);
    }
}
