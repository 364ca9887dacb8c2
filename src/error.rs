use crate::{common, store};

use aws_sdk_dynamodb::types;
use std::{error, fmt};

/// Boxed error used as the source of wrapped failures.
pub type BoxError = Box<dyn error::Error + Send + Sync>;

/// Result alias used by every operation of this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Closed set of error kinds, for callers that branch on the kind only.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// A point lookup or query returned zero items.
    NotFound,
    /// The caller misused the API; nothing was sent.
    InvalidArgument,
    /// A single-item write condition was not satisfied.
    ConditionFailed,
    /// A multi-item write was aborted as a whole.
    TransactionCanceled,
    /// Conversion between rows and native attribute maps, or the cursor codec, failed.
    Internal,
    /// The storage engine call itself failed.
    Transport,
}

/// Why one item of a canceled transaction was rejected.
///
/// Only the key columns of the item are kept, never its payload.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CancellationReason {
    /// Cancellation code, `"None"` for items that did not cause the cancellation.
    pub code: Option<String>,
    /// Cancellation message.
    pub message: Option<String>,
    /// Partition key of the offending item, when the store reported it.
    pub partition_key: Option<String>,
    /// Sort key of the offending item, when the store reported it.
    pub sort_key: Option<String>,
}

impl CancellationReason {
    /// Whether this item caused the transaction to be canceled.
    pub fn is_failure(&self) -> bool {
        !matches!(self.code.as_deref(), None | Some("None"))
    }
}

impl From<types::CancellationReason> for CancellationReason {
    fn from(reason: types::CancellationReason) -> Self {
        let key_column = |name: &str| {
            reason
                .item
                .as_ref()
                .and_then(|item| item.get(name))
                .and_then(|value| value.as_s().ok())
                .cloned()
        };
        let partition_key = key_column(common::key::PARTITION_KEY);
        let sort_key = key_column(common::key::SORT_KEY);
        Self {
            code: reason.code,
            message: reason.message,
            partition_key,
            sort_key,
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(3);
        if let Some(code) = &self.code {
            parts.push(format!("code: {code}"));
        }
        if let Some(message) = &self.message {
            parts.push(format!("message: {message}"));
        }
        if self.partition_key.is_some() || self.sort_key.is_some() {
            parts.push(format!(
                "item: PK: {}; SK: {}",
                self.partition_key.as_deref().unwrap_or_default(),
                self.sort_key.as_deref().unwrap_or_default()
            ));
        }
        f.write_str(&parts.join("; "))
    }
}

fn display_cancellation(message: &Option<String>, reasons: &[CancellationReason]) -> String {
    let mut parts = Vec::with_capacity(reasons.len() + 1);
    if let Some(message) = message {
        parts.push(message.clone());
    }
    parts.extend(
        reasons
            .iter()
            .filter(|reason| reason.is_failure())
            .map(ToString::to_string),
    );
    parts.join("; ")
}

/// Errors returned by table operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A point lookup or query returned zero items.
    #[error("{operation}: not found")]
    NotFound {
        /// The operation that failed.
        operation: &'static str,
    },
    /// The caller misused the API; rejected before any request was sent.
    #[error("{operation}: invalid argument: {message}")]
    InvalidArgument {
        /// The operation that failed.
        operation: &'static str,
        /// What was wrong.
        message: String,
    },
    /// A single-item write condition was not satisfied by the stored item.
    #[error("{operation}: condition failed")]
    ConditionFailed {
        /// The operation that failed.
        operation: &'static str,
    },
    /// A transactional write was canceled; nothing was applied.
    #[error("{operation}: transaction canceled: {}", display_cancellation(.message, .reasons))]
    TransactionCanceled {
        /// The operation that failed.
        operation: &'static str,
        /// Message reported by the store.
        message: Option<String>,
        /// One reason per transaction item, in request order.
        reasons: Vec<CancellationReason>,
    },
    /// Marshaling, unmarshaling or cursor codec failure.
    #[error("{operation}: {source}")]
    Internal {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying failure.
        source: BoxError,
    },
    /// The storage engine call failed.
    #[error("{operation}: {source}")]
    Transport {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying failure.
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn invalid_argument(operation: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation,
            message: message.into(),
        }
    }

    pub(crate) fn internal(
        operation: &'static str,
        source: impl error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            operation,
            source: Box::new(source),
        }
    }

    /// Reclassify a storage engine failure into this crate's taxonomy.
    pub(crate) fn from_store(operation: &'static str, err: store::StoreError) -> Self {
        match err {
            store::StoreError::ConditionalCheckFailed => Self::ConditionFailed { operation },
            store::StoreError::TransactionCanceled { message, reasons } => {
                Self::TransactionCanceled {
                    operation,
                    message,
                    reasons: reasons.into_iter().map(CancellationReason::from).collect(),
                }
            }
            store::StoreError::Service(source) => Self::Transport { operation, source },
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::ConditionFailed { .. } => ErrorKind::ConditionFailed,
            Self::TransactionCanceled { .. } => ErrorKind::TransactionCanceled,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// The name of the operation that produced this error.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::NotFound { operation }
            | Self::InvalidArgument { operation, .. }
            | Self::ConditionFailed { operation }
            | Self::TransactionCanceled { operation, .. }
            | Self::Internal { operation, .. }
            | Self::Transport { operation, .. } => operation,
        }
    }

    /// Cancellation reasons, when this is a canceled transaction.
    pub fn cancellation_reasons(&self) -> &[CancellationReason] {
        match self {
            Self::TransactionCanceled { reasons, .. } => reasons,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::collections;

    fn reason(code: &str, item: Option<common::Item>) -> types::CancellationReason {
        types::CancellationReason::builder()
            .code(code)
            .message("m")
            .set_item(item)
            .build()
    }

    #[test]
    fn test_cancellation_reason_keeps_key_columns_only() {
        let item = collections::HashMap::from([
            ("PK".to_string(), types::AttributeValue::S("a".to_string())),
            ("SK".to_string(), types::AttributeValue::S("b".to_string())),
            (
                "secret".to_string(),
                types::AttributeValue::S("do not print".to_string()),
            ),
        ]);
        let actual = CancellationReason::from(reason("ConditionalCheckFailed", Some(item)));
        let expected = CancellationReason {
            code: Some("ConditionalCheckFailed".to_string()),
            message: Some("m".to_string()),
            partition_key: Some("a".to_string()),
            sort_key: Some("b".to_string()),
        };
        assert_eq!(actual, expected);
        assert!(!actual.to_string().contains("do not print"));
    }

    #[test]
    fn test_transaction_canceled_display_lists_failures_only() {
        let err = Error::from_store(
            "transact_puts",
            store::StoreError::TransactionCanceled {
                message: Some("Transaction cancelled".to_string()),
                reasons: vec![
                    reason("None", None),
                    reason(
                        "ConditionalCheckFailed",
                        Some(collections::HashMap::from([
                            ("PK".to_string(), types::AttributeValue::S("c".to_string())),
                            ("SK".to_string(), types::AttributeValue::S("d".to_string())),
                        ])),
                    ),
                ],
            },
        );
        assert_eq!(err.kind(), ErrorKind::TransactionCanceled);
        assert_eq!(err.cancellation_reasons().len(), 2);
        assert_eq!(
            err.to_string(),
            "transact_puts: transaction canceled: Transaction cancelled; code: ConditionalCheckFailed; message: m; item: PK: c; SK: d"
        );
    }

    #[rstest]
    #[case::condition(store::StoreError::ConditionalCheckFailed, ErrorKind::ConditionFailed)]
    #[case::service(store::StoreError::Service("boom".into()), ErrorKind::Transport)]
    #[case::canceled(
        store::StoreError::TransactionCanceled { message: None, reasons: Vec::new() },
        ErrorKind::TransactionCanceled
    )]
    fn test_from_store(#[case] err: store::StoreError, #[case] expected: ErrorKind) {
        let actual = Error::from_store("put_item", err);
        assert_eq!(actual.kind(), expected);
        assert_eq!(actual.operation(), "put_item");
    }
}
