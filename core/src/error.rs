use std::path::PathBuf;

use thiserror::Error;

/// Error kinds a caller has to tell apart.
///
/// Everything else travels as a plain `anyhow::Error` with context attached.
/// Incomplete rows in an edit batch are never reported here: the store drops
/// them before writing.
#[derive(Debug, Error)]
pub enum NibbleError {
    #[error("Please provide a valid user")]
    InvalidUser,

    #[error("Storage unavailable at {}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Please select a date range")]
    EmptyDateRange,

    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("'mass' is the reference row, not a nutrient")]
    MassNotANutrient,

    #[error("Invalid item name '{0}': must contain a word character")]
    InvalidItemName(String),

    #[error("Invalid date '{0}'. Use YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Unknown dictionary type '{0}'. Use 'food' or 'nutrient'")]
    UnknownDictionaryKind(String),
}

impl NibbleError {
    /// True for errors caused by the caller's input rather than the system.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        !matches!(self, Self::InvalidUser | Self::StorageUnavailable { .. })
    }
}

impl NibbleError {
    pub(crate) fn storage(
        path: &std::path::Path,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::StorageUnavailable {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }
}

/// Find a `NibbleError` anywhere in an `anyhow` chain.
#[must_use]
pub fn find_nibble_error(err: &anyhow::Error) -> Option<&NibbleError> {
    err.chain().find_map(|cause| cause.downcast_ref::<NibbleError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_find_through_context() {
        let err: anyhow::Error = Err::<(), _>(NibbleError::EmptyDateRange)
            .context("building report")
            .unwrap_err();
        assert!(matches!(
            find_nibble_error(&err),
            Some(NibbleError::EmptyDateRange)
        ));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(NibbleError::EmptyDateRange.is_input_error());
        assert!(NibbleError::MassNotANutrient.is_input_error());
        assert!(!NibbleError::InvalidUser.is_input_error());
    }

    #[test]
    fn test_plain_anyhow_has_no_kind() {
        let err = anyhow::anyhow!("disk on fire");
        assert!(find_nibble_error(&err).is_none());
    }
}
