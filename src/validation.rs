//! Name and label validation.
//!
//! Names and label names match `^[a-zA-Z_:][a-zA-Z0-9_:]*$`; `le` and
//! `quantile` are reserved for histogram and summary label schemas
//! respectively; labels starting with `__` are rejected outright.

use crate::error::{MetricsError, Result};

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

/// Validates a metric or label name against `^[a-zA-Z_:][a-zA-Z0-9_:]*$`.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start(c) => {}
        _ => return false,
    }
    chars.all(is_name_continue)
}

/// Validates a metric family name.
pub(crate) fn validate_metric_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(MetricsError::invalid(format!(
            "\"{name}\" is not a valid metric name"
        )))
    }
}

/// Validates a label name, rejecting reserved `__`-prefixed names and,
/// depending on `kind`, the metric-type-reserved label name (`le` for
/// histograms, `quantile` for summaries).
pub(crate) fn validate_label_name(name: &str, reserved: Option<&str>) -> Result<()> {
    if !is_valid_name(name) {
        return Err(MetricsError::invalid(format!(
            "\"{name}\" is not a valid label name"
        )));
    }
    if name.starts_with("__") {
        return Err(MetricsError::invalid(format!(
            "label name \"{name}\" must not start with \"__\""
        )));
    }
    if Some(name) == reserved {
        return Err(MetricsError::invalid(format!(
            "\"{name}\" is a reserved label name for this metric type"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_metric_names() {
        for name in ["abc", "myMetric2", "a:3", "good_name", "my:metric"] {
            assert!(validate_metric_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_invalid_metric_names() {
        for name in ["my-metric", "my!metric", "%", "5a"] {
            assert!(validate_metric_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn rejects_invalid_label_names() {
        for name in ["my-metric", "my!metric", "my%metric", "__reserved"] {
            assert!(validate_label_name(name, None).is_err(), "{name}");
        }
    }

    #[test]
    fn rejects_reserved_histogram_label() {
        assert!(validate_label_name("le", Some("le")).is_err());
        assert!(validate_label_name("quantile", Some("le")).is_ok());
    }

    #[test]
    fn accepts_good_label_names() {
        for name in ["my:metric", "good_name"] {
            assert!(validate_label_name(name, Some("le")).is_ok(), "{name}");
        }
    }
}
