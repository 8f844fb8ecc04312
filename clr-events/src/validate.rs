//! Payload size checks, run once per received record.
//!
//! A failed check is a diagnostic. Decoding goes on with best-effort values.

use std::fmt;

use crate::catalog::RecordKind;
use crate::layout;
use crate::raw::RawRecord;
use crate::record::{FieldAccess, RecordView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Ok,
    /// A known version whose payload is not exactly the predicted size.
    LengthMismatch { expected: usize, actual: usize },
    /// A version newer than the catalog knows, shorter than the layout it
    /// must extend.
    Truncated { minimum: usize, actual: usize },
    /// A historical payload that reuses this event id with another layout.
    LegacyShape { actual: usize },
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok)
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Ok => f.write_str("ok"),
            Validation::LengthMismatch { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
            Validation::Truncated { minimum, actual } => {
                write!(f, "expected at least {} bytes, got {}", minimum, actual)
            }
            Validation::LegacyShape { actual } => {
                write!(f, "legacy {}-byte layout", actual)
            }
        }
    }
}

/// True when the payload has one of the kind's known legacy lengths and
/// not the length its current layout predicts.
pub fn is_legacy_shape(kind: &RecordKind, raw: &RawRecord) -> bool {
    kind.legacy_lengths.contains(&raw.len())
        && layout::predicted_len(raw, kind.fields, raw.version()) != raw.len()
}

pub fn check(view: &RecordView) -> Validation {
    let kind = view.kind();
    let actual = view.len();
    let result = if kind.fields.is_empty() {
        // No layout to check the payload against.
        Validation::Ok
    } else if is_legacy_shape(kind, &view.raw()) {
        Validation::LegacyShape { actual }
    } else {
        let predicted = view.predicted_len();
        if view.version() <= kind.max_version {
            if predicted == actual {
                Validation::Ok
            } else {
                Validation::LengthMismatch {
                    expected: predicted,
                    actual,
                }
            }
        } else if actual >= predicted {
            Validation::Ok
        } else {
            Validation::Truncated {
                minimum: predicted,
                actual,
            }
        }
    };

    match result {
        Validation::Ok => {}
        Validation::LegacyShape { .. } => {
            log::debug!("{} v{}: {}", kind.event_name, view.version(), result)
        }
        _ => log::warn!(
            "{}/{} v{}: {}",
            kind.provider_name,
            kind.event_name,
            view.version(),
            result
        ),
    }
    result
}
