use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::envelope::AcquisitionResult;
use crate::tracker::FormSpec;

/// Placeholder posted for any value that could not be obtained.
pub const NOT_FOUND: &str = "Not Found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    Count(u64),
    NotFound,
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::NotFound => f.write_str(NOT_FOUND),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Count(n) => serializer.serialize_u64(*n),
            FieldValue::NotFound => serializer.serialize_str(NOT_FOUND),
        }
    }
}

/// Flat label to value map for one external form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSubmission {
    pub form: String,
    pub url: String,
    pub values: BTreeMap<String, FieldValue>,
}

impl FormSubmission {
    #[must_use]
    pub fn not_found_count(&self) -> usize {
        self.values
            .values()
            .filter(|v| **v == FieldValue::NotFound)
            .count()
    }
}

/// Map acquisition results onto the labelled fields of `form`.
///
/// Every field of the form gets a value. A field whose target is absent from
/// `results`, did not succeed, or lacks the metric maps to
/// [`FieldValue::NotFound`].
#[must_use]
pub fn build_submission(form: &FormSpec, results: &[AcquisitionResult]) -> FormSubmission {
    let values = form
        .fields
        .iter()
        .map(|field| {
            let value = results
                .iter()
                .find(|r| r.target() == field.target)
                .filter(|r| r.is_success())
                .and_then(|r| r.metric(&field.metric))
                .map_or(FieldValue::NotFound, FieldValue::Count);
            (field.label.clone(), value)
        })
        .collect();

    FormSubmission {
        form: form.name.clone(),
        url: form.url.clone(),
        values,
    }
}
