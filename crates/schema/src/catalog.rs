//! The form catalog: every form the backend serves, plus list summaries.

use serde::Serialize;

use crate::error::SchemaError;
use crate::types::{FieldDefinition, Form, LoadedForm};

/// All forms loaded from one catalog response.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub forms: Vec<LoadedForm>,
    /// Forms that could not be loaded at all, by position in the response.
    pub rejected: Vec<RejectedForm>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedForm {
    pub index: usize,
    pub form_id: Option<String>,
    pub error: SchemaError,
}

/// One row of the forms list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSummary {
    pub form_id: String,
    pub title: String,
    pub total_fields: usize,
    pub required_fields: usize,
    /// 1-based position in the catalog.
    pub order: usize,
}

/// Load a catalog response (a JSON array of forms).
///
/// A form that fails form-level loading is recorded in `rejected` and
/// skipped; the remaining forms are still returned.
pub fn load_catalog(value: &serde_json::Value) -> Result<Catalog, SchemaError> {
    let arr = value.as_array().ok_or_else(|| SchemaError::MissingField {
        field: "forms".to_string(),
    })?;

    let mut catalog = Catalog::default();
    for (index, obj) in arr.iter().enumerate() {
        match Form::from_json(obj) {
            Ok(loaded) => catalog.forms.push(loaded),
            Err(error) => {
                let form_id = obj
                    .get("formId")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                tracing::warn!(index, ?form_id, %error, "skipping form");
                catalog.rejected.push(RejectedForm {
                    index,
                    form_id,
                    error,
                });
            }
        }
    }
    Ok(catalog)
}

impl Catalog {
    pub fn find(&self, form_id: &str) -> Option<&LoadedForm> {
        self.forms.iter().find(|f| f.form.form_id == form_id)
    }

    pub fn summaries(&self) -> Vec<FormSummary> {
        self.forms
            .iter()
            .enumerate()
            .map(|(i, loaded)| summarize(&loaded.form, i + 1))
            .collect()
    }
}

/// Count every field (groups and nested fields included) and the required ones.
pub fn summarize(form: &Form, order: usize) -> FormSummary {
    let (total_fields, required_fields) = count_fields(&form.fields);
    FormSummary {
        form_id: form.form_id.clone(),
        title: form.title.clone(),
        total_fields,
        required_fields,
        order,
    }
}

fn count_fields(fields: &[FieldDefinition]) -> (usize, usize) {
    fields.iter().fold((0, 0), |(total, required), field| {
        let (nested_total, nested_required) = count_fields(field.children());
        (
            total + 1 + nested_total,
            required + usize::from(field.required) + nested_required,
        )
    })
}
