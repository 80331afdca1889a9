use serde::Serialize;

/// A malformed or unsupported schema construct.
///
/// Form-level variants abort loading of that form. Everything else is
/// reported per field and only that field (and its subtree) is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaError {
    /// A form-level or field-level attribute is absent or has the wrong JSON type.
    #[error("missing or invalid '{field}'")]
    MissingField { field: String },

    #[error("unknown field type '{type_name}'")]
    UnknownFieldType { type_name: String },

    #[error("unknown visibility condition '{condition}'")]
    UnknownCondition { condition: String },

    #[error("unsupported dynamic options method '{method}'")]
    UnsupportedMethod { method: String },

    /// A select with neither `options` nor `dynamicOptions`.
    #[error("select has no option source")]
    MissingOptionSource,

    #[error("options must not be empty")]
    EmptyOptions,

    #[error("duplicate option '{option}'")]
    DuplicateOption { option: String },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("min {min} is greater than max {max}")]
    InvertedRange { min: String, max: String },

    /// Ids are joined with `.` into answer paths, so an id must be
    /// non-empty and dot-free to address exactly one field.
    #[error("invalid field id '{id}': must be non-empty and contain no '.'")]
    InvalidId { id: String },

    #[error("duplicate field id '{id}'")]
    DuplicateId { id: String },

    /// `dependsOn` does not name a value-bearing sibling in the same group.
    /// Dependencies across group levels are not supported.
    #[error("'{depends_on}' is not a sibling field that holds a value")]
    UnknownDependency { depends_on: String },

    /// Lookup of a form id the catalog does not contain.
    #[error("no form with id '{form_id}'")]
    UnknownForm { form_id: String },
}
