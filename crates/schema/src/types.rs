//! Typed structs describing a form schema.
//!
//! These are pure data. Loading from JSON (and rejecting malformed fields)
//! lives in [`crate::deserialize`]; every consumer walks these trees
//! read-only.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::SchemaError;

/// A form as served by the remote catalog. The root acts as an implicit group.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub form_id: String,
    pub title: String,
    pub fields: Vec<FieldDefinition>,
}

impl Form {
    /// Depth-first walk over every field, groups included.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a FieldDefinition)) {
        walk_fields(&self.fields, visit);
    }
}

fn walk_fields<'a>(fields: &'a [FieldDefinition], visit: &mut impl FnMut(&'a FieldDefinition)) {
    for field in fields {
        visit(field);
        if let FieldKind::Group { fields } = &field.kind {
            walk_fields(fields, visit);
        }
    }
}

/// A form together with the field-level problems found while loading it.
///
/// Fields listed in `issues` were dropped from `form`; the rest of the
/// form is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedForm {
    pub form: Form,
    pub issues: Vec<SchemaIssue>,
}

/// A field that could not be loaded, addressed by its dotted path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaIssue {
    pub path: String,
    pub error: SchemaError,
}

// ── Fields ──────────────────────────────────────────────────────────

/// One node of the schema tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Unique among siblings.
    pub id: String,
    pub label: String,
    pub required: bool,
    pub visibility: Option<Visibility>,
    pub kind: FieldKind,
}

impl FieldDefinition {
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Groups carry no value of their own.
    pub fn holds_value(&self) -> bool {
        !matches!(self.kind, FieldKind::Group { .. })
    }

    /// The dynamic option descriptor, for selects that have one.
    pub fn dynamic_options(&self) -> Option<&DynamicOptions> {
        match &self.kind {
            FieldKind::Select {
                source: SelectSource::Dynamic(dynamic),
            } => Some(dynamic),
            _ => None,
        }
    }

    /// Child fields of a group, empty for every other kind.
    pub fn children(&self) -> &[FieldDefinition] {
        match &self.kind {
            FieldKind::Group { fields } => fields,
            _ => &[],
        }
    }
}

/// Type-specific part of a field, discriminated by the JSON `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text(TextValidation),
    Number(NumberValidation),
    Radio { options: Vec<String> },
    Checkbox { options: Vec<String> },
    Date,
    Select { source: SelectSource },
    Group { fields: Vec<FieldDefinition> },
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text(_) => "text",
            FieldKind::Number(_) => "number",
            FieldKind::Radio { .. } => "radio",
            FieldKind::Checkbox { .. } => "checkbox",
            FieldKind::Date => "date",
            FieldKind::Select { .. } => "select",
            FieldKind::Group { .. } => "group",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextValidation {
    /// Regular expression source; the whole value must match.
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberValidation {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

/// Where a select gets its options from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectSource {
    Static(Vec<String>),
    Dynamic(DynamicOptions),
}

/// Options fetched from `endpoint`, keyed by the current value of the
/// sibling `depends_on`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicOptions {
    pub depends_on: String,
    pub endpoint: String,
    pub method: HttpMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            other => Err(SchemaError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

// ── Visibility ──────────────────────────────────────────────────────

/// Show the field only while the sibling `depends_on` satisfies `condition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub depends_on: String,
    pub condition: Condition,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equals,
}

impl Condition {
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        match s {
            "equals" => Ok(Condition::Equals),
            other => Err(SchemaError::UnknownCondition {
                condition: other.to_string(),
            }),
        }
    }
}
