//! Per-field validation rules.
//!
//! Rules run in a fixed order and only the first failure is reported:
//! `required` first, then the type-specific rule (`pattern` for text,
//! `min`/`max` for numbers). Empty optional values are valid.

use std::collections::HashMap;

use dynform_schema::{anchored_pattern, FieldDefinition, FieldKind, Form};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::value::AnswerValue;

/// Why a field's answer was rejected. Displays as an English message;
/// [`ValidationError::message_key`] gives a key for localization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("Please select {field}")]
    SelectRequired { field: String },

    #[error("{field} has an invalid format")]
    InvalidFormat { field: String },

    #[error("{field} must be at least {min}")]
    BelowMin { field: String, min: Decimal },

    #[error("{field} must be at most {max}")]
    AboveMax { field: String, max: Decimal },

    #[error("{field} must be a number")]
    NotANumber { field: String },
}

impl ValidationError {
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationError::Required { .. } => "formDetails.validation.required",
            ValidationError::SelectRequired { .. } => "formDetails.validation.select",
            ValidationError::InvalidFormat { .. } => "formDetails.validation.invalidFormat",
            ValidationError::BelowMin { .. } => "formDetails.validation.min",
            ValidationError::AboveMax { .. } => "formDetails.validation.max",
            ValidationError::NotANumber { .. } => "formDetails.validation.number",
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Validates answers, holding the compiled patterns of one form.
#[derive(Debug, Default)]
pub struct Validator {
    patterns: HashMap<String, Regex>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every text pattern in `form` up front.
    pub fn for_form(form: &Form) -> Self {
        let mut patterns = HashMap::new();
        form.walk(&mut |field| {
            if let FieldKind::Text(text) = &field.kind {
                if let Some(pattern) = &text.pattern {
                    if let Ok(re) = Regex::new(&anchored_pattern(pattern)) {
                        patterns.insert(pattern.clone(), re);
                    }
                }
            }
        });
        Validator { patterns }
    }

    /// Validate one field's answer. Groups have no rules of their own.
    pub fn validate(&self, field: &FieldDefinition, value: Option<&AnswerValue>) -> ValidationResult {
        if matches!(field.kind, FieldKind::Group { .. }) {
            return Ok(());
        }

        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return if field.required {
                Err(required_error(field))
            } else {
                Ok(())
            };
        };

        match &field.kind {
            FieldKind::Text(text) => match &text.pattern {
                Some(pattern) if !self.matches(pattern, &value.to_string()) => {
                    Err(ValidationError::InvalidFormat {
                        field: field.label.clone(),
                    })
                }
                _ => Ok(()),
            },
            FieldKind::Number(range) => {
                let n = value.as_decimal().ok_or_else(|| ValidationError::NotANumber {
                    field: field.label.clone(),
                })?;
                if let Some(min) = range.min {
                    if n < min {
                        return Err(ValidationError::BelowMin {
                            field: field.label.clone(),
                            min,
                        });
                    }
                }
                if let Some(max) = range.max {
                    if n > max {
                        return Err(ValidationError::AboveMax {
                            field: field.label.clone(),
                            max,
                        });
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn matches(&self, pattern: &str, text: &str) -> bool {
        match self.patterns.get(pattern) {
            Some(re) => re.is_match(text),
            // Patterns outside the compiled form; a broken one never matches.
            None => Regex::new(&anchored_pattern(pattern))
                .map(|re| re.is_match(text))
                .unwrap_or(false),
        }
    }
}

fn required_error(field: &FieldDefinition) -> ValidationError {
    match field.kind {
        FieldKind::Radio { .. } | FieldKind::Checkbox { .. } => ValidationError::SelectRequired {
            field: field.label.clone(),
        },
        // Selects share the plain required message.
        _ => ValidationError::Required {
            field: field.label.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynform_schema::{NumberValidation, SelectSource, TextValidation};

    fn text_field(required: bool, pattern: Option<&str>) -> FieldDefinition {
        FieldDefinition {
            id: "zip".to_string(),
            label: "Zip Code".to_string(),
            required,
            visibility: None,
            kind: FieldKind::Text(TextValidation {
                pattern: pattern.map(|p| p.to_string()),
            }),
        }
    }

    fn number_field(min: Option<i64>, max: Option<i64>) -> FieldDefinition {
        FieldDefinition {
            id: "n".to_string(),
            label: "Count".to_string(),
            required: false,
            visibility: None,
            kind: FieldKind::Number(NumberValidation {
                min: min.map(Decimal::from),
                max: max.map(Decimal::from),
            }),
        }
    }

    #[test]
    fn zip_pattern() {
        let v = Validator::new();
        let required = text_field(true, Some("^[0-9]{5}$"));
        assert_eq!(v.validate(&required, Some(&"12345".into())), Ok(()));
        assert_eq!(
            v.validate(&required, Some(&"1234".into())),
            Err(ValidationError::InvalidFormat {
                field: "Zip Code".to_string()
            })
        );
        assert_eq!(
            v.validate(&required, Some(&"".into())),
            Err(ValidationError::Required {
                field: "Zip Code".to_string()
            })
        );

        let optional = text_field(false, Some("^[0-9]{5}$"));
        assert_eq!(v.validate(&optional, Some(&"".into())), Ok(()));
        assert_eq!(v.validate(&optional, None), Ok(()));
    }

    #[test]
    fn pattern_must_match_whole_value() {
        let field = text_field(false, Some("[0-9]{5}"));
        let v = Validator::new();
        assert!(v.validate(&field, Some(&"12345".into())).is_ok());
        assert!(v.validate(&field, Some(&"a12345b".into())).is_err());
    }

    #[test]
    fn number_range() {
        let field = number_field(Some(1), Some(10));
        let v = Validator::new();
        assert_eq!(v.validate(&field, Some(&AnswerValue::from(5))), Ok(()));
        assert_eq!(v.validate(&field, Some(&AnswerValue::from(1))), Ok(()));
        assert_eq!(v.validate(&field, Some(&AnswerValue::from(10))), Ok(()));
        assert!(matches!(
            v.validate(&field, Some(&AnswerValue::from(0))),
            Err(ValidationError::BelowMin { .. })
        ));
        assert!(matches!(
            v.validate(&field, Some(&AnswerValue::from(11))),
            Err(ValidationError::AboveMax { .. })
        ));
    }

    #[test]
    fn zero_is_a_real_bound() {
        let field = number_field(Some(0), None);
        let v = Validator::new();
        assert!(v.validate(&field, Some(&AnswerValue::from(-1))).is_err());
        assert!(v.validate(&field, Some(&AnswerValue::from(0))).is_ok());
    }

    #[test]
    fn bounds_are_independent() {
        let v = Validator::new();
        let only_max = number_field(None, Some(3));
        assert!(v.validate(&only_max, Some(&AnswerValue::from(-100))).is_ok());
        assert!(v.validate(&only_max, Some(&AnswerValue::from(4))).is_err());
    }

    #[test]
    fn number_typed_as_text() {
        let field = number_field(Some(1), Some(10));
        let v = Validator::new();
        assert!(v.validate(&field, Some(&"7".into())).is_ok());
        assert_eq!(
            v.validate(&field, Some(&"seven".into())),
            Err(ValidationError::NotANumber {
                field: "Count".to_string()
            })
        );
    }

    #[test]
    fn choice_fields_only_check_presence() {
        let select = FieldDefinition {
            id: "s".to_string(),
            label: "Gender".to_string(),
            required: true,
            visibility: None,
            kind: FieldKind::Select {
                source: SelectSource::Static(vec!["Male".to_string()]),
            },
        };
        let radio = FieldDefinition {
            id: "r".to_string(),
            label: "Smoker".to_string(),
            required: true,
            visibility: None,
            kind: FieldKind::Radio {
                options: vec!["Yes".to_string(), "No".to_string()],
            },
        };
        let v = Validator::new();
        let err = v.validate(&select, None).unwrap_err();
        assert_eq!(err.to_string(), "Gender is required");
        assert_eq!(err.message_key(), "formDetails.validation.required");
        assert!(v.validate(&select, Some(&"Male".into())).is_ok());

        let err = v.validate(&radio, None).unwrap_err();
        assert_eq!(err.to_string(), "Please select Smoker");
        assert_eq!(err.message_key(), "formDetails.validation.select");
        assert!(v.validate(&radio, Some(&"No".into())).is_ok());
    }

    #[test]
    fn required_date_and_group() {
        let v = Validator::new();
        let date = FieldDefinition {
            id: "dob".to_string(),
            label: "Date of Birth".to_string(),
            required: true,
            visibility: None,
            kind: FieldKind::Date,
        };
        assert_eq!(
            v.validate(&date, None).unwrap_err().to_string(),
            "Date of Birth is required"
        );
        assert!(v.validate(&date, Some(&"2001-02-03".into())).is_ok());

        let group = FieldDefinition {
            id: "g".to_string(),
            label: "G".to_string(),
            required: true,
            visibility: None,
            kind: FieldKind::Group { fields: vec![] },
        };
        assert!(v.validate(&group, None).is_ok());
    }

    #[test]
    fn precompiled_patterns_are_used() {
        let form = Form {
            form_id: "f".to_string(),
            title: "F".to_string(),
            fields: vec![text_field(false, Some("^a+$"))],
        };
        let v = Validator::for_form(&form);
        assert_eq!(v.patterns.len(), 1);
        assert!(v.validate(&form.fields[0], Some(&"aaa".into())).is_ok());
    }
}
