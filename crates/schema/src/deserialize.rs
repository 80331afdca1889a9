//! Loading form schemas from catalog JSON.
//!
//! The main entry point is [`Form::from_json`]. Form-level problems are
//! returned as errors; field-level problems are collected as
//! [`SchemaIssue`]s and the offending field is dropped so that its
//! siblings still load.

use std::collections::BTreeSet;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::SchemaError;
use crate::types::*;

impl Form {
    /// Load one form object (`{ formId, title, fields }`).
    pub fn from_json(obj: &serde_json::Value) -> Result<LoadedForm, SchemaError> {
        let form_id = required_str(obj, "formId")?;
        let title = obj
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let fields_arr = obj
            .get("fields")
            .and_then(|f| f.as_array())
            .ok_or_else(|| SchemaError::MissingField {
                field: "fields".to_string(),
            })?;

        let mut issues = Vec::new();
        let fields = parse_fields(fields_arr, "", &mut issues);

        for issue in &issues {
            tracing::warn!(form = %form_id, path = %issue.path, error = %issue.error, "dropping field");
        }

        Ok(LoadedForm {
            form: Form {
                form_id,
                title,
                fields,
            },
            issues,
        })
    }
}

/// Wrap a pattern so that it must match the whole value.
pub fn anchored_pattern(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

/// Read a decimal from a JSON number or numeric string.
pub fn parse_decimal(v: &serde_json::Value) -> Option<Decimal> {
    let s = match v {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .ok()
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn required_str(obj: &serde_json::Value, field: &str) -> Result<String, SchemaError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SchemaError::MissingField {
            field: field.to_string(),
        })
}

fn join_path(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{}.{}", prefix, id)
    }
}

fn parse_fields(
    arr: &[serde_json::Value],
    prefix: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Vec<FieldDefinition> {
    let mut fields: Vec<FieldDefinition> = Vec::with_capacity(arr.len());
    let mut seen = BTreeSet::new();

    for (index, obj) in arr.iter().enumerate() {
        let id = obj.get("id").and_then(|v| v.as_str());
        let path = match id {
            Some(id) => join_path(prefix, id),
            None => join_path(prefix, &format!("[{}]", index)),
        };

        match parse_field(obj, &path, issues) {
            Ok(field) => {
                if !seen.insert(field.id.clone()) {
                    issues.push(SchemaIssue {
                        path,
                        error: SchemaError::DuplicateId { id: field.id },
                    });
                    continue;
                }
                fields.push(field);
            }
            Err(error) => issues.push(SchemaIssue { path, error }),
        }
    }

    check_dependencies(&mut fields, prefix, issues);
    fields
}

/// Drop fields whose `dependsOn` does not name a value-bearing sibling.
///
/// Repeats until stable, since dropping one field can orphan another
/// that depended on it.
fn check_dependencies(
    fields: &mut Vec<FieldDefinition>,
    prefix: &str,
    issues: &mut Vec<SchemaIssue>,
) {
    loop {
        let valued: BTreeSet<&str> = fields
            .iter()
            .filter(|f| f.holds_value())
            .map(|f| f.id.as_str())
            .collect();

        let broken = fields.iter().position(|field| {
            dependencies(field)
                .into_iter()
                .any(|dep| dep == field.id || !valued.contains(dep))
        });

        let Some(index) = broken else {
            return;
        };
        let field = fields.remove(index);
        let depends_on = dependencies(&field)
            .into_iter()
            .find(|dep| *dep == field.id || !fields.iter().any(|f| f.id == *dep && f.holds_value()))
            .unwrap_or_default()
            .to_string();
        issues.push(SchemaIssue {
            path: join_path(prefix, &field.id),
            error: SchemaError::UnknownDependency { depends_on },
        });
    }
}

fn dependencies(field: &FieldDefinition) -> Vec<&str> {
    let mut deps = Vec::new();
    if let Some(vis) = &field.visibility {
        deps.push(vis.depends_on.as_str());
    }
    if let Some(dynamic) = field.dynamic_options() {
        deps.push(dynamic.depends_on.as_str());
    }
    deps
}

fn parse_field(
    obj: &serde_json::Value,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Result<FieldDefinition, SchemaError> {
    let id = required_str(obj, "id")?;
    if id.is_empty() || id.contains('.') {
        return Err(SchemaError::InvalidId { id });
    }
    let label = required_str(obj, "label")?;
    let type_name = required_str(obj, "type")?;
    let required = obj
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let visibility = match obj.get("visibility") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(parse_visibility(v)?),
    };

    let kind = match type_name.as_str() {
        "text" => FieldKind::Text(parse_text_validation(obj)?),
        "number" => FieldKind::Number(parse_number_validation(obj)?),
        "radio" => FieldKind::Radio {
            options: parse_choice_options(obj)?,
        },
        "checkbox" => FieldKind::Checkbox {
            options: parse_choice_options(obj)?,
        },
        "date" => FieldKind::Date,
        "select" => FieldKind::Select {
            source: parse_select_source(obj)?,
        },
        "group" => {
            let children = obj
                .get("fields")
                .and_then(|f| f.as_array())
                .ok_or_else(|| SchemaError::MissingField {
                    field: "fields".to_string(),
                })?;
            FieldKind::Group {
                fields: parse_fields(children, path, issues),
            }
        }
        other => {
            return Err(SchemaError::UnknownFieldType {
                type_name: other.to_string(),
            })
        }
    };

    Ok(FieldDefinition {
        id,
        label,
        required,
        visibility,
        kind,
    })
}

fn parse_visibility(v: &serde_json::Value) -> Result<Visibility, SchemaError> {
    let depends_on = required_str(v, "dependsOn").map_err(|_| SchemaError::MissingField {
        field: "visibility.dependsOn".to_string(),
    })?;
    let condition = required_str(v, "condition").map_err(|_| SchemaError::MissingField {
        field: "visibility.condition".to_string(),
    })?;
    let condition = Condition::parse(&condition)?;
    let value = match v.get("value") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => {
            return Err(SchemaError::MissingField {
                field: "visibility.value".to_string(),
            })
        }
    };
    Ok(Visibility {
        depends_on,
        condition,
        value,
    })
}

fn parse_text_validation(obj: &serde_json::Value) -> Result<TextValidation, SchemaError> {
    let Some(pattern) = obj
        .get("validation")
        .and_then(|v| v.get("pattern"))
        .filter(|p| !p.is_null())
    else {
        return Ok(TextValidation::default());
    };
    let pattern = pattern
        .as_str()
        .ok_or_else(|| SchemaError::MissingField {
            field: "validation.pattern".to_string(),
        })?
        .to_string();
    if let Err(e) = regex::Regex::new(&anchored_pattern(&pattern)) {
        return Err(SchemaError::InvalidPattern {
            pattern,
            message: e.to_string(),
        });
    }
    Ok(TextValidation {
        pattern: Some(pattern),
    })
}

fn parse_number_validation(obj: &serde_json::Value) -> Result<NumberValidation, SchemaError> {
    let Some(validation) = obj.get("validation") else {
        return Ok(NumberValidation::default());
    };
    let bound = |key: &str| -> Result<Option<Decimal>, SchemaError> {
        match validation.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(v) => parse_decimal(v)
                .map(Some)
                .ok_or_else(|| SchemaError::MissingField {
                    field: format!("validation.{}", key),
                }),
        }
    };
    let min = bound("min")?;
    let max = bound("max")?;
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(SchemaError::InvertedRange {
                min: min.to_string(),
                max: max.to_string(),
            });
        }
    }
    Ok(NumberValidation { min, max })
}

fn parse_option_list(v: &serde_json::Value) -> Result<Vec<String>, SchemaError> {
    let arr = v.as_array().ok_or_else(|| SchemaError::MissingField {
        field: "options".to_string(),
    })?;
    let mut options = Vec::with_capacity(arr.len());
    for item in arr {
        let option = item.as_str().ok_or_else(|| SchemaError::MissingField {
            field: "options".to_string(),
        })?;
        if options.iter().any(|o| o == option) {
            return Err(SchemaError::DuplicateOption {
                option: option.to_string(),
            });
        }
        options.push(option.to_string());
    }
    Ok(options)
}

/// Radio and checkbox options: present, non-empty and unique.
fn parse_choice_options(obj: &serde_json::Value) -> Result<Vec<String>, SchemaError> {
    let raw = obj.get("options").ok_or_else(|| SchemaError::MissingField {
        field: "options".to_string(),
    })?;
    let options = parse_option_list(raw)?;
    if options.is_empty() {
        return Err(SchemaError::EmptyOptions);
    }
    Ok(options)
}

fn parse_select_source(obj: &serde_json::Value) -> Result<SelectSource, SchemaError> {
    if let Some(dynamic) = obj.get("dynamicOptions").filter(|d| !d.is_null()) {
        let depends_on = required_str(dynamic, "dependsOn").map_err(|_| {
            SchemaError::MissingField {
                field: "dynamicOptions.dependsOn".to_string(),
            }
        })?;
        let endpoint = required_str(dynamic, "endpoint").map_err(|_| {
            SchemaError::MissingField {
                field: "dynamicOptions.endpoint".to_string(),
            }
        })?;
        let method = dynamic
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or("GET");
        let method = HttpMethod::parse(method)?;
        return Ok(SelectSource::Dynamic(DynamicOptions {
            depends_on,
            endpoint,
            method,
        }));
    }

    match obj.get("options").filter(|o| !o.is_null()) {
        Some(raw) => Ok(SelectSource::Static(parse_option_list(raw)?)),
        None => Err(SchemaError::MissingOptionSource),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(fields: serde_json::Value) -> LoadedForm {
        Form::from_json(&json!({"formId": "f", "title": "T", "fields": fields})).unwrap()
    }

    #[test]
    fn missing_form_id_is_fatal() {
        let err = Form::from_json(&json!({"title": "T", "fields": []})).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                field: "formId".to_string()
            }
        );
    }

    #[test]
    fn fields_must_be_an_array() {
        let err = Form::from_json(&json!({"formId": "f", "fields": {}})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingField { .. }));
    }

    #[test]
    fn parses_every_field_type() {
        let loaded = load(json!([
            {"id": "name", "label": "Name", "type": "text", "required": true,
             "validation": {"pattern": "^[A-Z].*$"}},
            {"id": "age", "label": "Age", "type": "number", "validation": {"min": 18, "max": 99.5}},
            {"id": "sex", "label": "Sex", "type": "radio", "options": ["M", "F"]},
            {"id": "pets", "label": "Pets", "type": "checkbox", "options": ["cat", "dog"]},
            {"id": "dob", "label": "Born", "type": "date"},
            {"id": "color", "label": "Color", "type": "select", "options": ["red"]},
            {"id": "home", "label": "Home", "type": "group", "fields": [
                {"id": "city", "label": "City", "type": "text"}
            ]}
        ]));
        assert!(loaded.issues.is_empty(), "{:?}", loaded.issues);
        let fields = &loaded.form.fields;
        assert_eq!(fields.len(), 7);
        assert!(fields[0].required);
        assert_eq!(
            fields[1].kind,
            FieldKind::Number(NumberValidation {
                min: Some(Decimal::from(18)),
                max: Some(Decimal::from_str("99.5").unwrap()),
            })
        );
        assert_eq!(fields[4].kind, FieldKind::Date);
        assert_eq!(fields[6].children().len(), 1);
        assert!(!fields[6].holds_value());
    }

    #[test]
    fn unknown_condition_drops_only_that_field() {
        let loaded = load(json!([
            {"id": "a", "label": "A", "type": "text"},
            {"id": "b", "label": "B", "type": "text",
             "visibility": {"dependsOn": "a", "condition": "contains", "value": "x"}},
            {"id": "c", "label": "C", "type": "text"}
        ]));
        let ids: Vec<_> = loaded.form.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(loaded.issues.len(), 1);
        assert_eq!(loaded.issues[0].path, "b");
        assert_eq!(
            loaded.issues[0].error,
            SchemaError::UnknownCondition {
                condition: "contains".to_string()
            }
        );
    }

    #[test]
    fn select_without_source_is_rejected() {
        let loaded = load(json!([{"id": "s", "label": "S", "type": "select"}]));
        assert!(loaded.form.fields.is_empty());
        assert_eq!(loaded.issues[0].error, SchemaError::MissingOptionSource);
    }

    #[test]
    fn dynamic_source_wins_over_static() {
        let loaded = load(json!([
            {"id": "country", "label": "Country", "type": "select", "options": ["US"]},
            {"id": "state", "label": "State", "type": "select", "options": ["x"],
             "dynamicOptions": {"dependsOn": "country", "endpoint": "/states", "method": "GET"}}
        ]));
        let dynamic = loaded.form.fields[1].dynamic_options().unwrap();
        assert_eq!(dynamic.endpoint, "/states");
        assert_eq!(dynamic.method, HttpMethod::Get);
    }

    #[test]
    fn post_dynamic_options_are_unsupported() {
        let loaded = load(json!([
            {"id": "a", "label": "A", "type": "text"},
            {"id": "s", "label": "S", "type": "select",
             "dynamicOptions": {"dependsOn": "a", "endpoint": "/x", "method": "POST"}}
        ]));
        assert_eq!(
            loaded.issues[0].error,
            SchemaError::UnsupportedMethod {
                method: "POST".to_string()
            }
        );
    }

    #[test]
    fn radio_options_must_be_unique_and_present() {
        let loaded = load(json!([
            {"id": "r1", "label": "R", "type": "radio", "options": []},
            {"id": "r2", "label": "R", "type": "radio", "options": ["a", "a"]}
        ]));
        assert_eq!(loaded.issues[0].error, SchemaError::EmptyOptions);
        assert_eq!(
            loaded.issues[1].error,
            SchemaError::DuplicateOption {
                option: "a".to_string()
            }
        );
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let loaded = load(json!([
            {"id": "t", "label": "T", "type": "text", "validation": {"pattern": "([a-z"}}
        ]));
        assert!(matches!(
            loaded.issues[0].error,
            SchemaError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let loaded = load(json!([
            {"id": "n", "label": "N", "type": "number", "validation": {"min": 10, "max": 1}}
        ]));
        assert!(matches!(
            loaded.issues[0].error,
            SchemaError::InvertedRange { .. }
        ));
    }

    #[test]
    fn duplicate_sibling_id_keeps_first() {
        let loaded = load(json!([
            {"id": "a", "label": "First", "type": "text"},
            {"id": "a", "label": "Second", "type": "text"}
        ]));
        assert_eq!(loaded.form.fields.len(), 1);
        assert_eq!(loaded.form.fields[0].label, "First");
        assert_eq!(
            loaded.issues[0].error,
            SchemaError::DuplicateId { id: "a".to_string() }
        );
    }

    #[test]
    fn dependency_on_parent_scope_is_rejected() {
        let loaded = load(json!([
            {"id": "kind", "label": "Kind", "type": "radio", "options": ["a", "b"]},
            {"id": "g", "label": "G", "type": "group", "fields": [
                {"id": "x", "label": "X", "type": "text",
                 "visibility": {"dependsOn": "kind", "condition": "equals", "value": "a"}}
            ]}
        ]));
        assert!(loaded.form.fields[1].children().is_empty());
        assert_eq!(loaded.issues[0].path, "g.x");
        assert_eq!(
            loaded.issues[0].error,
            SchemaError::UnknownDependency {
                depends_on: "kind".to_string()
            }
        );
    }

    #[test]
    fn dependency_on_group_or_self_is_rejected() {
        let loaded = load(json!([
            {"id": "g", "label": "G", "type": "group", "fields": []},
            {"id": "a", "label": "A", "type": "text",
             "visibility": {"dependsOn": "g", "condition": "equals", "value": "x"}},
            {"id": "b", "label": "B", "type": "text",
             "visibility": {"dependsOn": "b", "condition": "equals", "value": "x"}}
        ]));
        assert_eq!(loaded.form.fields.len(), 1);
        assert_eq!(loaded.issues.len(), 2);
    }

    #[test]
    fn broken_dependency_cascades() {
        let loaded = load(json!([
            {"id": "a", "label": "A", "type": "mystery"},
            {"id": "b", "label": "B", "type": "text",
             "visibility": {"dependsOn": "a", "condition": "equals", "value": "x"}},
            {"id": "c", "label": "C", "type": "text",
             "visibility": {"dependsOn": "b", "condition": "equals", "value": "y"}},
            {"id": "d", "label": "D", "type": "text"}
        ]));
        let ids: Vec<_> = loaded.form.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["d"]);
        let paths: Vec<_> = loaded.issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b", "c"]);
    }

    #[test]
    fn dotted_or_empty_id_drops_only_that_field() {
        let loaded = load(json!([
            {"id": "policy.number", "label": "Policy", "type": "text", "required": true},
            {"id": "", "label": "Blank", "type": "text"},
            {"id": "holder", "label": "Holder", "type": "text"}
        ]));
        let ids: Vec<_> = loaded.form.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["holder"]);
        assert_eq!(loaded.issues.len(), 2);
        assert_eq!(
            loaded.issues[0].error,
            SchemaError::InvalidId {
                id: "policy.number".to_string()
            }
        );
        assert_eq!(
            loaded.issues[1].error,
            SchemaError::InvalidId { id: String::new() }
        );
    }

    #[test]
    fn dotted_id_cannot_shadow_group_child() {
        let loaded = load(json!([
            {"id": "a", "label": "A", "type": "group", "fields": [
                {"id": "b", "label": "B", "type": "text"}
            ]},
            {"id": "a.b", "label": "AB", "type": "text", "required": true}
        ]));
        assert_eq!(loaded.form.fields.len(), 1);
        assert_eq!(loaded.issues[0].path, "a.b");
        assert!(matches!(loaded.issues[0].error, SchemaError::InvalidId { .. }));
    }

    #[test]
    fn numeric_visibility_value_is_stringified() {
        let loaded = load(json!([
            {"id": "n", "label": "N", "type": "number"},
            {"id": "t", "label": "T", "type": "text",
             "visibility": {"dependsOn": "n", "condition": "equals", "value": 3}}
        ]));
        assert_eq!(loaded.form.fields[1].visibility.as_ref().unwrap().value, "3");
    }

    #[test]
    fn parse_decimal_accepts_numbers_and_strings() {
        assert_eq!(parse_decimal(&json!(5)), Some(Decimal::from(5)));
        assert_eq!(
            parse_decimal(&json!("2.50")),
            Some(Decimal::from_str("2.50").unwrap())
        );
        assert_eq!(parse_decimal(&json!(1e3)), Some(Decimal::from(1000)));
        assert_eq!(parse_decimal(&json!("abc")), None);
        assert_eq!(parse_decimal(&json!(true)), None);
    }
}
