//! Visibility rule evaluation.

use dynform_schema::{Condition, FieldDefinition};

use crate::value::{AnswerMap, FieldPath};

/// Decide whether `field` is shown, given the answers and the path of its
/// parent group.
///
/// `dependsOn` names a sibling, so it is resolved under `prefix`. A field
/// without a rule is always visible. Pure; clearing answers of hidden
/// fields is the engine's job.
pub fn is_visible(field: &FieldDefinition, answers: &AnswerMap, prefix: &FieldPath) -> bool {
    let Some(rule) = &field.visibility else {
        return true;
    };
    let dependency = prefix.child(&rule.depends_on);
    match rule.condition {
        Condition::Equals => answers
            .get(&dependency)
            .is_some_and(|answer| answer.to_string() == rule.value),
    }
}
