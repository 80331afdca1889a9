//! The form engine: one rendered form instance.
//!
//! Owns the answer map and the option resolver. Every mutation is followed
//! by a recompute pass that settles visibility, clears answers of hidden
//! subtrees and invalidates dependent selects before the call returns, so
//! no caller can observe a visible field bound to a stale answer.
//!
//! The engine does no I/O. Option fetches are queued as
//! [`OptionRequest`]s (see [`FormEngine::take_requests`]) and their results
//! come back through [`FormEngine::complete_fetch`]; submission is split
//! into [`FormEngine::begin_submit`] and [`FormEngine::finish_submit`].
//! [`crate::session::FormSession`] drives both over async collaborators.

use std::collections::{BTreeMap, BTreeSet};

use dynform_schema::{FieldDefinition, FieldKind, Form, LoadedForm, SchemaIssue, SelectSource};
use serde::Serialize;

use crate::error::{FormError, SubmissionError, TransportError};
use crate::options::{Observation, OptionRequest, OptionResolver, OptionResponse, OptionsView};
use crate::transport::SubmitResponse;
use crate::validation::{ValidationError, Validator};
use crate::value::{AnswerMap, AnswerValue, FieldPath};
use crate::visibility::is_visible;

// ──────────────────────────────────────────────
// State machine
// ──────────────────────────────────────────────

/// `Editing → Submitting → Resolved → Editing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Editing,
    Submitting,
    Resolved(SubmissionOutcome),
}

impl FormState {
    pub fn name(&self) -> &'static str {
        match self {
            FormState::Editing => "editing",
            FormState::Submitting => "submitting",
            FormState::Resolved(_) => "resolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Success {
        response: SubmitResponse,
        /// The payload that was sent.
        submitted: serde_json::Value,
    },
    Failure {
        error: SubmissionError,
    },
}

// ──────────────────────────────────────────────
// Render tree
// ──────────────────────────────────────────────

/// One visible control, as a host would draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    pub path: FieldPath,
    /// Label with a `*` suffix when required.
    pub label: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AnswerValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionsView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldView>,
}

// ──────────────────────────────────────────────
// FormEngine
// ──────────────────────────────────────────────

pub struct FormEngine {
    form: Form,
    issues: Vec<SchemaIssue>,
    answers: AnswerMap,
    /// Paths of visible fields (groups included), rebuilt on recompute.
    visible: BTreeSet<FieldPath>,
    resolver: OptionResolver,
    validator: Validator,
    /// Inline errors from the last submit attempt.
    errors: BTreeMap<FieldPath, ValidationError>,
    submit_attempted: bool,
    outbox: Vec<OptionRequest>,
    state: FormState,
    revision: u64,
}

impl FormEngine {
    pub fn new(loaded: LoadedForm) -> Self {
        let validator = Validator::for_form(&loaded.form);
        let mut engine = FormEngine {
            form: loaded.form,
            issues: loaded.issues,
            answers: AnswerMap::new(),
            visible: BTreeSet::new(),
            resolver: OptionResolver::new(),
            validator,
            errors: BTreeMap::new(),
            submit_attempted: false,
            outbox: Vec::new(),
            state: FormState::Editing,
            revision: 0,
        };
        engine.recompute();
        engine
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Fields dropped while loading the schema.
    pub fn schema_issues(&self) -> &[SchemaIssue] {
        &self.issues
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// Bumped on every state change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn answer(&self, path: &FieldPath) -> Option<&AnswerValue> {
        self.answers.get(path)
    }

    pub fn is_visible(&self, path: &FieldPath) -> bool {
        self.visible.contains(path)
    }

    /// Inline validation errors from the last submit attempt.
    pub fn errors(&self) -> &BTreeMap<FieldPath, ValidationError> {
        &self.errors
    }

    /// Find the field at `path`, descending through groups.
    pub fn field(&self, path: &FieldPath) -> Option<&FieldDefinition> {
        let mut fields = self.form.fields.as_slice();
        let mut found = None;
        for segment in path.segments() {
            let field = fields.iter().find(|f| f.id == segment)?;
            fields = field.children();
            found = Some(field);
        }
        found
    }

    /// Options currently offered by the choice field at `path`.
    pub fn options(&self, path: &FieldPath) -> Option<OptionsView> {
        let field = self.field(path)?;
        options_for(field, path, &self.resolver)
    }

    // ── Editing ──────────────────────────────────────────────────────

    /// Store an answer and settle everything that depends on it.
    pub fn set_answer(&mut self, path: &FieldPath, value: AnswerValue) -> Result<(), FormError> {
        self.ensure_editing()?;
        let field = self.field(path).ok_or_else(|| FormError::UnknownField {
            path: path.clone(),
        })?;
        if !field.holds_value() {
            return Err(FormError::NotAValue { path: path.clone() });
        }
        if !self.visible.contains(path) {
            return Err(FormError::Hidden { path: path.clone() });
        }
        let value = self.check_value(field, path, value)?;

        self.answers.insert(path.clone(), value);
        self.after_edit(path);
        self.retry_failed_dependents(path);
        Ok(())
    }

    /// Remove the answer at `path`.
    pub fn clear_answer(&mut self, path: &FieldPath) -> Result<(), FormError> {
        self.ensure_editing()?;
        if self.field(path).is_none() {
            return Err(FormError::UnknownField { path: path.clone() });
        }
        self.answers.clear_subtree(path);
        self.after_edit(path);
        Ok(())
    }

    /// Re-request options for a dynamic select whose fetch failed.
    pub fn retry_options(&mut self, path: &FieldPath) -> Result<(), FormError> {
        let field = self.field(path).ok_or_else(|| FormError::UnknownField {
            path: path.clone(),
        })?;
        if field.dynamic_options().is_none() {
            return Err(FormError::NotDynamic { path: path.clone() });
        }
        if let Some(request) = self.resolver.retry(path) {
            self.outbox.push(request);
            self.revision += 1;
        }
        Ok(())
    }

    /// Drain option fetches that the host must perform.
    pub fn take_requests(&mut self) -> Vec<OptionRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Deliver a fetch result. Returns false when it was stale or superseded
    /// and changed nothing visible.
    pub fn complete_fetch(&mut self, response: OptionResponse) -> bool {
        let applied = self.resolver.complete(response);
        let visible_hit = applied.iter().any(|p| self.visible.contains(p));
        if !applied.is_empty() {
            self.revision += 1;
        }
        visible_hit
    }

    /// Number of option fetches issued and not yet completed.
    pub fn fetches_in_flight(&self) -> usize {
        self.resolver.in_flight()
    }

    // ── Validation and submission ────────────────────────────────────

    /// Validate every visible field, depth-first.
    pub fn validate(&self) -> BTreeMap<FieldPath, ValidationError> {
        let mut errors = BTreeMap::new();
        self.validate_fields(&self.form.fields, &FieldPath::root(), &mut errors);
        errors
    }

    /// Validate and, if everything passes, move to `Submitting` and return
    /// the payload to hand to the transport.
    ///
    /// On failure the errors are kept for [`FormEngine::errors`] and the
    /// form stays in `Editing`.
    pub fn begin_submit(&mut self) -> Result<serde_json::Value, FormError> {
        self.ensure_editing()?;
        self.submit_attempted = true;
        self.errors = self.validate();
        self.revision += 1;
        if !self.errors.is_empty() {
            tracing::info!(form = %self.form.form_id, count = self.errors.len(), "submission blocked by validation");
            return Err(FormError::ValidationFailed {
                count: self.errors.len(),
            });
        }
        self.state = FormState::Submitting;
        Ok(self.payload())
    }

    /// Record the transport's answer and move to `Resolved`.
    pub fn finish_submit(
        &mut self,
        result: Result<SubmitResponse, TransportError>,
        submitted: serde_json::Value,
    ) -> Result<&SubmissionOutcome, FormError> {
        if self.state != FormState::Submitting {
            return Err(FormError::NotSubmitting);
        }
        let outcome = match result {
            Ok(response) => {
                tracing::info!(form = %self.form.form_id, status = %response.status, "form submitted");
                SubmissionOutcome::Success {
                    response,
                    submitted,
                }
            }
            Err(err) => {
                tracing::warn!(form = %self.form.form_id, error = %err, "submission failed");
                SubmissionOutcome::Failure {
                    error: SubmissionError::from(err),
                }
            }
        };
        self.state = FormState::Resolved(outcome);
        self.revision += 1;
        match &self.state {
            FormState::Resolved(outcome) => Ok(outcome),
            _ => Err(FormError::NotResolved),
        }
    }

    /// Close the result view and return to `Editing`.
    ///
    /// After a success the answers are discarded and the form starts over;
    /// after a failure they are kept so the user can resubmit.
    pub fn dismiss_result(&mut self) -> Result<(), FormError> {
        let succeeded = match &self.state {
            FormState::Resolved(SubmissionOutcome::Success { .. }) => true,
            FormState::Resolved(SubmissionOutcome::Failure { .. }) => false,
            _ => return Err(FormError::NotResolved),
        };
        self.state = FormState::Editing;
        if succeeded {
            self.answers.clear();
            self.errors.clear();
            self.submit_attempted = false;
            self.resolver.reset_slots();
        }
        self.recompute();
        Ok(())
    }

    /// Nested payload of visible fields: groups become objects keyed by
    /// group id, leaves become entries keyed by field id. Visible fields
    /// without an answer are included as empty.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::Value::Object(self.payload_fields(&self.form.fields, &FieldPath::root()))
    }

    /// The visible form as a tree of controls.
    pub fn render(&self) -> Vec<FieldView> {
        self.render_fields(&self.form.fields, &FieldPath::root())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn ensure_editing(&self) -> Result<(), FormError> {
        match self.state {
            FormState::Editing => Ok(()),
            ref other => Err(FormError::NotEditing {
                state: other.name(),
            }),
        }
    }

    fn check_value(
        &self,
        field: &FieldDefinition,
        path: &FieldPath,
        value: AnswerValue,
    ) -> Result<AnswerValue, FormError> {
        let mismatch = |v: &AnswerValue| FormError::TypeMismatch {
            path: path.clone(),
            got: v.type_name(),
        };
        match (&field.kind, &value) {
            (FieldKind::Text(_) | FieldKind::Date, AnswerValue::Text(_)) => Ok(value),
            (FieldKind::Number(_), AnswerValue::Number(_) | AnswerValue::Text(_)) => Ok(value),
            (FieldKind::Radio { .. } | FieldKind::Select { .. }, AnswerValue::Text(choice)) => {
                if !choice.is_empty() && !self.offers(field, path, choice) {
                    return Err(FormError::NotAnOption {
                        path: path.clone(),
                        value: choice.clone(),
                    });
                }
                Ok(value)
            }
            (FieldKind::Checkbox { .. }, AnswerValue::Choices(choices)) => {
                if let Some(bad) = choices.iter().find(|c| !self.offers(field, path, c)) {
                    return Err(FormError::NotAnOption {
                        path: path.clone(),
                        value: bad.clone(),
                    });
                }
                Ok(value)
            }
            _ => Err(mismatch(&value)),
        }
    }

    fn offers(&self, field: &FieldDefinition, path: &FieldPath, choice: &str) -> bool {
        options_for(field, path, &self.resolver)
            .is_some_and(|view| view.options().iter().any(|o| o == choice))
    }

    /// Picking a value again re-triggers option fetches of sibling selects
    /// that failed for that same value.
    fn retry_failed_dependents(&mut self, path: &FieldPath) {
        let parent = path.parent();
        let siblings = if parent.is_root() {
            self.form.fields.as_slice()
        } else {
            match self.field(&parent) {
                Some(group) => group.children(),
                None => return,
            }
        };
        let Some(id) = path.segments().last() else {
            return;
        };
        let dependents: Vec<FieldPath> = siblings
            .iter()
            .filter(|f| f.dynamic_options().is_some_and(|d| d.depends_on == id))
            .map(|f| parent.child(&f.id))
            .filter(|p| self.visible.contains(p))
            .collect();
        for dependent in dependents {
            if let Some(request) = self.resolver.retry(&dependent) {
                self.outbox.push(request);
            }
        }
    }

    fn after_edit(&mut self, path: &FieldPath) {
        self.recompute();
        // Errors of hidden fields must not linger until they are shown again.
        let visible = &self.visible;
        self.errors.retain(|p, _| visible.contains(p));
        if self.submit_attempted {
            self.revalidate(path);
        }
    }

    /// Re-run validation for one field after a failed submit, so fixed
    /// errors disappear as the user edits.
    fn revalidate(&mut self, path: &FieldPath) {
        let result = match self.field(path) {
            Some(field) if self.visible.contains(path) && field.holds_value() => {
                self.validator.validate(field, self.answers.get(path))
            }
            _ => Ok(()),
        };
        match result {
            Ok(()) => {
                self.errors.remove(path);
            }
            Err(err) => {
                self.errors.insert(path.clone(), err);
            }
        }
    }

    /// Settle derived state until nothing changes. Each extra pass is
    /// triggered by at least one removed answer, so this terminates.
    fn recompute(&mut self) {
        loop {
            let mut pass = Recompute {
                answers: &mut self.answers,
                resolver: &mut self.resolver,
                outbox: &mut self.outbox,
                visible: BTreeSet::new(),
                changed: false,
            };
            pass.walk(&self.form.fields, &FieldPath::root());
            let Recompute {
                visible, changed, ..
            } = pass;
            self.visible = visible;
            if !changed {
                break;
            }
        }
        self.revision += 1;
    }

    fn validate_fields(
        &self,
        fields: &[FieldDefinition],
        prefix: &FieldPath,
        errors: &mut BTreeMap<FieldPath, ValidationError>,
    ) {
        for field in fields {
            let path = prefix.child(&field.id);
            if !self.visible.contains(&path) {
                continue;
            }
            if let FieldKind::Group { fields } = &field.kind {
                self.validate_fields(fields, &path, errors);
                continue;
            }
            if let Err(err) = self.validator.validate(field, self.answers.get(&path)) {
                errors.insert(path, err);
            }
        }
    }

    fn payload_fields(
        &self,
        fields: &[FieldDefinition],
        prefix: &FieldPath,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        for field in fields {
            let path = prefix.child(&field.id);
            if !self.visible.contains(&path) {
                continue;
            }
            let value = match &field.kind {
                FieldKind::Group { fields } => {
                    serde_json::Value::Object(self.payload_fields(fields, &path))
                }
                FieldKind::Checkbox { .. } => self
                    .answers
                    .get(&path)
                    .map(AnswerValue::to_json)
                    .unwrap_or_else(|| serde_json::Value::Array(Vec::new())),
                _ => self
                    .answers
                    .get(&path)
                    .map(AnswerValue::to_json)
                    .unwrap_or_else(|| serde_json::Value::String(String::new())),
            };
            out.insert(field.id.clone(), value);
        }
        out
    }

    fn render_fields(&self, fields: &[FieldDefinition], prefix: &FieldPath) -> Vec<FieldView> {
        fields
            .iter()
            .filter_map(|field| {
                let path = prefix.child(&field.id);
                if !self.visible.contains(&path) {
                    return None;
                }
                let label = if field.required {
                    format!("{}*", field.label)
                } else {
                    field.label.clone()
                };
                Some(FieldView {
                    label,
                    kind: field.type_name(),
                    value: self.answers.get(&path).cloned(),
                    options: options_for(field, &path, &self.resolver),
                    error: self.errors.get(&path).cloned(),
                    children: self.render_fields(field.children(), &path),
                    path,
                })
            })
            .collect()
    }
}

fn options_for(
    field: &FieldDefinition,
    path: &FieldPath,
    resolver: &OptionResolver,
) -> Option<OptionsView> {
    match &field.kind {
        FieldKind::Radio { options } | FieldKind::Checkbox { options } => {
            Some(OptionsView::Static(options.clone()))
        }
        FieldKind::Select {
            source: SelectSource::Static(options),
        } => Some(OptionsView::Static(options.clone())),
        FieldKind::Select {
            source: SelectSource::Dynamic(_),
        } => Some(resolver.view(path)),
        _ => None,
    }
}

/// One pass over the schema tree, with disjoint borrows of engine state.
struct Recompute<'a> {
    answers: &'a mut AnswerMap,
    resolver: &'a mut OptionResolver,
    outbox: &'a mut Vec<OptionRequest>,
    visible: BTreeSet<FieldPath>,
    changed: bool,
}

impl Recompute<'_> {
    fn walk(&mut self, fields: &[FieldDefinition], prefix: &FieldPath) {
        for field in fields {
            let path = prefix.child(&field.id);

            if !is_visible(field, self.answers, prefix) {
                let cleared = self.answers.clear_subtree(&path);
                if !cleared.is_empty() {
                    tracing::debug!(%path, count = cleared.len(), "cleared answers of hidden field");
                    self.changed = true;
                }
                continue;
            }
            self.visible.insert(path.clone());

            match &field.kind {
                FieldKind::Group { fields } => self.walk(fields, &path),
                FieldKind::Select {
                    source: SelectSource::Dynamic(dynamic),
                } => {
                    let dependency = prefix.child(&dynamic.depends_on);
                    let current = self.answers.get(&dependency).map(|v| v.to_string());
                    if let Observation::Changed { request } =
                        self.resolver.observe(&path, dynamic, current.as_deref())
                    {
                        // Clear before the new options can surface.
                        if self.answers.remove(&path).is_some() {
                            tracing::debug!(%path, "cleared select after dependency change");
                            self.changed = true;
                        }
                        self.outbox.extend(request);
                    }
                }
                _ => {}
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
