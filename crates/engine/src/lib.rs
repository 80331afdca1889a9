//! Dynamic form engine -- renders one form from a loaded schema, keeps
//! visibility and dependent options consistent with the answers, validates
//! and submits.
//!
//! [`FormEngine`] is synchronous and performs no I/O. Option fetches leave
//! it as [`OptionRequest`]s and return as [`OptionResponse`]s;
//! [`FormSession`] drives those over the async collaborator traits in
//! [`transport`].
//!
//! Numbers are `rust_decimal::Decimal`, never f64, so `min`/`max` bounds
//! compare exactly.

pub mod engine;
pub mod error;
pub mod options;
pub mod session;
pub mod transport;
pub mod validation;
pub mod value;
pub mod visibility;

pub use engine::{FieldView, FormEngine, FormState, SubmissionOutcome};
pub use error::{FormError, OptionFetchError, SubmissionError, TransportError};
pub use options::{OptionKey, OptionRequest, OptionResponse, OptionsView, RequestId};
pub use session::FormSession;
pub use transport::static_source::{RecordingTransport, StaticCatalog, StaticOptionSource};
pub use transport::{
    resolve_options, FormCatalogSource, OptionSource, SubmissionTransport, SubmitResponse,
    TableData,
};
pub use validation::{ValidationError, Validator};
pub use value::{AnswerMap, AnswerValue, FieldPath};

#[cfg(feature = "http")]
pub use transport::http::{HttpClient, HttpConfig};

/// Load `form_id` out of a catalog document and build an engine for it.
pub fn open_form(
    catalog: &serde_json::Value,
    form_id: &str,
) -> Result<FormEngine, dynform_schema::SchemaError> {
    let catalog = dynform_schema::load_catalog(catalog)?;
    let loaded = catalog
        .forms
        .into_iter()
        .find(|f| f.form.form_id == form_id)
        .ok_or_else(|| dynform_schema::SchemaError::UnknownForm {
            form_id: form_id.to_string(),
        })?;
    Ok(FormEngine::new(loaded))
}
