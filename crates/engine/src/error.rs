use serde::Serialize;

use crate::value::FieldPath;

/// A call to one of the external collaborators failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: u16,
        /// Server-supplied `message`, when the error body carried one.
        message: Option<String>,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The background task running the request died.
    #[error("transport task failed: {0}")]
    Join(String),
}

/// Dependent options could not be fetched for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("could not load options from {endpoint}: {message}")]
pub struct OptionFetchError {
    pub endpoint: String,
    pub message: String,
}

impl OptionFetchError {
    pub fn from_transport(endpoint: &str, err: &TransportError) -> Self {
        OptionFetchError {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

/// The submission transport failed. The form stays editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct SubmissionError {
    pub message: String,
}

/// Message shown when the server gave no reason.
pub const GENERIC_SUBMISSION_FAILURE: &str = "Form submission failed. Please try again.";

impl From<TransportError> for SubmissionError {
    fn from(err: TransportError) -> Self {
        let message = match err {
            TransportError::Status {
                message: Some(message),
                ..
            } if !message.is_empty() => message,
            _ => GENERIC_SUBMISSION_FAILURE.to_string(),
        };
        SubmissionError { message }
    }
}

/// A form engine call was not allowed in the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("no field at '{path}'")]
    UnknownField { path: FieldPath },

    #[error("field '{path}' is hidden")]
    Hidden { path: FieldPath },

    #[error("'{path}' is a group and holds no value")]
    NotAValue { path: FieldPath },

    #[error("field '{path}' does not accept a {got} answer")]
    TypeMismatch { path: FieldPath, got: &'static str },

    #[error("'{value}' is not an option of '{path}'")]
    NotAnOption { path: FieldPath, value: String },

    #[error("'{path}' has no dynamic options")]
    NotDynamic { path: FieldPath },

    #[error("form is not accepting edits (state: {state})")]
    NotEditing { state: &'static str },

    #[error("no submission is in flight")]
    NotSubmitting,

    #[error("no submission result to dismiss")]
    NotResolved,

    #[error("{count} field(s) failed validation")]
    ValidationFailed { count: usize },
}
