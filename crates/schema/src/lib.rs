//! dynform-schema: the typed model of a server-supplied form.
//!
//! A form is a recursive tree of fields (`group` fields contain more
//! fields). [`Form::from_json`] loads one form from catalog JSON,
//! dropping malformed fields individually and reporting them as
//! [`SchemaIssue`]s, and [`load_catalog`] loads a whole catalog
//! response.

pub mod catalog;
pub mod deserialize;
pub mod error;
pub mod types;

pub use catalog::{load_catalog, summarize, Catalog, FormSummary, RejectedForm};
pub use deserialize::{anchored_pattern, parse_decimal};
pub use error::SchemaError;
pub use types::*;
