use mercury_core::{SubmitError, TaxonomyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("backend error: {0}")]
    Api(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("label taxonomy: {0}")]
    Taxonomy(#[from] TaxonomyError),

    #[error("no user key configured")]
    MissingUserKey,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("no task is open")]
    NoTask,

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Client(#[from] ClientError),
}
