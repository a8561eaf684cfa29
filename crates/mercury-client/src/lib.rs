//! Backend client and session driver for Mercury annotation.

pub mod annotator;
pub mod backend;
pub mod error;

#[cfg(feature = "http")]
pub mod http;

pub use annotator::{Annotator, AnnotatorConfig, DEFAULT_DEBOUNCE};
pub use backend::Backend;
pub use error::{AnnotatorError, ClientError};

#[cfg(feature = "http")]
pub use http::ApiClient;
