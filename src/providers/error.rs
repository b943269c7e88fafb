use serde::de::DeserializeOwned;
use serde_json::error::Category;
use thiserror::Error;

/// Failure of a single `reply` call. None of these end the chat session.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{message}")]
    Network { url: String, message: String },

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Shape(#[from] ShapeError),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("body is not valid JSON ({0})")]
    InvalidJson(String),

    #[error("field '{0}' is missing")]
    MissingField(&'static str),

    #[error("a field has the wrong type ({0})")]
    WrongType(String),

    #[error("list '{0}' is empty")]
    EmptyList(&'static str),
}

impl ShapeError {
    fn from_json(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Data => Self::WrongType(err.to_string()),
            Category::Io | Category::Syntax | Category::Eof => Self::InvalidJson(err.to_string()),
        }
    }
}

/// Response schemas keep every field optional so an absent field is reported
/// as `MissingField` and only a type mismatch surfaces as `WrongType`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ShapeError> {
    serde_json::from_str(body).map_err(ShapeError::from_json)
}

pub(crate) fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ShapeError> {
    value.ok_or(ShapeError::MissingField(field))
}

pub(crate) fn first<T>(items: Option<Vec<T>>, field: &'static str) -> Result<T, ShapeError> {
    required(items, field)?
        .into_iter()
        .next()
        .ok_or(ShapeError::EmptyList(field))
}
