use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// `cursor_field` is set but no bind position was given for it.
    #[error("query declares cursor field `{0}` without a cursor parameter index")]
    MissingCursorIndex(String),

    /// `cursor_params_index` points past the end of `params`.
    #[error("cursor parameter index {index} is out of range for {len} bind parameter(s)")]
    CursorIndexOutOfRange { index: usize, len: usize },

    #[error("record has no value for cursor field `{0}`")]
    MissingCursorValue(String),
}
