use crate::{core::value::Value, error::ModelError, records::record::Record};
use serde::{Deserialize, Serialize};

/// A parameterized query that a source pages through.
///
/// When `cursor_field` is set, `params[cursor_params_index]` is the bind
/// position that receives the cursor value taken from the last row of the
/// previous page. The query must use it as a lower bound (or offset) and
/// order its rows by the cursor field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub cursor_field: Option<String>,
    #[serde(default)]
    pub cursor_params_index: Option<usize>,
}

impl QuerySpec {
    /// A single-page query with no cursor.
    pub fn new(query: impl Into<String>, params: Vec<Value>) -> Self {
        QuerySpec {
            query: query.into(),
            params,
            cursor_field: None,
            cursor_params_index: None,
        }
    }

    pub fn with_cursor(mut self, field: impl Into<String>, params_index: usize) -> Self {
        self.cursor_field = Some(field.into());
        self.cursor_params_index = Some(params_index);
        self
    }

    /// Checks that a configured cursor field has a valid bind position.
    pub fn validate(&self) -> Result<(), ModelError> {
        let Some(field) = &self.cursor_field else {
            return Ok(());
        };
        match self.cursor_params_index {
            None => Err(ModelError::MissingCursorIndex(field.clone())),
            Some(index) if index >= self.params.len() => Err(ModelError::CursorIndexOutOfRange {
                index,
                len: self.params.len(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// The cursor value carried by `record`, if the query pages by cursor.
    ///
    /// A SQL `NULL` counts as absent: binding it as a lower bound would
    /// match nothing or everything depending on the backend.
    pub fn cursor_value(&self, record: &Record) -> Option<Value> {
        let field = self.cursor_field.as_deref()?;
        record.get(field).filter(|v| !v.is_null()).cloned()
    }

    /// Returns a copy whose cursor parameter is seeded from `last_item`,
    /// so a new run continues after the last row a previous run processed.
    pub fn resume_from(&self, last_item: &Record) -> Result<QuerySpec, ModelError> {
        self.validate()?;
        let (Some(field), Some(index)) = (&self.cursor_field, self.cursor_params_index) else {
            return Ok(self.clone());
        };
        let value = self
            .cursor_value(last_item)
            .ok_or_else(|| ModelError::MissingCursorValue(field.clone()))?;

        let mut resumed = self.clone();
        resumed.params[index] = value;
        Ok(resumed)
    }
}
