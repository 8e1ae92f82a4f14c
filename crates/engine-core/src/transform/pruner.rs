use super::pipeline::Transform;
use crate::error::TransformError;
use model::records::{batch::Batch, record::Record};
use std::collections::HashSet;

/// Removes the listed fields from every row.
#[derive(Debug, Clone, Default)]
pub struct DropFields {
    fields: HashSet<String>,
}

impl DropFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|f| f.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Transform for DropFields {
    fn apply(&self, batch: Batch) -> Result<Batch, TransformError> {
        Ok(batch
            .into_iter()
            .map(|mut row| {
                row.retain(|name, _| !self.fields.contains(&name.to_ascii_lowercase()));
                row
            })
            .collect())
    }
}

/// Projects every row onto the listed fields, in the listed order.
/// Fields a row does not have are skipped.
#[derive(Debug, Clone, Default)]
pub struct SelectFields {
    fields: Vec<String>,
}

impl SelectFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for SelectFields {
    fn apply(&self, batch: Batch) -> Result<Batch, TransformError> {
        Ok(batch
            .into_iter()
            .map(|row| {
                let mut projected = Record::with_capacity(self.fields.len());
                for name in &self.fields {
                    if let Some(value) = row.get(name) {
                        projected.set(name.clone(), value.clone());
                    }
                }
                projected
            })
            .collect())
    }
}
