use super::pipeline::Transform;
use crate::error::TransformError;
use model::records::batch::Batch;

/// Renames fields on every row. Rows without the source field are left as is.
#[derive(Debug, Clone, Default)]
pub struct RenameFields {
    renames: Vec<(String, String)>,
}

impl RenameFields {
    pub fn new<I, K, V>(renames: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            renames: renames
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        }
    }
}

impl Transform for RenameFields {
    fn apply(&self, batch: Batch) -> Result<Batch, TransformError> {
        Ok(batch
            .into_iter()
            .map(|mut row| {
                for (from, to) in &self.renames {
                    row.rename(from, to.clone());
                }
                row
            })
            .collect())
    }
}
