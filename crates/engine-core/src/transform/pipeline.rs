use crate::error::TransformError;
use model::records::batch::Batch;
use std::sync::Arc;

/// Maps one batch to another, possibly of a different shape.
///
/// Runs synchronously once per batch. An error aborts the pipeline run.
pub trait Transform: Send + Sync {
    fn apply(&self, batch: Batch) -> Result<Batch, TransformError>;
}

impl<F> Transform for F
where
    F: Fn(Batch) -> Result<Batch, TransformError> + Send + Sync,
{
    fn apply(&self, batch: Batch) -> Result<Batch, TransformError> {
        self(batch)
    }
}

pub trait TransformPipelineExt {
    fn add_if<T, F>(self, condition: bool, factory: F) -> Self
    where
        T: Transform + 'static,
        F: FnOnce() -> T;
}

/// Ordered chain of transforms. An empty chain passes batches through.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Transform for TransformPipeline {
    fn apply(&self, batch: Batch) -> Result<Batch, TransformError> {
        self.transforms
            .iter()
            .try_fold(batch, |acc, transform| transform.apply(acc))
    }
}

impl TransformPipelineExt for TransformPipeline {
    fn add_if<T, F>(mut self, condition: bool, factory: F) -> Self
    where
        T: Transform + 'static,
        F: FnOnce() -> T,
    {
        if condition {
            self = self.add_transform(factory());
        }
        self
    }
}
