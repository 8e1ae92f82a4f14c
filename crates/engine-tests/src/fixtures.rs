//! In-memory adapters that drive the real paginator and batched writer
//! without a database.

use async_trait::async_trait;
use engine_core::{
    connectors::{
        destination::Destination,
        source::{BatchStream, Source},
    },
    error::ConnectorError,
    pagination::{QueryExecutor, paginate},
    writer::{BatchedWriter, FlushTarget, WriterConfig},
};
use model::{
    core::value::Value,
    pagination::query::QuerySpec,
    records::{batch::Batch, record::Record},
};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

/// Answers queries from a fixed list of pages and records the bound
/// parameters of every call.
#[derive(Default)]
pub struct ScriptedExecutor {
    pages: Mutex<VecDeque<Vec<Record>>>,
    calls: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl ScriptedExecutor {
    pub fn new(pages: Vec<Vec<Record>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<Value>>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn query(&self, _sql: &str, params: &[Value]) -> Result<Vec<Record>, ConnectorError> {
        self.calls.lock().unwrap().push(params.to_vec());
        Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// A source backed by [`ScriptedExecutor`] and the shared paginator.
pub struct PagedSource {
    executor: ScriptedExecutor,
    spec: QuerySpec,
}

impl PagedSource {
    pub fn new(executor: ScriptedExecutor, spec: QuerySpec) -> Self {
        Self { executor, spec }
    }
}

#[async_trait]
impl Source for PagedSource {
    fn name(&self) -> &str {
        "paged"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.spec.validate()?;
        Ok(())
    }

    fn fetch(&self) -> BatchStream<'_> {
        paginate(&self.executor, self.spec.clone())
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

/// Keeps every batch it receives.
#[derive(Default)]
pub struct RecordingDestination {
    pub received: Arc<Mutex<Vec<Batch>>>,
}

#[async_trait]
impl Destination for RecordingDestination {
    fn name(&self) -> &str {
        "recording"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn insert(&mut self, batch: Batch) -> Result<(), ConnectorError> {
        self.received.lock().unwrap().push(batch);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

/// Statement counters shared between a [`FlakyTarget`] and the test.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Statements {
    pub begins: usize,
    pub writes: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub committed_rows: Vec<Record>,
}

/// Fails the first `failures` writes, then succeeds.
pub struct FlakyTarget {
    failures: usize,
    staged: Vec<Record>,
    pub statements: Arc<Mutex<Statements>>,
}

impl FlakyTarget {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            staged: Vec::new(),
            statements: Arc::default(),
        }
    }
}

#[async_trait]
impl FlushTarget for FlakyTarget {
    async fn begin(&mut self) -> Result<(), ConnectorError> {
        self.statements.lock().unwrap().begins += 1;
        self.staged.clear();
        Ok(())
    }

    async fn write(&mut self, rows: &[Record], _concurrency: usize) -> Result<(), ConnectorError> {
        let mut statements = self.statements.lock().unwrap();
        statements.writes += 1;
        if statements.writes <= self.failures {
            return Err(ConnectorError::write("deadlock detected"));
        }
        self.staged.extend_from_slice(rows);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ConnectorError> {
        let mut statements = self.statements.lock().unwrap();
        statements.commits += 1;
        statements.committed_rows.append(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ConnectorError> {
        self.statements.lock().unwrap().rollbacks += 1;
        self.staged.clear();
        Ok(())
    }
}

/// A destination that writes through a [`BatchedWriter`] into a
/// [`FlakyTarget`].
pub struct FlakyDestination {
    writer: BatchedWriter,
    target: FlakyTarget,
}

impl FlakyDestination {
    pub fn new(failures: usize, config: WriterConfig) -> Self {
        Self {
            writer: BatchedWriter::immediate(config),
            target: FlakyTarget::new(failures),
        }
    }

    /// Queues rows until a full unit of `batch_size` is available.
    pub fn buffered(failures: usize, config: WriterConfig) -> Self {
        Self {
            writer: BatchedWriter::buffered(config),
            target: FlakyTarget::new(failures),
        }
    }

    pub fn statements(&self) -> Arc<Mutex<Statements>> {
        self.target.statements.clone()
    }
}

#[async_trait]
impl Destination for FlakyDestination {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn insert(&mut self, batch: Batch) -> Result<(), ConnectorError> {
        self.writer
            .insert(&mut self.target, batch.into_rows())
            .await
            .map(|_| ())
    }

    fn pending_rows(&self) -> usize {
        self.writer.pending_len()
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.writer.finish(&mut self.target).await.map(|_| ())
    }
}
