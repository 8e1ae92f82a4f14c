use crate::{error::ConnectorError, retry::RetryPolicy};
use async_trait::async_trait;
use model::records::record::Record;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Backend half of the batched writer: the statements one flush unit runs.
#[async_trait]
pub trait FlushTarget: Send {
    /// Runs at the start of every attempt, before `begin`. Destinations use
    /// it for one-time setup such as creating the target table.
    async fn prepare(&mut self) -> Result<(), ConnectorError> {
        Ok(())
    }

    async fn begin(&mut self) -> Result<(), ConnectorError>;

    /// Writes every row of the unit, with at most `concurrency` statements
    /// in flight at once.
    async fn write(&mut self, rows: &[Record], concurrency: usize) -> Result<(), ConnectorError>;

    async fn commit(&mut self) -> Result<(), ConnectorError>;

    async fn rollback(&mut self) -> Result<(), ConnectorError>;
}

/// When rows reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// `insert` writes everything it was given before returning.
    Immediate,
    /// `insert` only writes full units; the remainder waits for the next
    /// call or for `finish`.
    Buffered,
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Rows per flush unit.
    pub batch_size: usize,
    /// Wrap every flush unit in a transaction.
    pub transactional: bool,
    /// Upper bound on statements in flight within one unit.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            transactional: true,
            concurrency: 8,
            retry: RetryPolicy::for_database(),
        }
    }
}

/// Groups rows into flush units and writes each one with retry.
///
/// A unit that fails is rolled back and retried as a whole. Units that were
/// committed earlier stay committed when a later unit fails; in buffered
/// mode the rows still waiting behind it are dropped.
pub struct BatchedWriter {
    config: WriterConfig,
    mode: FlushMode,
    pending: Vec<Record>,
}

impl BatchedWriter {
    pub fn new(mode: FlushMode, config: WriterConfig) -> Self {
        Self {
            config,
            mode,
            pending: Vec::new(),
        }
    }

    pub fn immediate(config: WriterConfig) -> Self {
        Self::new(FlushMode::Immediate, config)
    }

    pub fn buffered(config: WriterConfig) -> Self {
        Self::new(FlushMode::Buffered, config)
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn mode(&self) -> FlushMode {
        self.mode
    }

    /// Rows accepted but not yet written.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn unit_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Accepts rows and writes every complete unit. Returns the number of
    /// rows written by this call.
    pub async fn insert<T>(&mut self, target: &mut T, rows: Vec<Record>) -> Result<usize, ConnectorError>
    where
        T: FlushTarget + ?Sized,
    {
        let size = self.unit_size();
        match self.mode {
            FlushMode::Immediate => {
                let mut written = 0;
                for unit in rows.chunks(size) {
                    flush_unit(&self.config, target, unit).await?;
                    written += unit.len();
                }
                Ok(written)
            }
            FlushMode::Buffered => {
                self.pending.extend(rows);
                let mut written = 0;
                while self.pending.len() >= size {
                    let unit: Vec<Record> = self.pending.drain(..size).collect();
                    if let Err(err) = flush_unit(&self.config, target, &unit).await {
                        self.discard_pending();
                        return Err(err);
                    }
                    written += unit.len();
                }
                debug!(written, pending = self.pending.len(), "Buffered insert");
                Ok(written)
            }
        }
    }

    /// Drops the buffer so rows behind a failed unit are never committed
    /// ahead of it.
    fn discard_pending(&mut self) {
        if !self.pending.is_empty() {
            warn!(rows = self.pending.len(), "Discarding buffered rows after failed flush");
            self.pending.clear();
        }
    }

    /// Writes whatever is still buffered.
    pub async fn finish<T>(&mut self, target: &mut T) -> Result<usize, ConnectorError>
    where
        T: FlushTarget + ?Sized,
    {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let rows = std::mem::take(&mut self.pending);
        let mut written = 0;
        for unit in rows.chunks(self.unit_size()) {
            flush_unit(&self.config, target, unit).await?;
            written += unit.len();
        }
        info!(rows = written, "Flushed pending rows");
        Ok(written)
    }
}

async fn flush_unit<T>(config: &WriterConfig, target: &mut T, rows: &[Record]) -> Result<(), ConnectorError>
where
    T: FlushTarget + ?Sized,
{
    let max_attempts = config.retry.max_attempts();
    let mut attempt = 0;

    loop {
        match write_once(config, target, rows).await {
            Ok(()) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, rows = rows.len(), "Flush unit succeeded after retry");
                }
                return Ok(());
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    error!(attempts = attempt, rows = rows.len(), error = %err, "Flush unit failed, giving up");
                    return Err(ConnectorError::WriteExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }

                let delay = config.retry.delay(attempt - 1);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Flush unit failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

async fn write_once<T>(config: &WriterConfig, target: &mut T, rows: &[Record]) -> Result<(), ConnectorError>
where
    T: FlushTarget + ?Sized,
{
    target.prepare().await?;

    if !config.transactional {
        return target.write(rows, config.concurrency.max(1)).await;
    }

    target.begin().await?;
    let result = match target.write(rows, config.concurrency.max(1)).await {
        Ok(()) => target.commit().await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        if let Err(rollback_err) = target.rollback().await {
            warn!(error = %rollback_err, "Rollback failed");
        }
        return Err(err);
    }
    Ok(())
}
