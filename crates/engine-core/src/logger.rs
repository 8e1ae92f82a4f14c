use serde_json::Value as JsonValue;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

/// Sink for the orchestrator's progress events. Must not fail or block.
pub trait PipelineLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, data: Option<&JsonValue>);
}

impl<F> PipelineLogger for F
where
    F: Fn(LogLevel, &str, Option<&JsonValue>) + Send + Sync,
{
    fn log(&self, level: LogLevel, message: &str, data: Option<&JsonValue>) {
        self(level, message, data)
    }
}

/// Forwards pipeline events to `tracing`, with the payload as a `data` field.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    pipeline: Option<String>,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_pipeline(name: impl Into<String>) -> Self {
        Self {
            pipeline: Some(name.into()),
        }
    }
}

impl PipelineLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, data: Option<&JsonValue>) {
        let pipeline = self.pipeline.as_deref().unwrap_or("-");
        let data = data.map(JsonValue::to_string).unwrap_or_default();
        match level {
            LogLevel::Error => tracing::error!(pipeline, data = %data, "{message}"),
            LogLevel::Info => tracing::info!(pipeline, data = %data, "{message}"),
            LogLevel::Debug => tracing::debug!(pipeline, data = %data, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    #[test]
    fn closures_are_loggers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let logger = move |level: LogLevel, message: &str, data: Option<&JsonValue>| {
            sink.lock()
                .unwrap()
                .push((level, message.to_string(), data.cloned()));
        };

        logger.log(LogLevel::Info, "hello", Some(&json!({"rows": 2})));

        assert_eq!(seen.lock().unwrap().as_slice(), &[(
            LogLevel::Info,
            "hello".to_string(),
            Some(json!({"rows": 2}))
        )]);
    }

    #[traced_test]
    #[test]
    fn tracing_logger_emits_message_and_payload() {
        TracingLogger::for_pipeline("orders").log(
            LogLevel::Error,
            "Batch failed",
            Some(&json!({"position": 7})),
        );

        assert!(logs_contain("Batch failed"));
        assert!(logs_contain("orders"));
        assert!(logs_contain("position"));
    }
}
