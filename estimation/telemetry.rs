use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_telemetry::{DiagnosticEvent, DiagnosticSink, JsonLogger, LogLevel, LogRecord};

/// Builder configuring telemetry for the evaluation core.
pub struct EvaluationTelemetryBuilder {
    component: String,
    log_path: Option<PathBuf>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl EvaluationTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_path: None,
            sink: None,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Assigns the diagnostic sink.
    #[must_use]
    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<EvaluationTelemetry> {
        EvaluationTelemetry::new(self.component, self.log_path, self.sink)
    }
}

/// Telemetry handle shared by the policy, rollout engine, and evaluator.
#[derive(Clone)]
pub struct EvaluationTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for EvaluationTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationTelemetry")
            .field("component", &self.inner.component)
            .finish()
    }
}

struct TelemetryInner {
    component: String,
    logger: Option<JsonLogger>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl EvaluationTelemetry {
    fn new(
        component: impl Into<String>,
        log_path: Option<PathBuf>,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> Result<Self> {
        let logger = if let Some(path) = log_path {
            Some(JsonLogger::new(path)?)
        } else {
            None
        };
        Ok(Self {
            inner: Arc::new(TelemetryInner {
                component: component.into(),
                logger,
                sink,
            }),
        })
    }

    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(component: impl Into<String>) -> EvaluationTelemetryBuilder {
        EvaluationTelemetryBuilder::new(component)
    }

    /// Logs a structured record.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let mut record = LogRecord::new(&self.inner.component, level, message);
            if let Some(object) = metadata.as_object() {
                record.metadata = object.clone();
            }
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Emits a diagnostic event via the configured sink.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(sink) = &self.inner.sink {
            sink.emit(DiagnosticEvent::new(
                self.inner.component.clone(),
                event_type,
                payload,
            ))?;
        }
        Ok(())
    }
}
