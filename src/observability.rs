// Centralized observability: structured logging, request tracing, and counters
// for the federation pipeline (parse -> fan-out -> rank -> facet -> respond).

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);
static SEARCH_COUNTER: AtomicU64 = AtomicU64::new(0);
static PROVIDER_TIMEOUT_COUNTER: AtomicU64 = AtomicU64::new(0);
static CACHE_HIT_COUNTER: AtomicU64 = AtomicU64::new(0);
static CACHE_MISS_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize logging and tracing. Call once at process startup.
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("search_gateway=debug,info")
    } else {
        EnvFilter::new("search_gateway=warn,error")
    };

    // --quiet always wins, even over RUST_LOG.
    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            if !quiet {
                info!("search gateway observability initialized");
            }
            Ok(())
        }
        // Already initialized; fine in test binaries that share a process.
        Err(_) => Ok(()),
    }
}

/// Structured operations emitted across the search pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    RequestParsed {
        filter_count: usize,
    },
    RequestValidationFailed {
        error_count: usize,
    },
    ProviderSearch {
        provider: String,
        result_count: usize,
    },
    ProviderTimeout {
        provider: String,
    },
    ProviderSkippedNoCapability {
        provider: String,
    },
    FederatedFanOut {
        provider_count: usize,
        entity_count: usize,
    },
    RankingComplete {
        strategy: String,
        entity_count: usize,
    },
    RankingFallback {
        from_strategy: String,
        to_strategy: String,
    },
    FacetComputed {
        attribute_count: usize,
    },
    CacheHit {
        attribute: String,
    },
    CacheMiss {
        attribute: String,
    },
    Startup {
        version: String,
    },
    Shutdown {
        reason: String,
    },
}

impl Operation {
    pub fn validate(&self) -> Result<()> {
        match self {
            Operation::FederatedFanOut { provider_count, .. } => {
                if *provider_count == 0 {
                    anyhow::bail!("federated fan-out with zero providers");
                }
            }
            Operation::RankingFallback {
                from_strategy,
                to_strategy,
            } => {
                if from_strategy == to_strategy {
                    anyhow::bail!("ranking fallback to the same strategy is not meaningful");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter { name: &'static str, value: u64 },
    Gauge { name: &'static str, value: f64 },
    Histogram { name: &'static str, value: f64, unit: &'static str },
    Timer { name: &'static str, duration: Duration },
}

/// Per-request tracing context, threaded through federator fan-out, ranking,
/// and facet computation. One root context per request; a `child` per
/// provider task or sub-stage.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub operation: String,
    pub start_time: Instant,
    pub attributes: Vec<(String, String)>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn child(&self, operation: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[instrument(skip(ctx))]
pub fn log_operation(ctx: &OperationContext, op: &Operation, result: &Result<()>) {
    let elapsed = ctx.elapsed();
    let attrs = ctx
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");

    match result {
        Ok(()) => {
            info!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                attributes = %attrs,
                "operation completed: {:?}", op
            );
            OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                parent_span_id = ?ctx.parent_span_id,
                operation = %ctx.operation,
                elapsed_ms = elapsed.as_millis(),
                attributes = %attrs,
                error = %e,
                "operation failed: {:?}", op
            );
            ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
    }

    match op {
        Operation::ProviderSearch { .. } => {
            SEARCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Operation::ProviderTimeout { .. } => {
            PROVIDER_TIMEOUT_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Operation::CacheHit { .. } => {
            CACHE_HIT_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Operation::CacheMiss { .. } => {
            CACHE_MISS_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        _ => {}
    }
}

pub fn record_metric(metric: MetricType) {
    match metric {
        MetricType::Counter { name, value } => debug!("metric.counter {} = {}", name, value),
        MetricType::Gauge { name, value } => debug!("metric.gauge {} = {}", name, value),
        MetricType::Histogram { name, value, unit } => {
            debug!("metric.histogram {} = {} {}", name, value, unit)
        }
        MetricType::Timer { name, duration } => debug!("metric.timer {} = {:?}", name, duration),
    }
}

/// Run a future under a fresh trace context, logging entry/exit and timing.
pub async fn with_trace_id<F, T>(operation: &str, f: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let ctx = OperationContext::new(operation);
    info!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, "starting operation: {}", operation);

    let start = Instant::now();
    let result = f.await;
    let elapsed = start.elapsed();

    match &result {
        Ok(_) => {
            info!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                elapsed_ms = elapsed.as_millis(),
                "operation completed successfully: {}", operation
            );
            record_metric(MetricType::Timer {
                name: "operation.duration",
                duration: elapsed,
            });
        }
        Err(e) => {
            error!(
                trace_id = %ctx.trace_id,
                span_id = %ctx.span_id,
                elapsed_ms = elapsed.as_millis(),
                error = %e,
                "operation failed: {}", operation
            );
            record_metric(MetricType::Counter {
                name: "operation.errors",
                value: 1,
            });
        }
    }

    result
}

pub fn get_metrics() -> serde_json::Value {
    serde_json::json!({
        "operations": {
            "total": OPERATION_COUNTER.load(Ordering::Relaxed),
            "errors": ERROR_COUNTER.load(Ordering::Relaxed),
            "searches": SEARCH_COUNTER.load(Ordering::Relaxed),
            "provider_timeouts": PROVIDER_TIMEOUT_COUNTER.load(Ordering::Relaxed),
            "cache_hits": CACHE_HIT_COUNTER.load(Ordering::Relaxed),
            "cache_misses": CACHE_MISS_COUNTER.load(Ordering::Relaxed),
        },
        "timestamp": Utc::now().to_rfc3339(),
    })
}

#[instrument]
pub fn log_error_with_context(error: &anyhow::Error, ctx: &OperationContext) {
    let error_chain = error
        .chain()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(" -> ");

    error!(
        trace_id = %ctx.trace_id,
        span_id = %ctx.span_id,
        operation = %ctx.operation,
        error_chain = %error_chain,
        "error occurred during operation"
    );
}

/// Scoped timer that logs its own duration on drop. Used around provider
/// calls and facet value-cache fetches where an explicit end point is
/// awkward to thread through every early return.
pub struct PerfTimer {
    name: String,
    start: Instant,
    ctx: OperationContext,
}

impl PerfTimer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ctx = OperationContext::new(&name);
        info!(trace_id = %ctx.trace_id, span_id = %ctx.span_id, "timer started: {}", name);
        Self {
            name,
            start: Instant::now(),
            ctx,
        }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        info!(
            trace_id = %self.ctx.trace_id,
            span_id = %self.ctx.span_id,
            elapsed_ms = elapsed.as_millis(),
            "timer completed: {}", self.name
        );
        record_metric(MetricType::Timer {
            name: "perf.timer",
            duration: elapsed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_context_creates_linked_child() {
        let ctx = OperationContext::new("test_operation");
        assert_eq!(ctx.operation, "test_operation");
        assert!(ctx.parent_span_id.is_none());

        let child = ctx.child("child_operation");
        assert_eq!(child.trace_id, ctx.trace_id);
        assert_eq!(child.parent_span_id, Some(ctx.span_id));
    }

    #[test]
    fn metrics_snapshot_has_expected_shape() {
        record_metric(MetricType::Counter {
            name: "test.counter",
            value: 42,
        });
        let metrics = get_metrics();
        assert!(metrics["timestamp"].is_string());
        assert!(metrics["operations"].is_object());
    }

    #[tokio::test]
    async fn with_trace_id_returns_inner_result() {
        let result = with_trace_id("test_async_op", async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, anyhow::Error>(42)
        })
        .await;

        assert_eq!(result.expect("operation should succeed"), 42);
    }

    #[test]
    fn perf_timer_records_on_drop() {
        {
            let _timer = PerfTimer::new("test_timer");
            std::thread::sleep(Duration::from_millis(5));
        }
        let metrics = get_metrics();
        assert!(metrics["operations"]["total"].as_u64().is_some());
    }

    #[test]
    fn logging_level_filters_are_valid() {
        for filter_str in ["error", "search_gateway=debug,info", "search_gateway=warn,error"] {
            assert!(EnvFilter::try_new(filter_str).is_ok());
        }
    }

    #[test]
    fn federated_fan_out_requires_at_least_one_provider() {
        let op = Operation::FederatedFanOut {
            provider_count: 0,
            entity_count: 0,
        };
        assert!(op.validate().is_err());
    }
}
