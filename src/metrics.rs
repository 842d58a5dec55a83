//! Prometheus metrics for the intake and fill-scheduler pipelines.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

/// Central registry for all engine metrics, cloned (cheaply, via `Arc`
/// internals on the counters) into every worker and the HTTP handler.
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    pub orders_ingested_total: IntCounter,
    pub orders_skipped_total: IntCounterVec,
    pub fills_published_total: IntCounter,
    pub fill_quantity: Histogram,
    pub external_call_errors_total: IntCounterVec,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_ingested_total = IntCounter::with_opts(
            Opts::new(
                "engine_orders_ingested_total",
                "Total orders successfully inserted as open executions",
            )
            .namespace("fix_engine"),
        )?;
        registry.register(Box::new(orders_ingested_total.clone()))?;

        let orders_skipped_total = IntCounterVec::new(
            Opts::new(
                "engine_orders_skipped_total",
                "Orders skipped during intake, by reason",
            )
            .namespace("fix_engine"),
            &["reason"],
        )?;
        registry.register(Box::new(orders_skipped_total.clone()))?;

        let fills_published_total = IntCounter::with_opts(
            Opts::new(
                "engine_fills_published_total",
                "Total fill events published to the fills topic",
            )
            .namespace("fix_engine"),
        )?;
        registry.register(Box::new(fills_published_total.clone()))?;

        let fill_quantity = Histogram::with_opts(
            HistogramOpts::new("engine_fill_quantity", "Distribution of realized fill sizes")
                .namespace("fix_engine")
                .buckets(vec![
                    0.0, 1.0, 10.0, 100.0, 1_000.0, 5_000.0, 10_000.0,
                ]),
        )?;
        registry.register(Box::new(fill_quantity.clone()))?;

        let external_call_errors_total = IntCounterVec::new(
            Opts::new(
                "engine_external_call_errors_total",
                "Failures calling external services, by client",
            )
            .namespace("fix_engine"),
            &["client"],
        )?;
        registry.register(Box::new(external_call_errors_total.clone()))?;

        Ok(Self {
            registry,
            orders_ingested_total,
            orders_skipped_total,
            fills_published_total,
            fill_quantity,
            external_call_errors_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new().expect("metric registration cannot fail with fixed, valid metric names")
    }
}
