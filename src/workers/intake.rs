//! Order Intake Worker (§4.D): one long-running task that turns inbound
//! order messages into open `Execution` rows, eligible for the scheduler
//! the moment they're persisted.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::bus::OrdersConsumer;
use crate::clients::TickerCacheClient;
use crate::domain::Execution;
use crate::metrics::EngineMetrics;
use crate::store::ExecutionStore;

pub struct OrderIntakeWorker {
    consumer: OrdersConsumer,
    ticker_cache: Arc<TickerCacheClient>,
    store: Arc<dyn ExecutionStore>,
    metrics: Arc<EngineMetrics>,
}

impl OrderIntakeWorker {
    pub fn new(
        consumer: OrdersConsumer,
        ticker_cache: Arc<TickerCacheClient>,
        store: Arc<dyn ExecutionStore>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            consumer,
            ticker_cache,
            store,
            metrics,
        }
    }

    /// Runs until `cancel` fires. Never blocks one order on another: the
    /// only outbound call in the loop is the ticker lookup, which completes
    /// (or fails) before the insert.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let (order, offset) = tokio::select! {
                _ = cancel.cancelled() => return,
                received = self.consumer.recv() => match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "error reading order message");
                        self.metrics.orders_skipped_total.with_label_values(&["bus_error"]).inc();
                        continue;
                    }
                },
            };

            let trade_type = match order.trade_type() {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(error = %e, security_id = %order.security_id, "malformed order, skipping");
                    self.metrics.orders_skipped_total.with_label_values(&["malformed"]).inc();
                    continue;
                }
            };

            let ticker = match self.ticker_cache.resolve(&order.security_id).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(error = %e, security_id = %order.security_id, "ticker lookup failed, skipping order");
                    self.metrics.orders_skipped_total.with_label_values(&["ticker_lookup"]).inc();
                    continue;
                }
            };

            let exec = Execution::new_open(
                order.execution_service_id,
                trade_type,
                order.destination.clone(),
                order.security_id.clone(),
                ticker,
                order.quantity_decimal(),
                order.normalized_limit_price(),
                order.received_timestamp.into_datetime(),
                order.sent_timestamp.into_datetime(),
                order.trade_service_execution_id,
                order.version,
            );

            if let Err(e) = self.store.create(exec).await {
                tracing::warn!(error = %e, security_id = %order.security_id, "failed to persist execution, skipping order");
                self.metrics.orders_skipped_total.with_label_values(&["store_error"]).inc();
                continue;
            }

            if let Err(e) = self.consumer.commit(&offset) {
                tracing::warn!(error = %e, "failed to commit consumer offset");
            }

            self.metrics.orders_ingested_total.inc();
            tracing::info!(
                execution_service_id = order.execution_service_id,
                "order ingested"
            );
        }
    }
}
