//! Fill Scheduler Worker (§4.E): the 1-second tick that draws one eligible
//! execution via row-skip-locking, computes a stochastic fill, gates it
//! against the limit price, and publishes the result.

use chrono::Utc;
use rand::Rng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clients::PricingClient;
use crate::domain::TradeType;
use crate::metrics::EngineMetrics;
use crate::store::ExecutionStore;
use crate::workers::publisher::FillPublisher;

/// `{0.8, 0.6, 4.0, 0.2, 0.1}` — the multiplier table for `R > 100`. The
/// `4.0` entry intentionally overshoots `R`; the remaining-quantity cap
/// applied afterwards truncates it back down.
pub const FILL_MULTIPLIERS: [Decimal; 5] = [
    Decimal::from_parts(8, 0, 0, false, 1),
    Decimal::from_parts(6, 0, 0, false, 1),
    Decimal::from_parts(40, 0, 0, false, 1),
    Decimal::from_parts(2, 0, 0, false, 1),
    Decimal::from_parts(1, 0, 0, false, 1),
];

const FILL_CAP: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
const HUNDRED: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Draws `fill_qty` for one tick from `remaining` via the Fill-Sizing Rule.
/// Never negative, never above the 10,000-unit venue cap.
pub fn choose_fill_quantity(remaining: Decimal, rng: &mut impl Rng) -> Decimal {
    if remaining <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let u: f64 = rng.r#gen();
    if u < 0.10 {
        return remaining.floor().min(FILL_CAP);
    }
    if u < 0.15 {
        return Decimal::ZERO;
    }
    if remaining <= HUNDRED {
        return remaining.floor();
    }

    let idx = rng.gen_range(0..FILL_MULTIPLIERS.len());
    (remaining * FILL_MULTIPLIERS[idx]).floor().min(FILL_CAP)
}

/// Zeroes `fill_qty` when the trade is gated by its limit price: BUY/COVER
/// reject a price rise past the limit, SELL/SHORT reject a price drop below
/// it. A market order (no limit) is never gated.
fn apply_limit_price_gate(trade_type: TradeType, limit_price: Option<Decimal>, price: Decimal, fill_qty: Decimal) -> Decimal {
    let Some(limit) = limit_price else {
        return fill_qty;
    };
    if trade_type.is_buy_side() && price > limit {
        return Decimal::ZERO;
    }
    if trade_type.is_sell_side() && price < limit {
        return Decimal::ZERO;
    }
    fill_qty
}

/// `[5, 119]` seconds inclusive, uniform — matches the original's
/// `rand.Intn(115) + 5`.
fn next_fill_delay(rng: &mut impl Rng) -> chrono::Duration {
    chrono::Duration::seconds(rng.gen_range(5..=119))
}

pub struct FillSchedulerWorker {
    store: Arc<dyn ExecutionStore>,
    pricing: Arc<PricingClient>,
    publisher: FillPublisher,
    metrics: Arc<EngineMetrics>,
    rng: Mutex<StdRng>,
}

impl FillSchedulerWorker {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        pricing: Arc<PricingClient>,
        publisher: FillPublisher,
        metrics: Arc<EngineMetrics>,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            pricing,
            publisher,
            metrics,
            rng: Mutex::new(rng),
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tick.tick() => {
                    if let Err(e) = self.process_one_tick().await {
                        tracing::warn!(error = %e, "fill scheduler tick failed");
                    }
                }
            }
        }
    }

    async fn process_one_tick(&self) -> Result<(), crate::error::EngineError> {
        let Some(mut claim) = self.store.poll_next_for_fill().await? else {
            return Ok(());
        };
        let mut exec = claim.execution().clone();

        let remaining = exec.quantity_remaining();
        let fill_qty = {
            let mut rng = self.rng.lock().await;
            choose_fill_quantity(remaining, &mut *rng)
        };

        // §4.E step 5: a pricing failure aborts the transaction, releasing
        // the row lock so another tick can retry it.
        let price = match self.pricing.current_price(&exec.ticker).await {
            Ok(p) => p,
            Err(e) => {
                claim.rollback().await?;
                self.metrics
                    .external_call_errors_total
                    .with_label_values(&["pricing"])
                    .inc();
                return Err(e);
            }
        };

        let gated_qty = apply_limit_price_gate(exec.trade_type, exec.limit_price, price, fill_qty);
        let capped_qty = gated_qty.min(remaining);

        let delay = {
            let mut rng = self.rng.lock().await;
            next_fill_delay(&mut *rng)
        };

        exec.apply_fill(capped_qty, price, Utc::now(), delay);
        claim.update(exec.clone()).await?;
        // Publish while the row lock is still held (§4.A contract: the lock
        // guards the write-then-publish window), then commit.
        self.publisher.publish(&exec).await?;
        claim.commit().await?;

        self.metrics.fills_published_total.inc();
        self.metrics
            .fill_quantity
            .observe(capped_qty.to_f64().unwrap_or(0.0));

        tracing::info!(
            execution_service_id = exec.execution_service_id,
            fill_qty = %capped_qty,
            price = %price,
            status = exec.status.as_str(),
            "fill published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    #[test]
    fn full_fill_branch_never_exceeds_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let qty = choose_fill_quantity(dec!(50_000), &mut rng);
            assert!(qty <= FILL_CAP);
            assert!(qty >= Decimal::ZERO);
        }
    }

    #[test]
    fn small_remaining_never_exceeds_remaining() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let qty = choose_fill_quantity(dec!(80), &mut rng);
            assert!(qty <= dec!(80));
        }
    }

    #[test]
    fn zero_remaining_is_always_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(choose_fill_quantity(Decimal::ZERO, &mut rng), Decimal::ZERO);
    }

    #[test]
    fn buy_gated_when_price_above_limit() {
        let gated = apply_limit_price_gate(TradeType::Buy, Some(dec!(100)), dec!(101), dec!(50));
        assert_eq!(gated, Decimal::ZERO);
    }

    #[test]
    fn buy_not_gated_when_price_at_or_below_limit() {
        let gated = apply_limit_price_gate(TradeType::Buy, Some(dec!(100)), dec!(99), dec!(50));
        assert_eq!(gated, dec!(50));
    }

    #[test]
    fn sell_gated_when_price_below_limit() {
        let gated = apply_limit_price_gate(TradeType::Sell, Some(dec!(100)), dec!(99), dec!(50));
        assert_eq!(gated, Decimal::ZERO);
    }

    #[test]
    fn market_order_never_gated() {
        let gated = apply_limit_price_gate(TradeType::Buy, None, dec!(1_000_000), dec!(50));
        assert_eq!(gated, dec!(50));
    }

    #[test]
    fn delay_is_within_spec_bounds() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            let d = next_fill_delay(&mut rng);
            assert!(d >= chrono::Duration::seconds(5));
            assert!(d <= chrono::Duration::seconds(119));
        }
    }
}
