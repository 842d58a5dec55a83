//! The `Execution` domain record (§3) and its small enums.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::Zero;

use crate::error::EngineError;

/// Execution status: no-fills-yet / partially-filled / completely-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Work,
    Part,
    Full,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Work => "WORK",
            ExecutionStatus::Part => "PART",
            ExecutionStatus::Full => "FULL",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WORK" => Ok(ExecutionStatus::Work),
            "PART" => Ok(ExecutionStatus::Part),
            "FULL" => Ok(ExecutionStatus::Full),
            other => Err(EngineError::Malformed(format!(
                "unknown execution status: {other}"
            ))),
        }
    }
}

/// Trade direction. BUY/COVER are gated against a rising price past the
/// limit; SELL/SHORT are gated against a falling price below the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    Buy,
    Sell,
    Short,
    Cover,
}

impl TradeType {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
            TradeType::Short => "SHORT",
            TradeType::Cover => "COVER",
        }
    }

    /// BUY/COVER: gated when price rises above the limit.
    pub fn is_buy_side(self) -> bool {
        matches!(self, TradeType::Buy | TradeType::Cover)
    }

    /// SELL/SHORT: gated when price falls below the limit.
    pub fn is_sell_side(self) -> bool {
        matches!(self, TradeType::Sell | TradeType::Short)
    }
}

impl std::str::FromStr for TradeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            "SHORT" => Ok(TradeType::Short),
            "COVER" => Ok(TradeType::Cover),
            other => Err(EngineError::Malformed(format!(
                "unknown trade type: {other}"
            ))),
        }
    }
}

/// A persistent record of one working order undergoing progressive fills.
/// See SPEC_FULL.md §3 for the field-level invariants this type must uphold.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: i64,
    pub execution_service_id: i64,
    pub is_open: bool,
    pub status: ExecutionStatus,
    pub trade_type: TradeType,
    pub destination: String,
    pub security_id: String,
    pub ticker: String,
    pub quantity_ordered: Decimal,
    pub limit_price: Option<Decimal>,
    pub received_timestamp: DateTime<Utc>,
    pub sent_timestamp: DateTime<Utc>,
    pub last_fill_timestamp: Option<DateTime<Utc>>,
    pub next_fill_timestamp: Option<DateTime<Utc>>,
    pub quantity_filled: Decimal,
    pub number_of_fills: i16,
    pub total_amount: Decimal,
    pub trade_service_execution_id: Option<i64>,
    pub version: i32,
}

impl Execution {
    /// Build a brand-new, unsaved execution from an inbound order, per
    /// Order Intake step 5: WORK/open, zeroed fill progress, eligible for
    /// the scheduler immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn new_open(
        execution_service_id: i64,
        trade_type: TradeType,
        destination: String,
        security_id: String,
        ticker: String,
        quantity_ordered: Decimal,
        limit_price: Option<Decimal>,
        received_timestamp: DateTime<Utc>,
        sent_timestamp: DateTime<Utc>,
        trade_service_execution_id: Option<i64>,
        version: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            execution_service_id,
            is_open: true,
            status: ExecutionStatus::Work,
            trade_type,
            destination,
            security_id,
            ticker,
            quantity_ordered,
            limit_price,
            received_timestamp,
            sent_timestamp,
            last_fill_timestamp: None,
            next_fill_timestamp: Some(now),
            quantity_filled: Decimal::ZERO,
            number_of_fills: 0,
            total_amount: Decimal::ZERO,
            trade_service_execution_id,
            version,
        }
    }

    pub fn quantity_remaining(&self) -> Decimal {
        self.quantity_ordered - self.quantity_filled
    }

    /// `total_amount / quantity_filled`, rounded to 4 decimal places,
    /// computed at read time only (never persisted). `None` while
    /// `quantity_filled == 0`, per invariant 2/6.
    pub fn average_price(&self) -> Option<Decimal> {
        if self.quantity_filled.is_zero() {
            return None;
        }
        Some((self.total_amount / self.quantity_filled).round_dp(4))
    }

    /// Apply one fill attempt (possibly zero quantity) and advance the state
    /// machine, per the Fill Scheduler Worker step 8. `next_fill_delay`
    /// supplies the uniform-random `[5, 119]` second offset when the
    /// execution remains open.
    pub fn apply_fill(&mut self, fill_qty: Decimal, price: Decimal, now: DateTime<Utc>, next_fill_delay: chrono::Duration) {
        self.quantity_filled += fill_qty;
        self.total_amount += fill_qty * price;
        self.number_of_fills += 1;
        self.last_fill_timestamp = Some(now);

        if self.quantity_filled >= self.quantity_ordered {
            self.is_open = false;
            self.status = ExecutionStatus::Full;
        } else if fill_qty > Decimal::ZERO {
            self.status = ExecutionStatus::Part;
        }

        self.next_fill_timestamp = if self.is_open {
            Some(now + next_fill_delay)
        } else {
            None
        };
    }
}
