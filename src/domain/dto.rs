//! Wire DTOs for the orders/fills topics and the read API (§6).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::epoch_time::EpochSeconds;
use super::execution::{Execution, TradeType};
use crate::error::EngineError;

/// Inbound order message on the orders topic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    #[serde(rename = "id")]
    pub execution_service_id: i64,
    pub trade_type: String,
    pub destination: String,
    pub security_id: String,
    pub quantity: f64,
    #[serde(default)]
    pub limit_price: Option<f64>,
    pub received_timestamp: EpochSeconds,
    pub sent_timestamp: EpochSeconds,
    #[serde(default)]
    pub trade_service_execution_id: Option<i64>,
    pub version: i32,
}

impl OrderDto {
    pub fn trade_type(&self) -> Result<TradeType, EngineError> {
        self.trade_type.parse()
    }

    pub fn quantity_decimal(&self) -> Decimal {
        Decimal::try_from(self.quantity).unwrap_or_default()
    }

    /// Normalize the limit price per Order Intake step 4: a magnitude below
    /// 1e-4 is treated as absent (market order).
    pub fn normalized_limit_price(&self) -> Option<Decimal> {
        self.limit_price.and_then(|l| {
            if l.abs() < 1e-4 {
                None
            } else {
                Decimal::try_from(l).ok()
            }
        })
    }
}

/// Outbound DTO for both the fills topic and the read API; same shape as
/// the execution record plus a derived `average_price`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillDto {
    pub id: i64,
    pub execution_service_id: i64,
    pub is_open: bool,
    pub execution_status: String,
    pub trade_type: String,
    pub destination: String,
    pub security_id: String,
    pub ticker: String,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    pub received_timestamp: EpochSeconds,
    pub sent_timestamp: EpochSeconds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fill_timestamp: Option<EpochSeconds>,
    pub quantity_filled: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<Decimal>,
    pub number_of_fills: i16,
    pub total_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_service_execution_id: Option<i64>,
    pub version: i32,
}

impl From<&Execution> for FillDto {
    fn from(e: &Execution) -> Self {
        FillDto {
            id: e.id,
            execution_service_id: e.execution_service_id,
            is_open: e.is_open,
            execution_status: e.status.as_str().to_string(),
            trade_type: e.trade_type.as_str().to_string(),
            destination: e.destination.clone(),
            security_id: e.security_id.clone(),
            ticker: e.ticker.clone(),
            quantity: e.quantity_ordered,
            limit_price: e.limit_price,
            received_timestamp: EpochSeconds::from_datetime(e.received_timestamp),
            sent_timestamp: EpochSeconds::from_datetime(e.sent_timestamp),
            last_fill_timestamp: e.last_fill_timestamp.map(EpochSeconds::from_datetime),
            quantity_filled: e.quantity_filled,
            average_price: e.average_price(),
            number_of_fills: e.number_of_fills,
            total_amount: e.total_amount,
            trade_service_execution_id: e.trade_service_execution_id,
            version: e.version,
        }
    }
}

impl From<Execution> for FillDto {
    fn from(e: Execution) -> Self {
        FillDto::from(&e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_tiny_limit_to_absent() {
        let dto = OrderDto {
            execution_service_id: 1,
            trade_type: "BUY".into(),
            destination: "DEST".into(),
            security_id: "S1".into(),
            quantity: 10.0,
            limit_price: Some(0.00001),
            received_timestamp: EpochSeconds::now(),
            sent_timestamp: EpochSeconds::now(),
            trade_service_execution_id: None,
            version: 1,
        };
        assert_eq!(dto.normalized_limit_price(), None);
    }

    #[test]
    fn keeps_real_limit_price() {
        let dto = OrderDto {
            execution_service_id: 1,
            trade_type: "BUY".into(),
            destination: "DEST".into(),
            security_id: "S1".into(),
            quantity: 10.0,
            limit_price: Some(100.5),
            received_timestamp: EpochSeconds::now(),
            sent_timestamp: EpochSeconds::now(),
            trade_service_execution_id: None,
            version: 1,
        };
        assert_eq!(dto.normalized_limit_price(), Decimal::try_from(100.5).ok());
    }
}
