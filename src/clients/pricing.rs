//! Market price lookups against the pricing service (§4.C/§6). Unlike the
//! ticker cache this is never cached — the scheduler needs a fresh quote
//! on every fill attempt.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::EngineError;

/// The pricing service's response carries several fields; only `close` is
/// authoritative for fill pricing (resolved Open Question, see DESIGN.md).
#[derive(Debug, Deserialize)]
struct PriceResponse {
    close: f64,
}

pub struct PricingClient {
    http: reqwest::Client,
    base_url: String,
}

impl PricingClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    pub async fn current_price(&self, ticker: &str) -> Result<Decimal, EngineError> {
        let url = format!("{}/api/v1/price/{ticker}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::PricingUnavailable { status: status_of(&e) })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::PricingUnavailable {
                status: status.as_u16(),
            });
        }

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|_| EngineError::Malformed(format!("bad price response for {ticker}")))?;

        Decimal::try_from(body.close)
            .map_err(|_| EngineError::Malformed(format!("non-finite price for {ticker}")))
    }
}

fn status_of(err: &reqwest::Error) -> u16 {
    err.status().map(|s| s.as_u16()).unwrap_or(0)
}
