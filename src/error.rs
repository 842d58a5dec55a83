//! Unified error type for every fallible operation in the engine.
//!
//! Mirrors the error kinds of the design's error model: bus, catalogue,
//! pricing, and store failures are all transient and handled by logging and
//! skipping the affected unit of work; `Malformed` never fails a worker;
//! `Cancelled` propagates and lets a worker exit cleanly.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("message bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("security catalogue unavailable: status {status}")]
    CatalogUnavailable { status: u16 },

    #[error("pricing service unavailable: status {status}")]
    PricingUnavailable { status: u16 },

    #[error("execution store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("operation cancelled")]
    Cancelled,
}
