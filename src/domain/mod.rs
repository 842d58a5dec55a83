pub mod dto;
pub mod epoch_time;
pub mod execution;

pub use dto::{FillDto, OrderDto};
pub use epoch_time::EpochSeconds;
pub use execution::{Execution, ExecutionStatus, TradeType};
