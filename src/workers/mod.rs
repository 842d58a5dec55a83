//! The two long-running tasks that drive the engine (§4.D/§4.E/§5).

pub mod intake;
pub mod publisher;
pub mod scheduler;

pub use intake::OrderIntakeWorker;
pub use publisher::FillPublisher;
pub use scheduler::FillSchedulerWorker;
