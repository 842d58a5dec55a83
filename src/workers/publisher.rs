//! Fill Publisher (§4.F). Not a separate task — the scheduler worker calls
//! this once per tick, after the execution update has already been
//! persisted, to serialize and publish the resulting fill.

use std::sync::Arc;

use crate::bus::FillsProducer;
use crate::domain::{Execution, FillDto};
use crate::error::EngineError;

pub struct FillPublisher {
    producer: Arc<FillsProducer>,
}

impl FillPublisher {
    pub fn new(producer: Arc<FillsProducer>) -> Self {
        Self { producer }
    }

    /// No partition key is set — fills fan out across whatever partitions
    /// the fills topic has.
    pub async fn publish(&self, exec: &Execution) -> Result<(), EngineError> {
        let fill: FillDto = exec.into();
        self.producer.publish(&fill).await
    }
}
