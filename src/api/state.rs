use crate::detect::engine::EngineHandle;
use crate::probes::ProbeRegistry;
use crate::storage::{EventStore, OutageLog};

#[derive(Clone)]
pub struct AppState {
    pub store: EventStore,
    pub outages: OutageLog,
    pub registry: ProbeRegistry,
    pub engine: EngineHandle,
    pub window: chrono::Duration,
}
