//! The 13 named tools (spec §6's wire contract) wrapping [`SlurmAdapter`]
//! capability calls as [`runtime::Tool`] implementations. Grouped the way
//! the teacher groups its DTOs: by the part of the domain they talk about,
//! not one file per tool.

mod allocation;
mod cluster;
mod jobs;

use std::sync::Arc;

use runtime::ToolRegistry;
use service::{AdapterDeps, SlurmAdapter};

pub fn register_all(registry: &mut ToolRegistry, adapter: Arc<SlurmAdapter<AdapterDeps>>) {
    jobs::register(registry, adapter.clone());
    cluster::register(registry, adapter.clone());
    allocation::register(registry, adapter);
}
