use serde::Serialize;

/// An interactive node reservation obtained via `salloc` (spec §3).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub allocation_id: String,
    pub nodes_requested: u32,
    pub cores_per_node: u32,
    pub memory_per_node: String,
    pub time_limit: String,
    pub partition: String,
    pub job_name: String,
    pub nodes_allocated: Vec<String>,
    pub state: AllocationState,
    pub immediate: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationState {
    #[default]
    Requested,
    Allocated,
    Timeout,
    Failed,
    Deallocated,
}

impl AllocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AllocationState::Timeout | AllocationState::Failed | AllocationState::Deallocated
        )
    }
}
