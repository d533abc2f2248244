use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub name: String,
    pub state: PartitionState,
    pub nodes_total: u32,
    pub nodes_idle: u32,
    pub time_limit: String,
    pub default: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionState {
    #[default]
    Up,
    Down,
    Drain,
}

impl PartitionState {
    pub fn from_sinfo_code(code: &str) -> PartitionState {
        match code.trim_end_matches('*').to_ascii_lowercase().as_str() {
            "up" => PartitionState::Up,
            "down" => PartitionState::Down,
            "drain" | "drained" | "draining" => PartitionState::Drain,
            _ => PartitionState::Up,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    pub state: NodeState,
    pub cpus_total: u32,
    pub cpus_used: u32,
    pub memory_total: u64,
    pub features: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Idle,
    Alloc,
    Mix,
    Down,
    Drain,
    #[default]
    Unknown,
}

impl NodeState {
    pub fn from_slurm_code(code: &str) -> NodeState {
        match code.trim_end_matches('*').to_ascii_uppercase().as_str() {
            "IDLE" => NodeState::Idle,
            "ALLOCATED" | "ALLOC" => NodeState::Alloc,
            "MIXED" | "MIX" => NodeState::Mix,
            "DOWN" => NodeState::Down,
            "DRAIN" | "DRAINED" | "DRAINING" => NodeState::Drain,
            _ => NodeState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub cluster_name: String,
    pub slurm_version: String,
    pub partitions: Vec<Partition>,
    pub real_slurm: bool,
}
