pub mod allocation;
pub mod array_job;
pub mod cluster;
pub mod job;
pub mod tool_call;

pub use allocation::{Allocation, AllocationState};
pub use array_job::ArrayJob;
pub use cluster::{ClusterInfo, Node, NodeState, Partition, PartitionState};
pub use job::{Job, JobState};
pub use tool_call::{ResultEnvelope, ToolCall};
