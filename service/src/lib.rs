pub mod adapter;
pub mod backend;
pub mod config;
pub mod paths;

pub use adapter::{
    build_adapter, AdapterDeps, AllocateNodesRequest, JobOutput, OutputStream, SlurmAdapter, SlurmAdapterState,
    SubmitArrayJobRequest, SubmitJobRequest,
};
pub use backend::{BackendOutput, MockBackend, RealBackend, SlurmBackend};
pub use config::AdapterConfig;
