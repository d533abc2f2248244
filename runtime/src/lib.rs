pub mod dispatcher;
pub mod jsonrpc;
pub mod pool;
pub mod registry;
pub mod tool;
pub mod transport;
pub mod validate;

pub use dispatcher::{Dispatched, Dispatcher, ServerInfo};
pub use jsonrpc::{ProtocolError, RawRequest, Response};
pub use pool::WorkerPool;
pub use registry::ToolRegistry;
pub use tool::{ArgSpec, ArgType, Tool, ToolSchema};
