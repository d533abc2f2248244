pub mod executor;
pub mod polling;

pub use executor::{execute, ExecError, ExecOutput, ExecRequest};
pub use polling::{poll_until, PollOutcome};
