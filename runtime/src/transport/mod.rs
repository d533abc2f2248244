//! The two interchangeable ways a client can reach the dispatcher (spec
//! §4.6): line-delimited JSON-RPC over stdio, or JSON-RPC framed as HTTP
//! POSTs with responses streamed back over Server-Sent Events.

pub mod sse;
pub mod stdio;
