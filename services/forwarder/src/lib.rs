// forwarder: The buffered log-forwarding engine as a library.
// Everything the binary wires together is public so the integration
// suites can drive the buffer, runner, and sinks directly.

pub mod buffer;
pub mod config;
pub mod host;
pub mod index;
pub mod logger;
pub mod runner;
pub mod sink;
pub mod storage;
