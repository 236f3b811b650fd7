//! Byte-stream driver for the UART echo core: every input byte goes through
//! the injection path, in stream order.

pub mod cli;
pub mod driver;

pub use cli::{Cli, SinkKind};
pub use driver::{drive, format_port, run, run_stream, InputSource, Summary, EXIT_OPEN_FAILED, EXIT_RUNTIME_ERROR};
