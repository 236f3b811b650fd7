use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use uartecho_core::OverflowPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "uart-fuzz",
    version,
    about = "Feed a byte stream through the UART echo injection path",
    long_about = None
)]
pub struct Cli {
    /// Input file; standard input when omitted
    pub input: Option<PathBuf>,

    /// What to do when the receive queue is full
    #[arg(long, default_value = "overwrite")]
    pub overflow: OverflowPolicy,

    /// Where diagnostic records go
    #[arg(long, value_enum, default_value_t = SinkKind::Line)]
    pub sink: SinkKind,

    /// Write an RX/TX transcript (hex) to this file when the stream ends
    #[arg(long)]
    pub transcript: Option<PathBuf>,

    /// Run the device loop against a serial port instead of a byte stream
    #[arg(long, conflicts_with = "input")]
    pub port: Option<String>,

    /// Print the serial ports found on this host and exit
    #[arg(long, conflicts_with_all = ["input", "port", "transcript"])]
    pub list_ports: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Text lines on stdout, interleaved with the echo
    Line,
    /// `info!` records through the logger
    Log,
    /// Discard
    #[value(name = "none")]
    Discard,
}
