//! Core of the UART echo firmware: byte queue, transports, byte handler and
//! the injection path shared by the device loop and the host fuzz harness.

pub mod error;
pub mod queue;
pub mod slot;
pub mod transport;
pub mod sink;
pub mod display;
pub mod handler;
pub mod serial;
pub mod firmware;
pub mod transcript;
pub mod serial_port;

pub use error::{Error, Result};
pub use queue::{ByteQueue, OverflowPolicy, RingQueue, RX_BUF_SIZE};
pub use slot::{RxInterrupt, RxSlot};
pub use transport::{
    DeviceLink, Link, Origin, RxByte, RxCapacity, SharedWriter, SimulatedLink, Transport,
};
pub use sink::{DiagnosticSink, LineSink, LogSink, NullSink};
pub use display::TextDisplay;
pub use handler::{ByteHandler, EchoHandler};
pub use serial::Serial;
pub use firmware::Firmware;
pub use transcript::{Direction, Tap, Transcript, TranscriptEntry};
pub use serial_port::{LinkEvent, PortInfo, SerialConfig, SerialPortLink, UsartConfig};
