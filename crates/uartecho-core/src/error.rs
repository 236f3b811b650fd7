use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("receive queue full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    #[error("serial port worker disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, Error>;
