use std::io::Write;

use crate::Result;

/// Prefix of the per-byte diagnostic line on line-oriented sinks.
pub const RECORD_PREFIX: &str = "[HOST-OLED] byte=0x";

/// Where diagnostic records go: a text stream on the host, a character
/// display on the device.
pub trait DiagnosticSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// An absent string is a no-op.
    fn write_str(&mut self, s: Option<&str>) -> Result<()> {
        match s {
            Some(s) => self.write_bytes(s.as_bytes()),
            None => Ok(()),
        }
    }

    /// Two uppercase hex digits.
    fn write_hex(&mut self, byte: u8) -> Result<()> {
        self.write_bytes(hex::encode_upper([byte]).as_bytes())
    }

    /// The record emitted once per handled byte.
    fn record(&mut self, byte: u8) -> Result<()> {
        self.write_str(Some(RECORD_PREFIX))?;
        self.write_hex(byte)?;
        self.write_str(Some("\n"))
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Box<S> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn write_str(&mut self, s: Option<&str>) -> Result<()> {
        (**self).write_str(s)
    }

    fn write_hex(&mut self, byte: u8) -> Result<()> {
        (**self).write_hex(byte)
    }

    fn record(&mut self, byte: u8) -> Result<()> {
        (**self).record(byte)
    }
}

/// Line-oriented text stream.
#[derive(Debug)]
pub struct LineSink<W> {
    out: W,
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DiagnosticSink for LineSink<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Routes diagnostics to the `log` facade, one `info!` per completed line.
#[derive(Debug, Default)]
pub struct LogSink {
    line: Vec<u8>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for LogSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            if b == b'\n' {
                log::info!("{}", String::from_utf8_lossy(&self.line));
                self.line.clear();
            } else {
                self.line.push(b);
            }
        }
        Ok(())
    }

    fn record(&mut self, byte: u8) -> Result<()> {
        log::info!("rx byte=0x{}", hex::encode_upper([byte]));
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn write_bytes(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}
