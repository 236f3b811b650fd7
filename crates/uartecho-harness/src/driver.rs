use anyhow::Context;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use uartecho_core::{
    ByteHandler, DiagnosticSink, Firmware, LineSink, LinkEvent, LogSink, NullSink, OverflowPolicy,
    PortInfo, Serial, SerialConfig, SerialPortLink, SharedWriter, SimulatedLink, Tap, Transcript,
    Transport,
};

use crate::cli::{Cli, SinkKind};

pub const EXIT_OPEN_FAILED: u8 = 1;
pub const EXIT_RUNTIME_ERROR: u8 = 2;

const TRANSCRIPT_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    pub fn from_arg(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::File(p.to_path_buf()),
            None => Self::Stdin,
        }
    }

    pub fn open(&self) -> io::Result<Box<dyn Read>> {
        Ok(match self {
            Self::Stdin => Box::new(io::stdin().lock()),
            Self::File(path) => Box::new(File::open(path)?),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub injected: u64,
    pub overruns: u64,
}

/// Inject every byte of `source` in order; returns how many went in.
pub fn drive<R, T, S, H>(source: R, serial: &mut Serial<T, S, H>) -> io::Result<u64>
where
    R: Read,
    T: Transport,
    S: DiagnosticSink,
    H: ByteHandler<T, S>,
{
    let mut injected = 0;
    for byte in BufReader::new(source).bytes() {
        serial.inject(byte?);
        injected += 1;
    }
    Ok(injected)
}

/// Run a whole stream through a host serial core whose echo and line records
/// go to `out`. Traffic is recorded only when a transcript is given.
pub fn run_stream<R, W>(
    source: R,
    out: W,
    overflow: OverflowPolicy,
    sink: SinkKind,
    transcript: Option<Arc<Mutex<Transcript>>>,
) -> anyhow::Result<Summary>
where
    R: Read,
    W: Write + 'static,
{
    let out = SharedWriter::new(out);
    let sim = SimulatedLink::new(out.clone(), overflow);
    let link = match transcript {
        Some(transcript) => Tap::new(sim, transcript),
        None => Tap::passthrough(sim),
    };
    let sink: Box<dyn DiagnosticSink> = match sink {
        SinkKind::Line => Box::new(LineSink::new(out.clone())),
        SinkKind::Log => Box::new(LogSink::new()),
        SinkKind::Discard => Box::new(NullSink),
    };

    let mut serial = Serial::new(link, sink);
    serial.init();
    let injected = drive(source, &mut serial).context("reading input stream")?;
    out.lock().flush().context("flushing output")?;

    let summary = Summary {
        injected,
        overruns: serial.transport().overruns(),
    };
    log::debug!("stream done: {summary:?}");
    Ok(summary)
}

/// `name (VID:PID)` for USB ports, `name [type]` otherwise.
pub fn format_port(info: &PortInfo) -> String {
    match (info.vid, info.pid) {
        (Some(vid), Some(pid)) => format!("{} ({vid:04X}:{pid:04X})", info.port_name),
        _ => format!("{} [{}]", info.port_name, info.port_type),
    }
}

fn list_ports(out: &mut impl Write) -> anyhow::Result<()> {
    let ports = SerialPortLink::list_ports();
    if ports.is_empty() {
        log::info!("no serial ports found");
    }
    for info in &ports {
        writeln!(out, "{}", format_port(info)).context("writing port list")?;
    }
    Ok(())
}

pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    if cli.list_ports {
        list_ports(&mut io::stdout().lock())?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(port) = &cli.port {
        run_device(port)?;
        return Ok(ExitCode::SUCCESS);
    }

    let input = InputSource::from_arg(cli.input.as_deref());
    let source = match input.open() {
        Ok(source) => source,
        Err(e) => {
            let name = match &input {
                InputSource::File(path) => path.display().to_string(),
                InputSource::Stdin => "<stdin>".to_string(),
            };
            eprintln!("open {name}: {e}");
            return Ok(ExitCode::from(EXIT_OPEN_FAILED));
        }
    };

    let transcript = cli
        .transcript
        .as_ref()
        .map(|_| Arc::new(Mutex::new(Transcript::new(TRANSCRIPT_LIMIT))));

    let summary = run_stream(source, io::stdout(), cli.overflow, cli.sink, transcript.clone())?;
    if summary.overruns > 0 {
        log::warn!("{} queued byte(s) were overwritten", summary.overruns);
    }

    if let (Some(path), Some(transcript)) = (&cli.transcript, transcript) {
        std::fs::write(path, transcript.lock().to_text(true))
            .with_context(|| format!("writing transcript {}", path.display()))?;
    }

    Ok(ExitCode::SUCCESS)
}

fn run_device(port: &str) -> anyhow::Result<()> {
    let mut link = SerialPortLink::open(SerialConfig::new(port))
        .with_context(|| format!("opening serial port {port}"))?;
    let mut firmware = Firmware::boot(link.device_link()?);

    loop {
        if firmware.run_until_idle() > 0 {
            log::info!("display: {}", firmware.display().row_text(1).unwrap_or_default());
        }
        match link.events().recv_timeout(Duration::from_millis(1)) {
            Ok(LinkEvent::Opened(name)) => log::info!("listening on {name}"),
            Ok(LinkEvent::Overrun(total)) => log::warn!("receive overruns: {total}"),
            Ok(LinkEvent::Error(e)) => log::error!("serial port: {e}"),
            Ok(LinkEvent::Closed) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    firmware.run_until_idle();
    link.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stream_echoes_and_records_in_order() {
        let cap = Capture::default();
        let summary = run_stream(
            Cursor::new(vec![0x41, 0x00, 0xFF]),
            cap.clone(),
            OverflowPolicy::Overwrite,
            SinkKind::Line,
            None,
        )
        .unwrap();
        assert_eq!(summary, Summary { injected: 3, overruns: 0 });
        assert_eq!(
            cap.0.lock().as_slice(),
            b"A[HOST-OLED] byte=0x41\n\x00[HOST-OLED] byte=0x00\n\xFF[HOST-OLED] byte=0xFF\n"
        );
    }

    #[test]
    fn none_sink_leaves_only_echo() {
        let cap = Capture::default();
        run_stream(
            Cursor::new(b"hello".to_vec()),
            cap.clone(),
            OverflowPolicy::Overwrite,
            SinkKind::Discard,
            None,
        )
        .unwrap();
        assert_eq!(cap.0.lock().as_slice(), b"hello");
    }

    #[test]
    fn long_stream_counts_overruns() {
        let cap = Capture::default();
        let summary = run_stream(
            Cursor::new(vec![0xAA; 300]),
            cap.clone(),
            OverflowPolicy::Overwrite,
            SinkKind::Discard,
            None,
        )
        .unwrap();
        assert_eq!(summary.injected, 300);
        assert_eq!(summary.overruns, 300 - 256);
        assert_eq!(cap.0.lock().len(), 300);
    }

    #[test]
    fn transcript_is_filled() {
        let transcript = Arc::new(Mutex::new(Transcript::new(16)));
        run_stream(
            Cursor::new(vec![0x01]),
            Capture::default(),
            OverflowPolicy::Reject,
            SinkKind::Log,
            Some(transcript.clone()),
        )
        .unwrap();
        assert_eq!(transcript.lock().to_text(true), "RX: 01\nTX: 01\n");
    }

    #[test]
    fn untapped_stream_still_echoes() {
        let cap = Capture::default();
        let summary = run_stream(
            Cursor::new(vec![0x10, 0x20]),
            cap.clone(),
            OverflowPolicy::Overwrite,
            SinkKind::Discard,
            None,
        )
        .unwrap();
        assert_eq!(summary.injected, 2);
        assert_eq!(cap.0.lock().as_slice(), &[0x10, 0x20]);
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "unplugged"))
        }
    }

    struct FlushFails;

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn read_failure_is_labelled_as_input() {
        let err = run_stream(
            BrokenReader,
            Capture::default(),
            OverflowPolicy::Overwrite,
            SinkKind::Discard,
            None,
        )
        .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("reading input stream"), "{msg}");
        assert!(msg.contains("unplugged"), "{msg}");
    }

    #[test]
    fn flush_failure_is_labelled_as_output() {
        let err = run_stream(
            Cursor::new(vec![0x41]),
            FlushFails,
            OverflowPolicy::Overwrite,
            SinkKind::Discard,
            None,
        )
        .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("flushing output"), "{msg}");
        assert!(!msg.contains("input"), "{msg}");
    }

    #[test]
    fn usb_and_other_ports_are_formatted() {
        let usb = PortInfo {
            port_name: "/dev/ttyUSB0".into(),
            port_type: "USB".into(),
            vid: Some(0x10c4),
            pid: Some(0xea60),
            serial_number: None,
            manufacturer: None,
            product: None,
        };
        assert_eq!(format_port(&usb), "/dev/ttyUSB0 (10C4:EA60)");

        let pci = PortInfo {
            port_name: "COM3".into(),
            port_type: "PCI".into(),
            vid: None,
            pid: None,
            ..usb
        };
        assert_eq!(format_port(&pci), "COM3 [PCI]");
    }

    #[test]
    fn drive_stops_at_end_of_stream() {
        let mut serial = Serial::new(
            SimulatedLink::new(Vec::new(), OverflowPolicy::Overwrite),
            NullSink,
        );
        assert_eq!(drive(Cursor::new(Vec::new()), &mut serial).unwrap(), 0);
        assert_eq!(drive(Cursor::new(vec![9, 8]), &mut serial).unwrap(), 2);
        assert_eq!(serial.handled(), 2);
    }

    #[test]
    fn missing_file_does_not_open() {
        let src = InputSource::from_arg(Some(Path::new("/no/such/input.bin")));
        assert!(src.open().is_err());
        assert_eq!(InputSource::from_arg(None), InputSource::Stdin);
    }
}
