use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::transport::{RxByte, RxCapacity, Transport};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub seq: u64,
    pub direction: Direction,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

/// Bounded RX/TX log; the oldest entry goes once `max_entries` is exceeded.
#[derive(Debug)]
pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
    max_entries: usize,
    next_seq: u64,
    show_rx: bool,
    show_tx: bool,
}

impl Transcript {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
            next_seq: 0,
            show_rx: true,
            show_tx: true,
        }
    }

    pub fn set_filter(&mut self, show_rx: bool, show_tx: bool) {
        self.show_rx = show_rx;
        self.show_tx = show_tx;
    }

    pub fn push(&mut self, direction: Direction, data: Vec<u8>) {
        if self.max_entries == 0 {
            return;
        }
        self.entries.push_back(TranscriptEntry {
            seq: self.next_seq,
            direction,
            data,
        });
        self.next_seq += 1;

        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// One line per entry: `RX: 41 42` in hex mode, escaped ASCII otherwise.
    pub fn to_text(&self, show_hex: bool) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let shown = match entry.direction {
                Direction::Rx => self.show_rx,
                Direction::Tx => self.show_tx,
            };
            if !shown {
                continue;
            }

            out.push_str(match entry.direction {
                Direction::Rx => "RX: ",
                Direction::Tx => "TX: ",
            });
            if show_hex {
                let bytes: Vec<String> = entry.data.iter().map(|b| hex::encode_upper([*b])).collect();
                out.push_str(&bytes.join(" "));
            } else {
                for &b in &entry.data {
                    let _ = write!(out, "{}", std::ascii::escape_default(b));
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Transport decorator that copies traffic into a shared transcript. A
/// passthrough tap records nothing and takes no lock.
#[derive(Debug)]
pub struct Tap<T> {
    inner: T,
    transcript: Option<Arc<Mutex<Transcript>>>,
}

impl<T: Transport> Tap<T> {
    pub fn new(inner: T, transcript: Arc<Mutex<Transcript>>) -> Self {
        Self { inner, transcript: Some(transcript) }
    }

    pub fn passthrough(inner: T) -> Self {
        Self { inner, transcript: None }
    }

    pub fn transcript(&self) -> Option<&Arc<Mutex<Transcript>>> {
        self.transcript.as_ref()
    }

    fn record(&self, direction: Direction, byte: u8) {
        if let Some(transcript) = &self.transcript {
            transcript.lock().push(direction, vec![byte]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for Tap<T> {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.inner.send_byte(byte)?;
        self.record(Direction::Tx, byte);
        Ok(())
    }

    fn deliver(&mut self, rx: RxByte) {
        self.record(Direction::Rx, rx.value);
        self.inner.deliver(rx);
    }

    fn receive(&mut self) -> Option<RxByte> {
        self.inner.receive()
    }

    fn rx_flag(&self) -> bool {
        self.inner.rx_flag()
    }

    fn rx_capacity(&self) -> RxCapacity {
        self.inner.rx_capacity()
    }

    fn overruns(&self) -> u64 {
        self.inner.overruns()
    }

    fn reset(&mut self) {
        self.inner.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OverflowPolicy;
    use crate::sink::NullSink;
    use crate::transport::SimulatedLink;
    use crate::Serial;

    #[test]
    fn bounded() {
        let mut t = Transcript::new(2);
        t.push(Direction::Rx, vec![1]);
        t.push(Direction::Tx, vec![2]);
        t.push(Direction::Rx, vec![3]);
        assert_eq!(t.len(), 2);
        let seqs: Vec<u64> = t.entries().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn text_rendering() {
        let mut t = Transcript::new(10);
        t.push(Direction::Rx, vec![0x41, 0x0A]);
        t.push(Direction::Tx, vec![0xFF]);
        assert_eq!(t.to_text(true), "RX: 41 0A\nTX: FF\n");
        assert_eq!(t.to_text(false), "RX: A\\n\nTX: \\xff\n");

        t.set_filter(false, true);
        assert_eq!(t.to_text(true), "TX: FF\n");
    }

    #[test]
    fn zero_bound_keeps_nothing() {
        let mut t = Transcript::new(0);
        t.push(Direction::Rx, vec![1]);
        assert!(t.is_empty());
    }

    #[test]
    fn passthrough_tap_only_forwards() {
        let link = SimulatedLink::new(Vec::new(), OverflowPolicy::Overwrite);
        let mut serial = Serial::new(Tap::passthrough(link), NullSink);
        serial.inject(0x7E);
        assert!(serial.transport().transcript().is_none());
        assert_eq!(serial.transport().get_ref().writer(), &[0x7E]);
        assert_eq!(serial.rx_data(), Some(0x7E));
    }

    #[test]
    fn tap_records_injection_and_echo() {
        let transcript = Arc::new(Mutex::new(Transcript::new(64)));
        let link = SimulatedLink::new(Vec::new(), OverflowPolicy::Overwrite);
        let mut serial = Serial::new(Tap::new(link, transcript.clone()), NullSink);
        serial.inject(0x41);
        serial.inject(0x00);

        assert_eq!(
            transcript.lock().to_text(true),
            "RX: 41\nTX: 41\nRX: 00\nTX: 00\n"
        );
        assert_eq!(serial.transport().get_ref().writer(), &[0x41, 0x00]);
    }
}
