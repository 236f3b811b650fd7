use std::fmt;
use std::io::Write;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::queue::{OverflowPolicy, RingQueue, RX_BUF_SIZE};
use crate::slot::{RxInterrupt, RxSlot};
use crate::Result;

/// Output buffer used by `printf`; at most `PRINTF_CAPACITY - 1` bytes go out.
pub const PRINTF_CAPACITY: usize = 256;

/// Where a received byte came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    /// Arrived on the receive line (interrupt or poll path).
    #[default]
    Line,
    /// Put there by the injection path, which has already handled it.
    Injected,
}

/// One inbound byte together with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RxByte {
    pub value: u8,
    pub origin: Origin,
}

impl RxByte {
    pub fn line(value: u8) -> Self {
        Self { value, origin: Origin::Line }
    }

    pub fn injected(value: u8) -> Self {
        Self { value, origin: Origin::Injected }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxCapacity {
    SingleSlot,
    Ring(usize),
}

/// Send/receive capability over a simulated loopback or a real USART.
pub trait Transport {
    /// Transmit one byte and wait until it has left the transmitter.
    fn send_byte(&mut self, byte: u8) -> Result<()>;

    /// Store side of the receive path. Never fails; a byte that cannot be
    /// stored is logged and dropped.
    fn deliver(&mut self, rx: RxByte);

    /// Remove the next unread byte.
    fn receive(&mut self) -> Option<RxByte>;

    /// True while at least one unread byte is present.
    fn rx_flag(&self) -> bool;

    fn rx_capacity(&self) -> RxCapacity;

    /// Bytes lost because the receive store was full.
    fn overruns(&self) -> u64;

    /// Forget unread bytes and clear the flag.
    fn reset(&mut self);

    fn rx_data(&mut self) -> Option<u8> {
        self.receive().map(|rx| rx.value)
    }

    fn send_array(&mut self, array: Option<&[u8]>) -> Result<()> {
        let Some(array) = array else {
            return Ok(());
        };
        for &b in array {
            self.send_byte(b)?;
        }
        Ok(())
    }

    fn send_string(&mut self, string: Option<&str>) -> Result<()> {
        self.send_array(string.map(str::as_bytes))
    }

    /// Send `number` as exactly `length` decimal digits, zero padded.
    fn send_number(&mut self, number: u32, length: u8) -> Result<()> {
        for i in 0..length {
            self.send_byte(b'0' + decimal_digit(number, u32::from(length - i - 1)))?;
        }
        Ok(())
    }

    fn printf(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        let mut buf = Bounded::new(PRINTF_CAPACITY - 1);
        // Bounded never reports an error; overflow is truncated
        let _ = fmt::write(&mut buf, args);
        self.send_string(Some(&buf.text))
    }
}

/// Decimal digit of `number` at position `exp` (0 = units). Positions past
/// the range of `u32` are always zero.
pub fn decimal_digit(number: u32, exp: u32) -> u8 {
    10u32
        .checked_pow(exp)
        .map_or(0, |scale| (number / scale % 10) as u8)
}

struct Bounded {
    text: String,
    limit: usize,
    full: bool,
}

impl Bounded {
    fn new(limit: usize) -> Self {
        Self { text: String::new(), limit, full: false }
    }
}

impl fmt::Write for Bounded {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.full {
            return Ok(());
        }
        for c in s.chars() {
            if self.text.len() + c.len_utf8() > self.limit {
                // output stays a prefix: nothing after the first misfit
                self.full = true;
                break;
            }
            self.text.push(c);
        }
        Ok(())
    }
}

/// Cloneable writer handle so the echo path and a diagnostic sink can share
/// one output stream.
#[derive(Debug, Default)]
pub struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<W> SharedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: Arc::new(Mutex::new(writer)) }
    }

    pub fn lock(&self) -> MutexGuard<'_, W> {
        self.inner.lock()
    }
}

impl SharedWriter<Vec<u8>> {
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().clone()
    }
}

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.lock().flush()
    }
}

/// Host variant: a circular receive queue fed by the injection path, with
/// output going to any writer.
#[derive(Debug)]
pub struct SimulatedLink<W> {
    rx: RingQueue<RxByte, RX_BUF_SIZE>,
    tx: W,
}

impl<W: Write> SimulatedLink<W> {
    pub fn new(tx: W, policy: OverflowPolicy) -> Self {
        Self { rx: RingQueue::new(policy), tx }
    }

    pub fn queue(&self) -> &RingQueue<RxByte, RX_BUF_SIZE> {
        &self.rx
    }

    pub fn writer(&self) -> &W {
        &self.tx
    }
}

impl<W: Write> Transport for SimulatedLink<W> {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.tx.write_all(&[byte])?;
        self.tx.flush()?;
        Ok(())
    }

    fn deliver(&mut self, rx: RxByte) {
        log::trace!("enqueue 0x{:02X} ({:?})", rx.value, rx.origin);
        if let Err(e) = self.rx.enqueue(rx) {
            log::warn!("dropped 0x{:02X}: {e}", rx.value);
        }
    }

    fn receive(&mut self) -> Option<RxByte> {
        self.rx.dequeue()
    }

    fn rx_flag(&self) -> bool {
        self.rx.poll_flag()
    }

    fn rx_capacity(&self) -> RxCapacity {
        RxCapacity::Ring(self.rx.capacity())
    }

    fn overruns(&self) -> u64 {
        self.rx.overwritten()
    }

    fn reset(&mut self) {
        self.rx.reset();
    }
}

/// Device variant: a single receive register latched by the receive
/// interrupt, and a transmit data register behind `tx`.
#[derive(Debug)]
pub struct DeviceLink<W> {
    slot: Arc<RxSlot>,
    tx: W,
}

impl<W: Write> DeviceLink<W> {
    pub fn new(tx: W) -> Self {
        Self::with_slot(tx, Arc::new(RxSlot::new()))
    }

    pub fn with_slot(tx: W, slot: Arc<RxSlot>) -> Self {
        Self { slot, tx }
    }

    /// Handle for the interrupt context.
    pub fn interrupt(&self) -> RxInterrupt {
        RxInterrupt::new(self.slot.clone())
    }

    /// Flag read with the device's test-and-clear semantics.
    pub fn take_rx_flag(&self) -> bool {
        self.slot.take_flag()
    }

    /// The latched data register, independent of the flag.
    pub fn rx_register(&self) -> u8 {
        self.slot.data()
    }

    pub fn writer(&self) -> &W {
        &self.tx
    }
}

impl<W: Write> Transport for DeviceLink<W> {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        // write_all + flush stands in for DR write then TXE spin
        self.tx.write_all(&[byte])?;
        self.tx.flush()?;
        Ok(())
    }

    fn deliver(&mut self, rx: RxByte) {
        self.slot.store(rx);
    }

    fn receive(&mut self) -> Option<RxByte> {
        self.slot.take()
    }

    fn rx_flag(&self) -> bool {
        self.slot.is_full()
    }

    fn rx_capacity(&self) -> RxCapacity {
        RxCapacity::SingleSlot
    }

    fn overruns(&self) -> u64 {
        self.slot.overruns()
    }

    fn reset(&mut self) {
        self.slot.clear();
    }
}

/// Either transport, picked when the link is built.
#[derive(Debug)]
pub enum Link<W> {
    Simulated(SimulatedLink<W>),
    Device(DeviceLink<W>),
}

impl<W: Write> Link<W> {
    pub fn simulated(tx: W, policy: OverflowPolicy) -> Self {
        Self::Simulated(SimulatedLink::new(tx, policy))
    }

    pub fn device(tx: W) -> Self {
        Self::Device(DeviceLink::new(tx))
    }

    fn inner(&self) -> &dyn Transport {
        match self {
            Self::Simulated(link) => link,
            Self::Device(link) => link,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Transport {
        match self {
            Self::Simulated(link) => link,
            Self::Device(link) => link,
        }
    }
}

impl<W: Write> Transport for Link<W> {
    fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.inner_mut().send_byte(byte)
    }

    fn deliver(&mut self, rx: RxByte) {
        self.inner_mut().deliver(rx)
    }

    fn receive(&mut self) -> Option<RxByte> {
        self.inner_mut().receive()
    }

    fn rx_flag(&self) -> bool {
        self.inner().rx_flag()
    }

    fn rx_capacity(&self) -> RxCapacity {
        self.inner().rx_capacity()
    }

    fn overruns(&self) -> u64 {
        self.inner().overruns()
    }

    fn reset(&mut self) {
        self.inner_mut().reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> (SimulatedLink<SharedWriter<Vec<u8>>>, SharedWriter<Vec<u8>>) {
        let out = SharedWriter::new(Vec::new());
        (SimulatedLink::new(out.clone(), OverflowPolicy::Overwrite), out)
    }

    #[test]
    fn send_helpers() {
        let (mut link, out) = sim();
        link.send_byte(b'>').unwrap();
        link.send_array(Some(&[1, 2])).unwrap();
        link.send_array(None).unwrap();
        link.send_string(Some("ok")).unwrap();
        link.send_string(None).unwrap();
        assert_eq!(out.contents(), b">\x01\x02ok");
    }

    #[test]
    fn send_number_pads_and_truncates() {
        let (mut link, out) = sim();
        link.send_number(42, 4).unwrap();
        link.send_number(1234, 2).unwrap();
        link.send_number(7, 0).unwrap();
        assert_eq!(out.contents(), b"004234");
    }

    #[test]
    fn printf_is_bounded() {
        let (mut link, out) = sim();
        link.printf(format_args!("byte=0x{:02X}\n", 0x0Fu8)).unwrap();
        assert_eq!(out.contents(), b"byte=0x0F\n");

        let (mut link, out) = sim();
        let long = "x".repeat(1000);
        link.printf(format_args!("{long}")).unwrap();
        assert_eq!(out.contents().len(), PRINTF_CAPACITY - 1);
    }

    #[test]
    fn send_number_wider_than_u32() {
        let (mut link, out) = sim();
        link.send_number(7, 40).unwrap();
        let mut expected = "0".repeat(39);
        expected.push('7');
        assert_eq!(out.contents(), expected.as_bytes());

        let (mut link, out) = sim();
        link.send_number(u32::MAX, 40).unwrap();
        let expected = format!("{}{}", "0".repeat(30), u32::MAX);
        assert_eq!(out.contents(), expected.as_bytes());
    }

    #[test]
    fn printf_truncation_keeps_a_prefix() {
        let (mut link, out) = sim();
        let head = "a".repeat(PRINTF_CAPACITY - 2);
        let e = "é";
        let z = 'Z';
        link.printf(format_args!("{head}{e}{z}")).unwrap();
        assert_eq!(out.contents(), head.as_bytes());
    }

    #[test]
    fn decimal_digits() {
        assert_eq!(decimal_digit(907, 0), 7);
        assert_eq!(decimal_digit(907, 1), 0);
        assert_eq!(decimal_digit(907, 2), 9);
        assert_eq!(decimal_digit(u32::MAX, 9), 4);
        assert_eq!(decimal_digit(u32::MAX, 10), 0);
        assert_eq!(decimal_digit(u32::MAX, 255), 0);
    }

    #[test]
    fn simulated_queue_is_fifo() {
        let (mut link, _) = sim();
        assert_eq!(link.rx_capacity(), RxCapacity::Ring(RX_BUF_SIZE));
        link.deliver(RxByte::line(1));
        link.deliver(RxByte::injected(2));
        assert!(link.rx_flag());
        assert_eq!(link.receive(), Some(RxByte::line(1)));
        assert_eq!(link.rx_data(), Some(2));
        assert!(!link.rx_flag());
    }

    #[test]
    fn simulated_reject_drops_newest() {
        let out = SharedWriter::new(Vec::new());
        let mut link = SimulatedLink::new(out, OverflowPolicy::Reject);
        for i in 0..=RX_BUF_SIZE {
            link.deliver(RxByte::line(i as u8));
        }
        assert_eq!(link.queue().len(), RX_BUF_SIZE);
        assert_eq!(link.rx_data(), Some(0));
    }

    #[test]
    fn device_link_is_single_slot() {
        let out = SharedWriter::new(Vec::new());
        let mut link = DeviceLink::new(out.clone());
        let irq = link.interrupt();
        assert_eq!(link.rx_capacity(), RxCapacity::SingleSlot);

        irq.on_receive(b'a');
        irq.on_receive(b'b');
        assert_eq!(link.overruns(), 1);
        assert_eq!(link.rx_data(), Some(b'b'));
        assert!(!link.rx_flag());

        link.send_byte(b'z').unwrap();
        assert_eq!(out.contents(), b"z");
    }

    #[test]
    fn device_flag_then_register() {
        let mut link = DeviceLink::new(Vec::new());
        link.interrupt().on_receive(0x33);
        assert!(link.take_rx_flag());
        assert!(!link.take_rx_flag());
        assert_eq!(link.rx_register(), 0x33);
        assert_eq!(link.receive(), None);
    }

    #[test]
    fn link_dispatches_to_variant() {
        let mut sim = Link::simulated(Vec::new(), OverflowPolicy::Overwrite);
        let mut dev = Link::device(Vec::new());
        for link in [&mut sim, &mut dev] {
            link.deliver(RxByte::line(9));
            assert!(link.rx_flag());
            link.reset();
            assert!(!link.rx_flag());
            assert_eq!(link.receive(), None);
        }
        assert_eq!(sim.rx_capacity(), RxCapacity::Ring(RX_BUF_SIZE));
        assert_eq!(dev.rx_capacity(), RxCapacity::SingleSlot);
    }
}
