//! Single-slot receive register shared between the receive interrupt and the
//! foreground loop.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::transport::{Origin, RxByte};

const FULL: u32 = 1 << 9;
const INJECTED: u32 = 1 << 8;

fn pack(rx: RxByte) -> u32 {
    let origin = match rx.origin {
        Origin::Line => 0,
        Origin::Injected => INJECTED,
    };
    FULL | origin | u32::from(rx.value)
}

fn unpack(word: u32) -> Option<RxByte> {
    if word & FULL == 0 {
        return None;
    }
    let origin = if word & INJECTED != 0 {
        Origin::Injected
    } else {
        Origin::Line
    };
    Some(RxByte {
        value: (word & 0xFF) as u8,
        origin,
    })
}

/// Capacity-one receive register: byte, origin and full flag live in one
/// atomic word, so a store and a take never tear.
///
/// The interrupt side is the only writer of a full slot and the foreground
/// side is the only one that empties it. Storing into a full slot replaces
/// the unread byte and counts an overrun.
#[derive(Debug, Default)]
pub struct RxSlot {
    word: AtomicU32,
    overruns: AtomicU64,
}

impl RxSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, rx: RxByte) {
        let prev = self.word.swap(pack(rx), Ordering::AcqRel);
        if let Some(lost) = unpack(prev) {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "receive overrun: 0x{:02X} replaced 0x{:02X}",
                rx.value,
                lost.value
            );
        }
    }

    pub fn take(&self) -> Option<RxByte> {
        unpack(self.word.swap(0, Ordering::AcqRel))
    }

    pub fn peek(&self) -> Option<RxByte> {
        unpack(self.word.load(Ordering::Acquire))
    }

    pub fn is_full(&self) -> bool {
        self.word.load(Ordering::Acquire) & FULL != 0
    }

    /// Last latched byte, whether or not the flag is still raised.
    pub fn data(&self) -> u8 {
        (self.word.load(Ordering::Acquire) & 0xFF) as u8
    }

    /// Test-and-clear of the flag alone; the byte stays readable through
    /// `data`.
    pub fn take_flag(&self) -> bool {
        self.word.fetch_and(!FULL, Ordering::AcqRel) & FULL != 0
    }

    pub fn clear(&self) {
        self.word.store(0, Ordering::Release);
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

/// Interrupt-context handle onto an [`RxSlot`]. Cloned into whatever plays
/// the role of the receive-not-empty interrupt.
#[derive(Debug, Clone)]
pub struct RxInterrupt {
    slot: Arc<RxSlot>,
}

impl RxInterrupt {
    pub fn new(slot: Arc<RxSlot>) -> Self {
        Self { slot }
    }

    /// RXNE: latch the received byte and raise the flag.
    pub fn on_receive(&self, byte: u8) {
        self.slot.store(RxByte::line(byte));
    }

    pub fn overruns(&self) -> u64 {
        self.slot.overruns()
    }
}
