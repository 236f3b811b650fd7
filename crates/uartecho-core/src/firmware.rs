use crate::display::{TextDisplay, RX_LABEL};
use crate::handler::{ByteHandler, EchoHandler};
use crate::serial::Serial;
use crate::transport::Transport;

/// The echo application: boot the display and serial port, then service
/// received bytes from the foreground loop.
#[derive(Debug)]
pub struct Firmware<T, H = EchoHandler> {
    serial: Serial<T, TextDisplay, H>,
}

impl<T: Transport> Firmware<T> {
    pub fn boot(transport: T) -> Self {
        Self::boot_with_handler(transport, EchoHandler)
    }
}

impl<T, H> Firmware<T, H>
where
    T: Transport,
    H: ByteHandler<T, TextDisplay>,
{
    pub fn boot_with_handler(transport: T, handler: H) -> Self {
        let mut display = TextDisplay::new();
        display.init();
        display.show_string(1, 1, RX_LABEL);

        let mut serial = Serial::with_handler(transport, display, handler);
        serial.init();
        log::info!("firmware ready ({:?})", serial.transport().rx_capacity());
        Self { serial }
    }

    /// One pass of the main loop. Returns true if a byte was consumed.
    pub fn poll_once(&mut self) -> bool {
        self.serial.poll_once().is_some()
    }

    /// Poll until the receive store is empty; returns the bytes consumed.
    pub fn run_until_idle(&mut self) -> usize {
        let mut consumed = 0;
        while self.poll_once() {
            consumed += 1;
        }
        consumed
    }

    pub fn inject(&mut self, byte: u8) {
        self.serial.inject(byte);
    }

    pub fn display(&self) -> &TextDisplay {
        self.serial.sink()
    }

    pub fn serial(&self) -> &Serial<T, TextDisplay, H> {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut Serial<T, TextDisplay, H> {
        &mut self.serial
    }
}
