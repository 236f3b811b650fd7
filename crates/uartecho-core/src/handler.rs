use crate::sink::DiagnosticSink;
use crate::transport::Transport;

/// What happens to one received byte. Supplied when the serial core is built;
/// closures of the right shape work too.
pub trait ByteHandler<T: ?Sized, S: ?Sized> {
    fn handle(&mut self, byte: u8, transport: &mut T, sink: &mut S);
}

impl<T: ?Sized, S: ?Sized, F> ByteHandler<T, S> for F
where
    F: FnMut(u8, &mut T, &mut S),
{
    fn handle(&mut self, byte: u8, transport: &mut T, sink: &mut S) {
        self(byte, transport, sink)
    }
}

/// Echo the byte back, then emit one diagnostic record for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl<T, S> ByteHandler<T, S> for EchoHandler
where
    T: Transport + ?Sized,
    S: DiagnosticSink + ?Sized,
{
    fn handle(&mut self, byte: u8, transport: &mut T, sink: &mut S) {
        log::debug!("handle 0x{byte:02X}");
        if let Err(e) = transport.send_byte(byte) {
            log::warn!("echo of 0x{byte:02X} failed: {e}");
        }
        if let Err(e) = sink.record(byte) {
            log::warn!("diagnostic for 0x{byte:02X} failed: {e}");
        }
    }
}
