//! Serial core: the injection path and the receive poll step, both routed
//! through one byte handler.

use crate::handler::{ByteHandler, EchoHandler};
use crate::sink::DiagnosticSink;
use crate::transport::{Origin, RxByte, Transport};

#[derive(Debug)]
pub struct Serial<T, S, H = EchoHandler> {
    transport: T,
    sink: S,
    handler: H,
    handled: u64,
}

impl<T, S> Serial<T, S>
where
    T: Transport,
    S: DiagnosticSink,
{
    pub fn new(transport: T, sink: S) -> Self {
        Self::with_handler(transport, sink, EchoHandler)
    }
}

impl<T, S, H> Serial<T, S, H>
where
    T: Transport,
    S: DiagnosticSink,
    H: ByteHandler<T, S>,
{
    pub fn with_handler(transport: T, sink: S, handler: H) -> Self {
        Self {
            transport,
            sink,
            handler,
            handled: 0,
        }
    }

    /// Reset the receive store and clear the availability flag.
    pub fn init(&mut self) {
        self.transport.reset();
    }

    /// Store `byte` in the receive path and handle it before returning.
    ///
    /// Every call runs the handler exactly once, in call order. The stored
    /// copy is tagged as injected so a poll loop draining the same store
    /// does not handle it a second time.
    pub fn inject(&mut self, byte: u8) {
        self.transport.deliver(RxByte::injected(byte));
        self.handle(byte);
    }

    /// Run the handler on `byte` without storing it.
    pub fn handle(&mut self, byte: u8) {
        self.handler.handle(byte, &mut self.transport, &mut self.sink);
        self.handled += 1;
    }

    /// Consume the next unread byte, if any. Bytes that came off the line
    /// are handled here; injected ones were handled when they were stored.
    pub fn poll_once(&mut self) -> Option<RxByte> {
        let rx = self.transport.receive()?;
        if rx.origin == Origin::Line {
            self.handle(rx.value);
        }
        Some(rx)
    }

    pub fn rx_flag(&self) -> bool {
        self.transport.rx_flag()
    }

    /// Raw read of the next unread byte; does not invoke the handler.
    pub fn rx_data(&mut self) -> Option<u8> {
        self.transport.rx_data()
    }

    /// Number of handler invocations so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_parts(self) -> (T, S, H) {
        (self.transport, self.sink, self.handler)
    }
}
