//! Real USART behind a host serial port. A worker thread plays the receive
//! interrupt: every byte read from the port is latched into the receive slot.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serialport::{SerialPort, SerialPortInfo};
use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::slot::{RxInterrupt, RxSlot};
use crate::transport::DeviceLink;
use crate::{Error, Result};

/// Fixed USART1 setup of the board. Nothing here is runtime input.
pub struct UsartConfig;

impl UsartConfig {
    pub const BAUD_RATE: u32 = 9600;
    pub const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;
    pub const PARITY: serialport::Parity = serialport::Parity::None;
    pub const STOP_BITS: serialport::StopBits = serialport::StopBits::One;
    pub const FLOW_CONTROL: serialport::FlowControl = serialport::FlowControl::None;
    /// Receive-not-empty interrupt enabled; no other USART interrupt.
    pub const RXNE_INTERRUPT: bool = true;
    pub const NVIC_PRIORITY_GROUP: u8 = 2;
    pub const NVIC_PREEMPTION_PRIORITY: u8 = 1;
    pub const NVIC_SUB_PRIORITY: u8 = 1;
}

#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, vid, pid, serial_number, manufacturer, product) = match &info.port_type {
            serialport::SerialPortType::UsbPort(usb) => (
                "USB".to_string(),
                Some(usb.vid),
                Some(usb.pid),
                usb.serial_number.clone(),
                usb.manufacturer.clone(),
                usb.product.clone(),
            ),
            serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None, None, None, None),
            serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None, None, None, None),
            serialport::SerialPortType::Unknown => ("Unknown".to_string(), None, None, None, None, None),
        };
        Self {
            port_name: info.port_name,
            port_type,
            vid,
            pid,
            serial_number,
            manufacturer,
            product,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
    pub stop_bits: serialport::StopBits,
    pub flow_control: serialport::FlowControl,
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: UsartConfig::BAUD_RATE,
            data_bits: UsartConfig::DATA_BITS,
            parity: UsartConfig::PARITY,
            stop_bits: UsartConfig::STOP_BITS,
            flow_control: UsartConfig::FLOW_CONTROL,
            read_timeout: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened(String),
    /// Total overruns so far, sent whenever the count grows.
    Overrun(u64),
    Error(String),
    Closed,
}

enum Command {
    Close,
}

pub struct SerialPortLink {
    cfg: SerialConfig,
    port: Box<dyn SerialPort>,
    slot: Arc<RxSlot>,
    tx_cmd: Sender<Command>,
    rx_evt: Receiver<LinkEvent>,
    worker: Option<JoinHandle<()>>,
}

impl SerialPortLink {
    pub fn list_ports() -> Vec<PortInfo> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(PortInfo::from)
            .collect()
    }

    pub fn open(cfg: SerialConfig) -> Result<Self> {
        let port = serialport::new(&cfg.port_name, cfg.baud_rate)
            .data_bits(cfg.data_bits)
            .parity(cfg.parity)
            .stop_bits(cfg.stop_bits)
            .flow_control(cfg.flow_control)
            .timeout(cfg.read_timeout)
            .open()?;
        let reader = port.try_clone()?;

        let slot = Arc::new(RxSlot::new());
        let (tx_cmd, rx_cmd) = unbounded::<Command>();
        let (tx_evt, rx_evt) = unbounded::<LinkEvent>();
        let irq = RxInterrupt::new(slot.clone());
        let name = cfg.port_name.clone();

        let worker = std::thread::Builder::new()
            .name(format!("rx-{name}"))
            .spawn(move || receive_loop(reader, irq, rx_cmd, tx_evt, name))?;

        Ok(Self {
            cfg,
            port,
            slot,
            tx_cmd,
            rx_evt,
            worker: Some(worker),
        })
    }

    /// Device transport on this port: writes go straight to the port, reads
    /// come from the slot the worker fills.
    pub fn device_link(&self) -> Result<DeviceLink<Box<dyn SerialPort>>> {
        Ok(DeviceLink::with_slot(self.port.try_clone()?, self.slot.clone()))
    }

    pub fn events(&self) -> &Receiver<LinkEvent> {
        &self.rx_evt
    }

    pub fn config(&self) -> &SerialConfig {
        &self.cfg
    }

    /// Stop the receive worker. A worker that already exited on its own
    /// (read error) is not an error here; its cause went out as a
    /// `LinkEvent::Error`.
    pub fn close(&mut self) -> Result<()> {
        stop_worker(&self.tx_cmd, self.worker.take())
    }
}

fn stop_worker(tx_cmd: &Sender<Command>, worker: Option<JoinHandle<()>>) -> Result<()> {
    // fails only when the worker is already gone
    let _ = tx_cmd.send(Command::Close);
    if let Some(worker) = worker {
        worker.join().map_err(|_| Error::Disconnected)?;
    }
    Ok(())
}

impl Drop for SerialPortLink {
    fn drop(&mut self) {
        let _ = self.tx_cmd.send(Command::Close);
    }
}

fn receive_loop(
    mut port: Box<dyn SerialPort>,
    irq: RxInterrupt,
    rx_cmd: Receiver<Command>,
    tx_evt: Sender<LinkEvent>,
    name: String,
) {
    log::info!("receive worker started on {name}");
    let _ = tx_evt.send(LinkEvent::Opened(name.clone()));
    let mut buf = [0u8; 64];
    let mut overruns = irq.overruns();

    loop {
        match port.read(&mut buf) {
            Ok(n) => {
                for &b in &buf[..n] {
                    irq.on_receive(b);
                }
                let now = irq.overruns();
                if now != overruns {
                    overruns = now;
                    let _ = tx_evt.send(LinkEvent::Overrun(now));
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {}
            Err(e) => {
                log::warn!("read from {name} failed: {e}");
                let _ = tx_evt.send(LinkEvent::Error(e.to_string()));
                let _ = tx_evt.send(LinkEvent::Closed);
                return;
            }
        }

        if let Ok(Command::Close) = rx_cmd.try_recv() {
            log::info!("receive worker on {name} closing");
            let _ = tx_evt.send(LinkEvent::Closed);
            return;
        }
    }
}
