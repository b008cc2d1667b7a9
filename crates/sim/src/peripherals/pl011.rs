// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

const DR: usize = 0x00;
const RSRECR: usize = 0x04;
const FR: usize = 0x18;
const ILPR: usize = 0x20;
const IBRD: usize = 0x24;
const FBRD: usize = 0x28;
const LCRH: usize = 0x2C;
const CR: usize = 0x30;
const IFLS: usize = 0x34;
const IMSC: usize = 0x38;
const RIS: usize = 0x3C;
const MIS: usize = 0x40;
const ICR: usize = 0x44;
const DMACR: usize = 0x48;
const ITCR: usize = 0x80;
const ITIP: usize = 0x84;
const ITOP: usize = 0x88;
const TDR: usize = 0x8C;

const FR_BUSY: u32 = 1 << 3;
const FR_RXFE: u32 = 1 << 4;
const FR_TXFF: u32 = 1 << 5;
const FR_RXFF: u32 = 1 << 6;
const FR_TXFE: u32 = 1 << 7;

const CR_UARTEN: u32 = 1 << 0;
const CR_TXE: u32 = 1 << 8;
const CR_RXE: u32 = 1 << 9;

const INT_RX: u32 = 1 << 4;
const INT_ALL: u32 = 0x7FF;

const RX_FIFO_DEPTH: usize = 16;

/// PL011 UART model.
///
/// Transmit is instantaneous: bytes written to DR while the UART is enabled
/// land in `transmitted` (and the optional sink). Flag-register pressure is
/// scripted with poll counters, each FR read consuming one.
#[derive(Debug, serde::Serialize)]
pub struct Pl011Model {
    cr: u32,   // 0x30
    lcrh: u32, // 0x2C
    ibrd: u32, // 0x24
    fbrd: u32, // 0x28
    imsc: u32, // 0x38
    ris: u32,  // 0x3C
    /// Registers with no behaviour beyond storage (RSRECR, ILPR, IFLS,
    /// DMACR and the test registers).
    plain: BTreeMap<usize, u32>,
    rx_fifo: VecDeque<u8>,
    transmitted: Vec<u8>,
    dropped_tx: u32,
    tx_full_polls: u32,
    rx_delay_polls: u32,
    busy_polls: u32,
    #[serde(skip)]
    sink: Option<Arc<Mutex<Vec<u8>>>>,
}

impl Default for Pl011Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Pl011Model {
    pub fn new() -> Self {
        let plain: BTreeMap<usize, u32> = [RSRECR, ILPR, DMACR, ITCR, ITIP, ITOP, TDR]
            .into_iter()
            .map(|offset| (offset, 0))
            .chain([(IFLS, 0x12)])
            .collect();

        Self {
            // Reset value: TXE and RXE set, UART disabled.
            cr: CR_TXE | CR_RXE,
            lcrh: 0,
            ibrd: 0,
            fbrd: 0,
            imsc: 0,
            ris: 0,
            plain,
            rx_fifo: VecDeque::new(),
            transmitted: Vec::new(),
            dropped_tx: 0,
            tx_full_polls: 0,
            rx_delay_polls: 0,
            busy_polls: 0,
            sink: None,
        }
    }

    /// Mirror transmitted bytes into `sink` as well.
    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>) {
        self.sink = sink;
    }

    /// Bytes arriving on the RX line.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx_fifo.extend(bytes.iter().copied());
        if !self.rx_fifo.is_empty() {
            self.ris |= INT_RX;
        }
    }

    /// Report TXFF for the next `polls` FR reads.
    pub fn hold_tx_full(&mut self, polls: u32) {
        self.tx_full_polls = polls;
    }

    /// Report RXFE for the next `polls` FR reads, even with data queued.
    pub fn delay_rx(&mut self, polls: u32) {
        self.rx_delay_polls = polls;
    }

    /// Report BUSY for the next `polls` FR reads.
    pub fn hold_busy(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    pub fn transmitted(&self) -> &[u8] {
        &self.transmitted
    }

    pub fn take_transmitted(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.transmitted)
    }

    /// DR writes that arrived while the transmitter was disabled.
    pub fn dropped_tx(&self) -> u32 {
        self.dropped_tx
    }

    pub fn pending_rx(&self) -> usize {
        self.rx_fifo.len()
    }

    pub fn control(&self) -> u32 {
        self.cr
    }

    pub fn line_control(&self) -> u32 {
        self.lcrh
    }

    pub fn interrupt_mask(&self) -> u32 {
        self.imsc
    }

    pub fn raw_interrupts(&self) -> u32 {
        self.ris
    }

    /// `(IBRD, FBRD)`.
    pub fn divisor(&self) -> (u32, u32) {
        (self.ibrd, self.fbrd)
    }

    pub fn tx_enabled(&self) -> bool {
        self.cr & (CR_UARTEN | CR_TXE) == (CR_UARTEN | CR_TXE)
    }

    fn sample_flags(&mut self) -> u32 {
        let mut fr = 0;

        if self.tx_full_polls > 0 {
            self.tx_full_polls -= 1;
            fr |= FR_TXFF;
        } else {
            fr |= FR_TXFE;
        }

        if self.rx_delay_polls > 0 {
            self.rx_delay_polls -= 1;
            fr |= FR_RXFE;
        } else if self.rx_fifo.is_empty() {
            fr |= FR_RXFE;
        }
        if self.rx_fifo.len() >= RX_FIFO_DEPTH {
            fr |= FR_RXFF;
        }

        if self.busy_polls > 0 {
            self.busy_polls -= 1;
            fr |= FR_BUSY;
        }

        fr
    }

    fn pop_rx(&mut self) -> u32 {
        let byte = self.rx_fifo.pop_front().unwrap_or(0);
        if self.rx_fifo.is_empty() {
            self.ris &= !INT_RX;
        }
        u32::from(byte)
    }

    fn push_tx(&mut self, value: u32) {
        let byte = (value & 0xFF) as u8;
        if !self.tx_enabled() {
            tracing::warn!("PL011 DR write {:#04x} with transmitter disabled", byte);
            self.dropped_tx += 1;
            return;
        }

        self.transmitted.push(byte);
        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(byte);
            }
        }
    }
}

impl crate::Peripheral for Pl011Model {
    fn read(&mut self, offset: usize) -> u32 {
        match offset {
            DR => self.pop_rx(),
            FR => self.sample_flags(),
            IBRD => self.ibrd,
            FBRD => self.fbrd,
            LCRH => self.lcrh,
            CR => self.cr,
            IMSC => self.imsc,
            RIS => self.ris,
            MIS => self.ris & self.imsc,
            ICR => 0,
            _ => self.plain.get(&offset).copied().unwrap_or(0),
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            DR => self.push_tx(value),
            FR | RIS | MIS => {
                tracing::debug!("PL011 write to read-only offset {:#x} ignored", offset);
            }
            IBRD => self.ibrd = value & 0xFFFF,
            FBRD => self.fbrd = value & 0x3F,
            LCRH => self.lcrh = value & 0xFF,
            CR => self.cr = value & 0xFFFF,
            IMSC => self.imsc = value & INT_ALL,
            ICR => self.ris &= !(value & INT_ALL),
            _ => {
                if let Some(slot) = self.plain.get_mut(&offset) {
                    *slot = value;
                } else {
                    tracing::debug!("PL011 write to unimplemented offset {:#x}", offset);
                }
            }
        }
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    fn enabled() -> Pl011Model {
        let mut uart = Pl011Model::new();
        uart.write(CR, CR_UARTEN | CR_TXE | CR_RXE);
        uart
    }

    #[test]
    fn test_transmit_requires_enable() {
        let mut uart = Pl011Model::new();
        uart.write(DR, u32::from(b'X'));
        assert!(uart.transmitted().is_empty());
        assert_eq!(uart.dropped_tx(), 1);

        uart.write(CR, CR_UARTEN | CR_TXE);
        uart.write(DR, u32::from(b'Y'));
        assert_eq!(uart.transmitted(), b"Y");
    }

    #[test]
    fn test_sink_receives_transmitted_bytes() {
        let mut uart = enabled();
        let sink = Arc::new(Mutex::new(Vec::new()));
        uart.set_sink(Some(sink.clone()));

        uart.write(DR, u32::from(b'O'));
        uart.write(DR, u32::from(b'K'));

        assert_eq!(*sink.lock().unwrap(), b"OK".to_vec());
    }

    #[test]
    fn test_flags_follow_scripted_polls() {
        let mut uart = enabled();
        uart.hold_tx_full(2);

        assert_ne!(uart.read(FR) & FR_TXFF, 0);
        assert_ne!(uart.read(FR) & FR_TXFF, 0);
        let fr = uart.read(FR);
        assert_eq!(fr & FR_TXFF, 0);
        assert_ne!(fr & FR_TXFE, 0);
    }

    #[test]
    fn test_rx_fifo_and_delay() {
        let mut uart = enabled();
        assert_ne!(uart.read(FR) & FR_RXFE, 0);

        uart.push_rx(b"hi");
        uart.delay_rx(1);
        assert_ne!(uart.read(FR) & FR_RXFE, 0);
        assert_eq!(uart.read(FR) & FR_RXFE, 0);
        assert_eq!(uart.read(DR), u32::from(b'h'));
        assert_eq!(uart.read(DR), u32::from(b'i'));
        assert_ne!(uart.read(FR) & FR_RXFE, 0);
        assert_eq!(uart.read(DR), 0);
    }

    #[test]
    fn test_rx_full_flag() {
        let mut uart = enabled();
        uart.push_rx(&[0u8; RX_FIFO_DEPTH]);
        assert_ne!(uart.read(FR) & FR_RXFF, 0);
    }

    #[test]
    fn test_icr_clears_raw_interrupts() {
        let mut uart = enabled();
        uart.push_rx(b"x");
        uart.write(IMSC, INT_RX);
        assert_eq!(uart.read(RIS) & INT_RX, INT_RX);
        assert_eq!(uart.read(MIS), INT_RX);

        uart.write(ICR, INT_ALL);
        assert_eq!(uart.read(RIS), 0);
        assert_eq!(uart.read(MIS), 0);
    }

    #[test]
    fn test_divisor_registers_are_width_limited() {
        let mut uart = Pl011Model::new();
        uart.write(IBRD, 0x1_0001);
        uart.write(FBRD, 0xFF);
        assert_eq!(uart.divisor(), (1, 0x3F));
    }

    #[test]
    fn test_plain_registers_store_values() {
        let mut uart = Pl011Model::new();
        assert_eq!(uart.read(IFLS), 0x12);
        uart.write(DMACR, 0);
        uart.write(ITCR, 1);
        assert_eq!(uart.read(ITCR), 1);
        uart.write(0x60, 5);
        assert_eq!(uart.read(0x60), 0);
    }
}
