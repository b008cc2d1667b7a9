// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register offsets and bit layouts for the BCM283x GPIO pull control and the
//! PL011 UART0 block.

/// Offsets from the GPIO controller base.
pub mod gpio {
    /// Pull-up/down enable (0 = off, 1 = pull down, 2 = pull up).
    pub const GPPUD: usize = 0x94;
    /// Pull-up/down clock for pins 0..=31.
    pub const GPPUDCLK0: usize = 0x98;
}

/// Offsets from the UART0 base.
pub mod uart0 {
    pub const DR: usize = 0x00;
    pub const RSRECR: usize = 0x04;
    pub const FR: usize = 0x18;
    pub const ILPR: usize = 0x20;
    pub const IBRD: usize = 0x24;
    pub const FBRD: usize = 0x28;
    pub const LCRH: usize = 0x2C;
    pub const CR: usize = 0x30;
    pub const IFLS: usize = 0x34;
    pub const IMSC: usize = 0x38;
    pub const RIS: usize = 0x3C;
    pub const MIS: usize = 0x40;
    pub const ICR: usize = 0x44;
    pub const DMACR: usize = 0x48;
    pub const ITCR: usize = 0x80;
    pub const ITIP: usize = 0x84;
    pub const ITOP: usize = 0x88;
    pub const TDR: usize = 0x8C;

    /// Size of the UART0 register window.
    pub const WINDOW: usize = 0x90;
}

bitflags::bitflags! {
    /// UARTFR, read live on every transfer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        const CTS = 1 << 0;
        const DSR = 1 << 1;
        const DCD = 1 << 2;
        const BUSY = 1 << 3;
        /// Receive FIFO empty.
        const RXFE = 1 << 4;
        /// Transmit FIFO full.
        const TXFF = 1 << 5;
        const RXFF = 1 << 6;
        const TXFE = 1 << 7;
        const RI = 1 << 8;
    }
}

bitflags::bitflags! {
    /// UARTLCRH.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineControl: u32 {
        const BRK = 1 << 0;
        const PEN = 1 << 1;
        const EPS = 1 << 2;
        const STP2 = 1 << 3;
        /// Enable the transmit and receive FIFOs.
        const FEN = 1 << 4;
        const WLEN_6 = 0b01 << 5;
        const WLEN_7 = 0b10 << 5;
        const WLEN_8 = 0b11 << 5;
        const SPS = 1 << 7;
    }
}

bitflags::bitflags! {
    /// UARTCR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        const UARTEN = 1 << 0;
        const SIREN = 1 << 1;
        const SIRLP = 1 << 2;
        const LBE = 1 << 7;
        const TXE = 1 << 8;
        const RXE = 1 << 9;
        const DTR = 1 << 10;
        const RTS = 1 << 11;
        const OUT1 = 1 << 12;
        const OUT2 = 1 << 13;
        const RTSEN = 1 << 14;
        const CTSEN = 1 << 15;
    }
}

bitflags::bitflags! {
    /// Interrupt bits shared by UARTIMSC, UARTRIS, UARTMIS and UARTICR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u32 {
        const RIM = 1 << 0;
        const CTSM = 1 << 1;
        const DCDM = 1 << 2;
        const DSRM = 1 << 3;
        const RX = 1 << 4;
        const TX = 1 << 5;
        const RT = 1 << 6;
        const FE = 1 << 7;
        const PE = 1 << 8;
        const BE = 1 << 9;
        const OE = 1 << 10;
    }
}

impl Interrupts {
    /// Sources written to IMSC during init. RIM, DCDM and DSRM are not
    /// implemented on the BCM283x and stay clear.
    pub const POLLING_MASK: Self = Self::CTSM
        .union(Self::RX)
        .union(Self::TX)
        .union(Self::RT)
        .union(Self::FE)
        .union(Self::PE)
        .union(Self::BE)
        .union(Self::OE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_bit_patterns() {
        assert_eq!((LineControl::FEN | LineControl::WLEN_8).bits(), 0x70);
        assert_eq!((Control::UARTEN | Control::TXE | Control::RXE).bits(), 0x301);
        assert_eq!(Interrupts::POLLING_MASK.bits(), 0x7F2);
        assert_eq!(Interrupts::all().bits(), 0x7FF);
    }

    #[test]
    fn test_flag_bits() {
        assert_eq!(Flags::TXFF.bits(), 1 << 5);
        assert_eq!(Flags::RXFE.bits(), 1 << 4);
        let fr = Flags::from_bits_truncate(0x90);
        assert!(fr.contains(Flags::RXFE | Flags::TXFE));
        assert!(!fr.contains(Flags::TXFF));
    }

    #[test]
    fn test_register_offsets() {
        assert_eq!(uart0::FR, 0x18);
        assert_eq!(uart0::IMSC, 0x38);
        assert_eq!(uart0::ICR, 0x44);
        assert_eq!(uart0::TDR, 0x8C);
        assert_eq!(gpio::GPPUDCLK0 - gpio::GPPUD, 4);
    }
}
