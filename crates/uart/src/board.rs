// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::regs::{gpio, uart0};
use crate::UartError;

/// Reference clock of the PL011 as the firmware leaves it on the boards we
/// target.
pub const DEFAULT_UART_CLOCK_HZ: u32 = 3_000_000;
pub const DEFAULT_BAUD: u32 = 115_200;
/// Settling wait around the GPIO pull-clock write.
pub const DEFAULT_SETTLE_CYCLES: u32 = 150;

/// IBRD/FBRD pair. The PL011 divides the reference clock by
/// `16 * (integer + fractional / 64)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudDivisor {
    pub integer: u16,
    pub fractional: u8,
}

impl BaudDivisor {
    /// Pin a divisor without computing it. `fractional` is 6 bits wide.
    pub const fn from_raw(integer: u16, fractional: u8) -> Self {
        Self {
            integer,
            fractional: fractional & 0x3F,
        }
    }

    /// Compute the divisor closest to `baud` for the given reference clock.
    pub fn compute(clock_hz: u32, baud: u32) -> Result<Self, UartError> {
        if baud == 0 {
            return Err(UartError::InvalidBaud);
        }

        // Divisor in 1/64 steps: clock / (16 * baud) * 64, rounded.
        let baud = u64::from(baud);
        let scaled = (4 * u64::from(clock_hz) + baud / 2) / baud;
        let integer = scaled >> 6;
        if integer == 0 || integer > u64::from(u16::MAX) {
            return Err(UartError::DivisorOutOfRange {
                clock_hz,
                baud: baud as u32,
            });
        }

        Ok(Self {
            integer: integer as u16,
            fractional: (scaled & 0x3F) as u8,
        })
    }

    /// Baud rate the line actually runs at with this divisor.
    pub fn actual_baud(&self, clock_hz: u32) -> u32 {
        let scaled = (u64::from(self.integer) << 6) | u64::from(self.fractional);
        if scaled == 0 {
            return 0;
        }
        ((4 * u64::from(clock_hz) + scaled / 2) / scaled) as u32
    }
}

/// Line speed settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub clock_hz: u32,
    pub baud: u32,
    /// Use these register values instead of computing them.
    pub pinned: Option<BaudDivisor>,
}

impl UartConfig {
    pub const fn new(clock_hz: u32, baud: u32) -> Self {
        Self {
            clock_hz,
            baud,
            pinned: None,
        }
    }

    pub const fn with_pinned(mut self, divisor: BaudDivisor) -> Self {
        self.pinned = Some(divisor);
        self
    }

    pub fn divisor(&self) -> Result<BaudDivisor, UartError> {
        match self.pinned {
            Some(divisor) => Ok(divisor),
            None => BaudDivisor::compute(self.clock_hz, self.baud),
        }
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::new(DEFAULT_UART_CLOCK_HZ, DEFAULT_BAUD)
    }
}

/// Address map and wiring of one board revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardProfile {
    pub gpio_base: usize,
    pub uart0_base: usize,
    pub uart: UartConfig,
    pub tx_pin: u8,
    pub rx_pin: u8,
    pub settle_cycles: u32,
}

impl BoardProfile {
    /// Raspberry Pi 2 and 3 (BCM2836/BCM2837).
    pub const RASPI2: Self = Self::with_peripheral_base(0x3F00_0000);

    /// Raspberry Pi 1 and Zero (BCM2835).
    pub const RASPI1: Self = Self::with_peripheral_base(0x2000_0000);

    /// Standard GPIO/UART0 placement relative to the SoC peripheral window.
    pub const fn with_peripheral_base(base: usize) -> Self {
        Self {
            gpio_base: base + 0x20_0000,
            uart0_base: base + 0x20_1000,
            uart: UartConfig::new(DEFAULT_UART_CLOCK_HZ, DEFAULT_BAUD),
            tx_pin: 14,
            rx_pin: 15,
            settle_cycles: DEFAULT_SETTLE_CYCLES,
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "raspi2" | "raspi3" => Some(Self::RASPI2),
            "raspi1" | "raspi0" | "zero" => Some(Self::RASPI1),
            _ => None,
        }
    }

    /// GPPUDCLK0 value selecting the two UART pins.
    ///
    /// Meant for a profile that passed [`BoardProfile::validate`]. A pin
    /// outside GPPUDCLK0 (32 and up) contributes no bit.
    pub const fn pud_clock_mask(&self) -> u32 {
        pin_bit(self.tx_pin) | pin_bit(self.rx_pin)
    }

    pub fn validate(&self) -> Result<BaudDivisor, UartError> {
        // Each block must end below the top of the address space.
        for (base, span) in [
            (self.gpio_base, gpio::GPPUDCLK0 + 4),
            (self.uart0_base, uart0::WINDOW),
        ] {
            if base % 4 != 0 {
                return Err(UartError::MisalignedBase { base });
            }
            if base.checked_add(span).is_none() {
                return Err(UartError::BaseOutOfRange { base });
            }
        }
        for pin in [self.tx_pin, self.rx_pin] {
            if pin >= 32 {
                return Err(UartError::InvalidPin { pin });
            }
        }
        if self.tx_pin == self.rx_pin {
            return Err(UartError::InvalidPin { pin: self.rx_pin });
        }
        self.uart.divisor()
    }
}

const fn pin_bit(pin: u8) -> u32 {
    match 1u32.checked_shl(pin as u32) {
        Some(bit) => bit,
        None => 0,
    }
}
