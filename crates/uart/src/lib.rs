// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Polling driver for the PL011 UART0 of the Raspberry Pi.
//!
//! The driver is built entirely on [`RegisterBus`]: on the board it runs over
//! [`oneos_mmio::Volatile`], in tests over a simulated register space. All
//! addresses come from the injected [`BoardProfile`].
//!
//! ```ignore
//! let bus = unsafe { Volatile::new() };
//! let mut uart = Uart::new(bus, BoardProfile::RASPI2)?;
//! uart.init();
//! uart.puts("Hello, welcome to oneOS\r\n");
//! loop {
//!     let byte = uart.getc();
//!     uart.putc(byte);
//! }
//! ```
#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod regs;

pub use board::{BaudDivisor, BoardProfile, UartConfig};
pub use regs::{Control, Flags, Interrupts, LineControl};

use core::ffi::{c_char, CStr};
use core::fmt;
use oneos_mmio::{delay, poll_until, wait_until, PollLimit, PollTimeout, Register, RegisterBus};
use regs::{gpio, uart0};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UartError {
    #[error(transparent)]
    Timeout(#[from] PollTimeout),
    #[error("null text pointer")]
    NullText,
    #[error("baud rate must be non-zero")]
    InvalidBaud,
    #[error("no PL011 divisor reaches {baud} baud from a {clock_hz} Hz reference clock")]
    DivisorOutOfRange { clock_hz: u32, baud: u32 },
    #[error("GPIO pin {pin} cannot carry UART0 through GPPUDCLK0")]
    InvalidPin { pin: u8 },
    #[error("peripheral base {base:#x} is not word aligned")]
    MisalignedBase { base: usize },
    #[error("register block at {base:#x} runs past the end of the address space")]
    BaseOutOfRange { base: usize },
}

/// PL011 UART0 driver.
///
/// Construct once at start-up and call [`Uart::init`] exactly once before any
/// transfer. Calling `init` again re-runs the full hardware sequence; that is
/// harmless on the PL011 but nothing here guards against it. Transmit and
/// receive readiness is never cached: every operation re-reads UARTFR.
pub struct Uart<B: RegisterBus> {
    bus: B,
    profile: BoardProfile,
    divisor: BaudDivisor,
}

impl<B: RegisterBus> Uart<B> {
    /// Validate `profile` and bind it to `bus`. Touches no register.
    pub fn new(bus: B, profile: BoardProfile) -> Result<Self, UartError> {
        let divisor = profile.validate()?;
        Ok(Self {
            bus,
            profile,
            divisor,
        })
    }

    pub fn profile(&self) -> &BoardProfile {
        &self.profile
    }

    pub fn divisor(&self) -> BaudDivisor {
        self.divisor
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    fn uart_reg(&self, offset: usize) -> Register<'_, B> {
        self.bus.register(self.profile.uart0_base + offset)
    }

    fn gpio_reg(&self, offset: usize) -> Register<'_, B> {
        self.bus.register(self.profile.gpio_base + offset)
    }

    /// Bring the UART up. The write order below is required by the hardware.
    pub fn init(&mut self) {
        let cr = self.uart_reg(uart0::CR);

        // Quiesce the UART while it is reconfigured.
        cr.write(0);

        // GPIO pull protocol: set the pull state, clock it into pins 14/15,
        // then release the clock.
        let gppud = self.gpio_reg(gpio::GPPUD);
        let gppudclk0 = self.gpio_reg(gpio::GPPUDCLK0);
        gppud.write(0);
        delay(&self.bus, self.profile.settle_cycles);
        gppudclk0.write(self.profile.pud_clock_mask());
        delay(&self.bus, self.profile.settle_cycles);
        gppudclk0.write(0);

        self.uart_reg(uart0::ICR).write(Interrupts::all().bits());

        self.uart_reg(uart0::IBRD)
            .write(u32::from(self.divisor.integer));
        self.uart_reg(uart0::FBRD)
            .write(u32::from(self.divisor.fractional));

        self.uart_reg(uart0::LCRH)
            .write((LineControl::FEN | LineControl::WLEN_8).bits());

        self.uart_reg(uart0::IMSC)
            .write(Interrupts::POLLING_MASK.bits());

        // UARTEN, TXE and RXE go up together in a single write.
        cr.write((Control::UARTEN | Control::TXE | Control::RXE).bits());
    }

    /// Live UARTFR contents.
    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.uart_reg(uart0::FR).read())
    }

    pub fn can_write(&self) -> bool {
        !self.flags().contains(Flags::TXFF)
    }

    pub fn can_read(&self) -> bool {
        !self.flags().contains(Flags::RXFE)
    }

    /// Block while the transmit FIFO is full, then queue `byte`.
    pub fn putc(&mut self, byte: u8) {
        wait_until(&self.uart_reg(uart0::FR), |fr| fr & Flags::TXFF.bits() == 0);
        self.uart_reg(uart0::DR).write(u32::from(byte));
    }

    /// [`Uart::putc`] that gives up after `limit`. DR is not written on timeout.
    pub fn try_putc(&mut self, byte: u8, limit: PollLimit) -> Result<(), UartError> {
        poll_until(&self.uart_reg(uart0::FR), limit, |fr| {
            fr & Flags::TXFF.bits() == 0
        })?;
        self.uart_reg(uart0::DR).write(u32::from(byte));
        Ok(())
    }

    /// Block while the receive FIFO is empty, then take one byte.
    pub fn getc(&mut self) -> u8 {
        wait_until(&self.uart_reg(uart0::FR), |fr| fr & Flags::RXFE.bits() == 0);
        (self.uart_reg(uart0::DR).read() & 0xFF) as u8
    }

    /// [`Uart::getc`] that gives up after `limit`. DR is not read on timeout.
    pub fn try_getc(&mut self, limit: PollLimit) -> Result<u8, UartError> {
        poll_until(&self.uart_reg(uart0::FR), limit, |fr| {
            fr & Flags::RXFE.bits() == 0
        })?;
        Ok((self.uart_reg(uart0::DR).read() & 0xFF) as u8)
    }

    /// Send every byte of `text`. No line ending is appended.
    pub fn puts(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.putc(byte);
        }
    }

    /// Send a NUL-terminated string, returning the number of bytes sent.
    ///
    /// A null `text` is rejected before any register is touched.
    ///
    /// # Safety
    ///
    /// A non-null `text` must point to a NUL-terminated string that stays
    /// valid for the duration of the call.
    pub unsafe fn puts_cstr(&mut self, text: *const c_char) -> Result<usize, UartError> {
        if text.is_null() {
            return Err(UartError::NullText);
        }
        // SAFETY: non-null, and the caller guarantees termination.
        let bytes = unsafe { CStr::from_ptr(text) }.to_bytes();
        self.write_bytes(bytes);
        Ok(bytes.len())
    }

    /// Block until the UART has shifted out everything queued.
    pub fn drain(&mut self) {
        wait_until(&self.uart_reg(uart0::FR), |fr| fr & Flags::BUSY.bits() == 0);
    }
}

impl<B: RegisterBus> fmt::Write for Uart<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s);
        Ok(())
    }
}
