// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::RegisterBus;

/// A single 32-bit device register at a fixed address.
///
/// Neither `Clone` nor `Copy`. A handle is created from the bus for one fixed
/// address and only supports whole-word reads and writes.
#[derive(Debug)]
pub struct Register<'a, B: RegisterBus + ?Sized> {
    bus: &'a B,
    addr: usize,
}

impl<'a, B: RegisterBus + ?Sized> Register<'a, B> {
    #[inline]
    pub fn new(bus: &'a B, addr: usize) -> Self {
        debug_assert!(addr % 4 == 0, "register address {addr:#x} not word aligned");
        Self { bus, addr }
    }

    #[inline]
    #[must_use]
    pub fn address(&self) -> usize {
        self.addr
    }

    #[inline]
    pub(crate) fn bus(&self) -> &'a B {
        self.bus
    }

    #[inline]
    #[must_use]
    pub fn read(&self) -> u32 {
        self.bus.read32(self.addr)
    }

    #[inline]
    pub fn write(&self, value: u32) {
        self.bus.write32(self.addr, value)
    }

    /// Read-modify-write. Two bus accesses, not atomic.
    #[inline]
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read();
        self.write(f(value));
    }
}
