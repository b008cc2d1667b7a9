// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Raw memory-mapped I/O access.
//!
//! Everything that touches a peripheral register goes through [`RegisterBus`].
//! On the board that is [`Volatile`]; on the host it is a simulated register
//! space, so driver logic above this crate never dereferences a pointer itself.
#![cfg_attr(not(test), no_std)]

pub mod poll;
pub mod register;

pub use poll::{delay, poll_until, wait_until, PollLimit, PollTimeout};
pub use register::Register;

use core::ptr::{read_volatile, write_volatile};

/// Trait representing a 32-bit memory-mapped register space.
///
/// Every call is an observable access: implementations must not cache reads
/// or merge writes.
pub trait RegisterBus {
    fn read32(&self, addr: usize) -> u32;
    fn write32(&self, addr: usize, value: u32);

    /// Called once per busy-wait iteration.
    #[inline(always)]
    fn spin_hint(&self) {
        core::hint::spin_loop();
    }

    /// Borrow the register at `addr` as a [`Register`] capability.
    #[inline]
    fn register(&self, addr: usize) -> Register<'_, Self> {
        Register::new(self, addr)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }

    #[inline(always)]
    fn spin_hint(&self) {
        (**self).spin_hint()
    }
}

/// The physical register space, accessed with volatile loads and stores.
#[derive(Debug)]
pub struct Volatile {
    _private: (),
}

impl Volatile {
    /// # Safety
    ///
    /// Every address later passed to this bus must be a mapped, 4-byte aligned
    /// device register, and no other code may drive the same registers
    /// concurrently.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Volatile {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: covered by the contract of `Volatile::new`.
        unsafe { read_volatile(addr as *const u32) }
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        // SAFETY: covered by the contract of `Volatile::new`.
        unsafe { write_volatile(addr as *mut u32, value) }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::RegisterBus;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};

    /// Register space backed by a map, with scripted read values per address.
    #[derive(Default)]
    pub struct ScriptedBus {
        pub regs: RefCell<HashMap<usize, u32>>,
        pub scripted: RefCell<HashMap<usize, VecDeque<u32>>>,
        pub reads: Cell<u32>,
        pub writes: RefCell<Vec<(usize, u32)>>,
        pub spins: Cell<u32>,
    }

    impl ScriptedBus {
        pub fn script(&self, addr: usize, values: &[u32]) {
            self.scripted
                .borrow_mut()
                .entry(addr)
                .or_default()
                .extend(values.iter().copied());
        }
    }

    impl RegisterBus for ScriptedBus {
        fn read32(&self, addr: usize) -> u32 {
            self.reads.set(self.reads.get() + 1);
            if let Some(value) = self
                .scripted
                .borrow_mut()
                .get_mut(&addr)
                .and_then(|queue| queue.pop_front())
            {
                return value;
            }
            self.regs.borrow().get(&addr).copied().unwrap_or(0)
        }

        fn write32(&self, addr: usize, value: u32) {
            self.writes.borrow_mut().push((addr, value));
            self.regs.borrow_mut().insert(addr, value);
        }

        fn spin_hint(&self) {
            self.spins.set(self.spins.get() + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBus;
    use super::RegisterBus;

    #[test]
    fn test_reference_bus_forwards_every_access() {
        let bus = ScriptedBus::default();
        let by_ref = &bus;

        by_ref.write32(0x10, 0xAA);
        assert_eq!(by_ref.read32(0x10), 0xAA);
        by_ref.spin_hint();

        assert_eq!(*bus.writes.borrow(), vec![(0x10, 0xAA)]);
        assert_eq!(bus.reads.get(), 1);
        assert_eq!(bus.spins.get(), 1);
    }

    #[test]
    fn test_reads_are_never_cached() {
        let bus = ScriptedBus::default();
        bus.script(0x18, &[1, 2, 3]);

        let values: Vec<u32> = (0..3).map(|_| bus.read32(0x18)).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(bus.reads.get(), 3);
    }
}
