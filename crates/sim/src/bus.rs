// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::snapshot::SimSnapshot;
use crate::{Access, Peripheral, SimError, SimResult};
use oneos_mmio::RegisterBus;
use std::cell::RefCell;
use std::collections::BTreeMap;

pub struct PeripheralEntry {
    pub name: String,
    pub base: usize,
    pub size: usize,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    /// One past the last byte. Mapped windows never wrap.
    fn end(&self) -> usize {
        self.base + self.size
    }

    fn overlaps(&self, base: usize, end: usize) -> bool {
        base < self.end() && self.base < end
    }
}

/// Simulated register space.
///
/// Single-threaded like the hardware it stands in for: interior mutability is
/// `RefCell`, so a `SimBus` is not `Sync`.
#[derive(Default)]
pub struct SimBus {
    peripherals: RefCell<Vec<PeripheralEntry>>,
    log: RefCell<Vec<Access>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `dev` at `[base, base + size)`.
    pub fn map(
        &mut self,
        name: impl Into<String>,
        base: usize,
        size: usize,
        dev: Box<dyn Peripheral>,
    ) -> SimResult<()> {
        let name = name.into();
        if size == 0 {
            return Err(SimError::EmptyWindow(name));
        }
        let Some(end) = base.checked_add(size) else {
            return Err(SimError::WindowWraps { name, base, size });
        };

        let peripherals = self.peripherals.get_mut();
        if let Some(other) = peripherals.iter().find(|p| p.overlaps(base, end)) {
            return Err(SimError::Overlap {
                name,
                base,
                other: other.name.clone(),
            });
        }

        tracing::debug!("Mapped {} at {:#x} (+{:#x})", name, base, size);
        peripherals.push(PeripheralEntry {
            name,
            base,
            size,
            dev,
        });
        Ok(())
    }

    /// Run `f` against the peripheral mapped as `name`, downcast to `T`.
    pub fn with_peripheral<T, R, F>(&self, name: &str, f: F) -> SimResult<R>
    where
        T: Peripheral + 'static,
        F: FnOnce(&mut T) -> R,
    {
        let mut peripherals = self.peripherals.borrow_mut();
        let entry = peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SimError::UnknownPeripheral(name.to_string()))?;
        let dev = entry
            .dev
            .as_any_mut()
            .and_then(|any| any.downcast_mut::<T>())
            .ok_or_else(|| SimError::WrongType(name.to_string(), std::any::type_name::<T>()))?;
        Ok(f(dev))
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    /// Writes only, as `(address, value)`.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|access| match *access {
                Access::Write { addr, value } => Some((addr, value)),
                _ => None,
            })
            .collect()
    }

    pub fn spin_count(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|access| matches!(access, Access::Spin))
            .count()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let peripherals: BTreeMap<String, serde_json::Value> = self
            .peripherals
            .borrow()
            .iter()
            .map(|p| (p.name.clone(), p.dev.snapshot()))
            .collect();
        SimSnapshot {
            peripherals,
            accesses: self.accesses(),
            spins: self.spin_count(),
        }
    }

    fn record(&self, access: Access) {
        self.log.borrow_mut().push(access);
    }
}

impl RegisterBus for SimBus {
    fn read32(&self, addr: usize) -> u32 {
        let hit = {
            let mut peripherals = self.peripherals.borrow_mut();
            peripherals
                .iter_mut()
                .find(|p| p.contains(addr))
                .map(|entry| {
                    let value = entry.dev.read(addr - entry.base);
                    tracing::trace!("{} read  {:#010x} -> {:#x}", entry.name, addr, value);
                    value
                })
        };

        match hit {
            Some(value) => {
                self.record(Access::Read { addr, value });
                value
            }
            None => {
                tracing::warn!("Unmapped read at {:#x}", addr);
                self.record(Access::Unmapped { addr });
                0
            }
        }
    }

    fn write32(&self, addr: usize, value: u32) {
        let mapped = {
            let mut peripherals = self.peripherals.borrow_mut();
            match peripherals.iter_mut().find(|p| p.contains(addr)) {
                Some(entry) => {
                    tracing::trace!("{} write {:#010x} <- {:#x}", entry.name, addr, value);
                    entry.dev.write(addr - entry.base, value);
                    true
                }
                None => false,
            }
        };

        if mapped {
            self.record(Access::Write { addr, value });
        } else {
            tracing::warn!("Unmapped write at {:#x} <- {:#x}", addr, value);
            self.record(Access::Unmapped { addr });
        }
    }

    fn spin_hint(&self) {
        self.record(Access::Spin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Scratch {
        regs: BTreeMap<usize, u32>,
    }

    impl Peripheral for Scratch {
        fn read(&mut self, offset: usize) -> u32 {
            self.regs.get(&offset).copied().unwrap_or(0)
        }

        fn write(&mut self, offset: usize, value: u32) {
            self.regs.insert(offset, value);
        }

        fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
            Some(self)
        }
    }

    #[test]
    fn test_routes_by_window() {
        let mut bus = SimBus::new();
        bus.map("a", 0x1000, 0x100, Box::new(Scratch::default()))
            .unwrap();
        bus.map("b", 0x1100, 0x100, Box::new(Scratch::default()))
            .unwrap();

        bus.write32(0x1004, 7);
        bus.write32(0x1104, 9);

        let a = bus
            .with_peripheral::<Scratch, _, _>("a", |s| s.regs.get(&4).copied())
            .unwrap();
        let b = bus
            .with_peripheral::<Scratch, _, _>("b", |s| s.regs.get(&4).copied())
            .unwrap();
        assert_eq!(a, Some(7));
        assert_eq!(b, Some(9));
        assert_eq!(bus.read32(0x1104), 9);
    }

    #[test]
    fn test_rejects_overlap_and_empty_window() {
        let mut bus = SimBus::new();
        bus.map("a", 0x1000, 0x100, Box::new(Scratch::default()))
            .unwrap();

        let err = bus
            .map("b", 0x10FC, 0x10, Box::new(Scratch::default()))
            .unwrap_err();
        assert!(matches!(err, SimError::Overlap { ref other, .. } if other == "a"));

        let err = bus
            .map("c", 0x2000, 0, Box::new(Scratch::default()))
            .unwrap_err();
        assert!(matches!(err, SimError::EmptyWindow(_)));
    }

    #[test]
    fn test_rejects_window_past_end_of_address_space() {
        let mut bus = SimBus::new();
        bus.map("a", 0x1000, 0x100, Box::new(Scratch::default()))
            .unwrap();

        let err = bus
            .map("top", usize::MAX - 0x7FF, 0x1000, Box::new(Scratch::default()))
            .unwrap_err();
        assert!(matches!(err, SimError::WindowWraps { ref name, size: 0x1000, .. } if name == "top"));

        // A window ending exactly at the top still fits.
        bus.map("last", usize::MAX - 0xFFF, 0x1000, Box::new(Scratch::default()))
            .unwrap();
        bus.write32(usize::MAX - 3, 5);
        assert_eq!(bus.read32(usize::MAX - 3), 5);
    }

    #[test]
    fn test_logs_accesses_in_order() {
        let mut bus = SimBus::new();
        bus.map("a", 0x0, 0x10, Box::new(Scratch::default()))
            .unwrap();

        bus.write32(0x4, 1);
        bus.spin_hint();
        bus.read32(0x4);
        bus.read32(0x40);

        assert_eq!(
            bus.accesses(),
            vec![
                Access::Write { addr: 0x4, value: 1 },
                Access::Spin,
                Access::Read { addr: 0x4, value: 1 },
                Access::Unmapped { addr: 0x40 },
            ]
        );
        assert_eq!(bus.writes(), vec![(0x4, 1)]);
        assert_eq!(bus.spin_count(), 1);

        bus.clear_log();
        assert!(bus.accesses().is_empty());
    }

    #[test]
    fn test_with_peripheral_errors() {
        let mut bus = SimBus::new();
        bus.map("a", 0x0, 0x10, Box::new(Scratch::default()))
            .unwrap();

        assert!(matches!(
            bus.with_peripheral::<Scratch, _, _>("missing", |_| ()),
            Err(SimError::UnknownPeripheral(_))
        ));
        assert!(matches!(
            bus.with_peripheral::<crate::Pl011Model, _, _>("a", |_| ()),
            Err(SimError::WrongType(..))
        ));
    }
}
