// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{GpioModel, Pl011Model, SimBus, SimResult};
use oneos_mmio::RegisterBus;
use std::ops::Deref;

/// GPIO register block size on the BCM283x.
pub const GPIO_WINDOW: usize = 0xB4;
/// PL011 register block size, up to and including TDR.
pub const UART0_WINDOW: usize = 0x90;

pub const GPIO_NAME: &str = "gpio";
pub const UART0_NAME: &str = "uart0";

/// GPIO and UART0 mapped the way a board profile places them.
pub struct SimBoard {
    bus: SimBus,
}

impl SimBoard {
    pub fn new(gpio_base: usize, uart0_base: usize) -> SimResult<Self> {
        Self::with_windows((gpio_base, GPIO_WINDOW), (uart0_base, UART0_WINDOW))
    }

    /// Map both blocks with explicit `(base, size)` windows.
    pub fn with_windows(gpio: (usize, usize), uart0: (usize, usize)) -> SimResult<Self> {
        let mut bus = SimBus::new();
        bus.map(GPIO_NAME, gpio.0, gpio.1, Box::new(GpioModel::new()))?;
        bus.map(UART0_NAME, uart0.0, uart0.1, Box::new(Pl011Model::new()))?;
        tracing::info!(
            "Simulated board: gpio @ {:#x}, uart0 @ {:#x}",
            gpio.0,
            uart0.0
        );
        Ok(Self { bus })
    }

    pub fn pl011<R>(&self, f: impl FnOnce(&mut Pl011Model) -> R) -> SimResult<R> {
        self.bus.with_peripheral::<Pl011Model, R, _>(UART0_NAME, f)
    }

    pub fn gpio<R>(&self, f: impl FnOnce(&mut GpioModel) -> R) -> SimResult<R> {
        self.bus.with_peripheral::<GpioModel, R, _>(GPIO_NAME, f)
    }
}

impl Deref for SimBoard {
    type Target = SimBus;

    fn deref(&self) -> &SimBus {
        &self.bus
    }
}

impl RegisterBus for SimBoard {
    fn read32(&self, addr: usize) -> u32 {
        self.bus.read32(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        self.bus.write32(addr, value)
    }

    fn spin_hint(&self) {
        self.bus.spin_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Access;

    #[test]
    fn test_board_maps_both_blocks() {
        let board = SimBoard::new(0x3F20_0000, 0x3F20_1000).unwrap();

        board.write32(0x3F20_0094, 0);
        board.write32(0x3F20_1030, 0x301);

        assert_eq!(board.pl011(|u| u.control()).unwrap(), 0x301);
        assert!(board.gpio(|g| g.clock_released()).unwrap());
        assert!(board
            .accesses()
            .iter()
            .all(|a| !matches!(a, Access::Unmapped { .. })));
    }

    #[test]
    fn test_overlapping_windows_are_rejected() {
        assert!(SimBoard::with_windows((0x1000, 0x2000), (0x2000, 0x90)).is_err());
    }
}
