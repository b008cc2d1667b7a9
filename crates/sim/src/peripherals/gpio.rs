// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::BTreeMap;

const GPPUD: usize = 0x94;
const GPPUDCLK0: usize = 0x98;
const GPPUDCLK1: usize = 0x9C;

const PIN_COUNT: u8 = 54;

/// Pull resistor state latched into a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    Off,
    Down,
    Up,
}

impl Pull {
    fn from_gppud(value: u32) -> Option<Self> {
        match value & 0b11 {
            0 => Some(Self::Off),
            1 => Some(Self::Down),
            2 => Some(Self::Up),
            _ => None,
        }
    }
}

/// BCM283x GPIO pull-control model.
///
/// A pin takes the GPPUD value on the rising edge of its GPPUDCLKn bit. The
/// protocol is only complete once the clock bits are written back to zero;
/// until then the pins stay selected.
#[derive(Debug, Default, serde::Serialize)]
pub struct GpioModel {
    gppud: u32,     // 0x94: pull-up/down enable
    gppudclk0: u32, // 0x98: pull-up/down clock, pins 0..=31
    gppudclk1: u32, // 0x9C: pull-up/down clock, pins 32..=53
    pulls: BTreeMap<u8, Pull>,
    /// Function select, level and event registers, stored only.
    other: BTreeMap<usize, u32>,
}

impl GpioModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull state latched into `pin`, `None` while it still has its reset
    /// configuration.
    pub fn pull(&self, pin: u8) -> Option<Pull> {
        self.pulls.get(&pin).copied()
    }

    /// True when no pin is left selected by a pull clock.
    pub fn clock_released(&self) -> bool {
        self.gppudclk0 == 0 && self.gppudclk1 == 0
    }

    fn latch(&mut self, first_pin: u8, previous: u32, value: u32) {
        let rising = value & !previous;
        if rising == 0 {
            return;
        }

        let Some(pull) = Pull::from_gppud(self.gppud) else {
            tracing::warn!("GPPUD holds reserved value {:#x}; pins left untouched", self.gppud);
            return;
        };

        for bit in 0..32u8 {
            let pin = first_pin + bit;
            if rising & (1 << bit) != 0 && pin < PIN_COUNT {
                tracing::debug!("GPIO{} pull -> {:?}", pin, pull);
                self.pulls.insert(pin, pull);
            }
        }
    }
}

impl crate::Peripheral for GpioModel {
    fn read(&mut self, offset: usize) -> u32 {
        match offset {
            GPPUD => self.gppud,
            GPPUDCLK0 => self.gppudclk0,
            GPPUDCLK1 => self.gppudclk1,
            _ => self.other.get(&offset).copied().unwrap_or(0),
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            GPPUD => self.gppud = value & 0b11,
            GPPUDCLK0 => {
                self.latch(0, self.gppudclk0, value);
                self.gppudclk0 = value;
            }
            GPPUDCLK1 => {
                self.latch(32, self.gppudclk1, value & 0x003F_FFFF);
                self.gppudclk1 = value & 0x003F_FFFF;
            }
            _ => {
                self.other.insert(offset, value);
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
