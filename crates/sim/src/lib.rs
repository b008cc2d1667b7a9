// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host-side register space for the BCM283x UART path.
//!
//! The models here describe the hardware from the datasheet side and keep their
//! own register maps, so driver bugs in offsets or bit patterns show up as
//! mismatches instead of being mirrored.

pub mod board;
pub mod bus;
pub mod peripherals;
pub mod snapshot;

pub use board::SimBoard;
pub use bus::{PeripheralEntry, SimBus};
pub use peripherals::gpio::{GpioModel, Pull};
pub use peripherals::pl011::Pl011Model;
pub use snapshot::SimSnapshot;

use std::any::Any;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("peripheral '{name}' at {base:#x} overlaps '{other}'")]
    Overlap {
        name: String,
        base: usize,
        other: String,
    },
    #[error("peripheral '{name}' window at {base:#x} (+{size:#x}) wraps the address space")]
    WindowWraps {
        name: String,
        base: usize,
        size: usize,
    },
        #[error("peripheral '{0}' has an empty register window")]
    EmptyWindow(String),
    #[error("no peripheral named '{0}'")]
    UnknownPeripheral(String),
    #[error("peripheral '{0}' is not a {1}")]
    WrongType(String, &'static str),
}

pub type SimResult<T> = Result<T, SimError>;

/// One observable bus event, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Access {
    Read { addr: usize, value: u32 },
    Write { addr: usize, value: u32 },
    /// One busy-wait iteration.
    Spin,
    /// Access outside every mapped window. Reads return 0, writes are dropped.
    Unmapped { addr: usize },
}

/// Trait representing a memory-mapped peripheral model.
///
/// Reads take `&mut self`: on real hardware reading DR pops the receive FIFO
/// and reading FR samples live state.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: usize) -> u32;
    fn write(&mut self, offset: usize, value: u32);
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
