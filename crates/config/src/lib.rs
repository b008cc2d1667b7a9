// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use oneos_uart::board::{DEFAULT_BAUD, DEFAULT_SETTLE_CYCLES, DEFAULT_UART_CLOCK_HZ};
use oneos_uart::{BaudDivisor, BoardProfile, UartConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default schema version for board descriptors
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_window_size() -> String {
    "4KiB".to_string()
}

fn default_clock_hz() -> u32 {
    DEFAULT_UART_CLOCK_HZ
}

fn default_baud() -> u32 {
    DEFAULT_BAUD
}

fn default_tx_pin() -> u8 {
    14
}

fn default_rx_pin() -> u8 {
    15
}

/// Smallest window that still covers each register block.
pub const GPIO_MIN_WINDOW: u64 = 0xB4;
pub const UART0_MIN_WINDOW: u64 = 0x90;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Unsupported schema_version '{0}'. Supported versions: '1.0'")]
    UnsupportedSchema(String),
    #[error("Unknown board preset '{0}'. Known presets: raspi2, raspi3, raspi1, raspi0, zero")]
    UnknownPreset(String),
    #[error("Block '{0}' is required when no 'board' preset is given")]
    MissingBlock(&'static str),
    #[error("Block '{block}' base {base:#x} is not 4-byte aligned")]
    Misaligned { block: &'static str, base: u64 },
    #[error("Block '{block}' window of {size:#x} bytes is smaller than its registers ({min:#x})")]
    WindowTooSmall {
        block: &'static str,
        size: u64,
        min: u64,
    },
    #[error("Block '{block}' window at {base:#x} (+{size:#x}) runs past the end of the address space")]
    WindowWraps {
        block: &'static str,
        base: u64,
        size: u64,
    },
    #[error("Windows 'gpio' and 'uart0' overlap")]
    Overlap,
    #[error("Pin {pin} is out of range for GPPUDCLK0 (must be < 32)")]
    PinOutOfRange { pin: u8 },
    #[error("tx_pin and rx_pin are both {0}")]
    SamePins(u8),
    #[error("Baud rate must be greater than zero")]
    ZeroBaud,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub base: u64,
    #[serde(default = "default_window_size")]
    pub size: String, // e.g. "4KiB"
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Uart0Config {
    pub base: u64,
    #[serde(default = "default_window_size")]
    pub size: String,
    #[serde(default = "default_clock_hz")]
    pub clock_hz: u32,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_tx_pin")]
    pub tx_pin: u8,
    #[serde(default = "default_rx_pin")]
    pub rx_pin: u8,
    /// Fixed IBRD/FBRD pair, written instead of the computed divisor.
    #[serde(default)]
    pub ibrd: Option<u16>,
    #[serde(default)]
    pub fbrd: Option<u8>,
}

/// Address map and line settings of one board, as read from YAML.
///
/// Either names a built-in `board` preset, spells out both `gpio` and `uart0`
/// blocks, or both: explicit blocks replace the preset's.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BoardDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub gpio: Option<WindowConfig>,
    #[serde(default)]
    pub uart0: Option<Uart0Config>,
    #[serde(default)]
    pub settle_cycles: Option<u32>,
}

/// Simulator windows as `(base, size)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardWindows {
    pub gpio: (usize, usize),
    pub uart0: (usize, usize),
}

impl BoardDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read board descriptor at {:?}", path))?;
        let desc = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid board descriptor {:?}", path))?;
        tracing::info!("Loaded board descriptor '{}' from {:?}", desc.display_name(), path);
        Ok(desc)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let desc: Self =
            serde_yaml::from_str(yaml).context("Failed to parse Board Descriptor YAML")?;
        desc.validate()?;
        Ok(desc)
    }

    /// Descriptor that resolves to the built-in preset `name`.
    pub fn preset(name: &str) -> Result<Self> {
        let desc = Self {
            schema_version: default_schema_version(),
            name: Some(name.to_string()),
            board: Some(name.to_string()),
            gpio: None,
            uart0: None,
            settle_cycles: None,
        };
        desc.validate()?;
        Ok(desc)
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.board.as_deref())
            .unwrap_or("custom")
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            return Err(DescriptorError::UnsupportedSchema(self.schema_version.clone()).into());
        }

        if let Some(uart0) = &self.uart0 {
            if uart0.baud == 0 {
                return Err(DescriptorError::ZeroBaud.into());
            }
            for pin in [uart0.tx_pin, uart0.rx_pin] {
                if pin >= 32 {
                    return Err(DescriptorError::PinOutOfRange { pin }.into());
                }
            }
            if uart0.tx_pin == uart0.rx_pin {
                return Err(DescriptorError::SamePins(uart0.tx_pin).into());
            }
        }

        let windows = self.raw_windows()?;
        for (block, (base, size), min) in [
            ("gpio", windows.0, GPIO_MIN_WINDOW),
            ("uart0", windows.1, UART0_MIN_WINDOW),
        ] {
            if base % 4 != 0 {
                return Err(DescriptorError::Misaligned { block, base }.into());
            }
            if size < min {
                return Err(DescriptorError::WindowTooSmall { block, size, min }.into());
            }
            if base.checked_add(size).is_none() {
                return Err(DescriptorError::WindowWraps { block, base, size }.into());
            }
        }

        // Both ends fit in u64 after the check above.
        let ((gpio_base, gpio_size), (uart_base, uart_size)) = windows;
        if gpio_base < uart_base + uart_size && uart_base < gpio_base + gpio_size {
            return Err(DescriptorError::Overlap.into());
        }

        // Base conversions, pin mask and divisor range.
        let profile = self.build_profile()?;
        profile.validate().with_context(|| {
            format!(
                "Board '{}' cannot drive UART0 at {} baud",
                self.display_name(),
                profile.uart.baud
            )
        })?;
        Ok(())
    }

    /// The typed profile handed to the driver.
    pub fn to_profile(&self) -> Result<BoardProfile> {
        self.validate()?;
        self.build_profile()
    }

    /// Register windows for the simulator.
    pub fn windows(&self) -> Result<BoardWindows> {
        let ((gpio_base, gpio_size), (uart_base, uart_size)) = self.raw_windows()?;
        Ok(BoardWindows {
            gpio: (to_usize("gpio.base", gpio_base)?, to_usize("gpio.size", gpio_size)?),
            uart0: (
                to_usize("uart0.base", uart_base)?,
                to_usize("uart0.size", uart_size)?,
            ),
        })
    }

    fn base_profile(&self) -> Result<Option<BoardProfile>> {
        match &self.board {
            Some(name) => BoardProfile::preset(name)
                .map(Some)
                .ok_or_else(|| DescriptorError::UnknownPreset(name.clone()).into()),
            None => Ok(None),
        }
    }

    /// `((gpio_base, gpio_size), (uart0_base, uart0_size))` before any
    /// conversion to host pointer width.
    fn raw_windows(&self) -> Result<((u64, u64), (u64, u64))> {
        let preset = self.base_profile()?;
        let default_size = parse_size(&default_window_size())?;

        let gpio = match (&self.gpio, &preset) {
            (Some(gpio), _) => (
                gpio.base,
                parse_size(&gpio.size).context("Invalid size for block 'gpio'")?,
            ),
            (None, Some(p)) => (p.gpio_base as u64, default_size),
            (None, None) => return Err(DescriptorError::MissingBlock("gpio").into()),
        };
        let uart0 = match (&self.uart0, &preset) {
            (Some(uart0), _) => (
                uart0.base,
                parse_size(&uart0.size).context("Invalid size for block 'uart0'")?,
            ),
            (None, Some(p)) => (p.uart0_base as u64, default_size),
            (None, None) => return Err(DescriptorError::MissingBlock("uart0").into()),
        };
        Ok((gpio, uart0))
    }

    fn build_profile(&self) -> Result<BoardProfile> {
        let mut profile = match self.base_profile()? {
            Some(profile) => profile,
            None => BoardProfile::with_peripheral_base(0),
        };

        if let Some(gpio) = &self.gpio {
            profile.gpio_base = to_usize("gpio.base", gpio.base)?;
        } else if self.board.is_none() {
            return Err(DescriptorError::MissingBlock("gpio").into());
        }

        if let Some(uart0) = &self.uart0 {
            profile.uart0_base = to_usize("uart0.base", uart0.base)?;
            profile.tx_pin = uart0.tx_pin;
            profile.rx_pin = uart0.rx_pin;
            let mut uart = UartConfig::new(uart0.clock_hz, uart0.baud);
            if uart0.ibrd.is_some() || uart0.fbrd.is_some() {
                let pinned = BaudDivisor::from_raw(
                    uart0.ibrd.context("uart0.fbrd is set without uart0.ibrd")?,
                    uart0.fbrd.context("uart0.ibrd is set without uart0.fbrd")?,
                );
                uart = uart.with_pinned(pinned);
            }
            profile.uart = uart;
        } else if self.board.is_none() {
            return Err(DescriptorError::MissingBlock("uart0").into());
        }

        profile.settle_cycles = self.settle_cycles.unwrap_or(DEFAULT_SETTLE_CYCLES);
        Ok(profile)
    }
}

fn to_usize(field: &str, value: u64) -> Result<usize> {
    usize::try_from(value)
        .with_context(|| format!("Field '{}' value {:#x} does not fit a host address", field, value))
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format '{}': {}", size_str, e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
