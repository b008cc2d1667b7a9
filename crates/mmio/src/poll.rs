// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{Register, RegisterBus};

/// How long a polling loop may wait for a register to become ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollLimit {
    /// Spin until ready. There is no way back if the hardware never responds.
    #[default]
    Forever,
    /// Sample the register at most this many times. `Attempts(0)` still
    /// samples once.
    Attempts(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("register {address:#x} not ready after {attempts} polls")]
pub struct PollTimeout {
    pub address: usize,
    pub attempts: u32,
}

/// Spin `count` iterations.
///
/// Not calibrated to any time unit: this is the settling wait the GPIO pull
/// protocol asks for. Every iteration passes the counter through
/// `black_box` and calls [`RegisterBus::spin_hint`], so the loop is never
/// folded away. `delay(bus, 0)` returns without spinning.
#[inline(never)]
pub fn delay<B: RegisterBus + ?Sized>(bus: &B, count: u32) {
    let mut remaining = count;
    while remaining > 0 {
        remaining = core::hint::black_box(remaining - 1);
        bus.spin_hint();
    }
}

/// Re-read `reg` until `ready` accepts its value, returning that value.
///
/// Each failed sample is followed by one [`RegisterBus::spin_hint`]. The
/// first sample that satisfies `ready` ends the loop, so a flag cleared by
/// hardware is observed on the very next read. Never returns if the
/// hardware never becomes ready.
pub fn wait_until<B, F>(reg: &Register<'_, B>, mut ready: F) -> u32
where
    B: RegisterBus + ?Sized,
    F: FnMut(u32) -> bool,
{
    loop {
        let value = reg.read();
        if ready(value) {
            return value;
        }
        reg.bus().spin_hint();
    }
}

/// [`wait_until`] with a [`PollLimit`].
///
/// The sample that exhausts the limit returns [`PollTimeout`] without a
/// trailing spin, so `Attempts(n)` spins `n - 1` times before giving up.
pub fn poll_until<B, F>(
    reg: &Register<'_, B>,
    limit: PollLimit,
    mut ready: F,
) -> Result<u32, PollTimeout>
where
    B: RegisterBus + ?Sized,
    F: FnMut(u32) -> bool,
{
    let max = match limit {
        PollLimit::Forever => return Ok(wait_until(reg, ready)),
        PollLimit::Attempts(max) => max.max(1),
    };

    let mut attempts: u32 = 0;
    loop {
        let value = reg.read();
        attempts += 1;
        if ready(value) {
            return Ok(value);
        }
        if attempts >= max {
            return Err(PollTimeout {
                address: reg.address(),
                attempts,
            });
        }
        reg.bus().spin_hint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBus;

    #[test]
    fn test_delay_zero_does_not_spin() {
        let bus = ScriptedBus::default();
        delay(&bus, 0);
        assert_eq!(bus.spins.get(), 0);
    }

    #[test]
    fn test_delay_spins_exactly_count_times() {
        for count in [1u32, 2, 150, 1000] {
            let bus = ScriptedBus::default();
            delay(&bus, count);
            assert_eq!(bus.spins.get(), count, "delay({count})");
        }
    }

    #[test]
    fn test_delay_touches_no_register() {
        let bus = ScriptedBus::default();
        delay(&bus, 10);
        assert_eq!(bus.reads.get(), 0);
        assert!(bus.writes.borrow().is_empty());
    }

    #[test]
    fn test_poll_returns_on_first_ready_sample() {
        let bus = ScriptedBus::default();
        bus.script(0x18, &[0x20, 0x20, 0x00]);
        let fr = bus.register(0x18);

        let value = poll_until(&fr, PollLimit::Forever, |v| v & 0x20 == 0).unwrap();

        assert_eq!(value, 0);
        assert_eq!(bus.reads.get(), 3);
        assert_eq!(bus.spins.get(), 2);
    }

    #[test]
    fn test_wait_until_spins_between_samples() {
        let bus = ScriptedBus::default();
        bus.script(0x18, &[0x10, 0x10, 0x10, 0x00]);
        let fr = bus.register(0x18);

        assert_eq!(wait_until(&fr, |v| v & 0x10 == 0), 0);
        assert_eq!(bus.reads.get(), 4);
        assert_eq!(bus.spins.get(), 3);
    }

    #[test]
    fn test_poll_times_out_after_attempts() {
        let bus = ScriptedBus::default();
        bus.script(0x18, &[0x10; 8]);
        let fr = bus.register(0x18);

        let err = poll_until(&fr, PollLimit::Attempts(5), |v| v & 0x10 == 0).unwrap_err();

        assert_eq!(
            err,
            PollTimeout {
                address: 0x18,
                attempts: 5
            }
        );
        assert_eq!(bus.reads.get(), 5);
    }

    #[test]
    fn test_zero_attempts_still_samples_once() {
        let bus = ScriptedBus::default();
        let fr = bus.register(0x18);

        assert_eq!(poll_until(&fr, PollLimit::Attempts(0), |_| true), Ok(0));
        assert_eq!(bus.reads.get(), 1);

        bus.script(0x18, &[1]);
        let err = poll_until(&fr, PollLimit::Attempts(0), |v| v == 0).unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    #[test]
    fn test_timeout_message_names_register() {
        let err = PollTimeout {
            address: 0x3F20_1018,
            attempts: 3,
        };
        assert_eq!(err.to_string(), "register 0x3f201018 not ready after 3 polls");
    }
}
