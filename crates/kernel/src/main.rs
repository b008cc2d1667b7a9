// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![no_std]
#![no_main]

//! Raspberry Pi 2 kernel image.
//!
//! The GPU firmware loads `kernel7.img` at 0x8000 and starts all four cores
//! there with `r0 = 0`, `r1 = machine type`, `r2 = ATAGS`. Core 0 sets up a
//! stack below the image, clears BSS and enters [`kernel_main`]; the others
//! park.

use core::arch::global_asm;
use oneos_mmio::Volatile;
use oneos_uart::{BoardProfile, Uart};
use panic_halt as _;

const BANNER: &str = "Hello, welcome to oneOS\r\n";

global_asm!(
    r#"
.section .text.boot
.global _start

_start:
    // r0-r2 carry the firmware arguments, keep them for kernel_main.
    mrc     p15, #0, r3, c0, c0, #5
    and     r3, r3, #3
    cmp     r3, #0
    bne     .Lpark

    // Stack grows down from the load address.
    mov     sp, #0x8000

    ldr     r4, =__bss_start
    ldr     r9, =__bss_end
    mov     r5, #0
.Lclear_bss:
    cmp     r4, r9
    strlo   r5, [r4], #4
    blo     .Lclear_bss

    bl      kernel_main

.Lpark:
    wfe
    b       .Lpark
"#
);

fn halt() -> ! {
    loop {
        // SAFETY: wfe only suspends the core until the next event.
        unsafe { core::arch::asm!("wfe") };
    }
}

#[no_mangle]
pub extern "C" fn kernel_main(_r0: u32, _r1: u32, _atags: u32) -> ! {
    // SAFETY: single core, interrupts masked, nothing else maps these
    // registers.
    let bus = unsafe { Volatile::new() };

    // The built-in profile always validates; without a UART there is no way
    // to report otherwise.
    let Ok(mut uart) = Uart::new(bus, BoardProfile::RASPI2) else {
        halt();
    };

    uart.init();
    uart.puts(BANNER);

    loop {
        let byte = uart.getc();
        uart.putc(byte);
    }
}
