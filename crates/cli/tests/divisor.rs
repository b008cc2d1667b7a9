// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::process::Command;

fn divisor(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_oneos"))
        .arg("divisor")
        .args(args)
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_default_clock_and_baud() {
    let output = divisor(&[]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("IBRD=1\n"));
    assert!(stdout.contains("FBRD=40\n"));
    assert!(stdout.contains("actual_baud=115385"));
}

#[test]
fn test_48mhz_clock() {
    let output = divisor(&["--clock", "48000000", "--baud", "115200"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("IBRD=26\n"));
    assert!(stdout.contains("FBRD=3\n"));
}

#[test]
fn test_zero_baud_is_config_error() {
    let output = divisor(&["--baud", "0"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unreachable_baud_is_config_error() {
    let output = divisor(&["--clock", "3000000", "--baud", "4000000"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no PL011 divisor"));
}
