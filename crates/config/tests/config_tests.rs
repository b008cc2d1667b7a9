// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use oneos_config::BoardDescriptor;
use oneos_uart::{BaudDivisor, BoardProfile};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn board_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs/boards")
        .join(name)
}

fn write_temp_file(prefix: &str, contents: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("oneos-config-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = dir.join(format!("{}-{}.yaml", prefix, nonce));
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

#[test]
fn test_shipped_boards_match_builtin_profiles() {
    let raspi2 = BoardDescriptor::from_file(board_file("raspi2.yaml")).unwrap();
    assert_eq!(raspi2.to_profile().unwrap(), BoardProfile::RASPI2);

    let raspi1 = BoardDescriptor::from_file(board_file("raspi1.yaml")).unwrap();
    assert_eq!(raspi1.to_profile().unwrap(), BoardProfile::RASPI1);
}

#[test]
fn test_shipped_48mhz_board() {
    let desc = BoardDescriptor::from_file(board_file("raspi2-48mhz.yaml")).unwrap();
    let profile = desc.to_profile().unwrap();

    assert_eq!(desc.display_name(), "raspi2-48mhz");
    assert_eq!(profile.gpio_base, BoardProfile::RASPI2.gpio_base);
    assert_eq!(profile.uart.divisor().unwrap(), BaudDivisor::from_raw(26, 3));
}

#[test]
fn test_windows_follow_descriptor() {
    let desc = BoardDescriptor::from_file(board_file("raspi2.yaml")).unwrap();
    let windows = desc.windows().unwrap();
    assert_eq!(windows.gpio, (0x3F20_0000, 0x1000));
    assert_eq!(windows.uart0, (0x3F20_1000, 0x1000));
}

#[test]
fn test_missing_file_names_path() {
    let err = BoardDescriptor::from_file("/nonexistent/board.yaml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/board.yaml"));
}

#[test]
fn test_invalid_file_reports_cause() {
    let path = write_temp_file(
        "bad-pin",
        r#"
board: raspi2
uart0:
  base: 0x3F201000
  tx_pin: 33
"#,
    );

    let err = BoardDescriptor::from_file(&path).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Invalid board descriptor"));
    assert!(message.contains("Pin 33"));
}

#[test]
fn test_preset_aliases() {
    for (name, profile) in [
        ("raspi2", BoardProfile::RASPI2),
        ("raspi3", BoardProfile::RASPI2),
        ("raspi1", BoardProfile::RASPI1),
        ("zero", BoardProfile::RASPI1),
    ] {
        let desc = BoardDescriptor::preset(name).unwrap();
        assert_eq!(desc.to_profile().unwrap(), profile, "preset {}", name);
    }
}
