// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oneos_config::BoardDescriptor;
use oneos_mmio::PollLimit;
use oneos_sim::SimBoard;
use oneos_uart::{BaudDivisor, BoardProfile, Uart};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";
const DEFAULT_BANNER: &str = "Hello, welcome to oneOS\r\n";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "oneOS UART bring-up on a simulated Raspberry Pi",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Boot the UART on a simulated board, print the banner and echo input.
    Run(RunArgs),

    /// Compute the IBRD/FBRD pair for a reference clock and baud rate.
    Divisor(DivisorArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to a board descriptor (YAML)
    #[arg(short, long, conflicts_with = "preset")]
    board: Option<PathBuf>,

    /// Built-in board preset (raspi2, raspi3, raspi1, raspi0, zero)
    #[arg(short, long)]
    preset: Option<String>,

    /// Bytes arriving on the RX line after the banner
    #[arg(short, long, default_value = "")]
    input: String,

    /// Text sent right after initialization
    #[arg(long, default_value = DEFAULT_BANNER)]
    banner: String,

    /// Flag register reads allowed per byte before giving up
    #[arg(long, default_value_t = 1000)]
    max_polls: u32,

    /// Keep RXFE asserted for this many flag reads before each input byte
    #[arg(long, default_value_t = 0)]
    rx_delay: u32,

    /// Do not print the UART transcript to stdout
    #[arg(long)]
    no_uart_stdout: bool,

    /// Directory to write run artifacts (result.json, uart.log, trace.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DivisorArgs {
    /// UART reference clock in Hz
    #[arg(long, default_value_t = oneos_uart::board::DEFAULT_UART_CLOCK_HZ)]
    clock: u32,

    /// Target baud rate
    #[arg(long, default_value_t = oneos_uart::board::DEFAULT_BAUD)]
    baud: u32,
}

#[derive(Debug, Serialize)]
struct RunResult {
    result_schema_version: String,
    status: String,
    board: String,
    gpio_base: usize,
    uart0_base: usize,
    clock_hz: u32,
    baud: u32,
    ibrd: u16,
    fbrd: u8,
    actual_baud: u32,
    bytes_echoed: usize,
    bytes_transmitted: usize,
    spins: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// How a run ended.
enum Outcome {
    Pass,
    Failed(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Divisor(args) => divisor(args),
    }
}

fn load_descriptor(args: &RunArgs) -> Result<BoardDescriptor> {
    match (&args.board, &args.preset) {
        (Some(path), _) => BoardDescriptor::from_file(path),
        (None, Some(name)) => BoardDescriptor::preset(name),
        (None, None) => BoardDescriptor::preset("raspi2"),
    }
}

fn build_board(desc: &BoardDescriptor) -> Result<(SimBoard, BoardProfile)> {
    let profile = desc.to_profile()?;
    let windows = desc.windows()?;
    let board = SimBoard::with_windows(windows.gpio, windows.uart0)
        .context("Failed to map board peripherals")?;
    Ok((board, profile))
}

fn run(args: RunArgs) -> ExitCode {
    let desc = match load_descriptor(&args) {
        Ok(desc) => desc,
        Err(e) => {
            error!("Failed to load board: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let (board, profile) = match build_board(&desc) {
        Ok(built) => built,
        Err(e) => {
            error!("Invalid board '{}': {:#}", desc.display_name(), e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let mut uart = match Uart::new(&board, profile) {
        Ok(uart) => uart,
        Err(e) => {
            error!("UART rejected board '{}': {}", desc.display_name(), e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    if let Err(e) = board.pl011(|u| u.set_sink(Some(uart_tx.clone()))) {
        error!("Simulated board has no UART0: {}", e);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    info!(
        "Booting '{}': UART0 @ {:#x}, {} baud (IBRD={} FBRD={})",
        desc.display_name(),
        profile.uart0_base,
        profile.uart.baud,
        uart.divisor().integer,
        uart.divisor().fractional
    );

    uart.init();
    uart.puts(&args.banner);

    let limit = PollLimit::Attempts(args.max_polls);
    let mut echoed = 0usize;
    let mut outcome = Outcome::Pass;
    for &byte in args.input.as_bytes() {
        if let Err(e) = board.pl011(|u| {
            u.push_rx(&[byte]);
            u.delay_rx(args.rx_delay);
        }) {
            outcome = Outcome::Failed(e.to_string());
            break;
        }

        let received = match uart.try_getc(limit) {
            Ok(received) => received,
            Err(e) => {
                outcome = Outcome::Failed(format!("receive: {}", e));
                break;
            }
        };
        if let Err(e) = uart.try_putc(received, limit) {
            outcome = Outcome::Failed(format!("transmit: {}", e));
            break;
        }
        echoed += 1;
    }
    if matches!(outcome, Outcome::Pass) {
        uart.drain();
    }

    let transcript = match uart_tx.lock() {
        Ok(bytes) => bytes.clone(),
        Err(_) => {
            error!("UART sink poisoned");
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };
    if !args.no_uart_stdout {
        print!("{}", String::from_utf8_lossy(&transcript));
    }

    let divisor = uart.divisor();
    let (status, message) = match &outcome {
        Outcome::Pass => ("pass", None),
        Outcome::Failed(message) => ("error", Some(message.clone())),
    };
    let result = RunResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        board: desc.display_name().to_string(),
        gpio_base: profile.gpio_base,
        uart0_base: profile.uart0_base,
        clock_hz: profile.uart.clock_hz,
        baud: profile.uart.baud,
        ibrd: divisor.integer,
        fbrd: divisor.fractional,
        actual_baud: divisor.actual_baud(profile.uart.clock_hz),
        bytes_echoed: echoed,
        bytes_transmitted: transcript.len(),
        spins: board.spin_count(),
        message,
    };

    if let Some(output_dir) = &args.output_dir {
        if let Err(e) = write_artifacts(output_dir, &result, &transcript, &board) {
            error!("Failed to write artifacts: {:#}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    }

    match outcome {
        Outcome::Pass => {
            info!("Echoed {} byte(s), {} transmitted", echoed, transcript.len());
            ExitCode::from(EXIT_PASS)
        }
        Outcome::Failed(message) => {
            error!("Run failed after {} byte(s): {}", echoed, message);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn write_artifacts(
    output_dir: &Path,
    result: &RunResult,
    transcript: &[u8],
    board: &SimBoard,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output dir {:?}", output_dir))?;

    let uart_path = output_dir.join("uart.log");
    std::fs::write(&uart_path, transcript)
        .with_context(|| format!("Failed to write {:?}", uart_path))?;

    let result_path = output_dir.join("result.json");
    let json = serde_json::to_string_pretty(result).context("Failed to encode result")?;
    std::fs::write(&result_path, json)
        .with_context(|| format!("Failed to write {:?}", result_path))?;

    let trace_path = output_dir.join("trace.json");
    let json =
        serde_json::to_string_pretty(&board.snapshot()).context("Failed to encode trace")?;
    std::fs::write(&trace_path, json)
        .with_context(|| format!("Failed to write {:?}", trace_path))?;

    info!("Artifacts written to {:?}", output_dir);
    Ok(())
}

fn divisor(args: DivisorArgs) -> ExitCode {
    let divisor = match BaudDivisor::compute(args.clock, args.baud) {
        Ok(divisor) => divisor,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let actual = divisor.actual_baud(args.clock);
    let error_pct = (f64::from(actual) - f64::from(args.baud)) * 100.0 / f64::from(args.baud);
    if error_pct.abs() > 3.0 {
        warn!(
            "{} baud is off target by {:+.2}%, most receivers will not sync",
            actual, error_pct
        );
    }

    println!("IBRD={}", divisor.integer);
    println!("FBRD={}", divisor.fractional);
    println!("actual_baud={} ({:+.2}%)", actual, error_pct);
    ExitCode::from(EXIT_PASS)
}
