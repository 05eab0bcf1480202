// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use regprobe_config::{BoardDescriptor, ExpectedVerdict, ProbeAssertion, ProbeMode, ProbeScript};
use regprobe_core::bus::SystemBus;
use regprobe_core::probe::{announce, overall_verdict, probe_board, ProbeOutcome};
use regprobe_core::SimulationError;
use regprobe_mmio::{puts, Mode, PatternSet, SelfTest, Verdict};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

/// Name and console of the built-in board used when no descriptor is given.
const DEFAULT_BOARD_NAME: &str = "default";
const DEFAULT_CONSOLE: &str = "uart0";
const DEFAULT_TARGET: &str = "exit_dec";

const HELLO_MESSAGE: &str = "Hello RISC-V";

fn parse_pattern(s: &str) -> Result<u32, String> {
    regprobe_config::parse_u32(s).map_err(|e| format!("{:#}", e))
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "RegProbe register self-test runner",
    long_about = None
)]
struct Cli {
    /// Enable debug logging, including every register access
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Self-test register peripherals on a simulated board.
    Selftest(SelftestArgs),

    /// Deterministic, CI-friendly runner mode driven by a probe script (YAML).
    Test(TestArgs),

    /// Print the bring-up greeting on the board console.
    Hello(HelloArgs),
}

#[derive(Parser, Debug)]
struct SelftestArgs {
    /// Path to the board descriptor (YAML); the built-in board when omitted
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Peripheral id to test (repeatable); every register file when omitted
    #[arg(long = "target")]
    targets: Vec<String>,

    /// Test every slot instead of stopping at the first failure
    #[arg(long)]
    exhaustive: bool,

    /// Four comma-separated primary patterns, e.g. 0x11,0x22,0x33,0x44
    #[arg(long, value_delimiter = ',', value_parser = parse_pattern)]
    patterns: Vec<u32>,

    /// Print outcomes as JSON (disables UART stdout echo)
    #[arg(long)]
    json: bool,

    /// Disable UART stdout echo
    #[arg(long)]
    no_uart_stdout: bool,

    /// Write the board's register state (JSON) after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the probe script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Override the board descriptor named by the script
    #[arg(short, long)]
    board: Option<PathBuf>,

    /// Disable UART stdout echo (still captured for assertions/artifacts)
    #[arg(long)]
    no_uart_stdout: bool,

    /// Directory to write test artifacts (result.json, uart.log)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct HelloArgs {
    /// Path to the board descriptor (YAML); the built-in board when omitted
    #[arg(short, long)]
    board: Option<PathBuf>,
}

/// A board ready to probe.
struct LoadedBoard {
    name: String,
    console: Option<String>,
    register_files: Vec<String>,
    hash: Option<String>,
    bus: SystemBus,
}

impl LoadedBoard {
    fn pick_targets(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            self.register_files.clone()
        } else {
            requested.to_vec()
        }
    }
}

fn load_board(path: Option<&Path>) -> anyhow::Result<LoadedBoard> {
    let Some(path) = path else {
        info!("Using default hardware configuration");
        return Ok(LoadedBoard {
            name: DEFAULT_BOARD_NAME.to_string(),
            console: Some(DEFAULT_CONSOLE.to_string()),
            register_files: vec![DEFAULT_TARGET.to_string()],
            hash: None,
            bus: SystemBus::new(),
        });
    };

    info!("Loading board descriptor: {:?}", path);
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read board descriptor {:?}", path))?;
    let yaml = std::str::from_utf8(&bytes)
        .with_context(|| format!("Board descriptor {:?} is not UTF-8", path))?;
    let board = BoardDescriptor::from_yaml(yaml)
        .with_context(|| format!("Invalid board descriptor {:?}", path))?;
    let bus = SystemBus::from_config(&board)?;

    Ok(LoadedBoard {
        register_files: board.register_files().map(String::from).collect(),
        console: board.console.clone(),
        name: board.name,
        hash: Some(sha256_hex(&bytes)),
        bus,
    })
}

fn build_self_test(patterns: Option<[u32; 4]>, mode: Mode) -> anyhow::Result<SelfTest> {
    let test = SelfTest::new().with_mode(mode);
    match patterns {
        Some(p) => {
            let set = PatternSet::new(p).map_err(|e| anyhow::anyhow!("{}", e))?;
            Ok(test.with_patterns(set))
        }
        None => Ok(test),
    }
}

/// Exit code for a target that could not be tested. Targets the board does
/// not describe, or describes with an unusable window, are configuration
/// mistakes.
fn target_error_exit_code(e: &SimulationError) -> u8 {
    match e {
        SimulationError::UnknownPeripheral(_)
        | SimulationError::MisalignedWindow(_)
        | SimulationError::WindowTooSmall { .. }
        | SimulationError::NotAUart(_)
        | SimulationError::InvalidConfig(_) => EXIT_CONFIG_ERROR,
        SimulationError::MemoryViolation(_) => EXIT_RUNTIME_ERROR,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only verdicts and UART output.
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
        Commands::Selftest(args) => run_selftest(args),
        Commands::Test(args) => run_test(args),
        Commands::Hello(args) => run_hello(args),
    }
}

#[derive(Debug, Serialize)]
struct SelftestSummary<'a> {
    board: &'a str,
    verdict: &'static str,
    peripherals: &'a [ProbeOutcome],
}

fn run_selftest(args: SelftestArgs) -> ExitCode {
    let patterns = match args.patterns.as_slice() {
        [] => None,
        [a, b, c, d] => Some([*a, *b, *c, *d]),
        other => {
            error!("--patterns takes exactly 4 values, got {}", other.len());
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let mode = if args.exhaustive {
        Mode::Exhaustive
    } else {
        Mode::FailFast
    };
    let test = match build_self_test(patterns, mode) {
        Ok(t) => t,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut board = match load_board(args.board.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    board
        .bus
        .attach_uart_tx_sink(uart_tx, !(args.no_uart_stdout || args.json));

    let targets = board.pick_targets(&args.targets);
    if targets.is_empty() {
        error!("Board '{}' has no register files to test", board.name);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let outcomes = match probe_board(&mut board.bus, &targets, &test) {
        Ok(o) => o,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(target_error_exit_code(&e));
        }
    };
    let verdict = overall_verdict(&outcomes);

    if let Some(console) = &board.console {
        match board.bus.console(console) {
            Ok(mut uart) => announce(&mut uart, &outcomes),
            Err(e) => error!("{}", e),
        }
    }

    if args.json {
        let summary = SelftestSummary {
            board: &board.name,
            verdict: verdict.as_str(),
            peripherals: &outcomes,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{}", s),
            Err(e) => error!("Failed to serialize outcomes: {}", e),
        }
    } else {
        for outcome in &outcomes {
            println!(
                "{} @ {:#010x}: {}",
                outcome.peripheral,
                outcome.base,
                outcome.verdict()
            );
            if let Some((slot, detail)) = outcome.report.first_failure() {
                println!("  first failure at {}: {:?}", slot, detail);
            }
        }
    }

    if let Some(path) = &args.snapshot {
        if let Err(e) = write_json(path, &board.bus.snapshot(&board.name)) {
            error!("Failed to write snapshot {:?}: {:#}", path, e);
        }
    }

    match verdict {
        Verdict::Success => ExitCode::from(EXIT_PASS),
        Verdict::Failure => ExitCode::from(EXIT_ASSERT_FAIL),
    }
}

#[derive(Debug, Serialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    board: String,
    board_hash: String,
    mode: ProbeMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<&'static str>,
    peripherals: Vec<ProbeOutcome>,
    assertions: Vec<AssertionResult>,
    config: TestConfig,
}

#[derive(Debug, Serialize, Clone)]
struct AssertionResult {
    assertion: ProbeAssertion,
    passed: bool,
}

#[derive(Debug, Serialize, Clone)]
struct TestConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    board: Option<PathBuf>,
    script: PathBuf,
}

impl TestResult {
    fn error(args: &TestArgs, board: Option<PathBuf>, message: String) -> Self {
        Self {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            status: "error".to_string(),
            message: Some(message),
            board: String::new(),
            board_hash: String::new(),
            mode: ProbeMode::default(),
            verdict: None,
            peripherals: Vec::new(),
            assertions: Vec::new(),
            config: TestConfig {
                board,
                script: args.script.clone(),
            },
        }
    }
}

fn run_test(args: TestArgs) -> ExitCode {
    let script = match ProbeScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_outputs(&args, &TestResult::error(&args, args.board.clone(), msg), &[]);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let board_path = args
        .board
        .clone()
        .unwrap_or_else(|| script.board_path(&args.script));

    let mode = match script.mode {
        ProbeMode::FailFast => Mode::FailFast,
        ProbeMode::Exhaustive => Mode::Exhaustive,
    };
    let loaded = build_self_test(script.patterns, mode)
        .and_then(|test| Ok((test, load_board(Some(board_path.as_path()))?)));
    let (test, mut board) = match loaded {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_outputs(&args, &TestResult::error(&args, Some(board_path), msg), &[]);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let uart_tx = Arc::new(Mutex::new(Vec::new()));
    board
        .bus
        .attach_uart_tx_sink(uart_tx.clone(), !args.no_uart_stdout);

    let targets = board.pick_targets(&script.targets);
    let board_hash = board.hash.clone().unwrap_or_default();

    let probed = if targets.is_empty() {
        Err((
            format!("Board '{}' has no register files to test", board.name),
            EXIT_CONFIG_ERROR,
        ))
    } else {
        probe_board(&mut board.bus, &targets, &test)
            .map_err(|e| (e.to_string(), target_error_exit_code(&e)))
    };
    let outcomes = match probed {
        Ok(o) => o,
        Err((msg, code)) => {
            error!("{}", msg);
            let mut result = TestResult::error(&args, Some(board_path), msg);
            result.board = board.name.clone();
            result.board_hash = board_hash;
            result.mode = script.mode;
            write_outputs(&args, &result, &uart_bytes(&uart_tx));
            return ExitCode::from(code);
        }
    };

    if let Some(console) = &board.console {
        match board.bus.console(console) {
            Ok(mut uart) => announce(&mut uart, &outcomes),
            Err(e) => error!("{}", e),
        }
    }

    let uart = uart_bytes(&uart_tx);
    let uart_text = String::from_utf8_lossy(&uart);

    let assertions: Vec<AssertionResult> = script
        .assertions
        .iter()
        .map(|assertion| {
            let passed = match assertion {
                ProbeAssertion::ExpectedVerdict(a) => {
                    let expected = &a.expected_verdict;
                    match outcomes.iter().find(|o| o.peripheral == expected.target) {
                        Some(o) => o.passed == (expected.verdict == ExpectedVerdict::Pass),
                        None => {
                            error!("Assertion target '{}' was not probed", expected.target);
                            false
                        }
                    }
                }
                ProbeAssertion::UartContains(a) => uart_text.contains(&a.uart_contains),
            };
            if !passed {
                error!("Assertion failed: {:?}", assertion);
            }
            AssertionResult {
                assertion: assertion.clone(),
                passed,
            }
        })
        .collect();

    let all_passed = assertions.iter().all(|a| a.passed);
    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: if all_passed { "pass" } else { "fail" }.to_string(),
        message: None,
        board: board.name.clone(),
        board_hash,
        mode: script.mode,
        verdict: Some(overall_verdict(&outcomes).as_str()),
        peripherals: outcomes,
        assertions,
        config: TestConfig {
            board: Some(board_path),
            script: args.script.clone(),
        },
    };
    write_outputs(&args, &result, &uart);

    if all_passed {
        info!("All {} assertion(s) passed", result.assertions.len());
        ExitCode::from(EXIT_PASS)
    } else {
        ExitCode::from(EXIT_ASSERT_FAIL)
    }
}

fn run_hello(args: HelloArgs) -> ExitCode {
    let mut board = match load_board(args.board.as_deref()) {
        Ok(b) => b,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let Some(console) = board.console.clone() else {
        error!("Board '{}' declares no console UART", board.name);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    };

    match board.bus.console(&console) {
        Ok(mut uart) => {
            puts(&mut uart, HELLO_MESSAGE);
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn uart_bytes(uart_tx: &Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
    uart_tx.lock().map(|g| g.clone()).unwrap_or_default()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let f = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

fn write_outputs(args: &TestArgs, result: &TestResult, uart: &[u8]) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    if let Err(e) = write_json(&output_dir.join("result.json"), result) {
        error!("Failed to write result.json: {:#}", e);
    }

    if let Err(e) = std::fs::write(output_dir.join("uart.log"), uart) {
        error!("Failed to write uart.log: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern() {
        assert_eq!(parse_pattern("0x44").unwrap(), 0x44);
        assert_eq!(parse_pattern("17").unwrap(), 17);
        assert!(parse_pattern("0xZZ").is_err());
    }

    #[test]
    fn test_build_self_test_rejects_colliding_patterns() {
        assert!(build_self_test(Some([1, 1, 2, 3]), Mode::FailFast).is_err());
        let test = build_self_test(Some([1, 2, 3, 4]), Mode::Exhaustive).unwrap();
        assert_eq!(test.mode(), Mode::Exhaustive);
    }

    #[test]
    fn test_target_error_exit_codes() {
        let missing = SimulationError::UnknownPeripheral("missing".into());
        assert_eq!(target_error_exit_code(&missing), EXIT_CONFIG_ERROR);
        let narrow = SimulationError::WindowTooSmall {
            base: 0x1000_0000,
            mapped: 4,
        };
        assert_eq!(target_error_exit_code(&narrow), EXIT_CONFIG_ERROR);
        assert_eq!(
            target_error_exit_code(&SimulationError::MemoryViolation(0)),
            EXIT_RUNTIME_ERROR
        );
    }

    #[test]
    fn test_default_board_targets_exit_decoder() {
        let board = load_board(None).unwrap();
        assert_eq!(board.pick_targets(&[]), vec![DEFAULT_TARGET.to_string()]);
        assert_eq!(
            board.pick_targets(&["x".to_string()]),
            vec!["x".to_string()]
        );
    }
}
