// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use regprobe_config::{
    BoardDescriptor, ExpectedVerdict, FaultConfig, PeripheralKind, ProbeAssertion, ProbeMode,
    ProbeScript,
};
use std::path::PathBuf;

#[test]
fn test_minimal_board_parses() {
    let yaml = r#"
name: "bringup"
peripherals:
  - id: "exit_dec"
    type: "register_file"
    base_address: 0x44A00000
"#;
    let board = BoardDescriptor::from_yaml(yaml).unwrap();
    assert_eq!(board.schema_version, "1.0");
    assert_eq!(board.peripherals.len(), 1);
    assert_eq!(board.peripherals[0].r#type, PeripheralKind::RegisterFile);
    assert_eq!(board.peripherals[0].size, None);
    assert!(board.peripherals[0].faults.is_empty());
    assert!(board.console.is_none());
}

#[test]
fn test_full_board_parses() {
    let yaml = r#"
schema_version: "1.0"
name: "cv32e40p-arty"
ram:
  base: 0x80000000
  size: "64KiB"
console: uart0
peripherals:
  - id: uart0
    type: uart
    base_address: 0x10000000
    size: "4B"
    config:
      busy_polls: 3
  - id: exit_dec
    type: axi_exit_dec
    base_address: 0x44A00000
    size: "64KiB"
    config:
      width: 16
    faults:
      - kind: stuck_at
        slot: 2
        value: 0
      - kind: alias
        slot: 1
        to: 0
"#;
    let board = BoardDescriptor::from_yaml(yaml).unwrap();
    assert_eq!(board.console.as_deref(), Some("uart0"));

    let uart = board.peripheral("uart0").unwrap();
    assert_eq!(uart.config_u64("busy_polls").unwrap(), Some(3));

    let dec = board.peripheral("exit_dec").unwrap();
    assert_eq!(dec.r#type, PeripheralKind::RegisterFile);
    assert_eq!(dec.window_size().unwrap(), Some(64 * 1024));
    assert_eq!(dec.config_u64("width").unwrap(), Some(16));
    assert_eq!(
        dec.faults,
        vec![
            FaultConfig::StuckAt { slot: 2, value: 0 },
            FaultConfig::Alias { slot: 1, to: 0 },
        ]
    );

    assert_eq!(board.register_files().collect::<Vec<_>>(), vec!["exit_dec"]);
}

#[test]
fn test_console_must_be_uart() {
    let yaml = r#"
name: "bad-console"
console: exit_dec
peripherals:
  - id: exit_dec
    type: register_file
    base_address: 0x44A00000
"#;
    let err = BoardDescriptor::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("not a uart"));
}

#[test]
fn test_register_window_too_small() {
    let yaml = r#"
name: "tiny"
peripherals:
  - id: exit_dec
    type: register_file
    base_address: 0x44A00000
    size: "8B"
"#;
    let err = BoardDescriptor::from_yaml(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("at least 16"));
}

#[test]
fn test_unaligned_register_file_rejected() {
    let yaml = r#"
name: "unaligned"
peripherals:
  - id: exit_dec
    type: register_file
    base_address: 0x44A00002
"#;
    assert!(BoardDescriptor::from_yaml(yaml).is_err());
}

#[test]
fn test_bad_width_rejected() {
    let yaml = r#"
name: "odd-width"
peripherals:
  - id: exit_dec
    type: register_file
    base_address: 0x44A00000
    config:
      width: 12
"#;
    let err = BoardDescriptor::from_yaml(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("width"));
}

#[test]
fn test_duplicate_ids_rejected() {
    let yaml = r#"
name: "dupes"
peripherals:
  - id: a
    type: stub
    base_address: 0x1000
  - id: a
    type: stub
    base_address: 0x2000
"#;
    let err = BoardDescriptor::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn test_faults_only_on_register_files() {
    let yaml = r#"
name: "faulty-uart"
peripherals:
  - id: uart0
    type: uart
    base_address: 0x10000000
    faults:
      - kind: ignore_writes
        slot: 0
"#;
    assert!(BoardDescriptor::from_yaml(yaml).is_err());
}

#[test]
fn test_shipped_scripts_resolve_their_boards() -> anyhow::Result<()> {
    let scripts = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/scripts");

    let script_path = scripts.join("faulty-selftest.yaml");
    let script = ProbeScript::from_file(&script_path)?;
    assert_eq!(script.mode, ProbeMode::Exhaustive);
    assert!(script.targets.is_empty());
    assert!(matches!(
        &script.assertions[1],
        ProbeAssertion::ExpectedVerdict(a)
            if a.expected_verdict.target == "stuck_dec"
                && a.expected_verdict.verdict == ExpectedVerdict::Fail
    ));

    let board = BoardDescriptor::from_file(script.board_path(&script_path))?;
    assert_eq!(board.name, "faulty-bringup");
    assert_eq!(
        board.register_files().collect::<Vec<_>>(),
        vec!["narrow_dec", "stuck_dec", "shorted_dec"]
    );
    assert_eq!(board.peripheral("absent_dec").unwrap().r#type, PeripheralKind::Stub);
    Ok(())
}
