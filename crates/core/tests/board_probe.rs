// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use regprobe_config::BoardDescriptor;
use regprobe_core::bus::SystemBus;
use regprobe_core::probe::{announce, overall_verdict, probe_board, probe_peripheral, SlotStatus};
use regprobe_mmio::{Mode, SelfTest, Slot, SlotOutcome, Verdict};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

fn boards_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../configs/boards")
}

fn load_bus(file: &str) -> (BoardDescriptor, SystemBus, Arc<Mutex<Vec<u8>>>) {
    let board = BoardDescriptor::from_file(boards_dir().join(file)).unwrap();
    let mut bus = SystemBus::from_config(&board).unwrap();
    let sink = Arc::new(Mutex::new(Vec::new()));
    bus.attach_uart_tx_sink(sink.clone(), false);
    (board, bus, sink)
}

fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_arty_board_passes() -> anyhow::Result<()> {
    let board = BoardDescriptor::from_file(boards_dir().join("arty-cv32e40p.yaml"))?;
    let mut bus = SystemBus::from_config(&board)?;
    let ids: Vec<String> = board.register_files().map(String::from).collect();
    assert_eq!(ids, vec!["exit_dec"]);

    let outcomes = probe_board(&mut bus, &ids, &SelfTest::new())?;
    assert_eq!(overall_verdict(&outcomes), Verdict::Success);
    assert_eq!(outcomes[0].base, 0x44A0_0000);
    Ok(())
}

#[test]
fn test_faulty_board_outcomes() {
    let (_, mut bus, _) = load_bus("faulty-bringup.yaml");
    let test = SelfTest::new().with_mode(Mode::Exhaustive);
    let outcomes = probe_board(
        &mut bus,
        &targets(&["narrow_dec", "stuck_dec", "shorted_dec", "absent_dec"]),
        &test,
    )
    .unwrap();

    // 8-bit wide slaves still pass: every default pattern fits in a byte.
    assert!(outcomes[0].passed);

    let stuck = &outcomes[1];
    assert!(!stuck.passed);
    assert_eq!(stuck.slots[2].status, SlotStatus::Mismatch);
    assert_eq!(stuck.slots[2].observed, Some(0));
    assert_eq!(stuck.slots[3].status, SlotStatus::Passed);

    let shorted = &outcomes[2];
    assert_eq!(
        shorted.report.outcome(Slot::Slot0),
        SlotOutcome::Clobbered {
            expected: 0x11,
            observed: 0x22
        }
    );

    let absent = &outcomes[3];
    assert!(absent
        .slots
        .iter()
        .all(|s| s.status == SlotStatus::Mismatch && s.observed == Some(0xFFFF_FFFF)));

    assert_eq!(overall_verdict(&outcomes), Verdict::Failure);
}

#[test]
fn test_fail_fast_leaves_later_slots_untested() {
    let (_, mut bus, _) = load_bus("faulty-bringup.yaml");
    let outcome = probe_peripheral(&mut bus, "stuck_dec", &SelfTest::new()).unwrap();
    assert_eq!(outcome.verdict(), Verdict::Failure);
    assert_eq!(outcome.slots[3].status, SlotStatus::Untested);
}

#[test]
fn test_uart_cannot_be_probed() {
    let (_, mut bus, _) = load_bus("arty-cv32e40p.yaml");
    let err = probe_peripheral(&mut bus, "uart0", &SelfTest::new()).unwrap_err();
    assert!(err.to_string().contains("16"), "{}", err);
}

#[test]
fn test_announce_on_board_console() {
    let (board, mut bus, sink) = load_bus("faulty-bringup.yaml");
    let outcomes = probe_board(
        &mut bus,
        &targets(&["narrow_dec", "stuck_dec"]),
        &SelfTest::new(),
    )
    .unwrap();

    let console_id = board.console.as_deref().unwrap();
    let mut console = bus.console(console_id).unwrap();
    announce(&mut console, &outcomes);

    let text = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
    assert_eq!(text, "narrow_dec: PASS\n\rstuck_dec: FAIL\n\r");
}

#[test]
fn test_snapshot_after_probe() {
    let (board, mut bus, _) = load_bus("arty-cv32e40p.yaml");
    probe_board(&mut bus, &targets(&["exit_dec"]), &SelfTest::new()).unwrap();

    let snap = bus.snapshot(&board.name);
    assert_eq!(snap.board, "arty-cv32e40p");
    let slots = &snap.peripherals["exit_dec"].state["slots"];
    assert_eq!(slots[0], 0x11);
    assert_eq!(slots[3], 0x44);
}

#[test]
fn test_inline_descriptor_with_bad_fault_rejected() {
    let yaml = r#"
schema_version: "1.0"
name: "bad"
peripherals:
  - id: dec
    type: register_file
    base_address: 0x1000
    size: "16B"
    faults:
      - kind: alias
        slot: 2
        to: 2
"#;
    assert!(BoardDescriptor::from_yaml(yaml).is_err());
}
