// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Runs the register self-test against peripherals on a simulated bus.

use crate::bus::SystemBus;
use crate::SimResult;
use regprobe_mmio::{report_verdict, ByteSink, SelfTest, SelfTestReport, SlotOutcome, Verdict};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Passed,
    Mismatch,
    Clobbered,
    Disturbed,
    Untested,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub offset: usize,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<u32>,
}

impl SlotSummary {
    fn from_outcome(offset: usize, outcome: SlotOutcome) -> Self {
        let (status, observed) = match outcome {
            SlotOutcome::Passed { pattern } => (SlotStatus::Passed, Some(pattern)),
            SlotOutcome::Mismatch { observed, .. } => (SlotStatus::Mismatch, Some(observed)),
            SlotOutcome::Clobbered { observed, .. } => (SlotStatus::Clobbered, Some(observed)),
            SlotOutcome::Disturbed { observed, .. } => (SlotStatus::Disturbed, Some(observed)),
            SlotOutcome::Untested => (SlotStatus::Untested, None),
        };
        Self {
            offset,
            status,
            written: outcome.written(),
            observed,
        }
    }
}

/// Self-test result for one peripheral.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub peripheral: String,
    pub base: u64,
    pub passed: bool,
    pub slots: Vec<SlotSummary>,
    #[serde(skip)]
    pub report: SelfTestReport,
}

impl ProbeOutcome {
    pub fn new(peripheral: &str, base: u64, report: SelfTestReport) -> Self {
        Self {
            peripheral: peripheral.to_string(),
            base,
            passed: report.verdict().is_success(),
            slots: report
                .outcomes()
                .map(|(slot, o)| SlotSummary::from_outcome(slot.offset(), o))
                .collect(),
            report,
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.report.verdict()
    }
}

/// Self-tests the named peripheral.
pub fn probe_peripheral(bus: &mut SystemBus, name: &str, test: &SelfTest) -> SimResult<ProbeOutcome> {
    let mut window = bus.window_for(name)?;
    let base = window.base();
    tracing::debug!("Self-testing {} at {:#x} ({:?})", name, base, test.mode());

    let report = test.run(&mut window);
    match report.first_failure() {
        Some((slot, outcome)) => {
            tracing::warn!("{} @ {:#x}: FAIL at {}: {:?}", name, base, slot, outcome)
        }
        None => tracing::info!("{} @ {:#x}: PASS", name, base),
    }

    Ok(ProbeOutcome::new(name, base, report))
}

/// Self-tests every target in order. Stops at the first target that cannot
/// be probed at all (unknown or not fully mapped); a failing self-test does
/// not stop the run.
pub fn probe_board(
    bus: &mut SystemBus,
    targets: &[String],
    test: &SelfTest,
) -> SimResult<Vec<ProbeOutcome>> {
    targets
        .iter()
        .map(|name| probe_peripheral(bus, name, test))
        .collect()
}

/// Combined verdict: success only when every outcome passed.
pub fn overall_verdict(outcomes: &[ProbeOutcome]) -> Verdict {
    if outcomes.iter().all(|o| o.passed) {
        Verdict::Success
    } else {
        Verdict::Failure
    }
}

/// Prints `<peripheral>: PASS|FAIL` per outcome on the console.
pub fn announce<S: ByteSink + ?Sized>(console: &mut S, outcomes: &[ProbeOutcome]) {
    for outcome in outcomes {
        for b in outcome.peripheral.bytes().chain(*b": ") {
            console.write_byte(b);
        }
        report_verdict(console, outcome.verdict());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DEFAULT_EXIT_DEC_BASE;
    use crate::peripherals::fault::SlotFault;
    use crate::peripherals::register_file::RegisterFile;
    use regprobe_mmio::Slot;

    #[test]
    fn test_probe_default_board_passes() {
        let mut bus = SystemBus::new();
        let outcome = probe_peripheral(&mut bus, "exit_dec", &SelfTest::new()).unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.base, DEFAULT_EXIT_DEC_BASE);
        assert_eq!(
            outcome.slots.iter().map(|s| s.offset).collect::<Vec<_>>(),
            vec![0, 4, 8, 12]
        );
    }

    #[test]
    fn test_probe_board_reports_each_target() {
        let mut bus = SystemBus::empty();
        bus.add_peripheral("good", 0x1000, 0x10, Box::new(RegisterFile::new()))
            .unwrap();
        let mut bad = RegisterFile::new();
        bad.inject(SlotFault::IgnoreWrites { slot: Slot::Slot3 });
        bus.add_peripheral("bad", 0x2000, 0x10, Box::new(bad)).unwrap();

        let targets = vec!["good".to_string(), "bad".to_string()];
        let outcomes = probe_board(&mut bus, &targets, &SelfTest::new()).unwrap();

        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert_eq!(outcomes[1].slots[3].status, SlotStatus::Mismatch);
        assert_eq!(outcomes[1].slots[3].written, Some(0x44));
        assert_eq!(outcomes[1].slots[3].observed, Some(0));
        assert_eq!(overall_verdict(&outcomes), Verdict::Failure);
    }

    #[test]
    fn test_probe_unknown_target_is_error() {
        let mut bus = SystemBus::new();
        assert!(probe_peripheral(&mut bus, "missing", &SelfTest::new()).is_err());
    }

    #[test]
    fn test_outcome_serializes_statuses() {
        let mut bus = SystemBus::new();
        let outcome = probe_peripheral(&mut bus, "exit_dec", &SelfTest::new()).unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["passed"], true);
        assert_eq!(json["slots"][2]["status"], "passed");
        assert_eq!(json["slots"][2]["written"], 0x33);
        assert!(json.get("report").is_none());
    }
}
