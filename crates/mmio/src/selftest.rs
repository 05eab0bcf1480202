// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Write/readback self-test for a four-slot register window.
//!
//! The pre-test content of all four slots is read first. Then each slot, in
//! ascending offset order, receives a pattern that differs from its current
//! content and from every other slot's pattern, and is read back immediately.
//! Two slots wired together are caught in either direction: a slot whose
//! content changed before its own write was disturbed by an earlier write, and
//! a final pass re-reads every slot to catch a later write landing on an
//! earlier slot.
//!
//! The test is destructive: register contents are not restored. On broken
//! hardware (a hung bus) the register accesses themselves may never complete,
//! in which case neither does the self-test.

use crate::register::{RegisterWindow, Slot, SLOT_COUNT};
use core::fmt;

/// Patterns written by default, one per slot.
pub const DEFAULT_PATTERNS: [u32; SLOT_COUNT] = [0x11, 0x22, 0x33, 0x44];

/// XOR mask that derives a slot's alternate pattern from its primary one.
///
/// Only the low byte is flipped so the alternates stay readable on 8-bit
/// wide peripherals, where upper bits are discarded.
pub const ALTERNATE_MASK: u32 = 0xFF;

/// Outcome of a self-test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        matches!(self, Verdict::Success)
    }

    /// Short form used on the console.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Success => "PASS",
            Verdict::Failure => "FAIL",
        }
    }

    pub fn into_result(self) -> Result<(), SelfTestFailed> {
        match self {
            Verdict::Success => Ok(()),
            Verdict::Failure => Err(SelfTestFailed),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error form of [`Verdict::Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestFailed;

impl fmt::Display for SelfTestFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("register self-test failed: readback mismatch")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternError {
    /// Two candidate patterns (primary or alternate) are equal.
    Collision { first: Slot, second: Slot, value: u32 },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::Collision {
                first,
                second,
                value,
            } => write!(
                f,
                "test pattern {:#010x} is shared by {} and {}",
                value, first, second
            ),
        }
    }
}

/// Per-slot test patterns.
///
/// Every slot has a primary pattern and an alternate (`primary ^ 0xFF`) that
/// is used when the slot already holds the primary value. All eight values are
/// pairwise distinct, so whichever one a slot ends up with, no two slots ever
/// receive the same bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSet {
    primary: [u32; SLOT_COUNT],
}

impl Default for PatternSet {
    fn default() -> Self {
        PatternSet {
            primary: DEFAULT_PATTERNS,
        }
    }
}

impl PatternSet {
    pub fn new(primary: [u32; SLOT_COUNT]) -> Result<Self, PatternError> {
        let mut candidates = [(Slot::Slot0, 0u32); SLOT_COUNT * 2];
        for slot in Slot::ALL {
            let value = primary[slot.index()];
            candidates[slot.index() * 2] = (slot, value);
            candidates[slot.index() * 2 + 1] = (slot, value ^ ALTERNATE_MASK);
        }

        for (i, &(first, a)) in candidates.iter().enumerate() {
            for &(second, b) in &candidates[i + 1..] {
                if a == b {
                    return Err(PatternError::Collision {
                        first,
                        second,
                        value: a,
                    });
                }
            }
        }

        Ok(PatternSet { primary })
    }

    pub fn primary(&self, slot: Slot) -> u32 {
        self.primary[slot.index()]
    }

    pub fn alternate(&self, slot: Slot) -> u32 {
        self.primary(slot) ^ ALTERNATE_MASK
    }

    /// Picks the pattern for `slot` given the value it holds before the test.
    pub fn select(&self, slot: Slot, current: u32) -> u32 {
        let primary = self.primary(slot);
        if current == primary {
            self.alternate(slot)
        } else {
            primary
        }
    }
}

/// Whether to stop at the first failing slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    FailFast,
    /// Test every slot regardless of earlier failures.
    Exhaustive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotOutcome {
    /// Skipped because an earlier slot already failed.
    #[default]
    Untested,
    Passed {
        pattern: u32,
    },
    /// Immediate readback differed from the written pattern.
    Mismatch {
        expected: u32,
        observed: u32,
    },
    /// Readback was correct, but a later write to another slot changed it.
    Clobbered {
        expected: u32,
        observed: u32,
    },
    /// Content changed from its pre-test value before the slot was written,
    /// so a write to an earlier slot landed here.
    Disturbed {
        expected: u32,
        observed: u32,
    },
}

impl SlotOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SlotOutcome::Mismatch { .. }
                | SlotOutcome::Clobbered { .. }
                | SlotOutcome::Disturbed { .. }
        )
    }

    /// The pattern that was written to the slot, if the outcome records one.
    pub fn written(&self) -> Option<u32> {
        match *self {
            SlotOutcome::Untested | SlotOutcome::Disturbed { .. } => None,
            SlotOutcome::Passed { pattern } => Some(pattern),
            SlotOutcome::Mismatch { expected, .. } | SlotOutcome::Clobbered { expected, .. } => {
                Some(expected)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelfTestReport {
    outcomes: [SlotOutcome; SLOT_COUNT],
}

impl SelfTestReport {
    pub fn verdict(&self) -> Verdict {
        let all_passed = self
            .outcomes
            .iter()
            .all(|o| matches!(o, SlotOutcome::Passed { .. }));
        if all_passed {
            Verdict::Success
        } else {
            Verdict::Failure
        }
    }

    pub fn outcome(&self, slot: Slot) -> SlotOutcome {
        self.outcomes[slot.index()]
    }

    /// Outcomes in ascending slot order.
    pub fn outcomes(&self) -> impl Iterator<Item = (Slot, SlotOutcome)> + '_ {
        Slot::ALL.into_iter().map(move |slot| (slot, self.outcome(slot)))
    }

    pub fn first_failure(&self) -> Option<(Slot, SlotOutcome)> {
        self.outcomes().find(|(_, o)| o.is_failure())
    }

    /// Pattern written to `slot`, if it was reached.
    pub fn written(&self, slot: Slot) -> Option<u32> {
        self.outcome(slot).written()
    }

    fn record(&mut self, slot: Slot, outcome: SlotOutcome) {
        self.outcomes[slot.index()] = outcome;
    }

    /// Records a failure unless the slot already failed for an earlier reason.
    fn record_failure(&mut self, slot: Slot, outcome: SlotOutcome) {
        if !self.outcome(slot).is_failure() {
            self.record(slot, outcome);
        }
    }
}

/// Configured self-test run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfTest {
    patterns: PatternSet,
    mode: Mode,
}

impl SelfTest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(mut self, patterns: PatternSet) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn run<W: RegisterWindow + ?Sized>(&self, window: &mut W) -> SelfTestReport {
        let mut report = SelfTestReport::default();
        let fail_fast = self.mode == Mode::FailFast;

        let pre_test = Slot::ALL.map(|slot| window.read_register(slot));

        for slot in Slot::ALL {
            let before = window.read_register(slot);
            let expected = pre_test[slot.index()];
            if before != expected {
                report.record_failure(
                    slot,
                    SlotOutcome::Disturbed {
                        expected,
                        observed: before,
                    },
                );
                if fail_fast {
                    return report;
                }
            }

            let pattern = self.patterns.select(slot, before);
            window.write_register(slot, pattern);
            let observed = window.read_register(slot);

            if observed != pattern {
                report.record_failure(
                    slot,
                    SlotOutcome::Mismatch {
                        expected: pattern,
                        observed,
                    },
                );
                if fail_fast {
                    return report;
                }
            } else if !report.outcome(slot).is_failure() {
                report.record(slot, SlotOutcome::Passed { pattern });
            }
        }

        for slot in Slot::ALL {
            let SlotOutcome::Passed { pattern } = report.outcome(slot) else {
                continue;
            };
            let observed = window.read_register(slot);
            if observed != pattern {
                report.record(
                    slot,
                    SlotOutcome::Clobbered {
                        expected: pattern,
                        observed,
                    },
                );
                if fail_fast {
                    return report;
                }
            }
        }

        report
    }
}

/// Runs the default fail-fast self-test and returns only the verdict.
pub fn self_test<W: RegisterWindow + ?Sized>(window: &mut W) -> Verdict {
    SelfTest::new().run(window).verdict()
}
