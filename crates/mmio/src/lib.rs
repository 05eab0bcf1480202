// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register access and self-test for four-slot memory-mapped peripherals.
//!
//! The crate is `no_std` so the same code runs in bring-up firmware and in
//! host-side simulation. Hardware access goes through [`RegisterWindow`]; the
//! volatile implementation is [`MmioWindow`].

#![cfg_attr(not(test), no_std)]

pub mod console;
pub mod register;
pub mod selftest;

pub use console::{puts, report_verdict, ByteSink, PolledUart};
pub use register::{
    read_register, write_register, MmioWindow, RegisterWindow, Slot, SLOT_COUNT, WINDOW_SIZE,
};
pub use selftest::{
    self_test, Mode, PatternError, PatternSet, SelfTest, SelfTestFailed, SelfTestReport,
    SlotOutcome, Verdict,
};
