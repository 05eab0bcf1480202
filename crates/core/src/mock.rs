// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! In-memory register windows for exercising code written against
//! [`RegisterWindow`] without a bus.

use crate::peripherals::fault::{FaultSet, SlotFault};
use regprobe_mmio::{RegisterWindow, Slot, SLOT_COUNT};
use std::cell::RefCell;

/// Plain read/write memory: every read returns the last value written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryWindow {
    slots: [u32; SLOT_COUNT],
}

impl MemoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(slots: [u32; SLOT_COUNT]) -> Self {
        Self { slots }
    }

    pub fn contents(&self) -> [u32; SLOT_COUNT] {
        self.slots
    }
}

impl RegisterWindow for MemoryWindow {
    fn read_register(&self, slot: Slot) -> u32 {
        self.slots[slot.index()]
    }

    fn write_register(&mut self, slot: Slot, value: u32) {
        self.slots[slot.index()] = value;
    }
}

/// Memory window with injected hardware faults.
#[derive(Debug, Clone, Default)]
pub struct FaultyWindow {
    memory: MemoryWindow,
    faults: FaultSet,
}

impl FaultyWindow {
    pub fn new(fault: SlotFault) -> Self {
        Self::with_faults([fault].into_iter().collect())
    }

    pub fn with_faults(faults: FaultSet) -> Self {
        Self {
            memory: MemoryWindow::new(),
            faults,
        }
    }

    pub fn with_contents(mut self, slots: [u32; SLOT_COUNT]) -> Self {
        self.memory = MemoryWindow::with_contents(slots);
        self
    }

    /// Stored words, ignoring read faults.
    pub fn memory(&self) -> &MemoryWindow {
        &self.memory
    }
}

impl RegisterWindow for FaultyWindow {
    fn read_register(&self, slot: Slot) -> u32 {
        self.faults.observe(slot, self.memory.read_register(slot))
    }

    fn write_register(&mut self, slot: Slot, value: u32) {
        let targets: Vec<Slot> = self.faults.write_targets(slot).collect();
        for dest in targets {
            self.memory.write_register(dest, value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read { slot: Slot, value: u32 },
    Write { slot: Slot, value: u32 },
}

/// Wraps another window and logs every access in order.
#[derive(Debug, Default)]
pub struct RecordingWindow<W> {
    inner: W,
    log: RefCell<Vec<Access>>,
}

impl<W: RegisterWindow> RecordingWindow<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    /// Slots written, in order.
    pub fn writes(&self) -> Vec<(Slot, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|a| match *a {
                Access::Write { slot, value } => Some((slot, value)),
                Access::Read { .. } => None,
            })
            .collect()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: RegisterWindow> RegisterWindow for RecordingWindow<W> {
    fn read_register(&self, slot: Slot) -> u32 {
        let value = self.inner.read_register(slot);
        self.log.borrow_mut().push(Access::Read { slot, value });
        value
    }

    fn write_register(&mut self, slot: Slot, value: u32) {
        self.log.borrow_mut().push(Access::Write { slot, value });
        self.inner.write_register(slot, value);
    }
}
