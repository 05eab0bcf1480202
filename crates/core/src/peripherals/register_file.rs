// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::fault::{FaultSet, SlotFault};
use crate::{SimResult, SimulationError};
use regprobe_mmio::{Slot, SLOT_COUNT, WINDOW_SIZE};

/// Implemented data width of the register slots.
///
/// Narrow implementations keep only the low bytes of each 32-bit access:
/// writes to the upper byte lanes are discarded and those lanes read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataWidth {
    W8,
    W16,
    #[default]
    W32,
}

impl DataWidth {
    pub fn from_bits(bits: u64) -> SimResult<Self> {
        match bits {
            8 => Ok(Self::W8),
            16 => Ok(Self::W16),
            32 => Ok(Self::W32),
            other => Err(SimulationError::InvalidConfig(format!(
                "unsupported register width {}",
                other
            ))),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
        }
    }

    fn lanes(self) -> u64 {
        (self.bits() / 8) as u64
    }

    fn mask(self) -> u32 {
        match self {
            Self::W8 => 0xFF,
            Self::W16 => 0xFFFF,
            Self::W32 => 0xFFFF_FFFF,
        }
    }
}

/// Four-slot AXI register peripheral (the exit decoder slave).
///
/// Offsets 0, 4, 8 and 12 hold plain read/write words. Everything past the
/// fourth slot is reserved: reads return zero and writes are dropped.
#[derive(Debug, Default)]
pub struct RegisterFile {
    slots: [u32; SLOT_COUNT],
    width: DataWidth,
    faults: FaultSet,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_width(width: DataWidth) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }

    pub fn with_faults(mut self, faults: FaultSet) -> Self {
        self.faults = faults;
        self
    }

    pub fn inject(&mut self, fault: SlotFault) {
        self.faults.push(fault);
    }

    pub fn width(&self) -> DataWidth {
        self.width
    }

    /// Raw stored words, before any injected read fault.
    pub fn stored(&self) -> [u32; SLOT_COUNT] {
        self.slots
    }

    fn read_word(&self, slot: Slot) -> u32 {
        self.faults.observe(slot, self.slots[slot.index()]) & self.width.mask()
    }

    fn decode(offset: u64) -> Option<(Slot, u64)> {
        if offset >= WINDOW_SIZE as u64 {
            return None;
        }
        Slot::from_index((offset / 4) as usize).map(|slot| (slot, offset % 4))
    }
}

impl crate::Peripheral for RegisterFile {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let Some((slot, lane)) = Self::decode(offset) else {
            return Ok(0);
        };
        Ok(((self.read_word(slot) >> (lane * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let Some((slot, lane)) = Self::decode(offset) else {
            tracing::trace!("RegisterFile: dropping write to reserved offset {:#x}", offset);
            return Ok(());
        };
        if lane >= self.width.lanes() {
            return Ok(());
        }

        let shift = lane * 8;
        let targets: Vec<Slot> = self.faults.write_targets(slot).collect();
        for dest in targets {
            let word = &mut self.slots[dest.index()];
            *word = (*word & !(0xFF << shift)) | ((value as u32) << shift);
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "slots": self.slots,
            "width": self.width.bits(),
            "faults": self.faults.iter().map(|f| format!("{:?}", f)).collect::<Vec<_>>(),
        })
    }
}
