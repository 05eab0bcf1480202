// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SimResult, SimulationError};
use regprobe_config::FaultConfig;
use regprobe_mmio::Slot;

/// A hardware defect affecting one register slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFault {
    StuckAt { slot: Slot, value: u32 },
    IgnoreWrites { slot: Slot },
    FlipBits { slot: Slot, mask: u32 },
    /// Writes to `slot` are also stored in `to`, as if the two were shorted.
    Alias { slot: Slot, to: Slot },
}

impl SlotFault {
    pub fn slot(&self) -> Slot {
        match *self {
            SlotFault::StuckAt { slot, .. }
            | SlotFault::IgnoreWrites { slot }
            | SlotFault::FlipBits { slot, .. }
            | SlotFault::Alias { slot, .. } => slot,
        }
    }

    fn observe(&self, slot: Slot, value: u32) -> u32 {
        match *self {
            SlotFault::StuckAt { slot: s, value: stuck } if s == slot => stuck,
            SlotFault::FlipBits { slot: s, mask } if s == slot => value ^ mask,
            _ => value,
        }
    }
}

fn slot_from_config(index: u8) -> SimResult<Slot> {
    Slot::from_index(index as usize)
        .ok_or_else(|| SimulationError::InvalidConfig(format!("slot {} out of range", index)))
}

impl TryFrom<&FaultConfig> for SlotFault {
    type Error = SimulationError;

    fn try_from(cfg: &FaultConfig) -> SimResult<Self> {
        Ok(match *cfg {
            FaultConfig::StuckAt { slot, value } => SlotFault::StuckAt {
                slot: slot_from_config(slot)?,
                value,
            },
            FaultConfig::IgnoreWrites { slot } => SlotFault::IgnoreWrites {
                slot: slot_from_config(slot)?,
            },
            FaultConfig::FlipBits { slot, mask } => SlotFault::FlipBits {
                slot: slot_from_config(slot)?,
                mask,
            },
            FaultConfig::Alias { slot, to } => SlotFault::Alias {
                slot: slot_from_config(slot)?,
                to: slot_from_config(to)?,
            },
        })
    }
}

/// Faults applied together to one register window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultSet {
    faults: Vec<SlotFault>,
}

impl FaultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fault: SlotFault) {
        self.faults.push(fault);
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotFault> {
        self.faults.iter()
    }

    /// Value a read of `slot` returns when the backing word holds `stored`.
    pub fn observe(&self, slot: Slot, stored: u32) -> u32 {
        self.faults
            .iter()
            .fold(stored, |value, fault| fault.observe(slot, value))
    }

    /// Slots whose storage a write to `slot` actually updates.
    pub fn write_targets(&self, slot: Slot) -> impl Iterator<Item = Slot> + '_ {
        let aliases = self.faults.iter().filter_map(move |f| match *f {
            SlotFault::Alias { slot: s, to } if s == slot => Some(to),
            _ => None,
        });
        std::iter::once(slot)
            .chain(aliases)
            .filter(move |dest| !self.drops_writes(*dest))
    }

    fn drops_writes(&self, slot: Slot) -> bool {
        self.faults
            .iter()
            .any(|f| matches!(*f, SlotFault::IgnoreWrites { slot: s } if s == slot))
    }
}

impl FromIterator<SlotFault> for FaultSet {
    fn from_iter<I: IntoIterator<Item = SlotFault>>(iter: I) -> Self {
        Self {
            faults: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_only_affects_faulty_slot() {
        let faults: FaultSet = [
            SlotFault::StuckAt {
                slot: Slot::Slot2,
                value: 0,
            },
            SlotFault::FlipBits {
                slot: Slot::Slot0,
                mask: 0x1,
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(faults.observe(Slot::Slot2, 0x33), 0);
        assert_eq!(faults.observe(Slot::Slot0, 0x10), 0x11);
        assert_eq!(faults.observe(Slot::Slot1, 0x22), 0x22);
    }

    #[test]
    fn test_write_targets_follow_alias_and_ignore() {
        let faults: FaultSet = [
            SlotFault::Alias {
                slot: Slot::Slot1,
                to: Slot::Slot0,
            },
            SlotFault::IgnoreWrites { slot: Slot::Slot3 },
        ]
        .into_iter()
        .collect();

        assert_eq!(
            faults.write_targets(Slot::Slot1).collect::<Vec<_>>(),
            vec![Slot::Slot1, Slot::Slot0]
        );
        assert_eq!(faults.write_targets(Slot::Slot3).count(), 0);
        assert_eq!(
            faults.write_targets(Slot::Slot2).collect::<Vec<_>>(),
            vec![Slot::Slot2]
        );
    }

    #[test]
    fn test_from_config() {
        let fault = SlotFault::try_from(&FaultConfig::Alias { slot: 1, to: 0 }).unwrap();
        assert_eq!(
            fault,
            SlotFault::Alias {
                slot: Slot::Slot1,
                to: Slot::Slot0
            }
        );
        assert!(SlotFault::try_from(&FaultConfig::IgnoreWrites { slot: 9 }).is_err());
    }
}
