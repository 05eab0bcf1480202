// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Register state of every peripheral on a board.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BoardSnapshot {
    pub board: String,
    pub peripherals: BTreeMap<String, PeripheralSnapshot>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PeripheralSnapshot {
    pub base: u64,
    pub size: u64,
    pub state: serde_json::Value,
}

impl BoardSnapshot {
    pub fn capture(board: &str, bus: &SystemBus) -> Self {
        let peripherals = bus
            .peripherals
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    PeripheralSnapshot {
                        base: p.base,
                        size: p.size,
                        state: p.dev.snapshot(),
                    },
                )
            })
            .collect();
        Self {
            board: board.to_string(),
            peripherals,
        }
    }
}
