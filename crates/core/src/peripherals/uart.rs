// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::cell::Cell;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

bitflags::bitflags! {
    /// Status byte returned by reads of the UART register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartStatus: u8 {
        const READY = regprobe_mmio::console::UART_READY;
    }
}

/// Single-register polled UART.
///
/// Reads return the status byte; writes transmit. After every transmitted
/// byte the device reports busy for `busy_polls` status reads.
#[derive(Debug, Default, serde::Serialize)]
pub struct Uart {
    #[serde(skip)]
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
    busy_polls: u32,
    #[serde(skip)]
    busy_remaining: Cell<u32>,
    transmitted: u64,
}

impl Uart {
    pub fn new() -> Self {
        Self {
            echo_stdout: true,
            ..Self::default()
        }
    }

    pub fn with_busy_polls(busy_polls: u32) -> Self {
        Self {
            busy_polls,
            ..Self::new()
        }
    }

    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }

    fn status(&self) -> UartStatus {
        let remaining = self.busy_remaining.get();
        if remaining > 0 {
            self.busy_remaining.set(remaining - 1);
            UartStatus::empty()
        } else {
            UartStatus::READY
        }
    }

    fn push_tx(&mut self, value: u8) {
        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.echo_stdout {
            #[allow(unused_must_use)]
            {
                print!("{}", value as char);
                io::stdout().flush();
            }
        }

        self.transmitted += 1;
        self.busy_remaining.set(self.busy_polls);
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }
}

impl crate::Peripheral for Uart {
    fn read(&self, offset: u64) -> SimResult<u8> {
        if offset == 0 {
            return Ok(self.status().bits());
        }
        Ok(0)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        if offset == 0 {
            self.push_tx(value);
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
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
