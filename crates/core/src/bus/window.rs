// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::SystemBus;
use crate::Bus;
use regprobe_mmio::console::UART_READY;
use regprobe_mmio::{ByteSink, RegisterWindow, Slot};

/// Register window onto a simulated bus.
///
/// Holds the bus mutably for its whole lifetime, which is the single-owner
/// rule real hardware relies on.
pub struct BusWindow<'a> {
    bus: &'a mut SystemBus,
    base: u64,
}

impl<'a> BusWindow<'a> {
    pub(super) fn new(bus: &'a mut SystemBus, base: u64) -> Self {
        Self { bus, base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    // `SystemBus::window` only hands out windows whose sixteen bytes are all
    // mapped, so this never wraps.
    fn addr(&self, slot: Slot) -> u64 {
        self.base.wrapping_add(slot.offset() as u64)
    }
}

impl RegisterWindow for BusWindow<'_> {
    fn read_register(&self, slot: Slot) -> u32 {
        let addr = self.addr(slot);
        match self.bus.read_u32(addr) {
            Ok(value) => {
                tracing::trace!("read  {:#010x} -> {:#010x}", addr, value);
                value
            }
            Err(e) => {
                // A faulting bus read has no value; model it as zero.
                tracing::error!("Bus fault reading {}: {}", slot, e);
                0
            }
        }
    }

    fn write_register(&mut self, slot: Slot, value: u32) {
        let addr = self.addr(slot);
        tracing::trace!("write {:#010x} <- {:#010x}", addr, value);
        if let Err(e) = self.bus.write_u32(addr, value) {
            tracing::error!("Bus fault writing {}: {}", slot, e);
        }
    }
}

/// Blocking byte sink over a simulated polled UART.
pub struct BusUart<'a> {
    bus: &'a mut SystemBus,
    base: u64,
}

impl<'a> BusUart<'a> {
    pub(super) fn new(bus: &'a mut SystemBus, base: u64) -> Self {
        Self { bus, base }
    }

    fn is_ready(&self) -> bool {
        matches!(self.bus.read_u8(self.base), Ok(UART_READY))
    }
}

impl ByteSink for BusUart<'_> {
    fn write_byte(&mut self, byte: u8) {
        while !self.is_ready() {
            std::hint::spin_loop();
        }
        if let Err(e) = self.bus.write_u8(self.base, byte) {
            tracing::error!("UART write at {:#x} failed: {}", self.base, e);
        }
    }
}
