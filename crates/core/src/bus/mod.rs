// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod window;

pub use window::{BusUart, BusWindow};

use crate::memory::LinearMemory;
use crate::peripherals::fault::{FaultSet, SlotFault};
use crate::peripherals::register_file::{DataWidth, RegisterFile};
use crate::peripherals::stub::StubPeripheral;
use crate::peripherals::uart::Uart;
use crate::snapshot::BoardSnapshot;
use crate::{Peripheral, SimResult, SimulationError};
use anyhow::Context;
use regprobe_config::{parse_size, BoardDescriptor, PeripheralConfig, PeripheralKind};
use regprobe_mmio::WINDOW_SIZE;
use std::sync::{Arc, Mutex};

/// Default board: soft-core RAM.
pub const DEFAULT_RAM_BASE: u64 = 0x8000_0000;
pub const DEFAULT_RAM_SIZE: usize = 64 * 1024;
/// Default board: polled console UART.
pub const DEFAULT_UART_BASE: u64 = 0x1000_0000;
/// Default board: AXI exit decoder register file.
pub const DEFAULT_EXIT_DEC_BASE: u64 = 0x44A0_0000;

const DEFAULT_WINDOW: u64 = 0x1000;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }

    fn overlaps(&self, base: u64, size: u64) -> bool {
        base < self.base.saturating_add(self.size) && self.base < base.saturating_add(size)
    }
}

pub struct SystemBus {
    pub ram: Option<LinearMemory>,
    pub peripherals: Vec<PeripheralEntry>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    /// Bring-up board used when no descriptor is given: RAM, a console UART
    /// and one exit decoder register file.
    pub fn new() -> Self {
        Self {
            ram: Some(LinearMemory::new(DEFAULT_RAM_SIZE, DEFAULT_RAM_BASE)),
            peripherals: vec![
                PeripheralEntry {
                    name: "uart0".to_string(),
                    base: DEFAULT_UART_BASE,
                    size: 0x4,
                    dev: Box::new(Uart::new()),
                },
                PeripheralEntry {
                    name: "exit_dec".to_string(),
                    base: DEFAULT_EXIT_DEC_BASE,
                    size: 0x1_0000,
                    dev: Box::new(RegisterFile::new()),
                },
            ],
        }
    }

    /// A bus with nothing mapped.
    pub fn empty() -> Self {
        Self {
            ram: None,
            peripherals: Vec::new(),
        }
    }

    pub fn add_peripheral(
        &mut self,
        name: &str,
        base: u64,
        size: u64,
        dev: Box<dyn Peripheral>,
    ) -> SimResult<()> {
        if self.peripheral(name).is_some() {
            return Err(SimulationError::InvalidConfig(format!(
                "peripheral '{}' already mapped",
                name
            )));
        }
        if let Some(other) = self.peripherals.iter().find(|p| p.overlaps(base, size)) {
            return Err(SimulationError::InvalidConfig(format!(
                "'{}' at {:#x} overlaps '{}' at {:#x}",
                name, base, other.name, other.base
            )));
        }
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
        Ok(())
    }

    pub fn from_config(board: &BoardDescriptor) -> anyhow::Result<Self> {
        board.validate()?;

        let mut bus = Self::empty();
        if let Some(ram) = &board.ram {
            let size = parse_size(&ram.size)?;
            bus.ram = Some(LinearMemory::new(size as usize, ram.base));
        }

        for p_cfg in &board.peripherals {
            let dev = build_peripheral(p_cfg)
                .with_context(|| format!("Failed to build peripheral '{}'", p_cfg.id))?;
            let size = p_cfg.window_size()?.unwrap_or(DEFAULT_WINDOW);

            tracing::debug!(
                "Mapping {} ({:?}) at {:#x}..{:#x}",
                p_cfg.id,
                p_cfg.r#type,
                p_cfg.base_address,
                p_cfg.base_address + size
            );
            bus.add_peripheral(&p_cfg.id, p_cfg.base_address, size, dev)?;
        }

        Ok(bus)
    }

    /// Attach a UART TX capture sink to any UART peripherals on this bus.
    ///
    /// When `echo_stdout` is false, UART writes will no longer be printed to stdout.
    pub fn attach_uart_tx_sink(&mut self, sink: Arc<Mutex<Vec<u8>>>, echo_stdout: bool) {
        for p in &mut self.peripherals {
            let Some(any) = p.dev.as_any_mut() else {
                continue;
            };
            let Some(uart) = any.downcast_mut::<Uart>() else {
                continue;
            };
            uart.set_sink(Some(sink.clone()), echo_stdout);
        }
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    pub fn is_mapped(&self, addr: u64) -> bool {
        self.ram.as_ref().is_some_and(|ram| ram.contains(addr))
            || self.peripherals.iter().any(|p| p.contains(addr))
    }

    /// Borrows the 16-byte register window at `base`.
    pub fn window(&mut self, base: u64) -> SimResult<BusWindow<'_>> {
        if base % 4 != 0 {
            return Err(SimulationError::MisalignedWindow(base));
        }
        // Addresses past the end of the address space count as unmapped.
        let mapped = (0..WINDOW_SIZE as u64)
            .map_while(|i| base.checked_add(i))
            .take_while(|addr| self.is_mapped(*addr))
            .count() as u64;
        if mapped < WINDOW_SIZE as u64 {
            return Err(SimulationError::WindowTooSmall { base, mapped });
        }
        Ok(BusWindow::new(self, base))
    }

    /// Borrows the register window of the named peripheral.
    pub fn window_for(&mut self, name: &str) -> SimResult<BusWindow<'_>> {
        let base = self
            .peripheral(name)
            .map(|p| p.base)
            .ok_or_else(|| SimulationError::UnknownPeripheral(name.to_string()))?;
        self.window(base)
    }

    /// Borrows the named UART as a blocking byte sink.
    pub fn console(&mut self, name: &str) -> SimResult<BusUart<'_>> {
        let entry = self
            .peripheral(name)
            .ok_or_else(|| SimulationError::UnknownPeripheral(name.to_string()))?;
        let is_uart = entry
            .dev
            .as_any()
            .is_some_and(|any| any.downcast_ref::<Uart>().is_some());
        if !is_uart {
            return Err(SimulationError::NotAUart(name.to_string()));
        }
        let base = entry.base;
        Ok(BusUart::new(self, base))
    }

    pub fn snapshot(&self, board: &str) -> BoardSnapshot {
        BoardSnapshot::capture(board, self)
    }
}

fn build_peripheral(p_cfg: &PeripheralConfig) -> anyhow::Result<Box<dyn Peripheral>> {
    let dev: Box<dyn Peripheral> = match p_cfg.r#type {
        PeripheralKind::RegisterFile => {
            let width = match p_cfg.config_u64("width")? {
                Some(bits) => DataWidth::from_bits(bits)?,
                None => DataWidth::W32,
            };
            let faults = p_cfg
                .faults
                .iter()
                .map(SlotFault::try_from)
                .collect::<SimResult<FaultSet>>()?;
            if !faults.is_empty() {
                tracing::info!("Injecting {} fault(s) into {}", p_cfg.faults.len(), p_cfg.id);
            }
            Box::new(RegisterFile::with_width(width).with_faults(faults))
        }
        PeripheralKind::Uart => {
            let busy_polls = p_cfg.config_u64("busy_polls")?.unwrap_or(0);
            let busy_polls = u32::try_from(busy_polls)
                .map_err(|_| anyhow::anyhow!("busy_polls {} is too large", busy_polls))?;
            Box::new(Uart::with_busy_polls(busy_polls))
        }
        PeripheralKind::Stub => {
            let value = p_cfg.config_u64("value")?.unwrap_or(0);
            let value = u32::try_from(value)
                .map_err(|_| anyhow::anyhow!("stub value {:#x} does not fit in 32 bits", value))?;
            Box::new(StubPeripheral::new(value))
        }
    };
    Ok(dev)
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        if let Some(val) = self.ram.as_ref().and_then(|ram| ram.read_u8(addr)) {
            return Ok(val);
        }

        for p in &self.peripherals {
            if p.contains(addr) {
                return p.dev.read(addr - p.base);
            }
        }

        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if let Some(ram) = self.ram.as_mut() {
            if ram.write_u8(addr, value) {
                return Ok(());
            }
        }

        for p in &mut self.peripherals {
            if p.contains(addr) {
                return p.dev.write(addr - p.base, value);
            }
        }

        Err(SimulationError::MemoryViolation(addr))
    }
}
