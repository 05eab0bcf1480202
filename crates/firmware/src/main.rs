// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![no_std]
#![no_main]
#![allow(clippy::empty_loop)]

use panic_halt as _;
use regprobe_mmio::{puts, report_verdict, self_test, MmioWindow, PolledUart};
use riscv_rt::entry;

// Matches `SystemBus::new()` default `uart0` and `exit_dec` bases.
const UART_BASE: usize = 0x1000_0000;
const EXIT_DEC_BASE: usize = 0x44A0_0000;

#[entry]
fn main() -> ! {
    // SAFETY: both addresses are fixed by the FPGA design and this is the
    // only code that touches them.
    let mut uart = unsafe { PolledUart::new(UART_BASE) };
    let mut exit_dec = unsafe { MmioWindow::new(EXIT_DEC_BASE) };

    puts(&mut uart, "Hello RISC-V");

    // Broken hardware can hang here; there is no timeout on a bus access.
    let verdict = self_test(&mut exit_dec);
    report_verdict(&mut uart, verdict);

    loop {}
}
