// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Byte-output console used to report bring-up results.

use crate::selftest::Verdict;
use core::fmt;

/// Status byte value the bring-up UART reports when it can take a byte.
pub const UART_READY: u8 = 1;

/// Blocking byte output.
pub trait ByteSink {
    /// Waits until the device is ready, then hands it `byte`.
    fn write_byte(&mut self, byte: u8);
}

impl<S: ByteSink + ?Sized> ByteSink for &mut S {
    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }
}

/// Status-polled UART with a single register.
///
/// Reading the register yields the status byte; writing it transmits. This
/// matches the simple soft-core UART used during bring-up.
#[derive(Debug)]
pub struct PolledUart {
    reg: *mut u8,
}

impl PolledUart {
    /// # Safety
    ///
    /// `addr` must be the mapped, uncached data/status register of the UART,
    /// and no other context may drive the UART while this handle exists.
    pub const unsafe fn new(addr: usize) -> Self {
        PolledUart {
            reg: addr as *mut u8,
        }
    }

    pub fn is_ready(&self) -> bool {
        unsafe { self.reg.read_volatile() == UART_READY }
    }
}

impl ByteSink for PolledUart {
    fn write_byte(&mut self, byte: u8) {
        while !self.is_ready() {
            core::hint::spin_loop();
        }
        unsafe { self.reg.write_volatile(byte) }
    }
}

impl fmt::Write for PolledUart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.write_byte(b);
        }
        Ok(())
    }
}

/// Writes `s` followed by the `\n\r` line ending the bring-up console expects.
pub fn puts<S: ByteSink + ?Sized>(sink: &mut S, s: &str) {
    for b in s.bytes() {
        sink.write_byte(b);
    }
    sink.write_byte(b'\n');
    sink.write_byte(b'\r');
}

/// Prints `PASS` or `FAIL` on its own line.
pub fn report_verdict<S: ByteSink + ?Sized>(sink: &mut S, verdict: Verdict) {
    puts(sink, verdict.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VecSink(Vec<u8>);

    impl ByteSink for VecSink {
        fn write_byte(&mut self, byte: u8) {
            self.0.push(byte);
        }
    }

    #[test]
    fn test_puts_appends_line_ending() {
        let mut sink = VecSink::default();
        puts(&mut sink, "Hello RISC-V");
        assert_eq!(sink.0, b"Hello RISC-V\n\r");
    }

    #[test]
    fn test_report_verdict() {
        let mut sink = VecSink::default();
        report_verdict(&mut sink, Verdict::Success);
        report_verdict(&mut sink, Verdict::Failure);
        assert_eq!(sink.0, b"PASS\n\rFAIL\n\r");
    }

    #[test]
    fn test_polled_uart_writes_when_ready() {
        // The status and data register share one byte; starting at "ready"
        // lets the first write through, after which the byte holds the data.
        let mut reg = UART_READY;
        let mut uart = unsafe { PolledUart::new(&mut reg as *mut u8 as usize) };
        assert!(uart.is_ready());
        uart.write_byte(b'X');
        drop(uart);
        assert_eq!(reg, b'X');
    }
}
