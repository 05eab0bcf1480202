// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;

/// Models an address range with nothing behind it: every word reads the same
/// value and writes vanish.
#[derive(Debug, serde::Serialize)]
pub struct StubPeripheral {
    pub value: u32,
}

impl StubPeripheral {
    pub fn new(value: u32) -> Self {
        Self { value }
    }
}

impl crate::Peripheral for StubPeripheral {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let byte_offset = (offset % 4) as u32;
        Ok(((self.value >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        tracing::trace!("Stub: ignoring write {:#04x} at +{:#x}", value, offset);
        Ok(())
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_stub_ignores_writes() {
        let mut stub = StubPeripheral::new(0xDEAD_BEEF);
        stub.write(0, 0x11).unwrap();
        assert_eq!(stub.read(0).unwrap(), 0xEF);
        assert_eq!(stub.read(7).unwrap(), 0xDE);
    }
}
