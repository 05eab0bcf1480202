// RegProbe - Peripheral Register Self-Test Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register access layer.
//!
//! The peripheral exposes four 32-bit slots at fixed byte offsets from its
//! base address. Nothing here assigns meaning to individual bits; every slot
//! is an opaque word.

use core::fmt;
use core::sync::atomic::{compiler_fence, Ordering};

/// Number of register slots in a peripheral window.
pub const SLOT_COUNT: usize = 4;

/// Size of the register window in bytes.
pub const WINDOW_SIZE: usize = SLOT_COUNT * 4;

/// One of the four 32-bit register slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Slot0,
    Slot1,
    Slot2,
    Slot3,
}

impl Slot {
    /// All slots in ascending offset order.
    pub const ALL: [Slot; SLOT_COUNT] = [Slot::Slot0, Slot::Slot1, Slot::Slot2, Slot::Slot3];

    /// Byte offset of the slot from the peripheral base.
    pub const fn offset(self) -> usize {
        self.index() * 4
    }

    pub const fn index(self) -> usize {
        match self {
            Slot::Slot0 => 0,
            Slot::Slot1 => 1,
            Slot::Slot2 => 2,
            Slot::Slot3 => 3,
        }
    }

    pub const fn from_index(index: usize) -> Option<Slot> {
        match index {
            0 => Some(Slot::Slot0),
            1 => Some(Slot::Slot1),
            2 => Some(Slot::Slot2),
            3 => Some(Slot::Slot3),
            _ => None,
        }
    }

    /// Maps a byte offset back to its slot. Only the four aligned offsets
    /// 0, 4, 8 and 12 are valid.
    pub const fn from_offset(offset: usize) -> Option<Slot> {
        if offset % 4 != 0 {
            return None;
        }
        Slot::from_index(offset / 4)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{} (+{:#04x})", self.index(), self.offset())
    }
}

/// Word-level access to a four-slot register window.
///
/// Implementations must issue every call to the backing device in program
/// order; a read is never served from a cached value.
pub trait RegisterWindow {
    fn read_register(&self, slot: Slot) -> u32;
    fn write_register(&mut self, slot: Slot, value: u32);
}

impl<W: RegisterWindow + ?Sized> RegisterWindow for &mut W {
    fn read_register(&self, slot: Slot) -> u32 {
        (**self).read_register(slot)
    }

    fn write_register(&mut self, slot: Slot, value: u32) {
        (**self).write_register(slot, value)
    }
}

/// A register window backed by real memory-mapped hardware.
///
/// The window does not own the peripheral. It is a borrowed view onto the
/// caller's address range; dropping it has no effect on the device.
#[derive(Debug)]
pub struct MmioWindow {
    base: *mut u32,
}

impl MmioWindow {
    /// Creates a window over the peripheral at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be 4-byte aligned and point to at least [`WINDOW_SIZE`]
    /// bytes of readable and writable device memory that stays mapped for the
    /// lifetime of the window. Caching must be disabled for the range. No other
    /// context may access the same peripheral while the window is in use.
    pub const unsafe fn new(base: usize) -> Self {
        MmioWindow {
            base: base as *mut u32,
        }
    }

    pub fn base(&self) -> usize {
        self.base as usize
    }

    fn slot_ptr(&self, slot: Slot) -> *mut u32 {
        // In bounds: the constructor guarantees WINDOW_SIZE bytes at base.
        unsafe { self.base.add(slot.index()) }
    }
}

impl RegisterWindow for MmioWindow {
    fn read_register(&self, slot: Slot) -> u32 {
        compiler_fence(Ordering::SeqCst);
        let value = unsafe { self.slot_ptr(slot).read_volatile() };
        compiler_fence(Ordering::SeqCst);
        value
    }

    fn write_register(&mut self, slot: Slot, value: u32) {
        compiler_fence(Ordering::SeqCst);
        unsafe { self.slot_ptr(slot).write_volatile(value) };
        compiler_fence(Ordering::SeqCst);
    }
}

/// Stores `value` in the register at `base + offset`.
///
/// # Safety
///
/// `base + offset` must be an aligned, mapped, writable 32-bit device
/// register. `offset` must be one of 0, 4, 8 or 12.
#[inline]
pub unsafe fn write_register(base: usize, offset: usize, value: u32) {
    debug_assert!(Slot::from_offset(offset).is_some(), "invalid slot offset");
    compiler_fence(Ordering::SeqCst);
    core::ptr::write_volatile((base + offset) as *mut u32, value);
    compiler_fence(Ordering::SeqCst);
}

/// Loads the register at `base + offset`.
///
/// # Safety
///
/// Same requirements as [`write_register`], with read access.
#[inline]
pub unsafe fn read_register(base: usize, offset: usize) -> u32 {
    debug_assert!(Slot::from_offset(offset).is_some(), "invalid slot offset");
    compiler_fence(Ordering::SeqCst);
    let value = core::ptr::read_volatile((base + offset) as *const u32);
    compiler_fence(Ordering::SeqCst);
    value
}
