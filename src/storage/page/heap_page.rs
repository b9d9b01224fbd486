//! Heap page format: an occupancy bitmap followed by fixed-width slots.
//!
//! Slot `s` is marked used by bit `s % 8` of bitmap byte `s / 8`. The slot
//! count is the largest number of records (one bit plus `tuple_bytes` bytes
//! each) that fit in the page; trailing bytes are unused padding. The bytes
//! of an unmarked slot are undefined.

use crate::error::{Error, Result};

/// Slot geometry for one (page size, tuple width) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub page_size: usize,
    pub tuple_bytes: usize,
    pub slot_count: usize,
    pub bitmap_bytes: usize,
}

impl PageLayout {
    pub fn for_tuple(page_size: usize, tuple_bytes: usize) -> Self {
        debug_assert!(tuple_bytes > 0 && tuple_bytes <= page_size);
        // Each record costs its own bytes plus one bitmap bit.
        let slot_count = (page_size * 8) / (tuple_bytes * 8 + 1);
        let bitmap_bytes = slot_count.div_ceil(8);
        debug_assert!(bitmap_bytes + slot_count * tuple_bytes <= page_size);
        Self {
            page_size,
            tuple_bytes,
            slot_count,
            bitmap_bytes,
        }
    }

    fn slot_offset(&self, slot: u16) -> usize {
        self.bitmap_bytes + slot as usize * self.tuple_bytes
    }

    fn check_slot(&self, slot: u16) -> Result<()> {
        if (slot as usize) < self.slot_count {
            Ok(())
        } else {
            Err(Error::InvalidSlot {
                slot,
                slot_count: self.slot_count,
            })
        }
    }

    fn slot_in_use(&self, data: &[u8], slot: u16) -> bool {
        data[slot as usize / 8] & (1 << (slot % 8)) != 0
    }
}

/// Read-only view of a heap page's bytes.
pub struct HeapPage<'a> {
    data: &'a [u8],
    layout: PageLayout,
}

impl<'a> HeapPage<'a> {
    pub fn new(data: &'a [u8], layout: PageLayout) -> Self {
        debug_assert_eq!(data.len(), layout.page_size);
        Self { data, layout }
    }

    pub fn slot_in_use(&self, slot: u16) -> bool {
        (slot as usize) < self.layout.slot_count && self.layout.slot_in_use(self.data, slot)
    }

    /// Raw bytes of a slot. Only meaningful when the slot is marked used.
    pub fn slot_data(&self, slot: u16) -> Result<&'a [u8]> {
        self.layout.check_slot(slot)?;
        let offset = self.layout.slot_offset(slot);
        Ok(&self.data[offset..offset + self.layout.tuple_bytes])
    }

    pub fn used_slots(&self) -> usize {
        (0..self.layout.slot_count as u16)
            .filter(|&s| self.slot_in_use(s))
            .count()
    }

    pub fn free_slots(&self) -> usize {
        self.layout.slot_count - self.used_slots()
    }
}

/// Mutable view of a heap page's bytes.
pub struct HeapPageMut<'a> {
    data: &'a mut [u8],
    layout: PageLayout,
}

impl<'a> HeapPageMut<'a> {
    pub fn new(data: &'a mut [u8], layout: PageLayout) -> Self {
        debug_assert_eq!(data.len(), layout.page_size);
        Self { data, layout }
    }

    pub fn slot_in_use(&self, slot: u16) -> bool {
        (slot as usize) < self.layout.slot_count && self.layout.slot_in_use(self.data, slot)
    }

    pub fn first_free_slot(&self) -> Option<u16> {
        (0..self.layout.slot_count as u16).find(|&s| !self.slot_in_use(s))
    }

    /// Writes a record into a slot and marks it used.
    pub fn write_slot(&mut self, slot: u16, record: &[u8]) -> Result<()> {
        self.layout.check_slot(slot)?;
        debug_assert_eq!(record.len(), self.layout.tuple_bytes);
        let offset = self.layout.slot_offset(slot);
        self.data[offset..offset + record.len()].copy_from_slice(record);
        self.data[slot as usize / 8] |= 1 << (slot % 8);
        Ok(())
    }

    /// Writes a record into the first free slot, if any.
    pub fn insert(&mut self, record: &[u8]) -> Result<Option<u16>> {
        match self.first_free_slot() {
            Some(slot) => {
                self.write_slot(slot, record)?;
                Ok(Some(slot))
            }
            None => Ok(None),
        }
    }

    /// Clears a slot's occupancy bit. The record bytes are left behind;
    /// they become undefined.
    pub fn clear_slot(&mut self, slot: u16) -> Result<()> {
        self.layout.check_slot(slot)?;
        self.data[slot as usize / 8] &= !(1 << (slot % 8));
        Ok(())
    }
}
