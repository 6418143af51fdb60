//! On-page layout of B+Tree nodes.
//!
//! Every tree page starts with a 24-byte header:
//!
//! ```text
//! | page_type (u32) | lsn (u32) | size (i32) | max_size (i32) |
//! | parent_page_id (i32) | page_id (i32) |
//! ```
//!
//! Leaf pages continue with `next_page_id (i32)` and then `size` packed
//! (key, RecordId) pairs; internal pages go straight into `size` packed
//! (key, PageId) pairs, where slot 0's key is an unused sentinel. Keys are
//! fixed-width blobs whose width is a runtime parameter of the views.
//! All fields are little-endian and tightly packed.

use std::cmp::Ordering;

use crate::buffer::BufferPoolManager;
use crate::common::{Lsn, PageId, RecordId, Result, SlotId, PAGE_SIZE};

use super::key_comparator::KeyComparator;

const PAGE_TYPE_OFFSET: usize = 0;
const LSN_OFFSET: usize = 4;
const SIZE_OFFSET: usize = 8;
const MAX_SIZE_OFFSET: usize = 12;
const PARENT_PAGE_ID_OFFSET: usize = 16;
const PAGE_ID_OFFSET: usize = 20;

/// Shared header size
pub const BTREE_PAGE_HEADER_SIZE: usize = 24;

const NEXT_PAGE_ID_OFFSET: usize = 24;

/// Leaf pairs start after the next-pointer slot
pub const LEAF_HEADER_SIZE: usize = 28;
/// Internal pairs start right after the shared header
pub const INTERNAL_HEADER_SIZE: usize = BTREE_PAGE_HEADER_SIZE;

/// RecordId: page_id (i32) + slot_id (u32)
pub const LEAF_VALUE_SIZE: usize = 8;
/// Child PageId
pub const INTERNAL_VALUE_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BTreePageType {
    Invalid = 0,
    Leaf = 1,
    Internal = 2,
}

impl From<u32> for BTreePageType {
    fn from(value: u32) -> Self {
        match value {
            1 => BTreePageType::Leaf,
            2 => BTreePageType::Internal,
            _ => BTreePageType::Invalid,
        }
    }
}

fn get_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_i32(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn put_i32(data: &mut [u8], offset: usize, value: i32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Sets the parent pointer of a page of either kind through the buffer
/// pool, marking it dirty. Used when entries migrate between internal
/// nodes and their children must be adopted.
pub(crate) fn reparent(
    bpm: &BufferPoolManager,
    child_id: PageId,
    parent_id: PageId,
) -> Result<()> {
    let frame = bpm.fetch_page(child_id)?;
    {
        let mut data = frame.write_data();
        BTreePageMut::new(&mut data[..]).set_parent_page_id(parent_id);
    }
    bpm.unpin_page(child_id, true);
    Ok(())
}

/// Read-only view of the header shared by leaf and internal pages.
pub struct BTreePage<'a> {
    data: &'a [u8],
}

impl<'a> BTreePage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_type(&self) -> BTreePageType {
        get_u32(self.data, PAGE_TYPE_OFFSET).into()
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type() == BTreePageType::Leaf
    }

    pub fn is_root(&self) -> bool {
        !self.parent_page_id().is_valid()
    }

    pub fn lsn(&self) -> Lsn {
        get_u32(self.data, LSN_OFFSET)
    }

    pub fn size(&self) -> usize {
        get_i32(self.data, SIZE_OFFSET) as usize
    }

    pub fn max_size(&self) -> usize {
        get_i32(self.data, MAX_SIZE_OFFSET) as usize
    }

    /// Minimum legal occupancy. The root is exempt from the halves rule:
    /// a root leaf may hold a single entry, a root internal node needs two
    /// children to be worth keeping.
    pub fn min_size(&self) -> usize {
        if self.is_root() {
            if self.is_leaf() {
                1
            } else {
                2
            }
        } else {
            self.max_size() / 2
        }
    }

    pub fn parent_page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, PARENT_PAGE_ID_OFFSET))
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, PAGE_ID_OFFSET))
    }
}

/// Mutable view of the shared header, for mutations that do not care
/// whether the page is a leaf or an internal node.
pub struct BTreePageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> BTreePageMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn is_leaf(&self) -> bool {
        BTreePageType::from(get_u32(self.data, PAGE_TYPE_OFFSET)) == BTreePageType::Leaf
    }

    pub fn size(&self) -> usize {
        get_i32(self.data, SIZE_OFFSET) as usize
    }

    pub fn parent_page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, PARENT_PAGE_ID_OFFSET))
    }

    pub fn set_parent_page_id(&mut self, parent_id: PageId) {
        put_i32(self.data, PARENT_PAGE_ID_OFFSET, parent_id.as_i32());
    }

    pub fn set_lsn(&mut self, lsn: Lsn) {
        put_u32(self.data, LSN_OFFSET, lsn);
    }
}

/// Mutable view over a leaf page. Pairs are (key, RecordId), all slots
/// live, keys strictly ascending.
pub struct LeafPage<'a> {
    data: &'a mut [u8],
    key_size: usize,
}

impl<'a> LeafPage<'a> {
    pub fn new(data: &'a mut [u8], key_size: usize) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data, key_size }
    }

    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        put_u32(self.data, PAGE_TYPE_OFFSET, BTreePageType::Leaf as u32);
        put_u32(self.data, LSN_OFFSET, 0);
        put_i32(self.data, SIZE_OFFSET, 0);
        put_i32(self.data, MAX_SIZE_OFFSET, max_size as i32);
        put_i32(self.data, PARENT_PAGE_ID_OFFSET, parent_id.as_i32());
        put_i32(self.data, PAGE_ID_OFFSET, page_id.as_i32());
        put_i32(self.data, NEXT_PAGE_ID_OFFSET, -1);
    }

    fn pair_size(&self) -> usize {
        self.key_size + LEAF_VALUE_SIZE
    }

    fn entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_SIZE + index * self.pair_size()
    }

    pub fn size(&self) -> usize {
        get_i32(self.data, SIZE_OFFSET) as usize
    }

    fn set_size(&mut self, size: usize) {
        put_i32(self.data, SIZE_OFFSET, size as i32);
    }

    pub fn max_size(&self) -> usize {
        get_i32(self.data, MAX_SIZE_OFFSET) as usize
    }

    pub fn min_size(&self) -> usize {
        if !self.parent_page_id().is_valid() {
            1
        } else {
            self.max_size() / 2
        }
    }

    pub fn parent_page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, PARENT_PAGE_ID_OFFSET))
    }

    pub fn set_parent_page_id(&mut self, parent_id: PageId) {
        put_i32(self.data, PARENT_PAGE_ID_OFFSET, parent_id.as_i32());
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, PAGE_ID_OFFSET))
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, NEXT_PAGE_ID_OFFSET))
    }

    pub fn set_next_page_id(&mut self, next: PageId) {
        put_i32(self.data, NEXT_PAGE_ID_OFFSET, next.as_i32());
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.size());
        let offset = self.entry_offset(index);
        &self.data[offset..offset + self.key_size]
    }

    fn set_key_at(&mut self, index: usize, key: &[u8]) {
        assert_eq!(key.len(), self.key_size);
        let offset = self.entry_offset(index);
        self.data[offset..offset + self.key_size].copy_from_slice(key);
    }

    pub fn value_at(&self, index: usize) -> RecordId {
        debug_assert!(index < self.size());
        let offset = self.entry_offset(index) + self.key_size;
        RecordId::new(
            PageId::new(get_i32(self.data, offset)),
            SlotId::new(get_u32(self.data, offset + 4)),
        )
    }

    fn set_value_at(&mut self, index: usize, value: RecordId) {
        let offset = self.entry_offset(index) + self.key_size;
        put_i32(self.data, offset, value.page_id.as_i32());
        put_u32(self.data, offset + 4, value.slot_id.as_u32());
    }

    /// First index whose key is >= the given key, in [0, size].
    pub fn key_index(&self, key: &[u8], comparator: &dyn KeyComparator) -> usize {
        let mut lo = 0;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if comparator.compare(self.key_at(mid), key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn lookup(&self, key: &[u8], comparator: &dyn KeyComparator) -> Option<RecordId> {
        let index = self.key_index(key, comparator);
        if index < self.size() && comparator.compare(self.key_at(index), key) == Ordering::Equal {
            Some(self.value_at(index))
        } else {
            None
        }
    }

    /// Inserts a pair, keeping keys sorted. The key must not already be
    /// present; overflow detection (size reaching max_size) is the
    /// caller's job. Returns the new size.
    pub fn insert(
        &mut self,
        key: &[u8],
        value: RecordId,
        comparator: &dyn KeyComparator,
    ) -> usize {
        let index = self.key_index(key, comparator);
        let size = self.size();
        let (src, dst) = (self.entry_offset(index), self.entry_offset(index + 1));
        let end = self.entry_offset(size);
        self.data.copy_within(src..end, dst);
        self.set_key_at(index, key);
        self.set_value_at(index, value);
        self.set_size(size + 1);
        size + 1
    }

    /// Removes the pair with the given key if present, closing the gap.
    /// Returns the size after deletion.
    pub fn remove_and_delete_record(
        &mut self,
        key: &[u8],
        comparator: &dyn KeyComparator,
    ) -> usize {
        let index = self.key_index(key, comparator);
        let size = self.size();
        if index < size && comparator.compare(self.key_at(index), key) == Ordering::Equal {
            let (src, dst) = (self.entry_offset(index + 1), self.entry_offset(index));
            let end = self.entry_offset(size);
            self.data.copy_within(src..end, dst);
            self.set_size(size - 1);
            size - 1
        } else {
            size
        }
    }

    /// Moves the upper half of the entries (from max_size/2) to the tail of
    /// the (empty) recipient. The caller splices the leaf chain afterwards.
    pub fn move_half_to(&mut self, recipient: &mut LeafPage) {
        let start = self.max_size() / 2;
        let size = self.size();
        self.move_range_to(recipient, start, size);
        self.set_size(start);
    }

    /// Appends every entry to the recipient and adopts this page's next
    /// pointer there. This page becomes empty.
    pub fn move_all_to(&mut self, recipient: &mut LeafPage) {
        let size = self.size();
        self.move_range_to(recipient, 0, size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    /// Moves the first entry to the end of the recipient (borrow from the
    /// right sibling).
    pub fn move_first_to_end_of(&mut self, recipient: &mut LeafPage) {
        let size = self.size();
        self.move_range_to(recipient, 0, 1);
        let (src, dst) = (self.entry_offset(1), self.entry_offset(0));
        let end = self.entry_offset(size);
        self.data.copy_within(src..end, dst);
        self.set_size(size - 1);
    }

    /// Moves the last entry to the front of the recipient (borrow from the
    /// left sibling).
    pub fn move_last_to_front_of(&mut self, recipient: &mut LeafPage) {
        let last = self.size() - 1;
        let pair = self.pair_size();

        let rsize = recipient.size();
        let (r0, r1) = (recipient.entry_offset(0), recipient.entry_offset(1));
        let rend = recipient.entry_offset(rsize);
        recipient.data.copy_within(r0..rend, r1);

        let src = self.entry_offset(last);
        recipient.data[r0..r0 + pair].copy_from_slice(&self.data[src..src + pair]);
        recipient.set_size(rsize + 1);
        self.set_size(last);
    }

    fn move_range_to(&self, recipient: &mut LeafPage, start: usize, end: usize) {
        let count = end - start;
        let len = count * self.pair_size();
        let src = self.entry_offset(start);
        let dst = recipient.entry_offset(recipient.size());
        recipient.data[dst..dst + len].copy_from_slice(&self.data[src..src + len]);
        let new_size = recipient.size() + count;
        recipient.set_size(new_size);
    }
}

/// Read-only view over a leaf page.
pub struct LeafPageRef<'a> {
    data: &'a [u8],
    key_size: usize,
}

impl<'a> LeafPageRef<'a> {
    pub fn new(data: &'a [u8], key_size: usize) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data, key_size }
    }

    fn entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_SIZE + index * (self.key_size + LEAF_VALUE_SIZE)
    }

    pub fn size(&self) -> usize {
        get_i32(self.data, SIZE_OFFSET) as usize
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, NEXT_PAGE_ID_OFFSET))
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.size());
        let offset = self.entry_offset(index);
        &self.data[offset..offset + self.key_size]
    }

    pub fn value_at(&self, index: usize) -> RecordId {
        debug_assert!(index < self.size());
        let offset = self.entry_offset(index) + self.key_size;
        RecordId::new(
            PageId::new(get_i32(self.data, offset)),
            SlotId::new(get_u32(self.data, offset + 4)),
        )
    }

    pub fn key_index(&self, key: &[u8], comparator: &dyn KeyComparator) -> usize {
        let mut lo = 0;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if comparator.compare(self.key_at(mid), key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn lookup(&self, key: &[u8], comparator: &dyn KeyComparator) -> Option<RecordId> {
        let index = self.key_index(key, comparator);
        if index < self.size() && comparator.compare(self.key_at(index), key) == Ordering::Equal {
            Some(self.value_at(index))
        } else {
            None
        }
    }
}

/// Mutable view over an internal page. Pairs are (key, child PageId);
/// slot 0's key is a sentinel, never compared; keys from slot 1 strictly
/// ascending. `size` counts the sentinel slot.
pub struct InternalPage<'a> {
    data: &'a mut [u8],
    key_size: usize,
}

impl<'a> InternalPage<'a> {
    pub fn new(data: &'a mut [u8], key_size: usize) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data, key_size }
    }

    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        put_u32(self.data, PAGE_TYPE_OFFSET, BTreePageType::Internal as u32);
        put_u32(self.data, LSN_OFFSET, 0);
        put_i32(self.data, SIZE_OFFSET, 0);
        put_i32(self.data, MAX_SIZE_OFFSET, max_size as i32);
        put_i32(self.data, PARENT_PAGE_ID_OFFSET, parent_id.as_i32());
        put_i32(self.data, PAGE_ID_OFFSET, page_id.as_i32());
    }

    fn pair_size(&self) -> usize {
        self.key_size + INTERNAL_VALUE_SIZE
    }

    fn entry_offset(&self, index: usize) -> usize {
        INTERNAL_HEADER_SIZE + index * self.pair_size()
    }

    pub fn size(&self) -> usize {
        get_i32(self.data, SIZE_OFFSET) as usize
    }

    fn set_size(&mut self, size: usize) {
        put_i32(self.data, SIZE_OFFSET, size as i32);
    }

    pub fn max_size(&self) -> usize {
        get_i32(self.data, MAX_SIZE_OFFSET) as usize
    }

    pub fn min_size(&self) -> usize {
        if !self.parent_page_id().is_valid() {
            2
        } else {
            self.max_size() / 2
        }
    }

    pub fn parent_page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, PARENT_PAGE_ID_OFFSET))
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(get_i32(self.data, PAGE_ID_OFFSET))
    }

    /// Valid for index >= 1; slot 0's key is meaningful only while a merge
    /// is staging the parent separator there.
    pub fn key_at(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.size());
        let offset = self.entry_offset(index);
        &self.data[offset..offset + self.key_size]
    }

    pub fn set_key_at(&mut self, index: usize, key: &[u8]) {
        assert_eq!(key.len(), self.key_size);
        let offset = self.entry_offset(index);
        self.data[offset..offset + self.key_size].copy_from_slice(key);
    }

    pub fn value_at(&self, index: usize) -> PageId {
        debug_assert!(index < self.size());
        PageId::new(get_i32(self.data, self.entry_offset(index) + self.key_size))
    }

    fn set_value_at(&mut self, index: usize, value: PageId) {
        let offset = self.entry_offset(index) + self.key_size;
        put_i32(self.data, offset, value.as_i32());
    }

    /// Index of the slot holding the given child, if any. Slot 0's value is
    /// live even though its key is not.
    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == value)
    }

    /// Child covering the given key: the greatest i in [1, size) with
    /// key_at(i) <= key selects value_at(i); keys below key_at(1) fall
    /// through to value_at(0).
    pub fn lookup(&self, key: &[u8], comparator: &dyn KeyComparator) -> PageId {
        let mut left: isize = 1;
        let mut right: isize = self.size() as isize - 1;
        while left <= right {
            let mid = left + (right - left) / 2;
            if comparator.compare(self.key_at(mid as usize), key) == Ordering::Greater {
                right = mid - 1;
            } else {
                left = mid + 1;
            }
        }
        self.value_at((left - 1) as usize)
    }

    /// Turns an empty page into a root holding two children separated by
    /// new_key. Only called when the old root splits.
    pub fn populate_new_root(&mut self, old_child: PageId, new_key: &[u8], new_child: PageId) {
        self.set_size(2);
        self.set_value_at(0, old_child);
        self.set_key_at(1, new_key);
        self.set_value_at(1, new_child);
    }

    /// Inserts (new_key, new_value) immediately after the slot holding
    /// old_value. Returns the new size.
    pub fn insert_node_after(
        &mut self,
        old_value: PageId,
        new_key: &[u8],
        new_value: PageId,
    ) -> Result<usize> {
        let index = self.value_index(old_value).ok_or_else(|| {
            crate::common::StrataError::IndexCorrupted(format!(
                "child {} missing from parent {}",
                old_value,
                self.page_id()
            ))
        })? + 1;

        let size = self.size();
        let (src, dst) = (self.entry_offset(index), self.entry_offset(index + 1));
        let end = self.entry_offset(size);
        self.data.copy_within(src..end, dst);
        self.set_key_at(index, new_key);
        self.set_value_at(index, new_value);
        self.set_size(size + 1);
        Ok(size + 1)
    }

    /// Shift-left removal of the slot at index.
    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        let (src, dst) = (self.entry_offset(index + 1), self.entry_offset(index));
        let end = self.entry_offset(size);
        self.data.copy_within(src..end, dst);
        self.set_size(size - 1);
    }

    /// Drops to size 0 and returns the only child. Only called from root
    /// adjustment.
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        let child = self.value_at(0);
        self.set_size(0);
        child
    }

    /// Moves the upper half of the entries (from max_size/2) to the (empty)
    /// recipient and adopts the moved children. The first moved pair lands
    /// in the recipient's sentinel slot; its key is the separator the
    /// caller pushes into the parent.
    pub fn move_half_to(
        &mut self,
        recipient: &mut InternalPage,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        let start = self.max_size() / 2;
        let size = self.size();
        let moved = self.move_range_to(recipient, start, size, bpm)?;
        debug_assert_eq!(moved, size - start);
        self.set_size(start);
        Ok(())
    }

    /// Sets the sentinel key to the parent separator, then appends every
    /// entry to the recipient, adopting the moved children. This page
    /// becomes empty.
    pub fn move_all_to(
        &mut self,
        recipient: &mut InternalPage,
        middle_key: &[u8],
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        self.set_key_at(0, middle_key);
        let size = self.size();
        self.move_range_to(recipient, 0, size, bpm)?;
        self.set_size(0);
        Ok(())
    }

    /// Appends (middle_key, first child) to the recipient and shifts this
    /// page left (borrow from the right sibling).
    pub fn move_first_to_end_of(
        &mut self,
        recipient: &mut InternalPage,
        middle_key: &[u8],
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        let child = self.value_at(0);
        let rsize = recipient.size();
        recipient.set_size(rsize + 1);
        recipient.set_key_at(rsize, middle_key);
        recipient.set_value_at(rsize, child);
        reparent(bpm, child, recipient.page_id())?;
        self.remove(0);
        Ok(())
    }

    /// Prepends the last (key, child) pair to the recipient (borrow from
    /// the left sibling). The recipient's old sentinel slot receives
    /// middle_key so that every key above slot 0 stays valid; the borrowed
    /// key lands in the new sentinel slot, where the caller reads it to
    /// rewrite the parent separator.
    pub fn move_last_to_front_of(
        &mut self,
        recipient: &mut InternalPage,
        middle_key: &[u8],
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        let last = self.size() - 1;
        let child = self.value_at(last);

        recipient.set_key_at(0, middle_key);
        let rsize = recipient.size();
        let (r0, r1) = (recipient.entry_offset(0), recipient.entry_offset(1));
        let rend = recipient.entry_offset(rsize);
        recipient.data.copy_within(r0..rend, r1);
        recipient.set_size(rsize + 1);
        recipient.set_key_at(0, self.key_at(last));
        recipient.set_value_at(0, child);

        reparent(bpm, child, recipient.page_id())?;
        self.set_size(last);
        Ok(())
    }

    fn move_range_to(
        &self,
        recipient: &mut InternalPage,
        start: usize,
        end: usize,
        bpm: &BufferPoolManager,
    ) -> Result<usize> {
        let count = end - start;
        let len = count * self.pair_size();
        let src = self.entry_offset(start);
        let rsize = recipient.size();
        let dst = recipient.entry_offset(rsize);
        recipient.data[dst..dst + len].copy_from_slice(&self.data[src..src + len]);
        recipient.set_size(rsize + count);

        let new_parent = recipient.page_id();
        for i in rsize..rsize + count {
            reparent(bpm, recipient.value_at(i), new_parent)?;
        }
        Ok(count)
    }
}

/// Read-only view over an internal page, used during traversal.
pub struct InternalPageRef<'a> {
    data: &'a [u8],
    key_size: usize,
}

impl<'a> InternalPageRef<'a> {
    pub fn new(data: &'a [u8], key_size: usize) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data, key_size }
    }

    fn entry_offset(&self, index: usize) -> usize {
        INTERNAL_HEADER_SIZE + index * (self.key_size + INTERNAL_VALUE_SIZE)
    }

    pub fn size(&self) -> usize {
        get_i32(self.data, SIZE_OFFSET) as usize
    }

    pub fn key_at(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.size());
        let offset = self.entry_offset(index);
        &self.data[offset..offset + self.key_size]
    }

    pub fn value_at(&self, index: usize) -> PageId {
        debug_assert!(index < self.size());
        PageId::new(get_i32(self.data, self.entry_offset(index) + self.key_size))
    }

    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == value)
    }

    pub fn lookup(&self, key: &[u8], comparator: &dyn KeyComparator) -> PageId {
        let mut left: isize = 1;
        let mut right: isize = self.size() as isize - 1;
        while left <= right {
            let mid = left + (right - left) / 2;
            if comparator.compare(self.key_at(mid as usize), key) == Ordering::Greater {
                right = mid - 1;
            } else {
                left = mid + 1;
            }
        }
        self.value_at((left - 1) as usize)
    }
}
