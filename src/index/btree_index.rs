use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPoolManager, Frame};
use crate::common::{
    PageId, RecordId, Result, SlotId, StrataError, Transaction, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::HeaderPage;

use super::btree_iterator::BTreeIterator;
use super::btree_page::{BTreePage, BTreePageMut, InternalPage, InternalPageRef, LeafPage, LeafPageRef};
use super::key_comparator::{decode_integer_key, encode_integer_key, KeyComparator};

/// A B+Tree index whose nodes live in buffer-pool frames.
///
/// Keys are fixed-width byte blobs ordered by the injected comparator; leaf
/// values are `RecordId`s. The tree persists its root page id in the header
/// page (page 0) under its index name, so it can be reopened later.
///
/// The tree is not internally latched: callers are expected to serialize
/// writers externally. Every page access follows the fetch/unpin protocol
/// of the buffer pool.
pub struct BPlusTree {
    index_name: String,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: Arc<dyn KeyComparator>,
    key_size: usize,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl BPlusTree {
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        key_size: usize,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        assert!(key_size > 0);
        assert!(leaf_max_size >= 2 && internal_max_size >= 3);
        Self {
            index_name: index_name.into(),
            root_page_id: INVALID_PAGE_ID,
            bpm,
            comparator,
            key_size,
            leaf_max_size,
            internal_max_size,
        }
    }

    /// Rebinds an index created earlier, reading its root page id from the
    /// header page.
    pub fn open(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        key_size: usize,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let index_name = index_name.into();

        let frame = bpm.fetch_page(HEADER_PAGE_ID)?;
        let root_page_id = {
            let mut data = frame.write_data();
            HeaderPage::new(&mut data[..]).get_root_id(&index_name)
        };
        bpm.unpin_page(HEADER_PAGE_ID, false);

        let root_page_id =
            root_page_id.ok_or_else(|| StrataError::IndexNotFound(index_name.clone()))?;

        Ok(Self {
            index_name,
            root_page_id,
            bpm,
            comparator,
            key_size,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /*****************************************************************
     * SEARCH
     *****************************************************************/

    /// Point lookup. Returns the record bound to the key, if any.
    pub fn get_value(&self, key: &[u8], _txn: &Transaction) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }

        let frame = self.find_leaf_page(key, false)?;
        let result = {
            let data = frame.read_data();
            LeafPageRef::new(&data[..], self.key_size).lookup(key, &*self.comparator)
        };
        self.bpm.unpin_page(frame.page_id(), false);
        Ok(result)
    }

    /*****************************************************************
     * INSERTION
     *****************************************************************/

    /// Inserts a key/record pair. Returns false when the key is already
    /// present (only unique keys are supported).
    pub fn insert(&mut self, key: &[u8], value: RecordId, txn: &Transaction) -> Result<bool> {
        assert_eq!(key.len(), self.key_size);
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }
        self.insert_into_leaf(key, value, txn)
    }

    fn start_new_tree(&mut self, key: &[u8], value: RecordId) -> Result<()> {
        let frame = self.bpm.new_page()?;
        let page_id = frame.page_id();

        {
            let mut data = frame.write_data();
            let mut root = LeafPage::new(&mut data[..], self.key_size);
            root.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
            root.insert(key, value, &*self.comparator);
        }

        self.root_page_id = page_id;
        self.update_root_page_id(true)?;
        self.bpm.unpin_page(page_id, true);

        debug!(root = page_id.as_i32(), "btree.start_new_tree");
        Ok(())
    }

    fn insert_into_leaf(&mut self, key: &[u8], value: RecordId, txn: &Transaction) -> Result<bool> {
        let leaf_frame = self.find_leaf_page(key, false)?;
        let leaf_id = leaf_frame.page_id();

        let (duplicate, new_size) = {
            let mut data = leaf_frame.write_data();
            let mut leaf = LeafPage::new(&mut data[..], self.key_size);
            if leaf.lookup(key, &*self.comparator).is_some() {
                (true, leaf.size())
            } else {
                (false, leaf.insert(key, value, &*self.comparator))
            }
        };

        if duplicate {
            self.bpm.unpin_page(leaf_id, false);
            return Ok(false);
        }

        if new_size >= self.leaf_max_size {
            let (separator, new_frame) = self.split_leaf(&leaf_frame)?;
            self.insert_into_parent(&leaf_frame, &separator, new_frame, txn)?;
        }

        self.bpm.unpin_page(leaf_id, true);
        Ok(true)
    }

    /// Splits a full leaf: the upper half of its entries move to a fresh
    /// page spliced after it in the leaf chain. Returns the separator key
    /// (the new leaf's first key) and the new leaf, still pinned.
    fn split_leaf(&mut self, frame: &Arc<Frame>) -> Result<(Vec<u8>, Arc<Frame>)> {
        let new_frame = self.bpm.new_page()?;
        let new_id = new_frame.page_id();

        let separator = {
            let mut old_data = frame.write_data();
            let mut new_data = new_frame.write_data();
            let mut old_leaf = LeafPage::new(&mut old_data[..], self.key_size);
            let mut new_leaf = LeafPage::new(&mut new_data[..], self.key_size);

            new_leaf.init(new_id, old_leaf.parent_page_id(), self.leaf_max_size);
            old_leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(old_leaf.next_page_id());
            old_leaf.set_next_page_id(new_id);

            new_leaf.key_at(0).to_vec()
        };

        debug!(
            old = frame.page_id().as_i32(),
            new = new_id.as_i32(),
            "btree.split_leaf"
        );
        Ok((separator, new_frame))
    }

    /// Splits an overflowing internal node; the moved children are adopted
    /// by the new node. Returns the separator key (sitting in the new
    /// node's sentinel slot) and the new node, still pinned.
    fn split_internal(&mut self, frame: &Arc<Frame>) -> Result<(Vec<u8>, Arc<Frame>)> {
        let new_frame = self.bpm.new_page()?;
        let new_id = new_frame.page_id();

        let separator = {
            let mut old_data = frame.write_data();
            let mut new_data = new_frame.write_data();
            let mut old_node = InternalPage::new(&mut old_data[..], self.key_size);
            let mut new_node = InternalPage::new(&mut new_data[..], self.key_size);

            new_node.init(new_id, old_node.parent_page_id(), self.internal_max_size);
            old_node.move_half_to(&mut new_node, &self.bpm)?;

            new_node.key_at(0).to_vec()
        };

        debug!(
            old = frame.page_id().as_i32(),
            new = new_id.as_i32(),
            "btree.split_internal"
        );
        Ok((separator, new_frame))
    }

    /// Hooks a freshly split-off node into the parent of the node it came
    /// from, growing a new root when the old node was the root, splitting
    /// the parent recursively when it overflows. Consumes the new node's
    /// pin; the caller keeps (and later releases) the old node's pin.
    fn insert_into_parent(
        &mut self,
        old: &Arc<Frame>,
        key: &[u8],
        new: Arc<Frame>,
        txn: &Transaction,
    ) -> Result<()> {
        let old_id = old.page_id();
        let new_id = new.page_id();
        let parent_id = {
            let data = old.read_data();
            BTreePage::new(&data[..]).parent_page_id()
        };

        if !parent_id.is_valid() {
            // The old node was the root: grow a new internal root above.
            let root_frame = self.bpm.new_page()?;
            let root_id = root_frame.page_id();

            {
                let mut data = root_frame.write_data();
                let mut root = InternalPage::new(&mut data[..], self.key_size);
                root.init(root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(old_id, key, new_id);
            }
            {
                let mut data = old.write_data();
                BTreePageMut::new(&mut data[..]).set_parent_page_id(root_id);
            }
            {
                let mut data = new.write_data();
                BTreePageMut::new(&mut data[..]).set_parent_page_id(root_id);
            }

            self.root_page_id = root_id;
            self.update_root_page_id(false)?;

            self.bpm.unpin_page(new_id, true);
            self.bpm.unpin_page(root_id, true);

            debug!(root = root_id.as_i32(), "btree.new_root");
            return Ok(());
        }

        let parent_frame = self.bpm.fetch_page(parent_id)?;

        // Release the new node before possibly recursing, so deep splits do
        // not accumulate pins.
        {
            let mut data = new.write_data();
            BTreePageMut::new(&mut data[..]).set_parent_page_id(parent_id);
        }
        self.bpm.unpin_page(new_id, true);
        drop(new);

        let new_size = {
            let mut data = parent_frame.write_data();
            let mut parent = InternalPage::new(&mut data[..], self.key_size);
            parent.insert_node_after(old_id, key, new_id)?
        };

        if new_size >= self.internal_max_size {
            let (separator, split_frame) = self.split_internal(&parent_frame)?;
            self.insert_into_parent(&parent_frame, &separator, split_frame, txn)?;
        }

        self.bpm.unpin_page(parent_id, true);
        Ok(())
    }

    /*****************************************************************
     * REMOVAL
     *****************************************************************/

    /// Deletes the pair bound to the key, if present, rebalancing the tree
    /// when a node drops below its minimum occupancy.
    pub fn remove(&mut self, key: &[u8], txn: &Transaction) -> Result<()> {
        assert_eq!(key.len(), self.key_size);
        if self.is_empty() {
            return Ok(());
        }

        let leaf_frame = self.find_leaf_page(key, false)?;
        let leaf_id = leaf_frame.page_id();

        let (size, min_size) = {
            let mut data = leaf_frame.write_data();
            let mut leaf = LeafPage::new(&mut data[..], self.key_size);
            (
                leaf.remove_and_delete_record(key, &*self.comparator),
                leaf.min_size(),
            )
        };

        if size < min_size {
            let deleted = self.coalesce_or_redistribute(leaf_frame, txn)?;
            if !deleted {
                self.bpm.unpin_page(leaf_id, true);
            }
        } else {
            self.bpm.unpin_page(leaf_id, true);
        }
        Ok(())
    }

    /// Restores minimum occupancy of an under-full node by borrowing from a
    /// sibling (redistribute) or merging with it (coalesce). Returns true
    /// when the passed node's page was deleted, in which case its pin has
    /// already been released.
    fn coalesce_or_redistribute(&mut self, frame: Arc<Frame>, txn: &Transaction) -> Result<bool> {
        let node_id = frame.page_id();
        let (is_root, is_leaf, node_size, node_max) = {
            let data = frame.read_data();
            let page = BTreePage::new(&data[..]);
            (page.is_root(), page.is_leaf(), page.size(), page.max_size())
        };

        if is_root {
            return self.adjust_root(frame);
        }

        let parent_id = {
            let data = frame.read_data();
            BTreePage::new(&data[..]).parent_page_id()
        };
        let parent_frame = self.bpm.fetch_page(parent_id)?;

        let parent_size = {
            let data = parent_frame.read_data();
            BTreePage::new(&data[..]).size()
        };
        if parent_size < 2 {
            // Only child, no sibling to merge with or borrow from. The
            // floor split rule leaves such chains behind; an emptied node
            // is dropped here and the now-empty parent cascades upward.
            if node_size > 0 {
                self.bpm.unpin_page(parent_id, false);
                return Ok(false);
            }
            if is_leaf {
                let next = {
                    let data = frame.read_data();
                    LeafPageRef::new(&data[..], self.key_size).next_page_id()
                };
                self.unlink_leaf(node_id, next)?;
            }
            self.bpm.unpin_page(node_id, true);
            self.bpm.delete_page(node_id)?;
            {
                let mut data = parent_frame.write_data();
                InternalPage::new(&mut data[..], self.key_size).remove(0);
            }
            let parent_deleted = self.coalesce_or_redistribute(Arc::clone(&parent_frame), txn)?;
            if !parent_deleted {
                self.bpm.unpin_page(parent_id, true);
            }
            return Ok(true);
        }

        // Prefer the left sibling; only the leftmost child borrows right.
        let (index, sibling_id) = {
            let data = parent_frame.read_data();
            let parent = InternalPageRef::new(&data[..], self.key_size);
            let index = parent.value_index(node_id).ok_or_else(|| {
                StrataError::IndexCorrupted(format!(
                    "node {} missing from parent {}",
                    node_id, parent_id
                ))
            })?;
            let sibling_id = if index > 0 {
                parent.value_at(index - 1)
            } else {
                parent.value_at(1)
            };
            (index, sibling_id)
        };
        let sibling_frame = self.bpm.fetch_page(sibling_id)?;
        let sibling_size = {
            let data = sibling_frame.read_data();
            BTreePage::new(&data[..]).size()
        };

        if node_size + sibling_size < node_max {
            // Merge. Normalize so the right operand empties into the left
            // one and is deleted; `right_index` is its slot in the parent.
            let node_deleted = index > 0;
            if index > 0 {
                self.coalesce(&sibling_frame, &frame, &parent_frame, index, is_leaf)?;
                self.bpm.unpin_page(sibling_id, true);
            } else {
                self.coalesce(&frame, &sibling_frame, &parent_frame, 1, is_leaf)?;
            }

            // The parent lost a slot and may now be under-full itself.
            let (parent_size, parent_min) = {
                let data = parent_frame.read_data();
                let page = BTreePage::new(&data[..]);
                (page.size(), page.min_size())
            };
            if parent_size < parent_min {
                let parent_deleted =
                    self.coalesce_or_redistribute(Arc::clone(&parent_frame), txn)?;
                if !parent_deleted {
                    self.bpm.unpin_page(parent_id, true);
                }
            } else {
                self.bpm.unpin_page(parent_id, true);
            }

            return Ok(node_deleted);
        }

        // Borrow a single entry from the sibling and fix the separator.
        self.redistribute(&sibling_frame, &frame, &parent_frame, index, is_leaf)?;
        self.bpm.unpin_page(sibling_id, true);
        self.bpm.unpin_page(parent_id, true);
        Ok(false)
    }

    /// Empties `right` into `left` and deletes `right`'s page.
    /// `right_index` is `right`'s slot in the parent; for internal merges
    /// the separator key at that slot fills the moved sentinel.
    fn coalesce(
        &mut self,
        left: &Arc<Frame>,
        right: &Arc<Frame>,
        parent: &Arc<Frame>,
        right_index: usize,
        is_leaf: bool,
    ) -> Result<()> {
        let right_id = right.page_id();
        let middle_key = {
            let data = parent.read_data();
            InternalPageRef::new(&data[..], self.key_size)
                .key_at(right_index)
                .to_vec()
        };

        {
            let mut left_data = left.write_data();
            let mut right_data = right.write_data();
            if is_leaf {
                let mut left_leaf = LeafPage::new(&mut left_data[..], self.key_size);
                let mut right_leaf = LeafPage::new(&mut right_data[..], self.key_size);
                right_leaf.move_all_to(&mut left_leaf);
            } else {
                let mut left_node = InternalPage::new(&mut left_data[..], self.key_size);
                let mut right_node = InternalPage::new(&mut right_data[..], self.key_size);
                right_node.move_all_to(&mut left_node, &middle_key, &self.bpm)?;
            }
        }

        self.bpm.unpin_page(right_id, true);
        self.bpm.delete_page(right_id)?;

        {
            let mut data = parent.write_data();
            InternalPage::new(&mut data[..], self.key_size).remove(right_index);
        }

        debug!(
            left = left.page_id().as_i32(),
            right = right_id.as_i32(),
            "btree.coalesce"
        );
        Ok(())
    }

    /// Moves one entry from the sibling into the node and rewrites the
    /// separator key in the parent. `index` is the node's slot in the
    /// parent: 0 means the sibling sits to the right, otherwise to the
    /// left.
    fn redistribute(
        &mut self,
        sibling: &Arc<Frame>,
        node: &Arc<Frame>,
        parent: &Arc<Frame>,
        index: usize,
        is_leaf: bool,
    ) -> Result<()> {
        let mut node_data = node.write_data();
        let mut sibling_data = sibling.write_data();
        let mut parent_data = parent.write_data();
        let mut parent_node = InternalPage::new(&mut parent_data[..], self.key_size);

        if is_leaf {
            let mut node_leaf = LeafPage::new(&mut node_data[..], self.key_size);
            let mut sibling_leaf = LeafPage::new(&mut sibling_data[..], self.key_size);
            if index == 0 {
                sibling_leaf.move_first_to_end_of(&mut node_leaf);
                parent_node.set_key_at(1, sibling_leaf.key_at(0));
            } else {
                sibling_leaf.move_last_to_front_of(&mut node_leaf);
                parent_node.set_key_at(index, node_leaf.key_at(0));
            }
        } else {
            let mut node_internal = InternalPage::new(&mut node_data[..], self.key_size);
            let mut sibling_internal = InternalPage::new(&mut sibling_data[..], self.key_size);
            if index == 0 {
                let middle_key = parent_node.key_at(1).to_vec();
                sibling_internal.move_first_to_end_of(&mut node_internal, &middle_key, &self.bpm)?;
                parent_node.set_key_at(1, sibling_internal.key_at(0));
            } else {
                let middle_key = parent_node.key_at(index).to_vec();
                sibling_internal.move_last_to_front_of(&mut node_internal, &middle_key, &self.bpm)?;
                parent_node.set_key_at(index, node_internal.key_at(0));
            }
        }

        debug!(
            node = node.page_id().as_i32(),
            sibling = sibling.page_id().as_i32(),
            "btree.redistribute"
        );
        Ok(())
    }

    /// Splices a leaf out of the leaf chain before its page is dropped.
    /// The chain is singly linked, so the predecessor is found by walking
    /// from the leftmost leaf; the head has no predecessor.
    fn unlink_leaf(&mut self, leaf_id: PageId, next: PageId) -> Result<()> {
        let mut frame = self.find_leaf_page(&[], true)?;
        loop {
            let (page_id, leaf_next) = {
                let data = frame.read_data();
                let leaf = LeafPageRef::new(&data[..], self.key_size);
                (frame.page_id(), leaf.next_page_id())
            };

            if page_id == leaf_id || !leaf_next.is_valid() {
                self.bpm.unpin_page(page_id, false);
                return Ok(());
            }
            if leaf_next == leaf_id {
                {
                    let mut data = frame.write_data();
                    let mut leaf = LeafPage::new(&mut data[..], self.key_size);
                    leaf.set_next_page_id(next);
                }
                self.bpm.unpin_page(page_id, true);
                return Ok(());
            }

            let next_frame = self.bpm.fetch_page(leaf_next)?;
            self.bpm.unpin_page(page_id, false);
            frame = next_frame;
        }
    }

    /// Handles under-flow at the root: an internal root left with a single
    /// child hands the tree to that child; an emptied leaf root leaves the
    /// tree empty. Returns true when the old root page was deleted (its
    /// pin is released here).
    fn adjust_root(&mut self, frame: Arc<Frame>) -> Result<bool> {
        let root_id = frame.page_id();
        let (is_leaf, size) = {
            let data = frame.read_data();
            let page = BTreePage::new(&data[..]);
            (page.is_leaf(), page.size())
        };

        if !is_leaf && size == 1 {
            let child_id = {
                let mut data = frame.write_data();
                InternalPage::new(&mut data[..], self.key_size).remove_and_return_only_child()
            };

            let child_frame = self.bpm.fetch_page(child_id)?;
            {
                let mut data = child_frame.write_data();
                BTreePageMut::new(&mut data[..]).set_parent_page_id(INVALID_PAGE_ID);
            }
            self.root_page_id = child_id;
            self.update_root_page_id(false)?;
            self.bpm.unpin_page(child_id, true);

            self.bpm.unpin_page(root_id, false);
            self.bpm.delete_page(root_id)?;

            debug!(root = child_id.as_i32(), "btree.root_demoted");
            return Ok(true);
        }

        if is_leaf && size == 0 {
            self.root_page_id = INVALID_PAGE_ID;
            self.update_root_page_id(false)?;

            self.bpm.unpin_page(root_id, false);
            self.bpm.delete_page(root_id)?;

            debug!("btree.emptied");
            return Ok(true);
        }

        Ok(false)
    }

    /*****************************************************************
     * ITERATORS
     *****************************************************************/

    /// Iterator positioned at the first entry of the leftmost leaf.
    pub fn begin(&self) -> Result<BTreeIterator> {
        if self.is_empty() {
            return Ok(BTreeIterator::exhausted(
                Arc::clone(&self.bpm),
                self.key_size,
            ));
        }
        let frame = self.find_leaf_page(&[], true)?;
        Ok(BTreeIterator::new(
            Arc::clone(&self.bpm),
            frame,
            0,
            self.key_size,
        ))
    }

    /// Iterator positioned at the first entry whose key is >= the given
    /// key.
    pub fn begin_from(&self, key: &[u8]) -> Result<BTreeIterator> {
        if self.is_empty() {
            return Ok(BTreeIterator::exhausted(
                Arc::clone(&self.bpm),
                self.key_size,
            ));
        }
        let frame = self.find_leaf_page(key, false)?;
        let index = {
            let data = frame.read_data();
            LeafPageRef::new(&data[..], self.key_size).key_index(key, &*self.comparator)
        };
        Ok(BTreeIterator::new(
            Arc::clone(&self.bpm),
            frame,
            index,
            self.key_size,
        ))
    }

    /// Iterator positioned one past the last entry of the last leaf.
    pub fn end(&self) -> Result<BTreeIterator> {
        if self.is_empty() {
            return Ok(BTreeIterator::exhausted(
                Arc::clone(&self.bpm),
                self.key_size,
            ));
        }

        let mut frame = self.find_leaf_page(&[], true)?;
        loop {
            let next = {
                let data = frame.read_data();
                LeafPageRef::new(&data[..], self.key_size).next_page_id()
            };
            if !next.is_valid() {
                break;
            }
            let next_frame = self.bpm.fetch_page(next)?;
            self.bpm.unpin_page(frame.page_id(), false);
            frame = next_frame;
        }

        let size = {
            let data = frame.read_data();
            LeafPageRef::new(&data[..], self.key_size).size()
        };
        Ok(BTreeIterator::new(
            Arc::clone(&self.bpm),
            frame,
            size,
            self.key_size,
        ))
    }

    /*****************************************************************
     * UTILITIES
     *****************************************************************/

    /// Descends from the root to the leaf covering the key (or the
    /// leftmost leaf). The returned frame is pinned; the caller owns the
    /// unpin. Interior pages are released clean along the way.
    fn find_leaf_page(&self, key: &[u8], leftmost: bool) -> Result<Arc<Frame>> {
        let mut frame = self.bpm.fetch_page(self.root_page_id)?;
        loop {
            let child = {
                let data = frame.read_data();
                if BTreePage::new(&data[..]).is_leaf() {
                    None
                } else {
                    let node = InternalPageRef::new(&data[..], self.key_size);
                    Some(if leftmost {
                        node.value_at(0)
                    } else {
                        node.lookup(key, &*self.comparator)
                    })
                }
            };

            match child {
                None => return Ok(frame),
                Some(child_id) => {
                    self.bpm.unpin_page(frame.page_id(), false);
                    frame = self.bpm.fetch_page(child_id)?;
                }
            }
        }
    }

    /// Records the current root page id in the header page. With `insert`
    /// set, registers the index name first (falling back to an update if
    /// the record already exists from an earlier life of this index).
    fn update_root_page_id(&self, insert: bool) -> Result<()> {
        let frame = self.bpm.fetch_page(HEADER_PAGE_ID)?;
        let result = {
            let mut data = frame.write_data();
            let mut header = HeaderPage::new(&mut data[..]);
            if insert {
                match header.insert_record(&self.index_name, self.root_page_id) {
                    Err(StrataError::IndexAlreadyExists(_)) => {
                        header.update_record(&self.index_name, self.root_page_id)
                    }
                    other => other,
                }
            } else {
                header.update_record(&self.index_name, self.root_page_id)
            }
        };
        self.bpm.unpin_page(HEADER_PAGE_ID, true);
        result
    }

    /*****************************************************************
     * TEST HELPERS
     *****************************************************************/

    /// Reads integer keys (one per line) from a file and inserts them.
    /// The record id is derived from the key. Requires a key width >= 8.
    pub fn insert_from_file<P: AsRef<Path>>(&mut self, path: P, txn: &Transaction) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let mut key = vec![0u8; self.key_size];
        for line in content.lines() {
            if let Ok(value) = line.trim().parse::<i64>() {
                encode_integer_key(value, &mut key);
                let rid = RecordId::new(
                    PageId::new((value >> 32) as i32),
                    SlotId::new(value as u32),
                );
                self.insert(&key, rid, txn)?;
            }
        }
        Ok(())
    }

    /// Reads integer keys (one per line) from a file and removes them.
    pub fn remove_from_file<P: AsRef<Path>>(&mut self, path: P, txn: &Transaction) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let mut key = vec![0u8; self.key_size];
        for line in content.lines() {
            if let Ok(value) = line.trim().parse::<i64>() {
                encode_integer_key(value, &mut key);
                self.remove(&key, txn)?;
            }
        }
        Ok(())
    }

    /// Renders the tree structure for diagnostics.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        if self.is_empty() {
            out.push_str("(empty)\n");
            return Ok(out);
        }
        self.dump_node(self.root_page_id, 0, &mut out)?;
        Ok(out)
    }

    fn dump_node(&self, page_id: PageId, depth: usize, out: &mut String) -> Result<()> {
        let frame = self.bpm.fetch_page(page_id)?;
        let (line, children) = {
            let data = frame.read_data();
            let page = BTreePage::new(&data[..]);
            let indent = "  ".repeat(depth);
            if page.is_leaf() {
                let leaf = LeafPageRef::new(&data[..], self.key_size);
                let keys: Vec<String> =
                    (0..leaf.size()).map(|i| self.fmt_key(leaf.key_at(i))).collect();
                (
                    format!(
                        "{}leaf {} [{}] next={}\n",
                        indent,
                        page_id.as_i32(),
                        keys.join(","),
                        leaf.next_page_id().as_i32()
                    ),
                    Vec::new(),
                )
            } else {
                let node = InternalPageRef::new(&data[..], self.key_size);
                let keys: Vec<String> = (1..node.size())
                    .map(|i| self.fmt_key(node.key_at(i)))
                    .collect();
                let children: Vec<PageId> = (0..node.size()).map(|i| node.value_at(i)).collect();
                (
                    format!(
                        "{}internal {} [{}]\n",
                        indent,
                        page_id.as_i32(),
                        keys.join(",")
                    ),
                    children,
                )
            }
        };
        self.bpm.unpin_page(page_id, false);

        out.push_str(&line);
        for child in children {
            self.dump_node(child, depth + 1, out)?;
        }
        Ok(())
    }

    fn fmt_key(&self, key: &[u8]) -> String {
        if self.key_size >= 8 {
            decode_integer_key(key).to_string()
        } else {
            key.iter().map(|b| format!("{:02x}", b)).collect()
        }
    }

    /// Walks the whole tree checking the structural invariants: key
    /// ordering within and across nodes, parent back-pointers, occupancy
    /// bounds, uniform leaf depth and the leaf chain. Intended for tests.
    pub fn verify_integrity(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        self.check_node(self.root_page_id, INVALID_PAGE_ID, None, None)?;
        self.check_leaf_chain()?;
        Ok(())
    }

    fn check_node(
        &self,
        page_id: PageId,
        expected_parent: PageId,
        low: Option<Vec<u8>>,
        high: Option<Vec<u8>>,
    ) -> Result<usize> {
        let corrupt = |msg: String| StrataError::IndexCorrupted(msg);

        let frame = self.bpm.fetch_page(page_id)?;
        let (is_leaf, size, max_size, min_size, parent, self_id, keys, children) = {
            let data = frame.read_data();
            let page = BTreePage::new(&data[..]);
            let is_leaf = page.is_leaf();
            let keys: Vec<Vec<u8>>;
            let children: Vec<PageId>;
            if is_leaf {
                let leaf = LeafPageRef::new(&data[..], self.key_size);
                keys = (0..leaf.size()).map(|i| leaf.key_at(i).to_vec()).collect();
                children = Vec::new();
            } else {
                let node = InternalPageRef::new(&data[..], self.key_size);
                keys = (0..node.size()).map(|i| node.key_at(i).to_vec()).collect();
                children = (0..node.size()).map(|i| node.value_at(i)).collect();
            }
            (
                is_leaf,
                page.size(),
                page.max_size(),
                page.min_size(),
                page.parent_page_id(),
                page.page_id(),
                keys,
                children,
            )
        };
        self.bpm.unpin_page(page_id, false);

        if self_id != page_id {
            return Err(corrupt(format!(
                "page {} records id {}",
                page_id, self_id
            )));
        }
        if parent != expected_parent {
            return Err(corrupt(format!(
                "page {} records parent {}, expected {}",
                page_id, parent, expected_parent
            )));
        }

        let is_root = !expected_parent.is_valid();
        if is_leaf {
            if size >= max_size {
                return Err(corrupt(format!("leaf {} overflowed: {}", page_id, size)));
            }
            let min = if is_root { 1 } else { min_size };
            if size < min {
                return Err(corrupt(format!("leaf {} under-full: {}", page_id, size)));
            }
        } else {
            if size > max_size {
                return Err(corrupt(format!(
                    "internal {} overflowed: {}",
                    page_id, size
                )));
            }
            let min = if is_root { 2 } else { min_size };
            if size < min {
                return Err(corrupt(format!(
                    "internal {} under-full: {}",
                    page_id, size
                )));
            }
        }

        // Slot 0's key is a sentinel in internal nodes
        let first_real_key = if is_leaf { 0 } else { 1 };
        for i in first_real_key..keys.len() {
            if i > first_real_key
                && self.comparator.compare(&keys[i - 1], &keys[i]) != std::cmp::Ordering::Less
            {
                return Err(corrupt(format!("page {} keys out of order", page_id)));
            }
            if let Some(low) = &low {
                if self.comparator.compare(&keys[i], low) == std::cmp::Ordering::Less {
                    return Err(corrupt(format!("page {} key below bound", page_id)));
                }
            }
            if let Some(high) = &high {
                if self.comparator.compare(&keys[i], high) != std::cmp::Ordering::Less {
                    return Err(corrupt(format!("page {} key above bound", page_id)));
                }
            }
        }

        if is_leaf {
            return Ok(1);
        }

        let mut depth = None;
        for (i, &child) in children.iter().enumerate() {
            let child_low = if i == 0 {
                low.clone()
            } else {
                Some(keys[i].clone())
            };
            let child_high = if i + 1 < children.len() {
                Some(keys[i + 1].clone())
            } else {
                high.clone()
            };
            let child_depth = self.check_node(child, page_id, child_low, child_high)?;
            match depth {
                None => depth = Some(child_depth),
                Some(d) if d != child_depth => {
                    return Err(corrupt(format!("page {} has ragged depth", page_id)));
                }
                _ => {}
            }
        }
        Ok(depth.unwrap_or(0) + 1)
    }

    fn check_leaf_chain(&self) -> Result<()> {
        let mut frame = self.find_leaf_page(&[], true)?;
        let mut last_key: Option<Vec<u8>> = None;

        loop {
            let (keys, next) = {
                let data = frame.read_data();
                let leaf = LeafPageRef::new(&data[..], self.key_size);
                let keys: Vec<Vec<u8>> =
                    (0..leaf.size()).map(|i| leaf.key_at(i).to_vec()).collect();
                (keys, leaf.next_page_id())
            };
            self.bpm.unpin_page(frame.page_id(), false);

            for key in keys {
                if let Some(last) = &last_key {
                    if self.comparator.compare(last, &key) != std::cmp::Ordering::Less {
                        return Err(StrataError::IndexCorrupted(
                            "leaf chain out of order".to_string(),
                        ));
                    }
                }
                last_key = Some(key);
            }

            if !next.is_valid() {
                return Ok(());
            }
            frame = self.bpm.fetch_page(next)?;
        }
    }
}
