use std::sync::Arc;

use crate::buffer::{BufferPoolManager, Frame};
use crate::common::{RecordId, Result};

use super::btree_page::LeafPageRef;

/// Forward iterator over the leaf chain of a B+Tree.
///
/// The iterator holds at most one pinned leaf at a time; hopping to the next
/// leaf releases the previous pin in the same step that takes the new one,
/// and dropping the iterator releases whatever it still holds. Iterators
/// must not outlive the tree they came from.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    frame: Option<Arc<Frame>>,
    index: usize,
    key_size: usize,
}

impl BTreeIterator {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        frame: Arc<Frame>,
        index: usize,
        key_size: usize,
    ) -> Self {
        Self {
            bpm,
            frame: Some(frame),
            index,
            key_size,
        }
    }

    /// An iterator over the empty tree.
    pub(crate) fn exhausted(bpm: Arc<BufferPoolManager>, key_size: usize) -> Self {
        Self {
            bpm,
            frame: None,
            index: 0,
            key_size,
        }
    }

    /// True when positioned past the last entry of the last leaf.
    pub fn is_end(&self) -> bool {
        match &self.frame {
            None => true,
            Some(frame) => {
                let data = frame.read_data();
                let leaf = LeafPageRef::new(&data[..], self.key_size);
                self.index >= leaf.size() && !leaf.next_page_id().is_valid()
            }
        }
    }

    /// The entry under the cursor, or None when positioned past a leaf's
    /// last entry.
    pub fn item(&self) -> Option<(Vec<u8>, RecordId)> {
        let frame = self.frame.as_ref()?;
        let data = frame.read_data();
        let leaf = LeafPageRef::new(&data[..], self.key_size);
        if self.index < leaf.size() {
            Some((leaf.key_at(self.index).to_vec(), leaf.value_at(self.index)))
        } else {
            None
        }
    }

    /// Steps the cursor forward, hopping the leaf chain at page boundaries.
    pub fn advance(&mut self) -> Result<()> {
        if self.frame.is_none() {
            return Ok(());
        }
        self.index += 1;
        self.skip_to_next_leaf()
    }

    /// When the cursor sits past the current leaf's entries and a next leaf
    /// exists, rebind to it. Releases the old pin after the new leaf is
    /// pinned.
    fn skip_to_next_leaf(&mut self) -> Result<()> {
        let Some(frame) = &self.frame else {
            return Ok(());
        };

        let (size, next) = {
            let data = frame.read_data();
            let leaf = LeafPageRef::new(&data[..], self.key_size);
            (leaf.size(), leaf.next_page_id())
        };

        if self.index >= size && next.is_valid() {
            let next_frame = self.bpm.fetch_page(next)?;
            self.bpm.unpin_page(frame.page_id(), false);
            self.frame = Some(next_frame);
            self.index = 0;
        }
        Ok(())
    }
}

impl PartialEq for BTreeIterator {
    fn eq(&self, other: &Self) -> bool {
        let self_page = self.frame.as_ref().map(|f| f.page_id());
        let other_page = other.frame.as_ref().map(|f| f.page_id());
        self_page == other_page && self.index == other.index
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(Vec<u8>, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        // A Begin(key) cursor may start just past a leaf's entries
        if self.item().is_none() {
            if self.is_end() {
                return None;
            }
            if let Err(e) = self.skip_to_next_leaf() {
                return Some(Err(e));
            }
        }

        let item = self.item()?;
        match self.advance() {
            Ok(()) => Some(Ok(item)),
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for BTreeIterator {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.bpm.unpin_page(frame.page_id(), false);
        }
    }
}
