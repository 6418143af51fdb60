pub mod btree_index;
pub mod btree_iterator;
pub mod btree_page;
pub mod key_comparator;

pub use btree_index::BPlusTree;
pub use btree_iterator::BTreeIterator;
pub use btree_page::{
    BTreePage, BTreePageMut, BTreePageType, InternalPage, InternalPageRef, LeafPage, LeafPageRef,
};
pub use key_comparator::{
    decode_integer_key, encode_integer_key, BytewiseComparator, IntegerComparator, KeyComparator,
};
