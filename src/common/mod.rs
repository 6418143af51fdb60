pub mod config;
pub mod error;
pub mod types;

pub use config::{DEFAULT_BUFFER_POOL_SIZE, HEADER_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE};
pub use error::{Result, StrataError};
pub use types::{FrameId, Lsn, PageId, RecordId, SlotId, Transaction, INVALID_LSN};
