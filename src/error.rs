//! Error types for the storage engine.
//!
//! Everything in [`DbError`] means the store is corrupted or mis-configured and the
//! current operation was abandoned. Ordinary outcomes of a well-formed request, like a
//! duplicate key, are reported through [`crate::InsertOutcome`] instead.

use std::io;

use thiserror::Error;

use crate::pager::PageNum;

/// Result type for storage engine operations.
pub type Result<T> = std::result::Result<T, DbError>;

/// Unrecoverable storage engine errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Seek, read, write or sync on the database file failed.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// The database file is not a whole number of pages.
    #[error("db file is not a whole number of pages ({length} bytes), corrupt file")]
    CorruptFile { length: u64 },

    /// A page number at or beyond the configured page limit was requested.
    #[error("tried to fetch page number out of bounds: {page} >= {max}")]
    PageOutOfBounds { page: PageNum, max: u32 },

    /// Flush was requested for a page that was never loaded.
    #[error("tried to flush page {page} which is not in the cache")]
    PageNotCached { page: PageNum },

    /// A cell index beyond the node's fixed capacity.
    #[error("cell {cell} out of bounds on page {page} (capacity {max})")]
    CellOutOfBounds { page: PageNum, cell: u32, max: u32 },

    /// `internal_node_child` was asked for a child past the right child.
    #[error("tried to access child {index} > key count {key_count} on page {page}")]
    ChildIndexOutOfRange {
        page: PageNum,
        index: u32,
        key_count: u32,
    },

    /// Inserting into this internal node would require splitting it.
    #[error("internal node {page} already holds {max} keys, splitting internal nodes is not supported")]
    InternalNodeFull { page: PageNum, max: u32 },

    /// Descending from the root visited more nodes than the table has pages.
    #[error("tree descent exceeded {max_depth} levels, the page graph has a cycle")]
    TreeTooDeep { max_depth: u32 },

    /// A cursor was dereferenced past the last row, or past the end of its leaf.
    #[error("cursor at page {page} cell {cell} does not point at a row")]
    CursorAtEnd { page: PageNum, cell: u32 },

    /// A node with no cells was asked for its maximum key.
    #[error("page {page} has no keys")]
    EmptyNode { page: PageNum },

    /// The node kind byte does not name a leaf or an internal node.
    #[error("page {page} has invalid node kind byte {byte:#04x}")]
    InvalidNodeKind { page: PageNum, byte: u8 },
}

/// Errors building a [`crate::Row`] whose fields cannot be stored in their fixed columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("username is {len} bytes, the column holds {max}")]
    UsernameTooLong { len: usize, max: usize },

    #[error("email is {len} bytes, the column holds {max}")]
    EmailTooLong { len: usize, max: usize },

    /// Zero bytes are column padding on disk, so values cannot contain them.
    #[error("{column} contains a NUL byte")]
    EmbeddedNul { column: &'static str },
}
