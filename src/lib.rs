//! A single-file embedded store for one fixed-schema table.
//!
//! Rows (`id`, `username`, `email`) live in a B-tree keyed by `id`, laid out in
//! 4096-byte pages of one database file. The [`Pager`] caches pages and owns all
//! file I/O, [`node`] describes the byte layout of leaf and internal pages, and
//! [`Table`] ties them together with insert, select and cursor access.

mod btree;
mod cursor;
mod error;
pub mod node;
mod page;
mod pager;
mod row;
pub mod statement;
mod table;
#[cfg(test)]
mod test_utils;

pub use cursor::Cursor;
pub use error::{DbError, Result, RowError};
pub use page::{Page, PAGE_SIZE};
pub use pager::{PageNum, Pager, TABLE_MAX_PAGES};
pub use row::{Row, COLUMN_EMAIL_SIZE, COLUMN_USERNAME_SIZE, ROW_SIZE};
pub use table::{InsertOutcome, Table, TableOptions};
