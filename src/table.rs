use std::path::Path;

use tracing::info;

use crate::{
    cursor::Cursor,
    error::Result,
    node::{self, LeafNode},
    pager::{PageNum, Pager, TABLE_MAX_PAGES},
    row::Row,
};

/// Knobs for opening a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    /// Upper bound on the number of pages the file may grow to
    pub max_pages: u32,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            max_pages: TABLE_MAX_PAGES,
        }
    }
}

/// The result of a well-formed insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Success,
    /// A row with this id already exists. Nothing was written.
    DuplicateKey,
    /// The row would need an internal node split, which is not supported. Nothing
    /// was written.
    TableFull,
}

/// A single table of [`Row`]s stored as a B-tree keyed by row id.
/// The root always lives on page 0.
#[derive(Debug)]
pub struct Table {
    pub(crate) root_page_num: PageNum,
    pub(crate) pager: Pager,
}

impl Table {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Self::open_with(path, TableOptions::default())
    }

    /// Open the table stored at `path`. An empty file gets an empty root leaf.
    pub fn open_with<P>(path: P, options: TableOptions) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let mut pager = Pager::open(path, options.max_pages)?;
        if pager.num_pages() == 0 {
            let page = pager.get_page_mut(0)?;
            LeafNode::new(0, &mut *page).initialize();
            node::set_root(page, true);
            info!("initialized empty table");
        }
        Ok(Self {
            root_page_num: 0,
            pager,
        })
    }

    /// Persist every modified page and release the file
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    pub fn root_page_num(&self) -> PageNum {
        self.root_page_num
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// A cursor at the smallest key, already at the end if the table is empty
    pub fn start(&mut self) -> Result<Cursor<'_>> {
        let mut cursor = self.find(0)?;
        if cursor.leaf_len()? == 0 {
            cursor.set_end();
        }
        Ok(cursor)
    }

    /// A cursor at `key`, or at the position `key` would be inserted
    pub fn find(&mut self, key: u32) -> Result<Cursor<'_>> {
        let (page_num, cell_num) = self.find_position(key)?;
        Ok(Cursor::new(self, page_num, cell_num))
    }

    /// Every row in ascending id order
    pub fn select(&mut self) -> Result<Vec<Row>> {
        self.start()?.collect()
    }
}
