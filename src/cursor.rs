use crate::{
    error::{DbError, Result},
    node::LeafNode,
    pager::PageNum,
    row::{Row, ROW_SIZE},
    table::Table,
};

/// A position within the leaf level of a table.
///
/// Cursors walk the leaves left to right through their `next_leaf` links, so a
/// full scan never goes back through the internal nodes. A cursor borrows the
/// table mutably because reading a page may load it into the pager's cache.
pub struct Cursor<'a> {
    table: &'a mut Table,
    page_num: PageNum,
    cell_num: u32,
    end_of_table: bool,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(table: &'a mut Table, page_num: PageNum, cell_num: u32) -> Self {
        Self {
            table,
            page_num,
            cell_num,
            end_of_table: false,
        }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    pub fn cell_num(&self) -> u32 {
        self.cell_num
    }

    pub fn is_end(&self) -> bool {
        self.end_of_table
    }

    pub(crate) fn set_end(&mut self) {
        self.end_of_table = true;
    }

    /// Number of cells in the leaf the cursor is on
    pub(crate) fn leaf_len(&mut self) -> Result<u32> {
        let page = self.table.pager.get_page(self.page_num)?;
        Ok(LeafNode::new(self.page_num, page).num_cells())
    }

    /// The encoded row under the cursor. Fails once the cursor has run off the
    /// end of the table, or when it sits at an insertion point after the last cell.
    pub fn value(&mut self) -> Result<&[u8; ROW_SIZE]> {
        let page = self.table.pager.get_page(self.page_num)?;
        let leaf = LeafNode::new(self.page_num, page);
        if self.end_of_table || self.cell_num >= leaf.num_cells() {
            return Err(DbError::CursorAtEnd {
                page: self.page_num,
                cell: self.cell_num,
            });
        }
        leaf.into_value(self.cell_num)
    }

    /// The row under the cursor, decoded
    pub fn row(&mut self) -> Result<Row> {
        self.value().map(Row::decode)
    }

    /// Step to the next cell, following the leaf chain when this leaf is exhausted
    pub fn advance(&mut self) -> Result<()> {
        let page = self.table.pager.get_page(self.page_num)?;
        let leaf = LeafNode::new(self.page_num, page);
        let num_cells = leaf.num_cells();
        let next_leaf = leaf.next_leaf();

        self.cell_num += 1;
        if self.cell_num >= num_cells {
            if next_leaf == 0 {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end_of_table {
            return None;
        }
        let row = match self.row().and_then(|row| self.advance().map(|()| row)) {
            Ok(row) => row,
            Err(e) => {
                self.end_of_table = true;
                return Some(Err(e));
            }
        };
        Some(Ok(row))
    }
}
