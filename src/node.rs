//! On-page layout of B-tree nodes.
//!
//! Every node starts with a common header:
//! ```text
//! +-------------+---------------+---------------------+
//! | kind (1B)   | is_root (1B)  | parent page (4B)    |
//! +-------------+---------------+---------------------+
//!   ^ offset 0    ^ offset 1      ^ offset 2
//! ```
//!
//! A leaf node continues with its cell count and the page number of the next leaf
//! (0 terminates the chain), followed by sorted `{key, row}` cells:
//! ```text
//! +----------------+------------------+----------------------------------+
//! | num cells (4B) | next leaf (4B)   | cells [key (4B) | row (291B)]... |
//! +----------------+------------------+----------------------------------+
//!   ^ offset 6       ^ offset 10        ^ offset 14
//! ```
//!
//! An internal node continues with its key count and right child, followed by sorted
//! `{child, key}` cells where `key` is the largest key under `child`:
//! ```text
//! +---------------+-------------------+-----------------------------------+
//! | num keys (4B) | right child (4B)  | cells [child (4B) | key (4B)]...  |
//! +---------------+-------------------+-----------------------------------+
//!   ^ offset 6      ^ offset 10         ^ offset 14
//! ```
//!
//! The views in this module never touch the pager: they are handed a page and
//! read or write fields at fixed offsets, checking cell indices against capacity.

use std::ops::{Deref, DerefMut};

use crate::{
    error::{DbError, Result},
    page::{Page, PAGE_SIZE},
    pager::PageNum,
    row::{Row, ROW_SIZE},
};

// Common node header layout
pub const NODE_TYPE_SIZE: usize = std::mem::size_of::<u8>();
pub const NODE_TYPE_OFFSET: usize = 0;
pub const IS_ROOT_SIZE: usize = std::mem::size_of::<u8>();
pub const IS_ROOT_OFFSET: usize = NODE_TYPE_OFFSET + NODE_TYPE_SIZE;
pub const PARENT_POINTER_SIZE: usize = std::mem::size_of::<u32>();
pub const PARENT_POINTER_OFFSET: usize = IS_ROOT_OFFSET + IS_ROOT_SIZE;
pub const COMMON_NODE_HEADER_SIZE: usize = NODE_TYPE_SIZE + IS_ROOT_SIZE + PARENT_POINTER_SIZE;

// Leaf node header layout
pub const LEAF_NODE_NUM_CELLS_SIZE: usize = std::mem::size_of::<u32>();
pub const LEAF_NODE_NUM_CELLS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const LEAF_NODE_NEXT_LEAF_SIZE: usize = std::mem::size_of::<u32>();
pub const LEAF_NODE_NEXT_LEAF_OFFSET: usize =
    LEAF_NODE_NUM_CELLS_OFFSET + LEAF_NODE_NUM_CELLS_SIZE;
pub const LEAF_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + LEAF_NODE_NUM_CELLS_SIZE + LEAF_NODE_NEXT_LEAF_SIZE;

// Leaf node body layout
pub const LEAF_NODE_KEY_SIZE: usize = std::mem::size_of::<u32>();
pub const LEAF_NODE_KEY_OFFSET: usize = 0;
pub const LEAF_NODE_VALUE_SIZE: usize = ROW_SIZE;
pub const LEAF_NODE_VALUE_OFFSET: usize = LEAF_NODE_KEY_OFFSET + LEAF_NODE_KEY_SIZE;
pub const LEAF_NODE_CELL_SIZE: usize = LEAF_NODE_KEY_SIZE + LEAF_NODE_VALUE_SIZE;
pub const LEAF_NODE_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_NODE_HEADER_SIZE;
pub const LEAF_NODE_MAX_CELLS: u32 = (LEAF_NODE_SPACE_FOR_CELLS / LEAF_NODE_CELL_SIZE) as u32;
pub const LEAF_NODE_RIGHT_SPLIT_COUNT: u32 = (LEAF_NODE_MAX_CELLS + 1) / 2;
pub const LEAF_NODE_LEFT_SPLIT_COUNT: u32 = (LEAF_NODE_MAX_CELLS + 1) - LEAF_NODE_RIGHT_SPLIT_COUNT;

// Internal node header layout
pub const INTERNAL_NODE_NUM_KEYS_SIZE: usize = std::mem::size_of::<u32>();
pub const INTERNAL_NODE_NUM_KEYS_OFFSET: usize = COMMON_NODE_HEADER_SIZE;
pub const INTERNAL_NODE_RIGHT_CHILD_SIZE: usize = std::mem::size_of::<u32>();
pub const INTERNAL_NODE_RIGHT_CHILD_OFFSET: usize =
    INTERNAL_NODE_NUM_KEYS_OFFSET + INTERNAL_NODE_NUM_KEYS_SIZE;
pub const INTERNAL_NODE_HEADER_SIZE: usize =
    COMMON_NODE_HEADER_SIZE + INTERNAL_NODE_NUM_KEYS_SIZE + INTERNAL_NODE_RIGHT_CHILD_SIZE;

// Internal node body layout
pub const INTERNAL_NODE_CHILD_SIZE: usize = std::mem::size_of::<u32>();
pub const INTERNAL_NODE_KEY_SIZE: usize = std::mem::size_of::<u32>();
pub const INTERNAL_NODE_CELL_SIZE: usize = INTERNAL_NODE_CHILD_SIZE + INTERNAL_NODE_KEY_SIZE;
/// Kept small so that splitting is exercised with few rows. Internal nodes never
/// split, so the root can address at most `INTERNAL_NODE_MAX_CELLS + 1` leaves.
pub const INTERNAL_NODE_MAX_CELLS: u32 = 3;

/// The layout constants reported by the `.constants` meta-command
pub fn constants() -> [(&'static str, usize); 6] {
    [
        ("ROW_SIZE", ROW_SIZE),
        ("COMMON_NODE_HEADER_SIZE", COMMON_NODE_HEADER_SIZE),
        ("LEAF_NODE_HEADER_SIZE", LEAF_NODE_HEADER_SIZE),
        ("LEAF_NODE_CELL_SIZE", LEAF_NODE_CELL_SIZE),
        ("LEAF_NODE_SPACE_FOR_CELLS", LEAF_NODE_SPACE_FOR_CELLS),
        ("LEAF_NODE_MAX_CELLS", LEAF_NODE_MAX_CELLS as usize),
    ]
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Internal = 0,
    Leaf = 1,
}

impl TryFrom<u8> for NodeKind {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeKind::Internal),
            1 => Ok(NodeKind::Leaf),
            other => Err(other),
        }
    }
}

pub fn node_kind(page: &Page, page_num: PageNum) -> Result<NodeKind> {
    NodeKind::try_from(page.get_u8(NODE_TYPE_OFFSET))
        .map_err(|byte| DbError::InvalidNodeKind { page: page_num, byte })
}

pub fn set_node_kind(page: &mut Page, kind: NodeKind) {
    page.set_u8(NODE_TYPE_OFFSET, kind as u8);
}

pub fn is_root(page: &Page) -> bool {
    page.get_u8(IS_ROOT_OFFSET) != 0
}

pub fn set_root(page: &mut Page, is_root: bool) {
    page.set_u8(IS_ROOT_OFFSET, u8::from(is_root));
}

/// The parent page number. Meaningless for the root.
pub fn parent(page: &Page) -> PageNum {
    page.get_u32(PARENT_POINTER_OFFSET)
}

pub fn set_parent(page: &mut Page, parent: PageNum) {
    page.set_u32(PARENT_POINTER_OFFSET, parent);
}

/// The largest key recorded in this node: the last cell's key for a leaf, the last
/// cell key for an internal node. The right child of an internal node holds larger
/// keys, which the parent accounts for one level up.
pub fn node_max_key(page: &Page, page_num: PageNum) -> Result<u32> {
    match node_kind(page, page_num)? {
        NodeKind::Leaf => LeafNode::new(page_num, page).max_key(),
        NodeKind::Internal => InternalNode::new(page_num, page).max_key(),
    }
}

/// Encode a standalone leaf cell, used when cells are redistributed during a split
pub fn leaf_cell_bytes(key: u32, row: &Row) -> Vec<u8> {
    let mut cell = vec![0u8; LEAF_NODE_CELL_SIZE];
    cell[LEAF_NODE_KEY_OFFSET..LEAF_NODE_KEY_OFFSET + LEAF_NODE_KEY_SIZE]
        .copy_from_slice(&key.to_be_bytes());
    let mut value = [0u8; LEAF_NODE_VALUE_SIZE];
    row.encode(&mut value);
    cell[LEAF_NODE_VALUE_OFFSET..LEAF_NODE_VALUE_OFFSET + LEAF_NODE_VALUE_SIZE]
        .copy_from_slice(&value);
    cell
}

/// A view of a page as a leaf node
pub struct LeafNode<P> {
    page_num: PageNum,
    page: P,
}

impl<P: Deref<Target = Page>> LeafNode<P> {
    pub fn new(page_num: PageNum, page: P) -> Self {
        Self { page_num, page }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    pub fn num_cells(&self) -> u32 {
        self.page.get_u32(LEAF_NODE_NUM_CELLS_OFFSET)
    }

    pub fn is_full(&self) -> bool {
        self.num_cells() >= LEAF_NODE_MAX_CELLS
    }

    /// The next leaf to the right, or 0 if this is the rightmost leaf
    pub fn next_leaf(&self) -> PageNum {
        self.page.get_u32(LEAF_NODE_NEXT_LEAF_OFFSET)
    }

    pub fn key(&self, cell_num: u32) -> Result<u32> {
        let offset = self.cell_offset(cell_num)?;
        Ok(self.page.get_u32(offset + LEAF_NODE_KEY_OFFSET))
    }

    /// The encoded row stored in this cell
    pub fn value(&self, cell_num: u32) -> Result<&[u8; LEAF_NODE_VALUE_SIZE]> {
        let offset = self.cell_offset(cell_num)?;
        Ok(self.page.array(offset + LEAF_NODE_VALUE_OFFSET))
    }

    /// The whole cell, key and value
    pub fn cell(&self, cell_num: u32) -> Result<&[u8]> {
        let offset = self.cell_offset(cell_num)?;
        Ok(self.page.bytes(offset, LEAF_NODE_CELL_SIZE))
    }

    pub fn row(&self, cell_num: u32) -> Result<Row> {
        self.value(cell_num).map(Row::decode)
    }

    pub fn max_key(&self) -> Result<u32> {
        match self.num_cells().checked_sub(1) {
            Some(last) => self.key(last),
            None => Err(DbError::EmptyNode {
                page: self.page_num,
            }),
        }
    }

    /// Binary search for the first cell whose key is >= `key`.
    /// This is either the position of `key` or where it would be inserted.
    pub fn find(&self, key: u32) -> Result<u32> {
        let mut min_index = 0;
        let mut one_past_max_index = self.num_cells();
        while one_past_max_index != min_index {
            let index = (min_index + one_past_max_index) / 2;
            let key_at_index = self.key(index)?;
            if key == key_at_index {
                return Ok(index);
            }
            if key < key_at_index {
                one_past_max_index = index;
            } else {
                min_index = index + 1;
            }
        }
        Ok(min_index)
    }

    fn cell_offset(&self, cell_num: u32) -> Result<usize> {
        if cell_num >= LEAF_NODE_MAX_CELLS {
            return Err(DbError::CellOutOfBounds {
                page: self.page_num,
                cell: cell_num,
                max: LEAF_NODE_MAX_CELLS,
            });
        }
        Ok(LEAF_NODE_HEADER_SIZE + cell_num as usize * LEAF_NODE_CELL_SIZE)
    }
}

impl<'p> LeafNode<&'p Page> {
    /// Like [`LeafNode::value`], but borrows from the page rather than the view
    pub fn into_value(self, cell_num: u32) -> Result<&'p [u8; LEAF_NODE_VALUE_SIZE]> {
        let offset = self.cell_offset(cell_num)?;
        Ok(self.page.array(offset + LEAF_NODE_VALUE_OFFSET))
    }
}

impl<P: DerefMut<Target = Page>> LeafNode<P> {
    /// Format the page as an empty, non-root leaf with no right sibling
    pub fn initialize(&mut self) {
        self.page.clear();
        set_node_kind(&mut self.page, NodeKind::Leaf);
        set_root(&mut self.page, false);
        self.set_num_cells(0);
        self.set_next_leaf(0);
    }

    pub fn set_num_cells(&mut self, num_cells: u32) {
        self.page.set_u32(LEAF_NODE_NUM_CELLS_OFFSET, num_cells);
    }

    pub fn set_next_leaf(&mut self, next_leaf: PageNum) {
        self.page.set_u32(LEAF_NODE_NEXT_LEAF_OFFSET, next_leaf);
    }

    /// Overwrite a cell with a key and an encoded row
    pub fn write_cell(&mut self, cell_num: u32, key: u32, row: &Row) -> Result<()> {
        let offset = self.cell_offset(cell_num)?;
        self.page.set_u32(offset + LEAF_NODE_KEY_OFFSET, key);
        row.encode(self.page.array_mut(offset + LEAF_NODE_VALUE_OFFSET));
        Ok(())
    }

    /// Overwrite a cell with raw cell bytes taken from another leaf
    pub fn set_cell(&mut self, cell_num: u32, cell: &[u8]) -> Result<()> {
        let offset = self.cell_offset(cell_num)?;
        self.page
            .bytes_mut(offset, LEAF_NODE_CELL_SIZE)
            .copy_from_slice(cell);
        Ok(())
    }

    /// Shift the cells at and after `cell_num` one slot right and write the new
    /// cell into the gap. The caller has already checked the leaf is not full.
    pub fn insert(&mut self, cell_num: u32, key: u32, row: &Row) -> Result<()> {
        let num_cells = self.num_cells();
        if num_cells >= LEAF_NODE_MAX_CELLS || cell_num > num_cells {
            return Err(DbError::CellOutOfBounds {
                page: self.page_num,
                cell: cell_num.max(num_cells),
                max: LEAF_NODE_MAX_CELLS,
            });
        }
        if cell_num < num_cells {
            //  make room for the new cell
            let src = self.cell_offset(cell_num)?;
            let dest = self.cell_offset(cell_num + 1)?;
            let len = (num_cells - cell_num) as usize * LEAF_NODE_CELL_SIZE;
            self.page.copy_within(src, dest, len);
        }
        self.write_cell(cell_num, key, row)?;
        self.set_num_cells(num_cells + 1);
        Ok(())
    }
}

/// A view of a page as an internal node
pub struct InternalNode<P> {
    page_num: PageNum,
    page: P,
}

impl<P: Deref<Target = Page>> InternalNode<P> {
    pub fn new(page_num: PageNum, page: P) -> Self {
        Self { page_num, page }
    }

    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    pub fn num_keys(&self) -> u32 {
        self.page.get_u32(INTERNAL_NODE_NUM_KEYS_OFFSET)
    }

    pub fn is_full(&self) -> bool {
        self.num_keys() >= INTERNAL_NODE_MAX_CELLS
    }

    pub fn right_child(&self) -> PageNum {
        self.page.get_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    pub fn key(&self, key_num: u32) -> Result<u32> {
        let offset = self.cell_offset(key_num)?;
        Ok(self.page.get_u32(offset + INTERNAL_NODE_CHILD_SIZE))
    }

    /// The child pointer at `child_num`, where `child_num == num_keys` names the
    /// right child
    pub fn child(&self, child_num: u32) -> Result<PageNum> {
        let num_keys = self.num_keys();
        if child_num > num_keys {
            return Err(DbError::ChildIndexOutOfRange {
                page: self.page_num,
                index: child_num,
                key_count: num_keys,
            });
        }
        if child_num == num_keys {
            return Ok(self.right_child());
        }
        let offset = self.cell_offset(child_num)?;
        Ok(self.page.get_u32(offset))
    }

    pub fn max_key(&self) -> Result<u32> {
        match self.num_keys().checked_sub(1) {
            Some(last) => self.key(last),
            None => Err(DbError::EmptyNode {
                page: self.page_num,
            }),
        }
    }

    /// Binary search for the index of the child that should contain `key`: the first
    /// cell whose key is >= `key`, or `num_keys` (the right child) if there is none
    pub fn find_child(&self, key: u32) -> Result<u32> {
        let mut min_index = 0;
        let mut max_index = self.num_keys();
        while min_index != max_index {
            let index = (min_index + max_index) / 2;
            let key_to_right = self.key(index)?;
            if key_to_right >= key {
                max_index = index;
            } else {
                min_index = index + 1;
            }
        }
        Ok(min_index)
    }

    fn cell_offset(&self, cell_num: u32) -> Result<usize> {
        if cell_num >= INTERNAL_NODE_MAX_CELLS {
            return Err(DbError::CellOutOfBounds {
                page: self.page_num,
                cell: cell_num,
                max: INTERNAL_NODE_MAX_CELLS,
            });
        }
        Ok(INTERNAL_NODE_HEADER_SIZE + cell_num as usize * INTERNAL_NODE_CELL_SIZE)
    }
}

impl<P: DerefMut<Target = Page>> InternalNode<P> {
    /// Format the page as an empty, non-root internal node
    pub fn initialize(&mut self) {
        self.page.clear();
        set_node_kind(&mut self.page, NodeKind::Internal);
        set_root(&mut self.page, false);
        self.set_num_keys(0);
        self.set_right_child(0);
    }

    pub fn set_num_keys(&mut self, num_keys: u32) {
        self.page.set_u32(INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys);
    }

    pub fn set_right_child(&mut self, child: PageNum) {
        self.page.set_u32(INTERNAL_NODE_RIGHT_CHILD_OFFSET, child);
    }

    pub fn set_key(&mut self, key_num: u32, key: u32) -> Result<()> {
        let offset = self.cell_offset(key_num)?;
        self.page.set_u32(offset + INTERNAL_NODE_CHILD_SIZE, key);
        Ok(())
    }

    pub fn set_cell(&mut self, cell_num: u32, child: PageNum, key: u32) -> Result<()> {
        let offset = self.cell_offset(cell_num)?;
        self.page.set_u32(offset, child);
        self.page.set_u32(offset + INTERNAL_NODE_CHILD_SIZE, key);
        Ok(())
    }

    /// Shift the cells at and after `cell_num` one slot right and write
    /// `{child, key}` into the gap. Internal nodes cannot split, so a full node is
    /// a fatal error.
    pub fn insert_cell(&mut self, cell_num: u32, child: PageNum, key: u32) -> Result<()> {
        let num_keys = self.num_keys();
        if num_keys >= INTERNAL_NODE_MAX_CELLS {
            return Err(DbError::InternalNodeFull {
                page: self.page_num,
                max: INTERNAL_NODE_MAX_CELLS,
            });
        }
        if cell_num > num_keys {
            return Err(DbError::ChildIndexOutOfRange {
                page: self.page_num,
                index: cell_num,
                key_count: num_keys,
            });
        }
        if cell_num < num_keys {
            let src = self.cell_offset(cell_num)?;
            let dest = self.cell_offset(cell_num + 1)?;
            let len = (num_keys - cell_num) as usize * INTERNAL_NODE_CELL_SIZE;
            self.page.copy_within(src, dest, len);
        }
        self.set_cell(cell_num, child, key)?;
        self.set_num_keys(num_keys + 1);
        Ok(())
    }
}
