//! The B-tree algorithms over [`Table`]: descent, leaf insertion, leaf splitting
//! and root promotion.
//!
//! Leaves split 7/7 when a 14th cell arrives. A split of the root copies the old
//! root into a fresh page and turns page 0 into an internal node, so the root
//! never moves:
//! ```text
//!                  before                           after
//!
//!   page 0: leaf [k1 .. k13] + new key     page 0: internal [(left, max(left))] right
//!                                                     /                 \
//!                                          left: leaf [k1 .. k7]  -> right: leaf [k8 .. k14]
//! ```
//! Internal nodes do not split. A leaf split whose parent is already full is
//! turned away with [`InsertOutcome::TableFull`] before anything is modified.

use tracing::{debug, trace, warn};

use crate::{
    error::{DbError, Result},
    node::{
        self, leaf_cell_bytes, node_kind, node_max_key, InternalNode, LeafNode, NodeKind,
        LEAF_NODE_LEFT_SPLIT_COUNT, LEAF_NODE_RIGHT_SPLIT_COUNT,
    },
    pager::PageNum,
    row::Row,
    table::{InsertOutcome, Table},
};

impl Table {
    /// Descend from the root to the leaf that holds `key`, returning the leaf page and
    /// the cell where `key` is or would be inserted.
    pub(crate) fn find_position(&mut self, key: u32) -> Result<(PageNum, u32)> {
        let max_depth = self.pager.max_pages();
        let mut page_num = self.root_page_num;
        for _ in 0..max_depth {
            let page = self.pager.get_page(page_num)?;
            match node_kind(page, page_num)? {
                NodeKind::Leaf => {
                    let cell_num = LeafNode::new(page_num, page).find(key)?;
                    trace!(key, page_num, cell_num, "found leaf position");
                    return Ok((page_num, cell_num));
                }
                NodeKind::Internal => {
                    let node = InternalNode::new(page_num, page);
                    let child_index = node.find_child(key)?;
                    page_num = node.child(child_index)?;
                }
            }
        }
        Err(DbError::TreeTooDeep { max_depth })
    }

    /// Insert a row keyed by its id
    pub fn insert(&mut self, row: &Row) -> Result<InsertOutcome> {
        let key = row.id();
        let (page_num, cell_num) = self.find_position(key)?;

        let page = self.pager.get_page(page_num)?;
        let leaf = LeafNode::new(page_num, page);
        if cell_num < leaf.num_cells() && leaf.key(cell_num)? == key {
            debug!(key, "duplicate key");
            return Ok(InsertOutcome::DuplicateKey);
        }
        let needs_split = leaf.is_full();
        let leaf_is_root = node::is_root(page);
        let parent_page_num = node::parent(page);

        if needs_split && !leaf_is_root {
            let parent_page = self.pager.get_page(parent_page_num)?;
            if InternalNode::new(parent_page_num, parent_page).is_full() {
                warn!(
                    key,
                    leaf = page_num,
                    parent = parent_page_num,
                    "leaf split would overflow its parent, table full"
                );
                return Ok(InsertOutcome::TableFull);
            }
        }

        self.leaf_insert(page_num, cell_num, key, row)?;
        Ok(InsertOutcome::Success)
    }

    fn leaf_insert(&mut self, page_num: PageNum, cell_num: u32, key: u32, row: &Row) -> Result<()> {
        let page = self.pager.get_page_mut(page_num)?;
        let mut leaf = LeafNode::new(page_num, page);
        if leaf.is_full() {
            return self.leaf_split_and_insert(page_num, cell_num, key, row);
        }
        leaf.insert(cell_num, key, row)
    }

    /// Split a full leaf in two and insert the new cell into whichever half it sorts
    /// into. The lower half stays in place, the upper half moves to a new page that
    /// becomes the old leaf's right sibling.
    fn leaf_split_and_insert(
        &mut self,
        old_page_num: PageNum,
        cell_num: u32,
        key: u32,
        row: &Row,
    ) -> Result<()> {
        let old_page = self.pager.get_page(old_page_num)?;
        let was_root = node::is_root(old_page);
        let parent_page_num = node::parent(old_page);
        let old_leaf = LeafNode::new(old_page_num, old_page);
        let old_max = old_leaf.max_key()?;
        let old_next = old_leaf.next_leaf();

        let mut cells = (0..old_leaf.num_cells())
            .map(|i| old_leaf.cell(i).map(<[u8]>::to_vec))
            .collect::<Result<Vec<_>>>()?;
        cells.insert(cell_num as usize, leaf_cell_bytes(key, row));

        //  a root split needs a second page for the copy of the old root
        let new_page_num = self.pager.allocate_page_num();
        let last_needed = if was_root {
            new_page_num + 1
        } else {
            new_page_num
        };
        if last_needed >= self.pager.max_pages() {
            return Err(DbError::PageOutOfBounds {
                page: last_needed,
                max: self.pager.max_pages(),
            });
        }
        debug!(key, old_page_num, new_page_num, was_root, "splitting leaf");

        let (left_cells, right_cells) = cells.split_at(LEAF_NODE_LEFT_SPLIT_COUNT as usize);
        debug_assert_eq!(right_cells.len(), LEAF_NODE_RIGHT_SPLIT_COUNT as usize);

        let new_page = self.pager.get_page_mut(new_page_num)?;
        let mut new_leaf = LeafNode::new(new_page_num, &mut *new_page);
        new_leaf.initialize();
        for (i, cell) in right_cells.iter().enumerate() {
            new_leaf.set_cell(i as u32, cell)?;
        }
        new_leaf.set_num_cells(right_cells.len() as u32);
        new_leaf.set_next_leaf(old_next);
        node::set_parent(new_page, parent_page_num);

        let old_page = self.pager.get_page_mut(old_page_num)?;
        let mut old_leaf = LeafNode::new(old_page_num, old_page);
        for (i, cell) in left_cells.iter().enumerate() {
            old_leaf.set_cell(i as u32, cell)?;
        }
        old_leaf.set_num_cells(left_cells.len() as u32);
        old_leaf.set_next_leaf(new_page_num);
        let new_old_max = old_leaf.max_key()?;

        if was_root {
            return self.make_new_root(new_page_num);
        }
        self.update_internal_node_key(parent_page_num, old_max, new_old_max)?;
        self.internal_node_insert(parent_page_num, new_page_num)
    }

    /// Promote a split root. The old root's contents move to a newly allocated left
    /// child, and the root page is rewritten as an internal node over the left child
    /// and `right_child_page_num`.
    fn make_new_root(&mut self, right_child_page_num: PageNum) -> Result<()> {
        let root_page_num = self.root_page_num;
        let left_child_page_num = self.pager.allocate_page_num();
        let root_copy = self.pager.get_page(root_page_num)?.clone();

        let left_page = self.pager.get_page_mut(left_child_page_num)?;
        *left_page = root_copy;
        node::set_root(left_page, false);
        node::set_parent(left_page, root_page_num);
        let left_max = node_max_key(left_page, left_child_page_num)?;

        let root_page = self.pager.get_page_mut(root_page_num)?;
        let mut root = InternalNode::new(root_page_num, &mut *root_page);
        root.initialize();
        root.insert_cell(0, left_child_page_num, left_max)?;
        root.set_right_child(right_child_page_num);
        node::set_root(root_page, true);

        let right_page = self.pager.get_page_mut(right_child_page_num)?;
        node::set_parent(right_page, root_page_num);

        debug!(
            left = left_child_page_num,
            right = right_child_page_num,
            left_max,
            "created new root"
        );
        Ok(())
    }

    /// Replace the separator for a child whose max key changed. A child reached
    /// through the right pointer has no separator, so there is nothing to update.
    fn update_internal_node_key(
        &mut self,
        page_num: PageNum,
        old_key: u32,
        new_key: u32,
    ) -> Result<()> {
        let page = self.pager.get_page_mut(page_num)?;
        let mut node = InternalNode::new(page_num, page);
        let index = node.find_child(old_key)?;
        if index < node.num_keys() {
            node.set_key(index, new_key)?;
        }
        Ok(())
    }

    /// Add a `{child, max key}` entry for a freshly split leaf. If the child sorts
    /// after the current right child it takes over the right pointer and the old
    /// right child moves into the cells.
    fn internal_node_insert(&mut self, parent_page_num: PageNum, child_page_num: PageNum) -> Result<()> {
        let child_max = node_max_key(self.pager.get_page(child_page_num)?, child_page_num)?;

        let parent_page = self.pager.get_page(parent_page_num)?;
        let parent = InternalNode::new(parent_page_num, parent_page);
        if parent.is_full() {
            return Err(DbError::InternalNodeFull {
                page: parent_page_num,
                max: node::INTERNAL_NODE_MAX_CELLS,
            });
        }
        let index = parent.find_child(child_max)?;
        let num_keys = parent.num_keys();
        let right_child_page_num = parent.right_child();
        let right_max = node_max_key(
            self.pager.get_page(right_child_page_num)?,
            right_child_page_num,
        )?;

        let parent_page = self.pager.get_page_mut(parent_page_num)?;
        let mut parent = InternalNode::new(parent_page_num, parent_page);
        if child_max > right_max {
            parent.insert_cell(num_keys, right_child_page_num, right_max)?;
            parent.set_right_child(child_page_num);
        } else {
            parent.insert_cell(index, child_page_num, child_max)?;
        }
        Ok(())
    }

    /// Render the tree rooted at the root page, two spaces of indentation per level
    pub fn print_tree(&mut self) -> Result<String> {
        let mut result = String::new();
        let depth_budget = self.pager.max_pages();
        self.print_node(self.root_page_num, 0, depth_budget, &mut result)?;
        Ok(result)
    }

    fn print_node(
        &mut self,
        page_num: PageNum,
        level: usize,
        depth_budget: u32,
        result: &mut String,
    ) -> Result<()> {
        if depth_budget == 0 {
            return Err(DbError::TreeTooDeep {
                max_depth: self.pager.max_pages(),
            });
        }
        let indent = "  ".repeat(level);
        let page = self.pager.get_page(page_num)?;
        match node_kind(page, page_num)? {
            NodeKind::Leaf => {
                let leaf = LeafNode::new(page_num, page);
                let num_cells = leaf.num_cells();
                result.push_str(&format!("{indent}- leaf (size {num_cells})\n"));
                for i in 0..num_cells {
                    result.push_str(&format!("{indent}  - {}\n", leaf.key(i)?));
                }
            }
            NodeKind::Internal => {
                let node = InternalNode::new(page_num, page);
                let num_keys = node.num_keys();
                let entries = (0..num_keys)
                    .map(|i| -> Result<(PageNum, u32)> { Ok((node.child(i)?, node.key(i)?)) })
                    .collect::<Result<Vec<_>>>()?;
                let right_child = node.right_child();

                result.push_str(&format!("{indent}- internal (size {num_keys})\n"));
                for (child, key) in entries {
                    self.print_node(child, level + 1, depth_budget - 1, result)?;
                    result.push_str(&format!("{indent}  - key {key}\n"));
                }
                if num_keys > 0 {
                    self.print_node(right_child, level + 1, depth_budget - 1, result)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod btree_tests {
    use super::*;
    use crate::{
        node::{INTERNAL_NODE_MAX_CELLS, LEAF_NODE_MAX_CELLS},
        table::TableOptions,
        test_utils::TestDir,
    };

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{id}"), &format!("person{id}@example.com")).unwrap()
    }

    fn setup() -> (TestDir, Table) {
        let dir = TestDir::new();
        let table = Table::open(dir.db_file()).unwrap();
        (dir, table)
    }

    fn leaf_keys(table: &mut Table, page_num: PageNum) -> Vec<u32> {
        let page = table.pager.get_page(page_num).unwrap();
        let leaf = LeafNode::new(page_num, page);
        (0..leaf.num_cells()).map(|i| leaf.key(i).unwrap()).collect()
    }

    #[test]
    fn test_find_position_in_root_leaf() {
        let (_dir, mut table) = setup();
        for id in [10, 30, 20] {
            assert_eq!(table.insert(&row(id)).unwrap(), InsertOutcome::Success);
        }
        assert_eq!(table.find_position(20).unwrap(), (0, 1));
        assert_eq!(table.find_position(25).unwrap(), (0, 2));
        assert_eq!(table.find_position(99).unwrap(), (0, 3));
    }

    #[test]
    fn test_duplicate_leaves_tree_untouched() {
        let (_dir, mut table) = setup();
        table.insert(&row(1)).unwrap();
        let before = table.pager.get_page(0).unwrap().clone();

        let other = Row::new(1, "someone", "else@example.com").unwrap();
        assert_eq!(table.insert(&other).unwrap(), InsertOutcome::DuplicateKey);
        assert_eq!(table.pager.get_page(0).unwrap(), &before);
    }

    #[test]
    fn test_root_split_layout() {
        let (_dir, mut table) = setup();
        for id in 1..=LEAF_NODE_MAX_CELLS + 1 {
            table.insert(&row(id)).unwrap();
        }

        //  page 1 is the new right leaf, page 2 the copy of the old root
        let root = table.pager.get_page(0).unwrap();
        assert!(node::is_root(root));
        assert_eq!(node_kind(root, 0).unwrap(), NodeKind::Internal);
        let root = InternalNode::new(0, root);
        assert_eq!(root.num_keys(), 1);
        assert_eq!(root.child(0).unwrap(), 2);
        assert_eq!(root.key(0).unwrap(), 7);
        assert_eq!(root.right_child(), 1);

        assert_eq!(leaf_keys(&mut table, 2), (1..=7).collect::<Vec<_>>());
        assert_eq!(leaf_keys(&mut table, 1), (8..=14).collect::<Vec<_>>());

        let left = table.pager.get_page(2).unwrap();
        assert!(!node::is_root(left));
        assert_eq!(node::parent(left), 0);
        assert_eq!(LeafNode::new(2, left).next_leaf(), 1);
        let right = table.pager.get_page(1).unwrap();
        assert_eq!(node::parent(right), 0);
        assert_eq!(LeafNode::new(1, right).next_leaf(), 0);
    }

    #[test]
    fn test_split_of_right_child_takes_over_right_pointer() {
        let (_dir, mut table) = setup();
        //  two leaves: [1..7] on page 2 and [101..107] on page 1
        for id in (1..=7).chain(101..=107) {
            table.insert(&row(id)).unwrap();
        }
        for id in 8..=14 {
            assert_eq!(table.insert(&row(id)).unwrap(), InsertOutcome::Success);
        }

        let root = InternalNode::new(0, table.pager.get_page(0).unwrap());
        assert_eq!(root.num_keys(), 2);
        assert_eq!((root.child(0).unwrap(), root.key(0).unwrap()), (2, 7));
        assert_eq!((root.child(1).unwrap(), root.key(1).unwrap()), (1, 14));
        assert_eq!(root.right_child(), 3);

        assert_eq!(leaf_keys(&mut table, 1), (8..=14).collect::<Vec<_>>());
        assert_eq!(leaf_keys(&mut table, 3), (101..=107).collect::<Vec<_>>());
        let next_leaves: Vec<PageNum> = [2, 1, 3]
            .into_iter()
            .map(|n| LeafNode::new(n, table.pager.get_page(n).unwrap()).next_leaf())
            .collect();
        assert_eq!(next_leaves, vec![1, 3, 0]);
    }

    #[test]
    fn test_split_of_middle_leaf_updates_separator() {
        let (_dir, mut table) = setup();
        //  two leaves: [10, 20 .. 70] on page 2 and [101..107] on page 1
        for id in (10..=70).step_by(10).chain(101..=107) {
            table.insert(&row(id)).unwrap();
        }
        //  fill the left leaf, then split it
        for id in 11..=17 {
            assert_eq!(table.insert(&row(id)).unwrap(), InsertOutcome::Success);
        }

        let root = InternalNode::new(0, table.pager.get_page(0).unwrap());
        assert_eq!(root.num_keys(), 2);
        assert_eq!((root.child(0).unwrap(), root.key(0).unwrap()), (2, 16));
        assert_eq!((root.child(1).unwrap(), root.key(1).unwrap()), (3, 70));
        assert_eq!(root.right_child(), 1);

        assert_eq!(leaf_keys(&mut table, 2), (10..=16).collect::<Vec<_>>());
        assert_eq!(
            leaf_keys(&mut table, 3),
            vec![17, 20, 30, 40, 50, 60, 70]
        );
        let next_leaves: Vec<PageNum> = [2, 3, 1]
            .into_iter()
            .map(|n| LeafNode::new(n, table.pager.get_page(n).unwrap()).next_leaf())
            .collect();
        assert_eq!(next_leaves, vec![3, 1, 0]);
    }

    #[test]
    fn test_table_full_leaves_tree_untouched() {
        let (_dir, mut table) = setup();
        let mut id = 0;
        //  ascending inserts split the rightmost leaf until the root is full
        loop {
            id += 1;
            table.insert(&row(id)).unwrap();
            let root = table.pager.get_page(0).unwrap();
            if node_kind(root, 0).unwrap() == NodeKind::Internal
                && InternalNode::new(0, root).is_full()
            {
                break;
            }
        }
        let right_child = InternalNode::new(0, table.pager.get_page(0).unwrap()).right_child();
        while leaf_keys(&mut table, right_child).len() < LEAF_NODE_MAX_CELLS as usize {
            id += 1;
            table.insert(&row(id)).unwrap();
        }

        let num_pages = table.pager.num_pages();
        let root_before = table.pager.get_page(0).unwrap().clone();
        assert_eq!(table.insert(&row(id + 1)).unwrap(), InsertOutcome::TableFull);
        assert_eq!(table.pager.num_pages(), num_pages);
        assert_eq!(table.pager.get_page(0).unwrap(), &root_before);
        assert_eq!(
            InternalNode::new(0, table.pager.get_page(0).unwrap()).num_keys(),
            INTERNAL_NODE_MAX_CELLS
        );
    }

    #[test]
    fn test_split_without_page_budget_fails_before_mutating() {
        let dir = TestDir::new();
        let mut table = Table::open_with(dir.db_file(), TableOptions { max_pages: 2 }).unwrap();
        for id in 1..=LEAF_NODE_MAX_CELLS {
            table.insert(&row(id)).unwrap();
        }
        let before = table.pager.get_page(0).unwrap().clone();

        assert!(matches!(
            table.insert(&row(100)),
            Err(DbError::PageOutOfBounds { page: 2, max: 2 })
        ));
        assert_eq!(table.pager.get_page(0).unwrap(), &before);
    }

    #[test]
    fn test_print_tree() {
        let (_dir, mut table) = setup();
        for id in [3, 1, 2] {
            table.insert(&row(id)).unwrap();
        }
        assert_eq!(
            table.print_tree().unwrap(),
            "- leaf (size 3)\n  - 1\n  - 2\n  - 3\n"
        );

        for id in 4..=14 {
            table.insert(&row(id)).unwrap();
        }
        let mut expected = String::from("- internal (size 1)\n  - leaf (size 7)\n");
        for id in 1..=7 {
            expected.push_str(&format!("    - {id}\n"));
        }
        expected.push_str("  - key 7\n  - leaf (size 7)\n");
        for id in 8..=14 {
            expected.push_str(&format!("    - {id}\n"));
        }
        assert_eq!(table.print_tree().unwrap(), expected);
    }

    #[test]
    fn test_cyclic_tree_is_detected() {
        let (_dir, mut table) = setup();
        let page = table.pager.get_page_mut(0).unwrap();
        let mut root = InternalNode::new(0, &mut *page);
        root.initialize();
        root.insert_cell(0, 0, 10).unwrap();
        root.set_right_child(0);
        node::set_root(page, true);

        assert!(matches!(
            table.find_position(5),
            Err(DbError::TreeTooDeep { .. })
        ));
        assert!(matches!(
            table.print_tree(),
            Err(DbError::TreeTooDeep { .. })
        ));
    }
}
