//! B+ tree search, insertion, and removal.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;
use vellum_common::error::StorageResult;
use vellum_common::types::{PageId, Rid};

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::page::{
    HeaderView, IndexKey, InternalView, LeafView, PageType, RemoveOutcome, INTERNAL_CAPACITY,
};

use super::IndexIterator;

/// Write-latch accumulator for pessimistic traversals.
///
/// Holds the header guard until a safe node proves the root cannot change,
/// and the chain of ancestor guards down to the current node. Clearing the
/// set releases ancestors oldest-first.
struct Context {
    header: Option<WritePageGuard>,
    write_set: VecDeque<WritePageGuard>,
}

/// A concurrent B+ tree mapping `IndexKey` to `Rid`.
///
/// `T` is the tombstone buffer capacity of each leaf; at `T = 0` removals
/// are physical.
pub struct BPlusTree<const T: usize> {
    bpm: Arc<BufferPoolManager>,
    header_page_id: PageId,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<const T: usize> BPlusTree<T> {
    /// Creates an empty tree, allocating its header page.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> StorageResult<Self> {
        assert!(leaf_max_size >= 2 && leaf_max_size <= crate::page::leaf_capacity(T));
        assert!(internal_max_size >= 3 && internal_max_size < INTERNAL_CAPACITY);

        let mut guard = bpm.new_page()?;
        HeaderView::init(guard.data_mut());
        let header_page_id = guard.page_id();
        drop(guard);

        Ok(Self {
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
        })
    }

    /// The page holding this tree's root pointer.
    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Whether the tree holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        !self.root_page_id().is_valid()
    }

    /// Current root page id, `PageId::INVALID` when empty.
    pub fn root_page_id(&self) -> PageId {
        match self.bpm.read_page(self.header_page_id) {
            Ok(guard) => HeaderView::new(guard.data()).root_page_id(),
            Err(_) => PageId::INVALID,
        }
    }

    /// Point lookup. Returns `None` for absent or tombstoned keys, and on
    /// allocation failure.
    pub fn get_value(&self, key: IndexKey) -> Option<Rid> {
        self.try_get(key).unwrap_or(None)
    }

    /// Inserts a unique key. Returns false on a live duplicate or when the
    /// buffer pool cannot produce a frame.
    pub fn insert(&self, key: IndexKey, rid: Rid) -> bool {
        self.try_insert(key, rid).unwrap_or(false)
    }

    /// Removes a key. Returns true iff the tree changed: false for keys
    /// that are absent or already tombstoned.
    pub fn remove(&self, key: IndexKey) -> bool {
        self.try_remove(key).unwrap_or(false)
    }

    /// Forward iterator from the smallest live key.
    pub fn iter(&self) -> IndexIterator<T> {
        self.try_iter()
            .unwrap_or_else(|_| IndexIterator::end(Arc::clone(&self.bpm)))
    }

    /// Forward iterator from the smallest live key `>= key`.
    pub fn iter_from(&self, key: IndexKey) -> IndexIterator<T> {
        self.try_iter_from(key)
            .unwrap_or_else(|_| IndexIterator::end(Arc::clone(&self.bpm)))
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    fn try_get(&self, key: IndexKey) -> StorageResult<Option<Rid>> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = HeaderView::new(header_guard.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(None);
        }
        // Crab: latch the root before releasing the header so the observed
        // root cannot go stale.
        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);

        while PageType::of(guard.data()) != Some(PageType::Leaf) {
            let child_id = InternalView::new(guard.data()).lookup(key);
            guard = self.bpm.read_page(child_id)?;
        }

        let leaf = LeafView::<_, T>::new(guard.data());
        match leaf.lookup(key) {
            Some(idx) if !leaf.is_tombstone(idx) => Ok(Some(leaf.rid_at(idx))),
            _ => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    fn try_insert(&self, key: IndexKey, rid: Rid) -> StorageResult<bool> {
        // Empty tree: start one under the header write latch.
        {
            let header_guard = self.bpm.read_page(self.header_page_id)?;
            let root_id = HeaderView::new(header_guard.data()).root_page_id();
            drop(header_guard);
            if !root_id.is_valid() {
                let mut header_guard = self.bpm.write_page(self.header_page_id)?;
                if !HeaderView::new(header_guard.data()).root_page_id().is_valid() {
                    let mut root_guard = self.bpm.new_page()?;
                    let mut leaf =
                        LeafView::<_, T>::init(root_guard.data_mut(), self.leaf_max_size);
                    let inserted = leaf.insert(key, rid);
                    let root_id = root_guard.page_id();
                    HeaderView::new(header_guard.data_mut()).set_root_page_id(root_id);
                    return Ok(inserted);
                }
            }
        }

        if let Some(result) = self.insert_optimistic(key, rid)? {
            return Ok(result);
        }
        self.insert_pessimistic(key, rid)
    }

    /// Read-crabs to the leaf and write-latches it alone. Succeeds only if
    /// the leaf is safe for insertion in isolation.
    fn insert_optimistic(&self, key: IndexKey, rid: Rid) -> StorageResult<Option<bool>> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = HeaderView::new(header_guard.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(None);
        }
        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);

        // A leaf root cannot be latch-upgraded; take the pessimistic path.
        if PageType::of(guard.data()) == Some(PageType::Leaf) {
            return Ok(None);
        }

        loop {
            let child_id = InternalView::new(guard.data()).lookup(key);
            let child_guard = self.bpm.read_page(child_id)?;

            if PageType::of(child_guard.data()) == Some(PageType::Leaf) {
                // Re-acquire the leaf exclusively; the parent read latch
                // pins the subtree shape while we do.
                drop(child_guard);
                let mut leaf_guard = self.bpm.write_page(child_id)?;
                drop(guard);

                let (size, max) = {
                    let leaf = LeafView::<_, T>::new(leaf_guard.data());
                    (leaf.size(), leaf.max_size())
                };
                if size < max - 1 {
                    let mut leaf = LeafView::<_, T>::new(leaf_guard.data_mut());
                    return Ok(Some(leaf.insert(key, rid)));
                }
                return Ok(None);
            }

            guard = child_guard;
        }
    }

    fn insert_pessimistic(&self, key: IndexKey, rid: Rid) -> StorageResult<bool> {
        let mut ctx = Context {
            header: Some(self.bpm.write_page(self.header_page_id)?),
            write_set: VecDeque::new(),
        };

        let root_id = {
            let header = ctx.header.as_ref().expect("header latched");
            HeaderView::new(header.data()).root_page_id()
        };
        if !root_id.is_valid() {
            // The tree emptied between the optimistic attempt and now.
            let mut root_guard = self.bpm.new_page()?;
            let mut leaf = LeafView::<_, T>::init(root_guard.data_mut(), self.leaf_max_size);
            let inserted = leaf.insert(key, rid);
            let new_root = root_guard.page_id();
            let header = ctx.header.as_mut().expect("header latched");
            HeaderView::new(header.data_mut()).set_root_page_id(new_root);
            return Ok(inserted);
        }

        let guard = self.bpm.write_page(root_id)?;
        if Self::insert_safe(guard.data()) {
            ctx.header = None;
        }
        ctx.write_set.push_back(guard);

        loop {
            let back = ctx.write_set.back().expect("descent holds current node");
            if PageType::of(back.data()) == Some(PageType::Leaf) {
                break;
            }
            let child_id = InternalView::new(back.data()).lookup(key);
            let child_guard = self.bpm.write_page(child_id)?;
            if Self::insert_safe(child_guard.data()) {
                ctx.header = None;
                ctx.write_set.clear();
            }
            ctx.write_set.push_back(child_guard);
        }

        // Duplicates (live or tombstoned) never need a split.
        {
            let leaf_guard = ctx.write_set.back_mut().expect("leaf latched");
            let found = {
                let leaf = LeafView::<_, T>::new(leaf_guard.data());
                leaf.lookup(key).map(|idx| (idx, leaf.is_tombstone(idx)))
            };
            match found {
                Some((_, false)) => return Ok(false),
                Some((idx, true)) => {
                    let mut leaf = LeafView::<_, T>::new(leaf_guard.data_mut());
                    leaf.remove_tombstone(idx);
                    leaf.set_rid_at(idx, rid);
                    return Ok(true);
                }
                None => {}
            }
        }

        let leaf_full = {
            let leaf_guard = ctx.write_set.back().expect("leaf latched");
            let leaf = LeafView::<_, T>::new(leaf_guard.data());
            leaf.size() == leaf.max_size()
        };

        if !leaf_full {
            let leaf_guard = ctx.write_set.back_mut().expect("leaf latched");
            let mut leaf = LeafView::<_, T>::new(leaf_guard.data_mut());
            return Ok(leaf.insert(key, rid));
        }

        // Split the leaf, keep the lower half in place, and link the new
        // sibling before any latch is released.
        let mut new_leaf_guard = self.bpm.new_page()?;
        let new_leaf_id = new_leaf_guard.page_id();
        let separator = {
            let leaf_guard = ctx.write_set.back_mut().expect("leaf latched");
            let mut new_leaf =
                LeafView::<_, T>::init(new_leaf_guard.data_mut(), self.leaf_max_size);
            let mut leaf = LeafView::<_, T>::new(leaf_guard.data_mut());
            leaf.move_half_to(&mut new_leaf);
            leaf.set_next_page_id(new_leaf_id);

            let separator = new_leaf.key_at(0);
            if key >= separator {
                new_leaf.insert(key, rid);
            } else {
                leaf.insert(key, rid);
            }
            separator
        };
        drop(new_leaf_guard);
        debug!(leaf = %new_leaf_id, key, "leaf split");

        self.insert_into_parent(&mut ctx, separator, new_leaf_id)?;
        Ok(true)
    }

    /// Propagates a split upward: links `(separator, new_child)` into the
    /// parent of the node at the top of the write set, splitting ancestors
    /// and growing a new root as needed.
    fn insert_into_parent(
        &self,
        ctx: &mut Context,
        mut separator: IndexKey,
        mut new_child: PageId,
    ) -> StorageResult<()> {
        loop {
            if ctx.write_set.len() == 1 {
                // The root itself split.
                let left_id = ctx.write_set.back().expect("root latched").page_id();
                let mut new_root_guard = self.bpm.new_page()?;
                let new_root_id = new_root_guard.page_id();
                let mut new_root =
                    InternalView::init(new_root_guard.data_mut(), self.internal_max_size);
                new_root.populate_new_root(left_id, separator, new_child);

                let header = ctx
                    .header
                    .as_mut()
                    .expect("root split retains the header latch");
                HeaderView::new(header.data_mut()).set_root_page_id(new_root_id);
                debug!(root = %new_root_id, "new root");
                return Ok(());
            }

            let child_guard = ctx.write_set.pop_back().expect("split node latched");
            let left_id = child_guard.page_id();
            drop(child_guard);

            let parent_guard = ctx.write_set.back_mut().expect("parent latched");
            let overflow = {
                let mut parent = InternalView::new(parent_guard.data_mut());
                parent.insert_node_after(left_id, separator, new_child);
                parent.size() > parent.max_size()
            };
            if !overflow {
                return Ok(());
            }

            let mut new_internal_guard = self.bpm.new_page()?;
            let new_internal_id = new_internal_guard.page_id();
            {
                let mut new_internal =
                    InternalView::init(new_internal_guard.data_mut(), self.internal_max_size);
                let mut parent = InternalView::new(parent_guard.data_mut());
                parent.move_half_to(&mut new_internal);
                separator = new_internal.key_at(0);
            }
            new_child = new_internal_id;
            debug!(node = %new_internal_id, "internal split");
            // The parent is now the node that split; loop to its parent.
        }
    }

    // -------------------------------------------------------------------------
    // Removal
    // -------------------------------------------------------------------------

    fn try_remove(&self, key: IndexKey) -> StorageResult<bool> {
        match self.remove_optimistic(key)? {
            Some(changed) => Ok(changed),
            None => self.remove_pessimistic(key),
        }
    }

    fn remove_optimistic(&self, key: IndexKey) -> StorageResult<Option<bool>> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = HeaderView::new(header_guard.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(Some(false));
        }
        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);

        if PageType::of(guard.data()) == Some(PageType::Leaf) {
            return Ok(None);
        }

        loop {
            let child_id = InternalView::new(guard.data()).lookup(key);
            let child_guard = self.bpm.read_page(child_id)?;

            if PageType::of(child_guard.data()) == Some(PageType::Leaf) {
                drop(child_guard);
                let mut leaf_guard = self.bpm.write_page(child_id)?;
                drop(guard);

                let safe = {
                    let leaf = LeafView::<_, T>::new(leaf_guard.data());
                    leaf.size() > leaf.min_size()
                };
                if !safe {
                    return Ok(None);
                }
                let mut leaf = LeafView::<_, T>::new(leaf_guard.data_mut());
                return Ok(Some(leaf.remove(key) == RemoveOutcome::Removed));
            }

            guard = child_guard;
        }
    }

    fn remove_pessimistic(&self, key: IndexKey) -> StorageResult<bool> {
        let mut deleted_pages = Vec::new();
        let changed = {
            let mut ctx = Context {
                header: Some(self.bpm.write_page(self.header_page_id)?),
                write_set: VecDeque::new(),
            };

            let root_id = {
                let header = ctx.header.as_ref().expect("header latched");
                HeaderView::new(header.data()).root_page_id()
            };
            if !root_id.is_valid() {
                return Ok(false);
            }

            let guard = self.bpm.write_page(root_id)?;
            if Self::remove_safe(guard.data()) {
                ctx.header = None;
            }
            ctx.write_set.push_back(guard);

            loop {
                let back = ctx.write_set.back().expect("descent holds current node");
                if PageType::of(back.data()) == Some(PageType::Leaf) {
                    break;
                }
                let child_id = InternalView::new(back.data()).lookup(key);
                let child_guard = self.bpm.write_page(child_id)?;
                if Self::remove_safe(child_guard.data()) {
                    ctx.header = None;
                    ctx.write_set.clear();
                }
                ctx.write_set.push_back(child_guard);
            }

            let outcome = {
                let leaf_guard = ctx.write_set.back_mut().expect("leaf latched");
                let mut leaf = LeafView::<_, T>::new(leaf_guard.data_mut());
                leaf.remove(key)
            };
            if outcome != RemoveOutcome::Removed {
                return Ok(false);
            }

            let underflow = {
                let leaf_guard = ctx.write_set.back().expect("leaf latched");
                let leaf = LeafView::<_, T>::new(leaf_guard.data());
                leaf.size() < leaf.min_size()
            };
            if underflow {
                self.resolve_underflow(&mut ctx, &mut deleted_pages)?;
            }
            true
        };

        // All latches are released; retired pages can now be dropped.
        for page_id in deleted_pages {
            let _ = self.bpm.delete_page(page_id);
        }
        Ok(changed)
    }

    /// Walks the write set upward, merging or redistributing until every
    /// node is back within bounds. Root collapse is handled at the top.
    fn resolve_underflow(
        &self,
        ctx: &mut Context,
        deleted_pages: &mut Vec<PageId>,
    ) -> StorageResult<()> {
        loop {
            if ctx.write_set.len() == 1 {
                self.collapse_root(ctx, deleted_pages);
                return Ok(());
            }

            let (node_size, node_min) = {
                let back = ctx.write_set.back().expect("node latched");
                Self::size_and_min(back.data())
            };
            if node_size >= node_min {
                return Ok(());
            }

            let node_guard = ctx.write_set.pop_back().expect("node latched");
            let node_id = node_guard.page_id();
            let parent_guard = ctx.write_set.back_mut().expect("parent latched");

            let (idx, sibling_id) = {
                let parent = InternalView::new(parent_guard.data());
                let idx = parent
                    .child_index(node_id)
                    .expect("underflowed node is linked from its parent");
                let sibling_idx = if idx == 0 { 1 } else { idx - 1 };
                (idx, parent.child_at(sibling_idx))
            };
            // The parent's write latch is already held, which linearizes
            // this sibling acquisition against every other mutator.
            let sibling_guard = self.bpm.write_page(sibling_id)?;

            let (sibling_size, sibling_min) = Self::size_and_min(sibling_guard.data());
            let node_is_leaf = PageType::of(node_guard.data()) == Some(PageType::Leaf);

            if sibling_size > sibling_min {
                // Redistribute one entry across the boundary.
                self.redistribute(parent_guard, node_guard, sibling_guard, idx, node_is_leaf);
                return Ok(());
            }

            // Merge right-hand node into left-hand node.
            let dead = self.merge(parent_guard, node_guard, sibling_guard, idx, node_is_leaf);
            deleted_pages.push(dead);
            debug!(page = %dead, "merged node");
            // The parent lost an entry; continue with it as the node.
        }
    }

    fn collapse_root(&self, ctx: &mut Context, deleted_pages: &mut Vec<PageId>) {
        let root_guard = ctx.write_set.back_mut().expect("root latched");
        let root_id = root_guard.page_id();

        if PageType::of(root_guard.data()) == Some(PageType::Leaf) {
            let empty = LeafView::<_, T>::new(root_guard.data()).size() == 0;
            if empty {
                let header = ctx.header.as_mut().expect("root change retains header");
                HeaderView::new(header.data_mut()).set_root_page_id(PageId::INVALID);
                deleted_pages.push(root_id);
                debug!("tree emptied");
            }
        } else {
            let view = InternalView::new(root_guard.data());
            if view.size() == 1 {
                let only_child = view.child_at(0);
                let header = ctx.header.as_mut().expect("root change retains header");
                HeaderView::new(header.data_mut()).set_root_page_id(only_child);
                deleted_pages.push(root_id);
                debug!(root = %only_child, "root collapsed");
            }
        }
    }

    /// Borrows one entry from `sibling` into `node` and refreshes the
    /// parent separator. `idx` is the node's child position; at 0 the
    /// sibling is the right neighbour, otherwise the left.
    fn redistribute(
        &self,
        parent_guard: &mut WritePageGuard,
        mut node_guard: WritePageGuard,
        mut sibling_guard: WritePageGuard,
        idx: usize,
        node_is_leaf: bool,
    ) {
        if idx == 0 {
            // Sibling is the right neighbour: take its first entry.
            if node_is_leaf {
                let mut node = LeafView::<_, T>::new(node_guard.data_mut());
                let mut sibling = LeafView::<_, T>::new(sibling_guard.data_mut());
                sibling.move_first_to_end_of(&mut node);
                let new_sep = sibling.key_at(0);
                let mut parent = InternalView::new(parent_guard.data_mut());
                parent.set_key_at(1, new_sep);
            } else {
                let middle_key = InternalView::new(parent_guard.data()).key_at(1);
                let mut node = InternalView::new(node_guard.data_mut());
                let mut sibling = InternalView::new(sibling_guard.data_mut());
                sibling.move_first_to_end_of(&mut node, middle_key);
                let new_sep = sibling.key_at(0);
                let mut parent = InternalView::new(parent_guard.data_mut());
                parent.set_key_at(1, new_sep);
            }
        } else {
            // Sibling is the left neighbour: take its last entry.
            if node_is_leaf {
                let mut node = LeafView::<_, T>::new(node_guard.data_mut());
                let mut sibling = LeafView::<_, T>::new(sibling_guard.data_mut());
                sibling.move_last_to_front_of(&mut node);
                let new_sep = node.key_at(0);
                let mut parent = InternalView::new(parent_guard.data_mut());
                parent.set_key_at(idx, new_sep);
            } else {
                let middle_key = InternalView::new(parent_guard.data()).key_at(idx);
                let mut node = InternalView::new(node_guard.data_mut());
                let mut sibling = InternalView::new(sibling_guard.data_mut());
                sibling.move_last_to_front_of(&mut node, middle_key);
                // The promoted key sits just past the sibling's new end.
                let promoted = sibling.key_at(sibling.size());
                let mut parent = InternalView::new(parent_guard.data_mut());
                parent.set_key_at(idx, promoted);
            }
        }
    }

    /// Concatenates the right-hand node into the left-hand node, removes
    /// the separator from the parent, and returns the dead page's id.
    fn merge(
        &self,
        parent_guard: &mut WritePageGuard,
        mut node_guard: WritePageGuard,
        mut sibling_guard: WritePageGuard,
        idx: usize,
        node_is_leaf: bool,
    ) -> PageId {
        // Normalize to (left, right) by child position.
        let (mut left_guard, mut right_guard, sep_idx) = if idx == 0 {
            let sep = 1;
            (node_guard, sibling_guard, sep)
        } else {
            let sep = idx;
            // A temporary swap keeps the merge direction uniform.
            std::mem::swap(&mut node_guard, &mut sibling_guard);
            (node_guard, sibling_guard, sep)
        };
        let dead_id = right_guard.page_id();

        if node_is_leaf {
            let mut left = LeafView::<_, T>::new(left_guard.data_mut());
            let mut right = LeafView::<_, T>::new(right_guard.data_mut());
            right.move_all_to(&mut left);
        } else {
            let middle_key = InternalView::new(parent_guard.data()).key_at(sep_idx);
            let mut left = InternalView::new(left_guard.data_mut());
            let mut right = InternalView::new(right_guard.data_mut());
            right.move_all_to(&mut left, middle_key);
        }

        let mut parent = InternalView::new(parent_guard.data_mut());
        parent.remove_at(sep_idx);
        dead_id
    }

    // -------------------------------------------------------------------------
    // Iteration
    // -------------------------------------------------------------------------

    fn try_iter(&self) -> StorageResult<IndexIterator<T>> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = HeaderView::new(header_guard.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }
        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);

        while PageType::of(guard.data()) != Some(PageType::Leaf) {
            let child_id = InternalView::new(guard.data()).child_at(0);
            guard = self.bpm.read_page(child_id)?;
        }
        Ok(IndexIterator::new(Arc::clone(&self.bpm), guard, 0))
    }

    fn try_iter_from(&self, key: IndexKey) -> StorageResult<IndexIterator<T>> {
        let header_guard = self.bpm.read_page(self.header_page_id)?;
        let root_id = HeaderView::new(header_guard.data()).root_page_id();
        if !root_id.is_valid() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }
        let mut guard = self.bpm.read_page(root_id)?;
        drop(header_guard);

        while PageType::of(guard.data()) != Some(PageType::Leaf) {
            let child_id = InternalView::new(guard.data()).lookup(key);
            guard = self.bpm.read_page(child_id)?;
        }
        let index = LeafView::<_, T>::new(guard.data()).lower_bound(key);
        Ok(IndexIterator::new(Arc::clone(&self.bpm), guard, index))
    }

    // -------------------------------------------------------------------------
    // Safety predicates and integrity checks
    // -------------------------------------------------------------------------

    fn insert_safe(data: &[u8]) -> bool {
        match PageType::of(data) {
            Some(PageType::Leaf) => {
                let v = LeafView::<_, T>::new(data);
                v.size() < v.max_size()
            }
            Some(PageType::Internal) => {
                let v = InternalView::new(data);
                v.size() < v.max_size()
            }
            _ => unreachable!("traversal only visits tree nodes"),
        }
    }

    fn remove_safe(data: &[u8]) -> bool {
        let (size, min) = Self::size_and_min(data);
        size > min
    }

    /// Size and effective minimum (internals never shrink below 2 children).
    fn size_and_min(data: &[u8]) -> (usize, usize) {
        match PageType::of(data) {
            Some(PageType::Leaf) => {
                let v = LeafView::<_, T>::new(data);
                (v.size(), v.min_size())
            }
            Some(PageType::Internal) => {
                let v = InternalView::new(data);
                (v.size(), v.min_size().max(2))
            }
            _ => unreachable!("traversal only visits tree nodes"),
        }
    }

    /// Walks the whole tree asserting the structural invariants: sizing
    /// bounds on every non-root node, sorted keys, separator ranges, and
    /// well-formed tombstone buffers.
    pub fn validate(&self) {
        let root_id = self.root_page_id();
        if !root_id.is_valid() {
            return;
        }
        self.validate_node(root_id, true, None, None)
            .expect("tree invariants hold");
    }

    fn validate_node(
        &self,
        page_id: PageId,
        is_root: bool,
        lo: Option<IndexKey>,
        hi: Option<IndexKey>,
    ) -> StorageResult<()> {
        let guard = self.bpm.read_page(page_id)?;
        match PageType::of(guard.data()) {
            Some(PageType::Leaf) => {
                let leaf = LeafView::<_, T>::new(guard.data());
                if !is_root {
                    assert!(
                        leaf.size() >= leaf.min_size() && leaf.size() <= leaf.max_size(),
                        "leaf {page_id} size {} outside [{}, {}]",
                        leaf.size(),
                        leaf.min_size(),
                        leaf.max_size(),
                    );
                }
                for i in 0..leaf.size() {
                    let key = leaf.key_at(i);
                    if i > 0 {
                        assert!(leaf.key_at(i - 1) < key, "leaf {page_id} keys unsorted");
                    }
                    if let Some(lo) = lo {
                        assert!(key >= lo, "leaf {page_id} key below subtree bound");
                    }
                    if let Some(hi) = hi {
                        assert!(key < hi, "leaf {page_id} key above subtree bound");
                    }
                }
                let tombs = leaf.tombstones();
                let mut seen = std::collections::HashSet::new();
                for idx in tombs {
                    assert!(idx < leaf.size(), "leaf {page_id} tombstone out of range");
                    assert!(seen.insert(idx), "leaf {page_id} duplicate tombstone");
                }
            }
            Some(PageType::Internal) => {
                let (size, min, max, children): (usize, usize, usize, Vec<(PageId, Option<IndexKey>)>) = {
                    let node = InternalView::new(guard.data());
                    let children = (0..node.size())
                        .map(|i| {
                            let key = if i > 0 { Some(node.key_at(i)) } else { None };
                            (node.child_at(i), key)
                        })
                        .collect();
                    (node.size(), node.min_size().max(2), node.max_size(), children)
                };
                if !is_root {
                    assert!(
                        size >= min && size <= max,
                        "internal {page_id} size {size} outside [{min}, {max}]",
                    );
                } else {
                    assert!(size >= 2, "internal root {page_id} under-populated");
                }
                drop(guard);

                let mut prev_key: Option<IndexKey> = None;
                for (i, (child, key)) in children.iter().enumerate() {
                    if let (Some(prev), Some(key)) = (prev_key, *key) {
                        assert!(prev < key, "internal {page_id} separators unsorted");
                    }
                    let child_lo = if i == 0 { lo } else { *key };
                    let child_hi = children.get(i + 1).and_then(|(_, k)| *k).or(hi);
                    self.validate_node(*child, false, child_lo, child_hi)?;
                    if key.is_some() {
                        prev_key = *key;
                    }
                }
            }
            other => panic!("unexpected page type {other:?} in tree"),
        }
        Ok(())
    }
}
