//! ARC (Adaptive Replacement Cache) eviction policy.
//!
//! The replacer tracks four lists: two "alive" lists of resident frames
//! (`mru` for once-touched pages, `mfu` for re-touched pages) and two ghost
//! lists remembering recently evicted page ids. Ghost hits feed back into
//! the adaptive target size for the MRU side, balancing recency against
//! frequency without hand tuning.
//!
//! Alive entries are keyed by frame id, ghost entries by page id: once a
//! page leaves its frame, the page id is the only stable name it has left.

use std::collections::{HashMap, VecDeque};

use tracing::trace;
use vellum_common::types::{FrameId, PageId};

/// How a frame access was classified by the caller.
///
/// Recorded for completeness; the policy currently treats all access types
/// identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Untyped access.
    #[default]
    Unknown,
    /// Point lookup.
    Lookup,
    /// Sequential scan.
    Scan,
    /// Index traversal.
    Index,
}

/// Which alive list an entry currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliveList {
    Mru,
    Mfu,
}

/// Which ghost list a page id currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GhostList {
    MruGhost,
    MfuGhost,
}

#[derive(Debug)]
struct AliveEntry {
    page_id: PageId,
    evictable: bool,
    list: AliveList,
}

/// Adaptive Replacement Cache replacer for the buffer pool.
///
/// Capacity equals the pool's frame count. `size()` reports the number of
/// evictable alive entries, which is what the pool consults before giving
/// up on eviction.
pub struct ArcReplacer {
    /// Alive lists, front = most recently touched.
    mru: VecDeque<FrameId>,
    mfu: VecDeque<FrameId>,
    /// Ghost lists, front = most recently evicted.
    mru_ghost: VecDeque<PageId>,
    mfu_ghost: VecDeque<PageId>,
    alive: HashMap<FrameId, AliveEntry>,
    ghost: HashMap<PageId, GhostList>,
    /// Adaptive target size for the MRU side (the ARC paper's `p`).
    mru_target: usize,
    /// Count of evictable alive entries.
    evictable_count: usize,
    /// Pool capacity (the ARC paper's `c`).
    capacity: usize,
}

impl ArcReplacer {
    /// Creates a replacer for a pool of `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            mru: VecDeque::new(),
            mfu: VecDeque::new(),
            mru_ghost: VecDeque::new(),
            mfu_ghost: VecDeque::new(),
            alive: HashMap::new(),
            ghost: HashMap::new(),
            mru_target: 0,
            evictable_count: 0,
            capacity,
        }
    }

    /// Records an access to `frame_id` holding `page_id`, mutating the four
    /// lists according to the ARC case analysis. Eviction itself is left to
    /// [`evict`](Self::evict).
    pub fn record_access(&mut self, frame_id: FrameId, page_id: PageId, _access: AccessType) {
        if self.alive.contains_key(&frame_id) {
            self.on_alive_hit(frame_id);
            return;
        }
        match self.ghost.get(&page_id).copied() {
            Some(GhostList::MruGhost) => self.on_mru_ghost_hit(frame_id, page_id),
            Some(GhostList::MfuGhost) => self.on_mfu_ghost_hit(frame_id, page_id),
            None => self.on_miss(frame_id, page_id),
        }
    }

    /// Chooses a victim among the evictable alive entries and moves its page
    /// id to the matching ghost list. Returns `None` if every alive entry is
    /// pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        // Balancing policy: victimize MRU when it has grown to (or past) the
        // adaptive target, otherwise MFU; fall back to the other side when
        // every candidate on the preferred side is pinned.
        let sides = if self.mru.len() >= self.mru_target {
            [AliveList::Mru, AliveList::Mfu]
        } else {
            [AliveList::Mfu, AliveList::Mru]
        };

        for side in sides {
            if let Some(frame_id) = self.evict_from(side) {
                return Some(frame_id);
            }
        }
        None
    }

    /// Toggles whether a frame may be evicted.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` has no alive entry; that is a caller bug.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let entry = self
            .alive
            .get_mut(&frame_id)
            .unwrap_or_else(|| panic!("set_evictable on unknown frame {frame_id:?}"));
        if entry.evictable == evictable {
            return;
        }
        entry.evictable = evictable;
        if evictable {
            self.evictable_count += 1;
        } else {
            self.evictable_count -= 1;
        }
    }

    /// Forcibly drops an evictable entry without ghost-listing it.
    ///
    /// A no-op if the frame is unknown.
    ///
    /// # Panics
    ///
    /// Panics if the entry exists but is not evictable.
    pub fn remove(&mut self, frame_id: FrameId) {
        let Some(entry) = self.alive.get(&frame_id) else {
            return;
        };
        assert!(
            entry.evictable,
            "remove called on non-evictable frame {frame_id:?}"
        );
        let list = entry.list;
        self.unlink_alive(frame_id, list);
        self.alive.remove(&frame_id);
        self.evictable_count -= 1;
    }

    /// Number of evictable alive entries.
    pub fn size(&self) -> usize {
        self.evictable_count
    }

    /// Current adaptive MRU target.
    #[cfg(test)]
    pub(crate) fn mru_target(&self) -> usize {
        self.mru_target
    }

    // -------------------------------------------------------------------------
    // Case handlers
    // -------------------------------------------------------------------------

    /// Case 1: the frame is alive. Relocate it to the front of MFU.
    fn on_alive_hit(&mut self, frame_id: FrameId) {
        let entry = self.alive.get_mut(&frame_id).expect("checked alive");
        let list = entry.list;
        entry.list = AliveList::Mfu;
        self.unlink_alive(frame_id, list);
        self.mfu.push_front(frame_id);
    }

    /// Case 2: the page id is remembered in the MRU ghost list. Grow the MRU
    /// target, then resurrect the entry straight into MFU.
    fn on_mru_ghost_hit(&mut self, frame_id: FrameId, page_id: PageId) {
        let delta = if self.mru_ghost.len() >= self.mfu_ghost.len() {
            1
        } else {
            self.mfu_ghost.len() / self.mru_ghost.len()
        };
        self.mru_target = (self.mru_target + delta).min(self.capacity);

        self.unlink_ghost(page_id, GhostList::MruGhost);
        self.insert_alive(frame_id, page_id, AliveList::Mfu);
    }

    /// Case 3: the page id is remembered in the MFU ghost list. Shrink the
    /// MRU target, then resurrect the entry straight into MFU.
    fn on_mfu_ghost_hit(&mut self, frame_id: FrameId, page_id: PageId) {
        let delta = if self.mfu_ghost.len() >= self.mru_ghost.len() {
            1
        } else {
            self.mru_ghost.len() / self.mfu_ghost.len()
        };
        self.mru_target = self.mru_target.saturating_sub(delta);

        self.unlink_ghost(page_id, GhostList::MfuGhost);
        self.insert_alive(frame_id, page_id, AliveList::Mfu);
    }

    /// Case 4: never seen. Trim the ghost lists to their budgets, then admit
    /// the entry at the front of MRU.
    fn on_miss(&mut self, frame_id: FrameId, page_id: PageId) {
        let total =
            self.mru.len() + self.mru_ghost.len() + self.mfu.len() + self.mfu_ghost.len();
        if self.mru.len() + self.mru_ghost.len() == self.capacity {
            if let Some(old) = self.mru_ghost.pop_back() {
                self.ghost.remove(&old);
            }
        } else if total == 2 * self.capacity {
            if let Some(old) = self.mfu_ghost.pop_back() {
                self.ghost.remove(&old);
            }
        }

        self.insert_alive(frame_id, page_id, AliveList::Mru);
    }

    // -------------------------------------------------------------------------
    // List plumbing
    // -------------------------------------------------------------------------

    fn insert_alive(&mut self, frame_id: FrameId, page_id: PageId, list: AliveList) {
        match list {
            AliveList::Mru => self.mru.push_front(frame_id),
            AliveList::Mfu => self.mfu.push_front(frame_id),
        }
        self.alive.insert(
            frame_id,
            AliveEntry {
                page_id,
                evictable: true,
                list,
            },
        );
        self.evictable_count += 1;
    }

    fn unlink_alive(&mut self, frame_id: FrameId, list: AliveList) {
        let deque = match list {
            AliveList::Mru => &mut self.mru,
            AliveList::Mfu => &mut self.mfu,
        };
        if let Some(pos) = deque.iter().position(|&f| f == frame_id) {
            deque.remove(pos);
        }
    }

    fn unlink_ghost(&mut self, page_id: PageId, list: GhostList) {
        let deque = match list {
            GhostList::MruGhost => &mut self.mru_ghost,
            GhostList::MfuGhost => &mut self.mfu_ghost,
        };
        if let Some(pos) = deque.iter().position(|&p| p == page_id) {
            deque.remove(pos);
        }
        self.ghost.remove(&page_id);
    }

    /// Scans one alive list tail-to-head for the first evictable frame and
    /// moves its page id to the matching ghost list.
    fn evict_from(&mut self, list: AliveList) -> Option<FrameId> {
        let (deque, ghost_list) = match list {
            AliveList::Mru => (&self.mru, GhostList::MruGhost),
            AliveList::Mfu => (&self.mfu, GhostList::MfuGhost),
        };

        let frame_id = deque
            .iter()
            .rev()
            .copied()
            .find(|f| self.alive[f].evictable)?;

        let entry = self.alive.remove(&frame_id).expect("entry exists");
        self.unlink_alive(frame_id, list);
        match ghost_list {
            GhostList::MruGhost => self.mru_ghost.push_front(entry.page_id),
            GhostList::MfuGhost => self.mfu_ghost.push_front(entry.page_id),
        }
        self.ghost.insert(entry.page_id, ghost_list);
        self.evictable_count -= 1;

        trace!(frame = ?frame_id, page = %entry.page_id, ?ghost_list, "arc evict");
        Some(frame_id)
    }
}

impl std::fmt::Debug for ArcReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArcReplacer")
            .field("mru", &self.mru.len())
            .field("mfu", &self.mfu.len())
            .field("mru_ghost", &self.mru_ghost.len())
            .field("mfu_ghost", &self.mfu_ghost.len())
            .field("mru_target", &self.mru_target)
            .field("evictable", &self.evictable_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(i: usize) -> FrameId {
        FrameId::new(i)
    }

    fn pid(i: u32) -> PageId {
        PageId::new(i)
    }

    /// Checks the structural invariants: no entry in two lists, alive lists
    /// within capacity, all four lists within 2x capacity.
    fn check_invariants(r: &ArcReplacer) {
        assert!(r.mru.len() + r.mfu.len() <= r.capacity);
        assert!(r.mru.len() + r.mfu.len() + r.mru_ghost.len() + r.mfu_ghost.len() <= 2 * r.capacity);

        let mut alive_seen = std::collections::HashSet::new();
        for &f in r.mru.iter().chain(r.mfu.iter()) {
            assert!(alive_seen.insert(f), "frame {f:?} in two alive lists");
        }
        let mut ghost_seen = std::collections::HashSet::new();
        for &p in r.mru_ghost.iter().chain(r.mfu_ghost.iter()) {
            assert!(ghost_seen.insert(p), "page {p} in two ghost lists");
        }
    }

    #[test]
    fn miss_then_evict_moves_to_mru_ghost() {
        let mut r = ArcReplacer::new(2);
        r.record_access(fid(0), pid(10), AccessType::Unknown);
        r.record_access(fid(1), pid(11), AccessType::Unknown);
        assert_eq!(r.size(), 2);

        // Both sit in MRU; target is 0 so MRU is the victim side, and the
        // oldest (frame 0) goes first.
        assert_eq!(r.evict(), Some(fid(0)));
        assert_eq!(r.evict(), Some(fid(1)));
        assert_eq!(r.evict(), None);
        assert_eq!(r.mru_ghost.len(), 2);
        check_invariants(&r);
    }

    #[test]
    fn alive_hit_promotes_to_mfu() {
        let mut r = ArcReplacer::new(3);
        r.record_access(fid(0), pid(1), AccessType::Unknown);
        r.record_access(fid(1), pid(2), AccessType::Unknown);
        // Re-touch frame 0: it moves to MFU, so an MRU eviction takes frame 1.
        r.record_access(fid(0), pid(1), AccessType::Unknown);
        assert_eq!(r.evict(), Some(fid(1)));
        check_invariants(&r);
    }

    #[test]
    fn mru_ghost_hit_grows_target_and_lands_in_mfu() {
        let mut r = ArcReplacer::new(2);
        r.record_access(fid(0), pid(10), AccessType::Unknown);
        assert_eq!(r.evict(), Some(fid(0)));
        assert_eq!(r.mru_target(), 0);

        // Page 10 is now a MRU ghost; re-accessing it adapts the target.
        r.record_access(fid(1), pid(10), AccessType::Unknown);
        assert_eq!(r.mru_target(), 1);
        assert_eq!(r.mru_ghost.len(), 0);
        assert_eq!(r.mfu.len(), 1);
        check_invariants(&r);
    }

    #[test]
    fn mfu_ghost_hit_shrinks_target() {
        let mut r = ArcReplacer::new(2);
        // Put page 5 into MFU, then evict it into the MFU ghost list.
        r.record_access(fid(0), pid(5), AccessType::Unknown);
        r.record_access(fid(0), pid(5), AccessType::Unknown);
        // MRU empty, target 0 => mru.len() >= target, MRU side first, empty,
        // falls through to MFU.
        assert_eq!(r.evict(), Some(fid(0)));
        assert_eq!(r.mfu_ghost.len(), 1);

        // Grow the target first so the shrink is observable.
        r.record_access(fid(1), pid(7), AccessType::Unknown);
        assert_eq!(r.evict(), Some(fid(1)));
        r.record_access(fid(2), pid(7), AccessType::Unknown); // mru ghost hit, target -> 1

        r.record_access(fid(3), pid(5), AccessType::Unknown); // mfu ghost hit
        assert_eq!(r.mru_target(), 0);
        check_invariants(&r);
    }

    #[test]
    fn pinned_frames_are_skipped() {
        let mut r = ArcReplacer::new(3);
        r.record_access(fid(0), pid(1), AccessType::Unknown);
        r.record_access(fid(1), pid(2), AccessType::Unknown);
        r.record_access(fid(2), pid(3), AccessType::Unknown);
        r.set_evictable(fid(0), false);
        r.set_evictable(fid(1), false);
        assert_eq!(r.size(), 1);

        assert_eq!(r.evict(), Some(fid(2)));
        assert_eq!(r.evict(), None);
        check_invariants(&r);
    }

    #[test]
    fn set_evictable_is_idempotent_on_size() {
        let mut r = ArcReplacer::new(2);
        r.record_access(fid(0), pid(1), AccessType::Unknown);
        assert_eq!(r.size(), 1);
        r.set_evictable(fid(0), false);
        r.set_evictable(fid(0), false);
        assert_eq!(r.size(), 0);
        r.set_evictable(fid(0), true);
        assert_eq!(r.size(), 1);
    }

    #[test]
    #[should_panic(expected = "unknown frame")]
    fn set_evictable_unknown_frame_panics() {
        let mut r = ArcReplacer::new(2);
        r.set_evictable(fid(9), true);
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn remove_non_evictable_panics() {
        let mut r = ArcReplacer::new(2);
        r.record_access(fid(0), pid(1), AccessType::Unknown);
        r.set_evictable(fid(0), false);
        r.remove(fid(0));
    }

    #[test]
    fn remove_absent_frame_is_noop() {
        let mut r = ArcReplacer::new(2);
        r.remove(fid(5));
        assert_eq!(r.size(), 0);
    }

    #[test]
    fn remove_drops_entry_without_ghost() {
        let mut r = ArcReplacer::new(2);
        r.record_access(fid(0), pid(1), AccessType::Unknown);
        r.remove(fid(0));
        assert_eq!(r.size(), 0);
        assert_eq!(r.mru_ghost.len(), 0);
        // The page id left no ghost, so a new access is a plain miss.
        r.record_access(fid(1), pid(1), AccessType::Unknown);
        assert_eq!(r.mru.len(), 1);
        check_invariants(&r);
    }

    #[test]
    fn ghost_lists_stay_bounded_under_churn() {
        let capacity = 4;
        let mut r = ArcReplacer::new(capacity);
        for i in 0..200u32 {
            let frame = fid((i % capacity as u32) as usize);
            // Frames cycle, so make sure the frame is free before reusing it.
            if r.alive.contains_key(&frame) {
                r.remove(frame);
            }
            r.record_access(frame, pid(i), AccessType::Unknown);
            if r.size() == capacity {
                r.evict();
            }
            check_invariants(&r);
        }
    }

    #[test]
    fn eviction_prefers_mfu_when_mru_below_target() {
        let mut r = ArcReplacer::new(4);
        // Build up a target of 2 through two MRU ghost hits.
        r.record_access(fid(0), pid(1), AccessType::Unknown);
        assert_eq!(r.evict(), Some(fid(0)));
        r.record_access(fid(0), pid(1), AccessType::Unknown); // ghost hit -> target 1
        r.record_access(fid(1), pid(2), AccessType::Unknown);
        assert_eq!(r.evict(), Some(fid(1)));
        r.record_access(fid(1), pid(2), AccessType::Unknown); // ghost hit -> target 2
        assert_eq!(r.mru_target(), 2);

        // MRU is empty (< target), so MFU is the preferred side now.
        assert_eq!(r.mfu.len(), 2);
        let victim = r.evict().unwrap();
        assert_eq!(r.mfu_ghost.len(), 1);
        assert!(victim == fid(0) || victim == fid(1));
        check_invariants(&r);
    }
}
