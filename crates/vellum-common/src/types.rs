//! Typed identifiers for vellum.
//!
//! Each identifier is a thin newtype over its numeric representation,
//! preventing accidental mixups between page ids, frame ids, and oids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page identifier.
///
/// Pages are numbered monotonically from zero and never reused within one
/// engine lifetime. The all-ones bit pattern is reserved as the invalid
/// sentinel.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PageId(u32);

impl PageId {
    /// Invalid page ID sentinel.
    pub const INVALID: Self = Self(u32::MAX);

    /// Creates a new `PageId` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Checks whether this is a valid page ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "PageId(INVALID)")
        } else {
            write!(f, "PageId({})", self.0)
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PageId {
    #[inline]
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

/// Frame identifier: an index into the buffer pool's frame array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Creates a new frame ID.
    #[inline]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for FrameId {
    fn from(id: usize) -> Self {
        Self::new(id)
    }
}

/// Object identifier for catalog entries (tables and indexes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Oid(pub u32);

impl Oid {
    /// Creates a new oid.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier.
///
/// Opaque to the storage core; threaded through table-heap and index entry
/// points for the surrounding transaction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TxnId(pub u64);

impl TxnId {
    /// Invalid transaction ID sentinel.
    pub const INVALID: Self = Self(u64::MAX);

    /// Creates a new transaction ID.
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Checks whether this is a valid transaction ID.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

/// Record identifier: a stable locator for a tuple in a table heap.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid {
    /// Page holding the tuple.
    pub page_id: PageId,
    /// Slot within the page.
    pub slot: u32,
}

impl Rid {
    /// An invalid rid, used as a placeholder in operator outputs.
    pub const INVALID: Self = Self {
        page_id: PageId::INVALID,
        slot: 0,
    };

    /// Creates a new rid.
    #[inline]
    pub const fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }

    /// Checks whether this rid points at a real slot.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.page_id.is_valid()
    }

    /// Packs the rid into a u64 (page id in the high half).
    #[inline]
    pub const fn to_u64(self) -> u64 {
        ((self.page_id.as_u32() as u64) << 32) | self.slot as u64
    }

    /// Unpacks a rid from a u64.
    #[inline]
    pub const fn from_u64(raw: u64) -> Self {
        Self {
            page_id: PageId::new((raw >> 32) as u32),
            slot: raw as u32,
        }
    }
}

impl fmt::Debug for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_id, self.slot)
    }
}
