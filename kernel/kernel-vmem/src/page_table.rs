//! # Page Tables and their Entries
//!
//! A page table is one 4 KiB frame holding exactly 512 entries of 64 bits.
//! The entry layout is fixed by the translation hardware; [`PageTableEntry`]
//! models it bit-for-bit so no call site does manual masking.
//!
//! [`TableLevel`] describes the four levels of the translation tree as data
//! (level number plus the shift of its 9-bit virtual-address index), so the
//! mapper and the inspector can drive their walks with a plain loop instead
//! of one hand-written block per level.

use crate::addresses::{PhysAddr, VirtAddr};
use bitfield_struct::bitfield;

/// Entries per page table (2⁹).
pub const ENTRY_COUNT: usize = 512;

/// One 64-bit page table entry, in hardware layout.
///
/// A present entry either points at the next-level table or, when
/// [`huge_page`](Self::huge_page) is set at an upper level, maps a large
/// leaf region directly. The frame-address field holds bits 12–51 of the
/// physical address; the low 12 bits are implicitly zero.
///
/// The type doubles as the flags carrier for [`map`]: callers hand in an
/// entry with the permission bits they want and the mapper fills in the
/// present flag and the frame address.
///
/// [`map`]: crate::AddressSpace::map
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageTableEntry {
    /// Present (bit 0). The entry participates in translation.
    pub present: bool,

    /// Writable (bit 1). Clear means read-only.
    pub writable: bool,

    /// User-accessible (bit 2). Clear restricts to supervisor mode.
    pub user_access: bool,

    /// Write-through caching (bit 3).
    pub write_through: bool,

    /// Cache disable (bit 4).
    pub cache_disabled: bool,

    /// Accessed (bit 5), set by the hardware on first use.
    pub accessed: bool,

    /// Dirty (bit 6), set by the hardware on first write to a leaf.
    pub dirty: bool,

    /// Huge page (bit 7). At an upper level this entry is a large leaf,
    /// not a pointer to a subtable. Must stay clear at level 1.
    pub huge_page: bool,

    /// Global (bit 8). The translation survives a root switch.
    pub global: bool,

    /// Available to the OS (bits 9–11); ignored by hardware.
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame bits \[51:12\] (bits 12–51).
    #[bits(40)]
    frame_bits: u64,

    /// Reserved / OS use (bits 52–62).
    #[bits(11)]
    __: u16,

    /// No-execute (bit 63).
    pub no_execute: bool,
}

impl PageTableEntry {
    /// Store a frame-aligned physical address in the frame-address field.
    #[inline]
    pub const fn set_frame(&mut self, frame: PhysAddr) {
        self.set_frame_bits(frame.as_u64() >> 12);
    }

    /// The physical address named by the frame-address field.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> PhysAddr {
        PhysAddr::new(self.frame_bits() << 12)
    }

    /// The standard permission set for user mappings: present, writable,
    /// user-accessible. Suits both non-leaf links and leaves.
    #[inline]
    #[must_use]
    pub const fn user_rw() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
    }

    /// Supervisor-only read/write permissions.
    #[inline]
    #[must_use]
    pub const fn kernel_rw() -> Self {
        Self::new().with_present(true).with_writable(true)
    }
}

/// One level of the 4-level translation tree, described as data.
///
/// The walk is driven by these descriptors: level 4 is the root, level 1
/// holds the 4 KiB leaves. `shift` positions the level's 9-bit index
/// within a virtual address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableLevel {
    number: u8,
    shift: u32,
}

impl TableLevel {
    pub const L4: Self = Self {
        number: 4,
        shift: 39,
    };
    pub const L3: Self = Self {
        number: 3,
        shift: 30,
    };
    pub const L2: Self = Self {
        number: 2,
        shift: 21,
    };
    pub const L1: Self = Self {
        number: 1,
        shift: 12,
    };

    /// All levels in walk order, root first.
    pub const WALK: [Self; 4] = [Self::L4, Self::L3, Self::L2, Self::L1];

    /// The three upper levels whose entries point at subtables.
    pub const UPPER: [Self; 3] = [Self::L4, Self::L3, Self::L2];

    #[inline]
    #[must_use]
    pub const fn number(self) -> u8 {
        self.number
    }

    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        self.shift
    }

    /// This level's 9-bit index of `va`, in `0..512`.
    #[inline]
    #[must_use]
    pub const fn index_of(self, va: VirtAddr) -> usize {
        ((va.as_u64() >> self.shift) & 0x1ff) as usize
    }

    /// Bytes spanned by one leaf entry at this level
    /// (4 KiB at L1, 2 MiB at L2, 1 GiB at L3).
    #[inline]
    #[must_use]
    pub const fn span(self) -> u64 {
        1u64 << self.shift
    }

    /// Whether entries at this level are always leaves.
    #[inline]
    #[must_use]
    pub const fn is_leaf_level(self) -> bool {
        self.number == 1
    }

    /// The next level towards the leaves, if any.
    #[inline]
    #[must_use]
    pub const fn next_down(self) -> Option<Self> {
        match self.number {
            4 => Some(Self::L3),
            3 => Some(Self::L2),
            2 => Some(Self::L1),
            _ => None,
        }
    }
}

/// A page table: 512 entries, one 4 KiB-aligned frame.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRY_COUNT],
}

impl PageTable {
    /// A table with every entry non-present.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageTableEntry::new(); ENTRY_COUNT],
        }
    }

    /// Clear every entry. Required on a freshly allocated frame before it
    /// is linked into a tree: stale bits would read as live translations.
    #[inline]
    pub const fn zero(&mut self) {
        self.entries = [PageTableEntry::new(); ENTRY_COUNT];
    }

    /// Read the entry at `index`.
    #[inline]
    #[must_use]
    pub const fn get(&self, index: usize) -> PageTableEntry {
        debug_assert!(index < ENTRY_COUNT);
        self.entries[index]
    }

    /// Write the entry at `index`.
    #[inline]
    pub const fn set(&mut self, index: usize, entry: PageTableEntry) {
        debug_assert!(index < ENTRY_COUNT);
        self.entries[index] = entry;
    }
}
