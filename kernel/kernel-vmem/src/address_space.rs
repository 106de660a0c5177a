//! # Address Space
//!
//! A handle to one translation tree: the physical address of its root
//! table plus the [`PhysMapper`] used to reach table frames. All tables
//! reachable from the root belong to the address space; reachability
//! defines ownership.
//!
//! [`AddressSpace::map`] walks the three upper levels, building missing
//! tables from the frame allocator as it goes, then installs the leaf.
//! Newly allocated table frames are zeroed **before** they are linked in;
//! an unzeroed table would expose stale bits as live translations.

use crate::addresses::{PhysAddr, VirtAddr};
use crate::page_table::{PageTableEntry, TableLevel};
use crate::{FrameAlloc, PhysMapper, get_table};

/// Failure modes of [`AddressSpace::map`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The frame allocator was exhausted while a level-`level` table (or
    /// the leaf) still had to be built. The tree is left exactly as it
    /// was before the failing step.
    #[error("out of physical frames while building the level {level} table")]
    OutOfMemory { level: u8 },

    /// The walk hit a huge-page leaf at `level` where a subtable pointer
    /// was required. Descending into leaf data as if it were a table is
    /// rejected, never done silently.
    #[error("level {level} entry is a huge-page leaf, not a table")]
    AliasedHugePage { level: u8 },
}

/// One translation tree, rooted at a level-4 table.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysAddr,
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    /// Wrap an existing root table.
    #[inline]
    #[must_use]
    pub const fn new(mapper: &'m M, root: PhysAddr) -> Self {
        Self { root, mapper }
    }

    /// View the **currently active** address space by reading CR3.
    ///
    /// # Safety
    /// Must run at CPL0 with paging enabled; CR3 must point at a valid
    /// root table reachable through `mapper`.
    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub unsafe fn from_current(mapper: &'m M) -> Self {
        let cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::new(mapper, PhysAddr::new(cr3 & 0x000f_ffff_ffff_f000))
    }

    /// Physical address of the root table.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysAddr {
        self.root
    }

    /// The mapper used to reach table frames.
    #[inline]
    pub(crate) const fn mapper(&self) -> &'m M {
        self.mapper
    }

    /// Make this address space active by loading its root into CR3.
    ///
    /// # Safety
    /// The tree must map everything the CPU needs right after the switch
    /// (code, stack, and the identity-mapped low region).
    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub unsafe fn activate(&self) {
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) self.root.as_u64(), options(nostack, preserves_flags));
        }
    }

    /// Ensure the tree translates `va` to `pa`.
    ///
    /// Walks L4→L2; a missing entry gets a fresh zeroed table installed
    /// with `nonleaf` permissions, an existing entry is descended into.
    /// The level-1 entry is then written as `pa` plus `leaf` permissions.
    /// Present and huge-page bits in the flag arguments are overridden.
    ///
    /// Re-mapping the same pair is a no-op in effect. Re-mapping `va` to
    /// a different frame silently overwrites the leaf; the previous frame
    /// is not freed here, that is the caller's responsibility.
    ///
    /// Not reentrant; see the crate-level concurrency note.
    ///
    /// # Errors
    /// - [`MapError::OutOfMemory`] if the allocator runs dry; nothing is
    ///   written in the failing step.
    /// - [`MapError::AliasedHugePage`] if an upper-level entry turns out
    ///   to be a huge-page leaf.
    pub fn map<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        va: VirtAddr,
        pa: PhysAddr,
        nonleaf: PageTableEntry,
        leaf: PageTableEntry,
    ) -> Result<(), MapError> {
        debug_assert!(pa.is_frame_aligned(), "physical address not frame-aligned");
        log::trace!("map {va} -> {pa}");

        let mut table_pa = self.root;
        for level in TableLevel::UPPER {
            table_pa = self.descend_or_create(alloc, table_pa, level, va, nonleaf)?;
        }

        let table = unsafe { get_table(self.mapper, table_pa) };
        let mut entry = leaf;
        entry.set_present(true);
        entry.set_huge_page(false);
        entry.set_frame(pa);
        table.set(TableLevel::L1.index_of(va), entry);
        Ok(())
    }

    /// One upper-level step of the walk: return the subtable for `va` at
    /// `level`, creating it if the entry is not present.
    fn descend_or_create<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        table_pa: PhysAddr,
        level: TableLevel,
        va: VirtAddr,
        nonleaf: PageTableEntry,
    ) -> Result<PhysAddr, MapError> {
        let table = unsafe { get_table(self.mapper, table_pa) };
        let index = level.index_of(va);
        let entry = table.get(index);

        if entry.present() {
            if entry.huge_page() {
                return Err(MapError::AliasedHugePage {
                    level: level.number(),
                });
            }
            return Ok(entry.frame());
        }

        // Allocate before touching the tree, so an exhausted pool leaves
        // the walk untouched.
        let frame = alloc.alloc_frame().ok_or(MapError::OutOfMemory {
            level: level.number(),
        })?;

        // Zero the frame before linking it in: it may hold stale data
        // that would otherwise read as present translations.
        unsafe { get_table(self.mapper, frame) }.zero();

        let mut link = nonleaf;
        link.set_present(true);
        link.set_huge_page(false);
        link.set_frame(frame);
        table.set(index, link);
        Ok(frame)
    }

    /// Translate `va` if mapped, honoring huge leaves by adding the
    /// offset within the leaf's span.
    #[must_use]
    pub fn translate(&self, va: VirtAddr) -> Option<PhysAddr> {
        let mut table_pa = self.root;
        for level in TableLevel::WALK {
            let table = unsafe { get_table(self.mapper, table_pa) };
            let entry = table.get(level.index_of(va));
            if !entry.present() {
                return None;
            }
            if level.is_leaf_level() || entry.huge_page() {
                let offset = va.as_u64() & (level.span() - 1);
                return Some(PhysAddr::new(entry.frame().as_u64() + offset));
            }
            table_pa = entry.frame();
        }
        // The walk always terminates at level 1 above.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_table::TableLevel;
    use crate::test_support::{BumpAlloc, TestPhys, fresh_space};

    fn user_rw() -> PageTableEntry {
        PageTableEntry::user_rw()
    }

    #[test]
    fn map_creates_tables_and_leaf() {
        let phys = TestPhys::with_frames(64);
        let (root, mut alloc) = fresh_space(&phys, 64);
        let space = AddressSpace::new(&phys, root);

        let va = VirtAddr::new(0x1000);
        let pa = PhysAddr::new(0x30_0000);
        space
            .map(&mut alloc, va, pa, user_rw(), user_rw())
            .expect("map");

        // Walk the tree manually and check each level.
        let mut table_pa = root;
        for level in TableLevel::UPPER {
            let table = unsafe { get_table(&phys, table_pa) };
            let entry = table.get(level.index_of(va));
            assert!(entry.present());
            assert!(entry.writable());
            assert!(entry.user_access());
            assert!(!entry.huge_page());
            table_pa = entry.frame();
        }
        let leaf_table = unsafe { get_table(&phys, table_pa) };
        let leaf = leaf_table.get(TableLevel::L1.index_of(va));
        assert!(leaf.present());
        assert_eq!(leaf.frame(), pa);

        assert_eq!(space.translate(va), Some(pa));
        assert_eq!(
            space.translate(VirtAddr::new(0x1abc)),
            Some(PhysAddr::new(0x30_0abc)),
            "page offset is preserved"
        );
    }

    #[test]
    fn remap_same_pair_is_idempotent() {
        let phys = TestPhys::with_frames(64);
        let (root, mut alloc) = fresh_space(&phys, 64);
        let space = AddressSpace::new(&phys, root);

        let va = VirtAddr::new(0x2000);
        let pa = PhysAddr::new(0x10_000);
        space
            .map(&mut alloc, va, pa, user_rw(), user_rw())
            .expect("first map");
        let frames_before = alloc.allocated();
        space
            .map(&mut alloc, va, pa, user_rw(), user_rw())
            .expect("second map");

        assert_eq!(alloc.allocated(), frames_before, "no new frames");
        assert_eq!(space.translate(va), Some(pa));
    }

    #[test]
    fn remap_overwrites_leaf() {
        let phys = TestPhys::with_frames(64);
        let (root, mut alloc) = fresh_space(&phys, 64);
        let space = AddressSpace::new(&phys, root);

        let va = VirtAddr::new(0x5000);
        space
            .map(
                &mut alloc,
                va,
                PhysAddr::new(0x11_000),
                user_rw(),
                user_rw(),
            )
            .expect("map P1");
        space
            .map(
                &mut alloc,
                va,
                PhysAddr::new(0x2f_000),
                user_rw(),
                user_rw(),
            )
            .expect("map P2");

        assert_eq!(space.translate(va), Some(PhysAddr::new(0x2f_000)));
    }

    #[test]
    fn sibling_mappings_share_intermediate_tables() {
        let phys = TestPhys::with_frames(64);
        let (root, mut alloc) = fresh_space(&phys, 64);
        let space = AddressSpace::new(&phys, root);

        // First mapping builds the whole chain: L3 + L2 + L1 tables.
        space
            .map(
                &mut alloc,
                VirtAddr::new(0x1000),
                PhysAddr::new(0x11_000),
                user_rw(),
                user_rw(),
            )
            .expect("map first");
        assert_eq!(alloc.allocated(), 1 + 3, "root plus three tables");

        // Same index at every level but L2: only a new L1 table is needed.
        space
            .map(
                &mut alloc,
                VirtAddr::new(0x40_1000),
                PhysAddr::new(0x12_000),
                user_rw(),
                user_rw(),
            )
            .expect("map second");
        assert_eq!(alloc.allocated(), 1 + 3 + 1, "one new table, not three");

        // Same L1 table, different slot: no allocation at all.
        space
            .map(
                &mut alloc,
                VirtAddr::new(0x2000),
                PhysAddr::new(0x13_000),
                user_rw(),
                user_rw(),
            )
            .expect("map third");
        assert_eq!(alloc.allocated(), 1 + 3 + 1);

        assert_eq!(
            space.translate(VirtAddr::new(0x40_1000)),
            Some(PhysAddr::new(0x12_000))
        );
    }

    #[test]
    fn fresh_tables_are_zeroed_despite_garbage_frames() {
        // Backing frames are pre-filled with 0xff; an unzeroed table
        // would read as 512 present entries.
        let phys = TestPhys::with_garbage_frames(64);
        let (root, mut alloc) = fresh_space(&phys, 64);
        let space = AddressSpace::new(&phys, root);

        let va = VirtAddr::new(0x1000);
        space
            .map(
                &mut alloc,
                va,
                PhysAddr::new(0x20_000),
                user_rw(),
                user_rw(),
            )
            .expect("map");

        // Every table on the path must contain exactly one present entry.
        let mut table_pa = root;
        for level in TableLevel::UPPER {
            let table = unsafe { get_table(&phys, table_pa) };
            let present = (0..crate::ENTRY_COUNT)
                .filter(|&i| table.get(i).present())
                .count();
            assert_eq!(present, 1, "level {} table not clean", level.number());
            table_pa = table.get(level.index_of(va)).frame();
        }

        // And an unrelated address must not resolve through stale bits.
        assert_eq!(space.translate(VirtAddr::new(0xdead_b000)), None);
    }

    #[test]
    fn huge_page_leaf_rejects_descent() {
        let phys = TestPhys::with_frames(64);
        let (root, mut alloc) = fresh_space(&phys, 64);
        let space = AddressSpace::new(&phys, root);

        // Map once so the L3 table exists, then hand-plant a 1 GiB leaf
        // in the slot the second mapping would walk through.
        let va = VirtAddr::new(0x4000_0000); // L3 index 1
        space
            .map(
                &mut alloc,
                VirtAddr::new(0x1000),
                PhysAddr::new(0x11_000),
                user_rw(),
                user_rw(),
            )
            .expect("map");

        let l4 = unsafe { get_table(&phys, root) };
        let l3_pa = l4.get(TableLevel::L4.index_of(va)).frame();
        let l3 = unsafe { get_table(&phys, l3_pa) };
        let mut huge = PageTableEntry::user_rw();
        huge.set_huge_page(true);
        huge.set_frame(PhysAddr::new(0x4000_0000));
        l3.set(TableLevel::L3.index_of(va), huge);

        assert_eq!(
            space.map(
                &mut alloc,
                va,
                PhysAddr::new(0x12_000),
                user_rw(),
                user_rw()
            ),
            Err(MapError::AliasedHugePage { level: 3 })
        );

        // Lookups, by contrast, resolve through the huge leaf.
        assert_eq!(
            space.translate(VirtAddr::new(0x4012_3456)),
            Some(PhysAddr::new(0x4012_3456)),
            "huge leaf translates with in-span offset"
        );
    }

    #[test]
    fn exhausted_allocator_surfaces_out_of_memory() {
        let phys = TestPhys::with_frames(8);
        // Room for the root only; the first table allocation must fail.
        let mut alloc = BumpAlloc::new(0, 1 << 12);
        let root = alloc.alloc_frame().expect("root");
        unsafe {
            get_table(&phys, root).zero();
        }
        let space = AddressSpace::new(&phys, root);

        let result = space.map(
            &mut alloc,
            VirtAddr::new(0x1000),
            PhysAddr::new(0x2000),
            user_rw(),
            user_rw(),
        );
        assert_eq!(result, Err(MapError::OutOfMemory { level: 4 }));

        // The root table was not touched.
        let l4 = unsafe { get_table(&phys, root) };
        assert!((0..crate::ENTRY_COUNT).all(|i| !l4.get(i).present()));
    }
}
