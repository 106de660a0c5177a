//! # Translation Tree Inspector
//!
//! A read-only walk over every present entry of an address space,
//! reporting each leaf as a [`Translation`]. Huge-page leaves terminate
//! their branch and are reported at their own level; the walk never
//! descends into leaf data. Nothing is modified.

use crate::addresses::{PhysAddr, VirtAddr};
use crate::page_table::{ENTRY_COUNT, PageTableEntry, TableLevel};
use crate::{AddressSpace, PhysMapper, get_table};

/// One leaf found by the inspector: a contiguous translated region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Translation {
    /// First virtual address of the region.
    pub va: VirtAddr,
    /// First physical address of the region.
    pub frame: PhysAddr,
    /// Level the leaf lives at: 1 for 4 KiB pages, 2 for 2 MiB huge
    /// pages, 3 for 1 GiB huge pages.
    pub level: u8,
    /// The raw leaf entry, for permission inspection.
    pub entry: PageTableEntry,
}

impl Translation {
    /// Bytes covered by this leaf.
    #[must_use]
    pub const fn span(&self) -> u64 {
        match self.level {
            2 => TableLevel::L2.span(),
            3 => TableLevel::L3.span(),
            _ => TableLevel::L1.span(),
        }
    }
}

/// Call `visit` once per present leaf, in ascending virtual-address order.
pub fn visit_translations<M, F>(space: &AddressSpace<'_, M>, visit: &mut F)
where
    M: PhysMapper,
    F: FnMut(&Translation),
{
    visit_table(space.mapper(), space.root(), TableLevel::L4, 0, visit);
}

/// Log every present leaf of the address space at debug level.
pub fn dump_translations<M: PhysMapper>(space: &AddressSpace<'_, M>) {
    log::debug!("address space @ {}", space.root());
    visit_translations(space, &mut |t| {
        log::debug!(
            "  {} -> {} (L{}, {} KiB){}{}{}",
            t.va,
            t.frame,
            t.level,
            t.span() >> 10,
            if t.entry.writable() { " rw" } else { " ro" },
            if t.entry.user_access() { " user" } else { "" },
            if t.entry.no_execute() { " nx" } else { " x" },
        );
    });
}

fn visit_table<M, F>(mapper: &M, table_pa: PhysAddr, level: TableLevel, va_base: u64, visit: &mut F)
where
    M: PhysMapper,
    F: FnMut(&Translation),
{
    let table = unsafe { get_table(mapper, table_pa) };
    for index in 0..ENTRY_COUNT {
        let entry = table.get(index);
        if !entry.present() {
            continue;
        }

        let mut va = va_base | ((index as u64) << level.shift());
        // The upper half of the address space sign-extends bit 47.
        if level == TableLevel::L4 && index >= ENTRY_COUNT / 2 {
            va |= 0xffff_0000_0000_0000;
        }

        if level.is_leaf_level() || entry.huge_page() {
            visit(&Translation {
                va: VirtAddr::new(va),
                frame: entry.frame(),
                level: level.number(),
                entry,
            });
        } else if let Some(next) = level.next_down() {
            visit_table(mapper, entry.frame(), next, va, visit);
        }
    }
}
