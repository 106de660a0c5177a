//! # Virtual Memory Support
//!
//! The 4-level paging core: address newtypes, the hardware page-table
//! entry layout, the mapper that installs translations on demand, and a
//! read-only inspector over a translation tree.
//!
//! ## Virtual Address → Physical Address Walk
//!
//! For translation purposes a virtual address is five fields:
//!
//! ```text
//! | 47-39 | 38-30 | 29-21 | 20-12 | 11-0   |
//! |  L4   |  L3   |  L2   |  L1   | Offset |
//! ```
//!
//! Each 9-bit field indexes one table of 512 entries of 8 bytes. Level 4
//! is the root of an address space; a present upper-level entry either
//! points at the next table down or, with the huge-page bit set, maps a
//! large leaf region (1 GiB at L3, 2 MiB at L2) directly. Level-1 entries
//! always map a 4 KiB frame. The walk is expressed as a loop over the
//! [`TableLevel`] descriptors rather than one block per level.
//!
//! ## Who allocates, who dereferences
//!
//! The mapper pulls table frames from a [`FrameAlloc`] and reaches them
//! through a [`PhysMapper`], so the same code runs against real physical
//! memory in the kernel and against a simulated frame store in host tests.
//!
//! ## Concurrency
//!
//! None of the operations here are reentrant or thread-safe. There is no
//! internal locking; callers running on more than one execution context,
//! or mapping from within a fault path that can itself fault, must
//! serialize access externally.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

mod address_space;
mod addresses;
mod inspect;
mod page_table;

pub use crate::address_space::{AddressSpace, MapError};
pub use crate::addresses::{PhysAddr, VirtAddr};
pub use crate::inspect::{Translation, dump_translations, visit_translations};
pub use crate::page_table::{ENTRY_COUNT, PageTable, PageTableEntry, TableLevel};

/// Re-export the layout constants as an `info` module.
pub use kernel_info::memory as info;

/// Source of physical frames for page tables and mapped pages.
///
/// The implementation decides where frames come from (bitmap pool, bump
/// region, ...). Returned frames **must** be frame-aligned. `None` means
/// the pool is exhausted; the mapper surfaces that as
/// [`MapError::OutOfMemory`] instead of writing through a bad address.
pub trait FrameAlloc {
    /// Allocate one physical frame. Must return a frame-aligned address.
    fn alloc_frame(&mut self) -> Option<PhysAddr>;
}

/// Converts physical addresses to usable pointers in the current virtual
/// address space.
///
/// The kernel's low pool is identity mapped, so its mapper is a plain
/// cast; tests back this with an in-memory frame store instead.
pub trait PhysMapper {
    /// Convert a physical address to a mutable reference.
    ///
    /// # Safety
    /// - `pa` must be mapped and writable in the current address space.
    /// - `T` must match the bytes at `pa`, and no other reference may
    ///   alias them for the returned lifetime.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysAddr) -> &'a mut T;
}

/// View the frame at `phys` as a page table.
///
/// # Safety
/// `phys` must point at a valid, writable page-table frame.
#[inline]
pub(crate) unsafe fn get_table<'a, M: PhysMapper>(m: &M, phys: PhysAddr) -> &'a mut PageTable {
    unsafe { m.phys_to_mut::<PageTable>(phys) }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A 4 KiB-aligned raw frame backing the simulated physical memory.
    #[repr(align(4096))]
    pub struct Aligned4K(pub [u8; 4096]);

    /// Simulated physical memory: a vector of aligned frames, where the
    /// physical address is the byte offset from frame zero.
    pub struct TestPhys {
        frames: Vec<Aligned4K>,
    }

    impl TestPhys {
        pub fn with_frames(n: usize) -> Self {
            Self::filled(n, 0)
        }

        /// Frames pre-filled with a garbage byte, to catch code that
        /// links a table in without zeroing it first.
        pub fn with_garbage_frames(n: usize) -> Self {
            Self::filled(n, 0xff)
        }

        fn filled(n: usize, byte: u8) -> Self {
            let mut frames = Vec::with_capacity(n);
            for _ in 0..n {
                frames.push(Aligned4K([byte; 4096]));
            }
            Self { frames }
        }

        fn frame_mut_ptr(&self, idx: usize) -> *mut u8 {
            core::ptr::from_ref(&self.frames[idx]).cast_mut().cast()
        }
    }

    impl PhysMapper for TestPhys {
        unsafe fn phys_to_mut<'a, T>(&self, pa: PhysAddr) -> &'a mut T {
            let idx = (pa.as_u64() >> 12) as usize;
            // Page tables are always frame-aligned; catch misuse early.
            debug_assert_eq!(pa.as_u64() & 0xfff, 0);

            // SAFETY: the caller promises `T` matches the frame bytes.
            unsafe { &mut *self.frame_mut_ptr(idx).cast::<T>() }
        }
    }

    /// A trivial bump allocator over the simulated memory: hands out the
    /// next frame and counts how many it has given away.
    pub struct BumpAlloc {
        start: u64,
        next: u64,
        end: u64,
    }

    impl BumpAlloc {
        pub fn new(start: u64, end: u64) -> Self {
            Self {
                start,
                next: start,
                end,
            }
        }

        /// Frames handed out so far.
        pub fn allocated(&self) -> u64 {
            (self.next - self.start) >> 12
        }
    }

    impl FrameAlloc for BumpAlloc {
        fn alloc_frame(&mut self) -> Option<PhysAddr> {
            if self.next + 4096 > self.end {
                return None;
            }
            let p = self.next;
            self.next += 4096;
            Some(PhysAddr::new(p))
        }
    }

    /// A root table plus allocator/backing set up for mapper tests.
    pub fn fresh_space(phys: &TestPhys, frames: u64) -> (PhysAddr, BumpAlloc) {
        let mut alloc = BumpAlloc::new(0, frames << 12);
        let root = alloc.alloc_frame().expect("root frame");
        unsafe {
            get_table(phys, root).zero();
        }
        (root, alloc)
    }
}
