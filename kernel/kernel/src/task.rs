//! # Tasks and their Address Spaces
//!
//! A [`Task`] ties one execution context to the root of its translation
//! tree. The bootstrap task wraps the root the processor is already
//! using; further tasks get a freshly allocated, zeroed root.
//!
//! Image loading, duplication and heap unmapping are named extension
//! points only; they return [`TaskError::NotImplemented`] until the
//! loader and reclamation work lands.

use kernel_info::memory::{Region, region_of};
use kernel_vmem::{
    AddressSpace, FrameAlloc, MapError, PageTable, PageTableEntry, PhysAddr, PhysMapper, VirtAddr,
};

/// Failure modes of task construction and heap management.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TaskError {
    /// The operation is a declared extension point without an
    /// implementation yet.
    #[error("operation not implemented")]
    NotImplemented,

    /// No frame was left for the root table.
    #[error("out of physical frames for the root table")]
    OutOfMemory,

    /// The virtual address lies outside the user-heap region, which is
    /// the only region tasks may map explicitly.
    #[error("{0} is outside the user heap")]
    OutsideHeapRegion(VirtAddr),

    /// The mapper rejected the request.
    #[error(transparent)]
    Map(#[from] MapError),
}

/// One execution context and the root of its address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Task {
    root: PhysAddr,
}

impl Task {
    /// Adopt an existing root table.
    #[inline]
    #[must_use]
    pub const fn with_root(root: PhysAddr) -> Self {
        Self { root }
    }

    /// Bootstrap: adopt the root the processor is currently using.
    ///
    /// # Safety
    /// Must run at CPL0 with paging enabled.
    #[cfg(target_arch = "x86_64")]
    #[must_use]
    pub unsafe fn from_active_root() -> Self {
        let cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::with_root(PhysAddr::new(cr3 & 0x000f_ffff_ffff_f000))
    }

    /// Build a task with a fresh, empty address space.
    ///
    /// # Errors
    /// [`TaskError::OutOfMemory`] if no frame is left for the root.
    pub fn create<A: FrameAlloc, M: PhysMapper>(
        alloc: &mut A,
        mapper: &M,
    ) -> Result<Self, TaskError> {
        let root = alloc.alloc_frame().ok_or(TaskError::OutOfMemory)?;
        // The fresh root must not carry stale translations.
        unsafe { mapper.phys_to_mut::<PageTable>(root) }.zero();
        log::debug!("task created with root {root}");
        Ok(Self::with_root(root))
    }

    /// Physical address of the root table.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysAddr {
        self.root
    }

    /// The task's address space, viewed through `mapper`.
    #[inline]
    #[must_use]
    pub const fn address_space<'m, M: PhysMapper>(&self, mapper: &'m M) -> AddressSpace<'m, M> {
        AddressSpace::new(mapper, self.root)
    }

    /// Switch the processor to this task's address space.
    ///
    /// # Safety
    /// The space must map the kernel's code, stack and the identity
    /// region, or the next instruction fetch faults unrecoverably.
    #[cfg(target_arch = "x86_64")]
    pub unsafe fn activate<M: PhysMapper>(&self, mapper: &M) {
        unsafe { self.address_space(mapper).activate() }
    }

    /// Map one user-accessible, writable heap page.
    ///
    /// The heap is the only region a task maps explicitly; the stack
    /// region is assumed resident and the low regions belong to the
    /// kernel.
    ///
    /// # Errors
    /// [`TaskError::OutsideHeapRegion`] for addresses outside the heap,
    /// otherwise whatever [`AddressSpace::map`] reports.
    pub fn map_heap<A: FrameAlloc, M: PhysMapper>(
        &self,
        alloc: &mut A,
        mapper: &M,
        va: VirtAddr,
        pa: PhysAddr,
    ) -> Result<(), TaskError> {
        if !matches!(region_of(va.as_u64()), Region::UserHeap) {
            return Err(TaskError::OutsideHeapRegion(va));
        }
        let flags = PageTableEntry::user_rw();
        self.address_space(mapper)
            .map(alloc, va, pa, flags, flags)?;
        Ok(())
    }

    /// Load an executable image into the address space. Extension point.
    ///
    /// # Errors
    /// Always [`TaskError::NotImplemented`].
    pub fn load(&mut self, _image: &[u8]) -> Result<(), TaskError> {
        Err(TaskError::NotImplemented)
    }

    /// Duplicate the address space, fork-like. Extension point.
    ///
    /// # Errors
    /// Always [`TaskError::NotImplemented`].
    pub fn duplicate<A: FrameAlloc, M: PhysMapper>(
        &self,
        _alloc: &mut A,
        _mapper: &M,
    ) -> Result<Self, TaskError> {
        Err(TaskError::NotImplemented)
    }

    /// Unmap a heap page and release its frame. Extension point; needs a
    /// reclamation story first.
    ///
    /// # Errors
    /// Always [`TaskError::NotImplemented`].
    pub fn unmap_heap(&self, _va: VirtAddr) -> Result<(), TaskError> {
        Err(TaskError::NotImplemented)
    }
}
