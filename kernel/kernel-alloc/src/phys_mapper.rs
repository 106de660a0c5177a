//! # Identity Physical Mapper
//!
//! The frame pool and every page table it produces live below the
//! identity-mapped boundary, so converting a physical address to a
//! pointer is a plain cast.

use kernel_info::memory::IDENTITY_END;
use kernel_vmem::{PhysAddr, PhysMapper};

/// [`PhysMapper`] for the identity-mapped low region.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysAddr) -> &'a mut T {
        debug_assert!(pa.as_u64() < IDENTITY_END, "address not identity mapped");

        // SAFETY: below IDENTITY_END virtual and physical addresses
        // coincide; the caller guarantees exclusivity and a matching T.
        unsafe { &mut *(pa.as_u64() as usize as *mut T) }
    }
}
