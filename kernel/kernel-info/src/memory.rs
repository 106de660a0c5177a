//! # Memory Layout
//!
//! The virtual-address-space contract is fixed and not negotiable by
//! callers:
//!
//! ```text
//! +----------------------+ 0xffff_ffff_ffff_ffff
//! | Higher half (unused) |
//! +----------------------+ 0x0000_8000_0000_0000
//! | User heap + code     |  explicit mapping required
//! +----------------------+ 0x0000_0020_0000_0000 (128 GiB)
//! | User stack           |  grows down, assumed resident
//! +----------------------+ 0x0000_0000_4000_0000 (1 GiB)
//! | Kernel               |
//! +----------------------+ 0x0000_0000_0020_0000 (2 MiB)
//! | Identity-mapped low  |  BIOS, VGA, kernel image, APIC
//! +----------------------+ 0x0
//! ```

/// Size of one physical frame, the allocation granularity. Also the size
/// of one page table.
pub const FRAME_SIZE: u64 = 0x1000;

/// Number of frames in the physical pool handed to the frame allocator.
pub const POOL_FRAMES: usize = 64;

/// Total byte size of the physical pool.
pub const POOL_BYTES: u64 = (POOL_FRAMES as u64) * FRAME_SIZE;

/// End of the identity-mapped low region (exclusive).
///
/// Everything below this address is identity mapped at boot, so physical
/// frames taken from the pool can be touched directly.
pub const IDENTITY_END: u64 = 0x20_0000; // 2 MiB

/// End of the kernel virtual region (exclusive).
pub const KERNEL_SPACE_END: u64 = 0x4000_0000; // 1 GiB

/// Top of the user stack region. Stacks grow down from here and are
/// assumed always resident; no explicit mapping is needed.
pub const USER_STACK_TOP: u64 = 0x20_0000_0000; // 128 GiB

/// End of the user heap/code region (exclusive). Addresses in
/// `USER_STACK_TOP..USER_HEAP_END` must be mapped explicitly before use.
pub const USER_HEAP_END: u64 = 0x8000_0000_0000; // 128 TiB

/// Which part of the fixed layout a virtual address falls into.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Region {
    /// Below 2 MiB: identity mapped, reserved for the kernel image and
    /// legacy hardware.
    Identity,
    /// 2 MiB to 1 GiB: kernel addresses.
    Kernel,
    /// 1 GiB to 128 GiB: user stacks, resident without explicit mapping.
    UserStack,
    /// 128 GiB to 128 TiB: user heap and code, explicit mapping required.
    UserHeap,
    /// Above 128 TiB: outside the layout contract.
    OutOfContract,
}

/// Classify a virtual address against the fixed layout.
#[must_use]
pub const fn region_of(va: u64) -> Region {
    if va < IDENTITY_END {
        Region::Identity
    } else if va < KERNEL_SPACE_END {
        Region::Kernel
    } else if va < USER_STACK_TOP {
        Region::UserStack
    } else if va < USER_HEAP_END {
        Region::UserHeap
    } else {
        Region::OutOfContract
    }
}

const _: () = {
    assert!(FRAME_SIZE.is_power_of_two());
    assert!(POOL_FRAMES % 64 == 0);
    assert!(IDENTITY_END < KERNEL_SPACE_END);
    assert!(KERNEL_SPACE_END < USER_STACK_TOP);
    assert!(USER_STACK_TOP < USER_HEAP_END);
};
