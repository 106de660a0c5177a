//! # Kernel Virtual-Memory Glue
//!
//! The pieces that sit between the paging core and the rest of the
//! kernel: the page-fault entry point called by the interrupt layer, the
//! [`Task`](task::Task) handle tying an execution context to its address
//! space, and the [`MemoryManager`] bundling the frame pool with the
//! mapper it is reached through.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

pub mod fault;
pub mod task;

use kernel_alloc::{FramePool, IdentityPhysMapper};
use kernel_qemu::QemuLogger;
use kernel_vmem::PhysAddr;
use log::LevelFilter;

/// Install the QEMU debug-port logger. Call once during early init;
/// a second call is ignored.
pub fn init_logging(max_level: LevelFilter) {
    if QemuLogger::init(max_level).is_err() {
        log::warn!("logger already installed");
    }
}

/// The kernel's physical memory management state: the frame pool plus
/// the identity mapper used to touch pool frames and page tables.
pub struct MemoryManager {
    pub pool: FramePool,
    pub mapper: IdentityPhysMapper,
}

impl MemoryManager {
    /// Set up the pool over the frame run starting at `pool_base`.
    ///
    /// `pool_base` and the whole pool must lie below the identity-mapped
    /// boundary; the mapper relies on it.
    #[must_use]
    pub const fn new(pool_base: PhysAddr) -> Self {
        Self {
            pool: FramePool::new(pool_base),
            mapper: IdentityPhysMapper,
        }
    }
}
