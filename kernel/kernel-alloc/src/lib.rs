//! # Physical Frame Allocation
//!
//! The kernel's physical memory manager: a fixed-size bitmap pool of
//! 4 KiB frames ([`FramePool`]) and the identity [`PhysMapper`] used to
//! reach them ([`IdentityPhysMapper`]). The pool lives in the
//! identity-mapped low region, so a physical frame address is directly
//! dereferencable once cast.
//!
//! [`PhysMapper`]: kernel_vmem::PhysMapper

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

mod frame_pool;
mod phys_mapper;

pub use crate::frame_pool::{AllocError, FramePool, FreeError};
pub use crate::phys_mapper::IdentityPhysMapper;
