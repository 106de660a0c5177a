//! # Kernel Configuration Constants
//!
//! Central place for the constants the other kernel crates agree on:
//! the physical frame pool geometry and the fixed virtual-address-space
//! layout. Keeping them in a leaf crate avoids dependency cycles between
//! the allocator and the paging code.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
