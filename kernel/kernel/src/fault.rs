//! # Page-Fault Entry Point
//!
//! Called by the interrupt layer with the faulting instruction pointer,
//! the fault-address register value and the hardware error code.
//!
//! Current policy: every fault is terminal. [`FaultKind`] names the
//! taxonomy a real policy needs, minor faults (mapping is legal, install
//! it lazily) versus major faults (contract violation, terminate the
//! owning task). Classification is future work; nothing here guesses
//! which faults could be minor.

use bitfield_struct::bitfield;
use kernel_vmem::VirtAddr;

/// The hardware error code pushed for a page fault.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageFaultError {
    /// Bit 0: set if the fault hit a present entry (protection fault),
    /// clear if the translation was missing.
    pub protection_violation: bool,

    /// Bit 1: the access was a write.
    pub caused_by_write: bool,

    /// Bit 2: the access came from user mode.
    pub user_mode: bool,

    /// Bit 3: a reserved bit was set in a table entry.
    pub malformed_table: bool,

    /// Bit 4: the access was an instruction fetch.
    pub instruction_fetch: bool,

    /// Bit 5: a protection-key check failed.
    pub protection_key: bool,

    /// Bit 6: a shadow-stack access fault.
    pub shadow_stack: bool,

    #[bits(57)]
    __: u64,
}

impl PageFaultError {
    /// A short human-readable account of the error bits.
    #[must_use]
    pub const fn explain(self) -> &'static str {
        match (
            self.protection_violation(),
            self.caused_by_write(),
            self.user_mode(),
        ) {
            (false, false, false) => "kernel read of unmapped address",
            (false, false, true) => "user read of unmapped address",
            (false, true, false) => "kernel write to unmapped address",
            (false, true, true) => "user write to unmapped address",
            (true, false, false) => "kernel read denied by protection",
            (true, false, true) => "user read denied by protection",
            (true, true, false) => "kernel write denied by protection",
            (true, true, true) => "user write denied by protection",
        }
    }
}

/// Everything the interrupt layer knows about one page fault.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FaultRecord {
    /// Instruction pointer at the time of the fault.
    pub instruction: VirtAddr,
    /// The address whose translation failed (fault-address register).
    pub address: VirtAddr,
    /// The pushed hardware error code.
    pub error: PageFaultError,
}

/// The fault taxonomy a non-terminal policy has to implement.
///
/// Declared only; [`handle_page_fault`] does not classify yet.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultKind {
    /// The mapping is legal but not yet installed; resolvable by mapping
    /// the page and resuming.
    Minor,
    /// The access violates the address-space contract; the owning task
    /// must be terminated.
    Major,
}

/// Terminal page-fault handler: log the record, then halt permanently.
pub fn handle_page_fault(record: &FaultRecord) -> ! {
    log::error!(
        "PAGE FAULT at rip={}: {} ({})",
        record.instruction,
        record.address,
        record.error.explain(),
    );
    halt()
}

/// Stop this execution context for good.
pub fn halt() -> ! {
    loop {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack, preserves_flags));
        }
        #[cfg(not(target_arch = "x86_64"))]
        core::hint::spin_loop();
    }
}
