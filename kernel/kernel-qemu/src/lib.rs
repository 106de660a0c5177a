//! # QEMU Debug Output
//!
//! Byte-at-a-time output to QEMU's debug console (I/O port `0x402`,
//! enabled on the host with `-debugcon stdio`). Two entry points:
//!
//! - [`QemuLogger`], a [`log::Log`] implementation so the rest of the
//!   kernel can use the standard `log` macros;
//! - [`qemu_trace!`], a direct no-allocation trace macro for code that
//!   runs before the logger is installed.
//!
//! With the `enabled` feature off, everything compiles to no-ops.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// The port number for QEMU's debug console.
    const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to QEMU's debug port.
    #[inline]
    pub fn dbg_putc(c: u8) {
        #[cfg(target_arch = "x86_64")]
        // SAFETY: writing a byte to the debug port has no memory effects;
        // on real hardware the port is simply unused.
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") QEMU_DEBUG_PORT,
                in("al") c,
                options(nomem, preserves_flags)
            );
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = c;
    }

    /// `fmt::Write` sink over the debug port.
    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort debug output; errors are ignored.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(_: fmt::Arguments) {}
}

/// Format directly to the QEMU debug console without allocating.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
