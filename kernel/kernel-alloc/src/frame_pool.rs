//! # Bitmap Frame Pool
//!
//! A fixed pool of [`POOL_FRAMES`] physical frames starting at a given
//! base, tracked by one bit per frame. Allocation is a first-fit scan
//! over the bitmap words; fully used words are skipped without testing
//! individual bits.
//!
//! [`POOL_FRAMES`]: kernel_info::memory::POOL_FRAMES

use kernel_info::memory::{FRAME_SIZE, POOL_BYTES, POOL_FRAMES};
use kernel_vmem::{FrameAlloc, PhysAddr};

const BITMAP_WORDS: usize = POOL_FRAMES / 64;

/// The pool has no free frame left.
///
/// Recoverable: frames freed later become allocatable again.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("physical frame pool exhausted")]
pub struct AllocError;

/// A free request named an address the pool never handed out.
///
/// This means allocator state corruption or a caller bug; the pool's
/// bookkeeping can no longer be trusted, so callers treat it as fatal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("invalid frame free: {0} was not allocated from this pool")]
pub struct FreeError(pub PhysAddr);

/// A bitmap allocator over a contiguous run of physical frames.
///
/// A set bit marks a frame in use. Not reentrant; callers on more than
/// one execution context must serialize access externally.
pub struct FramePool {
    base: PhysAddr,
    bitmap: [u64; BITMAP_WORDS],
    in_use: usize,
}

impl FramePool {
    /// An empty pool whose frames start at `base`.
    ///
    /// `base` must be frame-aligned and the `POOL_BYTES` run starting
    /// there must be real, otherwise-unused physical memory.
    #[must_use]
    pub const fn new(base: PhysAddr) -> Self {
        debug_assert!(base.is_frame_aligned());
        Self {
            base,
            bitmap: [0; BITMAP_WORDS],
            in_use: 0,
        }
    }

    /// Claim the lowest free frame.
    ///
    /// # Errors
    /// [`AllocError`] when every frame is in use.
    pub fn allocate(&mut self) -> Result<PhysAddr, AllocError> {
        for (word_index, word) in self.bitmap.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let bit = (!*word).trailing_zeros() as usize;
            *word |= 1 << bit;
            self.in_use += 1;

            let frame_index = word_index * 64 + bit;
            let pa = PhysAddr::new(self.base.as_u64() + (frame_index as u64) * FRAME_SIZE);
            log::trace!("frame alloc {pa}");
            return Ok(pa);
        }
        log::warn!("frame pool exhausted ({POOL_FRAMES} frames in use)");
        Err(AllocError)
    }

    /// Return a frame to the pool.
    ///
    /// # Errors
    /// [`FreeError`] if `pa` is outside the pool, not frame-aligned, or
    /// not currently allocated. The pool is left unchanged; the caller
    /// decides how to halt.
    pub fn free(&mut self, pa: PhysAddr) -> Result<(), FreeError> {
        let offset = pa.as_u64().wrapping_sub(self.base.as_u64());
        if offset >= POOL_BYTES || !pa.is_frame_aligned() {
            log::error!("free of {pa}: outside pool at {}", self.base);
            return Err(FreeError(pa));
        }

        let frame_index = (offset / FRAME_SIZE) as usize;
        let word = &mut self.bitmap[frame_index / 64];
        let mask = 1u64 << (frame_index % 64);
        if *word & mask == 0 {
            log::error!("free of {pa}: frame is not allocated");
            return Err(FreeError(pa));
        }

        *word &= !mask;
        self.in_use -= 1;
        log::trace!("frame free {pa}");
        Ok(())
    }

    /// Frames currently handed out.
    #[must_use]
    pub const fn allocated(&self) -> usize {
        self.in_use
    }

    /// Total frames the pool manages.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        POOL_FRAMES
    }
}

impl FrameAlloc for FramePool {
    fn alloc_frame(&mut self) -> Option<PhysAddr> {
        self.allocate().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u64 = 0x10_0000;

    fn pool() -> FramePool {
        FramePool::new(PhysAddr::new(BASE))
    }

    #[test]
    fn frames_are_unique_aligned_and_in_range() {
        let mut p = pool();
        let mut seen = Vec::new();
        for _ in 0..POOL_FRAMES {
            let pa = p.allocate().expect("frame");
            assert!(pa.is_frame_aligned());
            assert!(pa.as_u64() >= BASE);
            assert!(pa.as_u64() < BASE + POOL_BYTES);
            assert!(!seen.contains(&pa), "frame handed out twice");
            seen.push(pa);
        }
        assert_eq!(p.allocated(), p.capacity());
    }

    #[test]
    fn exhaustion_is_recoverable() {
        let mut p = pool();
        let frames: Vec<_> = (0..POOL_FRAMES).map(|_| p.allocate().unwrap()).collect();
        assert_eq!(p.allocate(), Err(AllocError));

        p.free(frames[17]).expect("free");
        assert_eq!(p.allocate(), Ok(frames[17]), "freed frame is reused");
        assert_eq!(p.allocate(), Err(AllocError));
    }

    #[test]
    fn first_fit_prefers_the_lowest_free_frame() {
        let mut p = pool();
        let a = p.allocate().unwrap();
        let b = p.allocate().unwrap();
        let _c = p.allocate().unwrap();

        p.free(a).unwrap();
        p.free(b).unwrap();
        assert_eq!(p.allocate(), Ok(a));
        assert_eq!(p.allocate(), Ok(b));
    }

    #[test]
    fn free_rejects_foreign_addresses() {
        let mut p = pool();
        let below = PhysAddr::new(BASE - FRAME_SIZE);
        let beyond = PhysAddr::new(BASE + POOL_BYTES);
        assert_eq!(p.free(below), Err(FreeError(below)));
        assert_eq!(p.free(beyond), Err(FreeError(beyond)));
    }

    #[test]
    fn free_rejects_unaligned_addresses() {
        let mut p = pool();
        let pa = p.allocate().unwrap();
        let inside = PhysAddr::new(pa.as_u64() + 0x800);
        assert_eq!(p.free(inside), Err(FreeError(inside)));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut p = pool();
        let pa = p.allocate().unwrap();
        p.free(pa).expect("first free");
        assert_eq!(p.free(pa), Err(FreeError(pa)));
        assert_eq!(p.allocated(), 0, "failed free does not corrupt the count");
    }

    #[test]
    fn free_of_never_allocated_pool_frame_is_rejected() {
        let mut p = pool();
        let _ = p.allocate().unwrap();
        let untouched = PhysAddr::new(BASE + 5 * FRAME_SIZE);
        assert_eq!(p.free(untouched), Err(FreeError(untouched)));
    }
}
