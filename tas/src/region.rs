//! Raw memory shared between actors.
//!
//! A [`Region`] is a fixed block of zero-initialized bytes that lives for as long as any view into
//! it. Views are built on top by the queue, flow and lookup modules, all of which hold an `Arc` of
//! the region they index into.
//!
//! [`Region`]: struct.Region.html
use core::{fmt, slice};
use core::ptr::NonNull;
use alloc::alloc::{alloc_zeroed, dealloc, Layout};

use crate::{Error, Result};

/// The alignment of heap allocated regions, the same as a mapped page.
pub const PAGE_ALIGN: usize = 4096;

/// A contiguous block of shared bytes.
///
/// The region hands out raw access only. It is up to the views built on top of it to follow the
/// protocols that make concurrent access by other actors sound, such as only touching a ring slot
/// while owning it according to its tag.
pub struct Region {
    ptr: NonNull<u8>,
    len: usize,
    backing: Backing,
}

enum Backing {
    Heap(Layout),
    #[cfg(feature = "std")]
    Mapped,
}

/// Types that may be placed into a region and shared between actors.
///
/// # Safety
///
/// The all-zero bit pattern must be a valid value. Any mutation through a shared reference must go
/// through atomics or be guarded by a lock inside the value. The type must not have drop glue, a
/// region never drops its content.
pub unsafe trait Shared: Sized + Sync { }

impl Region {
    /// Allocate a new zeroed region on the heap.
    pub fn zeroed(len: usize) -> Result<Region> {
        if len == 0 {
            return Err(Error::Illegal);
        }

        let layout = Layout::from_size_align(len, PAGE_ALIGN)
            .map_err(|_| Error::NoCapacity)?;
        // SAFETY: the layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(Error::NoCapacity)?;

        Ok(Region {
            ptr,
            len,
            backing: Backing::Heap(layout),
        })
    }

    /// Take ownership of a mapping.
    ///
    /// # Safety
    ///
    /// `ptr` must be the start of a shared mapping of exactly `len` bytes, created with `mmap`.
    /// The mapping is unmapped when the region is dropped.
    #[cfg(feature = "std")]
    pub(crate) unsafe fn from_mapping(ptr: NonNull<u8>, len: usize) -> Region {
        Region {
            ptr,
            len,
            backing: Backing::Mapped,
        }
    }

    /// The length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Regions are never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// A raw pointer to the first byte.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Check that `len` bytes from `offset` lie within the region.
    pub fn check(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::Truncated),
        }
    }

    /// Borrow a range of bytes.
    ///
    /// # Safety
    ///
    /// No other actor may write to the range for the lifetime of the returned slice.
    pub unsafe fn bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len)?;
        Ok(slice::from_raw_parts(self.as_ptr().add(offset), len))
    }

    /// Mutably borrow a range of bytes.
    ///
    /// # Safety
    ///
    /// No other actor, and no other borrow in this process, may access the range for the lifetime
    /// of the returned slice.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self, offset: usize, len: usize) -> Result<&mut [u8]> {
        self.check(offset, len)?;
        Ok(slice::from_raw_parts_mut(self.as_ptr().add(offset), len))
    }

    /// Interpret a range as an array of shared records.
    ///
    /// Fails with `Truncated` if the range does not fit and with `Illegal` if `offset` is not
    /// aligned for `T`.
    pub fn view<T: Shared>(&self, offset: usize, count: usize) -> Result<&[T]> {
        let len = count.checked_mul(core::mem::size_of::<T>())
            .ok_or(Error::Truncated)?;
        self.check(offset, len)?;

        // SAFETY: in bounds as checked above.
        let start = unsafe { self.as_ptr().add(offset) };
        if start as usize % core::mem::align_of::<T>() != 0 {
            return Err(Error::Illegal);
        }

        // SAFETY: in bounds and aligned. `Shared` guarantees that the zeroed or otherwise
        // initialized memory is a valid `T` and that all mutation goes through its interior.
        Ok(unsafe { slice::from_raw_parts(start as *const T, count) })
    }
}

// SAFETY: the region is only raw memory, all access is through unsafe methods or `Shared` views.
unsafe impl Send for Region { }
unsafe impl Sync for Region { }

impl Drop for Region {
    fn drop(&mut self) {
        match self.backing {
            // SAFETY: allocated with this exact layout in `zeroed`.
            Backing::Heap(layout) => unsafe { dealloc(self.ptr.as_ptr(), layout) },
            #[cfg(feature = "std")]
            Backing::Mapped => {
                // SAFETY: owned mapping of `len` bytes per `from_mapping`.
                let _ = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
            },
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.backing {
            Backing::Heap(_) => "heap",
            #[cfg(feature = "std")]
            Backing::Mapped => "mapped",
        };
        f.debug_struct("Region")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("backing", &kind)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    struct Counter(AtomicU32);
    unsafe impl Shared for Counter { }

    #[test]
    fn zeroed_views() {
        let region = Region::zeroed(256).unwrap();
        let counters = region.view::<Counter>(64, 4).unwrap();
        assert!(counters.iter().all(|c| c.0.load(Ordering::Relaxed) == 0));
        counters[1].0.store(7, Ordering::Relaxed);
        let bytes = unsafe { region.bytes(68, 4).unwrap() };
        assert_eq!(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 7);
    }

    #[test]
    fn bounds_and_alignment() {
        let region = Region::zeroed(128).unwrap();
        assert_eq!(region.view::<Counter>(120, 4).err(), Some(Error::Truncated));
        assert_eq!(region.view::<Counter>(2, 1).err(), Some(Error::Illegal));
        assert_eq!(region.check(usize::max_value(), 2), Err(Error::Truncated));
        assert_eq!(Region::zeroed(0).err(), Some(Error::Illegal));
    }
}
