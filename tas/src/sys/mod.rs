//! Operating system glue: shared memory objects, event descriptors and waiting.
//!
//! Everything here wraps raw `libc` calls. Failures are reported as the [`Errno`] of the call, which
//! converts into an `std::io::Error` for display.
//!
//! [`Errno`]: struct.Errno.html
#![allow(unsafe_code)]
use core::mem;
use core::ptr::{self, NonNull};
use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

use crate::region::Region;
use crate::time::{Duration, Instant};

/// An errno value.
///
/// This is used as the error representation of raw libc calls. It can be converted into a
/// `std::io::Error` where it will consequently have much more extensive error information.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Errno(pub libc::c_int);

#[derive(Clone, Copy)]
struct FdResult(libc::c_int);

#[derive(Clone, Copy)]
struct IoLenResult(libc::ssize_t);

#[derive(Clone, Copy)]
struct MapResult(*mut libc::c_void);

/// Trait for interpreting return values of libc calls.
///
/// Failure signals may vary between:
/// * `-1`
/// * `MAP_FAILED`
trait LibcResult: Copy {
    fn is_fail(self) -> bool;

    fn errno(self) -> Result<(), Errno> {
        if self.is_fail() {
            Err(Errno::new())
        } else {
            Ok(())
        }
    }
}

impl Errno {
    /// The errno of the last failed call on this thread.
    pub fn new() -> Errno {
        Errno(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

impl LibcResult for FdResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl LibcResult for IoLenResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl LibcResult for MapResult {
    fn is_fail(self) -> bool {
        self.0 == libc::MAP_FAILED
    }
}

impl From<Errno> for io::Error {
    fn from(err: Errno) -> io::Error {
        io::Error::from_raw_os_error(err.0)
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(&io::Error::from(*self), f)
    }
}

impl std::error::Error for Errno {}

fn c_string(name: &str) -> Result<CString, Errno> {
    CString::new(name).map_err(|_| Errno(libc::EINVAL))
}

/// Open a shared memory object and map it completely.
///
/// The name is given without the leading slash. The size is taken from the object.
pub fn map_shm(name: &str) -> Result<Region, Errno> {
    let path = c_string(&format!("/{}", name))?;
    let fd = unsafe { libc::shm_open(path.as_ptr(), libc::O_RDWR, 0) };
    FdResult(fd).errno()?;
    let result = file_len(fd).and_then(|len| map_fd(fd, len));
    close(fd);
    result
}

/// Create a new shared memory object of `len` bytes and map it.
///
/// Fails with `EEXIST` if an object with that name exists already.
pub fn create_shm(name: &str, len: usize) -> Result<Region, Errno> {
    let path = c_string(&format!("/{}", name))?;
    let flags = libc::O_RDWR | libc::O_CREAT | libc::O_EXCL;
    let fd = unsafe { libc::shm_open(path.as_ptr(), flags, 0o600) };
    FdResult(fd).errno()?;

    let result = truncate(fd, len).and_then(|()| map_fd(fd, len));
    close(fd);
    if result.is_err() {
        let _ = unsafe { libc::shm_unlink(path.as_ptr()) };
    }
    result
}

/// Remove the name of a shared memory object, existing mappings stay valid.
pub fn unlink_shm(name: &str) -> Result<(), Errno> {
    let path = c_string(&format!("/{}", name))?;
    FdResult(unsafe { libc::shm_unlink(path.as_ptr()) }).errno()
}

/// Map a file, such as one backed by huge pages, completely.
pub fn map_file(path: &str) -> Result<Region, Errno> {
    let path = c_string(path)?;
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
    FdResult(fd).errno()?;
    let result = file_len(fd).and_then(|len| map_fd(fd, len));
    close(fd);
    result
}

fn file_len(fd: RawFd) -> Result<usize, Errno> {
    let stat = unsafe {
        let mut stat = mem::MaybeUninit::<libc::stat>::uninit();
        FdResult(libc::fstat(fd, stat.as_mut_ptr())).errno()?;
        stat.assume_init()
    };
    Ok(stat.st_size as usize)
}

fn truncate(fd: RawFd, len: usize) -> Result<(), Errno> {
    let len = libc::off_t::try_from(len).map_err(|_| Errno(libc::EINVAL))?;
    FdResult(unsafe { libc::ftruncate(fd, len) }).errno()
}

fn map_fd(fd: RawFd, len: usize) -> Result<Region, Errno> {
    if len == 0 {
        return Err(Errno(libc::EINVAL));
    }

    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED | libc::MAP_POPULATE,
            fd,
            0)
    };
    MapResult(ptr).errno()?;

    let ptr = NonNull::new(ptr.cast::<u8>()).ok_or(Errno(libc::ENOMEM))?;
    // SAFETY: a fresh shared mapping of exactly `len` bytes.
    Ok(unsafe { Region::from_mapping(ptr, len) })
}

fn close(fd: RawFd) {
    let _ = unsafe { libc::close(fd) };
}

/// An event file descriptor to wake a sleeping actor.
#[derive(Debug)]
pub struct EventFd {
    fd: RawFd,
}

impl EventFd {
    /// Create a new non-blocking event descriptor.
    pub fn new() -> Result<Self, Errno> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        FdResult(fd).errno()?;
        Ok(EventFd { fd })
    }

    /// The underlying descriptor, to be shared with other processes.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Signal the descriptor.
    pub fn kick(&self) -> Result<(), Errno> {
        kick(self.fd)
    }

    /// Reset the descriptor, returning the number of kicks since the last reset.
    pub fn drain(&self) -> Result<u64, Errno> {
        let mut value = 0u64;
        let res = unsafe {
            libc::read(self.fd, (&mut value as *mut u64).cast(), mem::size_of::<u64>())
        };
        match IoLenResult(res).errno() {
            Ok(()) => Ok(value),
            Err(Errno(libc::EAGAIN)) => Ok(0),
            Err(err) => Err(err),
        }
    }

    /// Wait until the descriptor is signalled, but no longer than the timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), Errno> {
        wait(self.fd, timeout)
    }
}

impl Drop for EventFd {
    fn drop(&mut self) {
        close(self.fd)
    }
}

/// Signal an event descriptor owned by another actor.
pub fn kick(fd: RawFd) -> Result<(), Errno> {
    let value = 1u64;
    let res = unsafe {
        libc::write(fd, (&value as *const u64).cast(), mem::size_of::<u64>())
    };
    IoLenResult(res).errno()
}

/// Wait until given file descriptor becomes readable, but no longer than given timeout.
pub fn wait(fd: RawFd, duration: Option<Duration>) -> Result<(), Errno> {
    let mut readfds;

    unsafe {
        let mut readfds_init = mem::MaybeUninit::<libc::fd_set>::uninit();
        libc::FD_ZERO(readfds_init.as_mut_ptr());
        libc::FD_SET(fd, readfds_init.as_mut_ptr());
        readfds = readfds_init.assume_init();
    }

    let mut timeout = libc::timeval { tv_sec: 0, tv_usec: 0 };
    let timeout = duration.map(|duration| {
        timeout.tv_sec = duration.as_secs() as libc::time_t;
        timeout.tv_usec = duration.subsec_micros() as libc::suseconds_t;
        &mut timeout
    });

    let timeout_ptr = timeout
        .map(|reference| reference as *mut _)
        .unwrap_or_else(ptr::null_mut);

    let res = unsafe {
        libc::select(
            fd + 1,
            &mut readfds,
            ptr::null_mut(),
            ptr::null_mut(),
            timeout_ptr)
    };

    FdResult(res).errno()
}

/// The current monotonic time.
pub fn now() -> Result<Instant, Errno> {
    let ts = unsafe {
        let mut ts = mem::MaybeUninit::<libc::timespec>::uninit();
        FdResult(libc::clock_gettime(libc::CLOCK_MONOTONIC, ts.as_mut_ptr())).errno()?;
        ts.assume_init()
    };

    Ok(Instant::from_micros(ts.tv_sec as i64 * 1_000_000 + ts.tv_nsec as i64 / 1_000))
}
