use core::hint::spin_loop;
use core::sync::atomic::{AtomicU32, Ordering};

/// The 32-bit spin lock embedded in each flow record.
///
/// Zero is unlocked. Any actor on the shared memory may take it, there is no owner tracking and no
/// fairness. Critical sections are a handful of register updates.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct SpinLock(AtomicU32);

impl SpinLock {
    /// An unlocked lock.
    pub const fn new() -> Self {
        SpinLock(AtomicU32::new(0))
    }

    /// Try to take the lock once.
    pub fn try_lock(&self) -> bool {
        self.0.compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed).is_ok()
    }

    /// Spin until the lock is taken.
    pub fn lock(&self) {
        while !self.try_lock() {
            while self.0.load(Ordering::Relaxed) != 0 {
                spin_loop();
            }
        }
    }

    /// Release the lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock.
    pub unsafe fn unlock(&self) {
        self.0.store(0, Ordering::Release);
    }

    /// Whether any actor holds the lock right now.
    pub fn is_locked(&self) -> bool {
        self.0.load(Ordering::Relaxed) != 0
    }
}
