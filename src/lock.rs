//! Map-wide mutual exclusion: a process-local reentrant mutex for maps
//! created with `shared_lock = false`, and a cross-process atomic lock
//! living in the control header for maps created with `shared_lock = true`.
//!
//! Both implement [`Lock`] so `handle.rs` can serialize writer-side
//! operations without caring which flavor backs a given map.

use crate::consts::offsets;
use crate::control::ControlHeader;
use crate::error::{ShmError, ShmResult};
use crate::platform;
use parking_lot::ReentrantMutex;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Common interface over the two lock flavors.
pub trait Lock: Send + Sync {
    /// Block until the lock is held by this handle, incrementing a reentrancy
    /// counter if this handle already holds it.
    fn acquire(&self) -> ShmResult<()>;

    /// Single non-blocking attempt. Never sleeps: returns
    /// `CannotAcquireLock{blocking_pid, ts}` immediately if the lock is held
    /// by someone else (§4.2/§6.4's `block=false` contract).
    fn try_acquire(&self) -> ShmResult<()>;

    /// Block until the lock is held, or return `CannotAcquireLockTimeout`
    /// after `timeout` has elapsed. If `steal_after_timeout` is set, a timed
    /// out attempt instead checks whether the blocking PID is dead and, if
    /// so, steals the lock from it and keeps waiting rather than failing.
    fn acquire_with_timeout(&self, timeout: Duration, steal_after_timeout: bool) -> ShmResult<()>;

    /// Release one level of reentrancy. A no-op (returns `Ok(false)`) if this
    /// handle does not currently hold the lock.
    fn release(&self) -> ShmResult<bool>;

    /// True if this handle currently holds the lock (at any reentrancy depth).
    fn is_held_by_us(&self) -> bool;
}

/// Process-local lock for maps that do not need cross-process coordination.
/// `parking_lot::ReentrantMutex` gives the same "acquire again from the same
/// thread succeeds" semantics the shared lock provides across processes.
pub struct LocalLock {
    mutex: ReentrantMutex<()>,
    depth: std::sync::atomic::AtomicUsize,
}

impl Default for LocalLock {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLock {
    /// Construct an unlocked local lock.
    pub fn new() -> Self {
        Self {
            mutex: ReentrantMutex::new(()),
            depth: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

impl Lock for LocalLock {
    fn acquire(&self) -> ShmResult<()> {
        std::mem::forget(self.mutex.lock());
        self.depth.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn try_acquire(&self) -> ShmResult<()> {
        if self.depth.load(Ordering::Acquire) > 0 {
            self.depth.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }
        match self.mutex.try_lock() {
            Some(guard) => {
                std::mem::forget(guard);
                self.depth.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
            None => Err(ShmError::CannotAcquireLock {
                blocking_pid: std::process::id(),
                ts: std::time::SystemTime::now(),
            }),
        }
    }

    fn acquire_with_timeout(&self, _timeout: Duration, _steal_after_timeout: bool) -> ShmResult<()> {
        self.acquire()
    }

    fn release(&self) -> ShmResult<bool> {
        if self.depth.load(Ordering::Acquire) == 0 {
            return Ok(false);
        }
        self.depth.fetch_sub(1, Ordering::AcqRel);
        unsafe {
            self.mutex.force_unlock();
        }
        Ok(true)
    }

    fn is_held_by_us(&self) -> bool {
        self.depth.load(Ordering::Acquire) > 0
    }
}

/// A busy-wait atomic lock living in the control segment's `lock_word` and
/// `lock_owner_pid` fields, usable by unrelated processes that each attach
/// their own `SharedLock` over the same control segment.
///
/// Grounded on `original_source/UltraDict.py`'s `SharedLock`: `test_and_inc`
/// maps to a `0 -> 1` compare-exchange on the lock byte, `test_and_dec` to
/// the inverse, and the owner PID is recorded for `steal`/`steal_from_dead`
/// and for diagnosing who is holding a contested lock.
pub struct SharedLock {
    header: ControlHeader,
    pid: u32,
    depth: std::sync::atomic::AtomicUsize,
    sleep_time: Duration,
}

impl SharedLock {
    /// Wrap a control header view. `sleep_time` is the busy-wait backoff
    /// between failed acquire attempts.
    pub fn new(header: ControlHeader, sleep_time: Duration) -> Self {
        Self {
            header,
            pid: platform::get_current_pid(),
            depth: std::sync::atomic::AtomicUsize::new(0),
            sleep_time,
        }
    }

    fn test_and_inc(&self) -> bool {
        self.header
            .lock_word_byte()
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn test_and_dec(&self) -> ShmResult<()> {
        match self
            .header
            .lock_word_byte()
            .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(_) => Err(ShmError::StreamCorrupt {
                position: offsets::LOCK_WORD,
                detail: "failed to release shared lock: lock word was not 1".to_string(),
            }),
        }
    }

    fn check_not_forked(&self) -> ShmResult<()> {
        let current = platform::get_current_pid();
        if self.depth.load(Ordering::Acquire) > 0 && current != self.pid {
            return Err(ShmError::ForkedWhileLocked {
                original_pid: self.pid,
                current_pid: current,
            });
        }
        Ok(())
    }

    fn try_acquire_once(&self) -> Result<(), u32> {
        if self.test_and_inc() {
            self.header.set_lock_owner_pid(self.pid);
            Ok(())
        } else {
            Err(self.header.lock_owner_pid())
        }
    }

    /// Forcibly take the lock from `from_pid`, e.g. after confirming via
    /// [`platform::is_process_alive`] that it is dead. `release` immediately
    /// releases the stolen lock rather than keeping it held by this handle.
    pub fn steal(&self, from_pid: u32, release: bool) -> ShmResult<bool> {
        if self.depth.load(Ordering::Acquire) > 0 {
            return Err(ShmError::CannotAcquireLock {
                blocking_pid: self.pid,
                ts: std::time::SystemTime::now(),
            });
        }
        if self.header.lock_word_byte().load(Ordering::Acquire) == 0 {
            return Ok(false);
        }
        if self.header.lock_owner_pid() != from_pid {
            return Ok(false);
        }
        let stole = self
            .header
            .cas_lock_owner_pid(from_pid, self.pid)
            .is_ok();
        if stole {
            self.depth.store(1, Ordering::Release);
            if release {
                self.release()?;
            }
        }
        Ok(stole)
    }

    /// [`Self::steal`], but first verifies `from_pid` is no longer alive.
    pub fn steal_from_dead(&self, from_pid: u32, release: bool) -> ShmResult<bool> {
        if platform::is_process_alive(from_pid) {
            return Err(ShmError::ProcessNotFound { pid: from_pid });
        }
        self.steal(from_pid, release)
    }

    /// Unconditionally clear the lock. Only safe when the caller has
    /// independently established that no other handle is using it.
    pub fn reset(&self) {
        self.header.lock_word_byte().store(0, Ordering::Release);
        self.header.set_lock_owner_pid(0);
        self.depth.store(0, Ordering::Release);
    }

    /// Snapshot of the lock's current state for diagnostics.
    pub fn status(&self) -> SharedLockStatus {
        SharedLockStatus {
            held_by_us: self.depth.load(Ordering::Acquire) > 0,
            locked: self.header.lock_word_byte().load(Ordering::Acquire) == 1,
            owner_pid: self.header.lock_owner_pid(),
            our_pid: self.pid,
        }
    }
}

/// Point-in-time view of a [`SharedLock`], mirroring
/// `original_source/UltraDict.py`'s `SharedLock.status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedLockStatus {
    /// Whether this handle currently holds the lock.
    pub held_by_us: bool,
    /// Whether the lock word indicates any handle holds it.
    pub locked: bool,
    /// PID recorded as the current owner, or 0.
    pub owner_pid: u32,
    /// PID of the process evaluating this status.
    pub our_pid: u32,
}

impl Lock for SharedLock {
    fn acquire(&self) -> ShmResult<()> {
        self.check_not_forked()?;
        if self.depth.load(Ordering::Acquire) > 0 {
            self.depth.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }
        loop {
            match self.try_acquire_once() {
                Ok(()) => {
                    self.depth.store(1, Ordering::Release);
                    return Ok(());
                }
                Err(_) => std::thread::sleep(self.sleep_time),
            }
        }
    }

    fn try_acquire(&self) -> ShmResult<()> {
        self.check_not_forked()?;
        if self.depth.load(Ordering::Acquire) > 0 {
            self.depth.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }
        match self.try_acquire_once() {
            Ok(()) => {
                self.depth.store(1, Ordering::Release);
                Ok(())
            }
            Err(blocking_pid) => Err(ShmError::CannotAcquireLock {
                blocking_pid,
                ts: std::time::SystemTime::now(),
            }),
        }
    }

    fn acquire_with_timeout(&self, timeout: Duration, steal_after_timeout: bool) -> ShmResult<()> {
        self.check_not_forked()?;
        if self.depth.load(Ordering::Acquire) > 0 {
            self.depth.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }
        let mut start = Instant::now();
        let mut waiting_on: Option<u32> = None;
        loop {
            match self.try_acquire_once() {
                Ok(()) => {
                    self.depth.store(1, Ordering::Release);
                    return Ok(());
                }
                Err(blocking_pid) => {
                    // §4.2: "if the PID changed during the wait, the timer restarts".
                    if waiting_on != Some(blocking_pid) {
                        waiting_on = Some(blocking_pid);
                        start = Instant::now();
                    }
                    if start.elapsed() < timeout {
                        std::thread::sleep(self.sleep_time);
                        continue;
                    }
                    if steal_after_timeout {
                        if !platform::is_process_alive(blocking_pid)
                            && self.steal(blocking_pid, false)?
                        {
                            return Ok(());
                        }
                        // Either still alive, or another handle raced the
                        // steal first; restart the wait against whoever
                        // holds it now.
                        waiting_on = None;
                        std::thread::sleep(self.sleep_time);
                        continue;
                    }
                    return Err(ShmError::CannotAcquireLockTimeout {
                        blocking_pid,
                        time_passed: start.elapsed(),
                    });
                }
            }
        }
    }

    fn release(&self) -> ShmResult<bool> {
        self.check_not_forked()?;
        if self.depth.load(Ordering::Acquire) == 0 {
            return Ok(false);
        }
        let owner = self.header.lock_owner_pid();
        if owner != self.pid {
            return Err(ShmError::StreamCorrupt {
                position: offsets::LOCK_OWNER_PID,
                detail: format!("lock owned by pid {owner} was stolen from pid {}", self.pid),
            });
        }
        let remaining = self.depth.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 {
            self.header.set_lock_owner_pid(0);
            self.test_and_dec()?;
        }
        Ok(true)
    }

    fn is_held_by_us(&self) -> bool {
        self.depth.load(Ordering::Acquire) > 0
    }
}
