//! Seed memory handling and process hardening
//!
//! Two jobs, both best-effort:
//!
//! 1. [`disable_core_dumps`]: a crash must never write seed bytes to disk.
//! 2. [`LockedSeed`]: the one heap allocation that holds the master seed,
//!    pinned into RAM while it lives and scrubbed (random, 0xFF, 0x00)
//!    before its pages are released.
//!
//! Failures are logged and tolerated. Containers and unprivileged users
//! often forbid `setrlimit` and `mlock`, and refusing to run there would
//! cost more than the hardening buys.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::master::MASTER_SEED_LEN;
use crate::primitives;

static HARDENED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the whole process. Call once, early; repeat
/// calls are no-ops that report success.
pub fn disable_core_dumps() -> bool {
    if HARDENED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        let rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with a zero RLIMIT_CORE is a plain POSIX call
        if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) } != 0 {
            log::warn!(
                "could not disable core dumps: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    #[cfg(not(unix))]
    {
        log::warn!("core dump prevention is not available on this platform");
        false
    }
}

/// The master seed's home in memory.
///
/// Owns exactly one `MASTER_SEED_LEN`-byte heap allocation. On creation
/// the pages are `mlock`ed so the seed cannot reach swap; on drop the
/// buffer is scrubbed through [`primitives::scrub`] and then unlocked.
/// There is deliberately no way to resize, clone, or serialize this type.
pub struct LockedSeed {
    bytes: Box<[u8; MASTER_SEED_LEN]>,
    pinned: bool,
}

impl LockedSeed {
    /// Copy `seed` into fresh locked storage. The caller still owns (and
    /// should scrub) its own copy.
    pub fn new(seed: &[u8; MASTER_SEED_LEN]) -> Self {
        let bytes = Box::new(*seed);
        let pinned = pin(bytes.as_ptr(), bytes.len());
        if !pinned {
            log::warn!("master seed pages are not locked and may reach swap");
        }
        Self { bytes, pinned }
    }

    pub fn expose(&self) -> &[u8; MASTER_SEED_LEN] {
        &self.bytes
    }

    /// Whether the pages are actually pinned in RAM.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }
}

impl Drop for LockedSeed {
    fn drop(&mut self) {
        // Scrub while the pages are still locked, then release them
        primitives::scrub(self.bytes.as_mut_slice());
        if self.pinned {
            unpin(self.bytes.as_ptr(), self.bytes.len());
        }
    }
}

fn pin(ptr: *const u8, len: usize) -> bool {
    #[cfg(unix)]
    {
        // SAFETY: ptr/len describe the live Box allocation owned by the caller
        if unsafe { libc::mlock(ptr as *const libc::c_void, len) } != 0 {
            log::warn!("mlock failed: {}", std::io::Error::last_os_error());
            return false;
        }
        true
    }

    #[cfg(not(unix))]
    {
        let _ = (ptr, len);
        false
    }
}

fn unpin(ptr: *const u8, len: usize) {
    #[cfg(unix)]
    {
        // SAFETY: matches the successful mlock in `pin`
        unsafe {
            libc::munlock(ptr as *const libc::c_void, len);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (ptr, len);
    }
}
