//! Hardware and OS queries the sampling pipeline depends on.
//!
//! The emulator publishes every time-valued counter in raw ticks of the
//! ARM generic timer, so converting to wall time needs the counter frequency
//! from `CNTFRQ_EL0`. On non-ARM64 hosts (development builds only) the
//! frequency is stubbed to 1 and derived loads are not meaningful.

#![allow(unsafe_code)] // register reads and barriers require inline asm

/// Ticks per second of the hardware cycle counter.
#[must_use]
pub fn cycle_counter_frequency() -> u64 {
    #[cfg(target_arch = "aarch64")]
    {
        let freq: u64;
        // SAFETY: CNTFRQ_EL0 is readable from EL0 on all aarch64 systems.
        unsafe {
            std::arch::asm!("mrs {}, cntfrq_el0", out(reg) freq, options(nomem, nostack));
        }
        freq
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        1
    }
}

/// Store-side memory barrier over the inner-shareable domain.
///
/// Executed before each sampling pass so that counter stores made by the
/// emulator's threads are observable to our subsequent volatile loads.
pub fn store_memory_barrier() {
    #[cfg(target_arch = "aarch64")]
    {
        // SAFETY: dmb ishst only orders memory operations.
        unsafe {
            std::arch::asm!("dmb ishst", options(nostack));
        }
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
    }
}

/// Number of hardware threads available to this process.
#[must_use]
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_is_nonzero() {
        assert!(cycle_counter_frequency() >= 1);
    }

    #[test]
    fn test_concurrency_is_nonzero() {
        assert!(hardware_concurrency() >= 1);
    }
}
