//! Read-only view over a live stats region.
//!
//! ## Safe-read protocol
//!
//! The producer updates the region concurrently with our reads and never
//! coordinates with us, so the whole module is built around three rules:
//!
//! 1. No long-lived references into the mapping. Every read goes through a
//!    volatile load and returns an owned copy.
//! 2. Every record offset is bounds-checked against the mapped length before
//!    it is dereferenced; a bad offset truncates the walk, it never faults.
//! 3. Record copies happen at the record's natural atomic width: 16-byte
//!    volatile loads on aarch64 (single-copy atomic since ARMv8.4), byte-wise
//!    volatile loads on development hosts.
//!
//! The region may grow while we are attached; [`StatsRegion::check_resize`]
//! remaps at the new length and the base pointer must be re-read afterwards.

#![allow(unsafe_code)] // raw mmap access, encapsulated behind owned-copy reads

use std::num::NonZeroUsize;
use std::os::fd::{AsRawFd, OwnedFd};
use std::ptr::{self, NonNull};

use nix::fcntl::OFlag;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;

use super::layout::{RegionHeader, ThreadCounters};
use super::region_name;
use crate::domain::errors::ShmError;
use crate::domain::types::{AppType, STATS_VERSION};

/// Smallest region any producer version publishes.
const MIN_REGION_SIZE: usize = 32;

/// A record shorter than this cannot hold the `next`/`tid` prefix.
const MIN_RECORD_SIZE: usize = 16;

/// Owned snapshot of the region header.
#[derive(Debug, Clone)]
pub struct HeaderSnapshot {
    pub version: u8,
    pub app_type: AppType,
    pub thread_stats_size: u16,
    pub fex_version: String,
    pub head: u32,
    pub size: u32,
}

impl HeaderSnapshot {
    /// Rejects regions published by an incompatible emulator build.
    ///
    /// # Errors
    ///
    /// [`ShmError::VersionMismatch`] when the producer's stats version is not
    /// the one this build was compiled against.
    pub fn ensure_supported(&self) -> Result<(), ShmError> {
        if self.version == STATS_VERSION {
            Ok(())
        } else {
            Err(ShmError::VersionMismatch { found: self.version, expected: STATS_VERSION })
        }
    }
}

/// Result of one walk over the thread-record list.
#[derive(Debug, Default)]
pub struct ThreadWalk {
    pub records: Vec<ThreadCounters>,
    /// An out-of-range offset terminated the walk early. The records seen up
    /// to that point are still valid.
    pub truncated: bool,
}

/// The mapped stats region of one emulator process.
pub struct StatsRegion {
    base: NonNull<u8>,
    fd: OwnedFd,
    mapped_len: usize,
}

// SAFETY: the mapping is read-only and only ever accessed through volatile
// loads that return owned copies.
unsafe impl Send for StatsRegion {}

impl StatsRegion {
    /// Opens and maps the stats region of the given emulator pid.
    ///
    /// # Errors
    ///
    /// [`ShmError::OpenFailed`] when the region does not exist or cannot be
    /// stat'ed, [`ShmError::RegionTooSmall`] when it is implausibly small,
    /// [`ShmError::MapFailed`] when the mapping itself fails.
    pub fn open(pid: i32) -> Result<Self, ShmError> {
        let name = region_name(pid);

        let fd = mman::shm_open(name.as_str(), OFlag::O_RDONLY, Mode::empty())
            .map_err(|source| ShmError::OpenFailed { name: name.clone(), source })?;

        let stat = nix::sys::stat::fstat(fd.as_raw_fd())
            .map_err(|source| ShmError::OpenFailed { name, source })?;

        #[allow(clippy::cast_sign_loss)] // st_size is non-negative for a valid fd
        let len = stat.st_size as usize;
        if len < MIN_REGION_SIZE {
            return Err(ShmError::RegionTooSmall { actual: len, min: MIN_REGION_SIZE });
        }

        let base = map_region(&fd, len)?;
        Ok(Self { base, fd, mapped_len: len })
    }

    /// Reads the region header, field by field, with volatile loads.
    #[must_use]
    pub fn header(&self) -> HeaderSnapshot {
        let hdr = self.base.as_ptr().cast::<RegionHeader>();

        // SAFETY: the mapping is page-granular and shm objects are at least
        // one page long, so the 64 header bytes are always readable. Volatile
        // loads because the producer updates `head` and `size` concurrently.
        let (version, app_type, thread_stats_size, raw_version, head, size) = unsafe {
            (
                ptr::read_volatile(ptr::addr_of!((*hdr).version)),
                ptr::read_volatile(ptr::addr_of!((*hdr).app_type)),
                ptr::read_volatile(ptr::addr_of!((*hdr).thread_stats_size)),
                ptr::read_volatile(ptr::addr_of!((*hdr).fex_version)),
                ptr::read_volatile(ptr::addr_of!((*hdr).head)),
                ptr::read_volatile(ptr::addr_of!((*hdr).size)),
            )
        };

        let nul = raw_version.iter().position(|&b| b == 0).unwrap_or(raw_version.len());
        let fex_version = String::from_utf8_lossy(&raw_version[..nul]).into_owned();

        HeaderSnapshot {
            version,
            app_type: AppType::from_raw(app_type),
            thread_stats_size,
            fex_version,
            head,
            size,
        }
    }

    /// Walks the thread-record list and returns owned copies of every record
    /// that fits inside the current mapping.
    #[must_use]
    pub fn walk(&self) -> ThreadWalk {
        let header = self.header();
        let record_len =
            (header.thread_stats_size as usize).min(std::mem::size_of::<ThreadCounters>());

        let mut walk = ThreadWalk::default();

        if record_len < MIN_RECORD_SIZE {
            walk.truncated = header.head != 0;
            return walk;
        }

        // A well-formed list can never yield more records than fit in the
        // region; anything past that means the offsets loop.
        let max_records = self.mapped_len / MIN_RECORD_SIZE;

        let mut offset = header.head as usize;
        while offset != 0 {
            if offset + record_len > self.mapped_len || walk.records.len() >= max_records {
                walk.truncated = true;
                break;
            }

            // SAFETY: offset + record_len was just checked against the mapped
            // length, and producer offsets are 16-byte aligned.
            let record = unsafe { copy_record(self.base.as_ptr().add(offset), record_len) };

            offset = record.next as usize;
            walk.records.push(record);
        }

        walk
    }

    /// Remaps the region if the producer has grown it.
    ///
    /// The base pointer may move; callers must not cache it across this call.
    ///
    /// # Errors
    ///
    /// [`ShmError::MapFailed`] when the remap fails; the old mapping is gone
    /// at that point and the region is unusable.
    pub fn check_resize(&mut self) -> Result<(), ShmError> {
        let advertised = self.header().size as usize;
        if advertised == self.mapped_len || advertised < MIN_REGION_SIZE {
            return Ok(());
        }

        // SAFETY: base/mapped_len describe the mapping we own.
        unsafe {
            mman::munmap(self.base.cast(), self.mapped_len).map_err(ShmError::MapFailed)?;
        }

        self.base = map_region(&self.fd, advertised)?;
        self.mapped_len = advertised;
        Ok(())
    }

    /// Currently mapped length in bytes.
    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.mapped_len
    }
}

impl Drop for StatsRegion {
    fn drop(&mut self) {
        // SAFETY: base/mapped_len describe the mapping we own; the fd closes
        // via OwnedFd.
        let _ = unsafe { mman::munmap(self.base.cast(), self.mapped_len) };
    }
}

fn map_region(fd: &OwnedFd, len: usize) -> Result<NonNull<u8>, ShmError> {
    let map_len = NonZeroUsize::new(len)
        .ok_or(ShmError::RegionTooSmall { actual: 0, min: MIN_REGION_SIZE })?;

    // SAFETY: valid fd, read-only shared mapping of another process's region.
    let mapped = unsafe {
        mman::mmap(None, map_len, ProtFlags::PROT_READ, MapFlags::MAP_SHARED, fd, 0)
            .map_err(ShmError::MapFailed)?
    };

    Ok(mapped.cast())
}

/// Copies `len` bytes of one record out of the mapping, zero-filling the
/// tail when the producer's record is shorter than ours.
///
/// # Safety
///
/// `src` must be valid for `len` bytes and, on aarch64, 16-byte aligned with
/// `len` a multiple of 16.
unsafe fn copy_record(src: *const u8, len: usize) -> ThreadCounters {
    let mut dest = ThreadCounters::default();

    #[cfg(target_arch = "aarch64")]
    {
        // 128-bit aligned loads are single-copy atomic on ARMv8.4+.
        let chunks = len / 16;
        let s = src.cast::<u128>();
        let d = ptr::addr_of_mut!(dest).cast::<u128>();
        for i in 0..chunks {
            ptr::write_volatile(d.add(i), ptr::read_volatile(s.add(i)));
        }
    }

    #[cfg(not(target_arch = "aarch64"))]
    {
        // Development platforms only.
        let d = ptr::addr_of_mut!(dest).cast::<u8>();
        for i in 0..len {
            ptr::write_volatile(d.add(i), ptr::read_volatile(src.add(i)));
        }
    }

    dest
}
