//! Resident-memory sampling via `/proc/<pid>/smaps`
//!
//! The emulator tags its anonymous mappings (`[anon:FEXMemJIT]`,
//! `[anon:FEXMem_Lookup]`, ...), which the kernel reports back in the
//! per-process memory map. Each sampling pass rewinds the smaps file, walks
//! its mapping blocks and accumulates the `Rss:` value of every tagged block
//! into a categorised [`MemSnapshot`].
//!
//! Parsing is I/O-bound and far slower than a counter pass, so it runs on
//! its own worker thread ([`ResidencyWorker`]) which publishes whole
//! snapshots through a channel; the sampling flow keeps the latest one.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// The allocator-owned mapping with the largest resident size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargestAnon {
    pub begin: u64,
    pub end: u64,
    pub size: u64,
}

/// Categorised resident-set totals, in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemSnapshot {
    pub total_anon: u64,
    pub jit_code: u64,
    pub op_dispatcher: u64,
    pub frontend: u64,
    pub cpu_backend: u64,
    pub lookup: u64,
    pub lookup_l1: u64,
    pub thread_states: u64,
    pub block_links: u64,
    pub misc: u64,
    pub allocator: u64,
    pub unaccounted: u64,
    pub largest_anon: LargestAnon,
}

/// Which accumulator the current mapping block feeds.
#[derive(Clone, Copy)]
enum Category {
    JitCode,
    OpDispatcher,
    Frontend,
    CpuBackend,
    Lookup,
    LookupL1,
    ThreadStates,
    BlockLinks,
    Misc,
    Allocator,
    Unaccounted,
}

/// Tag table; first match wins, more specific tags before their prefixes.
const TAGS: &[(&str, Category)] = &[
    ("FEXMemJIT", Category::JitCode),
    ("FEXMem_OpDispatcher", Category::OpDispatcher),
    ("FEXMem_Frontend", Category::Frontend),
    ("FEXMem_CPUBackend", Category::CpuBackend),
    ("FEXMem_Lookup_L1", Category::LookupL1),
    ("FEXMem_Lookup", Category::Lookup),
    ("FEXMem_ThreadState", Category::ThreadStates),
    ("FEXMem_BlockLinks", Category::BlockLinks),
    ("FEXMem_Misc", Category::Misc),
    ("FEXMem", Category::Unaccounted),
    ("JEMalloc", Category::Allocator),
    ("FEXAllocator", Category::Allocator),
];

/// Repeatedly samples one process's smaps file.
pub struct ResidencySampler {
    file: File,
    buf: String,
}

impl ResidencySampler {
    /// Opens `/proc/<pid>/smaps`, keeping the handle for rewound re-reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the smaps file cannot be opened.
    pub fn open(pid: i32) -> anyhow::Result<Self> {
        let path = format!("/proc/{pid}/smaps");
        let file = File::open(&path).with_context(|| format!("failed to open {path}"))?;
        Ok(Self { file, buf: String::with_capacity(256 * 1024) })
    }

    /// Reads and parses the full memory map.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking or reading fails (the process may have
    /// exited mid-read).
    pub fn sample(&mut self) -> anyhow::Result<MemSnapshot> {
        self.buf.clear();
        self.file.seek(SeekFrom::Start(0)).context("failed to rewind smaps")?;
        self.file.read_to_string(&mut self.buf).context("failed to read smaps")?;
        Ok(parse_smaps(&self.buf))
    }
}

fn classify(line: &str) -> Option<Category> {
    for (tag, category) in TAGS {
        if line.contains(tag) {
            return Some(*category);
        }
    }
    None
}

fn parse_smaps(content: &str) -> MemSnapshot {
    let mut snap = MemSnapshot::default();
    let mut active: Option<Category> = None;
    let mut block_range = (0u64, 0u64);

    for line in content.lines() {
        // Mapping header lines carry an address range and the mapping name:
        //   359519000-359918000 ---p 00000000 00:00 0    [anon:FEXMemJIT]
        if let Some(category) = classify(line) {
            active = Some(category);
            if let Some(range) = parse_address_range(line) {
                block_range = range;
            }
            continue;
        }

        // VmFlags is the last key-value line of a block.
        if line.starts_with("VmFlags") {
            active = None;
            continue;
        }

        let category = match active {
            Some(c) => c,
            None => continue,
        };
        let rss = match parse_rss_line(line) {
            Some(v) => v,
            None => continue,
        };

        snap.total_anon += rss;
        match category {
            Category::JitCode => snap.jit_code += rss,
            Category::OpDispatcher => snap.op_dispatcher += rss,
            Category::Frontend => snap.frontend += rss,
            Category::CpuBackend => snap.cpu_backend += rss,
            Category::Lookup => snap.lookup += rss,
            Category::LookupL1 => snap.lookup_l1 += rss,
            Category::ThreadStates => snap.thread_states += rss,
            Category::BlockLinks => snap.block_links += rss,
            Category::Misc => snap.misc += rss,
            Category::Allocator => {
                snap.allocator += rss;
                if rss > snap.largest_anon.size {
                    snap.largest_anon =
                        LargestAnon { begin: block_range.0, end: block_range.1, size: rss };
                }
            }
            Category::Unaccounted => snap.unaccounted += rss,
        }
    }

    snap
}

/// Parses the `begin-end` address range that starts a mapping line.
fn parse_address_range(line: &str) -> Option<(u64, u64)> {
    let range = line.split_whitespace().next()?;
    let (begin, end) = range.split_once('-')?;
    Some((u64::from_str_radix(begin, 16).ok()?, u64::from_str_radix(end, 16).ok()?))
}

/// Parses an `Rss:  560 kB` line into bytes.
fn parse_rss_line(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix("Rss:")?;
    let mut parts = rest.split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    match parts.next()? {
        "kB" => Some(value * 1024),
        _ => None,
    }
}

/// Background worker publishing residency snapshots at the sample cadence.
pub struct ResidencyWorker {
    rx: Receiver<MemSnapshot>,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ResidencyWorker {
    /// Spawns the sampling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the smaps file cannot be opened or the thread
    /// cannot be spawned.
    pub fn spawn(pid: i32, sample_period: Duration) -> anyhow::Result<Self> {
        let mut sampler = ResidencySampler::open(pid)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::unbounded();

        let stop = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("residency-sampler".into())
            .spawn(move || sampling_loop(&mut sampler, &tx, &stop, sample_period))
            .context("failed to spawn residency-sampler thread")?;

        Ok(Self { rx, shutdown, handle: Some(handle) })
    }

    /// Most recent snapshot published since the last call, if any.
    #[must_use]
    pub fn poll_latest(&self) -> Option<MemSnapshot> {
        self.rx.try_iter().last()
    }

    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ResidencyWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sampling_loop(
    sampler: &mut ResidencySampler,
    tx: &Sender<MemSnapshot>,
    shutdown: &AtomicBool,
    sample_period: Duration,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match sampler.sample() {
            // A zero-total pass is a partial or transient read; keep the
            // last good snapshot instead.
            Ok(snap) if snap.total_anon == 0 => {
                debug!("discarding empty residency pass");
            }
            Ok(snap) => {
                if tx.send(snap).is_err() {
                    break;
                }
            }
            Err(err) => warn!("residency pass failed: {err:#}"),
        }
        thread::sleep(sample_period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rss_line() {
        assert_eq!(parse_rss_line("Rss:                 560 kB"), Some(573_440));
        assert_eq!(parse_rss_line("Rss:                   0 kB"), Some(0));
        assert_eq!(parse_rss_line("Pss:                 560 kB"), None);
    }

    #[test]
    fn test_parse_address_range() {
        let line = "359519000-359918000 ---p 00000000 00:00 0      [anon:FEXMem]";
        assert_eq!(parse_address_range(line), Some((0x3_5951_9000, 0x3_5991_8000)));
    }

    #[test]
    fn test_lookup_l1_matches_before_lookup() {
        let content = "\
1000-2000 ---p 00000000 00:00 0                  [anon:FEXMem_Lookup_L1]
Rss:                  64 kB
VmFlags: rd
2000-3000 ---p 00000000 00:00 0                  [anon:FEXMem_Lookup]
Rss:                  32 kB
VmFlags: rd
";
        let snap = parse_smaps(content);
        assert_eq!(snap.lookup_l1, 64 * 1024);
        assert_eq!(snap.lookup, 32 * 1024);
    }

    #[test]
    fn test_parse_smaps_categories_and_largest() {
        let content = "\
359519000-359918000 ---p 00000000 00:00 0        [anon:FEXMemJIT]
Size:               4096 kB
Rss:                 560 kB
Pss:                 560 kB
VmFlags: rd
400000000-400100000 ---p 00000000 00:00 0        [anon:JEMalloc]
Size:               1024 kB
Rss:                 128 kB
VmFlags: rd wr
500000000-500200000 ---p 00000000 00:00 0        [anon:FEXAllocator]
Rss:                 256 kB
VmFlags: rd wr
600000000-600100000 ---p 00000000 00:00 0        [anon:FEXMem_Scratch]
Rss:                  16 kB
VmFlags: rd
";
        let snap = parse_smaps(content);
        assert_eq!(snap.jit_code, 560 * 1024);
        assert_eq!(snap.allocator, (128 + 256) * 1024);
        assert_eq!(snap.unaccounted, 16 * 1024);
        assert_eq!(snap.total_anon, (560 + 128 + 256 + 16) * 1024);
        assert_eq!(
            snap.largest_anon,
            LargestAnon { begin: 0x5_0000_0000, end: 0x5_0020_0000, size: 256 * 1024 }
        );
    }

    #[test]
    fn test_untagged_blocks_ignored() {
        let content = "\
7f0000000000-7f0000100000 r-xp 00000000 08:01 42 /usr/lib/libc.so.6
Rss:                 900 kB
VmFlags: rd ex
";
        let snap = parse_smaps(content);
        assert_eq!(snap, MemSnapshot::default());
    }
}
