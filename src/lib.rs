//! # fexscope — real-time JIT profiling HUD for FEX-Emu
//!
//! FEX-Emu (an x86-on-ARM64 binary translator) publishes per-thread JIT
//! profiling counters in a shared-memory region. fexscope attaches to a
//! running emulator by pid, samples that region together with the process's
//! resident-memory map, derives load metrics, and either renders them in a
//! terminal HUD, records them to disk, or replays a recording through the
//! same HUD.
//!
//! ## Pipeline
//!
//! ```text
//!  shm region ──▶ shm::StatsRegion ──▶ sampling::ThreadDiffer ─┐
//!                  (volatile walk)       (per-period deltas)   │
//!                                                              ▼
//!  /proc/<pid>/smaps ──▶ residency::ResidencyWorker ──▶ sampling::LoadAccumulator
//!                         (background thread)                  │
//!                                                              ▼
//!                recording::RecordingWriter ◀── sampling::LiveSource ──▶ ComputedFrame
//!                                                              ▲
//!                recording::ReplaySource  ─────────────────────┘
//!                 (same FrameSource contract)
//! ```
//!
//! The TUI and the CSV exporter consume [`source::FrameSource`] and cannot
//! tell a live session from a replayed one.
//!
//! ## Modules
//!
//! - [`shm`] — stats region layout and the cross-process safe-read protocol
//! - [`residency`] — smaps parsing and the background residency worker
//! - [`liveness`] — pidfd-based exit detection for the observed process
//! - [`sampling`] — differ, load accumulator and the live source
//! - [`recording`] — length-framed, zstd-compressed session recordings
//! - [`source`] — the frame-source contract live and replay both satisfy
//! - [`export`] — CSV flattening of recordings
//! - [`discovery`] — finding emulator processes via their stats regions
//! - [`tui`] — the ratatui HUD
//! - [`platform`] — cycle-counter frequency, memory barriers, core counts

pub mod cli;
pub mod discovery;
pub mod domain;
pub mod export;
pub mod liveness;
pub mod platform;
pub mod recording;
pub mod residency;
pub mod sampling;
pub mod shm;
pub mod source;
pub mod tui;
