//! CSV flattening of recorded frames.

use std::io::Write;

use anyhow::{Context, Result};

use crate::recording::RecordingReader;
use crate::residency::MemSnapshot;
use crate::sampling::ComputedFrame;

const BASE_COLUMNS: &str = "timestamp_ms,sample_period_ms,threads_sampled,fex_load_percent,\
total_jit_time,total_signal_time,total_sigbus_count,total_smc_count,\
total_float_fallback_count,total_cache_miss_count,\
total_cache_read_lock_time,total_cache_write_lock_time,\
total_jit_count,total_jit_invocations,\
mem_total_anon,mem_jit_code,mem_op_dispatcher,mem_frontend,\
mem_cpu_backend,mem_lookup,mem_lookup_l1,mem_thread_states,\
mem_block_links,mem_misc,mem_allocator,mem_unaccounted";

/// Writes one CSV row per recorded frame.
///
/// The number of `thread_i_*` column pairs equals the widest per-thread
/// load table in the recording; frames with fewer threads leave the
/// remaining cells empty.
///
/// # Errors
///
/// Returns an error when writing to `out` fails.
pub fn export_csv(reader: &RecordingReader, out: &mut impl Write) -> Result<()> {
    let thread_columns =
        reader.frames().iter().map(|f| f.thread_loads.len()).max().unwrap_or(0);

    write_header(out, thread_columns).context("failed to write CSV header")?;
    for frame in reader.frames() {
        write_row(out, frame, thread_columns).context("failed to write CSV row")?;
    }
    Ok(())
}

fn write_header(out: &mut impl Write, thread_columns: usize) -> std::io::Result<()> {
    out.write_all(BASE_COLUMNS.as_bytes())?;
    for i in 0..thread_columns {
        write!(out, ",thread_{i}_load,thread_{i}_cycles")?;
    }
    writeln!(out)
}

fn write_row(
    out: &mut impl Write,
    frame: &ComputedFrame,
    thread_columns: usize,
) -> std::io::Result<()> {
    let mem = frame.mem.clone().unwrap_or_default();

    write!(
        out,
        "{},{},{},{:.4},{},{},{},{},{},{},{},{},{},{}",
        frame.timestamp_unix_ns / 1_000_000,
        frame.sample_period_ns / 1_000_000,
        frame.threads_sampled,
        frame.fex_load_percent,
        frame.total_jit_time,
        frame.total_signal_time,
        frame.total_sigbus_count,
        frame.total_smc_count,
        frame.total_float_fallback_count,
        frame.total_cache_miss_count,
        frame.total_cache_read_lock_time,
        frame.total_cache_write_lock_time,
        frame.total_jit_count,
        frame.cumulative.jit_invocations,
    )?;
    write_mem_cells(out, &mem)?;

    for i in 0..thread_columns {
        match frame.thread_loads.get(i) {
            Some(load) => write!(out, ",{:.4},{}", load.load_percent, load.total_cycles)?,
            None => write!(out, ",,")?,
        }
    }
    writeln!(out)
}

fn write_mem_cells(out: &mut impl Write, mem: &MemSnapshot) -> std::io::Result<()> {
    write!(
        out,
        ",{},{},{},{},{},{},{},{},{},{},{},{}",
        mem.total_anon,
        mem.jit_code,
        mem.op_dispatcher,
        mem.frontend,
        mem.cpu_backend,
        mem.lookup,
        mem.lookup_l1,
        mem.thread_states,
        mem.block_links,
        mem.misc,
        mem.allocator,
        mem.unaccounted,
    )
}
