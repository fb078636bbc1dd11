//! Discovery of running emulator processes.
//!
//! Every observable emulator process owns a `fex-<pid>-stats` object under
//! `/dev/shm`, so discovery is a directory scan filtered by a liveness
//! probe. For interactive selection the candidates are arranged as a
//! parent/child tree (emulated processes commonly fork) and printed with
//! their guest command lines.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Whether a process with this pid currently exists.
#[must_use]
pub fn process_alive(pid: i32) -> bool {
    // Signal 0: existence check without delivering anything.
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Pids of all live emulator processes publishing a stats region, ascending.
#[must_use]
pub fn find_all() -> Vec<i32> {
    let Ok(entries) = std::fs::read_dir("/dev/shm") else {
        return Vec::new();
    };

    let mut pids: Vec<i32> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let pid: i32 = name.strip_prefix("fex-")?.strip_suffix("-stats")?.parse().ok()?;
            process_alive(pid).then_some(pid)
        })
        .collect();

    pids.sort_unstable();
    pids
}

/// Most recently started candidate (highest pid), if any.
#[must_use]
pub fn find_latest() -> Option<i32> {
    find_all().last().copied()
}

/// Space-joined command line of a process, empty when unreadable.
#[must_use]
pub fn cmdline(pid: i32) -> String {
    std::fs::read(format!("/proc/{pid}/cmdline")).map_or_else(
        |_| String::new(),
        |bytes| {
            bytes
                .split(|&b| b == 0)
                .filter(|arg| !arg.is_empty())
                .map(|arg| String::from_utf8_lossy(arg).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        },
    )
}

/// Parent pid from `/proc/<pid>/stat`.
///
/// The comm field may itself contain `)`, so the parse anchors on the last
/// closing parenthesis.
#[must_use]
pub fn parent_pid(pid: i32) -> Option<i32> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    let after_comm = stat.get(stat.rfind(')')? + 2..)?;
    // Fields after comm: state ppid ...
    after_comm.split_whitespace().nth(1)?.parse().ok()
}

/// Prints the candidates as an indexed parent/child tree on stderr and
/// returns them in display order.
pub fn print_process_tree(pids: &[i32]) -> Vec<i32> {
    let known: HashSet<i32> = pids.iter().copied().collect();
    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    let mut roots = Vec::new();

    for &pid in pids {
        match parent_pid(pid) {
            Some(ppid) if known.contains(&ppid) => {
                children.entry(ppid).or_default().push(pid);
            }
            _ => roots.push(pid),
        }
    }
    for kids in children.values_mut() {
        kids.sort_unstable();
    }
    roots.sort_unstable();

    eprintln!("Running FEX processes:");
    let mut ordered = Vec::new();
    for &root in &roots {
        print_node(root, &children, &mut ordered, "", true, false);
    }
    ordered
}

fn print_node(
    pid: i32,
    children: &HashMap<i32, Vec<i32>>,
    ordered: &mut Vec<i32>,
    prefix: &str,
    is_root: bool,
    is_last: bool,
) {
    let index = ordered.len();
    ordered.push(pid);

    let command = cmdline(pid);
    if is_root {
        eprintln!("  [{index}] PID {pid}  {command}");
    } else {
        let connector = if is_last { "└── " } else { "├── " };
        eprintln!("  {prefix}{connector}[{index}] PID {pid}  {command}");
    }

    if let Some(kids) = children.get(&pid) {
        let child_prefix = if is_root || is_last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };
        for (i, &child) in kids.iter().enumerate() {
            print_node(child, children, ordered, &child_prefix, false, i == kids.len() - 1);
        }
    }
}

/// Prompts on stderr for an index into `ordered` until a valid choice or
/// `q` is entered.
///
/// # Errors
///
/// Returns an error when stdin closes or the selection is cancelled.
pub fn prompt_selection(ordered: &[i32]) -> Result<i32> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        eprint!("Select process [0-{}] (q to quit): ", ordered.len() - 1);
        io::stderr().flush()?;

        let Some(line) = lines.next() else {
            bail!("unexpected end of input");
        };
        let line = line.context("failed to read selection")?;
        let input = line.trim();

        if input.eq_ignore_ascii_case("q") {
            bail!("selection cancelled");
        }
        if let Ok(index) = input.parse::<usize>() {
            if let Some(&pid) = ordered.get(index) {
                return Ok(pid);
            }
        }
        eprintln!("Invalid selection: {input}");
    }
}
