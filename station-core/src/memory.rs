//! Available-memory queries for the pre-fetch memory guard.

use std::fmt::Debug;

pub trait HeapProbe: Send + Sync + Debug {
    /// Bytes currently available, or `None` when the platform cannot tell.
    fn available(&self) -> Option<usize>;
}

/// Reads `MemAvailable` from `/proc/meminfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHeap;

impl HeapProbe for SystemHeap {
    fn available(&self) -> Option<usize> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_mem_available(&meminfo)
    }
}

/// A fixed amount of headroom. Useful on targets with a known static heap.
#[derive(Debug, Clone, Copy)]
pub struct FixedHeap(pub usize);

impl HeapProbe for FixedHeap {
    fn available(&self) -> Option<usize> {
        Some(self.0)
    }
}

fn parse_mem_available(meminfo: &str) -> Option<usize> {
    let line = meminfo.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kb: usize = line.split_whitespace().nth(1)?.parse().ok()?;
    kb.checked_mul(1024)
}
