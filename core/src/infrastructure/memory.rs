//! Physical memory as reported by the kernel.

use std::io;
use std::path::Path;

pub const MEMINFO: &str = "/proc/meminfo";

/// `MemTotal` of a meminfo listing, in MiB. `None` when the entry is
/// missing, unparseable or zero.
pub fn parse_meminfo(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|line| {
            let mut fields = line.strip_prefix("MemTotal:")?.split_whitespace();
            let value: u64 = fields.next()?.parse().ok()?;
            match fields.next() {
                Some("kB") | None => Some(value / 1024),
                Some(_) => None,
            }
        })
        .filter(|mb| *mb > 0)
}

/// Total memory of the host whose meminfo lives at `path`. A missing file
/// means unknown.
pub fn total_memory_mb(path: &Path) -> io::Result<Option<u64>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse_meminfo(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
