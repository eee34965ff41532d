//! `systemInfo` tool: a snapshot of the host the assistant runs on.
//!
//! Every field is best effort. Values that cannot be read on this platform
//! are reported as `null`, so the tool never fails.

use std::fs;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;

use super::{Tool, ToolOutput};

#[derive(Debug, Serialize)]
struct MemoryInfo {
    total_bytes: Option<u64>,
    available_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SystemSnapshot {
    os: &'static str,
    family: &'static str,
    arch: &'static str,
    hostname: Option<String>,
    release: Option<String>,
    cpus: usize,
    memory: MemoryInfo,
    uptime_secs: Option<f64>,
    load_average: Option<[f64; 3]>,
    home_dir: Option<String>,
    temp_dir: String,
    user: Option<String>,
    endianness: &'static str,
}

fn read_trimmed(path: &str) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Look up a `kB` field in `/proc/meminfo` content, in bytes.
fn meminfo_field(meminfo: &str, field: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix(field)?.strip_prefix(':')?;
        let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024)
    })
}

/// First whitespace-separated number of `/proc/uptime`.
fn parse_uptime(raw: &str) -> Option<f64> {
    raw.split_whitespace().next()?.parse().ok()
}

/// First three numbers of `/proc/loadavg`.
fn parse_loadavg(raw: &str) -> Option<[f64; 3]> {
    let mut it = raw.split_whitespace().map(|v| v.parse::<f64>());
    match (it.next(), it.next(), it.next()) {
        (Some(Ok(a)), Some(Ok(b)), Some(Ok(c))) => Some([a, b, c]),
        _ => None,
    }
}

fn snapshot() -> SystemSnapshot {
    let meminfo = fs::read_to_string("/proc/meminfo").unwrap_or_default();
    SystemSnapshot {
        os: std::env::consts::OS,
        family: std::env::consts::FAMILY,
        arch: std::env::consts::ARCH,
        hostname: read_trimmed("/proc/sys/kernel/hostname")
            .or_else(|| std::env::var("HOSTNAME").ok()),
        release: read_trimmed("/proc/sys/kernel/osrelease"),
        cpus: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        memory: MemoryInfo {
            total_bytes: meminfo_field(&meminfo, "MemTotal"),
            available_bytes: meminfo_field(&meminfo, "MemAvailable"),
        },
        uptime_secs: read_trimmed("/proc/uptime").as_deref().and_then(parse_uptime),
        load_average: read_trimmed("/proc/loadavg")
            .as_deref()
            .and_then(parse_loadavg),
        home_dir: dirs::home_dir().map(|p| p.display().to_string()),
        temp_dir: std::env::temp_dir().display().to_string(),
        user: std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok(),
        endianness: if cfg!(target_endian = "little") {
            "LE"
        } else {
            "BE"
        },
    }
}

/// Reports host environment facts.
pub struct SystemInfoTool;

#[async_trait]
impl Tool for SystemInfoTool {
    fn name(&self) -> &str {
        "systemInfo"
    }

    fn description(&self) -> &str {
        "Get information about the system you are running on"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<ToolOutput> {
        let snapshot = snapshot();
        Ok(ToolOutput::text(serde_json::to_string(&snapshot)?))
    }
}
