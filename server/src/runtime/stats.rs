//! Resource-usage snapshot types and `docker stats` parsing.

use serde::{Deserialize, Serialize};

use super::STATS_FORMAT;

/// Number of `|`-separated fields in [`STATS_FORMAT`].
const STATS_FIELDS: usize = 6;

/// Whether a workspace had a container to measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    NoContainer,
    /// Collection failed; the reading is unavailable for this tick.
    Unknown,
}

/// Field values exactly as `docker stats` renders them (units included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    #[serde(rename = "cpu")]
    pub cpu_percent: String,
    #[serde(rename = "memUsage")]
    pub mem_usage: String,
    #[serde(rename = "memPerc")]
    pub mem_percent: String,
    #[serde(rename = "netIO")]
    pub net_io: String,
    #[serde(rename = "blockIO")]
    pub block_io: String,
    #[serde(rename = "pids")]
    pub process_count: String,
    /// Short (12 char) container id.
    #[serde(rename = "containerId")]
    pub container_id: String,
    /// Unix epoch milliseconds when the reading was taken.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

/// One point-in-time reading for a workspace. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub status: ContainerStatus,
    pub metrics: Option<ContainerMetrics>,
}

impl MetricsSnapshot {
    pub fn running(metrics: ContainerMetrics) -> Self {
        Self {
            status: ContainerStatus::Running,
            metrics: Some(metrics),
        }
    }

    pub fn no_container() -> Self {
        Self {
            status: ContainerStatus::NoContainer,
            metrics: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            status: ContainerStatus::Unknown,
            metrics: None,
        }
    }
}

/// `docker stats` output did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected stats output ({found} fields, expected 6): {line:?}")]
pub struct StatsParseError {
    pub found: usize,
    pub line: String,
}

/// Parse one line produced with [`STATS_FORMAT`].
///
/// Splits on `|` and trims each field. Anything other than exactly six
/// non-empty fields is rejected rather than yielding partial metrics.
pub fn parse_stats_line(
    line: &str,
    display_id: &str,
    timestamp_ms: u64,
) -> Result<ContainerMetrics, StatsParseError> {
    let line = line.trim();
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() != STATS_FIELDS || fields.iter().any(|f| f.is_empty()) {
        return Err(StatsParseError {
            found: fields.iter().filter(|f| !f.is_empty()).count(),
            line: line.to_string(),
        });
    }
    Ok(ContainerMetrics {
        cpu_percent: fields[0].to_string(),
        mem_usage: fields[1].to_string(),
        mem_percent: fields[2].to_string(),
        net_io: fields[3].to_string(),
        block_io: fields[4].to_string(),
        process_count: fields[5].to_string(),
        container_id: display_id.to_string(),
        timestamp_ms,
    })
}

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_ms() -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    let ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    ms
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_reference_line() {
        let m = parse_stats_line(
            "12.34%|100MiB / 2GiB|5.00%|1kB/2kB|3MB/4MB|42",
            "abcdef123456",
            1_700_000_000_000,
        )
        .unwrap();
        assert_eq!(m.cpu_percent, "12.34%");
        assert_eq!(m.mem_usage, "100MiB / 2GiB");
        assert_eq!(m.mem_percent, "5.00%");
        assert_eq!(m.net_io, "1kB/2kB");
        assert_eq!(m.block_io, "3MB/4MB");
        assert_eq!(m.process_count, "42");
        assert_eq!(m.container_id, "abcdef123456");
    }

    #[test]
    fn test_parse_trims_fields_and_newline() {
        let m = parse_stats_line(
            " 0.50% | 1.2GiB / 7.7GiB | 15.6% | 3.1MB / 2MB | 0B / 0B | 7 \n",
            "c",
            0,
        )
        .unwrap();
        assert_eq!(m.cpu_percent, "0.50%");
        assert_eq!(m.net_io, "3.1MB / 2MB");
        assert_eq!(m.process_count, "7");
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        for bad in [
            "",
            "12.34%|100MiB / 2GiB|5.00%",
            "1|2|3|4|5|6|7",
            "1|2||4|5|6",
            "Error response from daemon: No such container",
        ] {
            assert!(parse_stats_line(bad, "c", 0).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn test_snapshot_json_shape() {
        assert_eq!(
            serde_json::to_value(MetricsSnapshot::no_container()).unwrap(),
            json!({"status": "no_container", "metrics": null})
        );
        assert_eq!(
            serde_json::to_value(MetricsSnapshot::unknown()).unwrap(),
            json!({"status": "unknown", "metrics": null})
        );
        let m = parse_stats_line("1%|2|3%|4|5|6", "abc", 99).unwrap();
        assert_eq!(
            serde_json::to_value(MetricsSnapshot::running(m)).unwrap(),
            json!({
                "status": "running",
                "metrics": {
                    "cpu": "1%",
                    "memUsage": "2",
                    "memPerc": "3%",
                    "netIO": "4",
                    "blockIO": "5",
                    "pids": "6",
                    "containerId": "abc",
                    "timestamp": 99,
                }
            })
        );
    }

    #[test]
    fn test_format_has_six_fields() {
        assert_eq!(STATS_FORMAT.split('|').count(), STATS_FIELDS);
    }
}
