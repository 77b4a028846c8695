//! Periodic status summary
//!
//! One structured event per report, readable in the console and grep-able
//! in the log file.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use herald_sinks::MetricsSnapshot;

use crate::collaborators::HandlerCounts;
use crate::lifecycle::LifecycleState;

/// Point-in-time view of the process
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSummary {
    pub state: LifecycleState,
    pub uptime: Duration,
    pub started_at: Option<DateTime<Utc>>,
    pub handlers: HandlerCounts,
    pub services: usize,
    pub sink: MetricsSnapshot,
}

impl StatusSummary {
    /// Emit the summary as a single `info` event
    pub fn report(&self) {
        tracing::info!(
            state = %self.state,
            uptime = %format_uptime(self.uptime),
            commands = self.handlers.commands,
            events = self.handlers.events,
            routes = self.handlers.routes,
            services = self.services,
            records_written = self.sink.records_written,
            bytes_written = self.sink.bytes_written,
            skipped_ticks = self.sink.skipped_ticks,
            write_errors = self.sink.write_errors,
            rotations = self.sink.rotations,
            open_errors = self.sink.open_errors,
            "status"
        );
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} up {} | {} services={} | log: {} records, {} rotations",
            self.state,
            format_uptime(self.uptime),
            self.handlers,
            self.services,
            self.sink.records_written,
            self.sink.rotations,
        )?;
        if let Some(at) = self.started_at {
            write!(f, " | since {}", at.format("%Y-%m-%dT%H:%M:%SZ"))?;
        }
        Ok(())
    }
}

/// Compact `1d2h3m4s` rendering, largest unit first
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let (days, hours, mins, secs) = (secs / 86_400, secs / 3600 % 24, secs / 60 % 60, secs % 60);

    let mut out = String::new();
    for (value, unit) in [(days, 'd'), (hours, 'h'), (mins, 'm')] {
        if value > 0 || !out.is_empty() {
            out.push_str(&format!("{value}{unit}"));
        }
    }
    out.push_str(&format!("{secs}s"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::ZERO), "0s");
        assert_eq!(format_uptime(Duration::from_secs(59)), "59s");
        assert_eq!(format_uptime(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d1h1m1s");
    }

    #[test]
    fn test_display() {
        let summary = StatusSummary {
            state: LifecycleState::Running,
            uptime: Duration::from_secs(125),
            started_at: Some(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()),
            handlers: HandlerCounts {
                commands: 4,
                events: 2,
                routes: 1,
            },
            services: 2,
            sink: MetricsSnapshot {
                records_written: 10,
                rotations: 1,
                ..Default::default()
            },
        };

        assert_eq!(
            summary.to_string(),
            "running up 2m5s | commands=4 events=2 routes=1 services=2 | log: 10 records, 1 rotations | since 2026-01-02T03:04:05Z"
        );
    }
}
