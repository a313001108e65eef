//! Remote health sampling: the diagnostic command and its parser

use serde::Serialize;

/// Composite command run on every poll tick. Each reading is printed on its
/// own tagged line.
pub const STATS_COMMAND: &str = concat!(
    "echo \"LOAD:$(cat /proc/loadavg | awk '{print $1}')\"\n",
    "free -m | awk 'NR==2{printf \"MEM:%s/%sMB %.1f%%\\n\", $3, $2, $3*100/$2}'\n",
    "df -h / | awk 'NR==2{printf \"DISK:%s/%s (%s)\\n\", $3, $2, $5}'\n",
);

/// Three independent readings from one poll. A reading the remote side did
/// not report stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub cpu: Option<String>,
    pub mem: Option<String>,
    pub disk: Option<String>,
}

impl HealthSnapshot {
    /// Parse the tagged output of [`STATS_COMMAND`]. Untagged lines are ignored.
    pub fn parse(output: &str) -> Self {
        let mut snapshot = HealthSnapshot::default();

        for line in output.lines().map(str::trim) {
            if let Some(load) = line.strip_prefix("LOAD:") {
                snapshot.cpu = Some(format!("Load: {}", load));
            } else if let Some(mem) = line.strip_prefix("MEM:") {
                snapshot.mem = Some(mem.to_string());
            } else if let Some(disk) = line.strip_prefix("DISK:") {
                snapshot.disk = Some(disk.to_string());
            }
        }

        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.mem.is_none() && self.disk.is_none()
    }
}
