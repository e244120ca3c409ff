use serde::{Deserialize, Serialize};

/// Per-host metrics reported by the local monitoring endpoint.
///
/// Serialized as the bare JSON array the endpoint returns, so a snapshot
/// fetched from the monitor goes upstream unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthSnapshot(pub Vec<HostReport>);

impl HealthSnapshot {
    pub fn hosts(&self) -> &[HostReport] {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostReport {
    pub ip: String,
    pub uid: String,
    pub body: HostMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostMetrics {
    pub process: ProcessCounts,
    pub http: HttpMetrics,
    pub shell: ShellMetrics,
}

/// Running process counts for the monitored services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessCounts {
    pub nginx: i64,
    pub php: i64,
    pub mysql: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpMetrics {
    pub disk: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellMetrics {
    pub network: String,
}
