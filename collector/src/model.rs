use serde::{Deserialize, Serialize};

/// Per-device ingestion summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: u32,
    pub received: u64,
    pub last_timestamp: f64,
}

/// REST API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub data: Vec<DeviceSummary>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Acknowledgement returned for an accepted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accepted {
    pub id: u32,
    pub received: u64,
}
