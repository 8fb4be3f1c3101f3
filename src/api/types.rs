//! API response types

use serde::{Deserialize, Serialize};

/// Body of `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    /// RFC 3339 timestamp of the response
    pub timestamp: String,
    /// Currently connected streaming clients
    pub subscribers: usize,
}
