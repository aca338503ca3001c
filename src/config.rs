//! Runtime configuration.
//!
//! Every section is optional in the TOML file; missing keys fall back to the
//! defaults below, which are the values the extension ships with.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UsherError};

pub const LOADING_TEXT: &str = "Ushering in your summary... please wait.";
pub const ERROR_TEXT: &str = "Error: Could not reach the brain. Please check your connection.";
pub const FALLBACK_SUMMARY: &str = "Relay processed the link but no summary was returned.";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsherConfig {
    pub endpoint: EndpointConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub hover: HoverConfig,
    pub placement: PlacementConfig,
}

impl UsherConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| UsherError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| UsherError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "https://usher-worker.insaneswithbrains.workers.dev".into(),
            timeout_ms: 30_000,
            user_agent: concat!("usher/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: i64,
    pub max_entries: usize,
    pub evict_batch: usize,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 24 * 60 * 60 * 1000,
            max_entries: 1000,
            evict_batch: 100,
            key_prefix: "usher_cache_".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound on the readiness probe reply.
    pub probe_timeout_ms: u64,
    /// Bound on the context extraction reply.
    pub extract_timeout_ms: u64,
    /// Wait after injection before the page agent is assumed ready.
    pub injection_grace_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 250,
            extract_timeout_ms: 1_000,
            injection_grace_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HoverConfig {
    pub dwell_ms: u64,
    pub estimated_height: f32,
    /// Height difference that triggers a second placement pass.
    pub reflow_threshold: f32,
    /// Offset below which a recomputed placement is not applied.
    pub move_threshold: f32,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            dwell_ms: 500,
            estimated_height: 180.0,
            reflow_threshold: 30.0,
            move_threshold: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlacementConfig {
    pub box_width: f32,
    pub arrow_size: f32,
    pub gap: f32,
    /// Minimum distance from viewport edges.
    pub padding: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            box_width: 350.0,
            arrow_size: 20.0,
            gap: 10.0,
            padding: 20.0,
        }
    }
}
