//! Instance configuration.
//!
//! `VmConfig` is plain data: build it in code, deserialize it from any serde
//! source, or read overrides from the environment with [`VmConfig::from_env`].

use crate::error::{Result, VmError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default ceiling on addressable cells (16 Mi).
pub const DEFAULT_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Shape of the payload a terminated instance reports. Has no effect on
/// execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    #[default]
    Output,
    Memory,
    Both,
}

impl FromStr for ReportMode {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "output" => Ok(ReportMode::Output),
            "memory" => Ok(ReportMode::Memory),
            "both" => Ok(ReportMode::Both),
            other => Err(VmError::Config(format!("unknown report mode: {other}"))),
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportMode::Output => "output",
            ReportMode::Memory => "memory",
            ReportMode::Both => "both",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub report: ReportMode,
    /// Writes at or beyond this many cells fail with `MemoryLimit`.
    pub memory_limit: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            report: ReportMode::Output,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl VmConfig {
    pub fn with_report(report: ReportMode) -> Self {
        Self {
            report,
            ..Self::default()
        }
    }

    /// Defaults overridden by `INTCODE_REPORT` and `INTCODE_MEMORY_LIMIT`.
    /// Absent or unparsable values keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let report = std::env::var("INTCODE_REPORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.report);
        let memory_limit = std::env::var("INTCODE_MEMORY_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.memory_limit);
        Self {
            report,
            memory_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_mode_parses_case_insensitively() {
        assert_eq!("Output".parse::<ReportMode>().unwrap(), ReportMode::Output);
        assert_eq!(" memory ".parse::<ReportMode>().unwrap(), ReportMode::Memory);
        assert_eq!("BOTH".parse::<ReportMode>().unwrap(), ReportMode::Both);
        let err = "stack".parse::<ReportMode>().unwrap_err();
        assert!(err.to_string().contains("unknown report mode"), "got: {err}");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: VmConfig = serde_json::from_str(r#"{"report":"both"}"#).unwrap();
        assert_eq!(cfg.report, ReportMode::Both);
        assert_eq!(cfg.memory_limit, DEFAULT_MEMORY_LIMIT);

        let cfg: VmConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, VmConfig::default());
    }

    #[test]
    fn from_env_overrides_and_falls_back() {
        // one test owns both variables so nothing races on them
        std::env::set_var("INTCODE_REPORT", "both");
        std::env::set_var("INTCODE_MEMORY_LIMIT", "4096");
        let cfg = VmConfig::from_env();
        assert_eq!(cfg.report, ReportMode::Both);
        assert_eq!(cfg.memory_limit, 4096);

        std::env::set_var("INTCODE_REPORT", "registers");
        std::env::set_var("INTCODE_MEMORY_LIMIT", "-12");
        assert_eq!(VmConfig::from_env(), VmConfig::default());

        std::env::remove_var("INTCODE_REPORT");
        std::env::remove_var("INTCODE_MEMORY_LIMIT");
        assert_eq!(VmConfig::from_env(), VmConfig::default());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for mode in [ReportMode::Output, ReportMode::Memory, ReportMode::Both] {
            assert_eq!(mode.to_string().parse::<ReportMode>().unwrap(), mode);
        }
    }
}
