//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `SANDBOX_LISTEN`, `SANDBOX_WORKSPACE_ROOT`
//! 2. **Config file** — path via `--config <path>`, or `sandbox.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8884"
//! max_connections = 64
//!
//! [limits]
//! default_time_limit_sec = 5
//! default_memory_limit_mb = 256
//! max_time_limit_sec = 60
//! max_memory_limit_mb = 1024
//!
//! [compiler]
//! binary = "g++"
//! std = "c++17"
//!
//! [workspace]
//! root = "./tmp"
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Deny-list substrings checked case-insensitively against submitted
    /// source text. Defaults to the patterns in spec §4.B; a config file
    /// may extend or replace the list entirely.
    #[serde(default = "default_deny_patterns")]
    pub deny_patterns: Vec<String>,
}

/// TCP listener and connection-limit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8884`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum concurrent connections accepted (default 64). A connection
    /// beyond this count waits for a permit before its submission is parsed.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Time and memory limit defaults and caps.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// CPU-time limit applied when a submission omits `time_limit` (default 5s).
    #[serde(default = "default_time_limit_sec")]
    pub default_time_limit_sec: u64,
    /// Address-space limit applied when a submission omits `memory_limit` (default 256MB).
    #[serde(default = "default_memory_limit_mb")]
    pub default_memory_limit_mb: u64,
    /// Hard ceiling on a client-requested time limit (default 60s).
    #[serde(default = "default_max_time_limit_sec")]
    pub max_time_limit_sec: u64,
    /// Hard ceiling on a client-requested memory limit (default 1024MB).
    #[serde(default = "default_max_memory_limit_mb")]
    pub max_memory_limit_mb: u64,
}

/// Host C++ toolchain settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    /// Compiler binary to invoke (default `g++`).
    #[serde(default = "default_compiler_binary")]
    pub binary: String,
    /// Language standard passed as `-std=<std>` (default `c++17`).
    #[serde(default = "default_compiler_std")]
    pub std: String,
}

/// Per-submission workspace directory settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory under which per-submission workspaces are created
    /// (default `./tmp`). Mirrors the original's `./tmp/socket_sandbox_<pid>/`.
    #[serde(default = "default_workspace_root")]
    pub root: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter level (default `info`). Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:8884".to_string()
}
fn default_max_connections() -> usize {
    64
}
fn default_time_limit_sec() -> u64 {
    5
}
fn default_memory_limit_mb() -> u64 {
    256
}
fn default_max_time_limit_sec() -> u64 {
    60
}
fn default_max_memory_limit_mb() -> u64 {
    1024
}
fn default_compiler_binary() -> String {
    "g++".to_string()
}
fn default_compiler_std() -> String {
    "c++17".to_string()
}
fn default_workspace_root() -> String {
    "./tmp".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_deny_patterns() -> Vec<String> {
    [
        "system(",
        "exec(",
        "popen(",
        "createprocess",
        "shellexecute",
        "winexec",
        "fork(",
        "chmod",
        "rm -rf",
        "format",
        "shutdown",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_time_limit_sec: default_time_limit_sec(),
            default_memory_limit_mb: default_memory_limit_mb(),
            max_time_limit_sec: default_max_time_limit_sec(),
            max_memory_limit_mb: default_max_memory_limit_mb(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            binary: default_compiler_binary(),
            std: default_compiler_std(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            limits: LimitsConfig::default(),
            compiler: CompilerConfig::default(),
            workspace: WorkspaceConfig::default(),
            logging: LoggingConfig::default(),
            deny_patterns: default_deny_patterns(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise looks
    /// for `sandbox.toml` in the current directory, falling back to compiled
    /// defaults.
    #[must_use]
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("sandbox.toml").exists() {
            let content =
                std::fs::read_to_string("sandbox.toml").expect("Failed to read sandbox.toml");
            toml::from_str(&content).expect("Failed to parse sandbox.toml")
        } else {
            Config::default()
        };

        if let Ok(listen) = std::env::var("SANDBOX_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(root) = std::env::var("SANDBOX_WORKSPACE_ROOT") {
            config.workspace.root = root;
        }

        config
    }

    /// Validate configuration, returning a list of human-readable problems.
    ///
    /// Called at startup; any non-empty result causes the process to exit
    /// before binding the listener.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.limits.default_time_limit_sec == 0 {
            errors.push("limits.default_time_limit_sec must be > 0".to_string());
        }
        if self.limits.default_memory_limit_mb == 0 {
            errors.push("limits.default_memory_limit_mb must be > 0".to_string());
        }
        if self.limits.max_time_limit_sec < self.limits.default_time_limit_sec {
            errors.push("limits.max_time_limit_sec must be >= default_time_limit_sec".to_string());
        }
        if self.limits.max_memory_limit_mb < self.limits.default_memory_limit_mb {
            errors
                .push("limits.max_memory_limit_mb must be >= default_memory_limit_mb".to_string());
        }
        if self.server.max_connections == 0 {
            errors.push("server.max_connections must be > 0".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.limits.default_time_limit_sec, 5);
        assert_eq!(config.limits.default_memory_limit_mb, 256);
    }

    #[test]
    fn deny_patterns_cover_spec_list() {
        let config = Config::default();
        for pat in ["system(", "fork(", "rm -rf", "shutdown"] {
            assert!(config.deny_patterns.iter().any(|p| p == pat));
        }
    }

    #[test]
    fn validate_flags_inverted_caps() {
        let mut config = Config::default();
        config.limits.max_time_limit_sec = 1;
        config.limits.default_time_limit_sec = 5;
        let errors = config.validate();
        assert!(!errors.is_empty());
    }
}
