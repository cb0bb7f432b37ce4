//! CLI argument parsing for tracelines

use crate::config::TimelineConfig;
use crate::ingest::InputFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the computed timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable containment tree (default)
    Text,
    /// Timeline record as JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "tracelines")]
#[command(version)]
#[command(about = "Reconstruct an execution timeline from raw trace events", long_about = None)]
pub struct Cli {
    /// Trace files to read (`-` or nothing reads stdin)
    #[arg(value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Encoding of the input files
    #[arg(long = "input-format", value_enum, default_value = "auto")]
    pub input_format: InputFormat,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long = "pretty")]
    pub pretty: bool,

    /// TOML configuration file
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print per-stage computation times to stderr
    #[arg(long = "timings")]
    pub timings: bool,

    /// Skip loop/recursion detection
    #[arg(long = "no-patterns")]
    pub no_patterns: bool,

    /// Skip indirect (temporal) containment
    #[arg(long = "no-indirect")]
    pub no_indirect: bool,

    /// Longest repeated subsequence to look for (1-100)
    #[arg(long = "max-pattern-length", value_name = "N")]
    pub max_pattern_length: Option<usize>,

    /// Filepath prefix splitting root families into clusters (repeatable)
    #[arg(long = "workspace-root", value_name = "PATH")]
    pub workspace_roots: Vec<String>,

    /// Read a live stream from stdin and recompute as events arrive
    #[arg(short = 'f', long = "follow")]
    pub follow: bool,

    /// Events per batch handed to the worker in --follow mode
    #[arg(long = "batch-size", value_name = "N", default_value = "500")]
    pub batch_size: usize,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Whether every input is stdin (no paths, or only `-`)
    pub fn reads_stdin_only(&self) -> bool {
        self.inputs.iter().all(|p| p.as_os_str() == "-")
    }

    /// Layer the command-line overrides onto a base configuration
    pub fn apply_overrides(&self, mut config: TimelineConfig) -> TimelineConfig {
        if self.no_patterns {
            config.detect_patterns = false;
        }
        if self.no_indirect {
            config.link_indirect = false;
        }
        if let Some(max) = self.max_pattern_length {
            config.max_pattern_length = max;
        }
        if !self.workspace_roots.is_empty() {
            config.workspace_roots = self.workspace_roots.clone();
        }
        config
    }
}
