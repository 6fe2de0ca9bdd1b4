//! /proc/net/dev counter source
//!
//! Two header lines are followed by one line per interface:
//! `  eth0: 1234 10 0 0 0 0 0 0 5678 8 0 0 0 0 0 0`
//! The receive byte counter is token 1 and the transmit byte counter is
//! token 9 once the line is split on whitespace, `:` and `|`.

use super::CounterSource;
use crate::models::InterfaceCounters;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

const HEADER_LINES: usize = 2;
const RECEIVE_BYTES_COLUMN: usize = 1;
const TRANSMIT_BYTES_COLUMN: usize = 9;

/// Lines with fewer tokens than this end the report
const MIN_TOKENS: usize = 4;

/// Counter source backed by the procfs network device report
pub struct ProcNetDev {
    path: PathBuf,
}

impl ProcNetDev {
    pub fn new() -> Self {
        Self::with_path("/proc/net/dev")
    }

    /// Read from a custom path (for testing)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcNetDev {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterSource for ProcNetDev {
    async fn read_report(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))
    }
}

fn tokenize(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || c == ':' || c == '|')
        .filter(|token| !token.is_empty())
        .collect()
}

/// Parse a counter report into per-interface counters
///
/// Malformed lines are skipped; a line with fewer than four tokens ends
/// parsing.
pub fn parse_net_dev(content: &str) -> Vec<InterfaceCounters> {
    let mut counters = Vec::new();

    for line in content.lines().skip(HEADER_LINES) {
        let tokens = tokenize(line);
        if tokens.len() < MIN_TOKENS {
            break;
        }
        if tokens.len() <= TRANSMIT_BYTES_COLUMN {
            debug!(line = %line, "Skipping short counter line");
            continue;
        }

        let received = tokens[RECEIVE_BYTES_COLUMN].parse::<u64>();
        let transmitted = tokens[TRANSMIT_BYTES_COLUMN].parse::<u64>();
        match (received, transmitted) {
            (Ok(received), Ok(transmitted)) => counters.push(InterfaceCounters {
                name: tokens[0].to_string(),
                received,
                transmitted,
            }),
            _ => debug!(line = %line, "Skipping malformed counter line"),
        }
    }

    counters
}
