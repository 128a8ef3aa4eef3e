//! Machine-readable summary of a verification run.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::chunk::ChunkLayout;
use crate::ratio::ChallengePolicy;

/// What a run verified and, if built, which SRS it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub tool_version: String,
    pub curve: String,
    pub current_round: u64,
    pub previous_round: u64,
    pub layout: ChunkLayout,
    pub chunks_verified: usize,
    pub subgroup_checks: bool,
    pub challenge_policy: ChallengePolicy,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub srs_len: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub srs_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub self_check_size: Option<usize>,
    pub elapsed_ms: u64,
    /// RFC 3339, UTC.
    pub finished_at: String,
}

impl VerificationReport {
    /// Report skeleton; SRS fields are filled in once the SRS exists.
    pub fn new(
        curve: &str,
        current_round: u64,
        previous_round: u64,
        layout: ChunkLayout,
        subgroup_checks: bool,
        challenge_policy: ChallengePolicy,
    ) -> Self {
        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            curve: curve.to_string(),
            current_round,
            previous_round,
            layout,
            chunks_verified: 0,
            subgroup_checks,
            challenge_policy,
            srs_len: None,
            srs_digest: None,
            self_check_size: None,
            elapsed_ms: 0,
            finished_at: String::new(),
        }
    }

    /// Stamp the elapsed time and completion time.
    pub fn finish(&mut self, elapsed: std::time::Duration) {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.finished_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.write_all(b"\n")?;
        w.flush()
    }
}
