//! Ceremony verification: two consecutive rounds, chunk by chunk
//!
//! # What
//! For every chunk index `i`:
//!
//! 1. decode chunk `i` of the current and the previous round (concurrently,
//!    each into a fresh [`Chunk`]);
//! 2. subgroup-check both (unless disabled);
//! 3. at `i = 0`, check continuity between the rounds and capture the current
//!    round's `tauG2[1]` anchor;
//! 4. run the powers check on the current chunk against that anchor;
//! 5. append the current chunk to the SRS (when building one).
//!
//! After the last chunk the SRS is finalized and self-checked. The first
//! failure aborts the run.
//!
//! # Layout on disk
//! ```text
//! <root>/round_<r>/chunk_<i>/contribution_0.verified
//! ```

#![forbid(unsafe_code)]

use rand::{rngs::StdRng, SeedableRng};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkDecoder, ChunkLayout, DecodeError, LayoutError};
use crate::continuity::ContinuityChecker;
use crate::curve::{Curve, Generators, G2};
use crate::kzg::SELF_CHECK_SIZE;
use crate::parallel::ParallelExecutor;
use crate::ratio::{ChallengePolicy, RatioError, RatioVerifier};
use crate::report::VerificationReport;
use crate::srs::{Srs, SrsAssembler, SrsError};
use crate::subgroup::{SubgroupError, SubgroupVerifier};

/// One round of a ceremony transcript on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundDir {
    pub root: PathBuf,
    pub round: u64,
}

impl RoundDir {
    pub fn new(root: impl Into<PathBuf>, round: u64) -> Self {
        Self { root: root.into(), round }
    }

    /// `<root>/round_<round>`
    pub fn dir(&self) -> PathBuf {
        self.root.join(format!("round_{}", self.round))
    }

    /// `<root>/round_<round>/chunk_<index>/contribution_0.verified`
    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir()
            .join(format!("chunk_{index}"))
            .join("contribution_0.verified")
    }
}

/// Which of the two rounds a failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundRole {
    Current,
    Previous,
}

impl fmt::Display for RoundRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoundRole::Current => "current",
            RoundRole::Previous => "previous",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CeremonyError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("nothing to verify: zero chunks requested")]
    NoChunks,
    #[error("failed to read chunk {index} of {role} round: {source}")]
    Decode {
        index: usize,
        role: RoundRole,
        #[source]
        source: DecodeError,
    },
    #[error("failed to verify chunk {index} of {role} round: {source}")]
    Subgroup {
        index: usize,
        role: RoundRole,
        #[source]
        source: SubgroupError,
    },
    #[error("tauG1[1] for chunk {index} not computed well: current round does not follow the previous one")]
    Continuity { index: usize },
    #[error("chunk {index} of current round is not valid: {source}")]
    Ratio {
        index: usize,
        #[source]
        source: RatioError,
    },
    #[error("chunk {index} reached before the anchor chunk")]
    AnchorNotCaptured { index: usize },
    #[error("SRS assembly at chunk {index}: {source}")]
    Assemble {
        index: usize,
        #[source]
        source: SrsError,
    },
    #[error("SRS: {0}")]
    Srs(#[source] SrsError),
}

/// Knobs of a verification run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CeremonyOptions {
    /// Run subgroup checks on both rounds.
    pub subgroup_checks: bool,
    /// Assemble (and self-check) the SRS from the current round.
    pub build_srs: bool,
    pub challenge: ChallengePolicy,
    /// Polynomial length of the SRS self-check.
    pub self_check_size: usize,
}

impl Default for CeremonyOptions {
    fn default() -> Self {
        Self {
            subgroup_checks: true,
            build_srs: false,
            challenge: ChallengePolicy::default(),
            self_check_size: SELF_CHECK_SIZE,
        }
    }
}

/// Mutable state threaded through [`CeremonyVerifier::verify_step`].
#[derive(Debug)]
pub struct RunState<C: Curve> {
    anchor_tau_g2: Option<G2<C>>,
    assembler: Option<SrsAssembler<C>>,
    chunks_verified: usize,
}

impl<C: Curve> RunState<C> {
    #[inline]
    pub fn chunks_verified(&self) -> usize {
        self.chunks_verified
    }

    /// `tauG2[1]` of the current round, once chunk 0 has been verified.
    #[inline]
    pub fn anchor_tau_g2(&self) -> Option<&G2<C>> {
        self.anchor_tau_g2.as_ref()
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct CeremonyOutcome<C: Curve> {
    pub chunks_verified: usize,
    pub srs: Option<Srs<C>>,
    pub report: VerificationReport,
}

/// Verifies the current round of a ceremony against the previous one.
#[derive(Debug)]
pub struct CeremonyVerifier<C: Curve> {
    layout: ChunkLayout,
    generators: Generators<C>,
    options: CeremonyOptions,
    decoder: ChunkDecoder<C>,
    subgroup: SubgroupVerifier<C>,
    ratio: RatioVerifier<C>,
    continuity: ContinuityChecker<C>,
}

impl<C: Curve> CeremonyVerifier<C> {
    pub fn new(
        layout: ChunkLayout,
        generators: Generators<C>,
        executor: ParallelExecutor,
        options: CeremonyOptions,
    ) -> Result<Self, CeremonyError> {
        Ok(Self {
            layout,
            generators,
            options,
            decoder: ChunkDecoder::new(layout)?,
            subgroup: SubgroupVerifier::new(generators, executor),
            ratio: RatioVerifier::new(generators, options.challenge),
            continuity: ContinuityChecker::new(),
        })
    }

    #[inline]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    #[inline]
    pub fn options(&self) -> &CeremonyOptions {
        &self.options
    }

    /// Fresh state for a run over `nb_chunks` chunks.
    pub fn start(&self, nb_chunks: usize) -> RunState<C> {
        RunState {
            anchor_tau_g2: None,
            assembler: self
                .options
                .build_srs
                .then(|| SrsAssembler::new(self.generators, self.layout, nb_chunks)),
            chunks_verified: 0,
        }
    }

    /// Verify one aligned chunk pair and feed the SRS assembler.
    pub fn verify_step(
        &self,
        index: usize,
        current: &Chunk<C>,
        previous: &Chunk<C>,
        state: &mut RunState<C>,
    ) -> Result<(), CeremonyError> {
        if self.options.subgroup_checks {
            self.subgroup
                .verify(current)
                .map_err(|source| CeremonyError::Subgroup { index, role: RoundRole::Current, source })?;
            self.subgroup
                .verify(previous)
                .map_err(|source| CeremonyError::Subgroup { index, role: RoundRole::Previous, source })?;
        }

        if index == 0 {
            if !self.continuity.compare(current, previous, index) {
                return Err(CeremonyError::Continuity { index });
            }
            let anchor = current.anchor_tau_g2().ok_or(CeremonyError::Ratio {
                index,
                source: RatioError::MissingAnchor,
            })?;
            state.anchor_tau_g2 = Some(*anchor);
        }

        let anchor = state
            .anchor_tau_g2
            .ok_or(CeremonyError::AnchorNotCaptured { index })?;
        self.ratio
            .check_powers(&current.tau_g1, &anchor)
            .map_err(|source| CeremonyError::Ratio { index, source })?;

        if let Some(asm) = state.assembler.as_mut() {
            asm.accumulate(current)
                .map_err(|source| CeremonyError::Assemble { index, source })?;
        }

        state.chunks_verified += 1;
        debug!(index, "chunk verified");
        Ok(())
    }

    fn decode_pair(
        &self,
        index: usize,
        current: &RoundDir,
        previous: &RoundDir,
    ) -> Result<(Chunk<C>, Chunk<C>), CeremonyError> {
        let is_first = index == 0;
        let (cur, prev) = rayon::join(
            || self.decoder.decode(current.chunk_path(index), is_first),
            || self.decoder.decode(previous.chunk_path(index), is_first),
        );
        let cur = cur.map_err(|source| CeremonyError::Decode { index, role: RoundRole::Current, source })?;
        let prev =
            prev.map_err(|source| CeremonyError::Decode { index, role: RoundRole::Previous, source })?;
        Ok((cur, prev))
    }

    /// Verify chunks `0..nb_chunks` of `current` against `previous`.
    pub fn verify_rounds(
        &self,
        current: &RoundDir,
        previous: &RoundDir,
        nb_chunks: usize,
    ) -> Result<CeremonyOutcome<C>, CeremonyError> {
        if nb_chunks == 0 {
            return Err(CeremonyError::NoChunks);
        }
        let started = Instant::now();
        info!(
            curve = C::NAME,
            current = current.round,
            previous = previous.round,
            nb_chunks,
            policy = %self.options.challenge,
            "verifying rounds"
        );

        let mut state = self.start(nb_chunks);
        for index in 0..nb_chunks {
            info!(index, "verifying chunk");
            let (cur, prev) = self.decode_pair(index, current, previous)?;
            self.verify_step(index, &cur, &prev, &mut state)?;
        }

        self.finish(state, current.round, previous.round, started)
    }

    /// Finalize and self-check the SRS (if any) and produce the report.
    pub fn finish(
        &self,
        state: RunState<C>,
        current_round: u64,
        previous_round: u64,
        started: Instant,
    ) -> Result<CeremonyOutcome<C>, CeremonyError> {
        let mut report = VerificationReport::new(
            C::NAME,
            current_round,
            previous_round,
            self.layout,
            self.options.subgroup_checks,
            self.options.challenge,
        );
        report.chunks_verified = state.chunks_verified;

        let srs = match state.assembler {
            Some(asm) => {
                let srs = asm.finalize().map_err(CeremonyError::Srs)?;
                info!(len = srs.len(), "running sanity check on SRS");
                let used = srs
                    .self_check(self.options.self_check_size, &mut StdRng::from_entropy())
                    .map_err(CeremonyError::Srs)?;
                report.srs_len = Some(srs.len());
                report.srs_digest = Some(srs.digest_hex().map_err(CeremonyError::Srs)?);
                report.self_check_size = Some(used);
                Some(srs)
            }
            None => None,
        };

        report.finish(started.elapsed());
        info!(chunks = state.chunks_verified, ms = report.elapsed_ms, "done");
        Ok(CeremonyOutcome {
            chunks_verified: state.chunks_verified,
            srs,
            report,
        })
    }
}

/// Number of `chunk_<i>` directories present under a round, counting from 0.
pub fn count_chunks(round: &RoundDir) -> usize {
    (0..).take_while(|i| round.chunk_path(*i).is_file()).count()
}

/// Whether both round directories exist.
pub fn rounds_present(current: &RoundDir, previous: &RoundDir) -> bool {
    current.dir().is_dir() && previous.dir().is_dir()
}
