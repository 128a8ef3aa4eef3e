//! Crate root: powers-of-tau ceremony verification
//!
//! Verifies that one round of a powers-of-tau ceremony correctly extends the
//! previous one and, optionally, assembles the resulting structured reference
//! string (SRS) for KZG commitments.
//!
//! ## Checks (per chunk, in order)
//!
//! - **Decode.** Chunk files are parsed into fresh [`Chunk`]s; every field
//!   element must be canonical and the file length exact.
//! - **Subgroup.** Every point of both rounds is a non-identity point of the
//!   prime-order subgroup; chunk 0 starts with the configured generators.
//! - **Continuity** (chunk 0). The current round's `tauG1[1]`/`tauG2[1]` are
//!   consistent with the previous round's under one pairing check.
//! - **Powers.** `tauG1` holds consecutive powers of the round's secret,
//!   verified with a randomized linear combination and a single pairing
//!   equation against the anchor `tauG2[1]`.
//!
//! After the last chunk the SRS is finalized and exercised with a full
//! commit/open/verify round trip.
//!
//! ## Curves
//!
//! [`Aleo`] (BLS12-377, the Aleo ceremony) and [`Ignition`] (BN254, the Aztec
//! Ignition ceremony). Everything is generic over [`Curve`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Curve configurations and generator pairs.
pub mod curve;
/// Fork-join range executor.
pub mod parallel;
/// Chunk layout and wire-format decoding.
pub mod chunk;
/// Prime-order subgroup and anchor checks.
pub mod subgroup;
/// Same-ratio pairing checks and randomized powers checks.
pub mod ratio;
/// Round-to-round continuity.
pub mod continuity;
/// Commitment-scheme capability set and the KZG self-check.
pub mod kzg;
/// Radix-2 transforms and the Lagrange basis.
pub mod domain;
/// SRS type, persistence and assembly.
pub mod srs;
/// Contribution chains.
pub mod chain;
/// Verification report.
pub mod report;
/// CLI/environment configuration for the binaries.
pub mod config;
/// Round-level orchestration.
pub mod ceremony;
/// Synthetic rounds with known secrets (tests and the dev generator only).
#[cfg(any(test, feature = "dev-srs"))]
pub mod synthetic;

pub use crate::ceremony::{
    CeremonyError, CeremonyOptions, CeremonyOutcome, CeremonyVerifier, RoundDir, RoundRole,
};
pub use crate::chain::{verify_chain, ChainError, Contribution, InMemoryContribution};
pub use crate::chunk::{Chunk, ChunkDecoder, ChunkLayout, DecodeError, Section};
pub use crate::curve::{Aleo, Curve, Generators, Ignition};
pub use crate::kzg::{CommitmentScheme, Kzg, SelfCheckError, SELF_CHECK_SIZE};
pub use crate::parallel::ParallelExecutor;
pub use crate::ratio::{same_ratio, ChallengePolicy, RatioError, RatioVerifier};
pub use crate::report::VerificationReport;
pub use crate::srs::{Srs, SrsAssembler, SrsError, VerifyingKey};
pub use crate::subgroup::{SubgroupError, SubgroupVerifier};
