//! Pairing-based consistency checks
//!
//! # What
//! Every check here reduces to one primitive, [`same_ratio`]:
//! `e(a₁, a₂) = e(b₁, b₂)`, evaluated as the single multi-pairing
//! `e(a₁, −a₂) · e(b₁, b₂) = 1`.
//!
//! - **Powers check** ([`RatioVerifier::check_powers`]). For `A[0..n)` and a
//!   challenge vector `r[0..n-1)`, `L₁ = Σ rᵢ·A[i]` and `L₂ = Σ rᵢ·A[i+1]` are
//!   two MSMs issued concurrently; the chunk passes iff
//!   `same_ratio(L₁, L₂, [τ]₂, G₂)`. This certifies `A[i+1] = τ·A[i]` for all
//!   `i` at once.
//! - **Continuity** ([`continuity_holds`]). Round `t` composes with round
//!   `t-1` iff `e(τₜ·G₁, τₜ₋₁·G₂) = e(τₜ₋₁·G₁, τₜ·G₂)`.
//!
//! # Security
//! A freshly sampled `r` bounds the soundness error of one powers check by
//! `(n-1)/|Fr|`. Under [`ChallengePolicy::SharedPerRun`] the same `r` is used
//! for every chunk the verifier sees, and the run is one joint statement over
//! all of them rather than a set of independent per-chunk proofs.

#![forbid(unsafe_code)]

use ark_ec::{pairing::Pairing, CurveGroup, VariableBaseMSM};
use ark_ff::{One, UniformRand};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::OnceLock};
use tracing::debug;

use crate::chunk::Chunk;
use crate::curve::{Curve, Generators, Scalar, G1, G1Projective, G2};

/// `true` iff `e(a1, a2) = e(b1, b2)`.
pub fn same_ratio<C: Curve>(a1: &G1<C>, b1: &G1<C>, a2: &G2<C>, b2: &G2<C>) -> bool {
    C::Engine::multi_pairing([*a1, *b1], [-*a2, *b2]).0.is_one()
}

/// Cross-round binding on the first power of each round.
#[inline]
pub fn continuity_holds<C: Curve>(
    current_g1: &G1<C>,
    current_g2: &G2<C>,
    previous_g1: &G1<C>,
    previous_g2: &G2<C>,
) -> bool {
    same_ratio::<C>(current_g1, previous_g1, previous_g2, current_g2)
}

#[derive(Debug, thiserror::Error)]
pub enum RatioError {
    #[error("challenge vector has {got} scalars, expected {expected}")]
    ChallengeLength { expected: usize, got: usize },
    #[error("need at least 2 powers for a ratio check, got {got}")]
    TooFewPowers { got: usize },
    #[error("missing tauG2[1] anchor")]
    MissingAnchor,
    #[error("powers-of-tau ratio check failed")]
    PowersCheck,
    #[error("chunk {chunk_index} does not follow the previous round")]
    Continuity { chunk_index: usize },
}

// ===========================================================================
// Challenges
// ===========================================================================

/// Random scalars weighting the powers check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChallengeVector<F>(Vec<F>);

impl<F: UniformRand> ChallengeVector<F> {
    pub fn sample<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        Self((0..len).map(|_| F::rand(rng)).collect())
    }
}

impl<F> ChallengeVector<F> {
    pub fn from_vec(v: Vec<F>) -> Self {
        Self(v)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[F] {
        &self.0
    }
}

/// How challenge vectors are drawn across the checks of one verifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengePolicy {
    /// New OS-seeded vector per check.
    #[default]
    FreshPerCheck,
    /// One vector per verifier instance, reused by every check.
    SharedPerRun,
}

impl fmt::Display for ChallengePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChallengePolicy::FreshPerCheck => "fresh",
            ChallengePolicy::SharedPerRun => "shared",
        })
    }
}

impl FromStr for ChallengePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fresh" => Ok(ChallengePolicy::FreshPerCheck),
            "shared" => Ok(ChallengePolicy::SharedPerRun),
            other => Err(format!("unknown challenge policy `{other}` (fresh|shared)")),
        }
    }
}

// ===========================================================================
// Verifier
// ===========================================================================

/// Powers and continuity checks against injected generators.
#[derive(Debug)]
pub struct RatioVerifier<C: Curve> {
    generators: Generators<C>,
    policy: ChallengePolicy,
    shared: OnceLock<ChallengeVector<Scalar<C>>>,
}

impl<C: Curve> RatioVerifier<C> {
    pub fn new(generators: Generators<C>, policy: ChallengePolicy) -> Self {
        Self {
            generators,
            policy,
            shared: OnceLock::new(),
        }
    }

    #[inline]
    pub fn policy(&self) -> ChallengePolicy {
        self.policy
    }

    /// Powers check with an explicitly supplied challenge vector.
    pub fn check_powers_with(
        &self,
        powers: &[G1<C>],
        tau_g2: &G2<C>,
        r: &ChallengeVector<Scalar<C>>,
    ) -> Result<(), RatioError> {
        let n = powers.len();
        if n < 2 {
            return Err(RatioError::TooFewPowers { got: n });
        }
        if r.len() != n - 1 {
            return Err(RatioError::ChallengeLength { expected: n - 1, got: r.len() });
        }

        let (l1, l2) = rayon::join(
            || G1Projective::<C>::msm_unchecked(&powers[..n - 1], r.as_slice()),
            || G1Projective::<C>::msm_unchecked(&powers[1..], r.as_slice()),
        );

        if same_ratio::<C>(&l1.into_affine(), &l2.into_affine(), tau_g2, &self.generators.g2) {
            Ok(())
        } else {
            Err(RatioError::PowersCheck)
        }
    }

    /// Powers check drawing challenges per the verifier's policy.
    pub fn check_powers(&self, powers: &[G1<C>], tau_g2: &G2<C>) -> Result<(), RatioError> {
        let len = powers.len().saturating_sub(1);
        match self.policy {
            ChallengePolicy::FreshPerCheck => {
                let r = ChallengeVector::sample(len, &mut StdRng::from_entropy());
                self.check_powers_with(powers, tau_g2, &r)
            }
            ChallengePolicy::SharedPerRun => {
                let r = self.shared.get_or_init(|| {
                    debug!(len, "sampling shared challenge vector");
                    ChallengeVector::sample(len, &mut StdRng::from_entropy())
                });
                self.check_powers_with(powers, tau_g2, r)
            }
        }
    }

    /// Continuity of two anchor chunks (both must carry `tauG2`).
    pub fn check_continuity(
        &self,
        current: &Chunk<C>,
        previous: &Chunk<C>,
        chunk_index: usize,
    ) -> Result<(), RatioError> {
        check_chunk_continuity(current, previous, chunk_index)
    }
}

/// [`continuity_holds`] on `tauG1[1]` / `tauG2[1]` of two aligned chunks.
pub fn check_chunk_continuity<C: Curve>(
    current: &Chunk<C>,
    previous: &Chunk<C>,
    chunk_index: usize,
) -> Result<(), RatioError> {
    let (Some(cur_g2), Some(prev_g2)) = (current.anchor_tau_g2(), previous.anchor_tau_g2()) else {
        return Err(RatioError::MissingAnchor);
    };
    let (Some(cur_g1), Some(prev_g1)) = (current.tau_g1.get(1), previous.tau_g1.get(1)) else {
        return Err(RatioError::TooFewPowers {
            got: current.tau_g1.len().min(previous.tau_g1.len()),
        });
    };
    if continuity_holds::<C>(cur_g1, cur_g2, prev_g1, prev_g2) {
        Ok(())
    } else {
        Err(RatioError::Continuity { chunk_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Aleo, Ignition};
    use crate::synthetic::{random_g1, SyntheticRound, TEST_LAYOUT};
    use ark_ec::AffineRepr;

    #[test]
    fn same_ratio_is_symmetric_and_reflexive() {
        let mut rng = StdRng::from_seed([42u8; 32]);
        let g2 = G2::<Ignition>::generator();
        let s = Scalar::<Ignition>::rand(&mut rng);
        let a = random_g1::<Ignition, _>(&mut rng);
        let b = (a * s).into_affine();
        let x = (g2 * s).into_affine();

        assert!(same_ratio::<Ignition>(&a, &b, &x, &g2));
        assert_eq!(
            same_ratio::<Ignition>(&a, &b, &x, &g2),
            same_ratio::<Ignition>(&b, &a, &g2, &x)
        );
        assert!(!same_ratio::<Ignition>(&a, &b, &g2, &x));
        assert!(same_ratio::<Ignition>(&a, &a, &x, &x));
    }

    #[test]
    fn honest_chunks_pass_under_both_policies() {
        let mut rng = StdRng::from_seed([7u8; 32]);
        let round = SyntheticRound::<Aleo>::sample(TEST_LAYOUT, 3, &mut rng);
        let anchor = round.chunk(0).tau_g2[1];

        for policy in [ChallengePolicy::FreshPerCheck, ChallengePolicy::SharedPerRun] {
            let v = RatioVerifier::new(round.generators, policy);
            for i in 0..3 {
                v.check_powers(&round.chunk(i).tau_g1, &anchor).unwrap();
            }
        }
    }

    #[test]
    fn perturbed_power_fails() {
        let mut rng = StdRng::from_seed([8u8; 32]);
        let round = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 1, &mut rng);
        let chunk = round.chunk(0);
        let v = RatioVerifier::new(round.generators, ChallengePolicy::FreshPerCheck);

        for k in [1, 5, TEST_LAYOUT.nb_tau_g1 - 1] {
            let mut powers = chunk.tau_g1.clone();
            powers[k] = (powers[k] + random_g1::<Ignition, _>(&mut rng)).into_affine();
            assert!(matches!(
                v.check_powers(&powers, &chunk.tau_g2[1]),
                Err(RatioError::PowersCheck)
            ));
        }

        // Wrong anchor.
        assert!(v.check_powers(&chunk.tau_g1, &chunk.tau_g2[2]).is_err());
    }

    #[test]
    fn challenge_length_is_enforced() {
        let mut rng = StdRng::from_seed([9u8; 32]);
        let round = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 1, &mut rng);
        let chunk = round.chunk(0);
        let v = RatioVerifier::new(round.generators, ChallengePolicy::FreshPerCheck);

        let short = ChallengeVector::sample(3, &mut rng);
        let err = v.check_powers_with(&chunk.tau_g1, &chunk.tau_g2[1], &short).unwrap_err();
        assert!(matches!(err, RatioError::ChallengeLength { expected: 15, got: 3 }));

        assert!(matches!(
            v.check_powers(&chunk.tau_g1[..1], &chunk.tau_g2[1]),
            Err(RatioError::TooFewPowers { got: 1 })
        ));
    }

    #[test]
    fn shared_policy_rejects_a_different_chunk_width() {
        let mut rng = StdRng::from_seed([10u8; 32]);
        let round = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 1, &mut rng);
        let chunk = round.chunk(0);
        let v = RatioVerifier::new(round.generators, ChallengePolicy::SharedPerRun);

        v.check_powers(&chunk.tau_g1, &chunk.tau_g2[1]).unwrap();
        assert!(matches!(
            v.check_powers(&chunk.tau_g1[..8], &chunk.tau_g2[1]),
            Err(RatioError::ChallengeLength { expected: 7, got: 15 })
        ));
    }

    #[test]
    fn continuity_follows_secret_composition() {
        let mut rng = StdRng::from_seed([12u8; 32]);
        let prev = SyntheticRound::<Aleo>::sample(TEST_LAYOUT, 1, &mut rng);
        let cur = prev.next_round(Scalar::<Aleo>::rand(&mut rng));
        let v = RatioVerifier::new(prev.generators, ChallengePolicy::default());

        v.check_continuity(&cur.chunk(0), &prev.chunk(0), 0).unwrap();

        let mut forged = cur.chunk(0);
        forged.tau_g1[1] = random_g1::<Aleo, _>(&mut rng);
        assert!(matches!(
            v.check_continuity(&forged, &prev.chunk(0), 0),
            Err(RatioError::Continuity { chunk_index: 0 })
        ));

        let mut no_anchor = cur.chunk(0);
        no_anchor.tau_g2.clear();
        assert!(matches!(
            v.check_continuity(&no_anchor, &prev.chunk(0), 0),
            Err(RatioError::MissingAnchor)
        ));
    }

    #[test]
    fn policy_parses_and_prints() {
        assert_eq!("fresh".parse::<ChallengePolicy>().unwrap(), ChallengePolicy::FreshPerCheck);
        assert_eq!("shared".parse::<ChallengePolicy>().unwrap(), ChallengePolicy::SharedPerRun);
        assert!("sometimes".parse::<ChallengePolicy>().is_err());
        assert_eq!(ChallengePolicy::SharedPerRun.to_string(), "shared");
    }
}
