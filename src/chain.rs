//! Contribution chains (Ignition-style transcripts)
//!
//! Each contribution publishes its own G1 and G2 powers. A chain is valid when
//! every contribution's G1 powers are consecutive powers of its secret and
//! every contribution [`follows`](Contribution::follows) its predecessor.
//! Only two contributions are alive at a time while walking the chain.

#![forbid(unsafe_code)]

use tracing::info;

use crate::curve::{Curve, Generators, G1, G2};
use crate::ratio::{continuity_holds, RatioError, RatioVerifier};
use crate::srs::{Srs, SrsError, VerifyingKey};

/// A decoded participant contribution.
pub trait Contribution<C: Curve> {
    fn g1_powers(&self) -> &[G1<C>];
    fn g2_powers(&self) -> &[G2<C>];

    /// Cross-boundary check on the first G1/G2 power of both contributions.
    fn follows(&self, previous: &Self) -> bool
    where
        Self: Sized,
    {
        match (
            self.g1_powers().first(),
            self.g2_powers().first(),
            previous.g1_powers().first(),
            previous.g2_powers().first(),
        ) {
            (Some(g1), Some(g2), Some(prev_g1), Some(prev_g2)) => {
                continuity_holds::<C>(g1, g2, prev_g1, prev_g2)
            }
            _ => false,
        }
    }
}

/// Owned contribution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InMemoryContribution<C: Curve> {
    pub g1: Vec<G1<C>>,
    pub g2: Vec<G2<C>>,
}

impl<C: Curve> InMemoryContribution<C> {
    pub fn new(g1: Vec<G1<C>>, g2: Vec<G2<C>>) -> Self {
        Self { g1, g2 }
    }
}

impl<C: Curve> Contribution<C> for InMemoryContribution<C> {
    fn g1_powers(&self) -> &[G1<C>] {
        &self.g1
    }

    fn g2_powers(&self) -> &[G2<C>] {
        &self.g2
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("empty contribution chain")]
    Empty,
    #[error("contribution {index} carries no G2 power")]
    MissingG2 { index: usize },
    #[error("contribution {index}: {source}")]
    Powers {
        index: usize,
        #[source]
        source: RatioError,
    },
    #[error("contribution {index} does not follow contribution {}", .index - 1)]
    NotFollowing { index: usize },
}

fn check_powers<C: Curve, T: Contribution<C>>(
    index: usize,
    contribution: &T,
    ratio: &RatioVerifier<C>,
) -> Result<(), ChainError> {
    let tau_g2 = contribution
        .g2_powers()
        .first()
        .ok_or(ChainError::MissingG2 { index })?;
    ratio
        .check_powers(contribution.g1_powers(), tau_g2)
        .map_err(|source| ChainError::Powers { index, source })
}

/// Walk the chain pairwise and return its last contribution.
pub fn verify_chain<C, T, I>(contributions: I, ratio: &RatioVerifier<C>) -> Result<T, ChainError>
where
    C: Curve,
    T: Contribution<C>,
    I: IntoIterator<Item = T>,
{
    let mut iter = contributions.into_iter();
    let mut current = iter.next().ok_or(ChainError::Empty)?;
    check_powers(0, &current, ratio)?;

    for (offset, next) in iter.enumerate() {
        let index = offset + 1;
        check_powers(index, &next, ratio)?;
        if !next.follows(&current) {
            return Err(ChainError::NotFollowing { index });
        }
        info!(index, "contribution follows its predecessor");
        current = next;
    }
    Ok(current)
}

impl<C: Curve> Srs<C> {
    /// SRS whose proving key is the contribution's G1 powers.
    ///
    /// The verifying key uses `g1_powers[0]` as its G1 element and
    /// `[G₂, g2_powers[0]]` as its G2 pair.
    pub fn from_contribution<T: Contribution<C>>(
        last: &T,
        generators: &Generators<C>,
    ) -> Result<Self, SrsError> {
        let g1 = *last.g1_powers().first().ok_or(SrsError::Empty)?;
        let tau_g2 = *last
            .g2_powers()
            .first()
            .ok_or(SrsError::MissingAnchor { got: 0 })?;
        Srs::new(
            last.g1_powers().to_vec(),
            VerifyingKey::new(g1, generators.g2, tau_g2),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Ignition, Scalar};
    use crate::ratio::ChallengePolicy;
    use crate::synthetic::{SyntheticRound, TEST_LAYOUT};
    use ark_ec::CurveGroup;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    /// Ignition layout: G1 powers start at τ¹, one G2 power τ·G₂.
    fn ignition_style(round: &SyntheticRound<Ignition>) -> InMemoryContribution<Ignition> {
        InMemoryContribution::new(
            round.all_tau_g1()[1..].to_vec(),
            vec![round.chunk(0).tau_g2[1]],
        )
    }

    fn chain(len: usize, seed: u8) -> Vec<InMemoryContribution<Ignition>> {
        let mut rng = StdRng::from_seed([seed; 32]);
        let mut round = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 2, &mut rng);
        let mut out = vec![ignition_style(&round)];
        for _ in 1..len {
            round = round.next_round(Scalar::<Ignition>::rand(&mut rng));
            out.push(ignition_style(&round));
        }
        out
    }

    fn verifier() -> RatioVerifier<Ignition> {
        RatioVerifier::new(Ignition::default_generators(), ChallengePolicy::FreshPerCheck)
    }

    #[test]
    fn honest_chain_verifies_and_builds_a_working_srs() {
        let contributions = chain(4, 1);
        let expected = contributions[3].clone();
        let last = verify_chain(contributions, &verifier()).unwrap();
        assert_eq!(last, expected);

        let srs = Srs::from_contribution(&last, &Ignition::default_generators()).unwrap();
        assert_eq!(srs.len(), 31);
        assert_eq!(srs.vk().g1, last.g1[0]);
        let mut rng = StdRng::from_seed([2u8; 32]);
        assert_eq!(srs.self_check(60, &mut rng).unwrap(), 31);
    }

    #[test]
    fn broken_link_is_reported_with_its_index() {
        let mut contributions = chain(4, 3);
        let other = chain(1, 4).remove(0);
        contributions[2].g2 = other.g2.clone();

        // The replaced G2 no longer matches contribution 2's own G1 powers.
        let err = verify_chain(contributions, &verifier()).unwrap_err();
        assert!(matches!(err, ChainError::Powers { index: 2, .. }));
    }

    #[test]
    fn rescaled_g1_powers_pass_ratio_but_do_not_follow() {
        let mut contributions = chain(3, 5);
        let mut rng = StdRng::from_seed([6u8; 32]);
        let s = Scalar::<Ignition>::rand(&mut rng);
        let scaled: Vec<_> = contributions[1].g1.iter().map(|p| (*p * s).into_affine()).collect();
        contributions[1].g1 = scaled;

        assert!(!contributions[1].follows(&contributions[0]));
        let err = verify_chain(contributions, &verifier()).unwrap_err();
        assert!(matches!(err, ChainError::NotFollowing { index: 1 }));
        assert_eq!(err.to_string(), "contribution 1 does not follow contribution 0");
    }

    #[test]
    fn empty_chain_and_missing_g2_are_errors() {
        let none: Vec<InMemoryContribution<Ignition>> = Vec::new();
        assert!(matches!(verify_chain(none, &verifier()), Err(ChainError::Empty)));

        let mut contributions = chain(2, 7);
        contributions[1].g2.clear();
        assert!(matches!(
            verify_chain(contributions, &verifier()),
            Err(ChainError::MissingG2 { index: 1 })
        ));
    }
}
