//! Round-boundary continuity, reusable at any chunk index.

#![forbid(unsafe_code)]

use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::chunk::Chunk;
use crate::curve::Curve;
use crate::ratio::{check_chunk_continuity, RatioError};

/// Compares aligned chunks of two consecutive rounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContinuityChecker<C: Curve> {
    _curve: PhantomData<C>,
}

impl<C: Curve> ContinuityChecker<C> {
    pub fn new() -> Self {
        Self { _curve: PhantomData }
    }

    /// `true` iff `current` composes with `previous` at `chunk_index`.
    ///
    /// Both chunks must carry `tauG2`; only the anchor chunk does in the
    /// Aleo layout, so any other index compares as `false`.
    pub fn compare(&self, current: &Chunk<C>, previous: &Chunk<C>, chunk_index: usize) -> bool {
        match check_chunk_continuity(current, previous, chunk_index) {
            Ok(()) => {
                debug!(chunk_index, "continuity holds");
                true
            }
            Err(RatioError::MissingAnchor) => {
                warn!(chunk_index, "continuity requested on a chunk without tauG2");
                false
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Ignition, Scalar};
    use crate::synthetic::{SyntheticRound, TEST_LAYOUT};
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn consecutive_rounds_compare_equal() {
        let mut rng = StdRng::from_seed([21u8; 32]);
        let r0 = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 2, &mut rng);
        let r1 = r0.next_round(Scalar::<Ignition>::rand(&mut rng));
        let r2 = r1.next_round(Scalar::<Ignition>::rand(&mut rng));
        let checker = ContinuityChecker::<Ignition>::new();

        assert!(checker.compare(&r1.chunk(0), &r0.chunk(0), 0));
        assert!(checker.compare(&r2.chunk(0), &r1.chunk(0), 0));

        // tauG1[1] and tauG2[1] of the current round disagree on the secret.
        let mut forged = r2.chunk(0);
        forged.tau_g2[1] = r1.chunk(0).tau_g2[1];
        assert!(!checker.compare(&forged, &r1.chunk(0), 0));
    }

    #[test]
    fn chunks_without_tau_g2_never_compare() {
        let mut rng = StdRng::from_seed([22u8; 32]);
        let r0 = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 2, &mut rng);
        let r1 = r0.next_round(Scalar::<Ignition>::rand(&mut rng));
        assert!(!ContinuityChecker::<Ignition>::new().compare(&r1.chunk(1), &r0.chunk(1), 1));
    }
}
