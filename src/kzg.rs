//! KZG over an assembled SRS, and the generic SRS self-check
//!
//! # What
//! - [`CommitmentScheme`] is the commit / open / verify capability set the
//!   self-check needs. [`self_check`] is written once against it.
//! - [`Kzg`] implements it over an [`Srs`] on any [`Curve`]: commitment
//!   `C = Σ aᵢ·[τⁱ]₁`, opening witness `W = [q(τ)]₁` with
//!   `q(X) = (f(X) − f(z)) / (X − z)`, verification
//!   `e(C − v·G₁ + z·W, G₂) · e(−W, [τ]₂) = 1` on the prepared G2 lines.
//!
//! # Format
//! Coefficients are monomial, low→high (`poly[i]` multiplies `Xⁱ`).

#![forbid(unsafe_code)]

use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{Field, One, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::Rng;
use tracing::debug;

use crate::curve::{Curve, Scalar, G1, G1Projective};
use crate::srs::Srs;

/// Commit / open / verify over one scalar field.
pub trait CommitmentScheme {
    type Scalar: Field;
    type Commitment;
    type Proof;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Largest polynomial length (number of coefficients) accepted.
    fn capacity(&self) -> usize;

    fn commit(&self, poly: &[Self::Scalar]) -> Result<Self::Commitment, Self::Error>;

    /// Returns `(f(point), proof)`.
    fn open(
        &self,
        poly: &[Self::Scalar],
        point: Self::Scalar,
    ) -> Result<(Self::Scalar, Self::Proof), Self::Error>;

    fn verify(
        &self,
        commitment: &Self::Commitment,
        point: Self::Scalar,
        claimed: Self::Scalar,
        proof: &Self::Proof,
    ) -> Result<(), Self::Error>;
}

/// `Σ poly[i]·xⁱ` by Horner's rule.
pub fn horner_eval<F: Field>(poly: &[F], x: F) -> F {
    let mut acc = F::zero();
    for c in poly.iter().rev() {
        acc *= x;
        acc += c;
    }
    acc
}

// ===========================================================================
// KZG
// ===========================================================================

/// KZG commitment (wrap the G1 point directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Commitment<C: Curve>(pub G1<C>);

/// Single-point opening proof: commitment to the quotient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct OpeningProof<C: Curve> {
    pub witness: G1<C>,
}

#[derive(Debug, thiserror::Error)]
pub enum KzgError {
    #[error("polynomial has {len} coefficients, SRS supports {capacity}")]
    TooLarge { len: usize, capacity: usize },
    #[error("empty polynomial")]
    Empty,
    #[error("final pairing check failed")]
    Pairing,
}

/// KZG borrowing an assembled SRS.
#[derive(Clone, Copy, Debug)]
pub struct Kzg<'a, C: Curve> {
    srs: &'a Srs<C>,
}

impl<'a, C: Curve> Kzg<'a, C> {
    pub fn new(srs: &'a Srs<C>) -> Self {
        Self { srs }
    }

    fn check_len(&self, len: usize) -> Result<(), KzgError> {
        if len == 0 {
            return Err(KzgError::Empty);
        }
        if len > self.capacity() {
            return Err(KzgError::TooLarge { len, capacity: self.capacity() });
        }
        Ok(())
    }
}

impl<C: Curve> CommitmentScheme for Kzg<'_, C> {
    type Scalar = Scalar<C>;
    type Commitment = Commitment<C>;
    type Proof = OpeningProof<C>;
    type Error = KzgError;

    fn capacity(&self) -> usize {
        self.srs.len()
    }

    fn commit(&self, poly: &[Scalar<C>]) -> Result<Commitment<C>, KzgError> {
        self.check_len(poly.len())?;
        let pk = &self.srs.g1_powers()[..poly.len()];
        Ok(Commitment(G1Projective::<C>::msm_unchecked(pk, poly).into_affine()))
    }

    fn open(
        &self,
        poly: &[Scalar<C>],
        point: Scalar<C>,
    ) -> Result<(Scalar<C>, OpeningProof<C>), KzgError> {
        self.check_len(poly.len())?;

        // Synthetic division high→low: b_{i-1} = a_i + z·b_i. The last
        // remainder is f(z); the others are the quotient coefficients.
        let mut quotient = vec![Scalar::<C>::zero(); poly.len() - 1];
        let mut acc = Scalar::<C>::zero();
        for (i, a_i) in poly.iter().enumerate().rev() {
            acc = *a_i + point * acc;
            if i > 0 {
                quotient[i - 1] = acc;
            }
        }

        let pk = &self.srs.g1_powers()[..quotient.len()];
        let witness = G1Projective::<C>::msm_unchecked(pk, &quotient).into_affine();
        Ok((acc, OpeningProof { witness }))
    }

    fn verify(
        &self,
        commitment: &Commitment<C>,
        point: Scalar<C>,
        claimed: Scalar<C>,
        proof: &OpeningProof<C>,
    ) -> Result<(), KzgError> {
        let vk = self.srs.vk();
        let lhs = commitment.0.into_group() - vk.g1 * claimed + proof.witness * point;
        let mlo = C::Engine::multi_miller_loop(
            [lhs.into_affine(), -proof.witness],
            [vk.g2_lines.clone(), vk.tau_g2_lines.clone()],
        );
        match C::Engine::final_exponentiation(mlo) {
            Some(fe) if fe.0.is_one() => Ok(()),
            _ => Err(KzgError::Pairing),
        }
    }
}

// ===========================================================================
// Self-check
// ===========================================================================

/// Default self-check polynomial length.
pub const SELF_CHECK_SIZE: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum SelfCheckError {
    #[error("commitment scheme has no capacity")]
    NoCapacity,
    #[error("opened value does not match direct evaluation")]
    ClaimedValue,
    #[error("commitment scheme: {0}")]
    Scheme(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl SelfCheckError {
    fn scheme<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        SelfCheckError::Scheme(Box::new(e))
    }
}

/// Commit a random polynomial, open it at a random point and verify.
///
/// `size` is clamped to the scheme's capacity. Returns the length used.
pub fn self_check<S, R>(scheme: &S, size: usize, rng: &mut R) -> Result<usize, SelfCheckError>
where
    S: CommitmentScheme,
    R: Rng + ?Sized,
{
    let size = size.min(scheme.capacity());
    if size == 0 {
        return Err(SelfCheckError::NoCapacity);
    }

    let poly: Vec<S::Scalar> = (0..size).map(|_| S::Scalar::rand(rng)).collect();
    let point = S::Scalar::rand(rng);

    let commitment = scheme.commit(&poly).map_err(SelfCheckError::scheme)?;
    let (claimed, proof) = scheme.open(&poly, point).map_err(SelfCheckError::scheme)?;
    if claimed != horner_eval(&poly, point) {
        return Err(SelfCheckError::ClaimedValue);
    }
    scheme
        .verify(&commitment, point, claimed, &proof)
        .map_err(SelfCheckError::scheme)?;

    debug!(size, "self-check passed");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Aleo, Ignition};
    use crate::srs::SrsAssembler;
    use crate::synthetic::{SyntheticRound, TEST_LAYOUT};
    use rand::{rngs::StdRng, SeedableRng};

    fn srs_for<C: Curve>(seed: u8, nb_chunks: usize) -> Srs<C> {
        let mut rng = StdRng::from_seed([seed; 32]);
        let round = SyntheticRound::<C>::sample(TEST_LAYOUT, nb_chunks, &mut rng);
        let mut asm = SrsAssembler::new(round.generators, TEST_LAYOUT, nb_chunks);
        for i in 0..nb_chunks {
            asm.accumulate(&round.chunk(i)).unwrap();
        }
        asm.finalize().unwrap()
    }

    #[test]
    fn horner_matches_naive_sum() {
        let mut rng = StdRng::from_seed([42u8; 32]);
        let poly: Vec<Scalar<Ignition>> = (0..9).map(|_| UniformRand::rand(&mut rng)).collect();
        let x = Scalar::<Ignition>::rand(&mut rng);
        let mut naive = Scalar::<Ignition>::zero();
        for (i, c) in poly.iter().enumerate() {
            naive += *c * x.pow([i as u64]);
        }
        assert_eq!(horner_eval(&poly, x), naive);
        assert_eq!(horner_eval::<Scalar<Ignition>>(&[], x), Scalar::<Ignition>::zero());
    }

    #[test]
    fn open_verify_roundtrip_on_both_curves() {
        let mut rng = StdRng::from_seed([3u8; 32]);

        let srs = srs_for::<Aleo>(1, 4);
        assert_eq!(self_check(&Kzg::new(&srs), SELF_CHECK_SIZE, &mut rng).unwrap(), 60);

        let srs = srs_for::<Ignition>(2, 2);
        // 32 powers available: the size is clamped.
        assert_eq!(self_check(&Kzg::new(&srs), SELF_CHECK_SIZE, &mut rng).unwrap(), 32);
    }

    #[test]
    fn wrong_value_or_point_is_rejected() {
        let mut rng = StdRng::from_seed([4u8; 32]);
        let srs = srs_for::<Ignition>(5, 2);
        let kzg = Kzg::new(&srs);

        let poly: Vec<Scalar<Ignition>> = (0..20).map(|_| UniformRand::rand(&mut rng)).collect();
        let z = Scalar::<Ignition>::rand(&mut rng);
        let c = kzg.commit(&poly).unwrap();
        let (v, proof) = kzg.open(&poly, z).unwrap();
        kzg.verify(&c, z, v, &proof).unwrap();

        assert!(matches!(
            kzg.verify(&c, z, v + Scalar::<Ignition>::one(), &proof),
            Err(KzgError::Pairing)
        ));
        assert!(matches!(
            kzg.verify(&c, z + Scalar::<Ignition>::one(), v, &proof),
            Err(KzgError::Pairing)
        ));
    }

    #[test]
    fn oversized_and_empty_polynomials_are_errors() {
        let srs = srs_for::<Ignition>(6, 1);
        let kzg = Kzg::new(&srs);
        let big = vec![Scalar::<Ignition>::one(); 17];
        assert!(matches!(
            kzg.commit(&big),
            Err(KzgError::TooLarge { len: 17, capacity: 16 })
        ));
        assert!(matches!(kzg.commit(&[]), Err(KzgError::Empty)));
    }

    #[test]
    fn constant_polynomial_has_identity_witness() {
        let srs = srs_for::<Ignition>(7, 1);
        let kzg = Kzg::new(&srs);
        let f = [Scalar::<Ignition>::from(9u64)];
        let (v, proof) = kzg.open(&f, Scalar::<Ignition>::from(4321u64)).unwrap();
        assert_eq!(v, f[0]);
        assert!(proof.witness.is_zero());
        kzg.verify(&kzg.commit(&f).unwrap(), Scalar::<Ignition>::from(4321u64), v, &proof)
            .unwrap();
    }
}
