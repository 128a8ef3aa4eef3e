//! Curve bindings and injected ceremony generators
//!
//! A [`Curve`] ties one pairing engine to the short-Weierstrass configurations
//! of its two source groups. Everything downstream (decoding, subgroup and
//! ratio checks, SRS assembly) is generic over it, so the Aleo ceremony
//! (BLS12-377) and the Ignition chain (BN254) share a single code path.
//!
//! The ceremony anchors on a specific generator pair. Aleo contributions use
//! the snarkVM generators, which are **not** the arkworks defaults; this is
//! why the generators are a value handed to each verifier rather than a
//! property read off the curve crate.

#![forbid(unsafe_code)]

use ark_ec::{
    pairing::Pairing,
    short_weierstrass::{Affine, Projective, SWCurveConfig},
    AffineRepr, CurveConfig,
};
use ark_ff::MontFp;
use std::fmt::Debug;

/// A pairing-friendly curve the ceremony tooling can run on.
pub trait Curve: Clone + Copy + Debug + Default + PartialEq + Eq + Send + Sync + 'static {
    /// Configuration of the first source group.
    type G1: SWCurveConfig;
    /// Configuration of the second source group (same scalar field as `G1`).
    type G2: SWCurveConfig<ScalarField = <Self::G1 as CurveConfig>::ScalarField>;
    /// Pairing engine over `G1 × G2`.
    type Engine: Pairing<
        ScalarField = <Self::G1 as CurveConfig>::ScalarField,
        G1 = Projective<Self::G1>,
        G1Affine = Affine<Self::G1>,
        G2 = Projective<Self::G2>,
        G2Affine = Affine<Self::G2>,
    >;

    /// Short tag used in logs, reports and file names.
    const NAME: &'static str;

    /// Generator pair the ceremony transcripts are anchored on.
    fn default_generators() -> Generators<Self>;
}

/// Scalar field of a [`Curve`].
pub type Scalar<C> = <<C as Curve>::G1 as CurveConfig>::ScalarField;
/// Affine G1 point of a [`Curve`].
pub type G1<C> = Affine<<C as Curve>::G1>;
/// Affine G2 point of a [`Curve`].
pub type G2<C> = Affine<<C as Curve>::G2>;
/// Projective G1 point of a [`Curve`].
pub type G1Projective<C> = Projective<<C as Curve>::G1>;
/// Projective G2 point of a [`Curve`].
pub type G2Projective<C> = Projective<<C as Curve>::G2>;
/// Prepared G2 element (precomputed Miller-loop line coefficients).
pub type G2Prepared<C> = <<C as Curve>::Engine as Pairing>::G2Prepared;

/// Errors raised while building curve-level configuration.
#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    #[error("{group} generator is the point at infinity")]
    IdentityGenerator { group: &'static str },
    #[error("{group} generator is not on the curve")]
    NotOnCurve { group: &'static str },
    #[error("{group} generator is outside the prime-order subgroup")]
    NotInSubgroup { group: &'static str },
}

/// Full membership test: on the curve **and** in the prime-order subgroup.
#[inline]
pub fn in_prime_subgroup<P: SWCurveConfig>(p: &Affine<P>) -> bool {
    p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve()
}

fn check_generator<P: SWCurveConfig>(p: &Affine<P>, group: &'static str) -> Result<(), CurveError> {
    if p.is_zero() {
        return Err(CurveError::IdentityGenerator { group });
    }
    if !p.is_on_curve() {
        return Err(CurveError::NotOnCurve { group });
    }
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CurveError::NotInSubgroup { group });
    }
    Ok(())
}

/// The `(G1, G2)` generator pair a ceremony is anchored on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generators<C: Curve> {
    /// G1 generator; `tauG1[0]` of the first chunk must equal it.
    pub g1: G1<C>,
    /// G2 generator; `tauG2[0]` of the first chunk must equal it.
    pub g2: G2<C>,
}

impl<C: Curve> Generators<C> {
    /// Validate and wrap a generator pair.
    pub fn new(g1: G1<C>, g2: G2<C>) -> Result<Self, CurveError> {
        check_generator(&g1, "G1")?;
        check_generator(&g2, "G2")?;
        Ok(Self { g1, g2 })
    }

    /// The arkworks generators of the curve crate.
    pub fn standard() -> Self {
        Self {
            g1: G1::<C>::generator(),
            g2: G2::<C>::generator(),
        }
    }
}

// ---------------------------------------------------------------------------
// Aleo: BLS12-377 with snarkVM generators
// ---------------------------------------------------------------------------

/// BLS12-377 as used by the Aleo powers-of-tau ceremony.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Aleo;

const SNARKVM_G1_X: ark_bls12_377::Fq = MontFp!("89363714989903307245735717098563574705733591463163614225748337416674727625843187853442697973404985688481508350822");
const SNARKVM_G1_Y: ark_bls12_377::Fq = MontFp!("3702177272937190650578065972808860481433820514072818216637796320125658674906330993856598323293086021583822603349");
const SNARKVM_G2_X_C0: ark_bls12_377::Fq = MontFp!("170590608266080109581922461902299092015242589883741236963254737235977648828052995125541529645051927918098146183295");
const SNARKVM_G2_X_C1: ark_bls12_377::Fq = MontFp!("83407003718128594709087171351153471074446327721872642659202721143408712182996929763094113874399921859453255070254");
const SNARKVM_G2_Y_C0: ark_bls12_377::Fq = MontFp!("1843833842842620867708835993770650838640642469700861403869757682057607397502738488921663703124647238454792872005");
const SNARKVM_G2_Y_C1: ark_bls12_377::Fq = MontFp!("33145532013610981697337930729788870077912093258611421158732879580766461459275194744385880708057348608045241477209");

impl Curve for Aleo {
    type G1 = ark_bls12_377::g1::Config;
    type G2 = ark_bls12_377::g2::Config;
    type Engine = ark_bls12_377::Bls12_377;

    const NAME: &'static str = "bls12377";

    fn default_generators() -> Generators<Self> {
        Generators {
            g1: ark_bls12_377::G1Affine::new_unchecked(SNARKVM_G1_X, SNARKVM_G1_Y),
            g2: ark_bls12_377::G2Affine::new_unchecked(
                ark_bls12_377::Fq2::new(SNARKVM_G2_X_C0, SNARKVM_G2_X_C1),
                ark_bls12_377::Fq2::new(SNARKVM_G2_Y_C0, SNARKVM_G2_Y_C1),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Ignition: BN254 with the standard generators
// ---------------------------------------------------------------------------

/// BN254 as used by the Aztec Ignition ceremony.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ignition;

impl Curve for Ignition {
    type G1 = ark_bn254::g1::Config;
    type G2 = ark_bn254::g2::Config;
    type Engine = ark_bn254::Bn254;

    const NAME: &'static str = "bn254";

    fn default_generators() -> Generators<Self> {
        Generators::standard()
    }
}
