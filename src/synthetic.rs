//! Synthetic ceremony rounds built from a **publicly known** secret.
//!
//! # ⚠️  NOT FOR PRODUCTION
//!
//! Every round produced here knows its own `τ` and `α`. Anyone holding the
//! round can forge openings against an SRS derived from it. These rounds exist
//! so the verifier can be exercised end to end (tests, the `dev-srs`
//! generator binary) without the real multi-gigabyte ceremony transcript.
//!
//! Chunk `i` of a round holds `tauG1[j] = τ^{i·n + j}·G₁` for `j < n`; chunk 0
//! additionally carries `tauG2[j] = τ^j·G₂` and `alphaG1[j] = α·τ^j·G₁`.

#![forbid(unsafe_code)]

use ark_ec::{AffineRepr, CurveConfig, CurveGroup};
use ark_ff::{Field, One, UniformRand};
use rand::Rng;
use rayon::prelude::*;
use std::io;

use crate::ceremony::RoundDir;
use crate::chunk::{write_chunk, Chunk, ChunkLayout, HASH_LEN};
use crate::curve::{Curve, Generators, Scalar, G1, G1Projective, G2, G2Projective};

/// Small layout used by the crate's own tests and the dev generator.
pub const TEST_LAYOUT: ChunkLayout = ChunkLayout {
    nb_tau_g1: 16,
    nb_tau_g2: 4,
    nb_alpha_g1: 3,
};

fn powers<F: Field>(base: F, count: usize) -> Vec<F> {
    let mut out = Vec::with_capacity(count);
    let mut acc = F::one();
    for _ in 0..count {
        out.push(acc);
        acc *= base;
    }
    out
}

fn g1_table<C: Curve>(gen: G1<C>, scalars: &[Scalar<C>]) -> Vec<G1<C>> {
    let proj: Vec<G1Projective<C>> = scalars.par_iter().map(|s| gen * *s).collect();
    G1Projective::<C>::normalize_batch(&proj)
}

fn g2_table<C: Curve>(gen: G2<C>, scalars: &[Scalar<C>]) -> Vec<G2<C>> {
    let proj: Vec<G2Projective<C>> = scalars.par_iter().map(|s| gen * *s).collect();
    G2Projective::<C>::normalize_batch(&proj)
}

/// A full synthetic round: every chunk's points, derived from known secrets.
#[derive(Clone, Debug)]
pub struct SyntheticRound<C: Curve> {
    /// Accumulated secret of this round.
    pub tau: Scalar<C>,
    /// Accumulated alpha of this round.
    pub alpha: Scalar<C>,
    /// Chunk layout.
    pub layout: ChunkLayout,
    /// Number of chunks in the round.
    pub nb_chunks: usize,
    /// Generators the round is anchored on.
    pub generators: Generators<C>,
    label: u64,
    tau_g1: Vec<G1<C>>,
    tau_g2: Vec<G2<C>>,
    alpha_g1: Vec<G1<C>>,
}

impl<C: Curve> SyntheticRound<C> {
    /// Build a round from explicit secrets.
    pub fn new(
        layout: ChunkLayout,
        nb_chunks: usize,
        generators: Generators<C>,
        tau: Scalar<C>,
        alpha: Scalar<C>,
    ) -> Self {
        let n = layout.nb_tau_g1;
        let tau_pows = powers(tau, n * nb_chunks.max(1));
        let alpha_pows: Vec<Scalar<C>> = tau_pows[..layout.nb_alpha_g1.min(tau_pows.len())]
            .iter()
            .map(|t| alpha * t)
            .collect();

        Self {
            tau,
            alpha,
            layout,
            nb_chunks,
            generators,
            label: 0,
            tau_g1: g1_table::<C>(generators.g1, &tau_pows),
            tau_g2: g2_table::<C>(generators.g2, &powers(tau, layout.nb_tau_g2)),
            alpha_g1: g1_table::<C>(generators.g1, &alpha_pows),
        }
    }

    /// Random secrets, curve-default generators.
    pub fn sample<R: Rng + ?Sized>(layout: ChunkLayout, nb_chunks: usize, rng: &mut R) -> Self {
        let tau = Scalar::<C>::rand(rng);
        let alpha = Scalar::<C>::rand(rng);
        Self::new(layout, nb_chunks, C::default_generators(), tau, alpha)
    }

    /// The round obtained when one more participant multiplies in `secret`.
    pub fn next_round(&self, secret: Scalar<C>) -> Self {
        let mut next = Self::new(
            self.layout,
            self.nb_chunks,
            self.generators,
            self.tau * secret,
            self.alpha * secret,
        );
        next.label = self.label + 1;
        next
    }

    /// Number of the round (0 for a fresh round, +1 per `next_round`).
    #[inline]
    pub fn label(&self) -> u64 {
        self.label
    }

    /// All G1 powers of the round in chunk order.
    #[inline]
    pub fn all_tau_g1(&self) -> &[G1<C>] {
        &self.tau_g1
    }

    fn chunk_hash(&self, index: usize) -> [u8; HASH_LEN] {
        let mut h = blake3::Hasher::new();
        h.update(b"PTAU.synthetic.chunk.v1");
        h.update(C::NAME.as_bytes());
        h.update(&self.label.to_le_bytes());
        h.update(&(index as u64).to_le_bytes());
        let mut out = [0u8; HASH_LEN];
        h.finalize_xof().fill(&mut out);
        out
    }

    /// Chunk `index` of this round.
    pub fn chunk(&self, index: usize) -> Chunk<C> {
        let n = self.layout.nb_tau_g1;
        let is_first = index == 0;
        Chunk {
            hash: self.chunk_hash(index),
            tau_g1: self.tau_g1[index * n..(index + 1) * n].to_vec(),
            tau_g2: if is_first { self.tau_g2.clone() } else { Vec::new() },
            alpha_g1: if is_first { self.alpha_g1.clone() } else { Vec::new() },
            is_first,
        }
    }

    /// Write every chunk under `dir` in the ceremony directory layout.
    pub fn write_round(&self, dir: &RoundDir) -> io::Result<()> {
        for i in 0..self.nb_chunks {
            let path = dir.chunk_path(i);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_chunk(&path, &self.chunk(i))?;
        }
        Ok(())
    }
}

/// `s·G₁` for a random `s` (useful for perturbing powers in tests).
pub fn random_g1<C: Curve, R: Rng + ?Sized>(rng: &mut R) -> G1<C> {
    (G1::<C>::generator() * Scalar::<C>::rand(rng)).into_affine()
}

/// The `skip`-th G1 point (scanning `x = 1, 2, …`) that lies on the curve but
/// outside the prime-order subgroup. `None` when the G1 cofactor is one.
pub fn cofactor_point<C: Curve>(skip: usize) -> Option<G1<C>> {
    let cofactor = <C::G1 as CurveConfig>::COFACTOR;
    if cofactor.first() == Some(&1) && cofactor.iter().skip(1).all(|w| *w == 0) {
        return None;
    }
    let mut x = <C::G1 as CurveConfig>::BaseField::one();
    let mut found = 0usize;
    loop {
        if let Some(p) = G1::<C>::get_point_from_x_unchecked(x, false) {
            if p.is_on_curve() && !p.is_in_correct_subgroup_assuming_on_curve() {
                if found == skip {
                    return Some(p);
                }
                found += 1;
            }
        }
        x += <C::G1 as CurveConfig>::BaseField::one();
    }
}
