//! Radix-2 evaluation domains and transforms
//!
//! Multiplicative subgroup `H = {1, ω, …, ω^{N-1}}` of the scalar field with
//! `N` a power of two. The butterfly is written once over any value that
//! scales by a field element, so the same NTT/IFFT serves scalar vectors and
//! vectors of G1 points.
//!
//! ## Lagrange SRS
//! With `Lᵢ` the Lagrange basis of `H`, `[Lᵢ(τ)]₁ = N⁻¹ · Σⱼ ω^{-ij}·[τʲ]₁`,
//! i.e. the inverse transform of the canonical powers. [`lagrange_g1`] runs it
//! directly on the points.

#![forbid(unsafe_code)]

use ark_ec::CurveGroup;
use ark_ff::{FftField, Field};
use rayon::prelude::*;
use std::ops::{Add, Mul, Sub};

use crate::curve::{Curve, Scalar, G1, G1Projective};

/// Errors produced by domain construction / transforms.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("domain size must be a positive power of two (got {0})")]
    BadSize(usize),
    #[error("scalar field has no subgroup of order {0}")]
    NoRootOfUnity(usize),
    #[error("omega is not primitive: omega^(N/2) == 1")]
    OmegaNotPrimitive,
    #[error("input length {got} does not match domain size {n}")]
    BadLen { got: usize, n: usize },
}

/// Size-`N` multiplicative subgroup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Radix2Domain<F> {
    /// Domain size `N` (power of two).
    pub n: usize,
    /// Generator `ω` of `H`.
    pub omega: F,
}

impl<F: FftField> Radix2Domain<F> {
    pub fn new(n: usize) -> Result<Self, DomainError> {
        if n == 0 || !n.is_power_of_two() {
            return Err(DomainError::BadSize(n));
        }
        let omega = F::get_root_of_unity(n as u64).ok_or(DomainError::NoRootOfUnity(n))?;
        let d = Self { n, omega };
        d.validate()?;
        Ok(d)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if !self.omega.pow([self.n as u64]).is_one() {
            return Err(DomainError::NoRootOfUnity(self.n));
        }
        if self.n > 1 && self.omega.pow([(self.n / 2) as u64]).is_one() {
            return Err(DomainError::OmegaNotPrimitive);
        }
        Ok(())
    }

    fn check_len(&self, got: usize) -> Result<(), DomainError> {
        if got != self.n {
            return Err(DomainError::BadLen { got, n: self.n });
        }
        Ok(())
    }

    /// Coefficients (low→high) to evaluations over `H`.
    pub fn ntt(&self, coeffs: &[F]) -> Result<Vec<F>, DomainError> {
        self.check_len(coeffs.len())?;
        let mut a = coeffs.to_vec();
        ntt_in_place(&mut a, self.omega);
        Ok(a)
    }

    /// Evaluations over `H` to coefficients (low→high).
    pub fn intt(&self, evals: &[F]) -> Result<Vec<F>, DomainError> {
        self.check_len(evals.len())?;
        let mut a = evals.to_vec();
        intt_in_place(&mut a, self.omega)?;
        Ok(a)
    }
}

// ------------------------- Butterflies -------------------------

/// Reorder `a` (power-of-two length) so index `i` holds the element at the
/// bit-reversal of `i` over `log2(len)` bits.
fn bit_reverse_permute<T>(a: &mut [T]) {
    let n = a.len();
    if n < 2 {
        return;
    }
    let shift = usize::BITS - n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> shift;
        if i < j {
            a.swap(i, j);
        }
    }
}

fn ntt_in_place<T, F>(a: &mut [T], root: F)
where
    F: Field,
    T: Copy + Send + Sync + Add<Output = T> + Sub<Output = T> + Mul<F, Output = T>,
{
    let n = a.len();
    debug_assert!(n.is_power_of_two());

    bit_reverse_permute(a);

    // Cooley–Tukey; blocks of one stage are independent
    let mut len = 2;
    while len <= n {
        let w_len = root.pow([(n / len) as u64]);
        let half = len / 2;
        a.par_chunks_mut(len).for_each(|blk| {
            let mut w = F::one();
            for i in 0..half {
                let u = blk[i];
                let v = blk[i + half] * w;
                blk[i] = u + v;
                blk[i + half] = u - v;
                w *= w_len;
            }
        });
        len <<= 1;
    }
}

fn intt_in_place<T, F>(a: &mut [T], root: F) -> Result<(), DomainError>
where
    F: Field,
    T: Copy + Send + Sync + Add<Output = T> + Sub<Output = T> + Mul<F, Output = T>,
{
    let n = a.len();
    let inv_root = root.inverse().ok_or(DomainError::NoRootOfUnity(n))?;
    ntt_in_place(a, inv_root);
    let inv_n = F::from(n as u64).inverse().ok_or(DomainError::BadSize(n))?;
    a.par_iter_mut().for_each(|x| *x = *x * inv_n);
    Ok(())
}

/// Canonical powers `[τⁱ]₁` (length `N`) to the Lagrange basis `[Lᵢ(τ)]₁` of `H`.
pub fn lagrange_g1<C: Curve>(powers: &[G1<C>]) -> Result<Vec<G1<C>>, DomainError> {
    let domain = Radix2Domain::<Scalar<C>>::new(powers.len())?;
    let mut a: Vec<G1Projective<C>> = powers.par_iter().map(|p| G1Projective::<C>::from(*p)).collect();
    intt_in_place(&mut a, domain.omega)?;
    Ok(G1Projective::<C>::normalize_batch(&a))
}
