//! Parallel prime-order subgroup membership checks over decoded chunks.
//!
//! Every offending index of a category is reported, not just the first one.
//! The point at infinity counts as offending: no honest round contains it.

#![forbid(unsafe_code)]

use ark_ec::{
    short_weierstrass::{Affine, SWCurveConfig},
    AffineRepr,
};
use tracing::debug;

use crate::chunk::{Chunk, Section};
use crate::curve::{in_prime_subgroup, Curve, Generators};
use crate::parallel::ParallelExecutor;

/// Subgroup / anchor failures. Fatal for the chunk.
#[derive(Debug, thiserror::Error)]
pub enum SubgroupError {
    #[error("{section}[0] is not the prime subgroup generator")]
    NotGenerator { section: Section },
    #[error("{section}: {} point(s) at infinity or outside the prime-order subgroup at indices {indices:?}", .indices.len())]
    NotInSubgroup { section: Section, indices: Vec<usize> },
    #[error("first chunk carries {got} {section} point(s), need at least 2")]
    MissingAnchor { section: Section, got: usize },
}

impl SubgroupError {
    /// Offending indices, when the error is a membership failure.
    pub fn indices(&self) -> &[usize] {
        match self {
            SubgroupError::NotInSubgroup { indices, .. } => indices,
            _ => &[],
        }
    }
}

/// Checks chunk points against the prime-order subgroups and the anchor.
#[derive(Clone, Copy, Debug)]
pub struct SubgroupVerifier<C: Curve> {
    generators: Generators<C>,
    executor: ParallelExecutor,
}

impl<C: Curve> SubgroupVerifier<C> {
    pub fn new(generators: Generators<C>, executor: ParallelExecutor) -> Self {
        Self { generators, executor }
    }

    /// Indices of `points` that are the identity, off the curve or outside the subgroup.
    pub fn offending_indices<P: SWCurveConfig>(&self, points: &[Affine<P>]) -> Vec<usize> {
        self.executor.collect_failures(points.len(), |i| {
            let p = &points[i];
            !p.is_zero() && in_prime_subgroup(p)
        })
    }

    fn check_section<P: SWCurveConfig>(
        &self,
        section: Section,
        points: &[Affine<P>],
    ) -> Result<(), SubgroupError> {
        let indices = self.offending_indices(points);
        if indices.is_empty() {
            debug!(%section, n = points.len(), "subgroup check passed");
            Ok(())
        } else {
            Err(SubgroupError::NotInSubgroup { section, indices })
        }
    }

    /// Verify every point of `chunk`; on the first chunk also the anchor.
    pub fn verify(&self, chunk: &Chunk<C>) -> Result<(), SubgroupError> {
        self.check_section(Section::TauG1, &chunk.tau_g1)?;

        if chunk.is_first {
            if chunk.tau_g2.len() < 2 {
                return Err(SubgroupError::MissingAnchor {
                    section: Section::TauG2,
                    got: chunk.tau_g2.len(),
                });
            }
            if chunk.tau_g1.first() != Some(&self.generators.g1) {
                return Err(SubgroupError::NotGenerator { section: Section::TauG1 });
            }
            if chunk.tau_g2[0] != self.generators.g2 {
                return Err(SubgroupError::NotGenerator { section: Section::TauG2 });
            }
            self.check_section(Section::TauG2, &chunk.tau_g2)?;
            self.check_section(Section::AlphaG1, &chunk.alpha_g1)?;
        }
        Ok(())
    }
}
