//! Structured Reference String assembly and persistence
//!
//! # What
//! The ceremony output consumed by KZG provers and verifiers:
//!
//! - **Proving key**: `[τ⁰·G₁, τ¹·G₁, …]`, the concatenation of every verified
//!   chunk's `tauG1` in chunk order.
//! - **Verifying key**: `G₁`, `[G₂, τ·G₂]` and the precomputed Miller-loop
//!   lines of both G2 elements.
//!
//! [`SrsAssembler`] builds it chunk by chunk into a buffer reserved up front;
//! [`Srs::self_check`] runs a KZG commit / open / verify round trip on it.
//!
//! # File Format
//!
//! ```text
//! [8 bytes]  magic "PTAUSRS\0"
//! [u16 LE]   format version (1)
//! [...]      arkworks uncompressed Srs (pk G1 vector, vk G1, G2, τG2, lines)
//! ```
//!
//! # Security
//!
//! Loading a file never proves it came from an honest ceremony. Compare
//! [`Srs::digest`] against the value printed by the verification run.

#![forbid(unsafe_code)]

use ark_serialize::{
    CanonicalDeserialize, CanonicalSerialize, Compress, SerializationError, Validate,
};
use rand::Rng;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkLayout};
use crate::curve::{Curve, Generators, G1, G2, G2Prepared};
use crate::domain::{lagrange_g1, DomainError};
use crate::kzg::{self_check, Kzg, SelfCheckError};

/// File magic for serialized SRS containers.
pub const SRS_MAGIC: &[u8; 8] = b"PTAUSRS\0";
/// Current container version.
pub const SRS_VERSION: u16 = 1;

const IO_BUFFER: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum SrsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
    #[error("bad magic: not an SRS file")]
    BadMagic,
    #[error("unsupported SRS version {0} (expected {})", SRS_VERSION)]
    UnsupportedVersion(u16),
    #[error("SRS has no G1 powers")]
    Empty,
    #[error("cannot truncate SRS of {len} powers to {size}")]
    Truncate { size: usize, len: usize },
    #[error("anchor chunk carries {got} tauG2 point(s), need at least 2")]
    MissingAnchor { got: usize },
    #[error("anchor chunk has not been accumulated")]
    AnchorNotCaptured,
    #[error("accumulating {adding} powers would exceed the reserved capacity {capacity}")]
    Capacity { capacity: usize, adding: usize },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("self-check failed: {0}")]
    SelfCheck(#[from] SelfCheckError),
}

// ===========================================================================
// Keys
// ===========================================================================

/// KZG verifying key with prepared G2 lines.
#[derive(Clone, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct VerifyingKey<C: Curve> {
    pub g1: G1<C>,
    pub g2: G2<C>,
    pub tau_g2: G2<C>,
    pub g2_lines: G2Prepared<C>,
    pub tau_g2_lines: G2Prepared<C>,
}

impl<C: Curve> VerifyingKey<C> {
    /// Build the key, precomputing lines for both G2 elements.
    pub fn new(g1: G1<C>, g2: G2<C>, tau_g2: G2<C>) -> Self {
        Self {
            g1,
            g2,
            tau_g2,
            g2_lines: G2Prepared::<C>::from(g2),
            tau_g2_lines: G2Prepared::<C>::from(tau_g2),
        }
    }
}

/// Proving key powers plus verifying key.
#[derive(Clone, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct Srs<C: Curve> {
    g1_powers: Vec<G1<C>>,
    vk: VerifyingKey<C>,
}

impl<C: Curve> Srs<C> {
    pub fn new(g1_powers: Vec<G1<C>>, vk: VerifyingKey<C>) -> Result<Self, SrsError> {
        if g1_powers.is_empty() {
            return Err(SrsError::Empty);
        }
        Ok(Self { g1_powers, vk })
    }

    /// Number of G1 powers.
    #[inline]
    pub fn len(&self) -> usize {
        self.g1_powers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.g1_powers.is_empty()
    }

    #[inline]
    pub fn g1_powers(&self) -> &[G1<C>] {
        &self.g1_powers
    }

    #[inline]
    pub fn vk(&self) -> &VerifyingKey<C> {
        &self.vk
    }

    /// First `size` powers, same verifying key.
    pub fn truncated(&self, size: usize) -> Result<Self, SrsError> {
        if size == 0 || size > self.len() {
            return Err(SrsError::Truncate { size, len: self.len() });
        }
        Ok(Self {
            g1_powers: self.g1_powers[..size].to_vec(),
            vk: self.vk.clone(),
        })
    }

    /// Same SRS with the proving key in the Lagrange basis of the size-`len` subgroup.
    pub fn to_lagrange(&self) -> Result<Self, SrsError> {
        Ok(Self {
            g1_powers: lagrange_g1::<C>(&self.g1_powers)?,
            vk: self.vk.clone(),
        })
    }

    /// KZG round trip on a random polynomial of `size` coefficients (clamped).
    pub fn self_check<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<usize, SrsError> {
        let used = self_check(&Kzg::new(self), size, rng)?;
        info!(curve = C::NAME, size = used, "SRS self-check passed");
        Ok(used)
    }

    // ----------------------- digest -----------------------

    /// Domain-separated BLAKE3 over the compressed points (lines excluded).
    pub fn digest(&self) -> Result<[u8; 32], SrsError> {
        let mut h = blake3::Hasher::new();
        h.update(b"PTAU.SRS.v1");
        h.update(&(C::NAME.len() as u64).to_be_bytes());
        h.update(C::NAME.as_bytes());
        h.update(&(self.g1_powers.len() as u64).to_be_bytes());

        let mut buf = Vec::with_capacity(self.g1_powers.compressed_size());
        self.g1_powers.serialize_compressed(&mut buf)?;
        self.vk.g1.serialize_compressed(&mut buf)?;
        self.vk.g2.serialize_compressed(&mut buf)?;
        self.vk.tau_g2.serialize_compressed(&mut buf)?;
        h.update(&(buf.len() as u64).to_be_bytes());
        h.update(&buf);
        Ok(*h.finalize().as_bytes())
    }

    /// [`digest`](Self::digest) as lowercase hex.
    pub fn digest_hex(&self) -> Result<String, SrsError> {
        Ok(hex::encode(self.digest()?))
    }

    // ----------------------- persistence -----------------------

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), SrsError> {
        w.write_all(SRS_MAGIC)?;
        w.write_all(&SRS_VERSION.to_le_bytes())?;
        self.serialize_with_mode(&mut w, Compress::No)?;
        w.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R, validate: Validate) -> Result<Self, SrsError> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != SRS_MAGIC {
            return Err(SrsError::BadMagic);
        }
        let mut ver = [0u8; 2];
        r.read_exact(&mut ver)?;
        let ver = u16::from_le_bytes(ver);
        if ver != SRS_VERSION {
            return Err(SrsError::UnsupportedVersion(ver));
        }
        let srs = Self::deserialize_with_mode(&mut r, Compress::No, validate)?;
        if srs.is_empty() {
            return Err(SrsError::Empty);
        }
        Ok(srs)
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), SrsError> {
        let f = File::create(path.as_ref())?;
        self.write_to(BufWriter::with_capacity(IO_BUFFER, f))?;
        debug!(path = %path.as_ref().display(), len = self.len(), "SRS written");
        Ok(())
    }

    /// Read with full point validation.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, SrsError> {
        let f = File::open(path)?;
        Self::read_from(BufReader::with_capacity(IO_BUFFER, f), Validate::Yes)
    }

    /// Read without curve/subgroup validation; for files this tool wrote.
    pub fn read_file_unchecked(path: impl AsRef<Path>) -> Result<Self, SrsError> {
        let f = File::open(path)?;
        Self::read_from(BufReader::with_capacity(IO_BUFFER, f), Validate::No)
    }
}

// ===========================================================================
// Assembler
// ===========================================================================

/// Appends verified chunks into a pre-reserved proving key.
#[derive(Debug)]
pub struct SrsAssembler<C: Curve> {
    generators: Generators<C>,
    capacity: usize,
    g1_powers: Vec<G1<C>>,
    tau_g2: Option<(G2<C>, G2Prepared<C>)>,
}

impl<C: Curve> SrsAssembler<C> {
    /// Reserve `nb_chunks · nb_tau_g1` powers.
    pub fn new(generators: Generators<C>, layout: ChunkLayout, nb_chunks: usize) -> Self {
        let capacity = nb_chunks.saturating_mul(layout.nb_tau_g1);
        Self {
            generators,
            capacity,
            g1_powers: Vec::with_capacity(capacity),
            tau_g2: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.g1_powers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.g1_powers.is_empty()
    }

    /// Append `chunk.tau_g1`; on the anchor chunk also capture `tauG2[1]`.
    pub fn accumulate(&mut self, chunk: &Chunk<C>) -> Result<(), SrsError> {
        let adding = chunk.tau_g1.len();
        if self.g1_powers.len() + adding > self.capacity {
            return Err(SrsError::Capacity { capacity: self.capacity, adding });
        }
        if chunk.is_first {
            let tau_g2 = *chunk
                .anchor_tau_g2()
                .ok_or(SrsError::MissingAnchor { got: chunk.tau_g2.len() })?;
            self.tau_g2 = Some((tau_g2, G2Prepared::<C>::from(tau_g2)));
        } else if self.tau_g2.is_none() {
            return Err(SrsError::AnchorNotCaptured);
        }
        self.g1_powers.extend_from_slice(&chunk.tau_g1);
        Ok(())
    }

    pub fn finalize(self) -> Result<Srs<C>, SrsError> {
        let (tau_g2, tau_g2_lines) = self.tau_g2.ok_or(SrsError::AnchorNotCaptured)?;
        let vk = VerifyingKey {
            g1: self.generators.g1,
            g2: self.generators.g2,
            tau_g2,
            g2_lines: G2Prepared::<C>::from(self.generators.g2),
            tau_g2_lines,
        };
        debug!(len = self.g1_powers.len(), "SRS finalized");
        Srs::new(self.g1_powers, vk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Aleo, Ignition};
    use crate::synthetic::{SyntheticRound, TEST_LAYOUT};
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::tempdir;

    fn assemble<C: Curve>(round: &SyntheticRound<C>) -> Srs<C> {
        let mut asm = SrsAssembler::new(round.generators, round.layout, round.nb_chunks);
        for i in 0..round.nb_chunks {
            asm.accumulate(&round.chunk(i)).unwrap();
        }
        asm.finalize().unwrap()
    }

    #[test]
    fn assembled_srs_concatenates_chunks_and_passes_self_check() {
        let mut rng = StdRng::from_seed([42u8; 32]);
        let round = SyntheticRound::<Aleo>::sample(TEST_LAYOUT, 4, &mut rng);
        let srs = assemble(&round);

        assert_eq!(srs.len(), 64);
        assert_eq!(srs.g1_powers(), round.all_tau_g1());
        assert_eq!(srs.vk().g1, round.generators.g1);
        assert_eq!(srs.vk().tau_g2, round.chunk(0).tau_g2[1]);
        assert_eq!(srs.self_check(60, &mut rng).unwrap(), 60);
    }

    #[test]
    fn assembler_enforces_order_and_capacity() {
        let mut rng = StdRng::from_seed([43u8; 32]);
        let round = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 2, &mut rng);

        let mut asm = SrsAssembler::new(round.generators, TEST_LAYOUT, 2);
        assert!(matches!(asm.accumulate(&round.chunk(1)), Err(SrsError::AnchorNotCaptured)));

        let mut asm = SrsAssembler::new(round.generators, TEST_LAYOUT, 1);
        asm.accumulate(&round.chunk(0)).unwrap();
        assert!(matches!(
            asm.accumulate(&round.chunk(1)),
            Err(SrsError::Capacity { capacity: 16, adding: 16 })
        ));

        let asm = SrsAssembler::<Ignition>::new(round.generators, TEST_LAYOUT, 1);
        assert!(matches!(asm.finalize(), Err(SrsError::AnchorNotCaptured)));
    }

    #[test]
    fn self_check_catches_a_corrupted_power() {
        let mut rng = StdRng::from_seed([44u8; 32]);
        let round = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 4, &mut rng);
        let mut srs = assemble(&round);
        srs.g1_powers.swap(3, 4);
        assert!(matches!(srs.self_check(60, &mut rng), Err(SrsError::SelfCheck(_))));
    }

    #[test]
    fn file_roundtrip_preserves_digest() {
        let mut rng = StdRng::from_seed([45u8; 32]);
        let round = SyntheticRound::<Aleo>::sample(TEST_LAYOUT, 2, &mut rng);
        let srs = assemble(&round);

        let dir = tempdir().unwrap();
        let path = dir.path().join("kzg_srs_32_bls12377_test");
        srs.write_file(&path).unwrap();

        let checked = Srs::<Aleo>::read_file(&path).unwrap();
        let unchecked = Srs::<Aleo>::read_file_unchecked(&path).unwrap();
        assert_eq!(checked.g1_powers(), srs.g1_powers());
        assert_eq!(checked.digest().unwrap(), srs.digest().unwrap());
        assert_eq!(unchecked.digest_hex().unwrap(), srs.digest_hex().unwrap());
        assert_eq!(srs.digest_hex().unwrap().len(), 64);
        checked.self_check(32, &mut rng).unwrap();
    }

    #[test]
    fn bad_magic_and_version_are_rejected() {
        let mut rng = StdRng::from_seed([46u8; 32]);
        let srs = assemble(&SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 1, &mut rng));
        let mut bytes = Vec::new();
        srs.write_to(&mut bytes).unwrap();

        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(matches!(
            Srs::<Ignition>::read_from(bad.as_slice(), Validate::Yes),
            Err(SrsError::BadMagic)
        ));

        let mut bad = bytes.clone();
        bad[8] = 9;
        assert!(matches!(
            Srs::<Ignition>::read_from(bad.as_slice(), Validate::Yes),
            Err(SrsError::UnsupportedVersion(9))
        ));

        assert!(Srs::<Ignition>::read_from(&bytes[..bytes.len() - 1], Validate::Yes).is_err());
    }

    #[test]
    fn truncation_and_lagrange_keep_the_key_usable() {
        let mut rng = StdRng::from_seed([47u8; 32]);
        let round = SyntheticRound::<Ignition>::sample(TEST_LAYOUT, 4, &mut rng);
        let srs = assemble(&round);

        let small = srs.truncated(32).unwrap();
        assert_eq!(small.g1_powers(), &srs.g1_powers()[..32]);
        assert_ne!(small.digest().unwrap(), srs.digest().unwrap());
        small.self_check(60, &mut rng).unwrap();

        assert!(matches!(srs.truncated(65), Err(SrsError::Truncate { size: 65, len: 64 })));
        assert!(srs.truncated(0).is_err());

        let lagrange = small.to_lagrange().unwrap();
        assert_eq!(lagrange.len(), 32);
        assert_ne!(lagrange.g1_powers(), small.g1_powers());
        assert!(matches!(
            srs.truncated(48).unwrap().to_lagrange(),
            Err(SrsError::Domain(DomainError::BadSize(48)))
        ));
    }
}
