//! Contribution chunk wire format
//!
//! ```text
//! [64 bytes]               hash
//! [nb_tau_g1 × (X, Y)]     tauG1
//! -- first chunk only --
//! [nb_tau_g2 × (X, Y)]     tauG2   (each coordinate written c0, c1)
//! [nb_alpha_g1 × (X, Y)]   alphaG1
//! ```
//!
//! Prime-field elements are little-endian, `ceil(bits/8)` bytes wide and must
//! be canonical (`< p`). A point whose two coordinates are zero is the point
//! at infinity. The file length must match the layout exactly.
//!
//! Decoding performs **no** curve or subgroup validation; that is the job of
//! [`crate::subgroup`]. Each call returns a fresh [`Chunk`].

#![forbid(unsafe_code)]

use ark_ec::{
    short_weierstrass::{Affine, SWCurveConfig},
    AffineRepr,
};
use ark_ff::{BigInteger, Field, PrimeField, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::Path;

use crate::curve::{Curve, G1, G2};

/// Length of the integrity tag heading every chunk file.
pub const HASH_LEN: usize = 64;

const IO_BUFFER: usize = 1 << 20;

/// Per-chunk element counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLayout {
    /// Number of `tauG1` points in every chunk.
    pub nb_tau_g1: usize,
    /// Number of `tauG2` points in the first chunk.
    pub nb_tau_g2: usize,
    /// Number of `alphaG1` points in the first chunk.
    pub nb_alpha_g1: usize,
}

/// Layout errors (rejected before any byte is read).
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("nb_tau_g1 must be at least 2 (got {0})")]
    TooFewTauG1(usize),
    #[error("nb_tau_g2 must be at least 2 (got {0})")]
    TooFewTauG2(usize),
    #[error("nb_alpha_g1 must be at least 1 (got {0})")]
    TooFewAlphaG1(usize),
}

impl ChunkLayout {
    /// The Aleo ceremony layout.
    pub const ALEO: Self = Self {
        nb_tau_g1: 65536,
        nb_tau_g2: 30,
        nb_alpha_g1: 87,
    };

    /// Number of chunks per Aleo round.
    pub const ALEO_CHUNKS: usize = 4096;

    /// Check the counts the verification protocol relies on.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.nb_tau_g1 < 2 {
            return Err(LayoutError::TooFewTauG1(self.nb_tau_g1));
        }
        if self.nb_tau_g2 < 2 {
            return Err(LayoutError::TooFewTauG2(self.nb_tau_g2));
        }
        if self.nb_alpha_g1 < 1 {
            return Err(LayoutError::TooFewAlphaG1(self.nb_alpha_g1));
        }
        Ok(())
    }

    /// Exact byte length of a chunk file for curve `C`.
    pub fn expected_len<C: Curve>(&self, is_first: bool) -> u64 {
        let g1 = point_bytes::<C::G1>() as u64;
        let g2 = point_bytes::<C::G2>() as u64;
        let mut len = HASH_LEN as u64 + self.nb_tau_g1 as u64 * g1;
        if is_first {
            len += self.nb_tau_g2 as u64 * g2 + self.nb_alpha_g1 as u64 * g1;
        }
        len
    }
}

/// Width in bytes of one encoded prime-field element.
#[inline]
pub fn prime_field_bytes<F: PrimeField>() -> usize {
    ((F::MODULUS_BIT_SIZE + 7) / 8) as usize
}

/// Width in bytes of one encoded (possibly extension) field element.
#[inline]
pub fn field_bytes<F: Field>() -> usize {
    F::extension_degree() as usize * prime_field_bytes::<F::BasePrimeField>()
}

/// Width in bytes of one encoded affine point.
#[inline]
pub fn point_bytes<P: SWCurveConfig>() -> usize {
    2 * field_bytes::<P::BaseField>()
}

/// Which part of a chunk an element belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Hash,
    TauG1,
    TauG2,
    AlphaG1,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Hash => "hash",
            Section::TauG1 => "TauG1",
            Section::TauG2 => "TauG2",
            Section::AlphaG1 => "AlphaG1",
        })
    }
}

/// Chunk decoding failures. All of them are fatal for the chunk.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("truncated chunk: stream ended in {section}[{index}]")]
    Truncated { section: Section, index: usize },
    #[error("non-canonical field element in {section}[{index}]")]
    NonCanonical { section: Section, index: usize },
    #[error("unexpected trailing bytes after chunk payload")]
    TrailingBytes,
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// One decoded ceremony contribution slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk<C: Curve> {
    /// Integrity tag of the contribution file (opaque here).
    pub hash: [u8; HASH_LEN],
    /// `nb_tau_g1` G1 powers.
    pub tau_g1: Vec<G1<C>>,
    /// `nb_tau_g2` G2 powers; empty unless `is_first`.
    pub tau_g2: Vec<G2<C>>,
    /// `nb_alpha_g1` G1 points; empty unless `is_first`.
    pub alpha_g1: Vec<G1<C>>,
    /// Whether this chunk carries the anchor data (`tauG2`, `alphaG1`).
    pub is_first: bool,
}

impl<C: Curve> Chunk<C> {
    /// `tauG2[1]`, present on the anchor chunk only.
    #[inline]
    pub fn anchor_tau_g2(&self) -> Option<&G2<C>> {
        self.tau_g2.get(1)
    }
}

// ---------------------------------------------------------------------------
// Field element codec
// ---------------------------------------------------------------------------

fn decode_prime<F: PrimeField>(bytes: &[u8]) -> Option<F> {
    let mut repr = F::BigInt::default();
    let limbs = repr.as_mut();
    if bytes.len() > limbs.len() * 8 {
        return None;
    }
    for (i, b) in bytes.iter().enumerate() {
        limbs[i / 8] |= u64::from(*b) << (8 * (i % 8));
    }
    F::from_bigint(repr)
}

fn encode_prime<F: PrimeField>(f: &F, out: &mut Vec<u8>) {
    let bytes = f.into_bigint().to_bytes_le();
    out.extend_from_slice(&bytes[..prime_field_bytes::<F>()]);
}

struct FieldReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: Read> FieldReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, buf: Vec::new() }
    }

    fn fill(&mut self, len: usize, section: Section, index: usize) -> Result<(), DecodeError> {
        self.buf.resize(len, 0);
        self.inner.read_exact(&mut self.buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => DecodeError::Truncated { section, index },
            _ => DecodeError::Io(e),
        })
    }

    fn read_hash(&mut self) -> Result<[u8; HASH_LEN], DecodeError> {
        let mut hash = [0u8; HASH_LEN];
        self.fill(HASH_LEN, Section::Hash, 0)?;
        hash.copy_from_slice(&self.buf);
        Ok(hash)
    }

    fn read_field<F: Field>(&mut self, section: Section, index: usize) -> Result<F, DecodeError> {
        let width = prime_field_bytes::<F::BasePrimeField>();
        let degree = F::extension_degree() as usize;
        let mut elems = Vec::with_capacity(degree);
        for _ in 0..degree {
            self.fill(width, section, index)?;
            let e = decode_prime::<F::BasePrimeField>(&self.buf)
                .ok_or(DecodeError::NonCanonical { section, index })?;
            elems.push(e);
        }
        F::from_base_prime_field_elems(&elems).ok_or(DecodeError::NonCanonical { section, index })
    }

    fn read_point<P: SWCurveConfig>(
        &mut self,
        section: Section,
        index: usize,
    ) -> Result<Affine<P>, DecodeError> {
        let x = self.read_field::<P::BaseField>(section, index)?;
        let y = self.read_field::<P::BaseField>(section, index)?;
        if x.is_zero() && y.is_zero() {
            return Ok(Affine::<P>::zero());
        }
        Ok(Affine::new_unchecked(x, y))
    }

    fn read_points<P: SWCurveConfig>(
        &mut self,
        section: Section,
        count: usize,
    ) -> Result<Vec<Affine<P>>, DecodeError> {
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            out.push(self.read_point::<P>(section, i)?);
        }
        Ok(out)
    }

    fn expect_eof(&mut self) -> Result<(), DecodeError> {
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => return Ok(()),
                Ok(_) => return Err(DecodeError::TrailingBytes),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecodeError::Io(e)),
            }
        }
    }
}

fn encode_point<P: SWCurveConfig>(p: &Affine<P>, out: &mut Vec<u8>) {
    let (x, y) = if p.infinity {
        (P::BaseField::zero(), P::BaseField::zero())
    } else {
        (p.x, p.y)
    };
    for coord in [x, y] {
        for e in coord.to_base_prime_field_elements() {
            encode_prime(&e, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Streaming parser for contribution chunk files.
#[derive(Clone, Copy, Debug)]
pub struct ChunkDecoder<C: Curve> {
    layout: ChunkLayout,
    _curve: PhantomData<C>,
}

impl<C: Curve> ChunkDecoder<C> {
    /// Decoder for the given layout.
    pub fn new(layout: ChunkLayout) -> Result<Self, LayoutError> {
        layout.validate()?;
        Ok(Self { layout, _curve: PhantomData })
    }

    /// Layout this decoder expects.
    #[inline]
    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Decode the chunk stored at `path`.
    pub fn decode(&self, path: impl AsRef<Path>, is_first: bool) -> Result<Chunk<C>, DecodeError> {
        let f = File::open(path.as_ref())?;
        self.decode_from(BufReader::with_capacity(IO_BUFFER, f), is_first)
    }

    /// Decode a chunk from any byte stream; the stream must end with the chunk.
    pub fn decode_from<R: Read>(&self, reader: R, is_first: bool) -> Result<Chunk<C>, DecodeError> {
        let mut r = FieldReader::new(reader);
        let hash = r.read_hash()?;
        let tau_g1 = r.read_points::<C::G1>(Section::TauG1, self.layout.nb_tau_g1)?;

        let (tau_g2, alpha_g1) = if is_first {
            let tau_g2 = r.read_points::<C::G2>(Section::TauG2, self.layout.nb_tau_g2)?;
            let alpha_g1 = r.read_points::<C::G1>(Section::AlphaG1, self.layout.nb_alpha_g1)?;
            (tau_g2, alpha_g1)
        } else {
            (Vec::new(), Vec::new())
        };
        r.expect_eof()?;

        Ok(Chunk { hash, tau_g1, tau_g2, alpha_g1, is_first })
    }
}

/// Serialize a chunk in the contribution wire format.
pub fn encode_chunk<C: Curve>(chunk: &Chunk<C>) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        HASH_LEN
            + (chunk.tau_g1.len() + chunk.alpha_g1.len()) * point_bytes::<C::G1>()
            + chunk.tau_g2.len() * point_bytes::<C::G2>(),
    );
    out.extend_from_slice(&chunk.hash);
    for p in &chunk.tau_g1 {
        encode_point(p, &mut out);
    }
    if chunk.is_first {
        for p in &chunk.tau_g2 {
            encode_point(p, &mut out);
        }
        for p in &chunk.alpha_g1 {
            encode_point(p, &mut out);
        }
    }
    out
}

/// Write a chunk file at `path` (parent directories must exist).
pub fn write_chunk<C: Curve>(path: impl AsRef<Path>, chunk: &Chunk<C>) -> io::Result<()> {
    let mut w = BufWriter::with_capacity(IO_BUFFER, File::create(path.as_ref())?);
    w.write_all(&encode_chunk(chunk))?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Aleo, Ignition};
    use crate::synthetic::{SyntheticRound, TEST_LAYOUT};
    use ark_bls12_377::Fq;
    use rand::{rngs::StdRng, SeedableRng};

    fn fe() -> usize {
        prime_field_bytes::<Fq>()
    }

    #[test]
    fn widths_match_the_ceremony_encoding() {
        assert_eq!(fe(), 48);
        assert_eq!(prime_field_bytes::<ark_bn254::Fq>(), 32);
        assert_eq!(point_bytes::<<Aleo as Curve>::G2>(), 4 * 48);
        let l = TEST_LAYOUT;
        assert_eq!(
            l.expected_len::<Aleo>(true),
            (64 + l.nb_tau_g1 * 2 * 48 + l.nb_tau_g2 * 4 * 48 + l.nb_alpha_g1 * 2 * 48) as u64
        );
    }

    #[test]
    fn all_zero_file_of_exact_length_decodes() {
        let dec = ChunkDecoder::<Aleo>::new(TEST_LAYOUT).unwrap();
        let bytes = vec![0u8; TEST_LAYOUT.expected_len::<Aleo>(false) as usize];
        let chunk = dec.decode_from(bytes.as_slice(), false).unwrap();
        assert_eq!(chunk.tau_g1.len(), TEST_LAYOUT.nb_tau_g1);
        assert!(chunk.tau_g2.is_empty() && chunk.alpha_g1.is_empty());
        assert!(chunk.tau_g1.iter().all(|p| p.is_zero()));
    }

    #[test]
    fn short_file_is_truncated() {
        let dec = ChunkDecoder::<Aleo>::new(TEST_LAYOUT).unwrap();
        let len = TEST_LAYOUT.expected_len::<Aleo>(false) as usize;
        let bytes = vec![0u8; len - 1];
        let err = dec.decode_from(bytes.as_slice(), false).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated { section: Section::TauG1, index } if index == TEST_LAYOUT.nb_tau_g1 - 1
        ));

        let err = dec.decode_from(&bytes[..10], false).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { section: Section::Hash, .. }));
    }

    #[test]
    fn first_chunk_length_is_exact() {
        let mut rng = StdRng::from_seed([7u8; 32]);
        let round = SyntheticRound::<Aleo>::sample(TEST_LAYOUT, 1, &mut rng);
        let bytes = encode_chunk(&round.chunk(0));
        assert_eq!(bytes.len() as u64, TEST_LAYOUT.expected_len::<Aleo>(true));

        let dec = ChunkDecoder::<Aleo>::new(TEST_LAYOUT).unwrap();
        let decoded = dec.decode_from(bytes.as_slice(), true).unwrap();
        assert_eq!(decoded, round.chunk(0));

        let err = dec.decode_from(&bytes[..bytes.len() - 1], true).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { section: Section::AlphaG1, .. }));

        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            dec.decode_from(longer.as_slice(), true).unwrap_err(),
            DecodeError::TrailingBytes
        ));

        // A first chunk read as a regular one leaves the anchor data behind.
        assert!(matches!(
            dec.decode_from(bytes.as_slice(), false).unwrap_err(),
            DecodeError::TrailingBytes
        ));
    }

    #[test]
    fn non_canonical_element_is_rejected() {
        let dec = ChunkDecoder::<Ignition>::new(TEST_LAYOUT).unwrap();
        let mut bytes = vec![0u8; TEST_LAYOUT.expected_len::<Ignition>(false) as usize];
        // Y coordinate of tauG1[2] set to 2^256 - 1 > p.
        let width = prime_field_bytes::<ark_bn254::Fq>();
        let start = HASH_LEN + 2 * 2 * width + width;
        bytes[start..start + width].fill(0xff);
        let err = dec.decode_from(bytes.as_slice(), false).unwrap_err();
        assert!(matches!(err, DecodeError::NonCanonical { section: Section::TauG1, index: 2 }));
    }

    #[test]
    fn decode_from_file_matches_stream() {
        let mut rng = StdRng::from_seed([3u8; 32]);
        let round = SyntheticRound::<Aleo>::sample(TEST_LAYOUT, 2, &mut rng);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contribution_0.verified");
        write_chunk(&path, &round.chunk(1)).unwrap();

        let dec = ChunkDecoder::<Aleo>::new(TEST_LAYOUT).unwrap();
        assert_eq!(dec.decode(&path, false).unwrap(), round.chunk(1));
    }

    #[test]
    fn degenerate_layout_is_rejected() {
        let bad = ChunkLayout { nb_tau_g1: 1, ..TEST_LAYOUT };
        assert!(matches!(
            ChunkDecoder::<Aleo>::new(bad).unwrap_err(),
            LayoutError::TooFewTauG1(1)
        ));

        let no_alpha = ChunkLayout { nb_alpha_g1: 0, ..TEST_LAYOUT };
        assert!(matches!(
            ChunkDecoder::<Aleo>::new(no_alpha).unwrap_err(),
            LayoutError::TooFewAlphaG1(0)
        ));
    }
}
