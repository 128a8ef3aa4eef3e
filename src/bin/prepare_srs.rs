//! Split a full SRS into power-of-two sized KZG parameter files.
//!
//! For every `size = 2^k` with `min-log <= k <= max-log` and `size <= len`,
//! writes `kzg_srs_canonical_<size>_<curve>_<ceremony>` (monomial basis) and
//! `kzg_srs_lagrange_<size>_<curve>_<ceremony>` (Lagrange basis over the
//! size-`size` subgroup).
//!
//! ```text
//! prepare_srs --srs FULL.srs [--curve bls12377|bn254] [--ceremony NAME] [--out-dir DIR]
//!             [--min-log 8] [--max-log 27] [--trusted] [--threads N]
//! ```

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use std::{env, fs};
use tracing::{info, warn};

use ptau_verifier::config::{init_thread_pool, CurveKind, PrepareConfig};
use ptau_verifier::{Aleo, Curve, Ignition, Srs};

fn run<C: Curve>(cfg: &PrepareConfig) -> Result<()> {
    let srs = if cfg.trusted {
        warn!("loading {} without point validation", cfg.input.display());
        Srs::<C>::read_file_unchecked(&cfg.input)
    } else {
        Srs::<C>::read_file(&cfg.input)
    }
    .with_context(|| format!("reading SRS from {}", cfg.input.display()))?;
    info!(len = srs.len(), digest = %srs.digest_hex()?, "loaded SRS");

    let sizes = cfg.sizes(srs.len());
    if sizes.is_empty() {
        return Err(anyhow!(
            "SRS of {} powers is smaller than the smallest output size 2^{}",
            srs.len(),
            cfg.min_log
        ));
    }

    fs::create_dir_all(&cfg.out_dir)
        .with_context(|| format!("creating {}", cfg.out_dir.display()))?;

    for size in sizes {
        let canonical = srs.truncated(size)?;
        let path = cfg.out_dir.join(cfg.file_name("canonical", size));
        canonical
            .write_file(&path)
            .with_context(|| format!("writing {}", path.display()))?;

        let lagrange = canonical.to_lagrange()?;
        let path = cfg.out_dir.join(cfg.file_name("lagrange", size));
        lagrange
            .write_file(&path)
            .with_context(|| format!("writing {}", path.display()))?;

        info!(size, "wrote canonical and lagrange SRS");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "ptau_verifier=info,prepare_srs=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let cfg = PrepareConfig::from_args(&args)?;
    init_thread_pool(cfg.threads)?;

    match cfg.curve {
        CurveKind::Bls12_377 => run::<Aleo>(&cfg),
        CurveKind::Bn254 => run::<Ignition>(&cfg),
    }
}
