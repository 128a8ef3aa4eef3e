//! Generate a development ceremony transcript (NOT FOR PRODUCTION)
//!
//! Writes `--rounds` consecutive synthetic rounds under `--out` in the
//! `round_<r>/chunk_<i>/contribution_0.verified` layout. Every secret derives
//! from `--seed`, so anyone can forge against an SRS built from them.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use ark_ff::UniformRand;
use rand::{rngs::StdRng, SeedableRng};
use std::{env, path::PathBuf, str::FromStr};
use tracing::{info, warn};

use ptau_verifier::config::{parse_flag, CurveKind};
use ptau_verifier::curve::Scalar;
use ptau_verifier::synthetic::{SyntheticRound, TEST_LAYOUT};
use ptau_verifier::{Aleo, ChunkLayout, Curve, Ignition, RoundDir};

struct DevArgs {
    out: PathBuf,
    curve: CurveKind,
    rounds: u64,
    chunks: usize,
    layout: ChunkLayout,
    seed: u64,
}

fn flag_or<T>(args: &[String], key: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match parse_flag(args, key)? {
        Some(raw) => raw.parse().map_err(|e| anyhow!("invalid {key} {raw:?}: {e}")),
        None => Ok(default),
    }
}

impl DevArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let layout = ChunkLayout {
            nb_tau_g1: flag_or(args, "--nb-tau-g1", TEST_LAYOUT.nb_tau_g1)?,
            nb_tau_g2: flag_or(args, "--nb-tau-g2", TEST_LAYOUT.nb_tau_g2)?,
            nb_alpha_g1: flag_or(args, "--nb-alpha-g1", TEST_LAYOUT.nb_alpha_g1)?,
        };
        layout.validate()?;
        let rounds = flag_or(args, "--rounds", 2u64)?;
        if rounds < 2 {
            return Err(anyhow!("--rounds must be at least 2 to have something to verify"));
        }
        Ok(Self {
            out: flag_or(args, "--out", PathBuf::from("dev-ceremony"))?,
            curve: flag_or(args, "--curve", CurveKind::Bls12_377)?,
            rounds,
            chunks: flag_or(args, "--chunks", 4usize)?.max(1),
            layout,
            seed: flag_or(args, "--seed", 42u64)?,
        })
    }
}

fn run<C: Curve>(a: &DevArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(a.seed);
    let mut round = SyntheticRound::<C>::sample(a.layout, a.chunks, &mut rng);

    for r in 0..a.rounds {
        if r > 0 {
            round = round.next_round(Scalar::<C>::rand(&mut rng));
        }
        let dir = RoundDir::new(&a.out, r);
        round
            .write_round(&dir)
            .with_context(|| format!("writing {}", dir.dir().display()))?;
        info!(round = r, chunks = a.chunks, "wrote {}", dir.dir().display());
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "generate_dev_ceremony=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let a = DevArgs::parse(&args)?;

    warn!("generating a DEVELOPMENT ceremony (seed={}, every secret is PUBLIC)", a.seed);
    warn!("never use these rounds or any SRS derived from them in production");

    match a.curve {
        CurveKind::Bls12_377 => run::<Aleo>(&a),
        CurveKind::Bn254 => run::<Ignition>(&a),
    }?;

    info!(
        "verify with: verify_ceremony --rounds-dir {} --curve {} --round {} --nb-tau-g1 {} --nb-tau-g2 {} --nb-alpha-g1 {}",
        a.out.display(),
        a.curve,
        a.rounds - 1,
        a.layout.nb_tau_g1,
        a.layout.nb_tau_g2,
        a.layout.nb_alpha_g1
    );
    Ok(())
}
