//! Verify one round of a powers-of-tau ceremony against the previous round.
//!
//! ```text
//! verify_ceremony --round 139 [--previous 138] [--rounds-dir DIR] [--curve bls12377|bn254]
//!                 [--chunks N] [--challenge fresh|shared] [--no-subgroup-checks]
//!                 [--srs OUT.srs] [--report OUT.json] [--threads N]
//! ```
//!
//! Exit status is non-zero on the first failing check.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use std::env;
use tracing::info;

use ptau_verifier::ceremony::{count_chunks, rounds_present, CeremonyVerifier};
use ptau_verifier::config::{init_thread_pool, CurveKind, VerifierConfig};
use ptau_verifier::{Aleo, Curve, Ignition, ParallelExecutor};

fn run<C: Curve>(cfg: &VerifierConfig) -> Result<()> {
    let current = cfg.current();
    let previous = cfg.previous();
    if !rounds_present(&current, &previous) {
        return Err(anyhow!(
            "round directories {} and {} must both exist",
            current.dir().display(),
            previous.dir().display()
        ));
    }

    let nb_chunks = match cfg.nb_chunks {
        Some(n) => n,
        None => match count_chunks(&current) {
            0 => return Err(anyhow!("no chunk files under {}", current.dir().display())),
            n => n,
        },
    };

    let verifier = CeremonyVerifier::<C>::new(
        cfg.layout,
        C::default_generators(),
        ParallelExecutor::default(),
        cfg.options,
    )?;
    let outcome = verifier
        .verify_rounds(&current, &previous, nb_chunks)
        .with_context(|| format!("round {} does not extend round {}", cfg.current_round, cfg.previous_round))?;

    info!(
        chunks = outcome.chunks_verified,
        "round {} correctly extends round {}", cfg.current_round, cfg.previous_round
    );

    if let (Some(srs), Some(path)) = (&outcome.srs, &cfg.srs_out) {
        srs.write_file(path)
            .with_context(|| format!("writing SRS to {}", path.display()))?;
        let digest = srs.digest_hex()?;
        info!(len = srs.len(), %digest, "wrote SRS to {}", path.display());
    }

    match &cfg.report_out {
        Some(path) => {
            outcome
                .report
                .write_json(path)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!("wrote report to {}", path.display());
        }
        None => println!("{}", outcome.report.to_json()?),
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "ptau_verifier=info,verify_ceremony=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let cfg = VerifierConfig::from_args(&args)?;
    init_thread_pool(cfg.threads)?;

    info!(
        curve = %cfg.curve,
        rounds_dir = %cfg.rounds_dir.display(),
        policy = %cfg.challenge(),
        "verifying round {} against round {}",
        cfg.current_round,
        cfg.previous_round
    );

    match cfg.curve {
        CurveKind::Bls12_377 => run::<Aleo>(&cfg),
        CurveKind::Bn254 => run::<Ignition>(&cfg),
    }
}
