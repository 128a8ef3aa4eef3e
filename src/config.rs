//! Command-line and environment configuration for the binaries.
//!
//! Flags are parsed by hand (`--flag value` or `--flag=value`); a few settings
//! fall back to environment variables:
//!
//! - `PTAU_ROUNDS_DIR`: root holding the `round_<r>/` directories;
//! - `PTAU_THREADS`: size of the global rayon pool.

#![forbid(unsafe_code)]

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ceremony::{CeremonyOptions, RoundDir};
use crate::chunk::ChunkLayout;
use crate::curve::{Aleo, Curve, Ignition};
use crate::kzg::SELF_CHECK_SIZE;
use crate::ratio::ChallengePolicy;

pub const ENV_ROUNDS_DIR: &str = "PTAU_ROUNDS_DIR";
pub const ENV_THREADS: &str = "PTAU_THREADS";

/// Smallest and largest `log2(size)` written by `prepare_srs`.
pub const PREPARE_MIN_LOG: u32 = 8;
pub const PREPARE_MAX_LOG: u32 = 27;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required flag {0}")]
    Missing(&'static str),
    #[error("flag {flag} expects a value")]
    NoValue { flag: &'static str },
    #[error("invalid value {value:?} for {flag}: {reason}")]
    Invalid {
        flag: &'static str,
        value: String,
        reason: String,
    },
    #[error("failed to build the rayon thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Curves the binaries can dispatch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurveKind {
    Bls12_377,
    Bn254,
}

impl CurveKind {
    pub fn name(self) -> &'static str {
        match self {
            CurveKind::Bls12_377 => Aleo::NAME,
            CurveKind::Bn254 => Ignition::NAME,
        }
    }
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CurveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "bls12377" | "aleo" => Ok(CurveKind::Bls12_377),
            "bn254" | "bn256" | "ignition" => Ok(CurveKind::Bn254),
            other => Err(format!("unknown curve {other:?} (expected bls12377 or bn254)")),
        }
    }
}

/// Value following `key`, either as the next argument or after `key=`.
///
/// `Ok(None)` when the flag is absent; a trailing flag with no value is an
/// error.
pub fn parse_flag<'a>(args: &'a [String], key: &'static str) -> Result<Option<&'a str>, ConfigError> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it
                .next()
                .map(|v| Some(v.as_str()))
                .ok_or(ConfigError::NoValue { flag: key });
        }
        if let Some(v) = a.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')) {
            return Ok(Some(v));
        }
    }
    Ok(None)
}

/// Whether a boolean switch is present.
pub fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn parse_value<T>(flag: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        flag,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parsed<T>(args: &[String], flag: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse_flag(args, flag)?.map(|raw| parse_value(flag, raw)).transpose()
}

fn threads<E>(args: &[String], env: &E) -> Result<Option<usize>, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let threads = match parsed::<usize>(args, "--threads")? {
        Some(n) => Some(n),
        None => env(ENV_THREADS)
            .map(|raw| parse_value::<usize>(ENV_THREADS, &raw))
            .transpose()?,
    };
    match threads {
        Some(0) => Err(ConfigError::Invalid {
            flag: "--threads",
            value: "0".into(),
            reason: "must be positive".into(),
        }),
        t => Ok(t),
    }
}

fn layout(args: &[String]) -> Result<ChunkLayout, ConfigError> {
    let base = ChunkLayout::ALEO;
    let layout = ChunkLayout {
        nb_tau_g1: parsed(args, "--nb-tau-g1")?.unwrap_or(base.nb_tau_g1),
        nb_tau_g2: parsed(args, "--nb-tau-g2")?.unwrap_or(base.nb_tau_g2),
        nb_alpha_g1: parsed(args, "--nb-alpha-g1")?.unwrap_or(base.nb_alpha_g1),
    };
    layout.validate().map_err(|e| ConfigError::Invalid {
        flag: "--nb-tau-g1/--nb-tau-g2/--nb-alpha-g1",
        value: format!("{}/{}/{}", layout.nb_tau_g1, layout.nb_tau_g2, layout.nb_alpha_g1),
        reason: e.to_string(),
    })?;
    Ok(layout)
}

/// Size the global rayon pool; `None` keeps rayon's default.
pub fn init_thread_pool(threads: Option<usize>) -> Result<(), ConfigError> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new().num_threads(n).build_global()?;
    }
    Ok(())
}

/// Settings of `verify_ceremony`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierConfig {
    pub rounds_dir: PathBuf,
    pub curve: CurveKind,
    pub current_round: u64,
    pub previous_round: u64,
    /// `None`: count the chunk files of the current round.
    pub nb_chunks: Option<usize>,
    pub layout: ChunkLayout,
    pub threads: Option<usize>,
    pub options: CeremonyOptions,
    pub srs_out: Option<PathBuf>,
    pub report_out: Option<PathBuf>,
}

impl VerifierConfig {
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        Self::from_args_with(args, |k| std::env::var(k).ok())
    }

    /// As [`from_args`](Self::from_args) with an explicit environment lookup.
    pub fn from_args_with<E>(args: &[String], env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let rounds_dir = parse_flag(args, "--rounds-dir")?
            .map(PathBuf::from)
            .or_else(|| env(ENV_ROUNDS_DIR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let current_round: u64 = parsed(args, "--round")?.ok_or(ConfigError::Missing("--round"))?;
        let previous_round = match parsed::<u64>(args, "--previous")? {
            Some(p) => p,
            None => current_round.checked_sub(1).ok_or(ConfigError::Invalid {
                flag: "--round",
                value: current_round.to_string(),
                reason: "round 0 has no predecessor; pass --previous".into(),
            })?,
        };

        let nb_chunks = parsed::<usize>(args, "--chunks")?;
        if nb_chunks == Some(0) {
            return Err(ConfigError::Invalid {
                flag: "--chunks",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let srs_out = parse_flag(args, "--srs")?.map(PathBuf::from);
        let options = CeremonyOptions {
            subgroup_checks: !has_flag(args, "--no-subgroup-checks"),
            build_srs: srs_out.is_some() || has_flag(args, "--build-srs"),
            challenge: parsed(args, "--challenge")?.unwrap_or_default(),
            self_check_size: parsed(args, "--self-check-size")?.unwrap_or(SELF_CHECK_SIZE),
        };

        Ok(Self {
            rounds_dir,
            curve: parsed(args, "--curve")?.unwrap_or(CurveKind::Bls12_377),
            current_round,
            previous_round,
            nb_chunks,
            layout: layout(args)?,
            threads: threads(args, &env)?,
            options,
            srs_out,
            report_out: parse_flag(args, "--report")?.map(PathBuf::from),
        })
    }

    pub fn current(&self) -> RoundDir {
        RoundDir::new(&self.rounds_dir, self.current_round)
    }

    pub fn previous(&self) -> RoundDir {
        RoundDir::new(&self.rounds_dir, self.previous_round)
    }

    pub fn challenge(&self) -> ChallengePolicy {
        self.options.challenge
    }
}

/// Settings of `prepare_srs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrepareConfig {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub curve: CurveKind,
    /// Ceremony tag used in output file names.
    pub ceremony: String,
    pub min_log: u32,
    pub max_log: u32,
    /// Skip point validation when loading `input`.
    pub trusted: bool,
    pub threads: Option<usize>,
}

impl PrepareConfig {
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        Self::from_args_with(args, |k| std::env::var(k).ok())
    }

    pub fn from_args_with<E>(args: &[String], env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let input = parse_flag(args, "--srs")?
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("--srs"))?;
        let min_log = parsed(args, "--min-log")?.unwrap_or(PREPARE_MIN_LOG);
        let max_log = parsed(args, "--max-log")?.unwrap_or(PREPARE_MAX_LOG);
        if min_log > max_log || max_log > 63 {
            return Err(ConfigError::Invalid {
                flag: "--min-log/--max-log",
                value: format!("{min_log}/{max_log}"),
                reason: "need min-log <= max-log <= 63".into(),
            });
        }
        let curve = parsed(args, "--curve")?.unwrap_or(CurveKind::Bls12_377);

        Ok(Self {
            input,
            out_dir: parse_flag(args, "--out-dir")?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            ceremony: parse_flag(args, "--ceremony")?
                .map(str::to_string)
                .unwrap_or_else(|| default_ceremony(curve).to_string()),
            curve,
            min_log,
            max_log,
            trusted: has_flag(args, "--trusted"),
            threads: threads(args, &env)?,
        })
    }

    /// Powers of two to emit for an SRS of `len` powers, ascending.
    pub fn sizes(&self, len: usize) -> Vec<usize> {
        (self.min_log..=self.max_log)
            .map(|log| 1usize << log)
            .take_while(|size| *size <= len)
            .collect()
    }

    /// `kzg_srs_{canonical|lagrange}_<size>_<curve>_<ceremony>`
    pub fn file_name(&self, basis: &str, size: usize) -> String {
        format!("kzg_srs_{basis}_{size}_{}_{}", self.curve, self.ceremony)
    }
}

fn default_ceremony(curve: CurveKind) -> &'static str {
    match curve {
        CurveKind::Bls12_377 => "aleo",
        CurveKind::Bn254 => "aztec_ignition",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        std::iter::once("bin")
            .chain(s.split_whitespace())
            .map(String::from)
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn flags_accept_both_spellings() {
        let a = args("--round 7 --curve=bn254");
        assert_eq!(parse_flag(&a, "--round").unwrap(), Some("7"));
        assert_eq!(parse_flag(&a, "--curve").unwrap(), Some("bn254"));
        assert_eq!(parse_flag(&a, "--srs").unwrap(), None);
        assert!(matches!(
            parse_flag(&args("--round"), "--round"),
            Err(ConfigError::NoValue { flag: "--round" })
        ));
    }

    #[test]
    fn verifier_defaults() {
        let cfg = VerifierConfig::from_args_with(&args("--round 139"), no_env).unwrap();
        assert_eq!((cfg.current_round, cfg.previous_round), (139, 138));
        assert_eq!(cfg.curve, CurveKind::Bls12_377);
        assert_eq!(cfg.layout, ChunkLayout::ALEO);
        assert_eq!(cfg.rounds_dir, PathBuf::from("."));
        assert_eq!(cfg.options, CeremonyOptions::default());
        assert_eq!(cfg.nb_chunks, None);
        assert_eq!(cfg.current().chunk_path(0), PathBuf::from("./round_139/chunk_0/contribution_0.verified"));
    }

    #[test]
    fn verifier_flags_and_env_fallbacks() {
        let a = args(
            "--round 5 --previous 3 --chunks 2 --challenge shared --srs out.srs \
             --no-subgroup-checks --nb-tau-g1 16 --nb-tau-g2 4 --nb-alpha-g1 3",
        );
        let env = |k: &str| match k {
            ENV_ROUNDS_DIR => Some("/data".to_string()),
            ENV_THREADS => Some("6".to_string()),
            _ => None,
        };
        let cfg = VerifierConfig::from_args_with(&a, env).unwrap();
        assert_eq!(cfg.rounds_dir, PathBuf::from("/data"));
        assert_eq!(cfg.threads, Some(6));
        assert_eq!(cfg.previous_round, 3);
        assert_eq!(cfg.nb_chunks, Some(2));
        assert_eq!(cfg.challenge(), ChallengePolicy::SharedPerRun);
        assert!(cfg.options.build_srs);
        assert!(!cfg.options.subgroup_checks);
        assert_eq!(cfg.layout, ChunkLayout { nb_tau_g1: 16, nb_tau_g2: 4, nb_alpha_g1: 3 });

        // Flags win over the environment.
        let cfg = VerifierConfig::from_args_with(&args("--round 5 --threads 2 --rounds-dir r"), env).unwrap();
        assert_eq!(cfg.threads, Some(2));
        assert_eq!(cfg.rounds_dir, PathBuf::from("r"));
    }

    #[test]
    fn verifier_rejects_malformed_values() {
        let bad = |s: &str| VerifierConfig::from_args_with(&args(s), no_env).unwrap_err();
        assert!(matches!(bad(""), ConfigError::Missing("--round")));
        assert!(matches!(bad("--round 0"), ConfigError::Invalid { flag: "--round", .. }));
        assert!(matches!(bad("--round x"), ConfigError::Invalid { flag: "--round", .. }));
        assert!(matches!(bad("--round 2 --curve ed25519"), ConfigError::Invalid { flag: "--curve", .. }));
        assert!(matches!(bad("--round 2 --challenge sometimes"), ConfigError::Invalid { flag: "--challenge", .. }));
        assert!(matches!(bad("--round 2 --threads 0"), ConfigError::Invalid { .. }));
        assert!(matches!(bad("--round 2 --chunks 0"), ConfigError::Invalid { flag: "--chunks", .. }));
        assert!(matches!(bad("--round 2 --nb-tau-g2 1"), ConfigError::Invalid { .. }));
        assert!(matches!(bad("--round 2 --nb-alpha-g1 0"), ConfigError::Invalid { .. }));

        let env = |_: &str| Some("many".to_string());
        assert!(matches!(
            VerifierConfig::from_args_with(&args("--round 2"), env),
            Err(ConfigError::Invalid { flag: ENV_THREADS, .. })
        ));
    }

    #[test]
    fn prepare_sizes_and_names() {
        let cfg = PrepareConfig::from_args_with(&args("--srs in.srs --curve bn254"), no_env).unwrap();
        assert_eq!(cfg.ceremony, "aztec_ignition");
        assert_eq!(cfg.sizes(1000), vec![256, 512]);
        assert_eq!(cfg.sizes(255), Vec::<usize>::new());
        assert_eq!(cfg.sizes(1 << 30).last(), Some(&(1 << 27)));
        assert_eq!(cfg.file_name("lagrange", 512), "kzg_srs_lagrange_512_bn254_aztec_ignition");

        assert!(matches!(
            PrepareConfig::from_args_with(&args("--curve bn254"), no_env),
            Err(ConfigError::Missing("--srs"))
        ));
        assert!(matches!(
            PrepareConfig::from_args_with(&args("--srs a --min-log 9 --max-log 8"), no_env),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn curve_names() {
        assert_eq!("BLS12-377".parse::<CurveKind>().unwrap(), CurveKind::Bls12_377);
        assert_eq!("ignition".parse::<CurveKind>().unwrap(), CurveKind::Bn254);
        assert_eq!(CurveKind::Bn254.to_string(), "bn254");
    }
}
