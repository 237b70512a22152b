use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use hex::encode as hex_encode;
use log::{LevelFilter, debug, info, warn};
use rlwe_kex_core::{
    ExchangeTranscript, KeyStream, KexPreset, ParameterSet, Role, StructuralRange, channel_pair,
    derive_rng, kex_preset, open, run_exchange, run_initiator, run_responder, seal,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

const SEAL_CONTEXT: &[u8] = b"rlwe-kex-demo::seal";
const CONFIRM_CONTEXT: &[u8] = b"rlwe-kex-demo::confirm";

#[derive(Parser)]
#[command(
    name = "rlwe-kex",
    author,
    version,
    about = "Ring-LWE key exchange demo (experimental, not for production use)"
)]
struct Cli {
    #[arg(long, global = true)]
    debug: bool,
    #[arg(long, global = true, value_enum, default_value = "reference")]
    preset: PresetArg,
    #[arg(long, global = true)]
    modulus: Option<i64>,
    #[arg(long, global = true)]
    degree: Option<usize>,
    #[arg(long, global = true)]
    bound: Option<i64>,
    /// Sample the structural polynomial from [0, q) instead of [0, q].
    #[arg(long, global = true)]
    half_open_structural: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PresetArg {
    Compact,
    Reference,
    Wide,
}

impl From<PresetArg> for ParameterSet {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Compact => ParameterSet::Compact,
            PresetArg::Reference => ParameterSet::Reference,
            PresetArg::Wide => ParameterSet::Wide,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one in-process exchange and print both key streams.
    Exchange {
        #[arg(long, default_value = "rlwe-kex-demo-seed")]
        seed: String,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Repeat independent exchanges and report the agreement rate.
    Trials {
        #[arg(long, default_value_t = 1000)]
        count: u64,
        #[arg(long, default_value = "rlwe-kex-demo-seed")]
        seed: String,
    },
    /// Run each party on its own thread over an in-memory channel.
    Threaded {
        #[arg(long, default_value = "rlwe-kex-demo-seed")]
        seed: String,
    },
    /// Exchange, derive a symmetric key, then seal and open a message.
    Seal {
        #[arg(long, default_value = "rlwe-kex-demo-seed")]
        seed: String,
        #[arg(long, value_name = "TEXT")]
        message: String,
    },
    /// Summarize a transcript written by `exchange --out`.
    Inspect {
        #[arg(long, value_name = "FILE")]
        transcript: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let preset = resolve_preset(&cli)?;
    debug!(
        "preset {:?} q={} n={} b={} structural={:?}",
        preset.set,
        preset.params.modulus,
        preset.params.degree,
        preset.params.bound,
        preset.structural_range
    );
    match cli.command {
        Commands::Exchange { seed, out } => cmd_exchange(&preset, &seed, out.as_deref()),
        Commands::Trials { count, seed } => cmd_trials(&preset, count, &seed),
        Commands::Threaded { seed } => cmd_threaded(&preset, &seed),
        Commands::Seal { seed, message } => cmd_seal(&preset, &seed, &message),
        Commands::Inspect { transcript } => cmd_inspect(&transcript),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default));
    builder.format_timestamp(None);
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}

fn resolve_preset(cli: &Cli) -> Result<KexPreset> {
    let mut preset = kex_preset(cli.preset.into())
        .with_overrides(cli.modulus, cli.degree, cli.bound)
        .context("validating ring parameters")?;
    if cli.half_open_structural {
        preset = preset.with_structural_range(StructuralRange::HalfOpen);
    }
    Ok(preset)
}

fn cmd_exchange(preset: &KexPreset, seed: &str, out: Option<&Path>) -> Result<()> {
    let mut rng = derive_rng(seed.as_bytes());
    let outcome = run_exchange(&preset.sampler(), &mut rng)?;
    println!("alice: {}", render_bits(outcome.alice.key_stream()));
    println!("bob:   {}", render_bits(outcome.bob.key_stream()));
    if outcome.agreed() {
        println!("keys agree ({} bits)", outcome.alice.key_stream().len());
    } else {
        println!("keys differ in {} bits", outcome.mismatched_bits());
    }
    if let Some(path) = out {
        save_json(path, "transcript", &outcome.transcript())?;
        info!("transcript written to {}", path.display());
    }
    Ok(())
}

fn cmd_trials(preset: &KexPreset, count: u64, seed: &str) -> Result<()> {
    if count == 0 {
        bail!("trial count must be positive");
    }
    let mut rng = derive_rng(seed.as_bytes());
    let report = rlwe_kex_core::agreement_trials(&preset.sampler(), count, &mut rng)?;
    println!(
        "{} / {} exchanges agreed ({:.2}%), {} mismatched bits in failures",
        report.agreements,
        report.trials,
        report.agreement_rate() * 100.0,
        report.mismatched_bits
    );
    Ok(())
}

fn cmd_threaded(preset: &KexPreset, seed: &str) -> Result<()> {
    let (mut initiator_end, mut responder_end) = channel_pair();
    let sampler = preset.sampler();
    let responder_seed = format!("{seed}/responder");
    let responder = thread::spawn(move || {
        let mut rng = derive_rng(responder_seed.as_bytes());
        run_responder(&sampler, &mut rng, &mut responder_end, CONFIRM_CONTEXT)
    });
    let mut rng = derive_rng(format!("{seed}/initiator").as_bytes());
    let initiator = run_initiator(&sampler, &mut rng, &mut initiator_end, CONFIRM_CONTEXT)
        .context("running initiator")?;
    let responder = responder
        .join()
        .map_err(|_| anyhow!("responder thread panicked"))?
        .context("running responder")?;
    for outcome in [&initiator, &responder] {
        let label = match outcome.role {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        };
        println!(
            "{label}: {} confirmed={}",
            render_bits(&outcome.key_stream),
            outcome.confirmed
        );
    }
    if !initiator.confirmed {
        warn!("threaded exchange ended without agreement");
    }
    Ok(())
}

fn cmd_seal(preset: &KexPreset, seed: &str, message: &str) -> Result<()> {
    let mut rng = derive_rng(seed.as_bytes());
    let outcome = run_exchange(&preset.sampler(), &mut rng)?;
    if !outcome.agreed() {
        bail!(
            "reconciliation failed: key streams differ in {} bits",
            outcome.mismatched_bits()
        );
    }
    let alice_key = outcome.alice.key_stream();
    println!("derived key: {}", hex_encode(*alice_key.derive_key(SEAL_CONTEXT)));
    let sealed = seal(alice_key, SEAL_CONTEXT, 0, message.as_bytes(), b"rlwe-kex-demo")?;
    println!("sealed: {}", serde_json::to_string(&sealed)?);
    let opened = open(outcome.bob.key_stream(), SEAL_CONTEXT, &sealed)
        .context("opening sealed message with responder key")?;
    println!("opened: {}", String::from_utf8_lossy(&opened));
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let transcript = load_transcript(path)?;
    let params = transcript.params;
    println!(
        "q={} n={} b={} version={}",
        params.modulus, params.degree, params.bound, transcript.version
    );
    for (label, key) in [("alice", &transcript.alice_key), ("bob", &transcript.bob_key)] {
        if key.len() != params.degree {
            bail!(
                "{label} key stream has {} bits, ring degree is {}",
                key.len(),
                params.degree
            );
        }
    }
    let differing = transcript.alice_key.hamming_distance(&transcript.bob_key);
    if transcript.agreed != (differing == 0) {
        bail!(
            "transcript claims agreed={} but key streams differ in {} bits",
            transcript.agreed,
            differing
        );
    }
    println!("alice: {}", render_bits(&transcript.alice_key));
    println!("bob:   {}", render_bits(&transcript.bob_key));
    println!("agreed={}", transcript.agreed);
    Ok(())
}

fn render_bits(stream: &KeyStream) -> String {
    stream
        .bits()
        .iter()
        .map(|&bit| if bit == 0 { '0' } else { '1' })
        .collect()
}

fn load_json<T: DeserializeOwned>(path: &Path, label: &str) -> Result<T> {
    let data =
        fs::read(path).with_context(|| format!("reading {} from {}", label, path.display()))?;
    let value = serde_json::from_slice(&data)
        .with_context(|| format!("parsing {} from {}", label, path.display()))?;
    Ok(value)
}

fn save_json<T: ?Sized + serde::Serialize>(path: &Path, label: &str, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)
        .with_context(|| format!("writing {} to {}", label, path.display()))?;
    Ok(())
}

fn load_transcript(path: &Path) -> Result<ExchangeTranscript> {
    load_json(path, "transcript")
}
