//! sie-verify - command-line verifier for signed instruction envelopes.
//!
//! ## Usage
//!
//! ```bash
//! # Verify an envelope against the local keyring and the registry
//! sie-verify verify --file skills/SKILL.md.sie.json --check-file skills/SKILL.md
//!
//! # Decide whether a skill may be loaded
//! sie-verify evaluate --skill skills/SKILL.md --mode strict --json
//!
//! # Fetch a fresh registry snapshot into the cache
//! sie-verify refresh-registry --registry-url https://example.org/sie
//!
//! # Sign an envelope, binding it to the skill file
//! sie-verify sign --file SKILL.md.sie.json --seed-file issuer.seed --bind-file SKILL.md
//! ```
//!
//! Exit status is 0 on success or allow, 2 on verification failure or
//! reject, 1 on usage and I/O errors.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sie_crypto::{b64_decode, sha256_hex, Ed25519Signer};
use sie_verify_core::config::{DEFAULT_CACHE_DIR, DEFAULT_REGISTRY_DIR};
use sie_verify_core::{
    codec, enforce_skill_with_config, EnforcementDecision, EnforcementMode, Envelope,
    EnvelopeVerifier, RegistryClient, RegistryConfig, SieConfig, DEFAULT_ENVELOPE_SUFFIX,
    DEFAULT_KEYRING_FILE,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line verifier for signed instruction envelopes.
#[derive(Parser)]
#[command(name = "sie-verify")]
#[command(version = VERSION)]
#[command(about = "Verify and enforce signed instruction envelopes")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a single envelope file
    Verify {
        /// Path to the .sie.json envelope
        #[arg(short, long)]
        file: PathBuf,

        /// Trusted issuer keyring
        #[arg(long, default_value = DEFAULT_KEYRING_FILE)]
        trusted_issuers: PathBuf,

        /// Base64 public key to use instead of the keyring
        #[arg(long)]
        pubkey: Option<String>,

        /// File whose SHA-256 must match payload.sha256
        #[arg(long)]
        check_file: Option<PathBuf>,

        #[command(flatten)]
        registry: RegistryArgs,
    },

    /// Decide whether a skill may be loaded
    Evaluate {
        /// Path to the skill file
        #[arg(short, long)]
        skill: PathBuf,

        /// Unsigned-skill policy: warn or strict
        #[arg(long, default_value = "warn", value_parser = parse_mode)]
        mode: EnforcementMode,

        /// Trusted issuer keyring
        #[arg(long, default_value = DEFAULT_KEYRING_FILE)]
        trusted_issuers: PathBuf,

        /// Suffix appended to the skill path to find its envelope
        #[arg(long, default_value = DEFAULT_ENVELOPE_SUFFIX)]
        envelope_suffix: String,

        /// Host config file; its agents.security.sie section overrides flags
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        registry: RegistryArgs,
    },

    /// Fetch the registry snapshot into the cache directory
    RefreshRegistry {
        /// Registry base URL
        #[arg(long)]
        registry_url: String,

        /// Cache directory
        #[arg(long, default_value = DEFAULT_CACHE_DIR)]
        cache_dir: PathBuf,

        /// Fetch timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Sign an envelope with an issuer seed
    Sign {
        /// Envelope to sign
        #[arg(short, long)]
        file: PathBuf,

        /// File holding the base64 32-byte Ed25519 seed
        #[arg(long)]
        seed_file: PathBuf,

        /// File to bind via payload.sha256
        #[arg(long)]
        bind_file: Option<PathBuf>,

        /// Output path (default: overwrite --file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Registry selection shared by verify and evaluate.
#[derive(Args)]
struct RegistryArgs {
    /// Local registry directory (offline mode)
    #[arg(long, default_value = DEFAULT_REGISTRY_DIR)]
    registry_dir: PathBuf,

    /// Registry base URL (remote mode)
    #[arg(long)]
    registry_url: Option<String>,

    /// Cache directory for remote snapshots
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 10)]
    registry_timeout: u64,

    /// Maximum cache age in seconds before a refresh
    #[arg(long, default_value_t = 86_400)]
    registry_max_age: u64,

    /// Expected registry root key (base64)
    #[arg(long)]
    registry_root_key: Option<String>,
}

impl RegistryArgs {
    fn into_config(self) -> RegistryConfig {
        RegistryConfig {
            registry_dir: self.registry_dir,
            base_url: self.registry_url,
            cache_dir: self.cache_dir,
            timeout: Duration::from_secs(self.registry_timeout),
            max_cache_age: Some(Duration::from_secs(self.registry_max_age)),
            pinned_root_key: self.registry_root_key,
        }
    }
}

fn parse_mode(value: &str) -> Result<EnforcementMode, String> {
    value.parse().map_err(|e: sie_verify_core::VerifyError| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let json = matches!(cli.command, Commands::Evaluate { json: true, .. });
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if json {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        },
    }
}

fn run(command: Commands) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Verify {
            file,
            trusted_issuers,
            pubkey,
            check_file,
            registry,
        } => {
            let verifier = EnvelopeVerifier::new(RegistryClient::new(registry.into_config()));
            let result = Envelope::load(&file).and_then(|envelope| match pubkey.as_deref() {
                Some(key) => verifier.verify_with_key(&envelope, key, check_file.as_deref()),
                None => verifier.verify(&envelope, &trusted_issuers, check_file.as_deref()),
            });

            match result {
                Ok(_) => {
                    println!("[OK] Signature verified and basic checks passed.");
                    Ok(ExitCode::SUCCESS)
                },
                Err(e) => {
                    println!("[FAIL] {}: {}", e.code(), e);
                    Ok(ExitCode::from(2))
                },
            }
        },

        Commands::Evaluate {
            skill,
            mode,
            trusted_issuers,
            envelope_suffix,
            config,
            json,
            registry,
        } => {
            let config = match config {
                Some(path) => SieConfig::load(&path)?,
                None => SieConfig {
                    enabled: true,
                    mode,
                    trusted_issuers,
                    envelope_suffix,
                    registry: registry.into_config(),
                },
            };

            let decision = enforce_skill_with_config(&skill, &config);
            print_decision(&decision, json)?;

            Ok(if decision.allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        },

        Commands::RefreshRegistry {
            registry_url,
            cache_dir,
            timeout,
        } => {
            let mut config = RegistryConfig::remote(registry_url, cache_dir);
            config.timeout = Duration::from_secs(timeout);
            let client = RegistryClient::new(config);

            client.refresh_cache()?;
            let snapshot = client.load_verified_snapshot()?;
            println!(
                "[OK] Registry snapshot verified ({} records) in {}",
                snapshot.records().len(),
                client.files_dir().display()
            );
            Ok(ExitCode::SUCCESS)
        },

        Commands::Sign {
            file,
            seed_file,
            bind_file,
            output,
        } => {
            let mut envelope = Envelope::load(&file)?;

            let seed_text = std::fs::read_to_string(&seed_file)
                .with_context(|| format!("reading seed file {}", seed_file.display()))?;
            let seed = b64_decode(&seed_text, "issuer seed")?;
            let signer = Ed25519Signer::from_seed(&seed)?;

            if let Some(bind) = bind_file {
                let bytes = std::fs::read(&bind)
                    .with_context(|| format!("reading bind file {}", bind.display()))?;
                envelope.payload.sha256 = Some(sha256_hex(&bytes));
            }

            codec::sign(&mut envelope, &signer)?;

            let out = output.unwrap_or(file);
            std::fs::write(&out, envelope.to_json_pretty()? + "\n")
                .with_context(|| format!("writing {}", out.display()))?;
            println!("[OK] Signed envelope written to {}", out.display());
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn print_decision(decision: &EnforcementDecision, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(decision)?);
    } else if decision.allowed {
        println!("ALLOW: {}", decision.detail);
    } else {
        println!("REJECT: {}", decision.detail);
    }
    Ok(())
}
