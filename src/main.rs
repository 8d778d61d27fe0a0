//! Kyber Custody CLI
//!
//! Operator front end for the session key store:
//!
//! 1. **Lifecycle**: create the schema, generate and revoke session keys,
//!    sweep expired sessions.
//!
//! 2. **Masked listing**: show stored sessions with only a short public-key
//!    prefix, as text or JSON.
//!
//! 3. **Checks**: a two-device encapsulate/decapsulate round trip and a
//!    self test of the whole lifecycle against an in-memory store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;

use kyber_custody::config::{CustodyConfig, DecapsulationPolicy, DuplicatePolicy};
use kyber_custody::crypto::{KeyEncapsulation, MlKem512};
use kyber_custody::storage::SessionStore;
use kyber_custody::time::ManualClock;
use kyber_custody::KeyCustodyService;

/// Database file used when neither the flags nor the config file name one
const DEFAULT_DATABASE: &str = "keys.db";

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kyber-custody", version, about = "Session-scoped ML-KEM key custody")]
struct Args {
    /// SQLite database file
    #[arg(long, env = "KYBER_CUSTODY_DB")]
    database: Option<PathBuf>,

    /// JSON config file; flags override its values
    #[arg(long, env = "KYBER_CUSTODY_CONFIG")]
    config: Option<PathBuf>,

    /// Public-key bytes shown in listings (at most 8)
    #[arg(long, env = "KYBER_CUSTODY_MASK_PREFIX")]
    mask_prefix: Option<usize>,

    /// Replace live sessions on repeated generation instead of refusing
    #[arg(long, env = "KYBER_CUSTODY_REPLACE_DUPLICATES")]
    replace_duplicates: bool,

    /// Allow expired but unswept sessions to encapsulate and decapsulate
    #[arg(long, env = "KYBER_CUSTODY_ALLOW_EXPIRED")]
    allow_expired: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the session table if it does not exist
    Init,

    /// Generate and store a keypair for a session
    Generate {
        /// Session id (random UUID when omitted)
        #[arg(long)]
        session: Option<String>,

        /// Minutes until the session expires
        #[arg(long, default_value_t = 5)]
        validity_minutes: u32,
    },

    /// Delete a session's keys
    Revoke {
        /// Session id
        #[arg(long)]
        session: String,
    },

    /// Delete every expired session
    Sweep,

    /// Show stored sessions with masked public keys
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Two-device encapsulate/decapsulate check on throwaway keys
    RoundTrip,

    /// Run the full session lifecycle against an in-memory store
    Selftest,
}

impl Args {
    fn custody_config(&self) -> Result<CustodyConfig> {
        let mut config = match &self.config {
            Some(path) => CustodyConfig::from_json_file(path)
                .wrap_err_with(|| format!("loading config {}", path.display()))?,
            None => CustodyConfig::default(),
        };

        if let Some(database) = &self.database {
            config.database_path = Some(database.clone());
        }
        if config.database_path.is_none() {
            config.database_path = Some(PathBuf::from(DEFAULT_DATABASE));
        }
        if let Some(prefix) = self.mask_prefix {
            config.mask_prefix_len = prefix;
        }
        if self.replace_duplicates {
            config.duplicate_policy = DuplicatePolicy::Replace;
        }
        if self.allow_expired {
            config.decapsulation_policy = DecapsulationPolicy::AllowExpired;
        }

        config.validate()?;
        Ok(config)
    }
}

// ── Entry Point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so `list --json` stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kyber_custody=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match &args.command {
        Command::RoundTrip => round_trip(),
        Command::Selftest => selftest(&args),
        command => {
            let config = args.custody_config()?;
            let service = KeyCustodyService::open(config).wrap_err("opening session store")?;
            run(&service, command)?;
            service.close()?;
            Ok(())
        }
    }
}

fn run(service: &KeyCustodyService, command: &Command) -> Result<()> {
    match command {
        Command::Init => {
            // `open` already created the schema
            println!("Session store ready ({} sessions)", service.store().count()?);
        }
        Command::Generate {
            session,
            validity_minutes,
        } => {
            let session_id = session
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let keys = service.generate_for_session(&session_id, *validity_minutes)?;
            println!(
                "{} session '{}' (expires at {})",
                if keys.replaced { "Replaced" } else { "Generated" },
                session_id,
                keys.expiry
            );
            println!("Public key: {}", keys.public_key.to_hex());
        }
        Command::Revoke { session } => {
            let removed = service.revoke_session(session)?;
            println!("Removed {} session(s)", removed);
        }
        Command::Sweep => {
            let removed = service.sweep_expired()?;
            println!("Swept {} expired session(s)", removed);
        }
        Command::List { json: true } => {
            println!("{}", serde_json::to_string_pretty(&service.masked_view()?)?);
        }
        Command::List { json: false } => print_masked(service)?,
        // Neither touches the persistent store
        Command::RoundTrip | Command::Selftest => {}
    }
    Ok(())
}

fn print_masked(service: &KeyCustodyService) -> Result<()> {
    let view = service.masked_view()?;
    println!("===== ACTIVE KYBER SESSIONS (masked) =====");
    if view.is_empty() {
        println!("(none)");
    }
    for session in &view {
        println!("{}", session);
    }
    Ok(())
}

fn round_trip() -> Result<()> {
    let kem = MlKem512::new();

    let (public_key, secret_key) = kem.generate_keypair()?;
    println!("Device 1: generated {} keypair", kem.algorithm());
    println!("  public key: {}...", hex::encode(public_key.prefix(32)));

    let (ciphertext, sent) = kem.encapsulate(&public_key)?;
    println!("Device 2: encapsulated shared secret");
    println!("  ciphertext: {}...", hex::encode(&ciphertext.as_bytes()[..32]));
    println!("  shared secret: {}", hex::encode(sent.as_bytes()));

    let received = kem.decapsulate(&ciphertext, &secret_key)?;
    println!("Device 1: decapsulated shared secret");
    println!("  shared secret: {}", hex::encode(received.as_bytes()));

    if sent != received {
        bail!("shared secrets do not match");
    }
    println!("Success: shared secrets match");
    Ok(())
}

fn selftest(args: &Args) -> Result<()> {
    let mut config = args.custody_config()?;
    config.database_path = None;

    let store = SessionStore::open(None, config.busy_timeout())?;
    store.init()?;
    let clock = Arc::new(ManualClock::new(kyber_custody::time::now_timestamp()));
    let service = KeyCustodyService::new(store, MlKem512::new(), config)?.with_clock(clock.clone());

    let session_id = "test_session";
    println!("=== Running ML-KEM-512 functional and store test ===");

    service.generate_for_session(session_id, 1)?;
    println!("Keypair generated and stored for session '{}'", session_id);
    print_masked(&service)?;

    let (ciphertext, sent) = service.encapsulate_for_session(session_id)?;
    let received = service.decapsulate_for_session(session_id, &ciphertext)?;
    if sent != received {
        bail!("shared secrets do not match");
    }
    println!("Shared secrets match");

    clock.advance(65);
    let swept = service.sweep_expired()?;
    println!("Advanced clock 65s, swept {} session(s)", swept);
    print_masked(&service)?;
    if swept != 1 || !service.masked_view()?.is_empty() {
        bail!("expired session was not swept");
    }

    service.generate_for_session(session_id, 1)?;
    println!("Keys recreated for revocation test");
    print_masked(&service)?;

    service.revoke_session(session_id)?;
    println!("After revoking session '{}':", session_id);
    print_masked(&service)?;
    if !service.masked_view()?.is_empty() {
        bail!("revoked session is still listed");
    }

    println!("Self test passed");
    Ok(())
}
