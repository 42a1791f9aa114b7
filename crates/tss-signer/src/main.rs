//! TSS Signer CLI
//!
//! Command-line interface for threshold ECDSA accounts:
//! - Address derivation and session inspection
//! - Server coefficient computation
//! - Dealing a throwaway key onto in-memory signing nodes
//! - Signing through those nodes

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tss_account::{Address, EthereumAccount, TssAccount, TypedData};
use tss_core::client::memory::NetworkFixture;
use tss_core::client::MemoryTssNetwork;
use tss_core::{AccountParams, CoefficientSet, SigningConfig, SigningSession};

/// TSS Signer - threshold ECDSA account tool
#[derive(Parser)]
#[command(name = "tss-signer")]
#[command(about = "Threshold ECDSA signing-session tool")]
#[command(version)]
struct Cli {
    /// Upper bound on waiting for node sockets, in milliseconds
    #[arg(long, env = "TSS_CONNECT_TIMEOUT_MS", default_value_t = 30_000)]
    connect_timeout_ms: u64,

    /// Upper bound on waiting for precompute, in milliseconds
    #[arg(long, env = "TSS_READY_TIMEOUT_MS", default_value_t = 30_000)]
    ready_timeout_ms: u64,

    /// Log output format
    #[arg(long, env = "TSS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the checksummed Ethereum address of an account
    Address {
        /// Account params JSON file
        #[arg(short, long)]
        params: PathBuf,
    },

    /// Build a fresh session and print it with its topology
    Session {
        #[arg(short, long)]
        params: PathBuf,
    },

    /// Print the server coefficients for the account's topology
    Coefficients {
        #[arg(short, long)]
        params: PathBuf,
    },

    /// Deal a throwaway key onto in-memory signing nodes
    DevDeal {
        /// Output directory for params.json and network.json
        #[arg(short, long, default_value = "./dev")]
        out: PathBuf,

        /// Number of signing nodes
        #[arg(long, default_value_t = 5)]
        servers: u32,

        /// Node threshold
        #[arg(long, default_value_t = 3)]
        threshold: usize,

        /// Client share index
        #[arg(long, default_value_t = 2)]
        index: u64,

        #[arg(long, default_value = "dev-verifier")]
        verifier: String,

        #[arg(long, default_value = "dev@example.com")]
        verifier_id: String,
    },

    /// Sign through in-memory signing nodes
    Sign {
        #[arg(short, long)]
        params: PathBuf,

        /// Dev network JSON file written by dev-deal
        #[arg(short, long)]
        network: PathBuf,

        /// UTF-8 message to sign
        #[arg(short, long, conflicts_with_all = ["hash", "typed_data"])]
        message: Option<String>,

        /// Apply the Ethereum personal-message prefix
        #[arg(long, requires = "message")]
        personal: bool,

        /// Hex-encoded 32-byte digest to sign as is
        #[arg(long, conflicts_with = "typed_data")]
        hash: Option<String>,

        /// EIP-712 typed data JSON file
        #[arg(long)]
        typed_data: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = SigningConfig::default()
        .with_connect_timeout(Duration::from_millis(cli.connect_timeout_ms))
        .with_ready_timeout(Duration::from_millis(cli.ready_timeout_ms));

    match cli.command {
        Commands::Address { ref params } => {
            let params = load_params(params)?;
            let address = Address::from_public_key(&params.public_key()?);
            println!("{address}");
        }
        Commands::Session { ref params } => {
            show_session(&load_params(params)?)?;
        }
        Commands::Coefficients { ref params } => {
            show_coefficients(&load_params(params)?)?;
        }
        Commands::DevDeal {
            ref out,
            servers,
            threshold,
            index,
            ref verifier,
            ref verifier_id,
        } => {
            run_dev_deal(out, servers, threshold, index, verifier, verifier_id)?;
        }
        Commands::Sign {
            ref params,
            ref network,
            ref message,
            personal,
            ref hash,
            ref typed_data,
        } => {
            let request = match (message, hash, typed_data) {
                (Some(message), _, _) if personal => SignRequest::Personal(message.clone()),
                (Some(message), _, _) => SignRequest::Message(message.clone()),
                (_, Some(hash), _) => SignRequest::Hash(hash.clone()),
                (_, _, Some(path)) => SignRequest::TypedData(load_json(path)?),
                _ => anyhow::bail!("one of --message, --hash or --typed-data is required"),
            };
            run_sign(params, network, config, request).await?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn show_session(params: &AccountParams) -> Result<()> {
    let session = SigningSession::new(params)?;

    let output = serde_json::json!({
        "sessionNonce": session.session_nonce,
        "session": session.session,
        "topology": session.topology,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn show_coefficients(params: &AccountParams) -> Result<()> {
    let session = SigningSession::new(params)?;
    let coefficients = CoefficientSet::compute(
        &session.topology.server_indexes,
        &params.tss_index,
        &params.tss_share,
    )?;

    println!("{}", serde_json::to_string_pretty(&coefficients.server.to_wire())?);

    Ok(())
}

fn run_dev_deal(
    out: &Path,
    servers: u32,
    threshold: usize,
    index: u64,
    verifier: &str,
    verifier_id: &str,
) -> Result<()> {
    info!(servers, threshold, index, "Dealing dev key");

    let (network, dealt) = MemoryTssNetwork::deal(&mut OsRng, servers, threshold, index)?;

    let params = AccountParams {
        public_key: dealt.public_key.clone(),
        factor_key: String::new(),
        tss_nonce: 0,
        tss_share: dealt.tss_share.clone(),
        tss_index: dealt.tss_index.clone(),
        selected_tag: "default".into(),
        verifier: verifier.to_string(),
        verifier_id: verifier_id.to_string(),
        node_indexes: vec![],
        tss_endpoints: (1..=servers)
            .map(|i| format!("http://127.0.0.1:{}/tss", 8000 + i))
            .collect(),
        auth_signatures: (1..=servers).map(|i| format!("dev-token-{i}")).collect(),
    };

    std::fs::create_dir_all(out)?;
    let params_path = out.join("params.json");
    let network_path = out.join("network.json");
    std::fs::write(&params_path, serde_json::to_string_pretty(&params)?)?;
    std::fs::write(&network_path, serde_json::to_string_pretty(&network.to_fixture())?)?;

    let address = Address::from_public_key(network.public_key());
    info!(
        address = %address,
        params = ?params_path,
        network = ?network_path,
        "Dev key dealt"
    );

    println!("Address: {address}");
    println!("Params: {}", params_path.display());
    println!("Network: {}", network_path.display());

    Ok(())
}

enum SignRequest {
    Message(String),
    Personal(String),
    Hash(String),
    TypedData(TypedData),
}

async fn run_sign(
    params_path: &Path,
    network_path: &Path,
    config: SigningConfig,
    request: SignRequest,
) -> Result<()> {
    let params = load_params(params_path)?;
    let fixture: NetworkFixture = load_json(network_path)?;
    let network = MemoryTssNetwork::from_fixture(&fixture)?;

    let account = EthereumAccount::new(TssAccount::new(params, network)?.with_config(config));
    info!(address = %account.address(), "Signing");

    let output = match request {
        SignRequest::Message(message) => {
            format!("0x{}", hex::encode(account.sign_message(&message).await?.to_bytes()))
        }
        SignRequest::Personal(message) => account.sign_personal_message(message.as_bytes()).await?,
        SignRequest::Hash(hash) => {
            format!("0x{}", hex::encode(account.sign_hash(&hash).await?.to_bytes()))
        }
        SignRequest::TypedData(typed_data) => account.sign_typed_data(&typed_data).await?,
    };

    println!("Address: {}", account.address());
    println!("Signature: {output}");

    Ok(())
}

fn load_params(path: &Path) -> Result<AccountParams> {
    load_json(path)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}
