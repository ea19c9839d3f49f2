//! Cardano multisig CLI application
//!
//! A command-line interface for building multisig wallets and collecting
//! signatures on their transactions.

use cardano_multisig::cli::{self, AppState};
use cardano_multisig::core::Network;
use cardano_multisig::multisig::{ArtifactPayload, Role};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multisig")]
#[command(version = "0.1.0")]
#[command(about = "Native-script multisig wallets on Cardano", long_about = None)]
struct Cli {
    /// Data directory for pending artifacts
    #[arg(short, long, default_value = ".multisig_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new Ed25519 signing key
    Keygen {
        /// Network for the printed key address
        #[arg(short, long, default_value = "testnet")]
        network: Network,
    },

    /// Show a wallet's address, stake address and DRep ID
    Derive {
        /// Wallet configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Derive for another network than the configured one
        #[arg(short, long)]
        network: Option<Network>,
    },

    /// Print a role's native script
    Script {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = "payment")]
        role: Role,

        /// Print canonical CBOR hex instead of JSON
        #[arg(long)]
        cbor: bool,
    },

    /// Produce registration metadata (label 1854)
    Metadata {
        #[arg(short, long)]
        config: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check published metadata and optionally recover the wallet config
    VerifyMetadata {
        /// Metadata JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Write the recovered wallet config here
        #[arg(long)]
        config_out: Option<PathBuf>,
    },

    /// Sum the UTxOs held at a wallet's address
    Balance {
        #[arg(short, long)]
        config: PathBuf,

        /// JSON list of UTxOs
        #[arg(short, long)]
        utxos: PathBuf,
    },

    /// Propose a transaction or payload and sign it
    Propose {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value = "payment")]
        role: Role,

        /// Unsigned transaction body (CBOR hex)
        #[arg(long, conflicts_with = "message", required_unless_present = "message")]
        tx_body: Option<String>,

        /// Arbitrary payload to sign as-is
        #[arg(long)]
        message: Option<String>,

        /// Proposer's signing key (hex)
        #[arg(short, long)]
        signing_key: String,
    },

    /// Sign a pending artifact
    Sign {
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        signing_key: String,
    },

    /// Reject a pending artifact
    Reject {
        #[arg(short, long)]
        id: String,

        /// Participant name
        #[arg(short, long)]
        participant: String,
    },

    /// Show pending artifacts
    Status {
        #[arg(short, long)]
        id: Option<String>,

        /// Wallet name
        #[arg(short, long)]
        wallet: Option<String>,
    },

    /// Record that an artifact was submitted
    Submitted {
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        tx_hash: String,
    },

    /// Re-validate open artifacts after editing a wallet config
    Rebind {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let data_dir = cli.data_dir;
    let state = || AppState::new(data_dir.clone());

    match cli.command {
        Commands::Keygen { network } => cli::cmd_keygen(network)?,

        Commands::Derive { config, network } => cli::cmd_derive(&config, network)?,

        Commands::Script { config, role, cbor } => cli::cmd_script(&config, role, cbor)?,

        Commands::Metadata { config, output } => cli::cmd_metadata(&config, output.as_deref())?,

        Commands::VerifyMetadata { file, config_out } => {
            cli::cmd_verify_metadata(&file, config_out.as_deref())?;
        }

        Commands::Balance { config, utxos } => cli::cmd_balance(&config, &utxos)?,

        Commands::Propose {
            config,
            role,
            tx_body,
            message,
            signing_key,
        } => {
            let payload = match (tx_body, message) {
                (Some(body), _) => ArtifactPayload::Transaction {
                    body: hex::decode(body.trim())?,
                },
                (None, Some(message)) => ArtifactPayload::Signable {
                    payload: message.into_bytes(),
                    description: String::new(),
                },
                (None, None) => return Err("either --tx-body or --message is required".into()),
            };
            cli::cmd_propose(&state()?, &config, role, payload, &signing_key)?;
        }

        Commands::Sign { id, signing_key } => {
            cli::cmd_sign(&state()?, &id, &signing_key)?;
        }

        Commands::Reject { id, participant } => {
            cli::cmd_reject(&state()?, &id, &participant)?;
        }

        Commands::Status { id, wallet } => {
            cli::cmd_status(&state()?, id.as_deref(), wallet.as_deref())?;
        }

        Commands::Submitted { id, tx_hash } => {
            cli::cmd_submitted(&state()?, &id, &tx_hash)?;
        }

        Commands::Rebind { config } => {
            cli::cmd_rebind(&state()?, &config)?;
        }
    }

    Ok(())
}
