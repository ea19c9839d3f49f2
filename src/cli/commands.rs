//! CLI commands for the multisig tool
//!
//! Implements all command handlers for the CLI interface.

use crate::core::{Address, Credential, Network, Utxo};
use crate::crypto::KeyPair;
use crate::multisig::{
    sign_artifact, ArtifactLifecycle, ArtifactPayload, Ed25519Verifier, MetadataDocument,
    MultisigError, MultisigPolicy, ParticipantId, PendingArtifact, Role, WalletConfig,
};
use crate::storage::{load_from_file, save_to_file, FileArtifactStore, StorageConfig};
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub lifecycle: ArtifactLifecycle<FileArtifactStore, Ed25519Verifier>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize application state
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage_config = StorageConfig {
            data_dir: data_dir.clone(),
            ..Default::default()
        };
        let store = FileArtifactStore::new(storage_config)?;

        Ok(Self {
            lifecycle: ArtifactLifecycle::new(store, Ed25519Verifier),
            data_dir,
        })
    }
}

fn load_policy(config_path: &Path) -> CliResult<(WalletConfig, MultisigPolicy)> {
    let config = WalletConfig::load(config_path)?;
    let policy = MultisigPolicy::from_config(&config)?;
    Ok((config, policy))
}

fn print_artifact(artifact: &PendingArtifact) {
    let quorum = artifact.quorum();
    println!("   📄 Artifact: {}", artifact.id);
    println!("   ├─ Wallet: {}", artifact.policy_ref);
    println!(
        "   ├─ Kind: {} ({} role)",
        artifact.payload.kind(),
        artifact.role
    );
    println!("   ├─ State: {}", artifact.state);
    println!(
        "   ├─ Signatures: {}/{} ({} rejected)",
        quorum.signed, quorum.required, quorum.rejected
    );
    for signer in &artifact.eligible {
        let mark = if artifact.signed_by.contains(&signer.participant) {
            "✅"
        } else if artifact.rejected_by.contains(&signer.participant) {
            "❌"
        } else {
            "⏳"
        };
        println!(
            "   │  {} {} ({})",
            mark, signer.participant, signer.key_hash
        );
    }
    match &artifact.tx_hash {
        Some(hash) => println!("   └─ Tx hash: {}", hash),
        None => println!("   └─ Updated: {}", artifact.updated_at),
    }
}

/// Generate a new signing key
pub fn cmd_keygen(network: Network) -> CliResult<()> {
    let key_pair = KeyPair::generate();
    let enterprise = Address::Enterprise {
        network,
        payment: Credential::KeyHash(key_pair.key_hash()),
    };

    println!("🔐 New key pair generated!");
    println!("   🔑 Signing key: {}", key_pair.private_key_hex());
    println!("   🪪 Verification key: {}", key_pair.public_key_hex());
    println!("   #️⃣  Key hash: {}", key_pair.key_hash());
    println!(
        "   📍 Key address ({}): {}",
        network,
        enterprise.to_bech32()?
    );
    println!(
        "\n⚠️  Keep the signing key secret; share only the verification key or key hash."
    );

    Ok(())
}

/// Show the addresses and identifiers a wallet derives to
pub fn cmd_derive(config_path: &Path, network: Option<Network>) -> CliResult<()> {
    let (config, policy) = load_policy(config_path)?;
    let derived = match network {
        Some(network) => policy.derive_addresses_for(network)?,
        None => policy.derive_addresses()?,
    };
    let caps = policy.capabilities();

    println!("🏦 Wallet: {} ({})", config.name, policy.summary());
    println!("   🌐 Network: {}", derived.network);
    println!("   #️⃣  Script hash: {}", derived.script_hash);
    println!("   📍 Address: {}", derived.payment_address);
    if let Some(stake) = &derived.stake_address {
        println!("   🥩 Stake address: {}", stake);
    }
    if let (Some(drep), Some(legacy)) = (&derived.drep_id, &derived.drep_id_legacy) {
        println!("   🗳️  DRep ID: {}", drep);
        println!("      (CIP-105: {})", legacy);
    }
    println!(
        "   ⚙️  Staking: {}, governance: {}, committee cold/hot: {}/{}",
        caps.staking_enabled,
        caps.governance_enabled,
        caps.committee_cold_enabled,
        caps.committee_hot_enabled
    );
    for role in &caps.partial_roles {
        println!(
            "   ⚠️  {} keys do not cover every payment signer; no {} script is built",
            role, role
        );
    }

    Ok(())
}

/// Print one role's native script
pub fn cmd_script(config_path: &Path, role: Role, cbor: bool) -> CliResult<()> {
    let (_, policy) = load_policy(config_path)?;
    let script = policy
        .script_for(role)
        .ok_or(MultisigError::RoleNotEnabled(role))?;

    if cbor {
        println!("{}", script.to_cbor_hex());
    } else {
        println!("{}", serde_json::to_string_pretty(&script.to_json())?);
    }
    Ok(())
}

/// Write or print the registration metadata
pub fn cmd_metadata(config_path: &Path, output: Option<&Path>) -> CliResult<()> {
    let (_, policy) = load_policy(config_path)?;
    let metadata = policy.metadata_document().to_metadata_json()?;

    match output {
        Some(path) => {
            save_to_file(&metadata, path)?;
            println!("✅ Registration metadata written to {:?}", path);
        }
        None => println!("{}", serde_json::to_string_pretty(&metadata)?),
    }
    Ok(())
}

/// Rebuild a wallet from published metadata and check it
pub fn cmd_verify_metadata(path: &Path, config_out: Option<&Path>) -> CliResult<()> {
    let value: serde_json::Value = load_from_file(path)?;
    let document = MetadataDocument::from_metadata_json(&value)?;
    let policy = MultisigPolicy::from_metadata(&document)?;
    let derived = policy.derive_addresses()?;

    println!("✅ Metadata is consistent");
    println!("   🏦 Wallet: {} ({})", policy.name(), policy.summary());
    println!("   📍 Address: {}", derived.payment_address);

    if let Some(out) = config_out {
        WalletConfig::from_metadata(&document)?.save(out)?;
        println!("   💾 Wallet config written to {:?}", out);
    }
    Ok(())
}

/// Sum the UTxOs held at a wallet's address
pub fn cmd_balance(config_path: &Path, utxos_path: &Path) -> CliResult<()> {
    let (_, policy) = load_policy(config_path)?;
    let derived = policy.derive_addresses()?;
    let utxos: Vec<Utxo> = load_from_file(utxos_path)?;

    let owned = derived.owned_utxos(&utxos);
    println!("💰 Balance of {}", derived.payment_address);
    for utxo in &owned {
        println!("   ├─ {}: {} lovelace", utxo.out_ref(), utxo.lovelace);
    }
    println!(
        "   └─ Total: {} lovelace in {} UTxO(s)",
        derived.balance(&utxos),
        owned.len()
    );
    Ok(())
}

/// Create an artifact and sign it as the proposer
pub fn cmd_propose(
    state: &AppState,
    config_path: &Path,
    role: Role,
    payload: ArtifactPayload,
    signing_key: &str,
) -> CliResult<()> {
    let (config, policy) = load_policy(config_path)?;
    let key_pair = KeyPair::from_private_key_hex(signing_key)?;

    let draft = state
        .lifecycle
        .create(&config.name, &policy, role, payload)?;
    let proposer = draft
        .participant_for(&key_pair.key_hash())
        .cloned()
        .ok_or_else(|| MultisigError::UnauthorizedSigner(key_pair.key_hash().to_hex()))?;
    let witness = sign_artifact(&draft, &key_pair);
    let outcome = state.lifecycle.propose(&draft.id, &proposer, witness)?;

    println!("📝 Proposed by {}", proposer);
    print_artifact(&outcome.artifact);
    Ok(())
}

/// Witness an artifact
pub fn cmd_sign(state: &AppState, id: &str, signing_key: &str) -> CliResult<()> {
    let key_pair = KeyPair::from_private_key_hex(signing_key)?;
    let artifact = state.lifecycle.get(id)?;
    let participant = artifact
        .participant_for(&key_pair.key_hash())
        .cloned()
        .ok_or_else(|| MultisigError::UnauthorizedSigner(key_pair.key_hash().to_hex()))?;

    let witness = sign_artifact(&artifact, &key_pair);
    let outcome = state.lifecycle.record_signature(id, &participant, witness)?;

    if outcome.transition.became_ready() {
        println!("🎉 Quorum reached, ready to submit!");
    } else {
        println!("✍️  Signed by {}", participant);
    }
    print_artifact(&outcome.artifact);
    Ok(())
}

/// Record a participant's rejection
pub fn cmd_reject(state: &AppState, id: &str, participant: &str) -> CliResult<()> {
    let outcome = state
        .lifecycle
        .record_rejection(id, &ParticipantId::new(participant))?;

    println!("🚫 Rejected by {}", participant);
    print_artifact(&outcome.artifact);
    Ok(())
}

/// Show an artifact, or every artifact of a wallet
pub fn cmd_status(state: &AppState, id: Option<&str>, wallet: Option<&str>) -> CliResult<()> {
    match (id, wallet) {
        (Some(id), _) => print_artifact(&state.lifecycle.get(id)?),
        (None, Some(wallet)) => {
            let artifacts = state.lifecycle.list_for(wallet)?;
            println!("📋 {} artifact(s) for {}", artifacts.len(), wallet);
            for artifact in &artifacts {
                print_artifact(artifact);
            }
        }
        (None, None) => {
            println!("⚠️  Pass --id or --wallet");
        }
    }
    Ok(())
}

/// Record a submission performed by another tool
pub fn cmd_submitted(state: &AppState, id: &str, tx_hash: &str) -> CliResult<()> {
    let outcome = state.lifecycle.mark_submitted(id, tx_hash)?;
    println!("📡 Marked as submitted");
    print_artifact(&outcome.artifact);
    Ok(())
}

/// Re-validate open artifacts after a wallet configuration change
pub fn cmd_rebind(state: &AppState, config_path: &Path) -> CliResult<()> {
    let (config, policy) = load_policy(config_path)?;
    let outcomes = state.lifecycle.on_policy_changed(&config.name, &policy)?;

    println!("🔄 Re-validated {} open artifact(s)", outcomes.len());
    for outcome in &outcomes {
        println!(
            "   ├─ {}: {} -> {}",
            outcome.artifact.id, outcome.transition.from, outcome.transition.to
        );
    }
    Ok(())
}
