//! Lattice Signer CLI Example
//!
//! This example demonstrates how to use the Lattice signer library over
//! the HTTP relay: connecting to a device, pairing, and signing a payload.
//!
//! # Prerequisites
//!
//! - A device reachable through the relay, and its device id
//! - For pairing: the secret shown on the device screen
//!
//! # Quick Start
//!
//! ```bash
//! cargo run --example lattice-cli -- connect <device-id>
//! cargo run --example lattice-cli -- pair <device-id> <secret>
//! cargo run --example lattice-cli -- sign <device-id> 0x68656c6c6f
//! ```
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `connect <device>` | Connect and show pairing status and firmware |
//! | `pair <device> <secret>` | Pair this client with the device |
//! | `sign <device> <hex> [path]` | Sign a payload (secp256k1, Keccak-256) |
//!
//! # Environment
//!
//! - `LATTICE_CONFIG`: path to a TOML client configuration
//! - `LATTICE_IDENTITY`: path of the stored client key
//!   (default `lattice-identity.hex`)
//! - `RUST_LOG`: log filter, e.g. `lattice_signer_core=debug`
//!
//! # Security Notes
//!
//! - The identity file holds the client's private key; protect it
//! - Pairing is tied to that key: deleting it requires pairing again

use std::env;
use std::fs;
use std::path::PathBuf;

use lattice_signer_core::{
    Client, ClientConfig, Curve, Encoding, HashType, Identity, SignerPath, SigningRequest,
    SigningResponse,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_PATH: &str = "m/44'/60'/0'/0/0";
const APP_NAME: &str = "lattice-cli";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        print_help();
        return;
    }

    let device_id = args[2].as_str();
    match args[1].as_str() {
        "connect" => cmd_connect(device_id),
        "pair" => cmd_pair(device_id, &args[3..]),
        "sign" => cmd_sign(device_id, &args[3..]),
        "--help" | "-h" | "help" => print_help(),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_help();
        }
    }
}

fn print_help() {
    println!(
        r#"Lattice Signer CLI

USAGE:
    lattice-cli <COMMAND> <DEVICE_ID> [ARGS]

COMMANDS:
    connect <device>              Connect and show pairing status
    pair <device> <secret>        Pair using the secret shown on the device
    sign <device> <hex> [path]    Sign a payload (default path {DEFAULT_PATH})
    help                          Show this help message

EXAMPLES:
    cargo run --example lattice-cli -- connect ABC123
    cargo run --example lattice-cli -- pair ABC123 SECRET12
    cargo run --example lattice-cli -- sign ABC123 0x68656c6c6f
"#
    );
}

fn load_config() -> Option<ClientConfig> {
    let Ok(path) = env::var("LATTICE_CONFIG") else {
        return Some(ClientConfig::default());
    };
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Failed to read {path}: {e}");
            return None;
        }
    };
    match ClientConfig::from_toml_str(&text) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Invalid configuration in {path}: {e}");
            None
        }
    }
}

fn identity_path() -> PathBuf {
    env::var_os("LATTICE_IDENTITY").map_or_else(|| PathBuf::from("lattice-identity.hex"), PathBuf::from)
}

/// Loads the stored identity, creating and saving a new one if none exists.
fn load_identity() -> Option<Identity> {
    let path = identity_path();
    if let Ok(stored) = fs::read_to_string(&path) {
        let bytes = match hex::decode(stored.trim()) {
            Ok(bytes) => zeroize::Zeroizing::new(bytes),
            Err(e) => {
                eprintln!("Corrupt identity file {}: {e}", path.display());
                return None;
            }
        };
        return match Identity::from_secret_bytes(&bytes, APP_NAME) {
            Ok(identity) => Some(identity),
            Err(e) => {
                eprintln!("Invalid identity in {}: {e}", path.display());
                None
            }
        };
    }

    let identity = match Identity::generate(APP_NAME) {
        Ok(identity) => identity,
        Err(e) => {
            eprintln!("Failed to generate identity: {e}");
            return None;
        }
    };
    let encoded = zeroize::Zeroizing::new(hex::encode(identity.secret_bytes().as_slice()));
    if let Err(e) = fs::write(&path, encoded.as_bytes()) {
        eprintln!("Failed to save identity to {}: {e}", path.display());
        return None;
    }
    println!("Created a new client identity in {}", path.display());
    Some(identity)
}

fn connect(device_id: &str) -> Option<(Client, bool)> {
    let config = load_config()?;
    let identity = load_identity()?;

    let mut client = match Client::from_config(identity, &config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create client: {e}");
            return None;
        }
    };

    println!("Connecting to {device_id} via {}...", config.base_url);
    match client.connect(device_id) {
        Ok(paired) => Some((client, paired)),
        Err(e) => {
            eprintln!("Failed to connect: {e}");
            None
        }
    }
}

fn cmd_connect(device_id: &str) {
    let Some((client, paired)) = connect(device_id) else {
        return;
    };

    println!();
    println!("Connected.");
    if let Some(session) = client.session() {
        match session.firmware() {
            Some(version) => println!("  Firmware: {version}"),
            None => println!("  Firmware: unknown"),
        }
    }
    println!("  Paired:   {}", if paired { "yes" } else { "no" });
    if let Some(wallet) = client.active_wallet() {
        println!("  Wallet:   {} (uid 0x{})", wallet.name(), hex::encode(wallet.uid()));
    }
    if !paired {
        println!();
        println!("Run `pair {device_id} <secret>` with the secret shown on the device.");
    }
}

fn cmd_pair(device_id: &str, args: &[String]) {
    let Some(secret) = args.first() else {
        eprintln!("Usage: pair <device> <secret>");
        return;
    };

    let Some((mut client, paired)) = connect(device_id) else {
        return;
    };
    if paired {
        println!("Already paired with {device_id}.");
        return;
    }

    match client.pair(secret) {
        Ok(()) => {
            println!();
            println!("Paired successfully!");
            if let Some(wallet) = client.active_wallet() {
                println!("  Active wallet: {}", wallet.name());
            }
        }
        Err(e) => eprintln!("Pairing failed: {e}"),
    }
}

fn cmd_sign(device_id: &str, args: &[String]) {
    let Some(payload_hex) = args.first() else {
        eprintln!("Usage: sign <device> <hex> [path]");
        eprintln!("Example: sign ABC123 0x68656c6c6f \"{DEFAULT_PATH}\"");
        return;
    };

    let payload = match hex::decode(payload_hex.strip_prefix("0x").unwrap_or(payload_hex)) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Invalid hex: {e}");
            return;
        }
    };
    let path: SignerPath = match args.get(1).map_or(DEFAULT_PATH, String::as_str).parse() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Invalid path: {e}");
            return;
        }
    };

    let Some((mut client, paired)) = connect(device_id) else {
        return;
    };
    if !paired {
        eprintln!("Not paired with {device_id}. Run `pair` first.");
        return;
    }

    println!("Signing {} bytes with {path} (confirm on the device)...", payload.len());
    let request = SigningRequest::new(
        path,
        Curve::Secp256k1,
        HashType::Keccak256,
        Encoding::None,
        payload,
    );

    match client.sign(&request) {
        Ok(SigningResponse::Secp256k1 {
            public_key,
            signature,
        }) => {
            println!();
            if let Some(key) = public_key {
                println!("Public Key:");
                println!("  0x{}", hex::encode(key));
            }
            println!("Signature (r || s):");
            println!("  r: 0x{}", hex::encode(signature.r()));
            println!("  s: 0x{}", hex::encode(signature.s()));
        }
        Ok(other) => {
            println!("Signature: 0x{}", hex::encode(other.signature_bytes()));
        }
        Err(e) => eprintln!("Signing failed: {e}"),
    }
}
