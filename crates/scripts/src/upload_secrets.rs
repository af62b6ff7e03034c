//! Driver that encrypts the brokerage credentials and uploads them to the
//! DON gateways ahead of a production request.
//!
//! The reported version must be supplied wherever a production request
//! references these secrets.

use alloy::{
    primitives::{hex, Address},
    signers::local::PrivateKeySigner,
};
use clap::Parser;
use dotenvy::dotenv;
use feed_config::{DonConfig, DEFAULT_DON_ID, DEFAULT_EXPIRATION_MINUTES, DEFAULT_ROUTER_ADDRESS, DEFAULT_SLOT_ID};
use feed_don::{SecretsManager, UploadResult};
use feed_function::ApiCredentials;
use url::Url;

const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";
const ENV_RPC_URL: &str = "SEPOLIA_RPC_URL";

/// Errors from the upload driver.
#[derive(thiserror::Error, Debug)]
enum Error {
    /// private key was not set
    #[error("environment variable {ENV_PRIVATE_KEY} must be set")]
    PrivateKeyNotSet,
    /// rpc url was not set
    #[error("environment variable {ENV_RPC_URL} must be set")]
    RpcUrlNotSet,
    /// rpc url did not parse
    #[error("invalid rpc url: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),
    /// private key was not valid hex
    #[error("private key was not valid hex")]
    InvalidPrivateKeyHex(#[from] hex::FromHexError),
    /// private key hex was too short
    #[error("private key hex was too short")]
    ShortPrivateKeyHex,
    /// invalid private key
    #[error("invalid private key: {0}")]
    Ecdsa(#[from] k256::ecdsa::Error),
    /// credentials missing from the environment
    #[error(transparent)]
    Credentials(#[from] feed_function::CredentialsError),
    /// secrets manager failure
    #[error(transparent)]
    Don(#[from] feed_don::secrets::Error),
    /// a gateway rejected the upload
    #[error("failed to upload secrets to DON: {0}")]
    UploadRejected(String),
    /// the gateways accepted but reported no version
    #[error("upload succeeded but no version was reported")]
    MissingVersion,
    /// the reported version was not an integer
    #[error("gateway reported a non-numeric version: {0:?}")]
    InvalidVersion(String),
}

/// Encrypt the brokerage credentials and upload them to the DON.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Opts {
    /// Functions router contract address.
    #[arg(long, default_value_t = DEFAULT_ROUTER_ADDRESS)]
    router_address: Address,

    /// DON identifier.
    #[arg(long, default_value = DEFAULT_DON_ID)]
    don_id: String,

    /// Gateway URL to upload to. Repeat the flag to add gateways.
    #[arg(long = "gateway-url", default_values_t = DonConfig::default().gateway_urls)]
    gateway_urls: Vec<Url>,

    /// Slot to store the encrypted secrets under.
    #[arg(long, default_value_t = DEFAULT_SLOT_ID)]
    slot_id: u64,

    /// Minutes until the uploaded secrets expire.
    #[arg(long, default_value_t = DEFAULT_EXPIRATION_MINUTES)]
    expiration_minutes: u64,
}

impl Opts {
    fn don_config(&self) -> DonConfig {
        DonConfig {
            router_address: self.router_address,
            don_id: self.don_id.clone(),
            gateway_urls: self.gateway_urls.clone(),
            slot_id: self.slot_id,
            expiration_minutes: self.expiration_minutes,
        }
    }
}

#[tokio::main]
async fn main() {
    let _guards = feed_tracing::init_logging().unwrap();

    if let Err(e) = run().await {
        println!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    dotenv().ok();
    let opts = Opts::parse();
    let config = opts.don_config();

    let private_key = std::env::var(ENV_PRIVATE_KEY).map_err(|_| Error::PrivateKeyNotSet)?;
    let rpc_url: Url = std::env::var(ENV_RPC_URL).map_err(|_| Error::RpcUrlNotSet)?.parse()?;
    let secrets = ApiCredentials::from_env()?;

    let signer = signer_from_hex(&private_key)?;
    let mut manager =
        SecretsManager::new(signer, rpc_url, config.router_address, config.don_id.clone());
    manager.initialize().await?;

    let encrypted = manager.encrypt_secrets(&secrets)?;
    let result = manager
        .upload_encrypted_secrets(
            &encrypted,
            &config.gateway_urls,
            config.slot_id,
            config.expiration_minutes,
        )
        .await?;

    let version = report_version(result)?;
    println!("Secrets version: {version}");

    Ok(())
}

// Raises on rejection before anything success-shaped is logged; the gateway's
// error message is carried verbatim.
fn report_version(result: UploadResult) -> Result<u64, Error> {
    if !result.success {
        return Err(Error::UploadRejected(result.error_message.unwrap_or_default()));
    }

    tracing::info!(?result, "secrets uploaded successfully");

    let version = result.version.ok_or(Error::MissingVersion)?;
    version.parse().map_err(|_| Error::InvalidVersion(version.clone()))
}

fn signer_from_hex(secret: &str) -> Result<PrivateKeySigner, Error> {
    if secret.len() < 64 {
        return Err(Error::ShortPrivateKeyHex);
    }

    let decoded = hex::decode(secret)?;
    PrivateKeySigner::from_slice(&decoded).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_upload_is_fatal_with_the_gateway_message() {
        let result = UploadResult {
            success: false,
            version: None,
            error_message: Some("slot is locked".to_owned()),
        };

        let err = report_version(result).unwrap_err();
        assert_eq!(err.to_string(), "failed to upload secrets to DON: slot is locked");
    }

    #[test]
    fn string_typed_version_is_parsed() {
        let result = UploadResult {
            success: true,
            version: Some("3".to_owned()),
            error_message: None,
        };

        assert_eq!(report_version(result).unwrap(), 3);
    }

    #[test]
    fn non_numeric_version_is_fatal() {
        let result = UploadResult {
            success: true,
            version: Some("three".to_owned()),
            error_message: None,
        };

        assert!(matches!(report_version(result), Err(Error::InvalidVersion(_))));
    }

    #[test]
    fn missing_version_is_fatal() {
        let result = UploadResult { success: true, version: None, error_message: None };

        assert!(matches!(report_version(result), Err(Error::MissingVersion)));
    }

    #[test]
    fn cli_defaults_match_the_production_config() {
        let opts = Opts::try_parse_from(["upload-secrets"]).unwrap();

        assert_eq!(opts.don_config(), DonConfig::default());
    }

    #[test]
    fn cli_overrides_every_don_parameter() {
        let opts = Opts::try_parse_from([
            "upload-secrets",
            "--router-address",
            "0x0000000000000000000000000000000000000001",
            "--don-id",
            "fun-avalanche-fuji-1",
            "--gateway-url",
            "https://gw.example/",
            "--slot-id",
            "2",
            "--expiration-minutes",
            "10",
        ])
        .unwrap();

        let config = opts.don_config();
        assert_eq!(config.don_id, "fun-avalanche-fuji-1");
        assert_eq!(config.slot_id, 2);
        assert_eq!(config.expiration_minutes, 10);
        assert_eq!(config.gateway_urls, vec![Url::parse("https://gw.example/").unwrap()]);
        assert_eq!(config.router_address, Address::with_last_byte(1));
    }

    #[test]
    fn short_private_keys_are_rejected() {
        assert!(matches!(signer_from_hex("abc123"), Err(Error::ShortPrivateKeyHex)));
    }

    #[test]
    fn valid_private_key_hex_builds_a_signer() {
        let hex_key = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
        assert!(signer_from_hex(hex_key).is_ok());
    }
}
