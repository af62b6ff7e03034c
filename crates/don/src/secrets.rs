//! Encrypt the brokerage credentials and distribute them to the DON.

use crate::{
    contracts::{
        i_functions_coordinator::IFunctionsCoordinator, i_functions_router::IFunctionsRouter,
    },
    crypto,
};
use alloy::{
    primitives::{hex, Address, B256},
    providers::RootProvider,
    signers::{local::PrivateKeySigner, Signer},
};
use feed_function::ApiCredentials;
use k256::PublicKey;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

type DonProvider = RootProvider;

/// Errors from the secrets manager. Nothing here is retried; every failure
/// terminates the enclosing upload.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// don id does not fit in a bytes32
    #[error("don id longer than 32 bytes")]
    DonIdTooLong,
    /// [`SecretsManager::initialize`] has not fetched the DON key yet
    #[error("secrets manager is not initialized")]
    NotInitialized,
    /// router or coordinator call failed
    #[error("contract call failed: {0}")]
    Contract(#[from] alloy::contract::Error),
    /// the DON threshold key was not a valid sec1 public key
    #[error("DON threshold public key is not a valid sec1 key")]
    InvalidDonKey,
    /// sealing the credential envelope failed
    #[error("failed to seal secrets")]
    Seal,
    /// gateway transport failure
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// signing the upload payload failed
    #[error("failed to sign upload payload: {0}")]
    Signer(#[from] alloy::signers::Error),
}

/// Hex-encoded sealed credential envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecrets {
    /// 0x-prefixed hex of the sealed envelope.
    pub hexstring: String,
}

/// Aggregated result of uploading to every configured gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// True only if every gateway accepted the payload.
    pub success: bool,
    /// Version assigned by the first accepting gateway, string-typed as the
    /// gateway reported it.
    pub version: Option<String>,
    /// First error message reported by a rejecting gateway.
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayResponse {
    success: bool,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Client for the DON's secret-distribution facility: resolves the DON
/// threshold key onchain, seals the credential pair to it, and uploads the
/// envelope to the gateways.
#[derive(Debug)]
pub struct SecretsManager {
    signer: PrivateKeySigner,
    provider: DonProvider,
    router_address: Address,
    don_id: String,
    http: reqwest::Client,
    don_public_key: Option<PublicKey>,
}

impl SecretsManager {
    /// Create a new [Self] against `rpc_url`. [`Self::initialize`] must run
    /// before secrets can be sealed.
    pub fn new(
        signer: PrivateKeySigner,
        rpc_url: Url,
        router_address: Address,
        don_id: String,
    ) -> Self {
        Self {
            signer,
            provider: RootProvider::new_http(rpc_url),
            router_address,
            don_id,
            http: reqwest::Client::new(),
            don_public_key: None,
        }
    }

    /// Supply the DON threshold key directly instead of fetching it onchain.
    pub fn with_threshold_public_key(mut self, key: PublicKey) -> Self {
        self.don_public_key = Some(key);
        self
    }

    /// Resolve the coordinator for the DON via the router and fetch the
    /// coordinator's threshold public key.
    pub async fn initialize(&mut self) -> Result<(), Error> {
        let router = IFunctionsRouter::new(self.router_address, self.provider.clone());
        let coordinator_address =
            router.getContractById(don_id_word(&self.don_id)?).call().await?._0;

        let coordinator = IFunctionsCoordinator::new(coordinator_address, self.provider.clone());
        let key_bytes = coordinator.getThresholdPublicKey().call().await?._0;

        let key = PublicKey::from_sec1_bytes(&key_bytes).map_err(|_| Error::InvalidDonKey)?;
        self.don_public_key = Some(key);

        info!(coordinator = %coordinator_address, "fetched DON threshold public key");

        Ok(())
    }

    /// Seal the credential pair to the DON threshold key.
    pub fn encrypt_secrets(&self, credentials: &ApiCredentials) -> Result<EncryptedSecrets, Error> {
        let don_key = self.don_public_key.as_ref().ok_or(Error::NotInitialized)?;

        let plaintext = serde_json::json!({
            "alpacaKey": credentials.key(),
            "alpacaSecret": credentials.secret(),
        });
        let sealed = crypto::seal(don_key, plaintext.to_string().as_bytes())?;

        Ok(EncryptedSecrets { hexstring: hex::encode_prefixed(sealed) })
    }

    /// Upload the sealed envelope to every gateway, one at a time.
    ///
    /// The aggregate succeeds only if every gateway accepts. The version
    /// comes from the first acceptance, the error message from the first
    /// rejection.
    pub async fn upload_encrypted_secrets(
        &self,
        encrypted: &EncryptedSecrets,
        gateway_urls: &[Url],
        slot_id: u64,
        minutes_until_expiration: u64,
    ) -> Result<UploadResult, Error> {
        let payload = serde_json::json!({
            "don_id": self.don_id,
            "slot_id": slot_id,
            "minutes_until_expiration": minutes_until_expiration,
            "encrypted_secrets": encrypted.hexstring,
        });
        let signature = self.signer.sign_message(payload.to_string().as_bytes()).await?;
        let message = serde_json::json!({
            "payload": payload,
            "sender": self.signer.address().to_string(),
            "signature": hex::encode_prefixed(signature.as_bytes()),
        });

        let mut result = UploadResult { success: true, version: None, error_message: None };
        for gateway in gateway_urls {
            let response: GatewayResponse = self
                .http
                .post(gateway.clone())
                .json(&message)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if response.success {
                info!(gateway = %gateway, "gateway accepted encrypted secrets");
                if result.version.is_none() {
                    result.version = response.version;
                }
            } else {
                warn!(
                    gateway = %gateway,
                    error = ?response.error_message,
                    "gateway rejected encrypted secrets"
                );
                result.success = false;
                if result.error_message.is_none() {
                    result.error_message = response.error_message;
                }
            }
        }

        Ok(result)
    }
}

// A DON id is stored as utf-8 right-padded into a bytes32.
fn don_id_word(don_id: &str) -> Result<B256, Error> {
    let raw = don_id.as_bytes();
    if raw.len() > 32 {
        return Err(Error::DonIdTooLong);
    }

    let mut word = [0u8; 32];
    word[..raw.len()].copy_from_slice(raw);
    Ok(B256::new(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_test_utils::{spawn_gateway, test_tracing};
    use k256::SecretKey;
    use serde_json::json;

    fn creds() -> ApiCredentials {
        ApiCredentials::new("key", "secret")
    }

    fn test_manager() -> (SecretsManager, SecretKey) {
        let don_secret = SecretKey::random(&mut rand::rngs::OsRng);
        let manager = SecretsManager::new(
            PrivateKeySigner::random(),
            Url::parse("http://127.0.0.1:1").unwrap(),
            Address::ZERO,
            "fun-ethereum-sepolia-1".to_owned(),
        )
        .with_threshold_public_key(don_secret.public_key());

        (manager, don_secret)
    }

    #[test]
    fn sealed_secrets_round_trip() {
        let (manager, don_secret) = test_manager();

        let encrypted = manager.encrypt_secrets(&creds()).unwrap();

        let sealed = hex::decode(&encrypted.hexstring).unwrap();
        let opened = crypto::open(&don_secret, &sealed).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&opened).unwrap();
        assert_eq!(value, json!({"alpacaKey": "key", "alpacaSecret": "secret"}));
    }

    #[test]
    fn encrypting_before_initialize_fails() {
        let manager = SecretsManager::new(
            PrivateKeySigner::random(),
            Url::parse("http://127.0.0.1:1").unwrap(),
            Address::ZERO,
            "don".to_owned(),
        );

        assert!(matches!(manager.encrypt_secrets(&creds()), Err(Error::NotInitialized)));
    }

    #[test]
    fn don_id_is_right_padded_into_a_word() {
        let word = don_id_word("fun-ethereum-sepolia-1").unwrap();
        assert!(word.as_slice().starts_with(b"fun-ethereum-sepolia-1"));
        assert!(word.as_slice().ends_with(&[0u8; 10]));

        assert!(matches!(don_id_word(&"x".repeat(33)), Err(Error::DonIdTooLong)));
    }

    #[tokio::test]
    async fn uploads_to_every_gateway() {
        test_tracing();
        let (manager, _) = test_manager();
        let encrypted = manager.encrypt_secrets(&creds()).unwrap();

        let first = spawn_gateway(json!({"success": true, "version": "3"})).await;
        let second = spawn_gateway(json!({"success": true, "version": "3"})).await;
        let gateways = [first.endpoint(), second.endpoint()];

        let result =
            manager.upload_encrypted_secrets(&encrypted, &gateways, 0, 1440).await.unwrap();

        assert!(result.success);
        assert_eq!(result.version.as_deref(), Some("3"));
        assert_eq!(first.hits(), 1);
        assert_eq!(second.hits(), 1);
    }

    #[tokio::test]
    async fn upload_request_carries_the_signed_payload() {
        let (manager, _) = test_manager();
        let encrypted = manager.encrypt_secrets(&creds()).unwrap();

        let gateway = spawn_gateway(json!({"success": true, "version": "1"})).await;
        manager
            .upload_encrypted_secrets(&encrypted, &[gateway.endpoint()], 0, 1440)
            .await
            .unwrap();

        let request = &gateway.requests()[0];
        assert_eq!(request["payload"]["don_id"], "fun-ethereum-sepolia-1");
        assert_eq!(request["payload"]["slot_id"], 0);
        assert_eq!(request["payload"]["minutes_until_expiration"], 1440);
        assert_eq!(request["payload"]["encrypted_secrets"], json!(encrypted.hexstring));
        assert!(request["signature"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn rejection_surfaces_the_gateway_message() {
        let (manager, _) = test_manager();
        let encrypted = manager.encrypt_secrets(&creds()).unwrap();

        let accepting = spawn_gateway(json!({"success": true, "version": "7"})).await;
        let rejecting =
            spawn_gateway(json!({"success": false, "errorMessage": "slot is locked"})).await;
        let gateways = [accepting.endpoint(), rejecting.endpoint()];

        let result =
            manager.upload_encrypted_secrets(&encrypted, &gateways, 0, 1440).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.version.as_deref(), Some("7"));
        assert_eq!(result.error_message.as_deref(), Some("slot is locked"));
    }
}
