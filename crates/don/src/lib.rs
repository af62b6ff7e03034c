//! Client surface for the decentralized oracle network: local simulation of
//! the balance function and encrypted secret distribution to the DON
//! gateways.

pub mod contracts;
mod crypto;
pub mod secrets;
pub mod simulate;

pub use secrets::{EncryptedSecrets, SecretsManager, UploadResult};
pub use simulate::{simulate, SimulationOutcome};
