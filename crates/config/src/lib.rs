//! Invocation descriptor for the balance function and connection
//! configuration for the DON.

use alloy::primitives::{address, Address};
use feed_function::ApiCredentials;
use url::Url;

/// Inline source text of the balance function, embedded at compile time.
///
/// This is the artifact submitted with an inline-code request; the simulator
/// and the production request path must carry the same text.
pub const BALANCE_FUNCTION_SOURCE: &str = include_str!("../../function/src/encoder.rs");

/// Production Functions router on Sepolia.
pub const DEFAULT_ROUTER_ADDRESS: Address = address!("b83E47C2bC239B3bf370bc41e1459A34b41238D0");

/// Production DON identifier.
pub const DEFAULT_DON_ID: &str = "fun-ethereum-sepolia-1";

/// Production gateway endpoints for secret upload.
pub const DEFAULT_GATEWAY_URLS: [&str; 2] = [
    "https://01.functions-gateway.testnet.chain.link/",
    "https://02.functions-gateway.testnet.chain.link/",
];

/// Slot the encrypted secrets are stored under.
pub const DEFAULT_SLOT_ID: u64 = 0;

/// Minutes until uploaded secrets expire.
pub const DEFAULT_EXPIRATION_MINUTES: u64 = 1440;

/// Where a piece of a request lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Carried inline with the request.
    Inline,
    /// Hosted by the DON under a slot/version.
    DonHosted,
}

/// Return type the consumer contract expects from a function run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// Solidity `uint256`.
    Uint256,
}

/// Invocation descriptor for one function request.
///
/// The same descriptor feeds both the local simulator and the production
/// request path; drift between the two is a deployment bug, so construction
/// goes through [`Self::balance_feed`] only.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Inline source text of the function.
    pub source: &'static str,
    /// Where the source lives.
    pub code_location: Location,
    /// Where the secrets live for a production run.
    pub secrets_location: Location,
    /// Credential pair handed to the function.
    pub secrets: ApiCredentials,
    /// Positional string arguments.
    pub args: Vec<String>,
    /// Return type the consumer contract expects.
    pub expected_return: ReturnKind,
}

impl RequestConfig {
    /// The canonical descriptor for the balance function.
    pub fn balance_feed(secrets: ApiCredentials) -> Self {
        Self {
            source: BALANCE_FUNCTION_SOURCE,
            code_location: Location::Inline,
            secrets_location: Location::DonHosted,
            secrets,
            args: Vec::new(),
            expected_return: ReturnKind::Uint256,
        }
    }
}

/// DON connection parameters for secret upload.
///
/// Everything here used to be a literal in the upload control flow; it is an
/// explicit struct so drivers can override any field from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct DonConfig {
    /// Functions router contract address.
    pub router_address: Address,
    /// DON identifier, utf-8, at most 32 bytes.
    pub don_id: String,
    /// Gateway endpoints the encrypted secrets are uploaded to.
    pub gateway_urls: Vec<Url>,
    /// Slot to store the encrypted secrets under.
    pub slot_id: u64,
    /// Minutes until the uploaded secrets expire.
    pub expiration_minutes: u64,
}

impl Default for DonConfig {
    fn default() -> Self {
        let gateway_urls = DEFAULT_GATEWAY_URLS
            .iter()
            .map(|raw| Url::parse(raw).expect("default gateway url is valid"))
            .collect();

        Self {
            router_address: DEFAULT_ROUTER_ADDRESS,
            don_id: DEFAULT_DON_ID.to_owned(),
            gateway_urls,
            slot_id: DEFAULT_SLOT_ID,
            expiration_minutes: DEFAULT_EXPIRATION_MINUTES,
        }
    }
}
