//! The balance function: fetch a brokerage account balance and encode it as
//! an onchain `uint256` denominated in cents.

pub mod credentials;
pub mod encoder;

pub use credentials::{ApiCredentials, CredentialsError};
pub use encoder::{
    decode_balance, encode_balance, fetch_balance, run, Error, ALPACA_ACCOUNT_URL,
};
