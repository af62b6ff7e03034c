//! Driver that runs the balance function through the local simulator before
//! anything is deployed or requested onchain.

use dotenvy::dotenv;
use eyre::WrapErr;
use feed_config::RequestConfig;
use feed_function::{decode_balance, ApiCredentials, ALPACA_ACCOUNT_URL};

#[tokio::main]
async fn main() {
    let _guards = feed_tracing::init_logging().unwrap();

    if let Err(e) = run().await {
        println!("Error: {e}");
        std::process::exit(1);
    }
}

// A simulated function that reports an error is still a successful
// simulation; only a failure of the simulator itself exits non-zero.
async fn run() -> eyre::Result<()> {
    dotenv().ok();

    let secrets = ApiCredentials::from_env()?;
    let config = RequestConfig::balance_feed(secrets);

    let outcome = feed_don::simulate(&config, ALPACA_ACCOUNT_URL).await?;

    if let Some(response) = &outcome.response {
        let decoded = decode_balance(response).wrap_err("response was not a uint256 word")?;
        println!("Response: {decoded}");
    }
    if let Some(error) = &outcome.error {
        eprintln!("Error: {error}");
    }
    if !outcome.captured_output.is_empty() {
        println!("{}", outcome.captured_output);
    }

    Ok(())
}
