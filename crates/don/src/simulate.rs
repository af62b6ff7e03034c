//! Local simulation of the balance function, mirroring the result shape of
//! the remote execution environment.

use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
};

use feed_config::RequestConfig;
use tracing::instrument::WithSubscriber;

/// What a simulation run produced.
///
/// A failure inside the simulated function lands in [`Self::error`]; the
/// simulation itself still completed.
#[derive(Debug)]
pub struct SimulationOutcome {
    /// ABI-encoded response bytes, when the function returned.
    pub response: Option<Vec<u8>>,
    /// Error reported by the function, when it failed.
    pub error: Option<String>,
    /// Diagnostic output captured during the run.
    pub captured_output: String,
}

#[derive(Clone, Default)]
struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    fn contents(&self) -> Result<String, std::string::FromUtf8Error> {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        String::from_utf8(bytes)
    }
}

impl io::Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Execute the function described by `config` locally against `endpoint`,
/// without contacting the remote execution network.
///
/// Returns `Err` only when the simulation facility itself fails; an error
/// reported by the function is part of the [`SimulationOutcome`].
pub async fn simulate(config: &RequestConfig, endpoint: &str) -> eyre::Result<SimulationOutcome> {
    let buffer = CaptureBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer({
            let buffer = buffer.clone();
            move || buffer.clone()
        })
        .finish();

    let client = reqwest::Client::new();
    let outcome = feed_function::run(&client, endpoint, &config.secrets)
        .with_subscriber(subscriber)
        .await;

    let captured_output = buffer.contents()?;

    Ok(match outcome {
        Ok(response) => {
            SimulationOutcome { response: Some(response), error: None, captured_output }
        }
        Err(e) => SimulationOutcome { response: None, error: Some(e.to_string()), captured_output },
    })
}
