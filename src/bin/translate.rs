//! One-shot translation from the command line
//!
//! Usage:
//!   cargo run --bin translate -- English Hindi "Do you have a fever?"
//!   cargo run --bin translate -- Hindi English "मुझे बुखार है"
//!
//! Uses GEMINI_API_KEY when set; without it (or when the provider cannot be
//! reached) the offline phrase table answers, and the provenance line shows
//! which path was taken.
//!
//! Optional:
//! - GEMINI_API_URL
//! - GEMINI_TIMEOUT_SECS (defaults to 10)

use anyhow::{bail, Result};
use clinical_bridge::{
    config::Config,
    gemini::GeminiClient,
    translation::{TranslationService, Utterance},
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinical_bridge=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("Usage: translate <source-language> <target-language> <text...>");
    }

    let config = Config::from_env()?;
    let service = TranslationService::new(GeminiClient::new(&config)?);

    let utterance = Utterance::new(args[2..].join(" "), args[0].as_str(), args[1].as_str());
    let result = service.translate_detailed(&utterance).await;

    println!("{}", result.text);
    eprintln!("provenance: {:?}", result.provenance);
    Ok(())
}
