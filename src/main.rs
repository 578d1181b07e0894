use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};

use judge_engine::{EngineConfig, ExecutionRequest, HealthProber, JudgeEngine};

/// Exit status for requests rejected by validation
const EXIT_INVALID_REQUEST: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judge_engine=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = EngineConfig::load()?;
    info!("Scratch root: {}", config.scratch_root.display());

    let engine = JudgeEngine::new(config).context("Failed to initialize judge engine")?;

    let arg = std::env::args().nth(1);
    match arg.as_deref() {
        Some("health") => {
            let healthy = HealthProber::new(&engine).probe().await;
            Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        path => judge(&engine, path).await,
    }
}

async fn judge(engine: &JudgeEngine, path: Option<&str>) -> Result<ExitCode> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read request file {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    let request: ExecutionRequest =
        serde_json::from_str(&raw).context("Failed to parse execution request")?;

    match engine.execute(&request).await {
        Ok(results) => {
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Rejected request: {}", e);
            let body = serde_json::json!({ "error": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::from(EXIT_INVALID_REQUEST))
        }
    }
}
