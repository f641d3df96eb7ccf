use clap::Parser;
use cli::{Args, Command};
use config::Config;
use deployment::DeploymentContext;
use error::DeploymentError;
use indicatif::ProgressStyle;
use report::Outcome;
use tracing_error::ErrorLayer;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

mod abis;
mod artifact;
mod cli;
mod config;
mod deployment;
mod error;
mod ethers_utils;
mod forge_utils;
mod report;
mod serde_utils;
mod token;
mod types;
mod units;

async fn start() -> Result<Outcome, DeploymentError> {
    let mut args = Args::parse();

    let config = Config::load(args.config.as_deref()).await?;

    match args.command.take() {
        None => {
            let context = DeploymentContext::new(args, &config)?;
            let deployer = context.deployer().await?;

            deployment::run_deployment(&context, &deployer)
                .await
                .map(Outcome::Deployed)
        }
        Some(Command::Transfer(cmd)) => token::transfer(&args, &config, cmd)
            .await
            .map(Outcome::Transferred),
        Some(Command::ScanTransfers(cmd)) => token::scan(&args, &config, cmd)
            .await
            .map(Outcome::Scanned),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    dotenv::dotenv().ok();

    let indicatif_layer = IndicatifLayer::new().with_progress_style(
        ProgressStyle::with_template(concat!(
            "{span_child_prefix}{spinner:.green} ",
            "{span_name}{{{span_fields}}} {elapsed}",
        ))?,
    );

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(indicatif_layer.get_stderr_writer())
                .with_filter(filter),
        )
        .with(indicatif_layer)
        .with(ErrorLayer::default())
        .init();

    let outcome = start().await;

    let code = report::finish(
        outcome,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    );

    std::process::exit(code)
}
