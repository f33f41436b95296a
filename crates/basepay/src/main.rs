//! basepay: connect to a Base wallet and submit one-shot payments from the command line.

use clap::Parser;

use basepay_adapters::ConnectorConfig;

mod cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    let config = ConnectorConfig::from_env();
    tracing::info!(
        profile = ?config.runtime_profile,
        proxy = config.eip1193_proxy_url.is_some(),
        "Starting basepay"
    );

    let output = cli::run(args.command, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
