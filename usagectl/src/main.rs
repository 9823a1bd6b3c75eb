use clap::{CommandFactory, Parser};
use usagectl::{Config, cli, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before anything else that might build a TLS client
    usagectl::install_crypto_provider();

    // Parse CLI args
    let args = usagectl::config::Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    let Some(command) = args.command.clone() else {
        usagectl::config::Args::command().print_help()?;
        return Ok(());
    };

    // Initialize telemetry (tracing + optional OpenTelemetry)
    telemetry::init_telemetry(config.enable_otel_export)?;

    tracing::debug!("{:?}", args);

    let result = cli::run(command, &config).await;
    telemetry::shutdown_telemetry();
    result
}
