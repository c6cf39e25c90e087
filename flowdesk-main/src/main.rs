use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use flowdesk_base::logging::{self, LoggingConfig};
use flowdesk_main::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let conf = logging::load_tracing_config_from_env().unwrap_or_else(|_| LoggingConfig {
        level: Some("warn".to_string()),
        ..Default::default()
    });
    logging::tracing_init(conf)?;

    let cli = Cli::parse();
    let output = flowdesk_main::boot(cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
