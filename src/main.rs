mod cli;

use clap::Parser;
use cli::{Cli, Commands, FetchArgs};
use jsonpbox::config::Config;
use jsonpbox::host::native::HttpScriptHost;
use jsonpbox::{JsonpBackend, Request};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    jsonpbox::observability::init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Fetch(args) => fetch(&config, args).await?,
        Commands::Serve(args) => {
            let address = args.address.unwrap_or(config.server.bind_addr);
            jsonpbox::server::run(address).await?
        }
    }

    Ok(())
}

async fn fetch(config: &Config, args: FetchArgs) -> Result<(), AnyError> {
    let host = Arc::new(HttpScriptHost::new(&config.host)?);
    let backend = JsonpBackend::from_config(host, config);

    let connection = backend.create_connection(Request::get(args.url))?;
    let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(config.fetch.timeout_ms));

    // Dropping the subscription on timeout cancels the fetch
    let response = tokio::time::timeout(timeout, connection.subscribe()?)
        .await
        .map_err(|_| format!("no response within {}ms", timeout.as_millis()))??;

    info!(status = response.status, "Fetch completed");
    let body = response.body.unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(())
}
