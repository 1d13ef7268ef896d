use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "jsonpbox")]
#[command(about = "JSONP fetch client and test endpoint", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a JSONP URL and print the delivered payload
    Fetch(FetchArgs),
    /// Run the JSONP test server
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// URL with a JSONP_CALLBACK placeholder, e.g. `http://host/api?callback=JSONP_CALLBACK`
    pub url: String,

    /// Give up after this many milliseconds (defaults to `fetch.timeout_ms`)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the JSONP server to (defaults to `server.bind_addr`)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
