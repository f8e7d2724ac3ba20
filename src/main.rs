use clap::Parser;
use lunatask_mcp::Cli;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    // Display only: some error sources carry request or file content in Debug.
    lunatask_mcp::run(cli)
        .await
        .map_err(|err| err.to_string().into())
}
