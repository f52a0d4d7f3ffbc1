//! Proxy Node Selector - CLI entry point

use clap::Parser;
use proxy_node_selector::{app::App, cli::Cli, error::AppError};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let use_color = !cli.no_color;

    if let Err(error) = run(cli).await {
        match error.downcast_ref::<AppError>() {
            Some(app_error) => {
                eprintln!("{}", app_error.format_for_console(use_color));
                process::exit(app_error.exit_code());
            }
            None => {
                eprintln!("Error: {:#}", error);
                process::exit(1);
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    App::new(cli)?.run().await?;
    Ok(())
}
