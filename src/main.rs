mod app;
mod cli;
mod db;
mod http;
mod paths;
mod settings;
mod source;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli)
}
