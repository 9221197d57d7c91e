mod best;
mod check;
mod endpoints;

use tickroute_core::RouteManager;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub fn run(cli: &Cli) -> Result<(), CliError> {
    let manager = build_manager(cli);
    match &cli.command {
        Command::Endpoints(args) => endpoints::run(&manager, args, cli.json),
        Command::Best(args) => best::run(&manager, args, cli.json),
        Command::Check => check::run(cli),
    }
}

fn build_manager(cli: &Cli) -> RouteManager {
    let mut builder = RouteManager::builder();
    if let Some(db) = &cli.db {
        builder = builder.with_store_path(db);
    }
    if let Some(yaml) = &cli.yaml {
        builder = builder.with_yaml(yaml);
    }
    builder.build()
}
