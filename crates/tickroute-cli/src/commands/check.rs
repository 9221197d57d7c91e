use std::collections::BTreeMap;

use serde::Serialize;
use tickroute_core::{ConfigStore, EndpointRegistry};

use crate::cli::Cli;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct CheckReport {
    db_endpoints: usize,
    yaml_endpoints: usize,
    merged_endpoints: usize,
    categories: BTreeMap<String, usize>,
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.db.is_none() && cli.yaml.is_none() {
        return Err(CliError::Command(String::from(
            "nothing to check: pass --db and/or --yaml",
        )));
    }

    let db = match &cli.db {
        Some(path) => match ConfigStore::open(path) {
            Ok(store) => EndpointRegistry::load_from_store(&store),
            Err(error) => {
                eprintln!("warning: config store unavailable: {error}");
                Default::default()
            }
        },
        None => Default::default(),
    };
    let yaml = match &cli.yaml {
        Some(path) => EndpointRegistry::load_from_yaml(path),
        None => Default::default(),
    };

    let report = {
        let db_endpoints = db.len();
        let yaml_endpoints = yaml.len();
        let merged = EndpointRegistry::merge(db, yaml);

        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for config in merged.values() {
            *categories.entry(config.data_category.clone()).or_default() += 1;
        }

        CheckReport {
            db_endpoints,
            yaml_endpoints,
            merged_endpoints: merged.len(),
            categories,
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("db endpoints:     {}", report.db_endpoints);
    println!("yaml endpoints:   {}", report.yaml_endpoints);
    println!("merged endpoints: {}", report.merged_endpoints);
    for (category, count) in &report.categories {
        println!("  {category}: {count}");
    }
    Ok(())
}
