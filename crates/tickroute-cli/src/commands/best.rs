use tickroute_core::RouteManager;

use crate::cli::BestArgs;
use crate::error::CliError;

pub fn run(manager: &RouteManager, args: &BestArgs, json: bool) -> Result<(), CliError> {
    let Some(best) = manager.best_endpoint(&args.category) else {
        return Err(CliError::Command(format!(
            "no active endpoint found for data category '{}'",
            args.category
        )));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&best)?);
        return Ok(());
    }

    println!(
        "{} (source={}, priority={}, quality={}, health={})",
        best.endpoint_name,
        best.source_name,
        best.priority,
        best.quality_score,
        best.health_status,
    );
    Ok(())
}
