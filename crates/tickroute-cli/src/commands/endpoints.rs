use tickroute_core::{EndpointSummary, RouteManager};

use crate::cli::EndpointsArgs;
use crate::error::CliError;

pub fn run(manager: &RouteManager, args: &EndpointsArgs, json: bool) -> Result<(), CliError> {
    let rows = manager
        .list_endpoints()
        .into_iter()
        .filter(|row| matches(row, args))
        .collect::<Vec<_>>();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("no endpoints match");
        return Ok(());
    }

    println!(
        "{:<28} {:<10} {:<18} {:>4} {:>4} {:<8} {:<8} {:>6} {:>8} {:>5}",
        "ENDPOINT", "SOURCE", "CATEGORY", "PRIO", "QUAL", "STATUS", "HEALTH", "SUCC%", "AVG_MS", "FAILS"
    );
    for row in rows {
        println!(
            "{:<28} {:<10} {:<18} {:>4} {:>4} {:<8} {:<8} {:>5.1}% {:>8.1} {:>5}",
            row.endpoint_name,
            row.source_name,
            row.data_category,
            row.priority,
            row.quality_score,
            row.status,
            row.health_status,
            row.success_rate * 100.0,
            row.avg_response_time_ms,
            row.consecutive_failures,
        );
    }
    Ok(())
}

fn matches(row: &EndpointSummary, args: &EndpointsArgs) -> bool {
    if let Some(category) = &args.category {
        if &row.data_category != category {
            return false;
        }
    }
    if let Some(source) = &args.source {
        if &row.source_name != source {
            return false;
        }
    }
    if !args.include_unhealthy && row.health_status == "failed" {
        return false;
    }
    true
}
