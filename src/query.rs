//! `chatmem query`: retrieve a short, de-duplicated context for a text.

use anyhow::{Context, Result};
use serde::Serialize;

use chatmem_core::models::SelectedHit;
use chatmem_core::query::{run_query, QueryOptions};

use crate::config::Config;
use crate::vector_client::RecordsClient;

/// Command-line overrides for one query.
#[derive(Debug, Default)]
pub struct QueryArgs {
    pub top_k: Option<usize>,
    pub rmin: Option<usize>,
    pub rmax: Option<usize>,
    pub rerank: bool,
    pub filter: Option<String>,
    pub json: bool,
}

#[derive(Serialize)]
struct QueryOutput<'a> {
    query: &'a str,
    raw_hits: usize,
    hits: &'a [SelectedHit],
}

/// Merge config defaults with command-line overrides.
pub fn build_options(config: &Config, args: &QueryArgs) -> Result<QueryOptions> {
    let retrieval = &config.retrieval;
    let mut select = config.select_params();
    if let Some(rmin) = args.rmin {
        select.rmin = rmin;
    }
    if let Some(rmax) = args.rmax {
        select.rmax = rmax;
    }
    if select.rmin > select.rmax {
        anyhow::bail!("--rmin ({}) must be <= --rmax ({})", select.rmin, select.rmax);
    }

    let filter = args
        .filter
        .as_deref()
        .map(|f| serde_json::from_str::<serde_json::Value>(f).with_context(|| "Invalid --filter JSON"))
        .transpose()?;

    Ok(QueryOptions {
        namespace: config.vector_store.namespace.clone(),
        top_k: args.top_k.unwrap_or(retrieval.top_k).max(1),
        filter,
        rerank_model: (args.rerank || retrieval.rerank).then(|| retrieval.rerank_model.clone()),
        select,
    })
}

pub async fn run_query_cmd(config: &Config, text: &str, args: &QueryArgs) -> Result<()> {
    let opts = build_options(config, args)?;
    let client = RecordsClient::from_config(&config.vector_store)?;
    let report = run_query(&client, text, &opts).await?;

    if args.json {
        let output = QueryOutput {
            query: text,
            raw_hits: report.raw_hits,
            hits: &report.hits,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if report.hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, selected) in report.hits.iter().enumerate() {
        let hit = &selected.hit;
        let fields = &hit.fields;
        println!(
            "{}. [{:.2}] {} (raw {:.3})",
            i + 1,
            selected.composite_score,
            hit.id,
            hit.raw_score
        );
        if let Some(ts) = fields.start_timestamp.as_deref().or(fields.timestamp.as_deref()) {
            println!("    start: {}", ts);
        }
        if let Some(session) = &fields.session_id {
            println!("    session: {}", session);
        }
        for line in fields.text.as_deref().unwrap_or("").lines() {
            println!("    | {}", line);
        }
        println!();
    }
    Ok(())
}
