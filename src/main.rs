//! Benchmark CLI measuring per-phase indexing performance.
//!
//! ```bash
//! axon-bench --repo-path /path/to/repo
//! axon-bench --repo-path /path/to/repo --with-embeddings --json
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use axon::indexing::{run_pipeline, PipelineOptions, PipelineResult};
use axon::storage::GraphStore;
use axon::Settings;

#[derive(Parser)]
#[command(
    name = "axon-bench",
    about = "Benchmark Axon indexing performance on a repository"
)]
struct Args {
    /// Path to the repository to index.
    #[arg(long, value_name = "DIR")]
    repo_path: PathBuf,

    /// Include embedding generation in the benchmark.
    #[arg(long, default_value_t = false)]
    with_embeddings: bool,

    /// Output results as JSON instead of a table.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    axon::logging::init();

    let repo_path = match args.repo_path.canonicalize() {
        Ok(path) if path.is_dir() => path,
        _ => bail!(
            "--repo-path '{}' is not a directory",
            args.repo_path.display()
        ),
    };

    eprintln!("Indexing {} ...", repo_path.display());

    // A throwaway store so the load (and embedding) phases are measured.
    let db_dir = tempfile::TempDir::new().context("Failed to create benchmark store")?;
    let store = Arc::new(
        GraphStore::open(&db_dir.path().join("graph-db"), false)
            .context("Failed to open benchmark store")?,
    );

    let bar = if args.json {
        None
    } else {
        let bar = ProgressBar::new(13);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .expect("static template is valid"),
        );
        Some(bar)
    };
    let progress_bar = bar.clone();

    let options = PipelineOptions {
        // Benchmarks always measure a full pass.
        full: true,
        embeddings: args.with_embeddings,
        wait_embeddings: args.with_embeddings,
        progress: progress_bar.map(|bar| {
            Box::new(move |name: &str, fraction: f64| {
                if fraction >= 1.0 {
                    bar.inc(1);
                }
                bar.set_message(name.to_string());
            }) as Box<dyn Fn(&str, f64) + Send + Sync>
        }),
        embedder: None,
        settings: Arc::new(Settings::load(&repo_path)),
    };

    let (_, result) =
        run_pipeline(&repo_path, Some(store), options).context("Indexing failed")?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    // Phase rows sorted by duration descending, zero-duration dropped.
    let total = result.duration_seconds;
    let mut rows: Vec<(&'static str, f64, f64)> = result
        .phase_timings
        .entries()
        .into_iter()
        .filter(|(_, _, seconds)| *seconds > 0.0)
        .map(|(_, name, seconds)| {
            let pct = if total > 0.0 { seconds / total * 100.0 } else { 0.0 };
            (name, seconds, pct)
        })
        .collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let (bottleneck_name, bottleneck_seconds, bottleneck_pct) =
        rows.first().copied().unwrap_or(("N/A", 0.0, 0.0));

    if args.json {
        let output = json!({
            "repo": repo_path.display().to_string(),
            "files": result.files,
            "symbols": result.symbols,
            "relationships": result.relationships,
            "total_seconds": round3(total),
            "bottleneck_phase": bottleneck_name,
            "bottleneck_seconds": round3(bottleneck_seconds),
            "phases": rows
                .iter()
                .map(|(name, seconds, pct)| {
                    json!({"name": name, "seconds": round3(*seconds), "pct": round1(*pct)})
                })
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_report(&repo_path.display().to_string(), &result, &rows);
    println!(
        "Bottleneck: {bottleneck_name} ({bottleneck_seconds:.2}s, {bottleneck_pct:.1}% of total)"
    );
    Ok(())
}

fn print_report(repo: &str, result: &PipelineResult, rows: &[(&'static str, f64, f64)]) {
    println!();
    println!("AXON BENCHMARK REPORT");
    println!("Repo:      {repo}");
    println!("Files:     {}", result.files);
    println!("Symbols:   {}", result.symbols);
    println!("Relations: {}", result.relationships);
    println!("Total:     {:.2}s", result.duration_seconds);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Phase", "Duration", "%"]);
    for (name, seconds, pct) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{seconds:.2}s")),
            Cell::new(format!("{pct:.1}%")),
        ]);
    }
    println!("{table}");
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
