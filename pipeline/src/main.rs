use anyhow::Context;
use clap::Parser;
use export::Exporter;
use std::path::PathBuf;
use wifimapcore::processing::{TargetMonth, WindowSpec};
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod export;
mod ingest;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Places campus Wi-Fi usage logs on the map and exports monthly tables")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Directory the input paths are relative to
    #[arg(long)]
    root: Option<PathBuf>,
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Deduplication window, e.g. 1D, 6H, 15min
    #[arg(long)]
    window: Option<String>,
    #[arg(long)]
    target_year: Option<i32>,
    #[arg(long)]
    target_month: Option<u32>,
    /// Validate and process without writing any output
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Args {
    fn apply(&self, config: &mut WorkflowConfig) -> anyhow::Result<()> {
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir = out_dir.clone();
        }
        if let Some(window) = &self.window {
            config.window = WindowSpec::parse(window).context("parsing --window")?;
        }
        if self.target_year.is_some() || self.target_month.is_some() {
            config.target = TargetMonth::new(
                self.target_year.unwrap_or(config.target.year),
                self.target_month.unwrap_or(config.target.month),
            )
            .context("parsing --target-year/--target-month")?;
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::default()
    };
    args.apply(&mut workflow_config)?;

    let runner = Runner::new(workflow_config.clone());
    let result = runner.execute()?;

    for run in &result.campuses {
        let placed = &run.counts.placed;
        println!(
            "{} -> rows {} (dropped {}), gps {}, rssi {}, floor_only {}, unplaced {}, dedup {}",
            run.label,
            run.counts.valid,
            run.counts.dropped,
            placed.gps,
            placed.rssi,
            placed.floor_only,
            placed.unplaced,
            run.deduplicated.len()
        );
    }
    for totals in &result.totals {
        println!(
            "{} totals -> users {}, connections {}, duration {:.0}s",
            totals.campus, totals.user_count, totals.wifi_conn, totals.duration_sec
        );
    }

    if args.dry_run {
        println!("Dry run: nothing written.");
        return Ok(());
    }

    let exporter = Exporter::new(workflow_config.output_dir());
    let written = exporter.write_all(&workflow_config, &result)?;
    println!(
        "Wrote {} files to {}",
        written.len(),
        exporter.out_dir().display()
    );

    Ok(())
}
