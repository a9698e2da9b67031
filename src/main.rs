use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;

use cleanup_refiner::api::cleanup_config_dto::CleanupConfigDto;
use cleanup_refiner::domain::cleanup::report::CleanupReport;
use cleanup_refiner::loader::parser::write_json_file;
use cleanup_refiner::{load_config, load_workflow, logger, refine_workflow};

#[derive(Debug, Parser)]
#[command(name = "cleanup-refiner")]
#[command(about = "Adds in-place cleanup jobs to a workflow DAG", long_about = None)]
struct Cli {
    /// Workflow JSON file
    #[arg(short, long)]
    workflow: PathBuf,

    /// Cleanup configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the refined workflow
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Where to write the file -> cleanup job list as CSV
    #[arg(long)]
    cleanup_list: Option<PathBuf>,

    /// Maximum number of cleanup jobs per level
    #[arg(long)]
    clusters_num: Option<usize>,

    /// Number of cleanup candidates per cleanup job, wins over --clusters-num
    #[arg(long)]
    clusters_size: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init();

    let mut config = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => CleanupConfigDto::default(),
    };
    if cli.clusters_num.is_some() {
        config.clusters_num = cli.clusters_num;
    }
    if cli.clusters_size.is_some() {
        config.clusters_size = cli.clusters_size;
    }

    let mut workflow = load_workflow(&cli.workflow).with_context(|| format!("Failed to load workflow '{}'", cli.workflow.display()))?;
    let report = refine_workflow(&mut workflow, &config).with_context(|| format!("Failed to add cleanup jobs to workflow {}", workflow.id))?;

    if let Some(path) = &cli.output {
        write_json_file(path, &workflow.to_dto()).with_context(|| format!("Failed to write workflow '{}'", path.display()))?;
        log::info!("Refined workflow written to '{}'.", path.display());
    }
    if let Some(path) = &cli.cleanup_list {
        report.write_cleanup_list(path).with_context(|| format!("Failed to write cleanup list '{}'", path.display()))?;
        log::info!("Cleanup list written to '{}'.", path.display());
    }

    print_summary(&report);

    Ok(())
}

fn print_summary(report: &CleanupReport) {
    println!("{}", "Cleanup summary".bold());
    println!("  maximum depth:       {}", report.max_depth);
    println!("  retained files:      {}", report.retained_files);
    println!("  cleanup category:    maxjobs {}", report.cleanup_category_max_jobs);

    for site in &report.sites {
        println!(
            "  {} {} jobs, {} cleanup jobs, {} files, {} edges removed",
            format!("[{}]", site.site).cyan(),
            site.jobs,
            site.cleanup_jobs.len().to_string().green(),
            site.cleaned_files.len(),
            site.removed_edges
        );
        for level in &site.levels {
            println!("      level {:>3}: {} candidates -> {} cleanup jobs", level.level, level.candidates, level.cleanup_jobs);
        }
    }

    println!(
        "{} {} cleanup jobs deleting {} files",
        "Total:".bold(),
        report.cleanup_job_count().to_string().green().bold(),
        report.cleaned_file_count()
    );
}
