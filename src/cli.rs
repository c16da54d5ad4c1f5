//! Command-line interface
//!
//! A launcher over dataset clusters and adaptation methods, the toy
//! pipeline, and a result-file pretty printer.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::booster::BoosterParams;
use crate::error::Result;
use crate::runner::{cluster_config, launch_parallel, toy_run};
use crate::store::results::ResultStore;
use crate::transport::{AdaptationMethod, Direction};

#[derive(Parser)]
#[command(name = "adaptrank")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Optimal-transport domain adaptation for gradient-boosted ranking")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more dataset clusters with an adaptation method
    Launch {
        /// Cluster index (0-5)
        #[arg(short, long)]
        cluster: usize,

        /// Adaptation method: NA, OT, UOT, JCPOT, reweight_UOT, SA, CORAL, TCA
        #[arg(short, long, default_value = "UOT")]
        method: String,

        /// Rescale features with the source-fitted normalizer
        #[arg(long)]
        rescale: bool,

        /// Also run the true-label upper-bound search (research only)
        #[arg(long)]
        cheat: bool,

        /// Project sources into the target domain instead of the reverse
        #[arg(long)]
        forward: bool,
    },

    /// Run the synthetic toy pipeline
    Toy {
        /// Adaptation method
        #[arg(short, long, default_value = "UOT")]
        method: String,

        /// Base seed
        #[arg(short, long, default_value = "1")]
        seed: u64,
    },

    /// Pretty-print a stored result file
    Show {
        /// Path to a .json.gz result file
        #[arg(short, long)]
        file: PathBuf,
    },
}

pub fn cmd_launch(
    cluster: usize,
    method: &str,
    rescale: bool,
    cheat: bool,
    forward: bool,
) -> Result<()> {
    let method: AdaptationMethod = method.parse()?;
    let mut config = cluster_config(cluster, method, rescale)?;
    config.cv_with_true_labels = cheat;
    if forward {
        config.direction = Direction::SourceToTarget;
    }

    println!(
        "  {} cluster {} with {}",
        "launching".cyan(),
        cluster,
        method.name().white().bold()
    );

    for outcome in launch_parallel(vec![config]) {
        let summary = outcome?;
        println!(
            "  {} {} {} Train AP {:5.2} Test AP {:5.2} Clean AP {:5.2} Target AP {:5.2} {} in {:6.2}s",
            "done".green(),
            summary.dataset,
            summary.method,
            summary.report.train,
            summary.report.test,
            summary.report.clean,
            summary.report.target,
            summary.param_transport,
            summary.elapsed_seconds
        );
        println!(
            "  {} {}",
            "saved".green(),
            summary.output_file.display().to_string().dimmed()
        );
    }
    Ok(())
}

pub fn cmd_toy(method: &str, seed: u64) -> Result<()> {
    let method: AdaptationMethod = method.parse()?;
    let params = BoosterParams {
        num_round: 50,
        max_depth: 3,
        ..Default::default()
    };
    println!("  {} toy pipeline with {}", "running".cyan(), method.name().white().bold());
    let (report, transport) = toy_run(method, Direction::TargetToSource, &params, seed)?;
    println!(
        "  {} Train AP {:5.2} Test AP {:5.2} Clean AP {:5.2} Target AP {:5.2} {}",
        "done".green(),
        report.train,
        report.test,
        report.clean,
        report.target,
        transport
    );
    Ok(())
}

pub fn cmd_show(file: &PathBuf) -> Result<()> {
    let store = ResultStore::load(file)?;
    println!("  {} {}", "data saved in".dimmed(), file.display());
    for line in store.summary() {
        println!("  {line}");
    }
    Ok(())
}
