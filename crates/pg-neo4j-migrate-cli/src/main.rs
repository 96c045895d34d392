//! pg-neo4j-migrate CLI - schema-inferring migration between PostgreSQL
//! and Neo4j.
//!
//! A thin shell: argument parsing, config loading and logging setup. All
//! migration logic lives in the library.

use clap::{Parser, Subcommand};
use pg_neo4j_migrate::{Config, MigrateError, Orchestrator, RelationalConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "pg-neo4j-migrate")]
#[command(about = "Schema-inferring migration between PostgreSQL and Neo4j")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the relational database into the graph store
    Export,

    /// Import the graph store into the relational database
    Import,

    /// Print the relation matrix and per-table cardinality summary
    Matrix,

    /// Compare the configured relational store against another one
    Compare {
        /// YAML file with the candidate store's connection parameters
        #[arg(long)]
        candidate: PathBuf,
    },

    /// Test both store connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();
    setup_logging(&cli.verbosity, &cli.log_format);

    let config = Config::load(&cli.config)?;
    let orchestrator = Orchestrator::new(config).await?;

    match cli.command {
        Commands::Export => {
            let result = orchestrator.run_export().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Export {} finished in {:.1}s: {} nodes, {} relationships, {} constraints",
                    result.run_id,
                    result.duration_seconds,
                    result.report.nodes_created,
                    result.report.relationships_created,
                    result.report.constraints_applied,
                );
                for skipped in &result.report.skipped {
                    println!("  skipped {}: {}", skipped.table, skipped.reason);
                }
                for unsupported in &result.report.unsupported_constraints {
                    println!(
                        "  unsupported {} on {}: {}",
                        unsupported.kind, unsupported.table, unsupported.detail
                    );
                }
            }
        }
        Commands::Import => {
            let result = orchestrator.run_import().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "Import {} finished in {:.1}s: {} tables, {} rows, {} foreign keys, {} association tables",
                    result.run_id,
                    result.duration_seconds,
                    result.report.tables_created,
                    result.report.rows_inserted,
                    result.report.foreign_keys_created,
                    result.report.association_tables_created,
                );
                for skipped in &result.report.skipped {
                    println!("  skipped {}: {}", skipped.table, skipped.reason);
                }
            }
        }
        Commands::Matrix => {
            let summary = orchestrator.relation_summary().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                for (table, class) in &summary.classes {
                    println!("{}: {:?}", table, class);
                }
                for relation in &summary.relations {
                    println!(
                        "{} -> {} via {} ({:?})",
                        relation.table, relation.target, relation.join_column, relation.cardinality
                    );
                }
                for skipped in &summary.skipped {
                    println!("skipped {}: {}", skipped.table, skipped.reason);
                }
            }
        }
        Commands::Compare { candidate } => {
            let raw = std::fs::read_to_string(&candidate)?;
            let candidate_config: RelationalConfig = serde_yaml::from_str(&raw)?;
            let report = orchestrator.compare_with(&candidate_config).await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("identical: {}", report.identical);
                for table in &report.missing_in_candidate {
                    println!("  missing in candidate: {}", table);
                }
                for table in &report.extra_in_candidate {
                    println!("  extra in candidate: {}", table);
                }
                for table in &report.tables {
                    if !table.identical {
                        println!(
                            "  {}: {} vs {} rows, {} mismatched, {:?}",
                            table.table,
                            table.baseline_rows,
                            table.candidate_rows,
                            table.mismatched_rows,
                            table.column_diffs
                        );
                    }
                }
            }
        }
        Commands::HealthCheck => {
            orchestrator.health_check().await?;
            println!("OK");
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
