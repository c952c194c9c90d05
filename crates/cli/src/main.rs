//! gnnlaunch CLI - launch conversion and training scripts, locally or via SLURM

mod logging;
mod run;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;

use gnnlaunch_core::application::LaunchService;
use gnnlaunch_core::domain::job_script::{apply_settings, render_job_script, splice_command};
use gnnlaunch_core::domain::{ConversionRequest, GnnModel, Settings, TrainingRequest};
use gnnlaunch_core::port::time_provider::SystemTimeProvider;
use gnnlaunch_core::port::SettingsRepository;
use gnnlaunch_infra_config::{set_value, FileSettingsRepository};
use gnnlaunch_infra_system::{FsJobScriptStore, SbatchSubmitter, ShellExecutor};

#[derive(Parser)]
#[command(name = "gnnlaunch")]
#[command(about = "Launch GNN data conversion and training scripts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: platform config directory)
    #[arg(long, global = true, env = "GNNLAUNCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format on stderr
    #[arg(
        long,
        global = true,
        env = "GNNLAUNCH_LOG_FORMAT",
        default_value = "pretty",
        value_parser = ["pretty", "json"]
    )]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert connectivity matrices into a graph dataset (runs locally)
    Convert {
        /// Conversion script (default: conversion.script_path)
        #[arg(long)]
        script: Option<String>,

        /// Matrix file, repeatable
        #[arg(short, long = "input")]
        inputs: Vec<PathBuf>,

        /// Directory whose .mat/.safetensors files are added, repeatable
        #[arg(long = "input-dir")]
        input_dirs: Vec<PathBuf>,

        /// Label file
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Output directory (default: workspace_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Argument template (default: conversion.default_args)
        #[arg(long = "args", allow_hyphen_values = true)]
        args_template: Option<String>,
    },

    /// Train a model, locally or as a SLURM job
    Train {
        /// Training script (default: training.script_path)
        #[arg(long)]
        script: Option<String>,

        /// Converted dataset directory
        #[arg(short, long)]
        dataset_dir: String,

        /// GCN, GAT, GATv2, GraphSAGE or GTransformer
        #[arg(short, long, default_value = "GCN")]
        model: GnnModel,

        /// Argument template (default: training.default_args)
        #[arg(long = "args", allow_hyphen_values = true)]
        args_template: Option<String>,

        /// Submit through sbatch
        #[arg(long, conflicts_with = "local")]
        slurm: bool,

        /// Run on this machine even if slurm.use_slurm_by_default is set
        #[arg(long)]
        local: bool,

        /// Existing job script whose command line is replaced
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Job script helpers
    Script {
        #[command(subcommand)]
        command: ScriptCommands,
    },

    /// Submit an existing job script with sbatch
    Submit {
        script: PathBuf,
    },

    /// Inspect or edit settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// List supported models
    Models,
}

#[derive(Subcommand)]
enum ScriptCommands {
    /// Print (or store with --write) the job script for a command
    Render {
        /// Command line the job runs
        #[arg(long, allow_hyphen_values = true)]
        command: String,

        /// Existing job script to adapt instead of a fresh header
        #[arg(long)]
        template: Option<PathBuf>,

        /// Write into jobs_dir instead of printing
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show all settings
    Show,
    /// Print the settings file location
    Path,
    /// Write the default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set one value, e.g. `slurm.partition gpu`
    Set { key: String, value: String },
}

#[derive(Tabled)]
struct SettingRow {
    key: String,
    value: String,
}

#[derive(Tabled)]
struct ModelRow {
    model: &'static str,
    default: &'static str,
}

/// Flatten settings into dotted keys, the form `config set` accepts
fn setting_rows(settings: &Settings) -> Result<Vec<SettingRow>> {
    fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<SettingRow>) {
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    walk(&key, v, out);
                }
            }
            serde_json::Value::String(s) => out.push(SettingRow {
                key: prefix.to_string(),
                value: s.clone(),
            }),
            other => out.push(SettingRow {
                key: prefix.to_string(),
                value: other.to_string(),
            }),
        }
    }

    let mut rows = Vec::new();
    walk("", &serde_json::to_value(settings)?, &mut rows);
    Ok(rows)
}

fn build_service(settings: Settings) -> LaunchService {
    let time_provider = Arc::new(SystemTimeProvider);
    let runner = Arc::new(ShellExecutor::new(time_provider.clone()));
    let scripts = Arc::new(FsJobScriptStore::new(settings.jobs_dir.clone()));
    LaunchService::new(
        settings,
        runner,
        Arc::new(SbatchSubmitter::new()),
        scripts,
        time_provider,
    )
}

fn or_configured(value: Option<String>, configured: &str) -> String {
    value
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Load settings (creates the file and directories on first use)
    let repo = FileSettingsRepository::discover(cli.config.clone());
    let settings = repo.load().context("Failed to load settings")?;

    // 2. Initialize logging
    let _log_guard = logging::init(&cli.log_format, Some(&settings.logs_dir))?;
    info!(
        version = gnnlaunch_core::VERSION,
        config = %repo.location().display(),
        "gnnlaunch starting"
    );

    match cli.command {
        Commands::Convert {
            script,
            mut inputs,
            input_dirs,
            labels,
            output_dir,
            args_template,
        } => {
            inputs.extend(input_dirs);
            let req = ConversionRequest {
                script: or_configured(script, &settings.conversion.script_path),
                inputs,
                labels,
                output_dir,
                args_template,
            };
            let service = build_service(settings);
            let plan = service.plan_conversion(&req)?;
            run::launch(plan.command(), |sink, token| async move {
                service.convert(&req, sink, token).await
            })
            .await
            .map(ExitCode::from)
        }

        Commands::Train {
            script,
            dataset_dir,
            model,
            args_template,
            slurm,
            local,
            template,
        } => {
            let mut req = TrainingRequest::new(
                or_configured(script, &settings.training.script_path),
                dataset_dir,
                model,
            );
            req.args_template = args_template;
            req.use_slurm = match (slurm, local) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            req.sbatch_template = template;

            let service = build_service(settings);
            let plan = service.plan_training(&req)?;
            run::launch(plan.command(), |sink, token| async move {
                service.train(&req, sink, token).await
            })
            .await
            .map(ExitCode::from)
        }

        Commands::Script {
            command: ScriptCommands::Render {
                command,
                template,
                write,
            },
        } => {
            if write {
                let service = build_service(settings);
                let path = service.prepare_job_script(&command, template.as_deref())?;
                println!("{} {}", "✓ Job script written:".green().bold(), path.display());
            } else {
                let script = match template {
                    Some(path) => {
                        let text = std::fs::read_to_string(&path)
                            .with_context(|| format!("Failed to read {}", path.display()))?;
                        apply_settings(&splice_command(&text, &command), &settings.slurm)?
                    }
                    None => render_job_script(&command, &settings.slurm),
                };
                print!("{script}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Submit { script } => {
            if !script.is_file() {
                bail!("No such job script: {}", script.display());
            }
            let service = build_service(settings);
            let submission = service.submit_script(&script).await?;
            Ok(ExitCode::from(run::report_submission(&script, &submission)))
        }

        Commands::Config { command } => {
            match command {
                ConfigCommands::Show => {
                    println!(
                        "{} {}",
                        "Settings:".cyan().bold(),
                        repo.location().display()
                    );
                    println!("{}", Table::new(setting_rows(&settings)?));
                }
                ConfigCommands::Path => println!("{}", repo.location().display()),
                ConfigCommands::Init { force } => {
                    // `load` above already wrote defaults for a missing file
                    if force {
                        repo.save(repo.defaults())?;
                        println!("{}", "✓ Settings reset to defaults".green().bold());
                    } else {
                        println!(
                            "{} {}",
                            "Settings file:".bold(),
                            repo.location().display()
                        );
                    }
                }
                ConfigCommands::Set { key, value } => {
                    let updated = set_value(&settings, &key, &value)?;
                    repo.save(&updated)?;
                    println!("{}", format!("✓ {key} = {value}").green().bold());
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Models => {
            let rows = GnnModel::ALL.iter().map(|m| ModelRow {
                model: m.as_str(),
                default: if *m == GnnModel::Gcn { "*" } else { "" },
            });
            println!("{}", Table::new(rows));
            Ok(ExitCode::SUCCESS)
        }
    }
}
