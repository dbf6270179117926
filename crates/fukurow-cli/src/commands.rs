//! CLI command definitions and handlers

use crate::snapshot::{parse_individual, Snapshot};
use anyhow::Result;
use clap::{Parser, Subcommand};
use fukurow_core::{AtomicConcept, Role};
use fukurow_dl::{InstanceManager, RealizationConfig};
use fukurow_tableau::EntailmentOracle;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser)]
#[command(name = "fukurow")]
#[command(about = "Instance realization over a completed tableau snapshot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Realization configuration (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Realize every individual and print its direct types and sameAs set
    Realize {
        /// Snapshot file
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Types of one individual
    Types {
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Individual IRI (`_:id` for a blank node)
        #[arg(short, long)]
        individual: String,

        /// Only the most specific types
        #[arg(long)]
        direct: bool,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Instances of one class
    Instances {
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Class IRI
        #[arg(short, long)]
        class: String,

        /// Only instances of no strict subclass
        #[arg(long)]
        direct: bool,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Individuals that denote the same element
    SameAs {
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(short, long)]
        individual: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show system information
    Info,
}

/// Output format options
#[derive(Clone, Debug, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    JsonPretty,
}

/// Command execution result
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Per-individual realization output
#[derive(Debug, Clone, Serialize)]
pub struct IndividualReport {
    pub individual: String,
    pub direct_types: Vec<String>,
    pub same_as: Vec<String>,
    pub relations: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealizationReport {
    pub individuals: Vec<IndividualReport>,
    pub oracle_calls: usize,
}

/// Execute CLI commands
pub struct CommandExecutor {
    config: RealizationConfig,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            config: RealizationConfig::default(),
        }
    }

    pub fn with_config(config: RealizationConfig) -> Self {
        Self { config }
    }

    /// Executor for parsed arguments, loading `--config` if given
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => RealizationConfig::from_path(path)?,
            None => RealizationConfig::default(),
        };
        Ok(Self::with_config(config))
    }

    /// Execute a CLI command
    pub fn execute(&mut self, command: Commands) -> Result<CommandResult> {
        match command {
            Commands::Realize { snapshot, format } => self.execute_realize(snapshot, format),
            Commands::Types { snapshot, individual, direct, format } => {
                self.execute_types(snapshot, individual, direct, format)
            }
            Commands::Instances { snapshot, class, direct, format } => {
                self.execute_instances(snapshot, class, direct, format)
            }
            Commands::SameAs { snapshot, individual, format } => self.execute_same_as(snapshot, individual, format),
            Commands::Info => self.execute_info(),
        }
    }

    fn load(&self, path: &PathBuf) -> Result<(Snapshot, InstanceManager<EntailmentOracle>)> {
        let snapshot = Snapshot::from_path(path)?;
        let manager = snapshot.load_manager(self.config.clone())?;
        Ok((snapshot, manager))
    }

    fn execute_realize(&mut self, path: PathBuf, format: OutputFormat) -> Result<CommandResult> {
        let (snapshot, mut manager) = self.load(&path)?;
        manager.realize()?;
        manager.realize_relations()?;
        manager.compute_same_as_equivalence_classes()?;

        let mut reports = Vec::new();
        for individual in manager.individuals().clone() {
            if !individual.is_result_relevant() {
                continue;
            }
            let direct_types = render_types(&mut manager, &individual)?;
            let same_as = manager
                .same_as_individuals(&individual)?
                .iter()
                .map(|member| member.to_string())
                .collect();
            let mut relations = BTreeMap::new();
            for role in &snapshot.roles {
                let values = manager.relation_values(&Role::atomic(role), &individual)?;
                if !values.is_empty() {
                    relations.insert(role.clone(), values.iter().map(|value| value.to_string()).collect());
                }
            }
            reports.push(IndividualReport {
                individual: individual.to_string(),
                direct_types,
                same_as,
                relations,
            });
        }
        let report = RealizationReport {
            individuals: reports,
            oracle_calls: manager.oracle().call_count(),
        };

        match format {
            OutputFormat::Text => {
                println!("Realized {} individuals ({} oracle calls)", report.individuals.len(), report.oracle_calls);
                for entry in &report.individuals {
                    println!("{}", entry.individual);
                    println!("  types:   {}", entry.direct_types.join(", "));
                    println!("  sameAs:  {}", entry.same_as.join(", "));
                    for (role, values) in &entry.relations {
                        println!("  {} -> {}", role, values.join(", "));
                    }
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
            OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&report)?),
        }

        Ok(CommandResult {
            success: true,
            message: format!("Realized {} individuals", report.individuals.len()),
            data: Some(serde_json::to_value(&report)?),
        })
    }

    fn execute_types(&mut self, path: PathBuf, individual: String, direct: bool, format: OutputFormat) -> Result<CommandResult> {
        let (_, mut manager) = self.load(&path)?;
        let individual = parse_individual(&individual);
        let types: Vec<String> = if direct {
            render_types(&mut manager, &individual)?
        } else {
            manager
                .type_concepts(&individual, false)?
                .into_iter()
                .flatten()
                .map(|concept| concept.to_string())
                .collect()
        };
        print_list(&types, &format)?;

        Ok(CommandResult {
            success: true,
            message: format!("{} types", types.len()),
            data: Some(serde_json::json!({ "individual": individual.to_string(), "types": types })),
        })
    }

    fn execute_instances(&mut self, path: PathBuf, class: String, direct: bool, format: OutputFormat) -> Result<CommandResult> {
        let (_, mut manager) = self.load(&path)?;
        let instances: Vec<String> = manager
            .instances(&AtomicConcept::new(&class), direct)?
            .iter()
            .map(|individual| individual.to_string())
            .collect();
        print_list(&instances, &format)?;

        Ok(CommandResult {
            success: true,
            message: format!("{} instances", instances.len()),
            data: Some(serde_json::json!({ "class": class, "instances": instances })),
        })
    }

    fn execute_same_as(&mut self, path: PathBuf, individual: String, format: OutputFormat) -> Result<CommandResult> {
        let (_, mut manager) = self.load(&path)?;
        let same: Vec<String> = manager
            .same_as_individuals(&parse_individual(&individual))?
            .iter()
            .map(|member| member.to_string())
            .collect();
        print_list(&same, &format)?;

        Ok(CommandResult {
            success: true,
            message: format!("{} individuals", same.len()),
            data: Some(serde_json::json!({ "individual": individual, "same_as": same })),
        })
    }

    fn execute_info(&self) -> Result<CommandResult> {
        println!("Fukurow instance realization v{}", env!("CARGO_PKG_VERSION"));
        println!("  inverse roles:       {}", self.config.uses_inverse_roles);
        println!("  filter internal:     {}", self.config.filter_internal_individuals);
        println!("  eager sameAs:        {}", self.config.eager_same_as);

        Ok(CommandResult {
            success: true,
            message: "System information".to_string(),
            data: Some(serde_json::to_value(&self.config)?),
        })
    }
}

/// Direct types, one entry per node, equivalents joined with `≡`
fn render_types(manager: &mut InstanceManager<EntailmentOracle>, individual: &fukurow_core::Individual) -> Result<Vec<String>> {
    Ok(manager
        .type_concepts(individual, true)?
        .into_iter()
        .map(|equivalents| {
            equivalents
                .iter()
                .map(|concept| concept.to_string())
                .collect::<Vec<_>>()
                .join(" ≡ ")
        })
        .collect())
}

fn print_list(values: &[String], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for value in values {
                println!("{}", value);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(values)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(values)?),
    }
    Ok(())
}
