use anyhow::{Result, bail};
use clap::Parser;
use class_index::cli::{Cli, Commands};
use class_index::config::{
    IndexConfig, resolve_classpath, resolve_java_path, resolve_javap_path, resolve_root,
};
use class_index::index::ClassIndex;
use class_index::javap::Javap;
use class_index::locate::JavaRuntimeLocator;
use class_index::model::ClassDescriptor;
use class_index::refresh::{RefreshCoordinator, RefreshOutcome, RefreshReport, StaticClasspath};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct ClassHit {
    class_name: String,
    simple_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    superclass_name: Option<String>,
    origin: class_index::model::Origin,
    last_used: u64,
}

impl From<&ClassDescriptor> for ClassHit {
    fn from(class: &ClassDescriptor) -> Self {
        Self {
            class_name: class.class_name.clone(),
            simple_name: class.simple_name.clone(),
            superclass_name: class.superclass_name.clone(),
            origin: class.origin,
            last_used: class.last_used.get(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Stats {
    classes: usize,
    categories: usize,
    refresh: RefreshReport,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let coordinator = build_coordinator(&cli);
    let report = refresh(&cli, &coordinator)?;
    let index = coordinator.index();

    match cli.command.clone() {
        Commands::Classes { prefix, limit } => {
            let hits: Vec<ClassHit> = index
                .find_class(&prefix)
                .iter()
                .take(limit)
                .map(|c| ClassHit::from(c.as_ref()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
        Commands::Members { class_name, prefix } => {
            let members = index.find_class_member(&class_name, &prefix);
            println!("{}", serde_json::to_string_pretty(&members)?);
        }
        Commands::Superclass { class_name } => {
            let superclass = index.find_superclass_name(&class_name);
            println!("{}", serde_json::to_string_pretty(&superclass)?);
        }
        Commands::Stats => {
            let stats = Stats {
                classes: index.class_count(),
                categories: index.category_count(),
                refresh: report,
            };
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn build_coordinator(cli: &Cli) -> RefreshCoordinator {
    RefreshCoordinator::new(
        Arc::new(ClassIndex::new()),
        Arc::new(Javap::new(resolve_javap_path(cli))),
        Arc::new(JavaRuntimeLocator::from_env(resolve_java_path())),
        IndexConfig::from_cli(cli),
    )
}

fn refresh(cli: &Cli, coordinator: &RefreshCoordinator) -> Result<RefreshReport> {
    let root = resolve_root(cli)?;
    let source = StaticClasspath::new(resolve_classpath(cli, &root), cli.wants_members());

    match coordinator.refresh_from(&source, !cli.no_system)? {
        RefreshOutcome::Completed(report) => Ok(report),
        RefreshOutcome::Declined => bail!("No classpath given: pass --classpath or set CLASSPATH"),
    }
}
