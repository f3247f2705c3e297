//! Tether CLI - run event payloads against a store from the command line
//!
//! Loads an instance store from a file, registers the built-in handlers,
//! dispatches a payload and prints every change notification.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tether::runtime::storage::{
    DirectorySource, STORE_FILE_EXTENSION, load_config, write_atomic, write_config,
};
use tether::{InstanceId, Runtime, RuntimeConfig, UiEvent};

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Reactive event dispatch for UI instance stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch an event payload against a store file
    Dispatch {
        /// Store file (`<name>.json`, a JSON object)
        #[arg(long)]
        store: PathBuf,

        /// Runtime configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Instance id
        #[arg(long, default_value = "main")]
        instance: String,

        /// Serialized action list
        #[arg(long)]
        payload: String,

        /// Event kind reported to the runtime
        #[arg(long, default_value = "click")]
        event: String,

        /// Write the final store back to the store file
        #[arg(long)]
        write: bool,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dispatch {
            store,
            config,
            instance,
            payload,
            event,
            write,
        } => {
            let config = match &config {
                Some(path) => load_config(path)?,
                None => RuntimeConfig::default(),
            };
            let runtime = Runtime::new(config)?;
            runtime.register_builtins();

            let (dir, element) = split_store_path(&store)?;
            let source = DirectorySource::new(dir);
            let instance = InstanceId::new(instance);
            if !runtime.init_instance(instance.clone(), &source, &element)? {
                anyhow::bail!("Store file {:?} not found", store);
            }
            if runtime.store(&instance).is_some_and(|loaded| loaded.is_empty()) {
                tracing::warn!(store = ?store, "Store file holds an empty object");
            }

            runtime.on_change(instance.clone(), |id, snapshot| {
                println!("change {}: {}", id, snapshot);
            });

            let report = runtime.handle_event(&UiEvent::new(event), &instance, &payload, None)?;
            for outcome in report.failures() {
                if let Some(err) = &outcome.error {
                    eprintln!("descriptor {} ({}) failed: {}", outcome.index, outcome.name, err);
                }
            }

            let final_store = runtime
                .store(&instance)
                .map(|store| store.to_value())
                .unwrap_or_default();
            let rendered = serde_json::to_string_pretty(&final_store)
                .context("Failed to serialize store")?;
            println!("{}", rendered);

            if write {
                write_atomic(&store, rendered.as_bytes())?;
            }
        }

        Commands::InitConfig { path } => {
            write_config(&path, &RuntimeConfig::default())?;
            println!("Wrote configuration to {:?}", path);
        }
    }

    Ok(())
}

// DirectorySource addresses stores as `<dir>/<element>.json`, so any other
// extension would read one file and write another.
fn split_store_path(path: &Path) -> Result<(PathBuf, String)> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(STORE_FILE_EXTENSION) {
        anyhow::bail!(
            "Store file {:?} must have a .{} extension",
            path,
            STORE_FILE_EXTENSION
        );
    }
    let element = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("Invalid store path: {:?}", path))?
        .to_string();
    let dir = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, element))
}
