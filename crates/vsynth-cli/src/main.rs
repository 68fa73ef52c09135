//! vsynth patch tool.
//!
//! Provides the `vsynth` binary for working with saved patches outside the
//! editor: list the module kit, create empty or demo patches, inspect a patch's
//! routing, and apply edit commands to a patch.
//!
//! Edits go through the same `Session` the editor uses, so a command that
//! the editor would reject is rejected here too and the patch file is left
//! as it was.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::Level;

use vsynth_core::matrix::{connections, lanes};
use vsynth_core::{
    demos, find_demo, Document, DerivedGraph, EditCommand, ModuleCatalog, ModuleKind, Session,
    SessionConfig,
};
use vsynth_storage::{DocumentStore, FileStore, LoadOutcome, MigrationRegistry, StorageError};

/// vsynth patch tools.
#[derive(Parser)]
#[command(name = "vsynth", about = "Inspect and edit vsynth patches")]
struct Cli {
    /// Directory holding `<name>.vsynth` patches.
    #[arg(short, long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Log verbosity: -v for info, -vv for debug.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List the built-in modules and their ports.
    Modules,

    /// List the patches in the directory.
    List,

    /// List the built-in demo patches.
    Demos,

    /// Create an empty patch.
    New {
        /// Patch name.
        name: String,

        /// Number of buses (default: VSYNTH_BUS_COUNT or 8).
        #[arg(short, long)]
        buses: Option<u32>,

        /// Start from a built-in demo instead of an empty patch.
        #[arg(long, conflicts_with = "buses")]
        demo: Option<String>,

        /// Replace an existing patch.
        #[arg(long)]
        force: bool,
    },

    /// Print a patch's nodes, routing matrix and derived edges.
    Inspect {
        /// Patch name.
        name: String,
    },

    /// Apply edit commands to a patch.
    Apply {
        /// Patch name.
        name: String,

        /// JSON file with one command or an array of commands; `-` for stdin.
        commands: String,

        /// Validate and print the result without saving.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let exit_code = match cli.command {
        Commands::Modules => run_modules(),
        Commands::List => with_store(&cli.dir, |store| run_list(store)),
        Commands::Demos => run_demos(),
        Commands::New {
            name,
            buses,
            demo,
            force,
        } => with_store(&cli.dir, |store| match demo {
            Some(demo) => run_new_demo(store, &name, &demo, force),
            None => run_new(store, &name, buses.unwrap_or(config.bus_count), force),
        }),
        Commands::Inspect { name } => with_store(&cli.dir, |store| run_inspect(store, &name)),
        Commands::Apply {
            name,
            commands,
            dry_run,
        } => with_store(&cli.dir, |store| {
            run_apply(store, &config, &name, &commands, dry_run)
        }),
    };
    process::exit(exit_code);
}

/// Opens the patch directory and runs `f` against it.
fn with_store(dir: &Path, f: impl FnOnce(&mut FileStore) -> i32) -> i32 {
    match FileStore::open(dir) {
        Ok(mut store) => f(&mut store),
        Err(e) => {
            eprintln!("Error: failed to open patch directory '{}': {}", dir.display(), e);
            3
        }
    }
}

/// Exit code for a storage failure: 3 for I/O, 1 otherwise.
fn storage_exit_code(err: &StorageError) -> i32 {
    match err {
        StorageError::Io(_) | StorageError::PatchNotFound { .. } => 3,
        _ => 1,
    }
}

fn print_json(value: &Value) {
    let text = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize output: {}\"}}", e));
    println!("{}", text);
}

/// Execute the modules subcommand.
fn run_modules() -> i32 {
    let catalog = ModuleCatalog::builtin();
    let modules: Vec<Value> = catalog
        .iter()
        .map(|contract| {
            let kind = match contract.kind {
                ModuleKind::Primitive(_) => "primitive",
                ModuleKind::Composite(_) => "composite",
            };
            json!({
                "moduleType": contract.module_type,
                "kind": kind,
                "parameters": contract.default_parameters(),
                "inlets": contract.inlet_keys,
                "associatedParameters": contract.associated_parameters,
                "outlets": contract.outlet_arity(),
            })
        })
        .collect();
    print_json(&Value::Array(modules));
    0
}

/// Execute the list subcommand.
fn run_list(store: &FileStore) -> i32 {
    match store.list() {
        Ok(names) => {
            for name in names {
                println!("{}", name);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: failed to list patches: {}", e);
            storage_exit_code(&e)
        }
    }
}

/// Execute the demos subcommand.
fn run_demos() -> i32 {
    let demos: Vec<Value> = demos()
        .iter()
        .map(|demo| json!({ "name": demo.name, "description": demo.description }))
        .collect();
    print_json(&Value::Array(demos));
    0
}

/// Execute the new subcommand.
fn run_new(store: &mut FileStore, name: &str, buses: u32, force: bool) -> i32 {
    if buses == 0 {
        eprintln!("Error: a patch needs at least one bus");
        return 1;
    }
    create_patch(store, name, &Document::new(buses), force)
}

/// Execute the new subcommand with `--demo`.
fn run_new_demo(store: &mut FileStore, name: &str, demo: &str, force: bool) -> i32 {
    let Some(demo) = find_demo(demo) else {
        eprintln!("Error: unknown demo '{}' (see `vsynth demos`)", demo);
        return 1;
    };
    match demo.document(&ModuleCatalog::builtin()) {
        Ok(document) => create_patch(store, name, &document, force),
        Err(e) => {
            eprintln!("Error: demo '{}' failed to build: {}", demo.name, e);
            1
        }
    }
}

fn create_patch(store: &mut FileStore, name: &str, document: &Document, force: bool) -> i32 {
    if !force && store.read(name).is_ok() {
        eprintln!("Error: patch '{}' already exists (use --force to replace it)", name);
        return 1;
    }
    match store.write(name, document) {
        Ok(()) => {
            println!(
                "created '{}' with {} buses and {} node(s)",
                name,
                document.bus_count(),
                document.node_count()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: failed to write patch '{}': {}", name, e);
            storage_exit_code(&e)
        }
    }
}

/// Loads a patch, reporting anything other than a clean load on stderr.
fn open_patch(store: &FileStore, catalog: &ModuleCatalog, name: &str) -> Result<Document, i32> {
    let loaded = store
        .open(name, catalog, &MigrationRegistry::builtin())
        .map_err(|e| {
            eprintln!("Error: failed to load patch '{}': {}", name, e);
            storage_exit_code(&e)
        })?;
    match &loaded.outcome {
        LoadOutcome::Current => {}
        LoadOutcome::Migrated { from } => {
            eprintln!("note: '{}' migrated from version {}", name, from)
        }
        LoadOutcome::Cleared { from } => eprintln!(
            "warning: '{}' was saved by version {} and has been cleared",
            name, from
        ),
        LoadOutcome::Reset { reason, .. } => {
            eprintln!("warning: '{}' could not be loaded ({}); using an empty patch", name, reason)
        }
    }
    Ok(loaded.document)
}

/// Execute the inspect subcommand.
fn run_inspect(store: &FileStore, name: &str) -> i32 {
    let catalog = ModuleCatalog::builtin();
    let document = match open_patch(store, &catalog, name) {
        Ok(document) => document,
        Err(code) => return code,
    };

    let lanes = match lanes(&document, &catalog) {
        Ok(lanes) => lanes,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let graph = DerivedGraph::build(&document);
    let render_order = graph
        .render_order()
        .map(|order| json!(order))
        .unwrap_or(Value::Null);
    let feeding_output = document
        .output_node()
        .and_then(|key| graph.upstream_of(key.as_str()).ok());

    print_json(&json!({
        "busCount": document.bus_count(),
        "nodes": document
            .ordered_nodes()
            .map(|(key, node)| json!({
                "key": key,
                "moduleType": node.module_type,
                "parameters": node.parameters,
            }))
            .collect::<Vec<_>>(),
        "lanes": lanes
            .iter()
            .map(|lane| json!({ "name": lane.name(), "node": lane.node, "port": lane.port }))
            .collect::<Vec<_>>(),
        "connections": connections(&document, &lanes),
        "edges": graph.edges().map(|e| e.to_string()).collect::<Vec<_>>(),
        "renderOrder": render_order,
        "cycle": graph.find_cycle(),
        "outputNode": document.output_node(),
        "feedingOutput": feeding_output,
    }));
    0
}

/// Reads commands from a file or stdin. Accepts a single command or an array.
fn read_commands(source: &str) -> Result<Vec<EditCommand>, String> {
    let text = if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("failed to read stdin: {}", e))?;
        text
    } else {
        fs::read_to_string(source).map_err(|e| format!("failed to read '{}': {}", source, e))?
    };

    let value: Value =
        serde_json::from_str(&text).map_err(|e| format!("invalid command JSON: {}", e))?;
    let commands: Result<Vec<EditCommand>, serde_json::Error> = match value {
        Value::Array(_) => serde_json::from_value(value),
        single => serde_json::from_value(single).map(|command| vec![command]),
    };
    commands.map_err(|e| format!("invalid command: {}", e))
}

/// Execute the apply subcommand.
///
/// Returns exit code: 0 = success, 1 = rejected command, 3 = I/O error.
fn run_apply(
    store: &mut FileStore,
    config: &SessionConfig,
    name: &str,
    source: &str,
    dry_run: bool,
) -> i32 {
    let commands = match read_commands(source) {
        Ok(commands) => commands,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return 1;
        }
    };

    let catalog = Arc::new(ModuleCatalog::builtin());
    let document = match open_patch(store, &catalog, name) {
        Ok(document) => document,
        Err(code) => return code,
    };
    let mut session = match Session::with_document(catalog, config.clone(), document) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    // All or nothing: the file is written only if every command applies.
    for (index, command) in commands.iter().enumerate() {
        if let Err(e) = session.dispatch(command) {
            eprintln!(
                "Error: command {} ({}) rejected: {}",
                index + 1,
                command.describe(),
                e
            );
            return 1;
        }
    }

    let document = session.document();
    if dry_run {
        print_json(&json!({
            "valid": true,
            "committed": false,
            "document": &*document,
        }));
        return 0;
    }

    match store.write(name, &document) {
        Ok(()) => {
            println!(
                "applied {} command(s) to '{}': {} node(s), {} edge(s)",
                commands.len(),
                name,
                document.node_count(),
                session.edges().len()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: failed to write patch '{}': {}", name, e);
            storage_exit_code(&e)
        }
    }
}
