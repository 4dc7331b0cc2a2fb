// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ken - durable workflow engine for tree-structured agent sessions

mod client;
mod exit_error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use exit_error::ExitError;
use ken_core::{DoneWhen, KenPath, SessionId, SystemClock, UuidIdGen};
use ken_daemon::listener::{dispatch, ListenCtx};
use ken_daemon::{acquire_lock, lifecycle, OperatorRequest, ProjectPaths, Request, RunMode};
use ken_engine::{observer, ops, EngineConfig, RequestHandler};
use ken_storage::Store;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ken",
    version,
    about = "ken - a durable workflow engine for tree-structured agent sessions"
)]
struct Cli {
    /// Change to <dir> before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .ken/ and initialise the store
    Init,
    /// Create a root session and print its id
    Wake {
        /// Kenning path (e.g. core/build)
        ken_path: String,
        /// What to accomplish
        #[arg(long)]
        task: String,
        /// JSON or TOML file with the definition of done
        #[arg(long = "done-when", value_name = "FILE")]
        done_when: Option<PathBuf>,
    },
    /// Run one scheduler iteration to completion
    Process,
    /// Loop the scheduler until interrupted
    Daemon,
    /// Session counts at a glance
    Status,
    /// Workflow tree (all roots, or one subtree)
    Tree {
        /// Root session id (prefix accepted)
        id: Option<String>,
    },
    /// Full detail for one session
    Session {
        /// Session id (prefix accepted)
        id: String,
    },
    /// Blocker chain: what a sleeping session is waiting on
    Why {
        /// Session id (prefix accepted)
        id: String,
    },
    /// Audit log, optionally for one session
    Log {
        /// Session id (prefix accepted)
        id: Option<String>,
        /// Number of recent events to show (0 = all)
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Scan the store for stalled, starved, or inconsistent sessions
    Diagnose,
    /// Re-queue a failed session from its last checkpoint
    Recover {
        /// Session id (prefix accepted)
        id: String,
    },
    /// Mark a stuck session failed
    Abandon {
        /// Session id (prefix accepted)
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Forward a raw request line to the engine
    Request {
        /// One JSON request object
        json: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e.downcast_ref::<ExitError>().map_or(1, |c| c.code);
        let message = e.to_string();
        if !message.is_empty() {
            eprintln!("Error: {message}");
        }
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir)
            .map_err(|e| ExitError::user(format!("cannot change to {}: {e}", dir.display())))?;
    }
    let cwd = std::env::current_dir().map_err(|e| ExitError::user(e.to_string()))?;

    match cli.command {
        Commands::Init => init(&cwd),
        Commands::Wake {
            ken_path,
            task,
            done_when,
        } => wake(&cwd, &ken_path, task, done_when.as_deref()).await,
        Commands::Process => engine_run(&cwd, RunMode::Once).await,
        Commands::Daemon => engine_run(&cwd, RunMode::Forever).await,
        Commands::Status => status(&cwd),
        Commands::Tree { id } => tree(&cwd, id.as_deref()),
        Commands::Session { id } => session(&cwd, &id),
        Commands::Why { id } => why(&cwd, &id),
        Commands::Log { id, limit } => log(&cwd, id.as_deref(), limit),
        Commands::Diagnose => diagnose(&cwd),
        Commands::Recover { id } => recover(&cwd, &id).await,
        Commands::Abandon { id, reason } => abandon(&cwd, &id, &reason).await,
        Commands::Request { json } => request(&cwd, &json).await,
    }
}

fn project(cwd: &Path) -> Result<ProjectPaths> {
    ProjectPaths::discover(cwd)
        .ok_or_else(|| ExitError::user("not a ken project (run `ken init` first)").into())
}

fn open_read_only(paths: &ProjectPaths) -> Result<Store> {
    Store::open_read_only(&paths.store()).map_err(|e| ExitError::store(e.to_string()).into())
}

/// Open the store for a one-shot direct mutation, taking the engine lock.
fn open_direct(paths: &ProjectPaths) -> Result<(ken_daemon::EngineLock, Store)> {
    let lock = acquire_lock(paths).map_err(|e| match e {
        ken_daemon::LifecycleError::LockHeld => {
            ExitError::user("an engine is running but its socket is gone; stop it first")
        }
        other => ExitError::user(other.to_string()),
    })?;
    let store = Store::open(&paths.store()).map_err(ExitError::from)?;
    Ok((lock, store))
}

fn init(cwd: &Path) -> Result<()> {
    let paths = ProjectPaths::new(cwd);
    paths
        .init()
        .map_err(|e| ExitError::user(e.to_string()))?;
    println!("initialised {}", paths.ken_dir().display());
    Ok(())
}

fn load_done_when(path: &Path) -> Result<DoneWhen> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ExitError::user(format!("cannot read {}: {e}", path.display())))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let parsed = if is_json {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        toml::from_str(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| ExitError::user(format!("invalid done-when file: {e}")).into())
}

async fn wake(cwd: &Path, ken_path: &str, task: String, done_when: Option<&Path>) -> Result<()> {
    let paths = project(cwd)?;
    let ken_path = KenPath::new(ken_path).map_err(|e| ExitError::user(e.to_string()))?;
    let done_when = done_when.map(load_done_when).transpose()?;

    if client::socket_exists(&paths) {
        let request = Request::Operator(OperatorRequest::Wake {
            ken_path: ken_path.as_str().to_string(),
            task,
            done_when,
        });
        let line = request
            .to_line()
            .map_err(|e| ExitError::user(e.to_string()))?;
        let response = client::send(&paths, &line)
            .await
            .map_err(|e| ExitError::store(e.to_string()))?;
        match response.data.and_then(|d| d.get("session_id").cloned()) {
            Some(id) if response.ok => {
                println!("{}", id.as_str().unwrap_or_default());
                Ok(())
            }
            _ => Err(ExitError::user(
                response.error.unwrap_or_else(|| "wake failed".to_string()),
            )
            .into()),
        }
    } else {
        let (_lock, store) = open_direct(&paths)?;
        let id = ops::wake_root(&store, &SystemClock, &UuidIdGen, ken_path, task, done_when)
            .map_err(ExitError::from)?;
        println!("{id}");
        Ok(())
    }
}

async fn engine_run(cwd: &Path, mode: RunMode) -> Result<()> {
    let paths = project(cwd)?;
    let _log_guard = match mode {
        RunMode::Forever => lifecycle::init_tracing(&paths),
        RunMode::Once => None,
    };

    let report = ken_daemon::run(&paths, mode).await.map_err(|e| {
        let message = e.to_string();
        match e {
            ken_daemon::LifecycleError::Store(inner) => ExitError::from(inner),
            ken_daemon::LifecycleError::NotInitialised(_)
            | ken_daemon::LifecycleError::LockHeld
            | ken_daemon::LifecycleError::Config(_) => ExitError::user(message),
            _ => ExitError::store(message),
        }
    })?;

    if mode == RunMode::Once {
        for id in &report.recovery.requeued {
            println!("re-queued {id}");
        }
        for id in &report.recovery.agent_lost {
            println!("agent lost, failed {id}");
        }
        for id in &report.fired {
            println!("trigger fired for {id}");
        }
        match report.spawned.first() {
            Some(id) => println!("woke {id}"),
            None => println!("nothing to wake"),
        }
    }
    Ok(())
}

fn status(cwd: &Path) -> Result<()> {
    let paths = project(cwd)?;
    let store = open_read_only(&paths)?;
    let summary = store.read(observer::status_summary);
    println!("{}", output::render_status(&summary));
    Ok(())
}

fn tree(cwd: &Path, id: Option<&str>) -> Result<()> {
    let paths = project(cwd)?;
    let store = open_read_only(&paths)?;
    let now = chrono::Utc::now();
    let nodes = store
        .read(|state| observer::tree(state, id, now))
        .ok_or_else(|| ExitError::not_found(format!("unknown session: {}", id.unwrap_or(""))))?;
    println!("{}", output::render_tree(&nodes));
    Ok(())
}

fn session(cwd: &Path, id: &str) -> Result<()> {
    let paths = project(cwd)?;
    let store = open_read_only(&paths)?;
    let detail = store
        .read(|state| observer::session_detail(state, id, 15))
        .ok_or_else(|| ExitError::not_found(format!("unknown session: {id}")))?;
    println!("{}", output::render_session(&detail));
    Ok(())
}

fn why(cwd: &Path, id: &str) -> Result<()> {
    let paths = project(cwd)?;
    let store = open_read_only(&paths)?;
    let now = chrono::Utc::now();
    let blockers = store
        .read(|state| observer::why(state, id, now))
        .ok_or_else(|| ExitError::not_found(format!("unknown session: {id}")))?;
    println!("{}", output::render_blockers(id, &blockers));
    Ok(())
}

fn log(cwd: &Path, id: Option<&str>, limit: usize) -> Result<()> {
    let paths = project(cwd)?;
    let store = open_read_only(&paths)?;
    let limit = if limit == 0 { usize::MAX } else { limit };
    let events = store
        .read(|state| observer::log_lines(state, id, limit))
        .ok_or_else(|| ExitError::not_found(format!("unknown session: {}", id.unwrap_or(""))))?;
    println!("{}", output::render_log(&events));
    Ok(())
}

fn diagnose(cwd: &Path) -> Result<()> {
    let paths = project(cwd)?;
    let config = EngineConfig::load(&paths.config()).map_err(|e| ExitError::user(e.to_string()))?;
    let store = open_read_only(&paths)?;
    let now = chrono::Utc::now();
    let issues = store.read(|state| observer::diagnose(state, now, &config.diagnose));
    println!("{}", output::render_diagnose(&issues));
    Ok(())
}

/// Resolve an id prefix against the read-only store for direct operator ops.
fn resolve_session_id(store: &Store, id: &str) -> Result<SessionId> {
    store
        .read(|state| state.get_session(id).map(|s| s.id.clone()))
        .ok_or_else(|| ExitError::not_found(format!("unknown session: {id}")).into())
}

async fn recover(cwd: &Path, id: &str) -> Result<()> {
    let paths = project(cwd)?;
    if client::socket_exists(&paths) {
        let line = Request::Operator(OperatorRequest::Recover { id: id.to_string() })
            .to_line()
            .map_err(|e| ExitError::user(e.to_string()))?;
        forward_operator(&paths, &line).await
    } else {
        let (_lock, store) = open_direct(&paths)?;
        let id = resolve_session_id(&store, id)?;
        ops::recover(&store, &SystemClock, &id).map_err(ExitError::from)?;
        println!("re-queued {id}");
        Ok(())
    }
}

async fn abandon(cwd: &Path, id: &str, reason: &str) -> Result<()> {
    let paths = project(cwd)?;
    if client::socket_exists(&paths) {
        let line = Request::Operator(OperatorRequest::Abandon {
            id: id.to_string(),
            reason: reason.to_string(),
        })
        .to_line()
        .map_err(|e| ExitError::user(e.to_string()))?;
        forward_operator(&paths, &line).await
    } else {
        let (_lock, store) = open_direct(&paths)?;
        let id = resolve_session_id(&store, id)?;
        ops::abandon(&store, &SystemClock, &id, reason).map_err(ExitError::from)?;
        println!("abandoned {id}");
        Ok(())
    }
}

async fn forward_operator(paths: &ProjectPaths, line: &str) -> Result<()> {
    let response = client::send(paths, line)
        .await
        .map_err(|e| ExitError::store(e.to_string()))?;
    if response.ok {
        if let Some(id) = response
            .data
            .as_ref()
            .and_then(|d| d.get("session_id"))
            .and_then(|v| v.as_str())
        {
            println!("{id}");
        }
        Ok(())
    } else {
        Err(ExitError::invalid_state(
            response.error.unwrap_or_else(|| "request failed".to_string()),
        )
        .into())
    }
}

async fn request(cwd: &Path, json: &str) -> Result<()> {
    let paths = project(cwd)?;
    let response = if client::socket_exists(&paths) {
        client::send(&paths, json)
            .await
            .map_err(|e| ExitError::store(e.to_string()))?
    } else {
        let (_lock, store) = open_direct(&paths)?;
        let clock = SystemClock;
        let idgen = UuidIdGen;
        let ctx = ListenCtx {
            handler: RequestHandler::new(store.clone(), clock.clone(), idgen.clone()),
            store,
            clock,
            idgen,
            shutdown: Arc::new(tokio::sync::Notify::new()),
        };
        dispatch(json, &ctx)
    };

    println!(
        "{}",
        serde_json::to_string(&response).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
    if response.ok {
        Ok(())
    } else {
        // The response line is the output; the exit code still signals
        // failure for scripts.
        Err(ExitError {
            code: 1,
            message: String::new(),
        }
        .into())
    }
}
