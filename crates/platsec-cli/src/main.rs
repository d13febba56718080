//! `platsecd` – publishes the host's platform security state.
//!
//! The daemon:
//!
//! 1. Initialises logging (and optional OTLP export) through
//!    [`platsec_runtime::init_tracing`].
//! 2. Loads `~/.platsec/config.toml`, writing the defaults on first run.
//! 3. Intercepts **Ctrl-C** to request a graceful shutdown.
//! 4. Runs the controller engine with the `SecurityStateController` until
//!    every controller has returned.
//! 5. Prints the published `runtime/securitystate` resource and exits
//!    non-zero if any controller failed.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use platsec_controllers::SecurityStateController;
use platsec_firmware::EfiVars;
use platsec_runtime::{ControllerEngine, EngineReport, ResourceStore};
use platsec_types::{NAMESPACE_RUNTIME, ResourceKey, SECURITY_STATE_ID, SecurityStateSpec};

fn main() -> ExitCode {
    // Held until exit so pending spans are flushed.
    let _telemetry = platsec_runtime::init_tracing("platsecd");

    print_banner();

    let cfg = load_config();
    info!(
        signing_key = %cfg.signing_key_path.display(),
        efivars = %cfg.efivars_path.display(),
        "configuration resolved"
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – initiating graceful shutdown …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Engine ────────────────────────────────────────────────────────────
    let mut engine = ControllerEngine::new();
    let controller = SecurityStateController::new(Box::new(EfiVars::new(&cfg.efivars_path)))
        .with_signing_key_path(&cfg.signing_key_path);
    if let Err(e) = engine.register(Arc::new(controller)) {
        error!(error = %e, "failed to register controller");
        return ExitCode::FAILURE;
    }
    let store = engine.store();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };
    let report = runtime.block_on(engine.run(shutdown_rx));

    print_security_state(&store);
    print_report(&report);

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_security_state(store: &ResourceStore) {
    let key = ResourceKey::of::<SecurityStateSpec>(NAMESPACE_RUNTIME, SECURITY_STATE_ID);
    println!();
    match store.get(&key) {
        Some(resource) => match serde_json::to_string_pretty(&resource) {
            Ok(json) => {
                println!("  {} {}", "Published".green().bold(), key.to_string().bold());
                println!("{json}");
            }
            Err(e) => println!("{}: {}", "Failed to render resource".red(), e),
        },
        None => println!("  {}", "No security state was published.".yellow()),
    }
}

fn print_report(report: &EngineReport) {
    println!();
    for name in &report.completed {
        println!("  {} {}", "✓".green().bold(), name);
    }
    for (name, e) in &report.failed {
        println!("  {} {}: {}", "✗".red().bold(), name, e);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "platsecd".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Platform security state publisher");
    println!();
}
