//! `apoyo-cli` – Apoyo Command Line Interface
//!
//! Terminal front end for the emotional-support knowledge base.  It:
//!
//! 1. Checks for `~/.apoyo/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Loads the knowledge file and starts the narration worker.
//! 3. Drops the user into an **interactive REPL** with slash-commands
//!    (`/ask`, `/add`, `/show`, `/list`, `/coverage`, `/settings`, `/help`).
//! 4. Intercepts **Ctrl-C** to stop at the next prompt.

mod config;
mod repl;
mod session;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use session::Session;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filter (defaults to "warn"); APOYO_LOG_FORMAT=json switches to
    // newline-delimited JSON.  Logs go to stderr; the REPL owns stdout.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("APOYO_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – exiting after the current prompt …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(_)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
        }
    }

    let cfg = config::load_or_default();

    // ── Knowledge base + narration ────────────────────────────────────────
    let mut session = match Session::from_config(&cfg) {
        Ok(s) => s,
        Err(e) => {
            println!("{}: {}", "Failed to start".red(), e);
            std::process::exit(1);
        }
    };

    let store = session.advisor.store();
    println!(
        "  Knowledge file {} ({} entries)",
        store.path().display().to_string().bold(),
        store.len()
    );
    println!(
        "  Narration {}",
        if cfg.narration {
            format!("on ({})", cfg.speech_command).green()
        } else {
            "off".dimmed()
        }
    );

    println!();
    println!(
        "  Type {} to start or {} for a list of commands.\n",
        "/ask".bold().cyan(),
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(&mut session, shutdown);
    session.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Apoyo First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Apoyo.\n");

    let mut cfg = config::Config::default();

    let kb = prompt_line(
        &format!("  Knowledge file [{}]: ", cfg.knowledge_file.display()),
        &cfg.knowledge_file.to_string_lossy(),
    );
    cfg.knowledge_file = kb.into();

    let img = prompt_line(
        &format!("  Image directory [{}]: ", cfg.image_dir.display()),
        &cfg.image_dir.to_string_lossy(),
    );
    cfg.image_dir = img.into();

    println!("  Speak answers aloud?");
    println!("    1) Yes, with {}  (default)", cfg.speech_command);
    println!("    2) No");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    cfg.narration = choice.trim() != "2";

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    _                         "#.bold().cyan());
    println!("{}", r#"   /_\  _ __  ___ _  _ ___   "#.bold().cyan());
    println!("{}", r#"  / _ \| '_ \/ _ \ || / _ \  "#.bold().cyan());
    println!("{}", r#" /_/ \_\ .__/\___/\_, \___/  "#.bold().cyan());
    println!("{}", r#"       |_|        |__/       "#.bold().cyan());
    println!();
    println!("  {} {}",
        "Apoyo".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Chatbot de Apoyo Emocional");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
