//! REPL – Read-Eval-Print Loop for the Apoyo questionnaire.
//!
//! Supported slash-commands:
//!   /ask          – answer the four questions and get a response
//!   /add          – answer the questions and add knowledge for that key
//!   /show <key>   – print the entry stored under a key
//!   /list         – list every entry in the knowledge file
//!   /coverage     – how many answer combinations have knowledge
//!   /reload       – re-read the knowledge file
//!   /settings     – interactively edit `~/.apoyo/config.toml`
//!   /help         – show this list
//!   /quit | /exit – exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use apoyo_knowledge::advisor::messages;
use apoyo_knowledge::{AdviceError, Consultation};
use apoyo_types::{AnswerOption, Answers, Question, QuestionTable};

use crate::config::{self, Config};
use crate::session::Session;

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(session: &mut Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "apoyo>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let (cmd, arg) = split_command(&line);
        if cmd.is_empty() {
            continue;
        }

        match cmd {
            "/help" => cmd_help(),
            "/ask" => cmd_ask(session),
            "/add" => cmd_add(session),
            "/show" => cmd_show(session, arg),
            "/list" => cmd_list(session),
            "/coverage" => cmd_coverage(session),
            "/reload" => cmd_reload(session),
            "/settings" => cmd_settings(session),
            "/quit" | "/exit" => {
                println!("{}", "Hasta pronto.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Apoyo Commands".bold().underline());
    println!("  {}         – answer the questions and get a response", "/ask".bold().cyan());
    println!("  {}         – add knowledge for a combination of answers", "/add".bold().cyan());
    println!("  {}  – show the entry stored under a key", "/show <key>".bold().cyan());
    println!("  {}        – list every entry", "/list".bold().cyan());
    println!("  {}    – answered combinations", "/coverage".bold().cyan());
    println!("  {}      – re-read the knowledge file", "/reload".bold().cyan());
    println!("  {}    – edit ~/.apoyo/config.toml settings", "/settings".bold().cyan());
    println!("  {} – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_ask(session: &mut Session) {
    let answers = ask_questions(session.advisor.table());

    let consultation = match session.advisor.consult(&answers) {
        Ok(c) => c,
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            return;
        }
    };

    match consultation {
        Consultation::Answered { key, record, image } => {
            println!();
            println!("  {} {}", "Respuesta breve".bold().underline(), format!("[{key}]").dimmed());
            println!("  {}", record.short_answer.bold());
            if let Some(path) = &image {
                println!("  {} {}", "Imagen:".dimmed(), path.display());
            }
            session.say(&record.short_answer);

            if record.has_details() && confirm("  ¿Ver la respuesta detallada? [s/N]: ") {
                println!();
                println!("  {}", "Respuesta detallada".bold().underline());
                println!("  {}", record.detailed_answer);
                session.say(&record.detailed_answer);
            }
            println!();
        }
        Consultation::Unknown { key } => {
            println!();
            println!("  {} {}", messages::INSUFFICIENT_KNOWLEDGE.yellow(), format!("[{key}]").dimmed());
            session.say(messages::INSUFFICIENT_KNOWLEDGE);
            if confirm("  ¿Agregar conocimiento? [s/N]: ") {
                add_knowledge(session, &answers);
            }
            println!();
        }
    }
}

fn cmd_add(session: &mut Session) {
    let answers = ask_questions(session.advisor.table());
    add_knowledge(session, &answers);
}

fn cmd_show(session: &Session, arg: &str) {
    if let Err(e) = session.advisor.table().validate_key(arg) {
        println!("{}: {}", "Error".red(), e);
        return;
    }
    match session.advisor.store().lookup(arg) {
        Some(record) if record.is_answered() => {
            println!("  {}  {}", "Breve    :".dimmed(), record.short_answer.bold());
            println!("  {}  {}", "Detallada:".dimmed(), record.detailed_answer);
        }
        Some(_) => println!("  {} {}", arg.bold(), "is reserved but has no answer yet".yellow()),
        None => println!("  {} {}", arg.bold(), "has no entry".yellow()),
    }
    if let Some(path) = session.advisor.images().find(arg) {
        println!("  {}  {}", "Imagen   :".dimmed(), path.display());
    }
}

fn cmd_list(session: &Session) {
    let store = session.advisor.store();
    println!("{}", "Knowledge Entries".bold().underline());
    if store.is_empty() {
        println!("  (empty – {})", store.path().display());
        return;
    }
    for record in store.records() {
        if record.is_answered() {
            println!("  {}  {}", record.key.bold(), record.short_answer);
        } else {
            println!("  {}  {}", record.key.bold(), "(reserved)".dimmed());
        }
    }
    println!("  {} entries in {}", store.len(), store.path().display());
}

fn cmd_coverage(session: &Session) {
    let cov = session.advisor.store().coverage(session.advisor.table());
    println!("{}", "Coverage".bold().underline());
    println!(
        "  {} of {} combinations answered ({} reserved)",
        cov.answered.to_string().green(),
        cov.total,
        cov.reserved
    );
    if !cov.missing.is_empty() {
        let preview: Vec<&str> = cov.missing.iter().take(8).map(String::as_str).collect();
        let more = cov.missing.len().saturating_sub(preview.len());
        print!("  Missing: {}", preview.join(" ").dimmed());
        if more > 0 {
            print!(" … (+{more})");
        }
        println!();
    }
}

fn cmd_reload(session: &mut Session) {
    match session.advisor.store_mut().reload() {
        Ok(()) => println!(
            "{} {} entries",
            "✓ Reloaded".green(),
            session.advisor.store().len()
        ),
        Err(e) => println!("{}: {}", "Reload failed".red(), e),
    }
}

fn cmd_settings(session: &mut Session) {
    let mut cfg = match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());
    let kb = prompt_str(
        &format!("  Knowledge file [{}]: ", cfg.knowledge_file.display()),
        &cfg.knowledge_file.to_string_lossy(),
    );
    cfg.knowledge_file = PathBuf::from(kb);

    let img = prompt_str(
        &format!("  Image directory [{}]: ", cfg.image_dir.display()),
        &cfg.image_dir.to_string_lossy(),
    );
    cfg.image_dir = PathBuf::from(img);

    let current = if cfg.narration { "on" } else { "off" };
    let narration = prompt_str(&format!("  Narration (on/off) [{current}]: "), current);
    match config::parse_switch(&narration) {
        Some(on) => cfg.narration = on,
        None => println!(
            "  {} '{}' is not on/off, keeping {}",
            "Warning:".yellow(),
            narration,
            current
        ),
    }

    let speech = prompt_str(&format!("  Speech program [{}]: ", cfg.speech_command), &cfg.speech_command);
    cfg.speech_command = speech;

    match config::save(&cfg) {
        Ok(()) => println!(
            "{} {}",
            "✓ Settings saved to".green(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => {
            println!("{}: {}", "Error saving config".red(), e);
            return;
        }
    }

    match Session::from_config(&cfg) {
        Ok(fresh) => {
            let old = std::mem::replace(session, fresh);
            old.shutdown();
            println!("{}", "✓ Settings applied".green());
        }
        Err(e) => println!("{}: {} – keeping previous session", "Error applying settings".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Flows
// ─────────────────────────────────────────────────────────────────────────────

/// Walk through every question and collect the chosen labels.
fn ask_questions(table: &QuestionTable) -> Answers {
    let mut answers = Answers::new();
    println!();
    for question in table.questions() {
        println!("  {}", question.prompt.bold());
        for (i, opt) in question.options.iter().enumerate() {
            println!("    {}) {}", i + 1, opt.label);
        }
        let chosen = loop {
            let raw = prompt_str("  Opción [1]: ", "1");
            match choose_option(question, &raw) {
                Some(opt) => break opt,
                None => println!("  {} '{}'", "Opción no válida:".red(), raw.yellow()),
            }
        };
        answers.set(question.id.clone(), chosen.label.clone());
    }
    answers
}

/// Collect a new entry for `answers` and hand it to the advisor.
fn add_knowledge(session: &mut Session, answers: &Answers) {
    println!("{}", "  Agregar conocimiento".bold().underline());
    let short = prompt_str("  Respuesta breve: ", "");
    let detailed = prompt_str("  Respuesta detallada: ", "");
    let image = prompt_str("  Imagen (ruta, Enter para omitir): ", "");
    let image = (!image.is_empty()).then(|| PathBuf::from(image));

    match session
        .advisor
        .contribute(answers, &short, &detailed, image.as_deref())
    {
        Ok(saved) => {
            println!("  {} {}", "✓".green().bold(), messages::SAVED.green());
            if let Some(path) = &saved.image {
                println!("  {} {}", "Imagen:".dimmed(), path.display());
            }
            session.say(messages::SAVED);
        }
        Err(e) => {
            let msg = e.user_message();
            match e {
                AdviceError::Duplicate(_) => println!("  {} {}", "Duplicado:".yellow().bold(), msg.yellow()),
                _ => println!("  {} {}", "Error:".red().bold(), msg.red()),
            }
            session.say(msg);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Split `"/show 0101"` into `("/show", "0101")`.
fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    }
}

/// Resolve a 1-based option number or an exact label.
fn choose_option<'q>(question: &'q Question, raw: &str) -> Option<&'q AnswerOption> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| question.options.get(i));
    }
    question.options.iter().find(|o| o.label.eq_ignore_ascii_case(raw))
}

fn is_yes(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "s" | "si" | "sí" | "y" | "yes")
}

fn confirm(msg: &str) -> bool {
    is_yes(&prompt_str(msg, "n"))
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn familia() -> Question {
        QuestionTable::builtin().question("familia").cloned().unwrap()
    }

    #[test]
    fn split_command_separates_argument() {
        assert_eq!(split_command("  /show   01010101 \n"), ("/show", "01010101"));
        assert_eq!(split_command("/list\n"), ("/list", ""));
        assert_eq!(split_command("   \n"), ("", ""));
    }

    #[test]
    fn choose_option_by_number() {
        let q = familia();
        assert_eq!(choose_option(&q, "2").unwrap().label, "a veces discutimos mucho");
        assert!(choose_option(&q, "0").is_none());
        assert!(choose_option(&q, "4").is_none());
    }

    #[test]
    fn choose_option_by_label() {
        let q = familia();
        assert_eq!(choose_option(&q, " Estable y de apoyo ").unwrap().code, "00");
        assert!(choose_option(&q, "no sé").is_none());
    }

    #[test]
    fn is_yes_accepts_spanish_and_english() {
        assert!(is_yes("s"));
        assert!(is_yes("Sí"));
        assert!(is_yes("YES"));
        assert!(!is_yes("n"));
        assert!(!is_yes(""));
    }
}
