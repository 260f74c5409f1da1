use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod config;
mod error;
mod mail;
mod responder;
mod rules;

use config::Config;
use mail::imap::ImapMailbox;
use mail::smtp::SmtpRelay;
use responder::Responder;
use rules::{Rule, RuleEngine};

#[derive(Parser)]
#[command(name = "zenreply", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file (default: $ZENREPLY_CONFIG or ~/.config/zenreply/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the inbox and answer unread mail (default)
    Run {
        /// Check once and exit
        #[arg(long)]
        once: bool,
        /// Ignore unread mail received before this day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        since: Option<NaiveDate>,
        /// Seconds between checks
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Inspect or edit the reply rules
    #[command(subcommand)]
    Rules(RulesCommand),
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Print the rules in priority order
    List,
    /// Append a rule (lowest priority) and save the rule file
    Add {
        /// Keyword to look for; repeat for more
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,
        template: String,
    },
    /// Write the built-in rules to the rule file
    Init,
}

fn setup_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

/// Built-in rules, replaced by the rule file when there is one.
fn load_rules(path: &Path) -> RuleEngine {
    let mut engine = RuleEngine::default();
    match engine.load(path) {
        Ok(()) => {}
        Err(error::Error::RulesNotFound(_)) => {
            tracing::info!(path = %path.display(), "no rule file, using default rules");
        }
        Err(e) => tracing::warn!(error = %e, "could not load rule file, using default rules"),
    }
    engine
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config_path = match cli.config {
        Some(p) => p,
        None => Config::path()?,
    };
    let (config, created) = Config::load_or_create(&config_path)?;
    if created {
        tracing::warn!(
            path = %config_path.display(),
            "config.toml created. Fill in your credentials and start again."
        );
        return Ok(());
    }

    let rules_path = config.rules_path()?;

    let command = cli.command.unwrap_or(Command::Run {
        once: false,
        since: None,
        interval: None,
    });
    match command {
        Command::Run {
            once,
            since,
            interval,
        } => run(config, &rules_path, once, since, interval).await,
        Command::Rules(cmd) => rules_command(cmd, &rules_path),
    }
}

async fn run(
    config: Config,
    rules_path: &Path,
    once: bool,
    since: Option<NaiveDate>,
    interval: Option<u64>,
) -> Result<()> {
    let rules = load_rules(rules_path);
    let interval = Duration::from_secs(interval.unwrap_or(config.responder.interval_secs));

    let mut worker = Responder::new(
        ImapMailbox::new(config.imap.clone()),
        SmtpRelay::new(config.smtp.clone(), config.user.clone()),
        rules,
        config.user.email.clone(),
    );
    if let Some(date) = since.or(config.responder.start_date) {
        worker = worker.with_start_date(date);
    }

    tracing::info!(
        mailbox = %config.user.email,
        since = %worker.start_date(),
        interval_secs = interval.as_secs(),
        "auto-reply started, press Ctrl+C to stop"
    );

    if once {
        let report = tokio::task::spawn_blocking(move || worker.run_cycle()).await??;
        tracing::info!(
            found = report.found,
            replied = report.replied,
            skipped = report.skipped,
            failed = report.failed,
            "done"
        );
        return Ok(());
    }

    tokio::select! {
        res = responder::run(worker, interval) => res?,
        _ = tokio::signal::ctrl_c() => tracing::info!("auto-reply stopped"),
    }
    Ok(())
}

fn one_line(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 72 {
        format!("{}...", flat.chars().take(69).collect::<String>())
    } else {
        flat
    }
}

fn rules_command(cmd: RulesCommand, path: &Path) -> Result<()> {
    match cmd {
        RulesCommand::List => {
            let engine = load_rules(path);
            for (i, rule) in engine.rules().iter().enumerate() {
                println!(
                    "{:>2}. [{}] {}",
                    i + 1,
                    rule.keywords.join(", "),
                    one_line(&rule.template)
                );
            }
            println!("    fallback: {}", one_line(engine.fallback()));
        }
        RulesCommand::Add { keywords, template } => {
            // A file that exists but fails to load must not be overwritten.
            let mut engine = RuleEngine::default();
            match engine.load(path) {
                Ok(()) | Err(error::Error::RulesNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            engine.add_rule(Rule::new(keywords, template));
            engine.save(path)?;
        }
        RulesCommand::Init => RuleEngine::default().save(path)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(keyword: &str, template: &str) -> RulesCommand {
        RulesCommand::Add {
            keywords: vec![keyword.to_string()],
            template: template.to_string(),
        }
    }

    #[test]
    fn add_to_missing_file_starts_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply_rules.json");

        rules_command(add("refund", "R"), &path).unwrap();

        let mut engine = RuleEngine::new(vec![], "");
        engine.load(&path).unwrap();
        assert_eq!(engine.rules().len(), rules::default_rules().len() + 1);
        assert_eq!(engine.rules().last(), Some(&Rule::new(["refund"], "R")));
    }

    #[test]
    fn add_keeps_a_malformed_rule_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply_rules.json");
        let broken = r#"[{"keywords":["refund"],"reply_template":"R"},]"#;
        std::fs::write(&path, broken).unwrap();

        assert!(rules_command(add("invoice", "I"), &path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
    }
}
