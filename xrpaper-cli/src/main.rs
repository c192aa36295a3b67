//! XRPaper CLI: level manager, study and execution view.
//!
//! Commands:
//! - `login` / `logout` / `whoami`: session management
//! - `levels add|list|rm|export`: horizontal support/resistance levels
//! - `study`: merged levels, nearest S/R and mood for typed-in indicators
//! - `exec`: stop/targets from a saved study, as Markdown or JSON
//! - `snapshot rm`: delete a saved study
//! - `config show` / `hash-password`: configuration helpers

mod session;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xrpaper_core::auth::hash_password;
use xrpaper_core::backend::{create_backend, Backend};
use xrpaper_core::config::AppConfig;
use xrpaper_core::domain::{
    parse_timestamp, LevelId, LevelType, RawIndicatorInputs, SnapshotId, Timeframe,
};
use xrpaper_core::execution::Mode;
use xrpaper_core::journal::{Journal, LevelInput, StudyRequest, StudyView};
use xrpaper_core::levels::MergedLevel;
use xrpaper_core::mood::create_mood_policy;
use xrpaper_core::report::{
    csv::write_levels, format_num, format_pct, format_price, render_execution,
    render_execution_json,
};

#[derive(Parser)]
#[command(
    name = "xrpaper",
    about = "XRPaper — trading journal with level-based execution plans"
)]
struct Cli {
    /// Config file. Defaults to <config_dir>/xrpaper/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session file. Defaults to <data_dir>/xrpaper/session.json.
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the saved session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Level manager.
    Levels {
        #[command(subcommand)]
        action: LevelsAction,
    },
    /// Study a symbol: merged levels, nearest S/R and mood.
    Study {
        /// Symbol. Defaults to journal.default_symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Timeframe (1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w, 1mo, 1y).
        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// Only levels observed at or after this time.
        #[arg(long, value_parser = parse_time_arg)]
        from: Option<DateTime<Utc>>,

        /// Only levels observed at or before this time.
        #[arg(long, value_parser = parse_time_arg)]
        to: Option<DateTime<Utc>>,

        /// Current price. Either decimal convention ("112.500,00" or "112,500.00").
        #[arg(long)]
        price: Option<String>,

        /// Absolute ATR.
        #[arg(long)]
        atr: Option<String>,

        #[arg(long)]
        rsi_k: Option<String>,

        #[arg(long)]
        rsi_d: Option<String>,

        #[arg(long)]
        ema20: Option<String>,

        #[arg(long)]
        ema200: Option<String>,

        #[arg(long)]
        vwap: Option<String>,

        /// Average volume.
        #[arg(long)]
        vol_avg: Option<String>,

        /// Save the study as a snapshot ("save and advance").
        #[arg(long, default_value_t = false)]
        save: bool,

        /// Print the study as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Execution view of a saved study. Defaults to the latest one.
    Exec {
        /// Snapshot id.
        #[arg(long, conflicts_with = "latest")]
        id: Option<String>,

        /// Use the most recent saved study (the default without --id).
        #[arg(long, default_value_t = false)]
        latest: bool,

        /// Entry style: breakout or pullback.
        #[arg(long, default_value = "breakout")]
        mode: Mode,

        #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
        format: ReportFormat,

        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Saved studies.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print the blake3 hash of a password for a local user entry.
    HashPassword { password: String },
}

#[derive(Subcommand)]
enum LevelsAction {
    /// Add a level.
    Add {
        #[arg(long)]
        symbol: Option<String>,

        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// support, resistance or undefined.
        #[arg(long = "type")]
        level_type: LevelType,

        /// Either decimal convention.
        #[arg(long)]
        price: String,

        /// When the level was observed.
        #[arg(long, value_parser = parse_time_arg)]
        at: Option<DateTime<Utc>>,
    },
    /// List levels, highest price first.
    List {
        #[arg(long)]
        symbol: Option<String>,

        #[arg(long)]
        timeframe: Option<Timeframe>,
    },
    /// Delete a level by id.
    Rm { id: String },
    /// Export levels as CSV.
    Export {
        #[arg(long)]
        symbol: Option<String>,

        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Delete a saved study by id.
    Rm { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the config file path.
    Path,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

fn parse_time_arg(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("invalid timestamp '{raw}'"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;
    init_logging(&config);

    match &cli.command {
        Commands::HashPassword { password } => {
            println!("{}", hash_password(password));
            return Ok(());
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => print!("{}", config.to_toml()?),
                ConfigAction::Path => println!("{}", config_path.display()),
            }
            return Ok(());
        }
        _ => {}
    }

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let backend = create_backend(&config, &base_dir)?;
    let session_path = cli.session.clone().unwrap_or_else(session::default_path);
    session::restore(&session_path, backend.auth.as_ref());

    let app = App {
        config: &config,
        backend: &backend,
        session_path: &session_path,
    };

    match cli.command {
        Commands::Login { email, password } => app.login(&email, &password),
        Commands::Logout => app.logout(),
        Commands::Whoami => app.whoami(),
        Commands::Levels { action } => match action {
            LevelsAction::Add {
                symbol,
                timeframe,
                level_type,
                price,
                at,
            } => app.add_level(symbol, timeframe, level_type, price, at),
            LevelsAction::List { symbol, timeframe } => app.list_levels(symbol, timeframe),
            LevelsAction::Rm { id } => {
                app.journal()?.remove_level(&LevelId::new(id.as_str()))?;
                println!("Removed level {id}");
                Ok(())
            }
            LevelsAction::Export {
                symbol,
                timeframe,
                output,
            } => app.export_levels(symbol, timeframe, output),
        },
        Commands::Study {
            symbol,
            timeframe,
            from,
            to,
            price,
            atr,
            rsi_k,
            rsi_d,
            ema20,
            ema200,
            vwap,
            vol_avg,
            save,
            json,
        } => {
            let request = StudyRequest {
                symbol: symbol.unwrap_or_else(|| config.journal.default_symbol.clone()),
                timeframe: timeframe.unwrap_or(config.journal.default_timeframe),
                from,
                to,
                inputs: RawIndicatorInputs {
                    price,
                    atr,
                    rsi_k,
                    rsi_d,
                    ema20,
                    ema200,
                    vwap,
                    vol_avg,
                },
            };
            app.study(&request, save, json)
        }
        Commands::Exec {
            id,
            mode,
            format,
            output,
            ..
        } => app.exec(id, mode, format, output),
        Commands::Snapshot { action } => match action {
            SnapshotAction::Rm { id } => {
                app.journal()?.remove_snapshot(&SnapshotId::new(id.as_str()))?;
                println!("Removed snapshot {id}");
                Ok(())
            }
        },
        Commands::Config { .. } | Commands::HashPassword { .. } => Ok(()),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("xrpaper")
        .join("config.toml")
}

/// A missing config file means defaults plus environment overrides.
fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        return AppConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    let mut config = AppConfig::default();
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins over `logging.filter`. Logs go to stderr so reports can be piped.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

struct App<'a> {
    config: &'a AppConfig,
    backend: &'a Backend,
    session_path: &'a Path,
}

impl<'a> App<'a> {
    fn journal(&self) -> Result<Journal<'a>> {
        let policy = create_mood_policy(&self.config.mood)?;
        Ok(Journal::new(
            self.backend.store.levels(),
            self.backend.store.snapshots(),
            self.backend.auth.as_ref(),
            policy,
        ))
    }

    fn symbol(&self, symbol: Option<String>) -> String {
        symbol.unwrap_or_else(|| self.config.journal.default_symbol.clone())
    }

    fn login(&self, email: &str, password: &str) -> Result<()> {
        let session = self.backend.auth.sign_in_with_password(email, password)?;
        session::save(self.session_path, &session)?;
        println!("Signed in as {} ({})", session.email, session.user_id);
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        let result = self.backend.auth.sign_out();
        session::clear(self.session_path)?;
        result?;
        println!("Signed out");
        Ok(())
    }

    fn whoami(&self) -> Result<()> {
        match self.backend.auth.current_session() {
            Some(s) => println!("{} ({})", s.email, s.user_id),
            None => println!("Not signed in"),
        }
        Ok(())
    }

    fn add_level(
        &self,
        symbol: Option<String>,
        timeframe: Option<Timeframe>,
        level_type: LevelType,
        price: String,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let level = self.journal()?.add_level(LevelInput {
            symbol: self.symbol(symbol),
            timeframe: timeframe.unwrap_or(self.config.journal.default_timeframe),
            level_type,
            price,
            observed_at: at,
        })?;
        println!(
            "Added level {}: {} {} {} @ {}",
            level.id,
            level.symbol,
            level.timeframe,
            level.level_type,
            format_price(Some(level.price))
        );
        Ok(())
    }

    fn list_levels(&self, symbol: Option<String>, timeframe: Option<Timeframe>) -> Result<()> {
        let levels = self.journal()?.list_levels(&self.symbol(symbol), timeframe)?;
        if levels.is_empty() {
            println!("No levels");
            return Ok(());
        }
        println!("{:>6}  {:<4}  {:<10}  {:>14}", "id", "tf", "type", "price");
        for level in &levels {
            println!(
                "{:>6}  {:<4}  {:<10}  {:>14}",
                level.id.as_str(),
                level.timeframe.as_str(),
                level.level_type.as_str(),
                format_price(Some(level.price))
            );
        }
        Ok(())
    }

    fn export_levels(
        &self,
        symbol: Option<String>,
        timeframe: Option<Timeframe>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let levels = self.journal()?.list_levels(&self.symbol(symbol), timeframe)?;
        match output {
            Some(path) => {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                write_levels(&levels, file)?;
                println!("Exported {} levels to {}", levels.len(), path.display());
            }
            None => write_levels(&levels, std::io::stdout().lock())?,
        }
        Ok(())
    }

    fn study(&self, request: &StudyRequest, save: bool, json: bool) -> Result<()> {
        let journal = self.journal()?;
        let view = journal.study(request)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&view)?);
        } else {
            print_study(&view);
        }
        if save {
            let id = journal.save_study(&view)?;
            println!("Saved snapshot {id}");
        }
        Ok(())
    }

    fn exec(
        &self,
        id: Option<String>,
        mode: Mode,
        format: ReportFormat,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let journal = self.journal()?;
        let view = match &id {
            Some(id) => journal.execution_view(&SnapshotId::new(id.as_str()), mode)?,
            None => journal.latest_execution_view(mode)?,
        };
        let Some(view) = view else {
            match id {
                Some(id) => bail!("snapshot {id} not found"),
                None => bail!("no saved studies yet; run `xrpaper study --save` first"),
            }
        };
        debug!(id = %view.snapshot.id, %mode, "rendering execution view");

        let report = match format {
            ReportFormat::Markdown => render_execution(&view),
            ReportFormat::Json => render_execution_json(&view)?,
        };
        match output {
            Some(path) => {
                std::fs::write(&path, report)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Report saved to: {}", path.display());
            }
            None => {
                let mut out = std::io::stdout().lock();
                out.write_all(report.as_bytes())?;
                if !report.ends_with('\n') {
                    writeln!(out)?;
                }
            }
        }
        Ok(())
    }
}

fn print_study(view: &StudyView) {
    println!("=== {} {} ===", view.symbol, view.timeframe);
    println!(
        "Price: {}  ATR: {} ({})",
        format_price(view.inputs.price),
        format_num(view.inputs.atr),
        format_pct(view.atr_pct)
    );
    println!("Mood: {} ({})", view.mood.mood, view.mood.policy);
    for condition in &view.mood.conditions {
        println!("  - {condition}");
    }
    println!();
    if view.merged.is_empty() {
        println!("No levels");
    } else {
        for level in &view.merged {
            println!("{:>14}  {}", format_price(Some(level.price())), merged_label(level));
        }
    }
    println!();
    let n = &view.nearest;
    println!(
        "S1: {}  S2: {}  R1: {}  R2: {}",
        format_price(n.support1),
        format_price(n.support2),
        format_price(n.resistance1),
        format_price(n.resistance2)
    );
}

fn merged_label(level: &MergedLevel) -> String {
    match level {
        MergedLevel::Hl(l) => format!("HL #{} {}", l.id, l.level_type),
        MergedLevel::Overlay(o) => o.label.clone(),
    }
}
