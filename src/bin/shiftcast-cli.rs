#![forbid(unsafe_code)]
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shiftcast::{
    config::{load_config, AppConfig},
    forecast::{forecast, ForecastError},
    io,
    notification::{Dispatcher, OutboxTransport},
    policy::export_policy_json,
    storage::{JsonShiftStore, ShiftStore},
    TargetMonth,
};
use clap::{Parser, Subcommand};
use serde_json::json;
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de planification des équipes (sans base de données)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Configuration JSON (politique, prévision, notifications)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prévoir la demande à partir d'un historique CSV (`ds`,`y`)
    Forecast {
        #[arg(long)]
        data: String,
        /// Nombre de jours à prévoir (> 0)
        #[arg(long, allow_negative_numbers = true)]
        days: i64,
        /// Export JSON (sinon sortie standard)
        #[arg(long)]
        out: Option<String>,
    },

    /// Générer le planning d'un mois et notifier les employés
    Generate {
        /// Mois cible YYYY-MM
        #[arg(long)]
        month: String,
        #[arg(long)]
        history: String,
        #[arg(long)]
        employees: String,
        /// Fichier JSON des shifts
        #[arg(long, default_value = "shifts.json")]
        shifts: String,
        /// Répertoire où sont déposés les messages
        #[arg(long, default_value = "outbox")]
        outbox: String,
        /// Graine du tirage aléatoire (reproductible)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Lister les shifts d'un mois et optionnellement exporter
    List {
        #[arg(long)]
        month: String,
        #[arg(long, default_value = "shifts.json")]
        shifts: String,
        /// CSV d'employés pour afficher les noms
        #[arg(long)]
        employees: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
    },

    /// Afficher la politique d'effectifs effective
    Policy {
        #[arg(long)]
        out: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    let code = match cli.cmd {
        Commands::Forecast { data, days, out } => run_forecast(&config, &data, days, out.as_deref()),
        Commands::Generate {
            month,
            history,
            employees,
            shifts,
            outbox,
            seed,
        } => {
            let month: TargetMonth = month.parse()?;
            let history = io::read_history_csv(&history)?;
            let employees = io::import_employees_csv(&employees)?;
            let mut store = JsonShiftStore::open(&shifts)?;
            let transport = OutboxTransport::new(&outbox).with_sender(config.notification.sender.clone());
            let renderer = config.renderer();
            let dispatcher = Dispatcher::new(&transport, &renderer);
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };

            let report = config
                .generator()
                .run(month, &employees, &history, &mut store, &dispatcher, &mut rng)
                .with_context(|| format!("schedule generation failed for {month}"))?;
            println!(
                "{}: {} shift(s) created ({} unassigned), {} cleared; notifications: {} sent, {} failed",
                report.month,
                report.created,
                report.unassigned,
                report.cleared,
                report.notifications.sent,
                report.notifications.failed
            );
            0
        }
        Commands::List {
            month,
            shifts,
            employees,
            out_csv,
        } => {
            let month: TargetMonth = month.parse()?;
            let store = JsonShiftStore::open(&shifts)?;
            let (start, end) = month.range();
            let slots = store.shifts_in_range(start, end)?;
            let employees = match employees {
                Some(path) => io::import_employees_csv(path)?,
                None => Vec::new(),
            };
            if let Some(path) = out_csv {
                io::export_shifts_csv(path, &slots, &employees)?;
            }
            // impression compacte
            for s in &slots {
                let assigned = s
                    .employee
                    .as_ref()
                    .map(|id| {
                        employees
                            .iter()
                            .find(|e| e.id == *id)
                            .map(|e| e.name.as_str())
                            .unwrap_or(id.as_str())
                    })
                    .unwrap_or("-");
                println!(
                    "{} | {} | {} → {} | {} | {}",
                    s.id.as_str(),
                    s.shift_type,
                    s.start.to_rfc3339(),
                    s.end.to_rfc3339(),
                    s.position,
                    assigned
                );
            }
            0
        }
        Commands::Policy { out } => {
            if let Some(path) = out {
                export_policy_json(path, &config.policy)?;
            } else {
                println!("{}", serde_json::to_string_pretty(&config.policy)?);
            }
            0
        }
    };

    std::process::exit(code);
}

/// Sortie structurée : JSON sur stdout, ou `{"error", "kind"}` sur stderr et code 1.
fn run_forecast(config: &AppConfig, data: &str, days: i64, out: Option<&str>) -> i32 {
    let result = u32::try_from(days)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| {
            ForecastError::InvalidInput("periods to predict must be a positive integer".to_string())
        })
        .and_then(|days| {
            let history = io::read_history_csv(data)?;
            forecast(&history, days, &config.forecast)
        });

    let points = match result {
        Ok(points) => points,
        Err(err) => {
            eprintln!("{}", json!({ "error": err.to_string(), "kind": err.kind() }));
            return 1;
        }
    };

    let written = match out {
        Some(path) => io::export_forecast_json(path, &points),
        None => io::write_forecast_json(std::io::stdout().lock(), &points),
    };
    if let Err(err) = written {
        eprintln!("{}", json!({ "error": err.to_string(), "kind": "output" }));
        return 1;
    }
    0
}
