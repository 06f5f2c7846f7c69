//! CLI entry point for the delegate semaphore dashboard.
//!
//! Logs a user in, loads the merged location table, applies the requested
//! filters and writes the resulting dashboard report.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use delegate_semaphore::analyzers::analyzer::analyze;
use delegate_semaphore::analyzers::scope::{Choice, ScopeSelection};
use delegate_semaphore::analyzers::writetos3::{publish_report, report_key};
use delegate_semaphore::auth::{AuthenticatedUser, UserDirectory, hash_password, login};
use delegate_semaphore::config::Settings;
use delegate_semaphore::output::{DashboardReport, append_record, write_report};
use delegate_semaphore::table::{TableCache, Tracking};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "delegate_semaphore")]
#[command(about = "Delegate assignment semaphore for polling locations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Session {
    /// Username; its tokens decide which provinces are visible
    #[arg(short, long)]
    user: String,

    /// Password (falls back to DASHBOARD_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,

    /// control_electoral or conteo_rapido
    #[arg(short, long, default_value = "control_electoral")]
    tracking: String,

    /// Geography table (.xlsx or .csv); defaults to GEOGRAPHY_FILE
    #[arg(short, long)]
    geography: Option<String>,

    #[arg(long)]
    province: Option<String>,

    #[arg(long)]
    sub_division: Option<String>,

    #[arg(long)]
    canton: Option<String>,

    #[arg(long)]
    parish: Option<String>,
}

impl Session {
    fn selection(&self) -> ScopeSelection {
        ScopeSelection {
            province: Choice::parse(self.province.as_deref()),
            sub_division: Choice::parse(self.sub_division.as_deref()),
            canton: Choice::parse(self.canton.as_deref()),
            parish: Choice::parse(self.parish.as_deref()),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the dashboard for a user and selection and write it as JSON
    Report {
        #[command(flatten)]
        session: Session,

        /// Output file, or - for stdout
        #[arg(short, long, default_value = "-")]
        output: String,

        /// Gzip compress the report
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Optional: S3 bucket to publish the report to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Optional: CSV file to append the summary row to
        #[arg(long)]
        history: Option<String>,
    },
    /// Print the filter choices offered to a user for a selection
    Options {
        #[command(flatten)]
        session: Session,
    },
    /// Print the SHA-256 hash to store in the users file
    HashPassword {
        #[arg(value_name = "PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/delegate_semaphore.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("delegate_semaphore.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            session,
            output,
            gzip,
            s3_bucket,
            history,
        } => {
            let settings = Settings::from_env()?;
            let Some((user, report)) = build_report(&settings, &session).await? else {
                return Ok(());
            };

            let bytes = report.encode(gzip)?;
            write_report(&output, &bytes)?;

            if let Some(path) = history {
                match report.summary_record() {
                    Some(record) => append_record(&path, &record)?,
                    None => info!(path, "Empty dashboard, history not updated"),
                }
            }

            if let Some(bucket) = s3_bucket {
                let config = aws_config::load_from_env().await;
                let s3 = aws_sdk_s3::Client::new(&config);
                let stamp = report.generated_at.format("%Y%m%dT%H%M%SZ").to_string();
                let key = report_key(report.tracking.query_name(), &user.username, &stamp, gzip);
                if let Err(e) = publish_report(&s3, &bucket, &key, bytes, gzip).await {
                    error!(error = %e, "Failed to publish report");
                }
            }
        }
        Commands::Options { session } => {
            let settings = Settings::from_env()?;
            if let Some((_, report)) = build_report(&settings, &session).await? {
                let options = serde_json::to_string_pretty(&report.dashboard.options)?;
                println!("{options}");
            }
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password));
        }
    }

    Ok(())
}

/// Login, load and analyze. `Ok(None)` when the user was turned away or the
/// selection was rejected; both are logged and are not process failures.
#[tracing::instrument(skip(settings, session), fields(user = %session.user))]
async fn build_report(
    settings: &Settings,
    session: &Session,
) -> Result<Option<(AuthenticatedUser, DashboardReport)>> {
    let tracking: Tracking = session.tracking.parse()?;
    let password = match &session.password {
        Some(p) => p.clone(),
        None => std::env::var("DASHBOARD_PASSWORD")
            .context("--password or DASHBOARD_PASSWORD must be set")?,
    };

    let users = UserDirectory::load(&settings.users_file)?;
    if users.is_empty() {
        bail!("users file {} has no entries", settings.users_file);
    }
    let user = match login(&users, &session.user, &password) {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Login failed");
            return Ok(None);
        }
    };

    let cache = TableCache::new(settings.table_loader(session.geography.as_deref())?);
    let table = cache.get(tracking).await?;

    let dashboard = match analyze(&table, &user.scope, &session.selection()) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "Selection rejected");
            return Ok(None);
        }
    };
    for notice in &dashboard.notices {
        warn!(%notice, "Notice");
    }

    Ok(Some((
        user.clone(),
        DashboardReport::new(user, tracking, dashboard),
    )))
}
