//! sql-diagnostics - SQL Server diagnostic report generator.

use sql_diagnostics::cli::Cli;
use sql_diagnostics::config::ConnectionConfig;
use sql_diagnostics::confirm::{prompt_confirmation, Confirmation};
use sql_diagnostics::error::Result;
use sql_diagnostics::logging;
use sql_diagnostics::report::ReportRunner;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = logging::init(cli.log_file.as_deref()) {
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(e.exit_code());
    }
    let logs_to_file = cli.log_file.is_some();

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        if logs_to_file {
            eprintln!("{}: {}", e.category(), e);
        }
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.to_settings()?;

    let confirmation = if cli.yes {
        Confirmation::assumed()
    } else {
        let target = ConnectionConfig::load_from_file(&settings.config_path)?.display_string();
        let catalog = settings.catalog_path.display().to_string();
        prompt_confirmation(std::io::stdin().lock(), std::io::stdout(), &target, &catalog)?
    };

    // Ctrl-C stops the run at the next safe point.
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current query");
            token.cancel();
        }
    });

    let runner = ReportRunner::with_default_connector(settings);
    let summaries = runner.run_schedule(&confirmation, &cancel).await?;

    for (n, summary) in summaries.iter().enumerate() {
        info!(
            "Run {}: {} executed, {} failed, {} skipped in {:?} -> {}",
            n + 1,
            summary.executed,
            summary.failed,
            summary.skipped,
            summary.elapsed,
            summary.artifact.display()
        );
    }
    Ok(())
}
