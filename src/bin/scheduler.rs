//! Scheduler trigger
//!
//! Calls one of the `/admin` job endpoints with the service role key, for
//! use from cron or a cloud scheduler. Exits non-zero when the call fails.

use std::process::ExitCode;
use std::time::Duration;
use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "scheduler")]
#[command(version, about = "Trigger Vietnam Hearts scheduler jobs")]
struct Cli {
    /// Base URL of the running service
    #[arg(long, env = "SCHEDULER_BASE_URL", default_value = "http://localhost:8080", global = true)]
    base_url: String,

    /// Supabase service role key sent in the `apikey` header
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "300", global = true)]
    timeout: u64,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Operation {
    /// Import accepted signups and send their confirmation emails
    SyncVolunteers,
    /// Send this week's reminder emails
    SendWeeklyReminders,
    /// Send confirmation emails to volunteers that have none
    SendConfirmationEmails,
    /// Advance the schedule sheets by one week
    RotateSchedule {
        /// Override the number of visible weeks
        #[arg(long)]
        display_weeks: Option<u32>,
    },
    /// Check Sheets connectivity through the service
    HealthCheck,
}

impl Operation {
    fn endpoint(&self) -> (Method, String) {
        match self {
            Operation::SyncVolunteers => (Method::POST, "/admin/sync-volunteers".to_string()),
            Operation::SendWeeklyReminders => (Method::POST, "/admin/send-weekly-reminders".to_string()),
            Operation::SendConfirmationEmails => (Method::POST, "/admin/send-confirmation-emails".to_string()),
            Operation::RotateSchedule { display_weeks: Some(weeks) } => {
                (Method::POST, format!("/admin/rotate-schedule?display_weeks={}", weeks))
            }
            Operation::RotateSchedule { display_weeks: None } => (Method::POST, "/admin/rotate-schedule".to_string()),
            Operation::HealthCheck => (Method::GET, "/admin/scheduler-health".to_string()),
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<Value> {
    let api_key = cli
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| anyhow::anyhow!("SUPABASE_SERVICE_ROLE_KEY is not set"))?;

    let (method, path) = cli.operation.endpoint();
    let url = format!("{}{}", cli.base_url.trim_end_matches('/'), path);
    info!(%method, %url, "Calling scheduler endpoint");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()?;
    let response = client
        .request(method, &url)
        .header("apikey", api_key)
        .header("content-type", "application/json")
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));

    if !status.is_success() {
        anyhow::bail!("{} returned {}: {}", path, status.as_u16(), body);
    }
    Ok(body)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(operation = ?cli.operation, error = %e, "Scheduler operation failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operations() {
        let cli = Cli::try_parse_from(["scheduler", "--api-key", "k", "rotate-schedule", "--display-weeks", "3"]).unwrap();
        assert_eq!(cli.operation, Operation::RotateSchedule { display_weeks: Some(3) });
        assert_eq!(
            cli.operation.endpoint(),
            (Method::POST, "/admin/rotate-schedule?display_weeks=3".to_string())
        );

        let cli = Cli::try_parse_from(["scheduler", "health-check"]).unwrap();
        assert_eq!(cli.operation.endpoint(), (Method::GET, "/admin/scheduler-health".to_string()));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        assert!(Cli::try_parse_from(["scheduler", "drop-tables"]).is_err());
    }
}
