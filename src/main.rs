//! `spacerate` CLI: price a booking against a JSON snapshot.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::error;
use uuid::Uuid;

use spacerate::pricing::{PricingOptions, PricingService, SnapshotStore};
use spacerate::{telemetry, AppCache, AppError, Settings};

#[derive(Debug, Parser)]
#[command(name = "spacerate", about = "Price a space booking from a JSON snapshot")]
struct Cli {
    /// Snapshot of entities, ratesheets and surge configs
    snapshot: PathBuf,
    /// SubLocation to price
    sub_location_id: Uuid,
    /// Booking start (RFC 3339)
    #[arg(value_parser = parse_instant)]
    start: DateTime<Utc>,
    /// Booking end (RFC 3339), exclusive
    #[arg(value_parser = parse_instant)]
    end: DateTime<Utc>,
    /// Evaluate DURATION_BASED windows, measured from REFERENCE or the booking start
    #[arg(
        long,
        value_name = "REFERENCE",
        num_args = 0..=1,
        require_equals = true,
        value_parser = parse_instant
    )]
    duration_context: Option<Option<DateTime<Utc>>>,
    /// Only this event's rules are eligible
    #[arg(long, value_name = "EVENT_ID")]
    event: Option<Uuid>,
    /// Mark the booking as an event booking
    #[arg(long)]
    event_booking: bool,
    /// Skip Location and Customer ratesheets
    #[arg(long)]
    sub_location_only: bool,
}

impl Cli {
    fn options(&self) -> PricingOptions {
        PricingOptions {
            use_duration_context: self.duration_context.is_some(),
            booking_reference: self.duration_context.flatten(),
            is_event_booking: self.event_booking,
            event_id: self.event,
            sub_location_only: self.sub_location_only,
        }
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{raw}': {e}"))
}

async fn run(cli: Cli, settings: Settings) -> Result<String, AppError> {
    let json = tokio::fs::read_to_string(&cli.snapshot).await?;
    let store = SnapshotStore::from_json(&json)?;

    let options = cli.options();
    let service = PricingService::new(Arc::new(store), AppCache::new(&settings), settings);
    let result = service
        .resolve_price(cli.sub_location_id, cli.start, cli.end, options)
        .await?;

    Ok(serde_json::to_string_pretty(&result)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    telemetry::init(&settings.log_filter);

    match run(cli, settings).await {
        Ok(output) => {
            println!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{e}");
            let code = u8::try_from(e.exit_code()).unwrap_or(1);
            Ok(ExitCode::from(code))
        }
    }
}
