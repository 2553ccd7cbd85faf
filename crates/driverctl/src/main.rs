pub(crate) mod cli;
pub(crate) mod error;

use std::io::Write;
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use core_dataapi::aws::RedshiftDataClient;
use core_driver::decoder::Value;
use core_driver::{AsyncDb, Connection, Driver, QueryContext, Rows};
use dotenv::dotenv;
use futures::TryStreamExt;
use serde_json::json;
use snafu::ResultExt;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Command;
use crate::error::{self as cli_error, CliResult};

const TARGETS: [&str; 3] = ["driverctl", "core_driver", "core_dataapi"];

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let opts = cli::CliOpts::parse();

    setup_tracing(&opts);

    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "driverctl failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: cli::CliOpts) -> CliResult<()> {
    let settings = opts.data_source_settings()?;
    let service = Arc::new(RedshiftDataClient::from_settings(&settings).await);
    let driver = Driver::new(service, &settings).context(cli_error::DriverSnafu)?;
    let conn = driver.open();

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let ctx = opts.query_context(cancel);

    let mut out = std::io::stdout();
    let res = execute(&conn, &ctx, opts.command, &mut out).await;
    conn.close();
    res
}

async fn execute<W: Write>(
    conn: &Connection,
    ctx: &QueryContext,
    command: Command,
    out: &mut W,
) -> CliResult<()> {
    match command {
        Command::Query { sql } => {
            let rows = conn.query(ctx, &sql).await.context(cli_error::DriverSnafu)?;
            write_rows(rows, out).await
        }
        Command::Ping => {
            conn.ping(ctx).await.context(cli_error::DriverSnafu)?;
            write_line(out, &json!({ "ok": true }))
        }
        Command::Start { sql } => {
            let id = conn
                .start_query(ctx, &sql)
                .await
                .context(cli_error::DriverSnafu)?;
            write_line(out, &json!({ "id": id }))
        }
        Command::Status { id } => {
            let status = conn
                .query_status(ctx, &id)
                .await
                .context(cli_error::DriverSnafu)?;
            write_line(out, &json!({ "id": id, "status": status }))
        }
        Command::Rows { id } => {
            let rows = conn
                .get_rows(ctx, &id)
                .await
                .context(cli_error::DriverSnafu)?;
            write_rows(rows, out).await
        }
        Command::Cancel { id } => {
            conn.cancel_query(ctx, &id)
                .await
                .context(cli_error::DriverSnafu)?;
            write_line(out, &json!({ "id": id, "canceled": true }))
        }
    }
}

/// Header line with column metadata, then one JSON array per row.
async fn write_rows<W: Write>(rows: Rows, out: &mut W) -> CliResult<()> {
    let columns: Vec<_> = (0..rows.column_metadata().len())
        .map(|i| {
            json!({
                "name": rows.column_metadata()[i].name,
                "type": rows.database_type_name(i),
                "nativeType": rows.native_type(i),
                "nullable": rows.is_nullable(i),
            })
        })
        .collect();
    write_line(out, &json!({ "statementId": rows.statement_id(), "columns": columns }))?;

    let mut stream = pin!(rows.into_stream());
    let mut count: usize = 0;
    while let Some(row) = stream.try_next().await.context(cli_error::DriverSnafu)? {
        write_line::<_, Vec<Value>>(out, &row)?;
        count += 1;
    }
    tracing::debug!(rows = count, "Rows written");
    Ok(())
}

fn write_line<W: Write, T: serde::Serialize>(out: &mut W, value: &T) -> CliResult<()> {
    let line = serde_json::to_string(value).context(cli_error::SerializeSnafu)?;
    writeln!(out, "{line}").context(cli_error::OutputSnafu)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if signal::ctrl_c().await.is_ok() {
        tracing::warn!("Ctrl+C received, interrupting");
        cancel.cancel();
    }
}

fn setup_tracing(opts: &cli::CliOpts) {
    let targets_with_level = |level: LevelFilter| -> Vec<(&str, LevelFilter)> {
        TARGETS.iter().map(|t| ((*t), level)).collect()
    };
    let level: LevelFilter = opts.tracing_level.clone().into();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(match std::env::var("RUST_LOG") {
                    Ok(val) => match val.parse::<Targets>() {
                        Ok(log_targets_from_env) => log_targets_from_env,
                        Err(err) => {
                            eprintln!("Failed to parse RUST_LOG: {err:?}");
                            Targets::default()
                                .with_targets(targets_with_level(LevelFilter::DEBUG))
                                .with_default(LevelFilter::WARN)
                        }
                    },
                    _ => Targets::default()
                        .with_targets(targets_with_level(level))
                        .with_default(LevelFilter::WARN),
                }),
        )
        .init();
}
