use anyhow::{anyhow, bail, Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vigil::kernel::time::Timestamp;
use vigil::report::JsonFileSink;
use vigil::session::{InMemorySessionDirectory, SessionRequest, SessionStatus};
use vigil::{MonitorConfig, Observation, RequesterRole, SessionLifecycleBinder};

const USAGE: &str = "usage: vigil <observations.jsonl | -> [--config <file>] [--out <dir>] [--end-ms <ms>]";

struct Args {
    input: String,
    config: Option<PathBuf>,
    out: PathBuf,
    end_ms: Option<u64>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut input = None;
    let mut config = None;
    let mut out = PathBuf::from("reports");
    let mut end_ms = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(args.next().ok_or_else(|| anyhow!(USAGE))?)),
            "--out" => out = PathBuf::from(args.next().ok_or_else(|| anyhow!(USAGE))?),
            "--end-ms" => {
                let value = args.next().ok_or_else(|| anyhow!(USAGE))?;
                end_ms = Some(value.parse().with_context(|| format!("--end-ms: {:?}", value))?);
            }
            "-h" | "--help" => bail!(USAGE),
            _ if input.is_none() => input = Some(arg),
            _ => bail!("unexpected argument {:?}\n{}", arg, USAGE),
        }
    }

    Ok(Args {
        input: input.ok_or_else(|| anyhow!(USAGE))?,
        config,
        out,
        end_ms,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    }
    .with_env_overrides()?;

    let directory = Arc::new(InMemorySessionDirectory::new());
    let sink = Arc::new(JsonFileSink::new(&args.out));
    let binder = SessionLifecycleBinder::new(config, directory.clone(), sink);

    tracing::info!(input = %args.input, out = %args.out.display(), "Replaying observations");

    let reader: Box<dyn AsyncBufRead + Unpin> = if args.input == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&args.input)
            .await
            .with_context(|| format!("opening {}", args.input))?;
        Box::new(BufReader::new(file))
    };

    // Session -> latest observed timestamp
    let mut sessions: BTreeMap<String, Timestamp> = BTreeMap::new();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let observation: Observation = match serde_json::from_str(&line) {
            Ok(obs) => obs,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping malformed observation");
                continue;
            }
        };

        let session_id = observation.session_id.clone();
        if !sessions.contains_key(&session_id) {
            directory.register(&session_id, true).await;
            directory.request(&session_id, SessionRequest::OpenLobby).await?;
            directory.request(&session_id, SessionRequest::Begin).await?;
            binder.start_monitoring(&session_id, Timestamp::ZERO).await?;
        }

        let last = sessions.entry(session_id).or_insert(observation.timestamp);
        *last = (*last).max(observation.timestamp);

        binder.ingest(observation).await;
    }

    let gate = binder.gate();
    for (session_id, last_seen) in &sessions {
        let end = args.end_ms.map(Timestamp::from_millis).unwrap_or(*last_seen);
        let status = directory.request(session_id, SessionRequest::End).await?;
        if status != SessionStatus::Ended {
            tracing::warn!(session = %session_id, ?status, "Session did not end cleanly");
        }

        binder.on_session_status(session_id, status, end).await?;

        if let Some(report) = gate.read_report(session_id, RequesterRole::Interviewer).await {
            println!(
                "{}: risk={:?} signals={} coverage={:.1}% ({:.1}s of {:.1}s)",
                session_id,
                report.risk_level,
                report.signals.len(),
                report.signal_percentage * 100.0,
                report.signal_duration,
                report.total_duration
            );
        }
    }

    let snapshot = binder.telemetry().await;
    println!(
        "sessions={} reports={} raised={} resolved={} truncated={} dropped={}",
        snapshot.session_stats.started,
        snapshot.session_stats.reports,
        snapshot.signal_stats.raised,
        snapshot.signal_stats.resolved,
        snapshot.signal_stats.truncated,
        snapshot.drop_stats.total()
    );

    Ok(())
}
