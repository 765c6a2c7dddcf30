use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use rts_engine::{
    Dispatcher, ExecutionSlot, LoadRequest, ProcedureCatalog, RejectingSubsystem, Scheduler, SimulatedClock, SystemClock,
    build_timeline, drive_until_idle, load_request_file, parse_load_request, parse_procedure, render_procedure, resolve_request,
    rtsload,
};
use rts_types::SlotStatus;
use rts_util::{EngineSettings, expand_tilde, load_settings, load_settings_from, parse_activation_time, procedure_id_from_path};
use serde::Serialize;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("parse", sub)) => run_parse(sub),
        Some(("request", sub)) => run_request(sub),
        Some(("timeline", sub)) => run_timeline(sub),
        Some(("run", sub)) => run_procedures(sub, &resolve_settings(&matches)?).await,
        _ => bail!("expected a subcommand; see --help"),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let procedures = Arg::new("procedures")
        .long("procedures")
        .short('p')
        .action(ArgAction::Set)
        .default_value(".")
        .help("Directory holding *.RTS procedure files");
    let request = Arg::new("request")
        .long("request")
        .short('r')
        .action(ArgAction::Set)
        .conflicts_with("load")
        .help("FOT request file with RTSLOAD lines");
    let load = Arg::new("load")
        .long("load")
        .action(ArgAction::Append)
        .help("Inline RTSLOAD line; may be repeated");
    let start = Arg::new("start")
        .long("start")
        .short('s')
        .action(ArgAction::Set)
        .help("Activation time, YYYY:DDD:HH:MM:SS[.fff] or RFC 3339 (default: now)");

    Command::new("rts")
        .about("Load, inspect, and run Relative Time Sequences")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("settings")
                .long("settings")
                .global(true)
                .action(ArgAction::Set)
                .help("Settings YAML (default: $RTS_SETTINGS_PATH or the user config directory)"),
        )
        .subcommand(
            Command::new("parse")
                .about("Parse a procedure file and print it as JSON")
                .arg(Arg::new("file").required(true).action(ArgAction::Set))
                .arg(
                    Arg::new("render")
                        .long("render")
                        .action(ArgAction::SetTrue)
                        .help("Print canonical procedure text instead of JSON"),
                ),
        )
        .subcommand(
            Command::new("request")
                .about("Parse a request file and print its loads as JSON")
                .arg(Arg::new("file").required(true).action(ArgAction::Set)),
        )
        .subcommand(
            Command::new("timeline")
                .about("Print the absolute timeline of each requested load")
                .arg(procedures.clone())
                .arg(request.clone())
                .arg(load.clone())
                .arg(start.clone())
                .arg(
                    Arg::new("format")
                        .long("format")
                        .action(ArgAction::Set)
                        .value_parser(["json", "yaml"])
                        .default_value("json"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Load and run procedures, streaming scheduler events as JSON lines")
                .arg(procedures)
                .arg(request)
                .arg(load)
                .arg(start)
                .arg(
                    Arg::new("reject")
                        .long("reject")
                        .action(ArgAction::Append)
                        .help("Mnemonic the simulated subsystem rejects; may be repeated"),
                )
                .arg(
                    Arg::new("wall-clock")
                        .long("wall-clock")
                        .action(ArgAction::SetTrue)
                        .help("Wait for real time instead of simulating it"),
                ),
        )
}

fn resolve_settings(matches: &ArgMatches) -> Result<EngineSettings> {
    match matches.get_one::<String>("settings") {
        Some(path) => {
            let path = expand_tilde(path);
            load_settings_from(&path).with_context(|| format!("Failed to load settings: {}", path.display()))
        }
        None => load_settings().context("Failed to load settings"),
    }
}

fn run_parse(matches: &ArgMatches) -> Result<()> {
    let path = file_argument(matches)?;
    let source = fs::read_to_string(&path).with_context(|| format!("Failed to read procedure file: {}", path.display()))?;
    let identifier = procedure_id_from_path(&path).unwrap_or_else(|| "procedure".to_string());
    let procedure = parse_procedure(&identifier, &source).with_context(|| format!("Invalid procedure: {}", path.display()))?;

    if matches.get_flag("render") {
        print!("{}", render_procedure(&procedure));
    } else {
        println!("{}", serde_json::to_string_pretty(&procedure)?);
    }
    Ok(())
}

fn run_request(matches: &ArgMatches) -> Result<()> {
    let requests = load_request_file(&file_argument(matches)?)?;
    println!("{}", serde_json::to_string_pretty(&requests)?);
    Ok(())
}

#[derive(Serialize)]
struct TimelineOutput {
    procedure: String,
    activation: DateTime<Utc>,
    records: Vec<rts_engine::TimelineRecord>,
}

fn run_timeline(matches: &ArgMatches) -> Result<()> {
    let catalog = load_catalog(matches)?;
    let activation = activation_time(matches)?;

    let mut outputs = Vec::new();
    for request in collect_requests(matches)? {
        let concrete = resolve_request(&catalog, &request).with_context(|| format!("RTSLOAD {} refused", request.procedure))?;
        let timeline = build_timeline(&concrete, activation)?;
        outputs.push(TimelineOutput {
            procedure: request.procedure.clone(),
            activation,
            records: timeline.records(request.slot),
        });
    }

    match matches.get_one::<String>("format").map(String::as_str) {
        Some("yaml") => print!("{}", serde_yaml::to_string(&outputs)?),
        _ => println!("{}", serde_json::to_string_pretty(&outputs)?),
    }
    Ok(())
}

async fn run_procedures(matches: &ArgMatches, settings: &EngineSettings) -> Result<()> {
    let catalog = load_catalog(matches)?;
    let activation = activation_time(matches)?;
    let requests = collect_requests(matches)?;
    let rejected: Vec<String> = matches.get_many::<String>("reject").map(|values| values.cloned().collect()).unwrap_or_default();

    let subsystem = Arc::new(RejectingSubsystem::new(rejected));
    let dispatcher = Dispatcher::from_settings(settings).with_fallback(subsystem.clone());
    let mut scheduler = Scheduler::from_settings(settings, dispatcher);
    let mut events = scheduler.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(error) => warn!(error = %error, "could not serialize scheduler event"),
            }
        }
    });

    for request in &requests {
        rtsload(&mut scheduler, &catalog, request, activation).with_context(|| format!("RTSLOAD {} refused", request.procedure))?;
    }

    if matches.get_flag("wall-clock") {
        let mut clock = SystemClock;
        let interrupted = tokio::select! {
            _ = drive_until_idle(&mut scheduler, &mut clock) => false,
            _ = tokio::signal::ctrl_c() => true,
        };
        if interrupted {
            warn!("interrupted; aborting active slots");
            let active: Vec<_> = scheduler.slots().filter(|slot| slot.status().is_active()).map(ExecutionSlot::id).collect();
            for slot in active {
                scheduler.cancel(slot)?;
            }
        }
    } else {
        drive_until_idle(&mut scheduler, &mut SimulatedClock::new(activation)).await;
    }

    let failed = scheduler.slots().filter(|slot| slot.status() == SlotStatus::Failed).count();
    for slot in scheduler.slots() {
        info!(slot = %slot.id(), procedure = %slot.procedure().identifier, status = %slot.status(), cursor = slot.cursor(), "final slot state");
    }
    info!(commands = subsystem.submissions().len(), "run finished");
    drop(scheduler);
    printer.await.context("event printer task failed")?;

    if failed > 0 {
        bail!("{failed} slot(s) failed");
    }
    Ok(())
}

fn file_argument(matches: &ArgMatches) -> Result<PathBuf> {
    let file = matches.get_one::<String>("file").context("missing file argument")?;
    Ok(expand_tilde(file))
}

fn load_catalog(matches: &ArgMatches) -> Result<ProcedureCatalog> {
    let directory = matches.get_one::<String>("procedures").map(String::as_str).unwrap_or(".");
    ProcedureCatalog::from_dir(&expand_tilde(directory))
}

fn activation_time(matches: &ArgMatches) -> Result<DateTime<Utc>> {
    match matches.get_one::<String>("start") {
        Some(text) => parse_activation_time(text).with_context(|| format!("Invalid activation time: {text}")),
        None => Ok(Utc::now()),
    }
}

fn collect_requests(matches: &ArgMatches) -> Result<Vec<LoadRequest>> {
    let mut requests = Vec::new();
    if let Some(path) = matches.get_one::<String>("request") {
        requests.extend(load_request_file(&expand_tilde(path))?);
    }
    if let Some(lines) = matches.get_many::<String>("load") {
        for line in lines {
            requests.push(parse_load_request(line).with_context(|| format!("Invalid RTSLOAD line: {line}"))?);
        }
    }
    if requests.is_empty() {
        bail!("nothing to load; pass --request FILE or --load 'RTSLOAD,...'");
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn run_accepts_repeated_rejections() {
        let matches = build_cli()
            .try_get_matches_from(["rts", "run", "--load", "RTSLOAD,A", "--reject", "X", "--reject", "Y"])
            .expect("matches");
        let (_, run) = matches.subcommand().expect("subcommand");
        let rejected: Vec<&String> = run.get_many::<String>("reject").expect("rejections").collect();
        assert_eq!(rejected, vec!["X", "Y"]);
        assert_eq!(collect_requests(run).expect("requests")[0].procedure, "A");
    }

    #[test]
    fn request_file_and_inline_loads_conflict() {
        let result = build_cli().try_get_matches_from(["rts", "timeline", "--request", "r.txt", "--load", "RTSLOAD,A"]);
        assert!(result.is_err());
    }
}
