//! Purpose: Hold top-level CLI command dispatch for `widerow`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Scan rows are written as they are yielded, so rows printed before an error stay printed.
//! Invariants: Helpers in `main.rs` remain the source of command business logic.

use super::*;
use std::io::Write;
use widerow::api::wire::{WireBound, WireRange, WireRow};
use widerow::api::{Scan, ScanOptions, decode, encode};

pub(super) fn dispatch_command(
    command: Command,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "widerow", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Scan(args) => {
            init_tracing("warn");
            run_scan(&args)?;
            Ok(RunOutcome::ok())
        }
        Command::PrefixRange { prefix, hex } => {
            let bytes = parse_key(&prefix, hex, "PREFIX")?;
            let range = RowRange::prefix(bytes.clone());
            let wire = WireRange {
                start: WireBound::from(range.start()),
                end: WireBound::from(range.end()),
            };
            emit_json(
                json!({
                    "prefix": hex::encode(&bytes),
                    "range": wire,
                    "unbounded_end": widerow::api::prefix_successor(&bytes).is_none(),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Encode { kind, value } => {
            let kind = ValueKind::from(kind);
            let value = value_json::parse_cli_value(kind, &value)?;
            let bytes = encode(&value)?;
            emit_json(
                json!({
                    "type": kind.as_str(),
                    "hex": hex::encode(bytes),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Decode { kind, hex } => {
            let kind = ValueKind::from(kind);
            let bytes = hex::decode(hex.trim()).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("cell bytes are not valid hex")
                    .with_source(err)
            })?;
            let value = decode(kind, &bytes)?;
            emit_json(
                json!({
                    "type": kind.as_str(),
                    "value": value_json::value_to_json(&value)?,
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let config = serve_config_from_args(args)?;
            init_tracing("info");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(RunOutcome::ok())
        }
    }
}

fn run_scan(args: &ScanArgs) -> Result<(), Error> {
    let row_set = build_row_set(&args.range)?;
    let mut options = ScanOptions::new().with_batch_size(args.batch_size);
    if let Some(filter) = parse_filter_json(args.filter_json.as_deref())? {
        options = options.with_filter(filter);
    }
    let (fetcher, table) = resolve_scan_target(args)?;
    let mut scan = Scan::open(fetcher.as_ref(), table, row_set, options)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut emitted = 0usize;
    while args.limit.is_none_or(|limit| emitted < limit) {
        let Some(row) = scan.next_row()? else {
            break;
        };
        let line = serde_json::to_string(&WireRow::from(&row)).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode row json")
                .with_source(err)
        })?;
        if let Err(err) = writeln!(out, "{line}") {
            if err.kind() == io::ErrorKind::BrokenPipe {
                break;
            }
            return Err(Error::new(ErrorKind::Io)
                .with_message("failed to write row")
                .with_source(err));
        }
        emitted += 1;
    }
    scan.close();
    match out.flush() {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => Err(Error::new(ErrorKind::Io)
            .with_message("failed to flush output")
            .with_source(err)),
        _ => Ok(()),
    }
}
