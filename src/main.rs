//! Purpose: `widerow` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: `scan` emits one compact JSON row per line; other commands emit one JSON document.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Store access goes through `api::Fetch` (fixture-backed or remote).
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod serve;
mod value_json;

use widerow::api::{
    Error, ErrorKind, Fetch, MemoryStore, RowFilter, RowRange, RowSet, TableRef, ValueKind,
    parse_table_uri, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome { exit_code });
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `widerow --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    command_dispatch::dispatch_command(cli.command, color_mode)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

#[derive(Parser)]
#[command(
    name = "widerow",
    version,
    about = "Range scans and typed cell codecs for sorted wide-column stores",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Rows are keyed by byte strings and read in ascending key order.

Mental model:
  - `scan` reads rows from a fixture file or a remote read_rows endpoint
  - `prefix-range` shows the key range a prefix scan covers
  - `encode` / `decode` convert typed cell values to and from bytes (hex)
"#,
    after_help = r#"EXAMPLES
  $ widerow scan users --fixture fixture.json --prefix user#
  $ widerow serve --fixture fixture.json          # Terminal 1
  $ widerow scan http://127.0.0.1:9800/users --start a --end m --batch-size 50
  $ widerow encode --type integer -- -1
  $ widerow decode --type timestamp 0000000000000000

LEARN MORE
  $ widerow <command> --help
  Set RUST_LOG=debug to see batch boundaries and resume keys."#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Scan rows from a table",
        long_about = r#"Scan rows in ascending key order.

TARGET is either a table name (with --fixture) or http(s)://host:port/<table>.
Rows are fetched in batches; each batch resumes just past the last row printed."#,
        after_help = r#"EXAMPLES
  $ widerow scan users --fixture fixture.json
  $ widerow scan users --fixture fixture.json --prefix 757365 --hex
  $ widerow scan users --fixture fixture.json --key alice --key bob
  $ widerow scan http://127.0.0.1:9800/users --start b --start-exclusive --limit 10
  $ widerow scan http://127.0.0.1:9800/users --filter-json '{"cells_per_column_limit":1}'"#
    )]
    Scan(ScanArgs),
    #[command(
        name = "prefix-range",
        about = "Show the key range covered by a prefix",
        after_help = r#"EXAMPLES
  $ widerow prefix-range user#
  $ widerow prefix-range 61ff --hex      # end is "b": trailing 0xff carries
  $ widerow prefix-range ffff --hex      # end is unbounded"#
    )]
    PrefixRange {
        #[arg(help = "Key prefix")]
        prefix: String,
        #[arg(long, help = "Interpret PREFIX as hex bytes")]
        hex: bool,
    },
    #[command(
        about = "Encode a typed value to cell bytes (hex)",
        after_help = r#"EXAMPLES
  $ widerow encode --type integer 42
  $ widerow encode --type boolean true
  $ widerow encode --type timestamp 2024-01-01T00:00:00Z
  $ widerow encode --type term '{"id": 7, "tags": ["a"]}'"#
    )]
    Encode {
        #[arg(long = "type", value_enum, help = "Value type")]
        kind: ValueKindCli,
        #[arg(help = "Value text (hex for raw, JSON for structured/term, RFC 3339 for timestamp)")]
        value: String,
    },
    #[command(
        about = "Decode cell bytes (hex) as a typed value",
        after_help = r#"EXAMPLES
  $ widerow decode --type integer ffffffffffffffff
  $ widerow decode --type boolean 01"#
    )]
    Decode {
        #[arg(long = "type", value_enum, help = "Value type")]
        kind: ValueKindCli,
        #[arg(help = "Cell bytes as hex")]
        hex: String,
    },
    #[command(
        about = "Serve a fixture over the read_rows HTTP protocol",
        long_about = r#"Serve fixture tables over HTTP.

Answers POST /v0/tables/<table>/read_rows with JSONL chunk-events, so remote
scans can be exercised without a real store. Filters are accepted and ignored."#,
        after_help = r#"EXAMPLES
  $ widerow serve --fixture fixture.json
  $ widerow serve --fixture fixture.json --bind 127.0.0.1:9900 --token-file token.txt"#
    )]
    Serve(ServeArgs),
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ widerow completion bash > ~/.local/share/bash-completion/completions/widerow
  $ widerow completion zsh > ~/.zfunc/_widerow
  $ widerow completion fish > ~/.config/fish/completions/widerow.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Args)]
struct ScanArgs {
    #[arg(help = "Table name, or http(s)://host:port/<table>")]
    target: String,
    #[arg(long, value_name = "PATH", help = "Fixture file for local tables", value_hint = ValueHint::FilePath)]
    fixture: Option<PathBuf>,
    #[command(flatten)]
    range: RangeArgs,
    #[arg(
        long,
        default_value_t = 100,
        help = "Rows per fetch",
        help_heading = "Batching"
    )]
    batch_size: usize,
    #[arg(long, help = "Stop after this many rows", help_heading = "Batching")]
    limit: Option<usize>,
    #[arg(
        long,
        value_name = "JSON",
        help = "Row filter passed to the store, as JSON"
    )]
    filter_json: Option<String>,
    #[arg(
        long,
        help = "Bearer token for remote targets (dev-only; prefer --token-file)",
        help_heading = "Authentication"
    )]
    token: Option<String>,
    #[arg(long, value_name = "PATH", help = "Read bearer token from file", value_hint = ValueHint::FilePath, help_heading = "Authentication")]
    token_file: Option<PathBuf>,
    #[arg(
        long,
        value_name = "MS",
        help = "Connect/read timeout for remote targets",
        help_heading = "Authentication"
    )]
    timeout_ms: Option<u64>,
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long, help = "Scan keys starting with this prefix", help_heading = "Range")]
    prefix: Option<String>,
    #[arg(long, help = "Lower key bound (inclusive)", help_heading = "Range")]
    start: Option<String>,
    #[arg(long, help = "Make --start exclusive", help_heading = "Range")]
    start_exclusive: bool,
    #[arg(long, help = "Upper key bound (exclusive)", help_heading = "Range")]
    end: Option<String>,
    #[arg(long, help = "Make --end inclusive", help_heading = "Range")]
    end_inclusive: bool,
    #[arg(long = "key", value_name = "KEY", help = "Explicit row key (repeatable)", help_heading = "Range")]
    keys: Vec<String>,
    #[arg(long, help = "Interpret keys, bounds and prefix as hex bytes", help_heading = "Range")]
    hex: bool,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, value_name = "PATH", help = "Fixture file to serve", value_hint = ValueHint::FilePath)]
    fixture: PathBuf,
    #[arg(
        long,
        default_value = "127.0.0.1:9800",
        help = "Bind address",
        help_heading = "Connection"
    )]
    bind: String,
    #[arg(
        long,
        help = "Bearer token for auth (dev-only; prefer --token-file)",
        help_heading = "Authentication"
    )]
    token: Option<String>,
    #[arg(long, value_name = "PATH", help = "Read bearer token from file", value_hint = ValueHint::FilePath, help_heading = "Authentication")]
    token_file: Option<PathBuf>,
    #[arg(long, help = "Allow non-loopback binds", help_heading = "Safety")]
    allow_non_loopback: bool,
    #[arg(
        long,
        default_value_t = 1024 * 1024,
        help = "Max request body size in bytes",
        help_heading = "Safety"
    )]
    max_body_bytes: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ValueKindCli {
    Raw,
    String,
    Structured,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Term,
}

impl From<ValueKindCli> for ValueKind {
    fn from(value: ValueKindCli) -> Self {
        match value {
            ValueKindCli::Raw => ValueKind::Raw,
            ValueKindCli::String => ValueKind::String,
            ValueKindCli::Structured => ValueKind::Structured,
            ValueKindCli::Integer => ValueKind::Integer,
            ValueKindCli::Float => ValueKind::Float,
            ValueKindCli::Boolean => ValueKind::Boolean,
            ValueKindCli::Timestamp => ValueKind::Timestamp,
            ValueKindCli::Term => ValueKind::Term,
        }
    }
}

fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn parse_key(input: &str, hex: bool, flag: &str) -> Result<Vec<u8>, Error> {
    if !hex {
        return Ok(input.as_bytes().to_vec());
    }
    hex::decode(input).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{flag} is not valid hex"))
            .with_hint("Hex keys use two digits per byte, e.g. 61ff.")
            .with_source(err)
    })
}

fn build_row_set(args: &RangeArgs) -> Result<RowSet, Error> {
    let keys = args
        .keys
        .iter()
        .map(|key| parse_key(key, args.hex, "--key"))
        .collect::<Result<Vec<_>, _>>()?;
    if args.start_exclusive && args.start.is_none() {
        return Err(Error::new(ErrorKind::Usage).with_message("--start-exclusive requires --start"));
    }
    if args.end_inclusive && args.end.is_none() {
        return Err(Error::new(ErrorKind::Usage).with_message("--end-inclusive requires --end"));
    }

    let range = if let Some(prefix) = &args.prefix {
        if args.start.is_some() || args.end.is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("--prefix cannot be combined with --start/--end")
                .with_hint("A prefix already fixes both bounds; see `widerow prefix-range`."));
        }
        Some(RowRange::prefix(parse_key(prefix, args.hex, "--prefix")?))
    } else if args.start.is_some() || args.end.is_some() {
        use std::ops::Bound;
        let start = match &args.start {
            Some(start) if args.start_exclusive => Bound::Excluded(parse_key(start, args.hex, "--start")?),
            Some(start) => Bound::Included(parse_key(start, args.hex, "--start")?),
            None => Bound::Unbounded,
        };
        let end = match &args.end {
            Some(end) if args.end_inclusive => Bound::Included(parse_key(end, args.hex, "--end")?),
            Some(end) => Bound::Excluded(parse_key(end, args.hex, "--end")?),
            None => Bound::Unbounded,
        };
        let range = RowRange::with_bounds(start, end);
        range.validate()?;
        Some(range)
    } else {
        None
    };

    let set = match (keys.is_empty(), range) {
        (true, None) => RowSet::all(),
        (_, range) => {
            let set = RowSet::from_keys(keys);
            match range {
                Some(range) => set.with_range(range),
                None => set,
            }
        }
    };
    Ok(set)
}

fn parse_filter_json(input: Option<&str>) -> Result<Option<RowFilter>, Error> {
    let Some(input) = input else {
        return Ok(None);
    };
    serde_json::from_str(input).map(Some).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid --filter-json")
            .with_hint(r#"Filters look like {"chain": [{"family_name_regex": "cf"}, {"cells_per_column_limit": 1}]}."#)
            .with_source(err)
    })
}

fn is_remote_target(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Resolve a scan target into the fetcher that will serve it.
fn resolve_scan_target(args: &ScanArgs) -> Result<(Box<dyn Fetch>, TableRef), Error> {
    if is_remote_target(&args.target) {
        if args.fixture.is_some() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("--fixture cannot be combined with a remote target"));
        }
        let token = resolve_token_value(args.token.clone(), args.token_file.clone())?;
        let (mut client, table) = parse_table_uri(&args.target)?;
        if let Some(timeout_ms) = args.timeout_ms {
            client = client.with_timeout(std::time::Duration::from_millis(timeout_ms));
        }
        if let Some(token) = token {
            client = client.with_token(token);
        }
        return Ok((Box::new(client), table));
    }

    if args.token.is_some() || args.token_file.is_some() || args.timeout_ms.is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("remote flags require a remote http(s) target")
            .with_hint("Use --token/--token-file/--timeout-ms only with http(s)://host:port/<table>."));
    }
    let Some(fixture) = &args.fixture else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("local table targets require --fixture")
            .with_hint("Pass --fixture PATH, or use http(s)://host:port/<table>."));
    };
    let table = TableRef::new(args.target.clone())?;
    let store = MemoryStore::load_fixture(fixture)?;
    Ok((Box::new(store), table))
}

fn read_token_file(path: &Path) -> Result<String, Error> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("failed to read token file {}", path.display()))
            .with_source(err)
    })?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("token file {} is empty", path.display())));
    }
    Ok(token)
}

fn resolve_token_value(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<Option<String>, Error> {
    if token.is_some() && token_file.is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--token cannot be combined with --token-file")
            .with_hint("Use --token-file for safer handling, or pass --token for local/dev use."));
    }
    if let Some(path) = token_file {
        return read_token_file(&path).map(Some);
    }
    Ok(token)
}

fn serve_config_from_args(args: ServeArgs) -> Result<serve::ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:9800.")
    })?;
    let token = resolve_token_value(args.token, args.token_file)?;
    Ok(serve::ServeConfig {
        bind,
        fixture: args.fixture,
        token,
        allow_non_loopback: args.allow_non_loopback,
        max_body_bytes: args.max_body_bytes,
    })
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("The server rejected the credentials. Check --token or --token-file.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the address, the file path, and that the server is running."),
        ErrorKind::NotFound if err.table().is_some() => {
            err.with_hint("Check the table name against the fixture or server.")
        }
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

fn emit_json(value: Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Range => "invalid row range".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Cancelled => "cancelled".to_string(),
        kind => kind.as_str().replace('_', " "),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(err.kind().as_str()));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(table) = err.table() {
        inner.insert("table".to_string(), json!(table));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(table) = err.table() {
        lines.push(format!(
            "{} {table}",
            colorize_label("table:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
