//! Purpose: `rapor` CLI entry point for the gradebook backend client.
//! Role: Binary crate root; parses args, dispatches one request, emits JSON on stdout.
//! Invariants: stdout carries only the backend response (or derived JSON).
//! Invariants: Errors are emitted as JSON on stderr (human text on a TTY).
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Tracing goes to stderr and defaults to `warn`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use rapor::api::{
    ClientConfig, Dispatcher, Entity, Error, ErrorKind, FallbackMode, Lookup, PageRequest, Params,
    Response, to_exit_code,
};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `rapor --help`."));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command, &cli.client).map_err(add_hint)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "rapor",
    version,
    about = "Client for the script-hosted gradebook backend",
    long_about = None,
    after_help = r#"EXAMPLES
  $ export RAPOR_ENDPOINT=https://script.google.com/macros/s/<deployment>/exec
  $ rapor kelas list
  $ rapor siswa list --where kelas_id=3
  $ rapor siswa create --data '{"name": "Budi", "kelas_id": 1}'
  $ rapor nilai page --page 2 --page-size 20 --filter tugas_id=5
  $ rapor call getKelas --param id=1

NOTES
  - Requests POST a form body; on failure they are retried once as a JSONP GET.
  - Exit code 5 means the backend answered with "success": false."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ClientArgs {
    #[arg(
        long,
        env = "RAPOR_ENDPOINT",
        global = true,
        help = "Backend endpoint url (deployment url ending in /exec)"
    )]
    endpoint: Option<String>,
    #[arg(long, global = true, help = "Do not retry failed POSTs as JSONP")]
    no_fallback: bool,
    #[arg(
        long,
        global = true,
        value_name = "MS",
        help = "Give up on a loaded JSONP script that never calls back (default: wait)"
    )]
    fallback_timeout_ms: Option<u64>,
    #[arg(long, global = true, value_name = "MS", help = "Per-request HTTP timeout")]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Send a raw action with parameters")]
    Call {
        #[arg(help = "Action name, e.g. getKelas")]
        action: String,
        #[arg(long = "param", value_name = "KEY=VALUE", help = "Repeatable string parameter")]
        params: Vec<String>,
        #[arg(
            long = "json-param",
            value_name = "KEY=JSON",
            help = "Repeatable parameter whose value is parsed as JSON"
        )]
        json_params: Vec<String>,
    },
    #[command(about = "Authenticate against the backend")]
    Login { username: String, password: String },
    #[command(about = "Classes (Kelas)")]
    Kelas {
        #[command(subcommand)]
        op: EntityOp,
    },
    #[command(about = "Students (Siswa)")]
    Siswa {
        #[command(subcommand)]
        op: EntityOp,
    },
    #[command(about = "Assignments (Tugas)")]
    Tugas {
        #[command(subcommand)]
        op: EntityOp,
    },
    #[command(about = "Grades (Nilai)")]
    Nilai {
        #[command(subcommand)]
        op: EntityOp,
    },
    #[command(about = "Print class options as a JSON array (empty on failure)")]
    ClassOptions,
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum EntityOp {
    #[command(about = "List records, optionally filtered by relation keys")]
    List {
        #[arg(long = "where", value_name = "KEY=VALUE", help = "Repeatable relation filter")]
        relations: Vec<String>,
    },
    #[command(about = "Fetch one record by id")]
    Get { id: String },
    #[command(about = "Create a record from a JSON object")]
    Create {
        #[arg(long, value_name = "JSON")]
        data: String,
    },
    #[command(about = "Update a record from a JSON object")]
    Update {
        id: String,
        #[arg(long, value_name = "JSON")]
        data: String,
    },
    #[command(about = "Delete a record by id")]
    Delete { id: String },
    #[command(about = "Fetch one page of records")]
    Page {
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long, default_value_t = 10)]
        page_size: u64,
        #[arg(long = "filter", value_name = "KEY=VALUE", help = "Repeatable filter")]
        filters: Vec<String>,
    },
}

#[derive(Copy, Clone, Debug)]
enum OutputMode {
    Pretty,
    Compact,
}

impl ClientArgs {
    fn dispatcher(&self) -> Result<Dispatcher, Error> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("missing backend endpoint")
                .with_hint("Pass --endpoint <url> or set RAPOR_ENDPOINT."));
        };
        let mut config = ClientConfig::new(endpoint)?;
        if self.no_fallback {
            config = config.with_fallback(FallbackMode::Disabled);
        }
        if let Some(ms) = self.fallback_timeout_ms {
            config = config.with_fallback_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(ms));
        }
        Ok(Dispatcher::new(config))
    }
}

fn parse_pair(raw: &str, flag: &str) -> Result<(String, String), Error> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("{flag} expects KEY=VALUE, got `{raw}`"))
            .with_hint(format!("Use {flag} name=value."))),
    }
}

fn parse_string_pairs(raw: &[String], flag: &str) -> Result<Params, Error> {
    let mut params = Params::new();
    for item in raw {
        let (key, value) = parse_pair(item, flag)?;
        params.insert(key, value);
    }
    Ok(params)
}

fn parse_json_pairs(raw: &[String], flag: &str) -> Result<Params, Error> {
    let mut params = Params::new();
    for item in raw {
        let (key, text) = parse_pair(item, flag)?;
        let value: Value = serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("{flag} value for `{key}` is not valid JSON"))
                .with_source(err)
        })?;
        params.insert(key, value);
    }
    Ok(params)
}

fn parse_data(raw: &str) -> Result<Params, Error> {
    let value: Value = serde_json::from_str(raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("--data is not valid JSON")
            .with_hint("Pass a JSON object, e.g. --data '{\"name\": \"10A\"}'.")
            .with_source(err)
    })?;
    Params::from_object(value)
}

fn parse_lookup(entity: Entity, raw: &[String]) -> Result<Lookup, Error> {
    let mut lookup = Lookup::all();
    for item in raw {
        let (key, value) = parse_pair(item, "--where")?;
        if !entity.relation_keys().contains(&key.as_str()) {
            let accepted = if entity.relation_keys().is_empty() {
                "none".to_string()
            } else {
                entity.relation_keys().join(", ")
            };
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("{entity} cannot be filtered by `{key}`"))
                .with_hint(format!("Accepted keys: {accepted}.")));
        }
        lookup = lookup.relation(key, value);
    }
    Ok(lookup)
}

fn page_request(page: u64, page_size: u64, filters: &[String]) -> Result<PageRequest, Error> {
    Ok(PageRequest {
        page,
        page_size,
        filters: parse_string_pairs(filters, "--filter")?,
    })
}

/// Prints the response and maps an explicit `success: false` onto the remote exit code.
fn finish(response: Response) -> RunOutcome {
    let failed = response.is_failure();
    let message = response
        .error_message()
        .unwrap_or("backend reported failure")
        .to_string();
    emit_json(response.into_value());
    if failed {
        emit_error(&Error::new(ErrorKind::Remote).with_message(message));
        return RunOutcome::with_code(to_exit_code(ErrorKind::Remote));
    }
    RunOutcome::ok()
}

fn add_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Internal => err.with_hint(
            "Unexpected internal failure. Retry with RUST_LOG=debug and share the command if it persists.",
        ),
        ErrorKind::Io => err.with_hint("I/O error. Check the endpoint url and network access."),
        _ => err,
    }
}

fn output_mode() -> OutputMode {
    if io::stdout().is_terminal() {
        OutputMode::Pretty
    } else {
        OutputMode::Compact
    }
}

fn emit_json(value: Value) {
    let json = match output_mode() {
        OutputMode::Pretty => serde_json::to_string_pretty(&value),
        OutputMode::Compact => serde_json::to_string(&value),
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
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
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Protocol => "unexpected response".to_string(),
        ErrorKind::Remote => "backend reported failure".to_string(),
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
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(url) = err.url() {
        inner.insert("url".to_string(), json!(url));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(url) = err.url() {
        lines.push(format!("url: {url}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
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
