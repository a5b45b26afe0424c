//! Entry point. Two invocation forms share one binary (spec §6): the
//! canonical `vmrelay [flags] <tool> [args...]`, parsed with `clap`; and a
//! symlink alias `vr-<tool>`, which bypasses flag parsing entirely and
//! forwards every argument verbatim — the one place `clap` is deliberately
//! not used, because no single parser can both enforce `-j`/`-R` on one
//! invocation form and forward everything untouched on the other.

mod cli;
mod config;
mod context;
mod error;
mod event_loop;
mod negotiator;
mod rendezvous;
mod server;
mod subcommand;
mod terminal;

use clap::Parser;
use cli::Cli;
use context::{ALIAS_PREFIX, APP_NAME, ClientContext};
use error::ClientError;
use negotiator::Invocation;
use rendezvous::Lease;
use server::ServerStatus;

struct ToolInvocation {
    tool: String,
    args: Vec<String>,
    classpath: Vec<String>,
    force_restart: bool,
}

enum Action {
    Start,
    Stop,
    Status,
    Invoke(ToolInvocation),
}

fn main() {
    env_logger::init();
    let action = determine_action();
    match run(action) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            std::process::exit(1);
        }
    }
}

/// Inspects `argv[0]`'s basename: a name starting with [`ALIAS_PREFIX`] (and
/// not equal to [`APP_NAME`] itself) is the alias-bypass path (spec §6); any
/// other basename goes through the canonical [`Cli`] parser.
fn determine_action() -> Action {
    let argv0 = std::env::args().next().unwrap_or_default();
    let basename = std::path::Path::new(&argv0)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if basename != APP_NAME {
        if let Some(tool) = basename.strip_prefix(ALIAS_PREFIX) {
            let args: Vec<String> = std::env::args().skip(1).collect();
            return Action::Invoke(ToolInvocation {
                tool: tool.to_string(),
                args,
                classpath: Vec::new(),
                force_restart: false,
            });
        }
    }

    let cli = Cli::parse();
    if cli.start {
        return Action::Start;
    }
    if cli.stop {
        return Action::Stop;
    }
    if cli.status {
        return Action::Status;
    }
    let tool = cli.tool().unwrap_or_default().to_string();
    Action::Invoke(ToolInvocation {
        tool,
        args: cli.tool_args().to_vec(),
        classpath: cli.classpath.clone(),
        force_restart: cli.restart,
    })
}

fn run(action: Action) -> Result<i32, ClientError> {
    let ctx = ClientContext::from_env()?;
    match action {
        Action::Start => {
            ensure_running(&ctx, false)?;
            Ok(0)
        }
        Action::Stop => {
            server::stop(&ctx)?;
            println!("DONE");
            Ok(0)
        }
        Action::Status => match server::detect(&ctx) {
            ServerStatus::Alive(pid) => {
                println!("{APP_NAME}: server is running (pid {pid})");
                Ok(0)
            }
            _ => {
                println!("{APP_NAME}: server is not running");
                Ok(1)
            }
        },
        Action::Invoke(invocation) => invoke_tool(&ctx, invocation),
    }
}

fn ensure_running(ctx: &ClientContext, force_restart: bool) -> Result<Lease, ClientError> {
    if force_restart {
        return Ok(server::restart(ctx)?);
    }
    match server::detect(ctx) {
        ServerStatus::Alive(_) => Ok(rendezvous::grab(ctx)?),
        _ => Ok(server::cold_start(ctx)?),
    }
}

fn invoke_tool(ctx: &ClientContext, invocation: ToolInvocation) -> Result<i32, ClientError> {
    if invocation.tool.is_empty() {
        return Err(ClientError::Usage);
    }

    let mut lease = ensure_running(ctx, invocation.force_restart)?;

    let cwd = std::env::current_dir()
        .map_err(ClientError::Cwd)?
        .to_string_lossy()
        .into_owned();
    let envs = negotiator::current_process_envs();

    let session = Invocation {
        classpaths: &invocation.classpath,
        args: &invocation.args,
        envs: &envs,
        cwd: &cwd,
        run: &invocation.tool,
    };
    negotiator::negotiate(&mut lease, &session)?;

    let mut terminal = terminal::TerminalController::new();
    let code = event_loop::run(&mut lease, &mut terminal)?;
    Ok(code)
}
