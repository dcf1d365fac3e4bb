//! Log in to a VM console and leave it at a prepared root shell.
//!
//! Login parameters come from `CONSOLE_*` environment variables; the console
//! itself is reached by running a client command in a PTY.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use vmconsole::config::TARGET_NAME_KEY;
use vmconsole::transport::PtyTransport;
use vmconsole::{ConsoleLogin, LoginConfig, Outcome, Session};

#[derive(Parser)]
#[command(name = "console-login")]
#[command(author, version, about = "Unattended login over a VM serial console", long_about = None)]
struct Args {
    /// Console client command; `{name}` is replaced by the target name
    #[arg(short, long, default_value = "virtctl console {name}")]
    command: String,

    /// Target name (overrides CONSOLE_TARGET_NAME)
    #[arg(short, long)]
    target: Option<String>,

    /// Strip ANSI escape sequences before matching
    #[arg(long)]
    strip_ansi: bool,

    /// Print the console transcript on failure
    #[arg(long)]
    transcript: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut vars: HashMap<String, String> = std::env::vars().collect();
    if let Some(target) = &args.target {
        vars.insert(TARGET_NAME_KEY.to_string(), target.clone());
    }
    let config = LoginConfig::from_map(&vars).context("invalid console configuration")?;

    let transport = PtyTransport::from_command_line(&args.command)
        .context("console client command is empty")?;

    let target = config.target.name().to_string();
    let login = ConsoleLogin::new(transport, config)
        .session_builder(Session::builder().strip_ansi(args.strip_ansi));

    let result = login.ensure_logged_in().await;
    let outcome = Outcome::of(&result);

    match result {
        Ok(state) => {
            println!("{target}: {state:?}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{target}: {e}");
            if args.transcript {
                eprintln!("--- console transcript ---\n{}", e.transcript());
            }
            std::process::exit(exit_code(outcome));
        }
    }
}

fn exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::AlreadyLoggedIn | Outcome::LoggedIn => 0,
        Outcome::PermissionDenied => 2,
        Outcome::Timeout => 3,
        Outcome::TransportError => 4,
        Outcome::ProtocolMismatch => 5,
    }
}
