//! trlock - Main entry point
//!
//! Locks the X display without hiding it: the screen stays visible, only
//! keyboard and pointer input are taken until the user's password is typed.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trlock::{privilege, PamAuthenticator, X11Display};
use trlock_core::cursor::{self, CursorDescriptor};
use trlock_core::sleep_lock::SLEEP_LOCK_FD_VAR;
use trlock_core::{
    EnvironmentGuard, InputGrabber, LockConfig, LockSession, ProcessEnvironment, SessionOutcome,
    PROGRAM_NAME,
};

#[derive(Parser)]
#[command(name = "trlock")]
#[command(about = "Transparent screen lock: grabs input, leaves the display visible", long_about = None)]
#[command(version)]
struct Cli {
    /// Allow locking as root
    #[arg(short, long)]
    force: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trlock=warn,trlock_core=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(SessionOutcome::Unlocked) => ExitCode::SUCCESS,
        // Losing the display is not an unlock: exit 1
        Ok(SessionOutcome::ConnectionLost) => {
            warn!("Lost the display before unlock");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}: {:#}", PROGRAM_NAME, e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<SessionOutcome> {
    EnvironmentGuard::new(ProcessEnvironment).check()?;

    let invoker = privilege::current_invoker()?;
    privilege::ensure_allowed(&invoker, cli.force)?;

    let config = LockConfig::default();
    let cursor = CursorDescriptor::load(&cursor::data_search_dirs())?;

    let mut display = X11Display::connect(None).context("could not connect to the X server")?;
    let input = InputGrabber::new(&config)
        .with_sleep_lock(std::env::var(SLEEP_LOCK_FD_VAR).ok())
        .acquire(&mut display, &cursor)?;

    let authenticator = PamAuthenticator::new(config.pam_service.clone());
    let mut session = LockSession::new(display, input, authenticator, invoker.name, &config)?;
    info!("Locked for {}", session.username());

    Ok(session.run())
}
