use chrono::Utc;
use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::{Cli, CliCommand};
use crate::conditions::{parse_age, parse_conditions};
use crate::config::{load_settings, Endpoint, LoadedSettings, MigrationConfig, Settings};
use crate::control::RemoteControl;
use crate::doctor::run_doctor_mode;
use crate::driver::{quit, Driver, Quit};
use crate::logger::Logger;
use crate::transfer::SecureCopy;
use crate::types::MigrationLimit;

const DEFAULT_CONFIG_REL: &str = ".config/transmigrate.yml";
pub(crate) const EXIT_TRANSFER_FAILED: i32 = 2;

fn usage_error(message: String) -> Quit {
    eprintln!("{}", message);
    Quit {
        code: 1,
        reason: message,
    }
}

/// Explicit `--config` must exist; the default path is optional.
fn resolve_settings(explicit: Option<PathBuf>) -> Result<LoadedSettings, Quit> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(usage_error(format!(
                    "Missing config file: {}",
                    path.display()
                )));
            }
            path
        }
        None => match env::var_os("HOME") {
            Some(home) => {
                let path = PathBuf::from(home).join(DEFAULT_CONFIG_REL);
                if !path.is_file() {
                    return Ok(LoadedSettings::default());
                }
                path
            }
            None => return Ok(LoadedSettings::default()),
        },
    };
    load_settings(&path).map_err(usage_error)
}

fn require_endpoint(raw: Option<&str>, flag: &str) -> Result<Endpoint, String> {
    let Some(raw) = raw else {
        return Err(format!("Missing required argument {}.", flag));
    };
    Endpoint::parse(raw, flag)
}

pub(crate) fn build_migration_config(
    cli: &Cli,
    settings: &Settings,
) -> Result<MigrationConfig, String> {
    let source = require_endpoint(cli.source.as_deref(), "-s/--source")?;
    let destination = require_endpoint(cli.destination.as_deref(), "-d/--destination")?;
    let conditions = parse_conditions(&cli.conditions)?;
    let age = cli.age.as_deref().map(parse_age).transpose()?;
    let limit = cli
        .limit
        .map(|value| {
            MigrationLimit::new(value).map_err(|err| format!("Invalid -l/--limit value: {}", err))
        })
        .transpose()?;

    Ok(MigrationConfig {
        source,
        destination,
        conditions,
        age,
        limit,
        remove_from_source: cli.remove_from_source,
        identifier: cli.identifier,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        retry: settings.retry.policy(),
    })
}

fn install_interrupt_handler() -> Arc<AtomicBool> {
    let interrupt_flag = Arc::new(AtomicBool::new(false));
    if let Err(err) = ctrlc::set_handler({
        let interrupt_flag = Arc::clone(&interrupt_flag);
        move || {
            interrupt_flag.store(true, Ordering::SeqCst);
        }
    }) {
        eprintln!("Failed to set interrupt handler: {}", err);
    }
    interrupt_flag
}

pub(crate) fn run_with_cli(cli: Cli) -> Result<(), Quit> {
    let LoadedSettings { settings, warnings } = resolve_settings(cli.config.clone())?;
    let logger = Logger::new(settings.log_path.clone()).with_echo(cli.verbose);
    for key in &warnings {
        logger.log_transition(&format!("config_warning unknown_key={}", key));
    }
    let mut stdout = io::stdout().lock();

    if matches!(cli.command, Some(CliCommand::Doctor)) {
        let source = require_endpoint(cli.source.as_deref(), "-s/--source").map_err(usage_error)?;
        let destination = require_endpoint(cli.destination.as_deref(), "-d/--destination")
            .map_err(usage_error)?;
        return run_doctor_mode(&settings, &source, &destination, &logger, &mut stdout);
    }

    let config = build_migration_config(&cli, &settings).map_err(usage_error)?;
    let interrupt_flag = install_interrupt_handler();

    let source = RemoteControl::new(
        &settings.commands.control,
        config.source.control_address(),
        &logger,
    );
    let destination = RemoteControl::new(
        &settings.commands.control,
        config.destination.control_address(),
        &logger,
    );
    let transfer = SecureCopy::new(
        &settings.commands.copy,
        settings.transfer.quote_remote_paths,
        &logger,
    );
    let driver = Driver {
        config: &config,
        source: &source,
        destination: &destination,
        transfer: &transfer,
        logger: &logger,
        interrupt: &interrupt_flag,
        now: Utc::now(),
    };

    let mut summary = driver.new_summary();
    let outcome = driver.run(&mut stdout, &mut summary);

    // An aborted run still reports what it already migrated or removed.
    if let Some(path) = &cli.report {
        if let Err(err) = summary.write_to(path) {
            eprintln!("{}", err);
            outcome?;
            return Err(quit(&logger, &format!("report_failed:{err}"), 1));
        }
    }
    outcome?;
    if summary.failed > 0 {
        return Err(quit(
            &logger,
            &format!("transfer_failed:{}", summary.failed),
            EXIT_TRANSFER_FAILED,
        ));
    }
    Ok(())
}

pub(crate) fn run_with_args(args: Vec<OsString>) -> Result<(), Quit> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            // Render ourselves so help and errors stay capture-friendly in tests.
            if err.use_stderr() {
                eprintln!("{err}");
            } else {
                print!("{err}");
            }
            return match err.exit_code() {
                0 => Ok(()),
                code => Err(Quit {
                    code,
                    reason: "cli_parse".to_string(),
                }),
            };
        }
    };
    run_with_cli(cli)
}

pub(crate) fn main_with_args(args: Vec<OsString>) -> ExitCode {
    match run_with_args(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(quit) => quit.exit_code(),
    }
}

pub(crate) fn main() -> ExitCode {
    main_with_args(env::args_os().collect())
}
