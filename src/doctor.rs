use std::io::Write;
use std::path::Path;

use crate::config::{Endpoint, Settings};
use crate::control::{RemoteControl, TorrentControl};
use crate::driver::{quit, Quit};
use crate::logger::Logger;
use crate::shell::{command_exists, program_name};

fn tool_available(command: &str) -> bool {
    match program_name(command) {
        Some(program) if program.contains('/') => Path::new(program).is_file(),
        Some(program) => command_exists(program),
        None => false,
    }
}

fn report_check(out: &mut dyn Write, ok: bool, label: &str, detail: &str) {
    let status = if ok { "ok  " } else { "FAIL" };
    let _ = writeln!(out, "{} {}: {}", status, label, detail);
}

fn check_endpoint(
    out: &mut dyn Write,
    settings: &Settings,
    role: &str,
    endpoint: &Endpoint,
    logger: &Logger,
) -> bool {
    let control = RemoteControl::new(
        &settings.commands.control,
        endpoint.control_address(),
        logger,
    );
    match control.list() {
        Ok(ids) => {
            report_check(
                out,
                true,
                &format!("{} control {}", role, control.address()),
                &format!("{} torrent(s)", ids.len()),
            );
            true
        }
        Err(err) => {
            report_check(
                out,
                false,
                &format!("{} control {}", role, control.address()),
                &err,
            );
            false
        }
    }
}

/// One list query per endpoint, no retries: the doctor reports the current state.
pub(crate) fn run_doctor_mode(
    settings: &Settings,
    source: &Endpoint,
    destination: &Endpoint,
    logger: &Logger,
    out: &mut dyn Write,
) -> Result<(), Quit> {
    logger.log_transition("doctor start");
    let mut failures = 0;

    for (label, command) in [
        ("control command", settings.commands.control.as_str()),
        ("copy command", settings.commands.copy.as_str()),
    ] {
        let ok = tool_available(command);
        let detail = if ok {
            command.to_string()
        } else {
            format!("{} not found on PATH", program_name(command).unwrap_or(command))
        };
        report_check(out, ok, label, &detail);
        if !ok {
            failures += 1;
        }
    }

    for (role, endpoint) in [("source", source), ("destination", destination)] {
        if !check_endpoint(out, settings, role, endpoint, logger) {
            failures += 1;
        }
    }

    if failures > 0 {
        let _ = writeln!(out, "doctor: {} check(s) failed", failures);
        return Err(quit(logger, &format!("doctor_failed:{}", failures), 1));
    }
    let _ = writeln!(out, "doctor: all checks passed");
    logger.log_transition("doctor ok");
    Ok(())
}
