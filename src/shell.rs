use shell_escape::unix::escape;
use std::env;
use std::process::{Command, Stdio};

use crate::logger::{sanitize_log_value, Logger};

pub(crate) fn render_args(args: &[String]) -> String {
    let mut rendered = String::new();
    for arg in args {
        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(escape(arg.as_str().into()).as_ref());
    }
    rendered
}

/// Appends `"$@"` so configured commands receive the positional arguments
/// without having to reference them.
fn command_script(command: &str) -> String {
    format!("{} \"$@\"", command.trim())
}

#[derive(Debug)]
pub(crate) struct CommandResult {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) exit_code: i32,
}

impl CommandResult {
    pub(crate) fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty stderr line, falling back to the exit code. Login-shell
    /// profile noise comes first; the tool's own error comes last.
    pub(crate) fn failure_detail(&self) -> String {
        match self
            .stderr
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
        {
            Some(line) => format!("exit code {}: {}", self.exit_code, line),
            None => format!("exit code {}", self.exit_code),
        }
    }
}

pub(crate) fn run_shell_command_capture(
    command: &str,
    log_label: &str,
    torrent_token: &str,
    args: &[String],
    logger: &Logger,
) -> Result<CommandResult, String> {
    if command.trim().is_empty() {
        return Err(format!("No command configured for {}", log_label));
    }

    logger.log_transition(&format!(
        "cmd start label={} torrent={} mode=bash_lc command={} args={}",
        log_label,
        torrent_token,
        sanitize_log_value(command),
        sanitize_log_value(&render_args(args))
    ));

    let mut cmd = Command::new("bash");
    cmd.arg("-lc").arg(command_script(command)).arg("--");
    cmd.args(args);
    cmd.stdin(Stdio::null());
    let output = cmd
        .output()
        .map_err(|err| format!("Failed to run command '{}': {}", command, err))?;

    let exit_code = output.status.code().unwrap_or(1);
    logger.log_transition(&format!(
        "cmd exit label={} torrent={} exit={}",
        log_label, torrent_token, exit_code
    ));

    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code,
    })
}

pub(crate) fn command_exists(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|path| {
        let full = path.join(name);
        full.is_file() || full.is_symlink()
    })
}

/// Program name of a configured command line (`scp -3 -q` -> `scp`).
pub(crate) fn program_name(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> CommandResult {
        CommandResult {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: 1,
        }
    }

    #[test]
    fn failure_detail_keeps_the_tool_error_after_profile_noise() {
        let result = failed(
            "WARNING profile: Key auto_activate_base is an alias\nscp: /srv/a.torrent: No such file or directory\n\n",
        );
        assert_eq!(
            result.failure_detail(),
            "exit code 1: scp: /srv/a.torrent: No such file or directory"
        );
    }

    #[test]
    fn failure_detail_without_stderr_is_the_exit_code() {
        assert_eq!(failed("  \n").failure_detail(), "exit code 1");
    }
}
