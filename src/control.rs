use crate::descriptor::{parse_torrent_list, Descriptor};
use crate::logger::Logger;
use crate::shell::run_shell_command_capture;
use crate::types::TorrentId;

/// The four operations the migration needs from a daemon's control endpoint.
/// Success is the command's exit status; output text is only ever data.
pub(crate) trait TorrentControl {
    fn address(&self) -> &str;
    fn list(&self) -> Result<Vec<TorrentId>, String>;
    fn describe(&self, id: &TorrentId) -> Result<Descriptor, String>;
    fn add(&self, torrent_file: &str) -> Result<(), String>;
    fn remove(&self, id: &TorrentId) -> Result<(), String>;
}

/// Drives a `transmission-remote`-compatible CLI.
#[derive(Debug)]
pub(crate) struct RemoteControl<'a> {
    command: &'a str,
    address: String,
    logger: &'a Logger,
}

impl<'a> RemoteControl<'a> {
    pub(crate) fn new(command: &'a str, address: String, logger: &'a Logger) -> Self {
        Self {
            command,
            address,
            logger,
        }
    }

    fn run(&self, label: &str, token: &str, args: &[&str]) -> Result<String, String> {
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(self.address.clone());
        full_args.extend(args.iter().map(|arg| arg.to_string()));
        let output =
            run_shell_command_capture(self.command, label, token, &full_args, self.logger)?;
        if !output.success() {
            return Err(format!(
                "{} on {} failed with {}",
                label,
                self.address,
                output.failure_detail()
            ));
        }
        Ok(output.stdout)
    }
}

impl TorrentControl for RemoteControl<'_> {
    fn address(&self) -> &str {
        &self.address
    }

    fn list(&self) -> Result<Vec<TorrentId>, String> {
        let stdout = self.run("list", "none", &["-l"])?;
        Ok(parse_torrent_list(&stdout))
    }

    fn describe(&self, id: &TorrentId) -> Result<Descriptor, String> {
        let stdout = self.run("describe", id.as_str(), &["-t", id.as_str(), "-i", "-it"])?;
        Ok(Descriptor::parse(&stdout))
    }

    fn add(&self, torrent_file: &str) -> Result<(), String> {
        self.run("add", "none", &["-a", torrent_file]).map(|_| ())
    }

    fn remove(&self, id: &TorrentId) -> Result<(), String> {
        self.run("remove", id.as_str(), &["-t", id.as_str(), "-r"])
            .map(|_| ())
    }
}
