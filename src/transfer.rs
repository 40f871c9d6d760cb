use shell_escape::unix::escape;
use std::fmt;

use crate::descriptor::Descriptor;
use crate::logger::Logger;
use crate::shell::run_shell_command_capture;
use crate::types::Identifier;

const LEGACY_HASH_PREFIX: usize = 16;

/// A path on an SSH-addressable host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RemoteFile {
    pub(crate) host: String,
    pub(crate) path: String,
}

impl RemoteFile {
    pub(crate) fn new(host: &str, path: String) -> Self {
        Self {
            host: host.to_string(),
            path,
        }
    }

    fn copy_operand(&self, quote: bool) -> String {
        if quote {
            format!("{}:{}", self.host, escape(self.path.as_str().into()))
        } else {
            format!("{}:{}", self.host, self.path)
        }
    }
}

impl fmt::Display for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.path)
    }
}

pub(crate) trait FileTransfer {
    fn copy(&self, from: &RemoteFile, to: &RemoteFile) -> Result<(), String>;
}

/// Host-to-host copy through an scp-compatible command.
#[derive(Debug)]
pub(crate) struct SecureCopy<'a> {
    command: &'a str,
    quote_remote_paths: bool,
    logger: &'a Logger,
}

impl<'a> SecureCopy<'a> {
    pub(crate) fn new(command: &'a str, quote_remote_paths: bool, logger: &'a Logger) -> Self {
        Self {
            command,
            quote_remote_paths,
            logger,
        }
    }
}

impl FileTransfer for SecureCopy<'_> {
    fn copy(&self, from: &RemoteFile, to: &RemoteFile) -> Result<(), String> {
        let args = vec![
            from.copy_operand(self.quote_remote_paths),
            to.copy_operand(self.quote_remote_paths),
        ];
        let output = run_shell_command_capture(self.command, "copy", "none", &args, self.logger)?;
        if !output.success() {
            return Err(format!(
                "copy {} -> {} failed with {}",
                from,
                to,
                output.failure_detail()
            ));
        }
        Ok(())
    }
}

/// File stem the daemon uses for a torrent's `.torrent` and `.resume` files.
pub(crate) fn metadata_file_stem(
    descriptor: &Descriptor,
    identifier: Identifier,
) -> Result<String, String> {
    let hash = descriptor
        .hash()
        .ok_or_else(|| "descriptor has no Hash field".to_string())?;
    match identifier {
        Identifier::Hash => Ok(hash.to_string()),
        Identifier::Name => {
            let name = descriptor
                .name()
                .ok_or_else(|| "descriptor has no Name field".to_string())?;
            if name.contains('/') {
                return Err(format!("torrent name {:?} contains a path separator", name));
            }
            let prefix = hash.get(..LEGACY_HASH_PREFIX).unwrap_or(hash);
            Ok(format!("{}.{}", name, prefix))
        }
    }
}

pub(crate) fn torrent_file_name(stem: &str) -> String {
    format!("{}.torrent", stem)
}

pub(crate) fn resume_file_name(stem: &str) -> String {
    format!("{}.resume", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn descriptor(name: &str, hash: &str) -> Descriptor {
        Descriptor::parse(&format!("  Name: {}\n  Hash: {}\n", name, hash))
    }

    #[test]
    fn hash_identifier_uses_full_hash() {
        let stem = metadata_file_stem(&descriptor("Some Movie", HASH), Identifier::Hash)
            .expect("stem");
        assert_eq!(stem, HASH);
        assert_eq!(torrent_file_name(&stem), format!("{HASH}.torrent"));
        assert_eq!(resume_file_name(&stem), format!("{HASH}.resume"));
    }

    #[test]
    fn name_identifier_uses_name_and_short_hash() {
        let stem = metadata_file_stem(&descriptor("Some Movie", HASH), Identifier::Name)
            .expect("stem");
        assert_eq!(stem, "Some Movie.0123456789abcdef");
    }

    #[test]
    fn missing_fields_are_errors() {
        let no_hash = Descriptor::parse("  Name: x\n");
        assert!(metadata_file_stem(&no_hash, Identifier::Hash).is_err());
        assert!(metadata_file_stem(&no_hash, Identifier::Name).is_err());
        let no_name = Descriptor::parse(&format!("  Hash: {HASH}\n"));
        assert!(metadata_file_stem(&no_name, Identifier::Hash).is_ok());
        let err = metadata_file_stem(&no_name, Identifier::Name).expect_err("no name");
        assert!(err.contains("Name"), "got: {err}");
    }

    #[test]
    fn name_with_path_separator_is_rejected() {
        let err = metadata_file_stem(&descriptor("../etc", HASH), Identifier::Name)
            .expect_err("separator");
        assert!(err.contains("path separator"), "got: {err}");
    }

    #[test]
    fn copy_operand_quotes_remote_paths_on_request() {
        let file = RemoteFile::new("seed@nas", "/data/Some Movie.torrent".to_string());
        assert_eq!(file.copy_operand(true), "seed@nas:'/data/Some Movie.torrent'");
        assert_eq!(file.copy_operand(false), "seed@nas:/data/Some Movie.torrent");
        assert_eq!(file.to_string(), "seed@nas:/data/Some Movie.torrent");
    }
}
