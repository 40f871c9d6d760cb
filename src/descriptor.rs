use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::types::TorrentId;

pub(crate) const FIELD_NAME: &str = "Name";
pub(crate) const FIELD_HASH: &str = "Hash";
pub(crate) const FIELD_DATE_FINISHED: &str = "Date finished";

const CTIME_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// One torrent's detail output: the raw text plus the `Key: value` fields in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Descriptor {
    raw: String,
    fields: Vec<(String, String)>,
}

impl Descriptor {
    pub(crate) fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self {
            raw: text.to_string(),
            fields,
        }
    }

    pub(crate) fn raw(&self) -> &str {
        &self.raw
    }

    /// First field whose key is exactly `name`.
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn name(&self) -> Option<&str> {
        self.field(FIELD_NAME)
    }

    pub(crate) fn hash(&self) -> Option<&str> {
        self.field(FIELD_HASH)
    }

    pub(crate) fn date_finished(&self) -> Option<DateTime<Utc>> {
        self.field(FIELD_DATE_FINISHED).and_then(parse_ctime)
    }
}

/// Parses the daemon's ctime-style local timestamp, e.g. `Sat Jan  1 12:00:00 2022`.
pub(crate) fn parse_ctime(value: &str) -> Option<DateTime<Utc>> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, CTIME_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn list_row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*(\d+\*?)\s").expect("static list row pattern"))
}

/// Torrent ids from the list output. The header row and the `Sum:` footer never
/// start with a number, so they fall out of the match.
pub(crate) fn parse_torrent_list(text: &str) -> Vec<TorrentId> {
    text.lines()
        .filter_map(|line| list_row_pattern().captures(line))
        .filter_map(|captures| TorrentId::try_from(&captures[1]).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const DETAIL: &str = "NAME
  Id: 3
  Name: debian-12.iso
  Hash: 0123456789abcdef0123456789abcdef01234567
  Magnet: magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567

TRANSFER
  State: Seeding
  Location: /srv/torrents/linux

HISTORY
  Date added:       Sat Jan  1 12:00:00 2022
  Date finished:    Sat Jan  1 13:00:00 2022

  Tracker 0: udp://tracker.example.org:1337
";

    #[test]
    fn parses_fields_in_order_and_skips_section_headers() {
        let descriptor = Descriptor::parse(DETAIL);
        let keys: Vec<&str> = descriptor
            .fields
            .iter()
            .map(|(key, _)| key.as_str())
            .take(4)
            .collect();
        assert_eq!(keys, vec!["Id", "Name", "Hash", "Magnet"]);
        assert_eq!(descriptor.name(), Some("debian-12.iso"));
        assert_eq!(
            descriptor.hash(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert_eq!(descriptor.field("Location"), Some("/srv/torrents/linux"));
        assert_eq!(
            descriptor.field("Tracker 0"),
            Some("udp://tracker.example.org:1337")
        );
        assert_eq!(descriptor.raw(), DETAIL);
    }

    #[test]
    fn empty_values_are_treated_as_absent() {
        let descriptor = Descriptor::parse("  Name: \n  Hash: abc\n");
        assert_eq!(descriptor.name(), None);
        assert_eq!(descriptor.hash(), Some("abc"));
    }

    #[test]
    fn date_finished_round_trips_local_ctime() {
        let finished = Local::now() - Duration::hours(3);
        let text = format!(
            "  Date finished:    {}\n",
            finished.format("%a %b %e %H:%M:%S %Y")
        );
        let parsed = Descriptor::parse(&text)
            .date_finished()
            .expect("date finished should parse");
        let drift = (parsed - finished.with_timezone(&Utc)).num_seconds().abs();
        assert!(drift <= 1, "unexpected drift {drift}s");
    }

    #[test]
    fn unparseable_or_missing_date_finished_is_none() {
        assert_eq!(Descriptor::parse("  Date finished: Never\n").date_finished(), None);
        assert_eq!(Descriptor::parse("  Name: x\n").date_finished(), None);
    }

    #[test]
    fn list_output_yields_ids_and_strips_error_marker() {
        let list = "    ID   Done       Have  ETA           Up    Down  Ratio  Status       Name
     1   100%   10.0 MB  Done         0.0     0.0    1.0  Idle         alpha
    12*   50%    5.0 MB  Unknown      0.0     0.0    0.0  Stopped      beta gamma
Sum:            15.0 MB               0.0     0.0
";
        let ids: Vec<String> = parse_torrent_list(list)
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["1", "12"]);
    }

    #[test]
    fn empty_list_output_yields_no_ids() {
        let list = "    ID   Done       Have  ETA           Up    Down  Ratio  Status       Name
Sum:             None               0.0     0.0
";
        assert!(parse_torrent_list(list).is_empty());
    }
}
