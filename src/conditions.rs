use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::descriptor::Descriptor;
use crate::types::AgeThreshold;

/// A required substring in the line(s) carrying `field`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Condition {
    pub(crate) field: String,
    pub(crate) substring: String,
}

impl Condition {
    /// True when some line containing the field name also contains the
    /// substring after that field name. Absent field means no match.
    pub(crate) fn matches(&self, descriptor: &Descriptor) -> bool {
        descriptor.raw().lines().any(|line| {
            line.find(&self.field).is_some_and(|start| {
                line[start + self.field.len()..].contains(&self.substring)
            })
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.substring)
    }
}

/// Parses repeatable `-c` values, each a comma-separated list of `FIELD=SUBSTRING`.
pub(crate) fn parse_conditions(raw_values: &[String]) -> Result<Vec<Condition>, String> {
    let mut conditions = Vec::new();
    for raw in raw_values {
        for (index, segment) in raw.split(',').enumerate() {
            if segment.trim().is_empty() {
                return Err(format!(
                    "Invalid -c/--conditions value: empty segment in {:?} at index {}.",
                    raw, index
                ));
            }
            let Some((field, substring)) = segment.split_once('=') else {
                return Err(format!(
                    "Invalid -c/--conditions value: {:?} is not FIELD=SUBSTRING.",
                    segment
                ));
            };
            let field = field.trim();
            if field.is_empty() {
                return Err(format!(
                    "Invalid -c/--conditions value: empty field name in {:?}.",
                    segment
                ));
            }
            conditions.push(Condition {
                field: field.to_string(),
                substring: substring.to_string(),
            });
        }
    }
    Ok(conditions)
}

fn age_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\s*([smhdw]?)$").expect("static age pattern"))
}

/// Seconds, optionally suffixed with `s`, `m`, `h`, `d` or `w`.
pub(crate) fn parse_age(raw: &str) -> Result<AgeThreshold, String> {
    let trimmed = raw.trim();
    let captures = age_pattern().captures(trimmed).ok_or_else(|| {
        format!(
            "Invalid --age value {:?}: expected seconds, optionally suffixed with s, m, h, d or w.",
            raw
        )
    })?;
    let amount: u64 = captures[1]
        .parse()
        .map_err(|err| format!("Invalid --age value {:?}: {}", raw, err))?;
    let unit: u64 = match &captures[2] {
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => 1,
    };
    let secs = amount
        .checked_mul(unit)
        .ok_or_else(|| format!("Invalid --age value {:?}: too large.", raw))?;
    AgeThreshold::from_secs(secs).map_err(|err| format!("Invalid --age value {:?}: {}", raw, err))
}

/// Finished at least `age` before `now`. Unfinished torrents never qualify.
pub(crate) fn old_enough(descriptor: &Descriptor, age: AgeThreshold, now: DateTime<Utc>) -> bool {
    let Some(finished) = descriptor.date_finished() else {
        return false;
    };
    let elapsed = now.signed_duration_since(finished).num_seconds();
    elapsed >= 0 && elapsed as u64 >= age.as_secs()
}

pub(crate) fn evaluate(
    descriptor: &Descriptor,
    conditions: &[Condition],
    age: Option<AgeThreshold>,
    now: DateTime<Utc>,
) -> bool {
    if !conditions.iter().all(|condition| condition.matches(descriptor)) {
        return false;
    }
    match age {
        Some(age) => old_enough(descriptor, age, now),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local};

    fn descriptor_finished(ago: Duration) -> Descriptor {
        let finished = Local::now() - ago;
        Descriptor::parse(&format!(
            "  Name: alpha\n  Location: /srv/movies\n  Tracker 0: udp://tracker.example.org:80\n  Date finished:    {}\n",
            finished.format("%a %b %e %H:%M:%S %Y")
        ))
    }

    fn condition(field: &str, substring: &str) -> Condition {
        Condition {
            field: field.to_string(),
            substring: substring.to_string(),
        }
    }

    #[test]
    fn empty_condition_set_always_matches() {
        let descriptor = Descriptor::parse("  Name: anything\n");
        assert!(evaluate(&descriptor, &[], None, Utc::now()));
    }

    #[test]
    fn all_conditions_must_match() {
        let descriptor = descriptor_finished(Duration::days(1));
        let now = Utc::now();
        assert!(evaluate(
            &descriptor,
            &[condition("Location", "/srv/"), condition("Tracker", "example.org")],
            None,
            now
        ));
        assert!(!evaluate(
            &descriptor,
            &[condition("Location", "/srv/"), condition("Tracker", "other.net")],
            None,
            now
        ));
    }

    #[test]
    fn absent_field_never_matches() {
        let descriptor = Descriptor::parse("  Name: alpha\n");
        assert!(!condition("Labels", "").matches(&descriptor));
        assert!(!evaluate(&descriptor, &[condition("Labels", "x")], None, Utc::now()));
    }

    #[test]
    fn substring_is_searched_after_the_field_name() {
        let descriptor = Descriptor::parse("  Location: /data\n");
        assert!(!condition("Location", "Loc").matches(&descriptor));
        assert!(condition("Location", "/da").matches(&descriptor));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let descriptor = Descriptor::parse("  Name: Alpha\n");
        assert!(!condition("Name", "alpha").matches(&descriptor));
        assert!(!condition("name", "Alpha").matches(&descriptor));
    }

    #[test]
    fn age_requires_completion_date() {
        let descriptor = Descriptor::parse("  Name: alpha\n");
        let age = AgeThreshold::from_secs(1).expect("age");
        assert!(!evaluate(&descriptor, &[], Some(age), Utc::now()));
    }

    #[test]
    fn age_compares_elapsed_time_since_finish() {
        let descriptor = descriptor_finished(Duration::hours(2));
        let now = Utc::now();
        let one_hour = AgeThreshold::from_secs(3600).expect("age");
        let one_day = AgeThreshold::from_secs(86400).expect("age");
        assert!(evaluate(&descriptor, &[], Some(one_hour), now));
        assert!(!evaluate(&descriptor, &[], Some(one_day), now));
    }

    #[test]
    fn parse_conditions_splits_repeatable_comma_lists() {
        let raw = vec![
            "Tracker=example.org,Location=/srv".to_string(),
            "Date finished=2022".to_string(),
        ];
        let conditions = parse_conditions(&raw).expect("conditions");
        assert_eq!(
            conditions,
            vec![
                condition("Tracker", "example.org"),
                condition("Location", "/srv"),
                condition("Date finished", "2022"),
            ]
        );
    }

    #[test]
    fn parse_conditions_keeps_equals_signs_in_substring() {
        let conditions =
            parse_conditions(&["Magnet=xt=urn".to_string()]).expect("conditions");
        assert_eq!(conditions, vec![condition("Magnet", "xt=urn")]);
    }

    #[test]
    fn parse_conditions_rejects_malformed_segments() {
        let err = parse_conditions(&["Name=a,,Hash=b".to_string()]).expect_err("empty segment");
        assert!(err.contains("index 1"), "got: {err}");
        let err = parse_conditions(&["Name".to_string()]).expect_err("missing equals");
        assert!(err.contains("FIELD=SUBSTRING"), "got: {err}");
        let err = parse_conditions(&["=value".to_string()]).expect_err("empty field");
        assert!(err.contains("empty field name"), "got: {err}");
    }

    #[test]
    fn parse_age_accepts_units() {
        assert_eq!(parse_age("90").expect("age").as_secs(), 90);
        assert_eq!(parse_age("90s").expect("age").as_secs(), 90);
        assert_eq!(parse_age("5m").expect("age").as_secs(), 300);
        assert_eq!(parse_age("2h").expect("age").as_secs(), 7200);
        assert_eq!(parse_age("3d").expect("age").as_secs(), 259200);
        assert_eq!(parse_age("1w").expect("age").as_secs(), 604800);
    }

    #[test]
    fn parse_age_rejects_zero_and_garbage() {
        assert!(parse_age("0").is_err());
        assert!(parse_age("-5").is_err());
        assert!(parse_age("ten").is_err());
        assert!(parse_age("5y").is_err());
    }
}
