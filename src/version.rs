//! Calendar version identifiers and the upstream/mirror version diff.
//!
//! Upstream packages carry versions such as `0.1.0-nightly.2024.3.12`, and
//! upstream release tags look like `nightly-2024-03-12`; the mirror
//! publishes the embedded calendar date (`2024.3.12`) as its own version.
//! The date is therefore the key both catalogs are compared on.

use log::warn;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

/// Pattern for the `year.month.day` portion of a version string. Release
/// tags separate the parts with `-` or `_` instead of dots.
const CALENDAR_PATTERN: &str = r"(\d{4})[._-](\d{1,2})[._-](\d{1,2})";

#[expect(
    clippy::expect_used,
    reason = "the pattern is a compile-time constant and always valid"
)]
fn calendar_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(CALENDAR_PATTERN).expect("calendar pattern is valid"))
}

/// A `year.month.day` version identifier.
///
/// Components are stored without leading zeros so the identifier is a
/// valid semver version for the destination registry.
///
/// # Examples
///
/// ```
/// use release_mirror::version::CalendarVersion;
///
/// let version = CalendarVersion::extract("0.1.0-nightly.2024.3.12").unwrap();
/// assert_eq!(version.as_str(), "2024.3.12");
///
/// let tagged = CalendarVersion::extract("nightly-2024-03-02").unwrap();
/// assert_eq!(tagged.as_str(), "2024.3.2");
///
/// assert!(CalendarVersion::extract("1.2.3").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalendarVersion(String);

impl CalendarVersion {
    /// Extracts the first calendar date embedded in `raw`, if any.
    #[must_use]
    pub fn extract(raw: &str) -> Option<Self> {
        let captures = calendar_regex().captures(raw)?;
        let mut parts = Vec::with_capacity(3);
        for group in 1..=3 {
            let digits = captures.get(group)?.as_str();
            let number: u32 = digits.parse().ok()?;
            parts.push(number.to_string());
        }
        Some(Self(parts.join(".")))
    }

    /// Return the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CalendarVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalendarVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An upstream version: the calendar key plus the raw upstream string it
/// was extracted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVersion {
    /// Version the mirror publishes under.
    pub key: CalendarVersion,
    /// Version string as it appears in the upstream catalog.
    pub raw: String,
}

/// Indexes upstream versions by calendar key, in catalog order.
///
/// Raw versions without a calendar date are logged and skipped. When
/// several raw versions share a date, the last one wins but the key keeps
/// the position of its first occurrence.
pub fn index_source_versions<I, S>(raw_versions: I) -> Vec<SourceVersion>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut indexed: Vec<SourceVersion> = Vec::new();
    let mut positions: HashMap<CalendarVersion, usize> = HashMap::new();

    for raw in raw_versions {
        let raw = raw.as_ref();
        let Some(key) = CalendarVersion::extract(raw) else {
            warn!("skipping upstream version {raw}: no calendar date");
            continue;
        };

        match positions.get(&key).and_then(|&index| indexed.get_mut(index)) {
            Some(existing) => raw.clone_into(&mut existing.raw),
            None => {
                positions.insert(key.clone(), indexed.len());
                indexed.push(SourceVersion {
                    key,
                    raw: raw.to_owned(),
                });
            }
        }
    }

    indexed
}

/// Returns the upstream versions the mirror has not published yet.
///
/// Mirror versions are compared verbatim against the calendar keys, and
/// the result keeps upstream catalog order.
///
/// # Examples
///
/// ```
/// use release_mirror::version::{index_source_versions, versions_to_publish};
///
/// let source = index_source_versions(["0.1.0-nightly.2024.1.1", "0.1.0-nightly.2024.1.2"]);
/// let pending = versions_to_publish(&source, &["2024.1.1".to_owned()]);
/// assert_eq!(pending.len(), 1);
/// assert_eq!(pending[0].key.as_str(), "2024.1.2");
/// ```
#[must_use]
pub fn versions_to_publish(source: &[SourceVersion], published: &[String]) -> Vec<SourceVersion> {
    let published: HashSet<&str> = published.iter().map(String::as_str).collect();
    source
        .iter()
        .filter(|version| !published.contains(version.key.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn keys(versions: &[SourceVersion]) -> Vec<&str> {
        versions.iter().map(|version| version.key.as_str()).collect()
    }

    #[rstest]
    #[case::nightly("0.1.0-nightly.2024.3.12", "2024.3.12")]
    #[case::bare("2023.12.1", "2023.12.1")]
    #[case::padded("1.0.0-2023.01.05", "2023.1.5")]
    #[case::release_tag("nightly-2024-03-12", "2024.3.12")]
    #[case::underscores("ruffle-nightly-2024_03_12-web", "2024.3.12")]
    #[case::first_match_wins("2023.1.1-rebuild.2024.2.2", "2023.1.1")]
    fn extracts_calendar_date(#[case] raw: &str, #[case] expected: &str) {
        let version = CalendarVersion::extract(raw).expect("date present");
        assert_eq!(version.as_str(), expected);
    }

    #[test]
    fn calendar_regex_is_compiled_once() {
        assert!(std::ptr::eq(calendar_regex(), calendar_regex()));
        assert_eq!(calendar_regex().as_str(), CALENDAR_PATTERN);
    }

    #[rstest]
    #[case::semver("0.1.0")]
    #[case::short_year("0.1.0-nightly.24.3.12")]
    #[case::slashes("2024/03/12")]
    #[case::empty("")]
    fn rejects_versions_without_date(#[case] raw: &str) {
        assert!(CalendarVersion::extract(raw).is_none());
    }

    #[test]
    fn index_skips_malformed_versions() {
        let indexed = index_source_versions(["0.1.0", "0.1.0-nightly.2024.1.1", "latest"]);
        assert_eq!(keys(&indexed), vec!["2024.1.1"]);
    }

    #[test]
    fn index_keeps_first_position_and_last_raw_for_duplicates() {
        let indexed = index_source_versions([
            "0.1.0-nightly.2024.1.1",
            "0.1.0-nightly.2024.1.2",
            "0.1.1-nightly.2024.1.1",
        ]);
        assert_eq!(keys(&indexed), vec!["2024.1.1", "2024.1.2"]);
        assert_eq!(
            indexed.first().map(|version| version.raw.as_str()),
            Some("0.1.1-nightly.2024.1.1")
        );
    }

    #[test]
    fn pending_versions_follow_source_order() {
        // Deliberately not in lexical order, to show catalog order is kept.
        let source = index_source_versions([
            "0.1.0-nightly.2024.2.1",
            "0.1.0-nightly.2024.10.1",
            "0.1.0-nightly.2024.3.1",
        ]);
        let published = vec!["2024.2.1".to_owned()];

        let pending = versions_to_publish(&source, &published);
        assert_eq!(keys(&pending), vec!["2024.10.1", "2024.3.1"]);
    }

    #[test]
    fn fully_mirrored_destination_yields_nothing() {
        let source = index_source_versions(["0.1.0-nightly.2024.1.1", "0.1.0-nightly.2024.1.2"]);
        let published = vec!["2024.1.1".to_owned(), "2024.1.2".to_owned()];
        assert!(versions_to_publish(&source, &published).is_empty());
    }

    #[test]
    fn empty_destination_publishes_everything() {
        let source = index_source_versions(["0.1.0-nightly.2024.1.1", "0.1.0-nightly.2024.1.2"]);
        let pending = versions_to_publish(&source, &[]);
        assert_eq!(keys(&pending), vec!["2024.1.1", "2024.1.2"]);
    }

    #[test]
    fn extra_destination_versions_are_ignored() {
        let source = index_source_versions(["0.1.0-nightly.2024.1.2"]);
        let published = vec!["2023.5.5".to_owned(), "0.0.1".to_owned()];
        assert_eq!(keys(&versions_to_publish(&source, &published)), vec!["2024.1.2"]);
    }
}
