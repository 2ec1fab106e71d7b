//! Output formatting for the mirror CLI.
//!
//! Progress text goes to a caller-supplied stderr writer; the `plan`
//! subcommand renders its result for stdout, either for people or as JSON
//! for scripts.

use crate::pipeline::PublishPlan;
use serde::Serialize;
use std::fmt::Display;
use std::io::Write;

/// Writes one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output; a closed stderr must not abort a publish.
    }
}

/// Renders the pending version list as the sync progress line.
///
/// # Examples
///
/// ```
/// use release_mirror::output::versions_line;
///
/// assert_eq!(
///     versions_line(&["2024.1.1", "2024.1.2"]),
///     "Versions to publish: 2024.1.1, 2024.1.2"
/// );
/// assert_eq!(versions_line::<&str>(&[]), "Versions to publish: none");
/// ```
#[must_use]
pub fn versions_line<S: AsRef<str>>(versions: &[S]) -> String {
    if versions.is_empty() {
        return "Versions to publish: none".to_owned();
    }
    let joined = versions
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Versions to publish: {joined}")
}

/// Format a summary after a sync run.
#[must_use]
pub fn success_message(count: usize, destination: &str, dry_run: bool) -> String {
    let plural = if count == 1 { "version" } else { "versions" };
    if dry_run {
        format!("Dry run: {count} {plural} validated for {destination}")
    } else {
        format!("Published {count} {plural} to {destination}")
    }
}

/// Format a publish plan for human-readable output.
///
/// # Examples
///
/// ```
/// use release_mirror::output::format_plan_human;
/// use release_mirror::pipeline::PublishPlan;
///
/// let plan = PublishPlan {
///     source: "@ruffle-rs/ruffle".to_owned(),
///     destination: "ruffle-mirror".to_owned(),
///     versions: Vec::new(),
/// };
/// assert!(format_plan_human(&plan).contains("up to date"));
/// ```
#[must_use]
pub fn format_plan_human(plan: &PublishPlan) -> String {
    if plan.versions.is_empty() {
        return format!(
            "{} is up to date with {}.",
            plan.destination, plan.source
        );
    }

    let mut lines = vec![format!(
        "{} version(s) of {} to publish to {}:",
        plan.versions.len(),
        plan.source,
        plan.destination
    )];
    for version in &plan.versions {
        lines.push(format!("  - {} (from {})", version.key, version.raw));
    }
    lines.join("\n")
}

/// Format a publish plan as JSON.
///
/// # Examples
///
/// ```
/// use release_mirror::output::format_plan_json;
/// use release_mirror::pipeline::PublishPlan;
///
/// let plan = PublishPlan {
///     source: "@ruffle-rs/ruffle".to_owned(),
///     destination: "ruffle-mirror".to_owned(),
///     versions: Vec::new(),
/// };
/// assert!(format_plan_json(&plan).contains("\"versions\": []"));
/// ```
#[must_use]
pub fn format_plan_json(plan: &PublishPlan) -> String {
    let json = PlanJson::from(plan);
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_owned())
}

/// JSON-serializable representation of a publish plan.
#[derive(Debug, Serialize)]
pub struct PlanJson<'a> {
    /// Upstream catalog name.
    pub source: &'a str,
    /// Destination package name.
    pub destination: &'a str,
    /// Versions that would be published, in publish order.
    pub versions: Vec<PlanEntryJson<'a>>,
}

/// One pending version in [`PlanJson`].
#[derive(Debug, Serialize)]
pub struct PlanEntryJson<'a> {
    /// Version the mirror would publish.
    pub version: &'a str,
    /// Upstream version the artefact comes from.
    pub upstream: &'a str,
}

impl<'a> From<&'a PublishPlan> for PlanJson<'a> {
    fn from(plan: &'a PublishPlan) -> Self {
        Self {
            source: &plan.source,
            destination: &plan.destination,
            versions: plan
                .versions
                .iter()
                .map(|version| PlanEntryJson {
                    version: version.key.as_str(),
                    upstream: &version.raw,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::index_source_versions;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    #[fixture]
    fn pending_plan() -> PublishPlan {
        PublishPlan {
            source: "@ruffle-rs/ruffle".to_owned(),
            destination: "ruffle-mirror".to_owned(),
            versions: index_source_versions([
                "0.1.0-nightly.2024.3.11",
                "0.1.0-nightly.2024.3.12",
            ]),
        }
    }

    #[rstest]
    fn human_plan_lists_each_version(pending_plan: PublishPlan) {
        let text = format_plan_human(&pending_plan);
        assert!(text.starts_with("2 version(s) of @ruffle-rs/ruffle to publish to ruffle-mirror:"));
        assert!(text.contains("  - 2024.3.11 (from 0.1.0-nightly.2024.3.11)"));
        assert!(text.contains("  - 2024.3.12 (from 0.1.0-nightly.2024.3.12)"));
    }

    #[rstest]
    fn json_plan_keeps_publish_order(pending_plan: PublishPlan) {
        let parsed: Value = serde_json::from_str(&format_plan_json(&pending_plan)).expect("valid JSON");
        assert_eq!(
            parsed,
            json!({
                "source": "@ruffle-rs/ruffle",
                "destination": "ruffle-mirror",
                "versions": [
                    {"version": "2024.3.11", "upstream": "0.1.0-nightly.2024.3.11"},
                    {"version": "2024.3.12", "upstream": "0.1.0-nightly.2024.3.12"}
                ]
            })
        );
    }

    #[rstest]
    #[case::singular(1, false, "Published 1 version to ruffle-mirror")]
    #[case::plural(3, false, "Published 3 versions to ruffle-mirror")]
    #[case::dry_run(2, true, "Dry run: 2 versions validated for ruffle-mirror")]
    fn success_message_reflects_mode(
        #[case] count: usize,
        #[case] dry_run: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(success_message(count, "ruffle-mirror", dry_run), expected);
    }

    #[test]
    fn write_stderr_line_appends_newline() {
        let mut buffer = Vec::new();
        write_stderr_line(&mut buffer, "Publishing 2024.3.12");
        assert_eq!(buffer, b"Publishing 2024.3.12\n");
    }
}
