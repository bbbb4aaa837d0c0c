//! Output formatting for CLI commands.
//!
//! Every printer supports a human-readable text mode and a JSON mode for
//! scripting. Text rendering is written against any [`Write`] so it can be
//! checked in tests with colors disabled.

use crate::domain::{COMPLETED_FIELD, IssueSnapshot};
use crate::storage::{Document, UpdateOutcome};
use crate::sync::SyncReport;
use colored::Colorize;
use serde::Serialize;
use serde_json::{Value, json};
use std::env;
use std::io::{self, Write};

/// Output format selected by the global `--json` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Settings for text rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use ASCII-only connectors instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Read settings from the environment.
    ///
    /// - `BACKPORTS_ASCII`: `1` or `true` for ASCII connectors
    /// - `NO_COLOR`: any value disables colors
    pub fn from_env() -> Self {
        let use_ascii = env::var("BACKPORTS_ASCII")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            use_ascii,
            use_colors: env::var("NO_COLOR").is_err(),
        }
    }

    /// Plain ASCII output without colors.
    pub fn plain() -> Self {
        Self {
            use_ascii: true,
            use_colors: false,
        }
    }

    fn paint(&self, text: &str, style: fn(&str) -> colored::ColoredString) -> String {
        if self.use_colors {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Print any serializable value as pretty JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    writeln!(handle, "{json}")
}

/// Print the result of a sync run.
pub fn print_sync_report(report: &SyncReport, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(report),
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            write_sync_report(&mut io::stdout().lock(), report, &config)
        }
    }
}

/// Print every stored document.
pub fn print_documents(docs: &[Document], mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&docs),
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            write_documents(&mut io::stdout().lock(), docs, &config)
        }
    }
}

/// Print the result of setting the completion flag.
pub fn print_completion(
    id: &str,
    completed: bool,
    outcome: &UpdateOutcome,
    mode: OutputMode,
) -> io::Result<()> {
    match mode {
        OutputMode::Json => print_json(&json!({
            "id": id,
            "completed": completed,
            "modified": outcome.modified > 0,
        })),
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            let state = if completed { "completed" } else { "not completed" };
            let note = if outcome.modified > 0 {
                ""
            } else {
                " (unchanged)"
            };
            writeln!(
                io::stdout().lock(),
                "{} Marked {} as {state}{note}",
                config.paint("✓", |s| s.green()),
                config.paint(id, |s| s.cyan()),
            )
        }
    }
}

/// Render a sync report as text.
pub fn write_sync_report<W: Write>(
    w: &mut W,
    report: &SyncReport,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} Synced {} issues ({} new) from {} page{}",
        config.paint("✓", |s| s.green()),
        report.upserted,
        report.inserted,
        report.pages,
        if report.pages == 1 { "" } else { "s" },
    )?;
    if report.failed > 0 {
        writeln!(
            w,
            "  {}",
            config.paint(&format!("{} issues skipped (see log)", report.failed), |s| s.yellow())
        )?;
    }
    writeln!(w, "  Removed {} stale documents", report.removed)
}

/// Render documents as clone-chain trees.
///
/// ```text
/// * OCPBUGS-1 [Verified] 4.19.0 Fix the thing (Sam Doe)
///   backports: 4.18.z, 4.17.z
/// `-- OCPBUGS-2 [ON_QA] 4.18.z
///     `-- OCPBUGS-3 [New] 4.17.z
/// ```
pub fn write_documents<W: Write>(
    w: &mut W,
    docs: &[Document],
    config: &OutputConfig,
) -> io::Result<()> {
    if docs.is_empty() {
        return writeln!(w, "No documents stored");
    }
    for doc in docs {
        write_document(w, doc, config)?;
    }
    Ok(())
}

fn write_document<W: Write>(w: &mut W, doc: &Document, config: &OutputConfig) -> io::Result<()> {
    let completed = doc.get(COMPLETED_FIELD).and_then(Value::as_bool) == Some(true);
    let Ok(root) = serde_json::from_value::<IssueSnapshot>(Value::Object(doc.clone())) else {
        let id = doc.get("id").and_then(Value::as_str).unwrap_or("?");
        return writeln!(w, "? {} {}", id, config.paint("(unreadable)", |s| s.dimmed()));
    };

    let root_icon = if config.use_ascii { "*" } else { "◆" };
    let mark = if completed {
        format!(" {}", config.paint("done", |s| s.green()))
    } else {
        String::new()
    };
    let summary = root
        .summary
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| format!(" {s}"))
        .unwrap_or_default();
    let assignee = root
        .assignee
        .as_deref()
        .map(|a| format!(" ({a})"))
        .unwrap_or_default();
    writeln!(
        w,
        "{} {}{}{}{assignee}",
        config.paint(root_icon, |s| s.cyan().bold()),
        level_label(&root, config),
        mark,
        summary,
    )?;

    if let Some(backports) = root
        .target_backport_versions
        .as_deref()
        .filter(|v| !v.is_empty())
    {
        writeln!(w, "  {} {backports}", config.paint("backports:", |s| s.dimmed()))?;
    }

    let corner = if config.use_ascii { "`-- " } else { "└── " };
    for (depth, level) in root.chain().skip(1).enumerate() {
        writeln!(
            w,
            "{}{}{}",
            "    ".repeat(depth),
            config.paint(corner, |s| s.dimmed()),
            level_label(level, config)
        )?;
    }
    Ok(())
}

fn level_label(snapshot: &IssueSnapshot, config: &OutputConfig) -> String {
    let status = snapshot
        .status
        .as_deref()
        .map(|s| format!(" [{}]", config.paint(s, |s| s.yellow())))
        .unwrap_or_default();
    let version = if snapshot.target_version.is_empty() {
        String::new()
    } else {
        format!(" {}", snapshot.target_version)
    };
    format!(
        "{}{status}{version}",
        config.paint(snapshot.id.as_str(), |s| s.cyan())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn render_docs(docs: &[Document]) -> String {
        let mut out = Vec::new();
        write_documents(&mut out, docs, &OutputConfig::plain()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_clone_chain_tree() {
        let docs = [doc(json!({
            "id": "OCPBUGS-1",
            "status": "Verified",
            "target_version": "4.19.0",
            "summary": "Fix the thing",
            "assignee": "Sam Doe",
            "target_backport_versions": "4.18.z, 4.17.z",
            "completed": true,
            "clone": {
                "id": "OCPBUGS-2",
                "status": "ON_QA",
                "target_version": "4.18.z",
                "clone": {"id": "OCPBUGS-3", "status": "New", "target_version": "4.17.z"}
            }
        }))];

        let expected = "\
* OCPBUGS-1 [Verified] 4.19.0 done Fix the thing (Sam Doe)
  backports: 4.18.z, 4.17.z
`-- OCPBUGS-2 [ON_QA] 4.18.z
    `-- OCPBUGS-3 [New] 4.17.z
";
        assert_eq!(render_docs(&docs), expected);
    }

    #[test]
    fn test_empty_store() {
        assert_eq!(render_docs(&[]), "No documents stored\n");
    }

    #[test]
    fn test_unreadable_document() {
        let docs = [doc(json!({"id": "X-1", "clone": "not an object"}))];
        assert_eq!(render_docs(&docs), "? X-1 (unreadable)\n");
    }

    #[test]
    fn test_sync_report_text() {
        let report = SyncReport {
            pages: 1,
            upserted: 3,
            inserted: 1,
            failed: 2,
            removed: 4,
        };
        let mut out = Vec::new();
        write_sync_report(&mut out, &report, &OutputConfig::plain()).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "✓ Synced 3 issues (1 new) from 1 page\n  2 issues skipped (see log)\n  Removed 4 stale documents\n"
        );
    }
}
