//! Renderable views over core types, shared by the command handlers.

use crate::output::{Renderable, format_us, pretty_kv, pretty_section};
use serde::Serialize;
use splits_core::db::query::StoreStats;
use splits_core::model::{Assignment, MixpanelResult, PreviousAssignment, Split};
use std::io::{self, Write};

fn result_label(result: Option<MixpanelResult>) -> &'static str {
    match result {
        Some(MixpanelResult::Success) => "success",
        Some(MixpanelResult::Failure) => "failure",
        None => "-",
    }
}

/// An assignment together with its split's name.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub split_name: String,
    #[serde(flatten)]
    pub assignment: Assignment,
}

impl AssignmentView {
    #[must_use]
    pub const fn new(split_name: String, assignment: Assignment) -> Self {
        Self {
            split_name,
            assignment,
        }
    }
}

impl Renderable for AssignmentView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let a = &self.assignment;
        pretty_section(w, &format!("assignment #{}", a.assignment_id))?;
        pretty_kv(w, "visitor", &a.visitor_id)?;
        pretty_kv(w, "split", &self.split_name)?;
        pretty_kv(w, "variant", &a.variant)?;
        pretty_kv(w, "overridden", if a.individually_overridden { "yes" } else { "no" })?;
        if let Some(ref context) = a.context {
            pretty_kv(w, "context", context)?;
        }
        pretty_kv(w, "mixpanel", result_label(a.mixpanel_result))?;
        pretty_kv(w, "created", format_us(a.created_at_us))?;
        pretty_kv(w, "updated", format_us(a.updated_at_us))?;
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let a = &self.assignment;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            a.assignment_id,
            a.visitor_id,
            self.split_name,
            a.variant,
            result_label(a.mixpanel_result),
            format_us(a.updated_at_us),
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "visitor", "split", "variant", "mixpanel", "updated"]
    }
}

/// A supersession history entry.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    #[serde(flatten)]
    pub snapshot: PreviousAssignment,
}

impl Renderable for HistoryView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let s = &self.snapshot;
        writeln!(
            w,
            "{}  {}  held {} → superseded {}",
            s.previous_assignment_id,
            s.variant,
            format_us(s.created_at_us),
            format_us(s.superseded_at_us),
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let s = &self.snapshot;
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            s.previous_assignment_id,
            s.variant,
            format_us(s.created_at_us),
            format_us(s.superseded_at_us),
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "variant", "held_since", "superseded_at"]
    }
}

/// A split definition with its current registry.
#[derive(Debug, Clone, Serialize)]
pub struct SplitView {
    #[serde(flatten)]
    pub split: Split,
}

impl Renderable for SplitView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, &format!("split '{}'", self.split.name))?;
        for variant in &self.split.variants {
            writeln!(w, "  {} (weight {})", variant.name, variant.weight)?;
        }
        pretty_kv(w, "updated", format_us(self.split.updated_at_us))?;
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let names: Vec<&str> = self.split.variants.iter().map(|v| v.name.as_str()).collect();
        writeln!(w, "{}\t{}", self.split.name, names.join(","))
    }

    fn table_headers() -> &'static [&'static str] {
        &["split", "variants"]
    }
}

/// Store-level stats for the status command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    #[serde(flatten)]
    pub stats: StoreStats,
}

impl Renderable for StatusView {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let s = &self.stats;
        pretty_section(w, "store status")?;
        pretty_kv(w, "splits", s.splits.to_string())?;
        pretty_kv(w, "visitors", s.visitors.to_string())?;
        pretty_kv(w, "assignments", s.assignments.to_string())?;
        pretty_kv(w, "superseded", s.previous_assignments.to_string())?;
        pretty_kv(
            w,
            "synced",
            format!(
                "{} success / {} failure / {} pending",
                s.sync.success, s.sync.failure, s.sync.unset
            ),
        )?;
        pretty_kv(w, "unsynced", s.sync.unsynced().to_string())?;
        Ok(())
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let s = &self.stats;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            s.splits,
            s.assignments,
            s.sync.success,
            s.sync.failure,
            s.sync.unset
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["splits", "assignments", "success", "failure", "pending"]
    }
}
