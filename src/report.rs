//! Missing-member aggregation and the end-of-run summary.
//!
//! This is the only state that persists across serialization cycles: every
//! frame pop folds its missing members in here, and the summary renders once
//! at teardown. Aggregation is keyed by (declaring type, member name) so a
//! field name reused across unrelated types never merges.

use indexmap::IndexMap;
use std::io::{self, Write};

use colored::Colorize;

/// One distinct frame path a missing member was detected under, innermost
/// frame first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<String>,
    instances: u64,
}

impl CallStack {
    fn new(frames: Vec<String>) -> Self {
        Self { frames, instances: 1 }
    }

    /// Two call stacks are the same iff their frame paths match element-wise.
    fn matches(&self, frames: &[String]) -> bool {
        self.frames == frames
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn instances(&self) -> u64 {
        self.instances
    }
}

/// Aggregated entry for one (declaring type, member) pair across a whole run.
#[derive(Debug, Clone)]
pub struct MissingInfo {
    declaring_type: String,
    member: String,
    type_name: String,
    stacks: Vec<CallStack>,
    instances: u64,
}

impl MissingInfo {
    fn new(declaring_type: &str, member: &str, type_name: &str) -> Self {
        Self {
            declaring_type: declaring_type.to_string(),
            member: member.to_string(),
            type_name: type_name.to_string(),
            stacks: Vec::new(),
            instances: 0,
        }
    }

    /// Fold in one more detection: merge into an existing stack of the same
    /// shape, or append a new one.
    fn add_stack(&mut self, frames: &[String]) {
        self.instances += 1;
        for s in &mut self.stacks {
            if s.matches(frames) {
                s.instances += 1;
                return;
            }
        }
        self.stacks.push(CallStack::new(frames.to_vec()));
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn stacks(&self) -> &[CallStack] {
        &self.stacks
    }

    pub fn instances(&self) -> u64 {
        self.instances
    }
}

// ----------------------------- Aggregation ------------------------------- //

/// Run-wide aggregation map, in first-detection order.
#[derive(Debug, Default)]
pub struct MissingMap {
    entries: IndexMap<(String, String), MissingInfo>,
}

impl MissingMap {
    pub fn record(&mut self, declaring_type: &str, member: &str, type_name: &str, frames: &[String]) {
        self.entries
            .entry((declaring_type.to_string(), member.to_string()))
            .or_insert_with(|| MissingInfo::new(declaring_type, member, type_name))
            .add_stack(frames);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Freeze into render order: descending by total instances, ties keeping
    /// first-detection order (the sort is stable).
    pub fn into_report(self) -> Report {
        let mut entries: Vec<MissingInfo> = self.entries.into_values().collect();
        entries.sort_by(|a, b| b.instances.cmp(&a.instances));
        Report { entries }
    }
}

// ------------------------------- Rendering ------------------------------- //

/// How to decorate summary lines.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub color: bool,
    /// Prefix every line with the owning process id.
    pub pid: Option<u32>,
}

/// Sorted, render-ready summary.
#[derive(Debug)]
pub struct Report {
    entries: Vec<MissingInfo>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MissingInfo] {
        &self.entries
    }

    pub fn render<W: Write>(&self, w: &mut W, opts: &RenderOptions) -> io::Result<()> {
        for e in &self.entries {
            let banner = format!(
                "---- {}::{} -- {} instances ----",
                e.declaring_type, e.member, e.instances
            );
            let banner = if opts.color {
                banner.yellow().bold().to_string()
            } else {
                banner
            };

            line(w, opts, "---- Missing serialized member ----")?;
            line(w, opts, "-----------------------------------")?;
            line(w, opts, &banner)?;
            line(w, opts, &format!("---- type: {} ----", e.type_name))?;
            for (i, cs) in e.stacks.iter().enumerate() {
                line(w, opts, &format!("---- stack {i}, {} instances", cs.instances()))?;
                for frame in cs.frames() {
                    line(w, opts, &format!("\t {frame}"))?;
                }
            }
            line(w, opts, "-----------------------------------")?;
        }
        Ok(())
    }

    /// Render to a string with plain decoration; test and log helper.
    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.render(&mut buf, &RenderOptions::default());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn line<W: Write>(w: &mut W, opts: &RenderOptions, text: &str) -> io::Result<()> {
    match opts.pid {
        Some(pid) => writeln!(w, "{pid}: {text}"),
        None => writeln!(w, "{text}"),
    }
}

// --------------------------------- Tests --------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_frame_paths_merge_into_one_stack() {
        let mut map = MissingMap::default();
        map.record("Outer", "x", "int", &frames(&["Outer", "Root"]));
        map.record("Outer", "x", "int", &frames(&["Outer", "Root"]));

        let report = map.into_report();
        let entry = &report.entries()[0];
        assert_eq!(entry.instances(), 2);
        assert_eq!(entry.stacks().len(), 1);
        assert_eq!(entry.stacks()[0].instances(), 2);
    }

    #[test]
    fn distinct_frame_paths_stay_separate() {
        let mut map = MissingMap::default();
        map.record("Outer", "x", "int", &frames(&["Outer", "Root"]));
        map.record("Outer", "x", "int", &frames(&["Outer", "Other", "Root"]));

        let report = map.into_report();
        let entry = &report.entries()[0];
        assert_eq!(entry.instances(), 2);
        assert_eq!(entry.stacks().len(), 2);
    }

    #[test]
    fn same_member_name_in_unrelated_types_does_not_merge() {
        let mut map = MissingMap::default();
        map.record("A", "x", "int", &frames(&["A"]));
        map.record("B", "x", "float", &frames(&["B"]));

        assert_eq!(map.len(), 2);
    }

    #[test]
    fn report_sorts_by_instances_descending_with_stable_ties() {
        let mut map = MissingMap::default();
        map.record("A", "one", "int", &frames(&["A"]));
        map.record("B", "two", "int", &frames(&["B"]));
        map.record("B", "two", "int", &frames(&["B"]));
        map.record("C", "tie", "int", &frames(&["C"]));

        let report = map.into_report();
        let order: Vec<&str> = report.entries().iter().map(|e| e.member()).collect();
        // "two" leads with 2 instances; "one" and "tie" tie at 1 and keep
        // first-detection order.
        assert_eq!(order, ["two", "one", "tie"]);
    }

    #[test]
    fn rendered_summary_lists_stacks_and_pid_prefix() {
        let mut map = MissingMap::default();
        map.record("Outer", "x", "int", &frames(&["Outer", "Root"]));
        let report = map.into_report();

        let plain = report.to_text();
        assert!(plain.contains("---- Outer::x -- 1 instances ----"));
        assert!(plain.contains("---- type: int ----"));
        assert!(plain.contains("---- stack 0, 1 instances"));
        assert!(plain.contains("\t Outer"));
        assert!(plain.contains("\t Root"));

        let mut buf = Vec::new();
        report
            .render(&mut buf, &RenderOptions { color: false, pid: Some(7) })
            .unwrap();
        let prefixed = String::from_utf8(buf).unwrap();
        assert!(prefixed.lines().all(|l| l.starts_with("7: ")));
    }
}
