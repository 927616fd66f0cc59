//! Minimal CLI: analyze decl dumps → (member listing | generated check code)
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::analyze::{analyze_record, Analysis};
use crate::decl::{self, DeclFile};
use crate::generate::{generate, Edit, GenMode, Generated};
use crate::rewrite;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// verify that every field of a serializable type is covered by its serialize method
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list the members still needing checks, as JSON
    Members(MembersOut),
    /// emit check code for the members still needing checks
    Generate(GenerateOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more decl dump files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// extra directories to search when an input path is relative
    #[arg(short = 'I', value_name = "DIR")]
    search: Vec<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct MembersOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// analyzer policy to apply (same switch as generate)
    #[arg(long, value_enum, default_value = "specialization")]
    mode: ModeArg,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output shape
    #[arg(long, value_enum, default_value = "specialization")]
    mode: ModeArg,

    /// output file for generated code (stdout if omitted; unused for inline)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// prepend the framework transport include line
    #[arg(long)]
    prelude_include: bool,

    /// echo each dump's translation unit before its generated code
    #[arg(long)]
    emit_source: bool,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Inline,
    Specialization,
    Standalone,
}

impl From<ModeArg> for GenMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Inline => GenMode::Inline,
            ModeArg::Specialization => GenMode::Specialization,
            ModeArg::Standalone => GenMode::Standalone,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load(&self) -> Result<Vec<DeclFile>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;

        let mut files = Vec::new();
        for source_path in source_paths {
            let source_path = self.locate(source_path);
            files.push(decl::load_decl_file(&source_path)?);
        }
        Ok(files)
    }

    /// A relative path that does not exist as given is retried under each -I
    /// directory; first hit wins.
    fn locate(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() || path.exists() {
            return path;
        }
        for dir in &self.search {
            let candidate = dir.join(&path);
            if candidate.exists() {
                return candidate;
            }
        }
        path
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Members(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let mode = GenMode::from(target.mode);
                let files = target.input_settings.load()?;
                let listing = member_listing(&files, mode);
                let json = serde_json::to_string_pretty(&listing)
                    .context("failed to serialize member listing")?;
                write_output(target.out.as_deref(), &json)
            }
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let mode = GenMode::from(target.mode);
                let files = target.input_settings.load()?;

                let mut text = String::new();
                let mut edits: Vec<Edit> = Vec::new();

                if target.prelude_include {
                    text.push_str("#include <vt/transport.h>\n");
                }

                for file in &files {
                    if target.emit_source {
                        text.push_str(&format!("// source: {}\n", file.source));
                    }
                    for record in &file.records {
                        match analyze_record(record, mode) {
                            Analysis::Skip(reason) => {
                                log::debug!("{}: skipped: {reason:?}", record.qualified_name);
                            }
                            // One bad type must not block the rest of the
                            // traversal.
                            Analysis::Anomaly(anomaly) => {
                                eprintln!("{} {anomaly}", "warning:".yellow().bold());
                            }
                            Analysis::Members { method, members } => {
                                if members.is_empty() {
                                    continue;
                                }
                                match generate(mode, record, method, &members) {
                                    Generated::Edits(e) => edits.extend(e),
                                    Generated::Text(t) => text.push_str(&t),
                                }
                            }
                        }
                    }
                }

                if mode == GenMode::Inline {
                    for path in rewrite::apply_edits(edits)? {
                        eprintln!("modified {}", path.display());
                    }
                    return Ok(());
                }
                write_output(target.out.as_deref(), &text)
            }
        }
    }
}

fn member_listing(files: &[DeclFile], mode: GenMode) -> Vec<serde_json::Value> {
    let mut listing = Vec::new();
    for file in files {
        for record in &file.records {
            if let Analysis::Members { members, .. } = analyze_record(record, mode) {
                if members.is_empty() {
                    continue;
                }
                listing.push(serde_json::json!({
                    "record": record.qualified_name,
                    "members": members,
                }));
            }
        }
    }
    listing
}

fn write_output(out: Option<&std::path::Path>, text: &str) -> Result<()> {
    if let Some(out) = out {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(out, text)
            .with_context(|| format!("failed to write {}", out.display()))?;
    } else {
        println!("{text}");
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            // Treat as a glob pattern
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// --------------------------------- Tests --------------------------------- //
