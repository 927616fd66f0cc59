//! Static coverage analysis.
//!
//! Given one record declaration from the oracle, decide whether it carries
//! an eligible serialize method and, if so, which declared fields never
//! appear in an explicit `check` call inside that method's body. The result
//! feeds the generators; nothing here touches source text.

use std::collections::HashSet;

use crate::decl::{Expr, MethodDecl, RecordDecl, RecordKind, SerializeLookup, Stmt};
use crate::generate::GenMode;
use crate::member::{Member, MemberList};

/// Per-record outcome. Skips are routine. Anomalies deserve a diagnostic but
/// must not stop the traversal of other records.
#[derive(Debug)]
pub enum Analysis<'a> {
    Skip(SkipReason),
    Anomaly(Anomaly),
    Members {
        method: &'a MethodDecl,
        members: MemberList,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Definition-targeting modes edit or reconstruct the generic definition
    /// once; its instantiations would repeat it.
    InstantiationInDefinitionMode,
    /// Specialization mode targets concrete instantiations only.
    TemplatePattern,
    /// Unions have no meaningful per-field ownership to check.
    Union,
    /// Nested in an uninstantiated enclosing template: the qualified name is
    /// not nameable where generated code would land.
    EnclosedByTemplatePattern,
    NoSerialize,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Anomaly {
    #[error(
        "{record}: serialize has {count} template parameters, placement of generated checks would be ambiguous"
    )]
    AmbiguousSerialize { record: String, count: usize },
    #[error("{record}: {members} members need checks, but no serialize body was found")]
    MissingBody { record: String, members: usize },
}

/// Run the coverage analysis for one record under the run-wide output policy.
pub fn analyze_record<'a>(record: &'a RecordDecl, mode: GenMode) -> Analysis<'a> {
    if mode.targets_definitions() {
        if record.instantiation.is_some() {
            return Analysis::Skip(SkipReason::InstantiationInDefinitionMode);
        }
    } else if record.template.is_some() {
        return Analysis::Skip(SkipReason::TemplatePattern);
    }

    if record.kind == RecordKind::Union {
        return Analysis::Skip(SkipReason::Union);
    }

    if record.enclosing.iter().any(|c| c.is_template_pattern) {
        return Analysis::Skip(SkipReason::EnclosedByTemplatePattern);
    }

    let method = match record.find_serialize() {
        SerializeLookup::Found(m) => m,
        SerializeLookup::Ambiguous(m) => {
            return Analysis::Anomaly(Anomaly::AmbiguousSerialize {
                record: record.qualified_name.clone(),
                count: m.template_params.len(),
            });
        }
        SerializeLookup::NotFound => return Analysis::Skip(SkipReason::NoSerialize),
    };

    let existing = existing_checks(method);
    let members: MemberList = record
        .fields
        .iter()
        .filter(|f| !existing.contains(f.name.as_str()))
        .map(|f| Member {
            unqualified: f.name.clone(),
            qualified: f.qualified_name.clone(),
        })
        .collect();

    // Declaration without definition: inline edits have nowhere to land.
    if mode == GenMode::Inline && method.body.is_none() && !members.is_empty() {
        return Analysis::Anomaly(Anomaly::MissingBody {
            record: record.qualified_name.clone(),
            members: members.len(),
        });
    }

    Analysis::Members { method, members }
}

/// Unqualified field names already referenced by an explicit `check` call at
/// the top level of the serialize body.
///
/// Only one statement shape qualifies: a type-dependent two-argument call
/// whose callee member is `check` and whose first argument is a direct
/// member access. Anything else is someone's unrelated code.
fn existing_checks(method: &MethodDecl) -> HashSet<&str> {
    let mut found = HashSet::new();
    let Some(body) = &method.body else {
        return found;
    };

    for stmt in &body.stmts {
        let Stmt::DependentCall { callee_member, args } = stmt else {
            continue;
        };
        if callee_member != "check" || args.len() != 2 {
            continue;
        }
        if let Some(Expr::MemberAccess { field }) = args.first() {
            found.insert(field.as_str());
        }
    }
    found
}

// --------------------------------- Tests --------------------------------- //
