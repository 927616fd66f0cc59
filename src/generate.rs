//! Render a member list into check code.
//!
//! Three output shapes share one entry point; each is a pure function from
//! (record, serialize method, member list) to emitted text or edits. The
//! shape is picked once per run and also steers the analyzer's skip policy.

use crate::decl::{MethodDecl, RecordDecl, TemplateParam};
use crate::member::MemberList;

/// Fixed checking-serializer type the out-of-line shapes specialize for.
pub const CHECKER_TYPE: &str = "sercheck::serializers::Checker";

/// Output shape, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenMode {
    /// Insert checks into the serialize body in place.
    Inline,
    /// Emit explicit specializations of `serialize` for the checker type.
    Specialization,
    /// Emit free `serializeCheck` functions (experimental).
    Standalone,
}

impl GenMode {
    /// Whether this shape targets generic definitions (edit or reconstruct
    /// them once) rather than concrete instantiations.
    pub fn targets_definitions(self) -> bool {
        !matches!(self, GenMode::Specialization)
    }
}

/// What a generator produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    /// In-place insertions, to be applied by the rewriter.
    Edits(Vec<Edit>),
    /// Out-of-line source text.
    Text(String),
}

/// One text insertion into an existing source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub file: String,
    pub offset: usize,
    pub text: String,
}

pub fn generate(
    mode: GenMode,
    record: &RecordDecl,
    method: &MethodDecl,
    members: &MemberList,
) -> Generated {
    match mode {
        GenMode::Inline => Generated::Edits(inline_edits(method, members)),
        GenMode::Specialization => Generated::Text(specialization_text(record, members)),
        GenMode::Standalone => Generated::Text(standalone_text(record, members)),
    }
}

// -------------------------------- Inline --------------------------------- //

fn inline_edits(method: &MethodDecl, members: &MemberList) -> Vec<Edit> {
    if members.is_empty() {
        return Vec::new();
    }
    // A missing body was already diagnosed by the analyzer.
    let Some(loc) = method.body_end.as_ref() else {
        return Vec::new();
    };

    let mut text = String::from("  /* begin generated serialize checks */\n");
    for m in members {
        text.push_str(&format!("  s.check({}, \"{}\");\n", m.unqualified, m.qualified));
    }
    text.push_str("  /* end generated serialize checks */\n");

    vec![Edit {
        file: loc.file.clone(),
        offset: loc.offset,
        text,
    }]
}

// ----------------------------- Specialization ---------------------------- //

fn specialization_text(record: &RecordDecl, members: &MemberList) -> String {
    let mut out = String::new();

    if record.instantiation.is_some() {
        // A member specialization inside a class template instantiation
        // needs both headers, and the type spelling must carry its full
        // argument list.
        out.push_str("template <>\ntemplate <>\n");
        push_serialize_header(&mut out, &record.instantiated_name());
    } else {
        out.push_str("template <>\n");
        push_serialize_header(&mut out, &record.qualified_name);
    }

    for m in members {
        out.push_str(&format!("  s.check({}, \"{}\");\n", m.unqualified, m.qualified));
    }
    out.push_str("}\n");
    out
}

fn push_serialize_header(out: &mut String, type_name: &str) {
    out.push_str(&format!(
        "void {type_name}::serialize<{CHECKER_TYPE}>({CHECKER_TYPE}& s) {{\n"
    ));
}

// ------------------------------- Standalone ------------------------------ //

fn standalone_text(record: &RecordDecl, members: &MemberList) -> String {
    // Reconstruct the class template's parameter list, if any, and a
    // matching argument list for the target type use.
    let mut decl_params = String::new();
    let mut arg_names: Vec<&str> = Vec::new();

    if let Some(template) = &record.template {
        for p in &template.params {
            match p {
                TemplateParam::Type { name, pack, .. } => {
                    let dots = if *pack { "..." } else { "" };
                    decl_params.push_str(&format!(", typename {dots}{name}"));
                    arg_names.push(name);
                }
                TemplateParam::NonType { name, type_ref } => {
                    decl_params
                        .push_str(&format!(", {} {name}", type_ref.fully_qualified(true)));
                    arg_names.push(name);
                }
            }
        }
    }

    let target_args = if arg_names.is_empty() {
        String::new()
    } else {
        format!("<{}>", arg_names.join(","))
    };

    let mut out = String::new();
    out.push_str(&format!("template <typename SerializerT{decl_params}>\n"));
    out.push_str(&format!(
        "void serializeCheck(SerializerT& s, {}{target_args}& obj) {{\n",
        record.qualified_name
    ));
    for m in members {
        out.push_str(&format!("  s.check(obj.{}, \"{}\");\n", m.unqualified, m.qualified));
    }
    out.push_str("}\n\n");
    out
}

// --------------------------------- Tests --------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Member;

    fn record(value: serde_json::Value) -> RecordDecl {
        serde_json::from_value(value).unwrap()
    }

    fn members(names: &[(&str, &str)]) -> MemberList {
        names
            .iter()
            .map(|(u, q)| Member {
                unqualified: (*u).into(),
                qualified: (*q).into(),
            })
            .collect()
    }

    #[test]
    fn specialization_emits_checks_in_field_order() {
        let rd = record(serde_json::json!({
            "name": "Pair", "qualified_name": "Pair", "kind": "struct",
        }));
        let ms = members(&[("a", "Pair::a"), ("b", "Pair::b")]);
        let text = specialization_text(&rd, &ms);

        assert_eq!(
            text,
            format!(
                "template <>\n\
                 void Pair::serialize<{CHECKER_TYPE}>({CHECKER_TYPE}& s) {{\n\
                 \x20 s.check(a, \"Pair::a\");\n\
                 \x20 s.check(b, \"Pair::b\");\n\
                 }}\n"
            )
        );
    }

    #[test]
    fn instantiation_specialization_doubles_the_header() {
        let rd = record(serde_json::json!({
            "name": "Dir", "qualified_name": "Dir", "kind": "struct",
            "instantiation": { "args": [ { "builtin": "int" } ] },
        }));
        let ms = members(&[("elm_", "Dir::elm_")]);
        let text = specialization_text(&rd, &ms);

        assert!(text.starts_with("template <>\ntemplate <>\n"));
        assert!(text.contains("void Dir<int>::serialize<"));
        assert!(text.contains("s.check(elm_, \"Dir::elm_\");"));
    }

    #[test]
    fn standalone_reconstructs_template_parameters() {
        let rd = record(serde_json::json!({
            "name": "Holder", "qualified_name": "ns::Holder", "kind": "struct",
            "template": { "params": [
                { "type": { "name": "T" } },
                { "type": { "name": "Ts", "pack": true } },
                { "non_type": { "name": "N", "type_ref": { "named": { "path": ["std", "size_t"] } } } },
            ]},
        }));
        let ms = members(&[("x", "ns::Holder::x")]);
        let text = standalone_text(&rd, &ms);

        assert!(text.contains(
            "template <typename SerializerT, typename T, typename ...Ts, ::std::size_t N>"
        ));
        assert!(text.contains("void serializeCheck(SerializerT& s, ns::Holder<T,Ts,N>& obj)"));
        assert!(text.contains("s.check(obj.x, \"ns::Holder::x\");"));
    }

    #[test]
    fn inline_edit_lands_at_body_end_with_markers() {
        let method: MethodDecl = serde_json::from_value(serde_json::json!({
            "name": "serialize", "params": 1,
            "template_params": [ { "type": { "name": "S" } } ],
            "body": { "stmts": [] },
            "body_end": { "file": "pair.h", "offset": 120 },
        }))
        .unwrap();
        let ms = members(&[("a", "Pair::a")]);
        let edits = inline_edits(&method, &ms);

        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].file, "pair.h");
        assert_eq!(edits[0].offset, 120);
        assert!(edits[0].text.starts_with("  /* begin generated serialize checks */\n"));
        assert!(edits[0].text.contains("  s.check(a, \"Pair::a\");\n"));
        assert!(edits[0].text.ends_with("  /* end generated serialize checks */\n"));
    }

    #[test]
    fn inline_without_members_or_body_produces_no_edits() {
        let method: MethodDecl = serde_json::from_value(serde_json::json!({
            "name": "serialize", "params": 1,
            "template_params": [ { "type": { "name": "S" } } ],
        }))
        .unwrap();
        assert!(inline_edits(&method, &members(&[("a", "A::a")])).is_empty());
        assert!(inline_edits(&method, &MemberList::new()).is_empty());
    }
}
