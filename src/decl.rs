//! Declaration oracle model.
//!
//! The static engine never parses source itself. A compiler frontend exports
//! the declarations it already classified (record types, fields, serialize
//! method shapes, top-level call expressions) as one JSON document per
//! translation unit. This module is that wire model, plus the name queries
//! the analyzer and the generators ask of it.
//!
//! Everything here is read-once: a dump is loaded, walked, and dropped.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use anyhow::{anyhow, Context};
use std::path::Path;

// ------------------------------ Wire model ------------------------------- //

/// One oracle dump: every record declaration classified in one translation
/// unit, in traversal order.
#[derive(Debug, Clone, Deserialize)]
pub struct DeclFile {
    /// The translation unit this dump was produced from.
    pub source: String,
    #[serde(default)]
    pub records: Vec<RecordDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Struct,
    Class,
    Union,
}

/// A composite type declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordDecl {
    pub name: String,
    pub qualified_name: String,
    pub kind: RecordKind,
    /// Present when this record is a class template pattern, i.e. the
    /// generic, yet-uninstantiated definition.
    #[serde(default)]
    pub template: Option<TemplateDecl>,
    /// Present when this record is a concrete instantiation of a class
    /// template. Mutually exclusive with `template`.
    #[serde(default)]
    pub instantiation: Option<Instantiation>,
    /// Enclosing record contexts, outermost first.
    #[serde(default)]
    pub enclosing: Vec<EnclosingContext>,
    /// Declared fields in declaration order. The frontend exports neither
    /// inherited nor static members.
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateDecl {
    #[serde(default)]
    pub params: Vec<TemplateParam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instantiation {
    #[serde(default)]
    pub args: Vec<TypeRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnclosingContext {
    pub qualified_name: String,
    /// True when the ancestor is itself a class template pattern. A member
    /// class of one is not nameable from generated code.
    #[serde(default)]
    pub is_template_pattern: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub qualified_name: String,
    /// Printable type of the field, carried through to check labels.
    #[serde(default)]
    pub type_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    /// Number of formal (value) parameters.
    pub params: usize,
    /// Template parameters of the method itself; empty for non-template
    /// methods.
    #[serde(default)]
    pub template_params: Vec<TemplateParam>,
    #[serde(default)]
    pub body: Option<MethodBody>,
    /// Position just before the closing brace of the body, where inline
    /// edits land.
    #[serde(default)]
    pub body_end: Option<SourceLoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateParam {
    Type {
        name: String,
        #[serde(default)]
        pack: bool,
        #[serde(default)]
        has_default: bool,
    },
    NonType {
        name: String,
        type_ref: TypeRef,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodBody {
    /// Top-level statements only; nested blocks are opaque to the analyzer.
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

/// Statements classified down to the one call shape the analyzer inspects.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    /// A type-dependent call `recv.member(args...)` whose callee could not
    /// be resolved at parse time (the serializer parameter is a template
    /// type).
    DependentCall {
        callee_member: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Direct member access on the enclosing record (`field`, `this->field`).
    MemberAccess { field: String },
    Other,
}

/// Byte position inside a source file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub offset: usize,
}

// ------------------------------ Type names ------------------------------- //

/// Recursive type reference, rich enough to print a spelling that stays
/// valid outside the point of declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// A (possibly templated) named type: path segments from the global
    /// namespace down, plus template arguments if any.
    Named {
        path: Vec<String>,
        #[serde(default)]
        args: Vec<TypeRef>,
    },
    Pointer(Box<TypeRef>),
    Reference(Box<TypeRef>),
    /// A still-unsubstituted template parameter, printed by name.
    Param(String),
    Builtin(String),
}

impl TypeRef {
    /// Print a fully qualified spelling, recursing through pointer and
    /// reference wrapping and through template argument lists.
    ///
    /// `global_prefix` anchors named types at the global namespace
    /// (`::ns::Ty`) so the result cannot be captured by a closer declaration
    /// at the point of use.
    pub fn fully_qualified(&self, global_prefix: bool) -> String {
        match self {
            TypeRef::Named { path, args } => {
                let mut out = String::new();
                if global_prefix {
                    out.push_str("::");
                }
                out.push_str(&path.join("::"));
                if !args.is_empty() {
                    let inner = args
                        .iter()
                        .map(|a| a.fully_qualified(global_prefix))
                        .collect::<Vec<_>>()
                        .join(", ");
                    out.push('<');
                    out.push_str(&inner);
                    out.push('>');
                }
                out
            }
            TypeRef::Pointer(inner) => format!("{}*", inner.fully_qualified(global_prefix)),
            TypeRef::Reference(inner) => format!("{}&", inner.fully_qualified(global_prefix)),
            TypeRef::Param(name) => name.clone(),
            TypeRef::Builtin(name) => name.clone(),
        }
    }
}

/// Outcome of looking for the one serialize method the analyzer accepts.
#[derive(Debug)]
pub enum SerializeLookup<'a> {
    Found(&'a MethodDecl),
    /// A serialize template exists, but its template-parameter list is not a
    /// single parameter. Overload sets guarded by extra defaulted parameters
    /// (enable_if shapes) land here; placement of generated checks would be
    /// ambiguous.
    Ambiguous(&'a MethodDecl),
    NotFound,
}

impl RecordDecl {
    /// Locate the unique template method named `serialize` with exactly one
    /// formal parameter and exactly one template parameter. Non-template
    /// methods of the same name are never candidates.
    pub fn find_serialize(&self) -> SerializeLookup<'_> {
        let mut ambiguous = None;
        for m in &self.methods {
            if m.name != "serialize" || m.params != 1 || m.template_params.is_empty() {
                continue;
            }
            if m.template_params.len() == 1 {
                return SerializeLookup::Found(m);
            }
            ambiguous.get_or_insert(m);
        }
        match ambiguous {
            Some(m) => SerializeLookup::Ambiguous(m),
            None => SerializeLookup::NotFound,
        }
    }

    /// Fully qualified spelling of a concrete instantiation, with every
    /// template argument recursively qualified. The plain `qualified_name`
    /// of an instantiation omits its argument list, which is not a legal
    /// spelling at the point generated code lands.
    pub fn instantiated_name(&self) -> String {
        match &self.instantiation {
            Some(inst) => {
                let args = inst
                    .args
                    .iter()
                    .map(|a| a.fully_qualified(true))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}<{}>", self.qualified_name, args)
            }
            None => self.qualified_name.clone(),
        }
    }
}

// ------------------------------- Loading --------------------------------- //

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at JSON path {path} → {}", err.into_inner()))
        }
    }
}

pub fn load_decl_file(path: &Path) -> anyhow::Result<DeclFile> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read decl dump {}", path.display()))?;
    from_str_with_path(&src).map_err(|err| anyhow!("{}: {err}", path.display()))
}

// --------------------------------- Tests --------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: serde_json::Value) -> RecordDecl {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn qualified_names_recurse_through_wrappers_and_args() {
        let ty = TypeRef::Pointer(Box::new(TypeRef::Named {
            path: vec!["ns".into(), "Dir".into()],
            args: vec![
                TypeRef::Builtin("int".into()),
                TypeRef::Reference(Box::new(TypeRef::Named {
                    path: vec!["ns".into(), "Idx".into()],
                    args: vec![],
                })),
            ],
        }));
        assert_eq!(ty.fully_qualified(true), "::ns::Dir<int, ::ns::Idx&>*");
        assert_eq!(ty.fully_qualified(false), "ns::Dir<int, ns::Idx&>*");
    }

    #[test]
    fn instantiated_name_qualifies_every_argument() {
        let rd = record(serde_json::json!({
            "name": "Dir",
            "qualified_name": "ns::Dir",
            "kind": "struct",
            "instantiation": { "args": [
                { "named": { "path": ["ns", "Idx"], "args": [ { "builtin": "int" } ] } }
            ]},
        }));
        assert_eq!(rd.instantiated_name(), "ns::Dir<::ns::Idx<int>>");
    }

    #[test]
    fn find_serialize_wants_one_param_and_one_template_param() {
        let rd = record(serde_json::json!({
            "name": "T",
            "qualified_name": "T",
            "kind": "struct",
            "methods": [
                { "name": "serialize", "params": 2,
                  "template_params": [ { "type": { "name": "S" } } ] },
                { "name": "size", "params": 0 },
                { "name": "serialize", "params": 1,
                  "template_params": [ { "type": { "name": "S" } } ] },
            ],
        }));
        assert!(matches!(rd.find_serialize(), SerializeLookup::Found(m) if m.params == 1));
    }

    #[test]
    fn extra_template_params_are_ambiguous_not_found() {
        // enable_if-style guard: serialize<S, enabled_ = ...>
        let rd = record(serde_json::json!({
            "name": "T",
            "qualified_name": "T",
            "kind": "struct",
            "methods": [
                { "name": "serialize", "params": 1, "template_params": [
                    { "type": { "name": "S" } },
                    { "type": { "name": "enabled_", "has_default": true } },
                ]},
            ],
        }));
        assert!(matches!(rd.find_serialize(), SerializeLookup::Ambiguous(_)));
    }

    #[test]
    fn non_template_serialize_is_not_a_candidate() {
        let rd = record(serde_json::json!({
            "name": "T",
            "qualified_name": "T",
            "kind": "struct",
            "methods": [ { "name": "serialize", "params": 1 } ],
        }));
        assert!(matches!(rd.find_serialize(), SerializeLookup::NotFound));
    }

    #[test]
    fn decl_file_parses_with_sparse_fields() {
        let file: DeclFile = serde_json::from_value(serde_json::json!({
            "source": "dir.cc",
            "records": [ {
                "name": "Elm", "qualified_name": "Dir::Elm", "kind": "struct",
                "fields": [ { "name": "idx_", "qualified_name": "Dir::Elm::idx_" } ],
            } ],
        }))
        .unwrap();
        assert_eq!(file.records.len(), 1);
        assert_eq!(file.records[0].fields[0].type_name, "");
    }
}
