// Strongly-typed analyzer output shared with the generators. No decl model here.

/// One field still needing a coverage check: the unqualified spelling usable
/// inside the class body, and the qualified spelling used in check labels.
///
/// Scoped to a single analysis of a single record; never outlives it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Member {
    pub unqualified: String,
    pub qualified: String,
}

/// Members in field declaration order. Empty means "nothing to do", not an
/// error.
pub type MemberList = Vec<Member>;
