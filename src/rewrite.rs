//! Application of inline edits to source files.
//!
//! The inline generator only decides what to insert and where; this module
//! owns the read/modify/write cycle. One pass per file, insertions applied
//! back to front so earlier offsets stay valid.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use std::path::PathBuf;

use crate::generate::Edit;

/// Apply a batch of insertions and return the modified paths, in first-edit
/// order. Any unreadable file, unwritable file, or out-of-range offset fails
/// the whole batch.
pub fn apply_edits(edits: Vec<Edit>) -> Result<Vec<PathBuf>> {
    let mut by_file: IndexMap<String, Vec<Edit>> = IndexMap::new();
    for e in edits {
        by_file.entry(e.file.clone()).or_default().push(e);
    }

    let mut modified = Vec::new();
    for (file, edits) in by_file {
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {file}"))?;
        let patched = insert_all(&file, text, edits)?;
        std::fs::write(&file, &patched).with_context(|| format!("failed to write {file}"))?;
        modified.push(PathBuf::from(file));
    }
    Ok(modified)
}

fn insert_all(file: &str, mut text: String, mut edits: Vec<Edit>) -> Result<String> {
    edits.sort_by(|a, b| b.offset.cmp(&a.offset));
    for e in &edits {
        if e.offset > text.len() || !text.is_char_boundary(e.offset) {
            bail!("edit offset {} is not a valid position in {file}", e.offset);
        }
        text.insert_str(e.offset, &e.text);
    }
    Ok(text)
}

// --------------------------------- Tests --------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(offset: usize, text: &str) -> Edit {
        Edit { file: "t.h".into(), offset, text: text.into() }
    }

    #[test]
    fn insertions_apply_back_to_front() {
        let src = "void serialize(S& s) {\n}\n".to_string();
        let out = insert_all("t.h", src, vec![edit(23, "  s.check(a, \"T::a\");\n")]).unwrap();
        assert_eq!(out, "void serialize(S& s) {\n  s.check(a, \"T::a\");\n}\n");
    }

    #[test]
    fn multiple_edits_keep_their_anchors() {
        let src = "one{}two{}".to_string();
        let out = insert_all("t.h", src, vec![edit(4, "A"), edit(9, "B")]).unwrap();
        assert_eq!(out, "one{A}two{B}");
    }

    #[test]
    fn out_of_range_offset_fails_the_batch() {
        assert!(insert_all("t.h", "ab".to_string(), vec![edit(9, "X")]).is_err());
    }
}
