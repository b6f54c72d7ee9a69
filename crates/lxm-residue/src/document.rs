use std::collections::HashSet;

use crate::extract::{fragments, RESIDUE_CLOSE, RESIDUE_OPEN};

/// The residue of one record: fragments in capture order.
///
/// Fragments are deduplicated by the BLAKE3 digest of their trimmed text.
#[derive(Clone, Debug, Default)]
pub struct ResidueDocument {
    fragments: Vec<String>,
    digests: HashSet<[u8; 32]>,
    dirty: bool,
}

fn digest(fragment: &str) -> [u8; 32] {
    *blake3::hash(fragment.trim().as_bytes()).as_bytes()
}

impl ResidueDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a document from a stored residue property.
    ///
    /// Stored text that does not parse is kept whole as a single fragment.
    pub fn from_stored(stored: &str) -> Self {
        let mut doc = Self::new();
        match fragments(stored) {
            Ok(parts) => {
                for part in parts {
                    doc.append(&part);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored residue is malformed; keeping it verbatim");
                let inner = stored.trim();
                let inner = inner.strip_prefix(RESIDUE_OPEN).unwrap_or(inner);
                let inner = inner.strip_suffix(RESIDUE_CLOSE).unwrap_or(inner);
                doc.append(inner);
            }
        }
        doc.dirty = false;
        doc
    }

    /// Append a fragment unless it is blank or already present.
    pub fn append(&mut self, fragment: &str) -> bool {
        if fragment.trim().is_empty() || !self.digests.insert(digest(fragment)) {
            return false;
        }
        self.fragments.push(fragment.trim().to_string());
        self.dirty = true;
        true
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.digests.contains(&digest(fragment))
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// The stored form.
    pub fn render(&self) -> String {
        let mut out = String::from(RESIDUE_OPEN);
        for fragment in &self.fragments {
            out.push_str(fragment);
        }
        out.push_str(RESIDUE_CLOSE);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_and_blanks_ignored() {
        let mut doc = ResidueDocument::new();
        assert!(doc.append("<a/>"));
        assert!(!doc.append("  <a/>\n"));
        assert!(!doc.append("   "));
        assert_eq!(doc.fragments().len(), 1);
        assert!(doc.is_dirty());
    }

    #[test]
    fn stored_form_round_trips() {
        let mut doc = ResidueDocument::new();
        doc.append("<a x=\"1\">t</a>");
        doc.append("<b/>");
        let restored = ResidueDocument::from_stored(&doc.render());
        assert_eq!(restored.fragments(), doc.fragments());
        assert!(!restored.is_dirty());
    }

    #[test]
    fn malformed_stored_text_kept_verbatim() {
        let doc = ResidueDocument::from_stored("<lift-residue><a></lift-residue>");
        assert_eq!(doc.fragments(), ["<a>"]);
    }
}
