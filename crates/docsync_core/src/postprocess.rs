//! Document post-processing hooks run before a buffered flush.

use docsync_store::Document;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Taxon ids kept by [`HomologeneTrim::default`]: human, mouse, rat, fruit
/// fly, nematode, zebrafish, thale cress, frog and pig.
pub const DEFAULT_SPECIES: [i64; 9] = [9606, 10090, 10116, 7227, 6239, 7955, 3702, 8364, 9823];

/// A transformation applied to every buffered document before upload.
///
/// Processors must be idempotent: a document that went through `process`
/// once must come out unchanged from a second pass.
pub trait DocPostProcessor: Send + Sync + fmt::Debug {
    /// Returns a short name for logs.
    fn name(&self) -> &str;

    /// Transforms one document in place, returning true if it changed.
    fn process(&self, doc: &mut Document) -> bool;
}

/// Prunes foreign-species entries from `homologene.genes`.
///
/// Each entry of `homologene.genes` is a `[taxid, gene_id]` pair. Entries
/// whose first element is not an allowed taxid are removed; documents
/// without the field are left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomologeneTrim {
    species: BTreeSet<i64>,
}

impl HomologeneTrim {
    /// Keeps only entries for the given taxids.
    pub fn new(species: impl IntoIterator<Item = i64>) -> Self {
        Self {
            species: species.into_iter().collect(),
        }
    }

    /// Returns the allowed taxids.
    pub fn species(&self) -> &BTreeSet<i64> {
        &self.species
    }

    fn keep(&self, entry: &Value) -> bool {
        entry
            .as_array()
            .and_then(|pair| pair.first())
            .and_then(taxid)
            .is_some_and(|taxid| self.species.contains(&taxid))
    }
}

/// Reads a taxid, accepting integral floats such as `9606.0`.
fn taxid(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
            .map(|f| f as i64)
    })
}

impl Default for HomologeneTrim {
    fn default() -> Self {
        Self::new(DEFAULT_SPECIES)
    }
}

impl DocPostProcessor for HomologeneTrim {
    fn name(&self) -> &str {
        "homologene_trim"
    }

    fn process(&self, doc: &mut Document) -> bool {
        let Some(genes) = doc
            .get_mut("homologene")
            .and_then(|h| h.get_mut("genes"))
            .and_then(Value::as_array_mut)
        else {
            return false;
        };
        let before = genes.len();
        genes.retain(|entry| self.keep(entry));
        genes.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gene() -> Document {
        Document::from_value(json!({
            "_id": "1017",
            "homologene": {
                "id": 74409,
                "genes": [[9606, 1017], [10090, 12566], [9913, 281669], [8364, 395066], "junk"]
            }
        }))
        .unwrap()
    }

    #[test]
    fn keeps_allowed_species_only() {
        let mut doc = gene();
        assert!(HomologeneTrim::default().process(&mut doc));
        assert_eq!(
            doc.get("homologene").unwrap()["genes"],
            json!([[9606, 1017], [10090, 12566], [8364, 395066]])
        );
        assert_eq!(doc.get("homologene").unwrap()["id"], json!(74409));
    }

    #[test]
    fn trim_is_idempotent() {
        let trim = HomologeneTrim::default();
        let mut once = gene();
        trim.process(&mut once);
        let mut twice = once.clone();
        assert!(!trim.process(&mut twice));
        assert_eq!(once, twice);
    }

    #[test]
    fn documents_without_homologene_untouched() {
        let mut doc = Document::from_value(json!({"_id": "x", "homologene": {"id": 1}})).unwrap();
        let before = doc.clone();
        assert!(!HomologeneTrim::default().process(&mut doc));
        assert_eq!(doc, before);
    }

    #[test]
    fn integral_float_taxids_match() {
        let mut doc = Document::from_value(json!({
            "_id": "1017",
            "homologene": {"genes": [[9606.0, 1017], [9913.0, 1], [9606.5, 2]]}
        }))
        .unwrap();
        assert!(HomologeneTrim::default().process(&mut doc));
        assert_eq!(doc.get("homologene").unwrap()["genes"], json!([[9606.0, 1017]]));
    }

    #[test]
    fn custom_species_set() {
        let mut doc = gene();
        HomologeneTrim::new([9913]).process(&mut doc);
        assert_eq!(doc.get("homologene").unwrap()["genes"], json!([[9913, 281669]]));
        assert_eq!(HomologeneTrim::default().species().len(), 9);
    }
}
