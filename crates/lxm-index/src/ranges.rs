//! Seeding lookup tables from the controlled-vocabulary document.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use lxm_store::{
    FeatureDefn, MappingKind, RecordVariant, RefType, Repository, RepositoryExt, VocabularyItem,
    WsDescription,
};
use lxm_types::{Guid, MultiText, RecordId};

use crate::error::IndexResult;
use crate::lookup::{LookupIndex, VocabularyKind};

/// Range holding lexical relation types.
pub const RELATION_RANGE: &str = "lexical-relation";
/// Range holding inflection feature definitions.
pub const FEATURE_RANGE: &str = "feature-definition";

/// One controlled vocabulary of the ranges document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Range {
    pub id: String,
    pub guid: Option<String>,
    pub elements: Vec<RangeElement>,
}

/// One item of a range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeElement {
    pub id: String,
    pub guid: Option<String>,
    pub parent: Option<String>,
    pub label: MultiText,
    pub abbreviation: MultiText,
    pub description: MultiText,
    pub reverse_label: MultiText,
    pub reverse_abbreviation: MultiText,
    /// Free-form `(name, value)` payload.
    pub traits: Vec<(String, String)>,
}

impl RangeElement {
    pub fn trait_value(&self, name: &str) -> Option<&str> {
        self.traits
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn trait_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.traits
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Labels to match against existing items: label, abbreviation, then id.
    fn match_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.label.iter().map(|(_, v)| v).collect();
        keys.extend(self.abbreviation.iter().map(|(_, v)| v));
        if !self.id.trim().is_empty() {
            keys.push(self.id.as_str());
        }
        keys
    }

    /// The display label, falling back to the element id.
    fn label_or_id(&self, ws: &str) -> MultiText {
        if self.label.is_empty() {
            MultiText::single(ws, self.id.trim())
        } else {
            self.label.clone()
        }
    }
}

/// What seeding did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub created: usize,
    pub updated: usize,
    pub writing_systems_created: usize,
}

/// Fill only the empty alternatives of `target`. Returns whether it changed.
fn fill_missing(target: &mut MultiText, incoming: &MultiText) -> bool {
    let mut changed = false;
    for (ws, value) in incoming.iter() {
        if target.get(ws).map_or(true, str::is_empty) {
            target.set(ws, value);
            changed = true;
        }
    }
    changed
}

struct Seeder<'a> {
    repo: &'a mut dyn Repository,
    index: &'a mut LookupIndex,
    descriptions: &'a BTreeMap<String, WsDescription>,
    outcome: SeedOutcome,
}

impl Seeder<'_> {
    fn register_writing_systems(&mut self, texts: &[&MultiText]) {
        for text in texts {
            for ws in text.writing_systems() {
                let (_, created) = self
                    .repo
                    .writing_systems_mut()
                    .find_or_create(ws, self.descriptions.get(ws));
                if created {
                    self.outcome.writing_systems_created += 1;
                }
            }
        }
    }

    /// Guid of `element` when it names a record that is absent or of kind `T`.
    fn claimable_guid<T: RecordVariant>(
        &self,
        element: &RangeElement,
    ) -> (Guid, Option<RecordId>) {
        let (guid, _) = Guid::resolve(element.guid.as_deref(), None);
        match self.repo.find_by_guid(&guid) {
            Some(id) if self.repo.typed::<T>(id).is_ok() => (guid, Some(id)),
            Some(_) => (Guid::new_random(), None),
            None => (guid, None),
        }
    }

    fn seed_relation_type(&mut self, element: &RangeElement) -> IndexResult<RecordId> {
        self.register_writing_systems(&[
            &element.label,
            &element.abbreviation,
            &element.reverse_label,
        ]);
        let (guid, by_guid) = self.claimable_guid::<RefType>(element);
        let existing = by_guid.or_else(|| {
            element
                .match_keys()
                .into_iter()
                .find_map(|key| self.index.ref_type(key))
        });

        let id = match existing {
            Some(id) => {
                let ref_type = self.repo.typed_mut::<RefType>(id)?;
                let mut changed = fill_missing(&mut ref_type.name, &element.label);
                changed |= fill_missing(&mut ref_type.reverse_name, &element.reverse_label);
                changed |= fill_missing(&mut ref_type.abbreviation, &element.abbreviation);
                if changed {
                    self.outcome.updated += 1;
                }
                id
            }
            None => {
                let kind = element
                    .trait_value("reference-type")
                    .or_else(|| element.trait_value("mapping-kind"))
                    .and_then(MappingKind::parse)
                    .unwrap_or_default();
                let id = self.repo.insert(RefType {
                    guid,
                    name: element.label_or_id("en"),
                    reverse_name: element.reverse_label.clone(),
                    abbreviation: element.abbreviation.clone(),
                    kind,
                    ..Default::default()
                })?;
                self.outcome.created += 1;
                tracing::debug!(
                    relation = %element.id,
                    kind = kind.as_str(),
                    "seeded relation type"
                );
                id
            }
        };
        let ref_type = self.repo.typed::<RefType>(id)?.clone();
        self.index.register_ref_type(id, &ref_type);
        Ok(id)
    }

    fn seed_feature(&mut self, element: &RangeElement) -> IndexResult<RecordId> {
        self.register_writing_systems(&[&element.label, &element.abbreviation]);
        let (guid, by_guid) = self.claimable_guid::<FeatureDefn>(element);
        let existing = by_guid.or_else(|| {
            element
                .match_keys()
                .into_iter()
                .find_map(|key| self.index.feature(key))
        });
        let values: Vec<String> = element.trait_values("value").map(str::to_string).collect();

        let id = match existing {
            Some(id) => {
                let feature = self.repo.typed_mut::<FeatureDefn>(id)?;
                let mut changed = fill_missing(&mut feature.name, &element.label);
                changed |= fill_missing(&mut feature.abbreviation, &element.abbreviation);
                for value in &values {
                    if !feature.values.contains(value) {
                        feature.values.push(value.clone());
                        changed = true;
                    }
                }
                if changed {
                    self.outcome.updated += 1;
                }
                id
            }
            None => {
                let id = self.repo.insert(FeatureDefn {
                    guid,
                    name: element.label_or_id("en"),
                    abbreviation: element.abbreviation.clone(),
                    values,
                })?;
                self.outcome.created += 1;
                id
            }
        };
        for key in element.match_keys() {
            self.index.register_feature(id, key);
        }
        Ok(id)
    }

    fn seed_item(
        &mut self,
        kind: &VocabularyKind,
        element: &RangeElement,
    ) -> IndexResult<RecordId> {
        self.register_writing_systems(&[
            &element.label,
            &element.abbreviation,
            &element.description,
        ]);
        let (guid, by_guid) = self.claimable_guid::<VocabularyItem>(element);
        let existing = by_guid.or_else(|| {
            element
                .match_keys()
                .into_iter()
                .find_map(|key| self.index.find(kind, key))
        });

        let id = match existing {
            Some(id) => {
                let item = self.repo.typed_mut::<VocabularyItem>(id)?;
                let mut changed = fill_missing(&mut item.name, &element.label);
                changed |= fill_missing(&mut item.abbreviation, &element.abbreviation);
                changed |= fill_missing(&mut item.description, &element.description);
                if changed {
                    self.outcome.updated += 1;
                }
                id
            }
            None => {
                let id = self.repo.insert(VocabularyItem {
                    guid,
                    vocabulary: kind.name().to_string(),
                    name: element.label_or_id("en"),
                    abbreviation: element.abbreviation.clone(),
                    description: element.description.clone(),
                    ..Default::default()
                })?;
                self.outcome.created += 1;
                id
            }
        };
        for key in element.match_keys() {
            self.index.register_label(kind, key, id);
        }
        Ok(id)
    }
}

/// Seed `index` and the repository from parsed ranges.
///
/// Elements are matched to existing records by guid, then by label; a match
/// only gets its empty alternatives filled. Unmatched elements are created.
/// Parent links are resolved after every element of a range is known.
pub fn seed_ranges(
    repo: &mut dyn Repository,
    index: &mut LookupIndex,
    ranges: &[Range],
    descriptions: &BTreeMap<String, WsDescription>,
) -> IndexResult<SeedOutcome> {
    let mut seeder = Seeder {
        repo,
        index,
        descriptions,
        outcome: SeedOutcome::default(),
    };

    for range in ranges {
        let range_kind = VocabularyKind::from_range_name(&range.id);
        let mut by_element: HashMap<&str, RecordId> = HashMap::new();

        for element in &range.elements {
            let id = match range.id.as_str() {
                RELATION_RANGE => seeder.seed_relation_type(element)?,
                FEATURE_RANGE => seeder.seed_feature(element)?,
                _ => {
                    let kind = element
                        .trait_value("custom-list")
                        .map(|name| VocabularyKind::Custom(name.to_string()))
                        .unwrap_or_else(|| range_kind.clone());
                    seeder.seed_item(&kind, element)?
                }
            };
            by_element.insert(element.id.as_str(), id);
        }

        if matches!(range.id.as_str(), RELATION_RANGE | FEATURE_RANGE) {
            continue;
        }
        for element in &range.elements {
            let Some(parent_key) = element.parent.as_deref() else {
                continue;
            };
            let (Some(child), Some(parent)) = (
                by_element.get(element.id.as_str()).copied(),
                by_element.get(parent_key).copied(),
            ) else {
                tracing::warn!(
                    range = %range.id,
                    element = %element.id,
                    parent = parent_key,
                    "unknown range parent"
                );
                continue;
            };
            let item = seeder.repo.typed_mut::<VocabularyItem>(child)?;
            if item.parent.is_none() && child != parent {
                item.parent = Some(parent);
            }
        }
    }

    tracing::info!(
        created = seeder.outcome.created,
        updated = seeder.outcome.updated,
        writing_systems = seeder.outcome.writing_systems_created,
        "seeded ranges"
    );
    Ok(seeder.outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, label: &str) -> RangeElement {
        RangeElement {
            id: id.into(),
            label: MultiText::single("en", label),
            ..Default::default()
        }
    }

    fn seed(repo: &mut dyn Repository, index: &mut LookupIndex, ranges: &[Range]) -> SeedOutcome {
        seed_ranges(repo, index, ranges, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn creates_items_and_resolves_parents() {
        let mut repo = lxm_store::InMemoryRepository::new();
        let mut index = LookupIndex::new();
        let mut verb = element("v", "Verb");
        verb.abbreviation = MultiText::single("en", "v");
        let mut transitive = element("vt", "Transitive verb");
        transitive.parent = Some("v".into());
        let ranges = [Range {
            id: "grammatical-info".into(),
            elements: vec![verb, transitive],
            ..Default::default()
        }];

        let outcome = seed(&mut repo, &mut index, &ranges);
        assert_eq!(outcome.created, 2);
        assert_eq!(outcome.writing_systems_created, 1);

        let v = index.find(&VocabularyKind::PartOfSpeech, "verb").unwrap();
        let vt = index.find(&VocabularyKind::PartOfSpeech, "vt").unwrap();
        assert_eq!(repo.typed::<VocabularyItem>(vt).unwrap().parent, Some(v));
    }

    #[test]
    fn existing_item_only_gains_missing_alternatives() {
        let mut repo = lxm_store::InMemoryRepository::new();
        let noun = repo
            .insert(VocabularyItem {
                guid: Guid::new_random(),
                vocabulary: "grammatical-info".into(),
                name: MultiText::single("en", "Noun"),
                ..Default::default()
            })
            .unwrap();
        let mut index = LookupIndex::build(&repo);
        let mut incoming = element("n", "Substantive");
        incoming.label.set("fr", "Nom");
        incoming.abbreviation = MultiText::single("en", "n");
        // Matched through its id since the English label differs.
        incoming.id = "Noun".into();
        let ranges = [Range {
            id: "grammatical-info".into(),
            elements: vec![incoming],
            ..Default::default()
        }];

        let outcome = seed(&mut repo, &mut index, &ranges);
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.updated, 1);
        let item = repo.typed::<VocabularyItem>(noun).unwrap();
        assert_eq!(item.name.get("en"), Some("Noun"));
        assert_eq!(item.name.get("fr"), Some("Nom"));
        assert_eq!(item.abbreviation.get("en"), Some("n"));
    }

    #[test]
    fn relation_types_take_mapping_kind_from_traits() {
        let mut repo = lxm_store::InMemoryRepository::new();
        let mut index = LookupIndex::new();
        let mut part = element("Part", "Part");
        part.reverse_label = MultiText::single("en", "Whole");
        part.traits.push(("reference-type".into(), "tree".into()));
        let synonym = element("Synonyms", "Synonyms");
        let ranges = [Range {
            id: RELATION_RANGE.into(),
            elements: vec![part, synonym],
            ..Default::default()
        }];

        seed(&mut repo, &mut index, &ranges);
        let part = index.ref_type("whole").unwrap();
        assert_eq!(repo.typed::<RefType>(part).unwrap().kind, MappingKind::Tree);
        let synonym = index.ref_type("synonyms").unwrap();
        assert_eq!(
            repo.typed::<RefType>(synonym).unwrap().kind,
            MappingKind::Collection
        );
    }

    #[test]
    fn feature_definitions_and_custom_lists() {
        let mut repo = lxm_store::InMemoryRepository::new();
        let mut index = LookupIndex::new();
        let mut gender = element("gen", "Gender");
        gender.traits.push(("value".into(), "masc".into()));
        gender.traits.push(("value".into(), "fem".into()));
        let mut flag = element("checked", "Checked");
        flag.traits.push(("custom-list".into(), "Review".into()));
        let ranges = [
            Range {
                id: FEATURE_RANGE.into(),
                elements: vec![gender],
                ..Default::default()
            },
            Range {
                id: "status".into(),
                elements: vec![flag],
                ..Default::default()
            },
        ];

        seed(&mut repo, &mut index, &ranges);
        let gen = index.feature("gen").unwrap();
        assert_eq!(repo.typed::<FeatureDefn>(gen).unwrap().values, vec!["masc", "fem"]);
        assert!(index.find(&VocabularyKind::Status, "checked").is_none());
        assert!(index
            .find(&VocabularyKind::Custom("Review".into()), "Checked")
            .is_some());
    }

    #[test]
    fn reseeding_is_stable() {
        let mut repo = lxm_store::InMemoryRepository::new();
        let mut index = LookupIndex::new();
        let ranges = [Range {
            id: "usage-type".into(),
            elements: vec![element("old", "Archaic")],
            ..Default::default()
        }];
        seed(&mut repo, &mut index, &ranges);
        let outcome = seed(&mut repo, &mut index, &ranges);
        assert_eq!(outcome, SeedOutcome::default());
        assert_eq!(repo.len(), 1);
    }
}
