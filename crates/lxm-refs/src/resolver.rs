use std::collections::{HashMap, HashSet};

use lxm_index::{IdentityIndex, LookupIndex};
use lxm_residue::{relation_with_traits, ResidueStore};
use lxm_store::{LexReference, MappingKind, RefType, Repository, RepositoryExt};
use lxm_types::{
    normalize, CombinedCollection, Guid, InvalidRelation, MergeStyle, MultiText, ProgressSink,
    RecordId, RunSummary,
};

use crate::error::ResolveResult;
use crate::group::contiguous_groups;
use crate::pending::PendingQueues;

/// What the resolution pass did.
#[derive(Clone, Debug, Default)]
pub struct ResolveOutcome {
    /// Reference records (lexical references and entry references) the pass
    /// created, reused or rewrote.
    pub touched: HashSet<RecordId>,
    pub created: usize,
    pub groups: usize,
}

/// One relation group ready for resolution.
#[derive(Clone, Debug)]
struct Group {
    type_id: RecordId,
    relation_type: String,
    source: RecordId,
    /// Resolved targets, ordered by ordering hint.
    targets: Vec<RecordId>,
    /// The source is the head or first member.
    forward: bool,
    /// Trait markup of the member relations, by target.
    metadata: Vec<(RecordId, String)>,
}

/// Resolves the pending queues of one run.
pub struct Resolver<'a> {
    pub(crate) repo: &'a mut dyn Repository,
    pub(crate) lookup: &'a mut LookupIndex,
    pub(crate) identities: &'a IdentityIndex,
    pub(crate) residue: &'a mut ResidueStore,
    pub(crate) summary: &'a mut RunSummary,
    pub(crate) style: MergeStyle,
    pub(crate) outcome: ResolveOutcome,
}

fn names_match(text: &MultiText, name: &str) -> bool {
    let wanted = normalize(name.trim()).to_lowercase();
    text.iter()
        .any(|(_, value)| normalize(value.trim()).to_lowercase() == wanted)
}

fn same_members(a: &[RecordId], b: &[RecordId]) -> bool {
    let a: HashSet<_> = a.iter().collect();
    let b: HashSet<_> = b.iter().collect();
    a == b
}

impl<'a> Resolver<'a> {
    pub fn new(
        repo: &'a mut dyn Repository,
        lookup: &'a mut LookupIndex,
        identities: &'a IdentityIndex,
        residue: &'a mut ResidueStore,
        summary: &'a mut RunSummary,
        style: MergeStyle,
    ) -> Self {
        Self {
            repo,
            lookup,
            identities,
            residue,
            summary,
            style,
            outcome: ResolveOutcome::default(),
        }
    }

    /// Resolve every pending relation and entry reference.
    ///
    /// Each group is resolved completely before the next one starts; progress
    /// is reported per group.
    pub fn resolve(
        mut self,
        queues: &mut PendingQueues,
        progress: &mut dyn ProgressSink,
    ) -> ResolveResult<ResolveOutcome> {
        progress.phase("relations", queues.len());
        let (groups, landed) = self.prepare_relations(queues)?;
        let mut done = 0;

        let mut collections: Vec<&Group> = Vec::new();
        let mut tree_heads: Vec<&Group> = Vec::new();
        let mut tree_children: Vec<&Group> = Vec::new();
        for group in &groups {
            let kind = self.repo.typed::<RefType>(group.type_id)?.kind;
            match kind {
                MappingKind::Pair | MappingKind::AsymmetricPair => {
                    self.resolve_pair(group, kind)?;
                    done += group.targets.len();
                    progress.advance(done);
                }
                MappingKind::Sequence => {
                    self.resolve_sequence(group)?;
                    done += group.targets.len();
                    progress.advance(done);
                }
                MappingKind::Collection => collections.push(group),
                MappingKind::Tree if group.forward => tree_heads.push(group),
                MappingKind::Tree => tree_children.push(group),
            }
        }

        done += self.resolve_collections(&collections)?;
        progress.advance(done);
        done += self.resolve_trees(&tree_heads, &tree_children)?;
        progress.advance(done);

        for index in landed {
            queues.relations[index].resolved = true;
        }
        self.outcome.groups += groups.len();

        self.resolve_entry_refs(queues)?;
        progress.advance(queues.len());

        tracing::info!(
            groups = self.outcome.groups,
            created = self.outcome.created,
            touched = self.outcome.touched.len(),
            "resolved cross references"
        );
        Ok(self.outcome)
    }

    /// Resolve target identifiers and turn the queue into groups.
    ///
    /// Relations whose target cannot be found are reported and preserved as
    /// residue on their source. Also returns the queue positions of the
    /// relations that made it into a group.
    fn prepare_relations(
        &mut self,
        queues: &mut PendingQueues,
    ) -> ResolveResult<(Vec<Group>, Vec<usize>)> {
        for relation in &mut queues.relations {
            if relation.target_id.is_none() {
                relation.target_id = self.identities.resolve_in(&*self.repo, &relation.target);
            }
            if let Some(target) = relation.target_id {
                if !self.repo.exists(target) {
                    relation.target_id = None;
                }
            }
        }

        let mut groups = Vec::new();
        let mut resolved = Vec::new();
        for range in contiguous_groups(&queues.relations) {
            let mut indices: Vec<usize> = range.collect();
            indices.sort_by_key(|&i| queues.relations[i].order.unwrap_or(i32::MAX));

            let first = &queues.relations[indices[0]];
            let mut targets = Vec::new();
            let mut metadata = Vec::new();
            let mut landed = Vec::new();
            for &index in &indices {
                let relation = &queues.relations[index];
                let reason = match relation.target_id {
                    None => Some("target not found"),
                    Some(t) if t == relation.source => Some("relation to itself"),
                    Some(_) => None,
                };
                if let Some(reason) = reason {
                    let raw = relation.residue.clone().unwrap_or_else(|| {
                        relation_with_traits(
                            &relation.relation_type,
                            &relation.target,
                            relation.order,
                            &relation.metadata,
                        )
                    });
                    self.invalid_relation(
                        relation.source,
                        &relation.relation_type,
                        &relation.target,
                        relation.order,
                        Some(&raw),
                        reason,
                    );
                    continue;
                }
                if let Some(t) = relation.target_id {
                    if !targets.contains(&t) {
                        targets.push(t);
                    }
                    metadata.extend(relation.metadata.iter().map(|m| (t, m.clone())));
                    landed.push(index);
                }
            }
            if targets.is_empty() || !self.repo.exists(first.source) {
                continue;
            }

            let type_id = self.lookup.find_or_create_ref_type(
                &mut *self.repo,
                &first.relation_type,
                &mut *self.summary,
            )?;
            let ref_type = self.repo.typed::<RefType>(type_id)?;
            let forward = names_match(&ref_type.name, &first.relation_type)
                || !names_match(&ref_type.reverse_name, &first.relation_type);
            groups.push(Group {
                type_id,
                relation_type: first.relation_type.clone(),
                source: first.source,
                targets,
                forward,
                metadata,
            });
            resolved.extend(landed);
        }
        Ok((groups, resolved))
    }

    pub(crate) fn invalid_relation(
        &mut self,
        source: RecordId,
        relation_type: &str,
        target: &str,
        order: Option<i32>,
        raw: Option<&str>,
        reason: &str,
    ) {
        tracing::warn!(source = %source, relation_type, target, reason, "invalid relation");
        self.summary.invalid_relations.push(InvalidRelation {
            source,
            relation_type: relation_type.to_string(),
            target: target.to_string(),
            reason: reason.to_string(),
        });
        let fragment = raw
            .map(str::to_string)
            .unwrap_or_else(|| relation_with_traits(relation_type, target, order, &[]));
        self.residue.capture(source, fragment);
    }

    /// Keep the trait markup of `group` on `reference`. With `target`, only
    /// the relation pointing there contributes.
    fn keep_metadata(&mut self, reference: RecordId, group: &Group, target: Option<RecordId>) {
        for (to, fragment) in &group.metadata {
            if target.map_or(true, |t| t == *to) {
                self.residue.capture(reference, fragment);
            }
        }
    }

    fn references_of(&self, type_id: RecordId) -> ResolveResult<Vec<(RecordId, Vec<RecordId>)>> {
        let ref_type = self.repo.typed::<RefType>(type_id)?;
        Ok(ref_type
            .references
            .iter()
            .filter_map(|id| {
                self.repo
                    .typed::<LexReference>(*id)
                    .ok()
                    .map(|r| (*id, r.targets.clone()))
            })
            .collect())
    }

    fn create_reference(
        &mut self,
        type_id: RecordId,
        targets: Vec<RecordId>,
    ) -> ResolveResult<RecordId> {
        let id = self.repo.insert(LexReference {
            guid: Guid::new_random(),
            owner: Some(type_id),
            targets,
            ..Default::default()
        })?;
        self.repo.typed_mut::<RefType>(type_id)?.references.push(id);
        self.outcome.touched.insert(id);
        self.outcome.created += 1;
        self.summary.counts.references_created += 1;
        Ok(id)
    }

    fn set_targets(&mut self, reference: RecordId, targets: Vec<RecordId>) -> ResolveResult<()> {
        self.repo.typed_mut::<LexReference>(reference)?.targets = targets;
        self.outcome.touched.insert(reference);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pairs
    // -----------------------------------------------------------------------

    fn resolve_pair(&mut self, group: &Group, kind: MappingKind) -> ResolveResult<()> {
        for target in &group.targets {
            let members = if group.forward {
                vec![group.source, *target]
            } else {
                vec![*target, group.source]
            };
            let existing = self
                .references_of(group.type_id)?
                .into_iter()
                .find(|(_, targets)| match kind {
                    MappingKind::AsymmetricPair => *targets == members,
                    _ => same_members(targets, &members),
                });
            let id = match existing {
                Some((id, _)) => {
                    self.outcome.touched.insert(id);
                    id
                }
                None => self.create_reference(group.type_id, members)?,
            };
            self.keep_metadata(id, group, Some(*target));
        }
        tracing::debug!(
            relation = %group.relation_type,
            source = %group.source,
            "resolved pair group"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sequences
    // -----------------------------------------------------------------------

    fn resolve_sequence(&mut self, group: &Group) -> ResolveResult<()> {
        let mut members = group.targets.clone();
        if !members.contains(&group.source) {
            members.insert(0, group.source);
        }
        let references = self.references_of(group.type_id)?;
        let exact = references
            .iter()
            .find(|(_, targets)| *targets == members)
            .map(|(id, _)| *id);
        let candidate = references
            .iter()
            .find(|(_, targets)| targets.contains(&group.source))
            .map(|(id, _)| *id);
        let id = match (exact, candidate) {
            (Some(id), _) => {
                self.outcome.touched.insert(id);
                id
            }
            (None, Some(id)) => {
                tracing::debug!(reference = %id, "replacing sequence members");
                self.set_targets(id, members)?;
                id
            }
            (None, None) => self.create_reference(group.type_id, members)?,
        };
        self.keep_metadata(id, group, None);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    /// Union groups sharing a member, per relation type, then resolve each
    /// union against existing references. Returns the pending count handled.
    fn resolve_collections(&mut self, groups: &[&Group]) -> ResolveResult<usize> {
        let mut by_type: Vec<(RecordId, String, Vec<Vec<RecordId>>)> = Vec::new();
        let mut handled = 0;
        for group in groups {
            handled += group.targets.len();
            let mut members = vec![group.source];
            members.extend(group.targets.iter().copied().filter(|t| *t != group.source));
            match by_type.iter_mut().find(|(id, _, _)| *id == group.type_id) {
                Some((_, _, lists)) => lists.push(members),
                None => by_type.push((group.type_id, group.relation_type.clone(), vec![members])),
            }
        }

        for (type_id, relation_type, lists) in by_type {
            for component in union_components(&lists) {
                let id = self.resolve_collection(type_id, &relation_type, &component)?;
                for group in groups
                    .iter()
                    .filter(|g| g.type_id == type_id && component.contains(&g.source))
                {
                    self.keep_metadata(id, group, None);
                }
            }
        }
        Ok(handled)
    }

    /// Make `members` one collection of `type_id`.
    ///
    /// Every existing collection sharing a member is folded into one
    /// reference: an exact match is kept as it is, otherwise the first overlap
    /// takes the union and the others are deleted. Members that fall out are
    /// reported.
    fn resolve_collection(
        &mut self,
        type_id: RecordId,
        relation_type: &str,
        members: &[RecordId],
    ) -> ResolveResult<RecordId> {
        let mut overlapping: Vec<_> = self
            .references_of(type_id)?
            .into_iter()
            .filter(|(_, targets)| targets.iter().any(|t| members.contains(t)))
            .collect();
        if overlapping.is_empty() {
            return self.create_reference(type_id, members.to_vec());
        }
        if let Some(exact) = overlapping
            .iter()
            .position(|(_, targets)| same_members(targets, members))
        {
            overlapping.swap(0, exact);
        }

        let (id, existing) = overlapping.remove(0);
        let mut dropped: Vec<RecordId> = Vec::new();
        for targets in std::iter::once(&existing).chain(overlapping.iter().map(|(_, t)| t)) {
            for t in targets {
                if !members.contains(t) && !dropped.contains(t) {
                    dropped.push(*t);
                }
            }
        }

        let mut targets: Vec<RecordId> = existing
            .iter()
            .copied()
            .filter(|t| members.contains(t))
            .collect();
        targets.extend(members.iter().copied().filter(|m| !existing.contains(m)));
        if targets == existing {
            self.outcome.touched.insert(id);
        } else {
            self.set_targets(id, targets)?;
        }

        for (other, _) in &overlapping {
            if self.repo.delete(*other)? {
                self.outcome.touched.remove(other);
                self.summary.counts.references_deleted += 1;
                tracing::debug!(reference = %other, into = %id, "folded collection");
            }
        }

        if !dropped.is_empty() || !overlapping.is_empty() {
            tracing::warn!(
                reference = %id,
                relation_type,
                dropped = dropped.len(),
                folded = overlapping.len(),
                "collections combined"
            );
            self.summary.combined_collections.push(CombinedCollection {
                relation_type: relation_type.to_string(),
                reference: id,
                dropped,
            });
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Trees
    // -----------------------------------------------------------------------

    fn tree_with_head(
        &self,
        type_id: RecordId,
        head: RecordId,
    ) -> ResolveResult<Option<(RecordId, Vec<RecordId>)>> {
        Ok(self
            .references_of(type_id)?
            .into_iter()
            .find(|(_, targets)| targets.first() == Some(&head)))
    }

    fn add_child(
        &mut self,
        reference: RecordId,
        mut targets: Vec<RecordId>,
        child: RecordId,
    ) -> ResolveResult<()> {
        if !targets.contains(&child) {
            targets.push(child);
        }
        self.set_targets(reference, targets)
    }

    /// Heads first, then children. A child whose head has no tree yet is
    /// re-queued once after every child group has been seen.
    fn resolve_trees(&mut self, heads: &[&Group], children: &[&Group]) -> ResolveResult<usize> {
        let mut handled = 0;
        for group in heads {
            handled += group.targets.len();
            let mut members = vec![group.source];
            members.extend(group.targets.iter().copied());
            let id = match self.tree_with_head(group.type_id, group.source)? {
                Some((id, existing)) => {
                    let targets = if self.style.overwrites_existing() {
                        members
                    } else {
                        let mut merged = existing;
                        merged.extend(group.targets.iter().copied());
                        dedup_keep_first(merged)
                    };
                    self.set_targets(id, targets)?;
                    id
                }
                None => self.create_reference(group.type_id, members)?,
            };
            self.keep_metadata(id, group, None);
        }

        let mut requeued: Vec<(&Group, RecordId)> = Vec::new();
        for group in children {
            for head in &group.targets {
                handled += 1;
                match self.tree_with_head(group.type_id, *head)? {
                    Some((id, targets)) => {
                        self.add_child(id, targets, group.source)?;
                        self.keep_metadata(id, group, Some(*head));
                    }
                    None => requeued.push((*group, *head)),
                }
            }
        }
        for (group, head) in requeued {
            let id = match self.tree_with_head(group.type_id, head)? {
                Some((id, targets)) => {
                    self.add_child(id, targets, group.source)?;
                    id
                }
                None => self.create_reference(group.type_id, vec![head, group.source])?,
            };
            self.keep_metadata(id, group, Some(head));
        }
        Ok(handled)
    }
}

fn dedup_keep_first(items: Vec<RecordId>) -> Vec<RecordId> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(*i)).collect()
}

/// Union member lists that share any member; output keeps first-seen order.
fn union_components(lists: &[Vec<RecordId>]) -> Vec<Vec<RecordId>> {
    let mut parent: HashMap<RecordId, RecordId> = HashMap::new();
    let mut order: Vec<RecordId> = Vec::new();

    fn find(parent: &mut HashMap<RecordId, RecordId>, x: RecordId) -> RecordId {
        let mut root = x;
        while let Some(&p) = parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        let mut node = x;
        while node != root {
            let next = parent[&node];
            parent.insert(node, root);
            node = next;
        }
        root
    }

    for list in lists {
        for member in list {
            if !parent.contains_key(member) {
                parent.insert(*member, *member);
                order.push(*member);
            }
        }
        if let Some((first, rest)) = list.split_first() {
            for member in rest {
                let a = find(&mut parent, *first);
                let b = find(&mut parent, *member);
                if a != b {
                    parent.insert(b, a);
                }
            }
        }
    }

    let mut components: Vec<(RecordId, Vec<RecordId>)> = Vec::new();
    for member in order {
        let root = find(&mut parent, member);
        match components.iter_mut().find(|(r, _)| *r == root) {
            Some((_, list)) => list.push(member),
            None => components.push((root, vec![member])),
        }
    }
    components.into_iter().map(|(_, list)| list).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::PendingRelation;
    use lxm_residue::trait_fragment;
    use lxm_store::{InMemoryRepository, LexEntry};
    use lxm_types::NullProgress;

    struct Fixture {
        repo: InMemoryRepository,
        lookup: LookupIndex,
        identities: IdentityIndex,
        residue: ResidueStore,
        summary: RunSummary,
    }

    impl Fixture {
        fn new(relations: &[(&str, &str, MappingKind)]) -> Self {
            let mut repo = InMemoryRepository::new();
            for (name, reverse, kind) in relations {
                repo.insert(RefType {
                    guid: Guid::new_random(),
                    name: MultiText::single("en", *name),
                    reverse_name: MultiText::single("en", *reverse),
                    kind: *kind,
                    ..Default::default()
                })
                .unwrap();
            }
            let lookup = LookupIndex::build(&repo);
            Self {
                repo,
                lookup,
                identities: IdentityIndex::new(),
                residue: ResidueStore::new(),
                summary: RunSummary::new(),
            }
        }

        fn entry(&mut self, identifier: &str) -> RecordId {
            let id = self
                .repo
                .insert(LexEntry {
                    guid: Guid::new_random(),
                    lexeme_form: MultiText::single("seh", identifier),
                    ..Default::default()
                })
                .unwrap();
            self.identities.bind(identifier, id);
            id
        }

        fn resolve(&mut self, queues: &mut PendingQueues, style: MergeStyle) -> ResolveOutcome {
            Resolver::new(
                &mut self.repo,
                &mut self.lookup,
                &self.identities,
                &mut self.residue,
                &mut self.summary,
                style,
            )
            .resolve(queues, &mut NullProgress)
            .unwrap()
        }

        fn reference_ids(&self, name: &str) -> Vec<RecordId> {
            let type_id = self.lookup.ref_type(name).unwrap();
            self.repo.typed::<RefType>(type_id).unwrap().references.clone()
        }

        fn references(&self, name: &str) -> Vec<Vec<RecordId>> {
            self.reference_ids(name)
                .iter()
                .map(|id| self.repo.typed::<LexReference>(*id).unwrap().targets.clone())
                .collect()
        }
    }

    fn queue(relations: Vec<PendingRelation>) -> PendingQueues {
        let mut queues = PendingQueues::new();
        for relation in relations {
            queues.push_relation(relation);
        }
        queues
    }

    fn sorted(mut ids: Vec<RecordId>) -> Vec<RecordId> {
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    #[test]
    fn overlapping_collection_relations_form_one_reference() {
        let mut fx = Fixture::new(&[("Synonyms", "", MappingKind::Collection)]);
        let a = fx.entry("a");
        let b = fx.entry("b");
        let c = fx.entry("c");
        let mut queues = queue(vec![
            PendingRelation::new(a, "Synonyms", "b"),
            PendingRelation::new(b, "Synonyms", "c"),
            PendingRelation::new(a, "Synonyms", "c"),
        ]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);

        let refs = fx.references("Synonyms");
        assert_eq!(refs.len(), 1);
        assert_eq!(sorted(refs[0].clone()), vec![a, b, c]);
        assert!(queues.relations.iter().all(|r| r.resolved));
    }

    #[test]
    fn exact_collection_reused() {
        let mut fx = Fixture::new(&[("Synonyms", "", MappingKind::Collection)]);
        let a = fx.entry("a");
        let b = fx.entry("b");
        let mut queues = queue(vec![PendingRelation::new(a, "Synonyms", "b")]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);
        let mut again = queue(vec![PendingRelation::new(b, "Synonyms", "a")]);
        let outcome = fx.resolve(&mut again, MergeStyle::KeepOld);
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.touched.len(), 1);
        assert_eq!(fx.references("Synonyms").len(), 1);
    }

    #[test]
    fn replaced_collection_members_reported() {
        let mut fx = Fixture::new(&[("Synonyms", "", MappingKind::Collection)]);
        let a = fx.entry("a");
        let b = fx.entry("b");
        let d = fx.entry("d");
        fx.entry("c");
        let mut first = queue(vec![
            PendingRelation::new(a, "Synonyms", "b"),
            PendingRelation::new(a, "Synonyms", "d"),
        ]);
        fx.resolve(&mut first, MergeStyle::KeepOld);

        let mut second = queue(vec![
            PendingRelation::new(a, "Synonyms", "b"),
            PendingRelation::new(a, "Synonyms", "c"),
        ]);
        fx.resolve(&mut second, MergeStyle::KeepOld);
        assert_eq!(fx.references("Synonyms").len(), 1);
        assert_eq!(fx.summary.combined_collections.len(), 1);
        assert_eq!(fx.summary.combined_collections[0].dropped, vec![d]);
    }

    #[test]
    fn relation_joining_two_collections_folds_them() {
        let mut fx = Fixture::new(&[("Synonyms", "", MappingKind::Collection)]);
        let a = fx.entry("a");
        let b = fx.entry("b");
        let c = fx.entry("c");
        let d = fx.entry("d");
        let mut first = queue(vec![
            PendingRelation::new(a, "Synonyms", "b"),
            PendingRelation::new(c, "Synonyms", "d"),
        ]);
        fx.resolve(&mut first, MergeStyle::KeepOld);
        assert_eq!(fx.references("Synonyms").len(), 2);

        let mut joining = queue(vec![PendingRelation::new(a, "Synonyms", "c")]);
        fx.resolve(&mut joining, MergeStyle::KeepNew);

        assert_eq!(fx.references("Synonyms"), vec![vec![a, c]]);
        assert_eq!(fx.repo.count(lxm_store::RecordKind::Reference), 1);
        assert_eq!(fx.summary.counts.references_deleted, 1);
        assert_eq!(fx.summary.combined_collections.len(), 1);
        assert_eq!(fx.summary.combined_collections[0].dropped, vec![b, d]);
    }

    // -----------------------------------------------------------------------
    // Pairs and sequences
    // -----------------------------------------------------------------------

    #[test]
    fn pair_found_or_created() {
        let mut fx = Fixture::new(&[("Antonym", "", MappingKind::Pair)]);
        let a = fx.entry("a");
        let b = fx.entry("b");
        let mut queues = queue(vec![
            PendingRelation::new(a, "Antonym", "b"),
            PendingRelation::new(b, "Antonym", "a"),
        ]);
        let outcome = fx.resolve(&mut queues, MergeStyle::KeepOld);
        assert_eq!(outcome.created, 1);
        assert_eq!(fx.references("Antonym"), vec![vec![a, b]]);
    }

    #[test]
    fn relation_traits_kept_on_reference() {
        let mut fx = Fixture::new(&[("Antonym", "", MappingKind::Pair)]);
        let a = fx.entry("a");
        fx.entry("b");
        let certainty = trait_fragment("x-certainty", "low");
        let mut relation = PendingRelation::new(a, "Antonym", "b");
        relation.metadata.push(certainty.clone());

        fx.resolve(&mut queue(vec![relation.clone()]), MergeStyle::KeepOld);
        fx.resolve(&mut queue(vec![relation]), MergeStyle::KeepOld);

        let ids = fx.reference_ids("Antonym");
        assert_eq!(ids.len(), 1);
        let doc = fx.residue.document(ids[0]).unwrap();
        assert_eq!(doc.fragments(), [certainty]);
        assert!(fx.residue.document(a).is_none());
    }

    #[test]
    fn asymmetric_pair_direction_from_name() {
        let mut fx = Fixture::new(&[("Calque", "Calqued from", MappingKind::AsymmetricPair)]);
        let a = fx.entry("a");
        let b = fx.entry("b");
        let mut queues = queue(vec![
            PendingRelation::new(a, "Calque", "b"),
            PendingRelation::new(b, "Calqued from", "a"),
        ]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);
        assert_eq!(fx.references("Calque"), vec![vec![a, b]]);
    }

    #[test]
    fn sequence_replaced_unless_order_matches() {
        let mut fx = Fixture::new(&[("Calendar", "", MappingKind::Sequence)]);
        let a = fx.entry("a");
        let b = fx.entry("b");
        let c = fx.entry("c");
        let ordered = |source, target: &str, order| {
            let mut r = PendingRelation::new(source, "Calendar", target);
            r.order = Some(order);
            r
        };
        let mut first = queue(vec![ordered(a, "b", 1), ordered(a, "c", 2)]);
        fx.resolve(&mut first, MergeStyle::KeepOld);
        assert_eq!(fx.references("Calendar"), vec![vec![a, b, c]]);

        let mut same = queue(vec![ordered(a, "b", 1), ordered(a, "c", 2)]);
        assert_eq!(fx.resolve(&mut same, MergeStyle::KeepOld).created, 0);

        let mut reordered = queue(vec![ordered(a, "c", 1), ordered(a, "b", 2)]);
        fx.resolve(&mut reordered, MergeStyle::KeepOld);
        assert_eq!(fx.references("Calendar"), vec![vec![a, c, b]]);
    }

    // -----------------------------------------------------------------------
    // Trees
    // -----------------------------------------------------------------------

    #[test]
    fn tree_children_attach_to_head() {
        let mut fx = Fixture::new(&[("Whole", "Part", MappingKind::Tree)]);
        let body = fx.entry("body");
        let arm = fx.entry("arm");
        let leg = fx.entry("leg");
        let head = fx.entry("head");
        let mut queues = queue(vec![
            PendingRelation::new(arm, "Part", "body"),
            PendingRelation::new(body, "Whole", "leg"),
            PendingRelation::new(head, "Part", "body"),
        ]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);
        let refs = fx.references("Whole");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0][0], body);
        assert_eq!(sorted(refs[0][1..].to_vec()), sorted(vec![arm, leg, head]));
    }

    #[test]
    fn tree_children_without_head_requeued_into_one_tree() {
        let mut fx = Fixture::new(&[("Whole", "Part", MappingKind::Tree)]);
        let body = fx.entry("body");
        let arm = fx.entry("arm");
        let leg = fx.entry("leg");
        let mut queues = queue(vec![
            PendingRelation::new(arm, "Part", "body"),
            PendingRelation::new(leg, "Part", "body"),
        ]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);
        assert_eq!(fx.references("Whole"), vec![vec![body, arm, leg]]);
    }

    // -----------------------------------------------------------------------
    // Forward and unresolved references
    // -----------------------------------------------------------------------

    #[test]
    fn forward_reference_resolved_after_binding() {
        let mut fx = Fixture::new(&[("Synonyms", "", MappingKind::Collection)]);
        let a = fx.entry("a");
        let mut queues = queue(vec![PendingRelation::new(a, "Synonyms", "later")]);
        let later = fx.entry("later");
        fx.resolve(&mut queues, MergeStyle::KeepOld);
        assert_eq!(sorted(fx.references("Synonyms")[0].clone()), vec![a, later]);
        assert!(fx.summary.invalid_relations.is_empty());
    }

    #[test]
    fn unresolved_target_reported_and_kept_as_residue() {
        let mut fx = Fixture::new(&[("Synonyms", "", MappingKind::Collection)]);
        let a = fx.entry("a");
        let mut relation = PendingRelation::new(a, "Synonyms", "ghost");
        relation.residue = Some("<relation type=\"Synonyms\" ref=\"ghost\"/>".into());
        let mut queues = queue(vec![relation]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);

        assert_eq!(fx.summary.invalid_relations.len(), 1);
        assert_eq!(fx.summary.invalid_relations[0].target, "ghost");
        let doc = fx.residue.document(a).unwrap();
        assert_eq!(doc.fragments(), ["<relation type=\"Synonyms\" ref=\"ghost\"/>"]);
        assert!(fx.references("Synonyms").is_empty());
    }

    #[test]
    fn only_landed_relations_marked_resolved() {
        let mut fx = Fixture::new(&[("Synonyms", "", MappingKind::Collection)]);
        let a = fx.entry("a");
        fx.entry("b");
        let mut ghost = PendingRelation::new(a, "Synonyms", "ghost");
        ghost.metadata.push(trait_fragment("x-source", "notes"));
        let mut queues = queue(vec![PendingRelation::new(a, "Synonyms", "b"), ghost]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);

        assert_eq!(queues.unresolved(), 1);
        assert!(queues.relations[0].resolved);
        assert!(!queues.relations[1].resolved);
        let expected = relation_with_traits(
            "Synonyms",
            "ghost",
            None,
            &[trait_fragment("x-source", "notes")],
        );
        assert_eq!(fx.residue.document(a).unwrap().fragments(), [expected]);
    }

    #[test]
    fn unknown_relation_type_created() {
        let mut fx = Fixture::new(&[]);
        let a = fx.entry("a");
        fx.entry("b");
        let mut queues = queue(vec![PendingRelation::new(a, "Cognate", "b")]);
        fx.resolve(&mut queues, MergeStyle::KeepOld);
        assert_eq!(fx.references("Cognate").len(), 1);
        assert_eq!(fx.summary.new_vocabulary[0].label, "Cognate");
    }

    #[test]
    fn union_components_merges_transitively() {
        let lists = vec![
            vec![RecordId(1), RecordId(2)],
            vec![RecordId(3), RecordId(4)],
            vec![RecordId(2), RecordId(3)],
            vec![RecordId(7), RecordId(8)],
        ];
        let components = union_components(&lists);
        assert_eq!(components.len(), 2);
        assert_eq!(
            components[0],
            vec![RecordId(1), RecordId(2), RecordId(3), RecordId(4)]
        );
    }
}
