//! Morph types and morphosyntactic analyses.

use lxm_index::{parse_feature_structure, VocabularyKind};
use lxm_stage::StagedGrammaticalInfo;
use lxm_store::{AffixKind, Analysis, LexEntry, Msa, RepositoryExt};
use lxm_types::{Guid, MultiText, RecordId};

use crate::context::RunContext;
use crate::error::MergeResult;

/// Morph types of affixes; every other morph type is a stem type.
const AFFIX_TYPES: [&str; 9] = [
    "prefix",
    "suffix",
    "infix",
    "circumfix",
    "simulfix",
    "suprafix",
    "infixing interfix",
    "prefixing interfix",
    "suffixing interfix",
];

/// Morph types recognized without a ranges document.
const STANDARD_TYPES: [&str; 19] = [
    "stem",
    "root",
    "bound stem",
    "bound root",
    "clitic",
    "enclitic",
    "proclitic",
    "particle",
    "phrase",
    "discontiguous phrase",
    "prefix",
    "suffix",
    "infix",
    "circumfix",
    "simulfix",
    "suprafix",
    "infixing interfix",
    "prefixing interfix",
    "suffixing interfix",
];

pub fn is_affix_type(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    AFFIX_TYPES.contains(&name.as_str())
}

/// Infer a morph type from affix markers and return it with the bare form.
pub fn infer_morph_type(form: &str) -> (&'static str, String) {
    let form = form.trim();
    let inner = |s: &str| s.trim_matches(|c| c == '-' || c == '=').to_string();
    if form.len() > 2 && form.starts_with('-') && form.ends_with('-') {
        ("infix", inner(form))
    } else if form.len() > 1 && form.starts_with('-') {
        ("suffix", inner(form))
    } else if form.len() > 1 && form.ends_with('-') {
        ("prefix", inner(form))
    } else if form.len() > 1 && form.starts_with('=') {
        ("enclitic", inner(form))
    } else if form.len() > 1 && form.ends_with('=') {
        ("proclitic", inner(form))
    } else if form.contains(char::is_whitespace) {
        ("phrase", form.to_string())
    } else {
        ("stem", form.to_string())
    }
}

/// Resolved morph type of one entry.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphOutcome {
    pub morph_type: RecordId,
    pub name: String,
    /// Lexical form with affix markers stripped.
    pub form: MultiText,
    pub is_affix: bool,
}

/// Resolve the morph type of an entry from its explicit trait or its form.
///
/// An explicit name that is neither known nor standard is invalid data; the
/// inferred type is used instead.
pub(crate) fn resolve_morph_type(
    ctx: &mut RunContext<'_>,
    record: Option<RecordId>,
    explicit: Option<&str>,
    lexical_form: &MultiText,
) -> MergeResult<MorphOutcome> {
    let mut form = MultiText::new();
    let mut inferred = None;
    for (ws, text) in lexical_form.iter() {
        let (name, bare) = infer_morph_type(text);
        inferred.get_or_insert(name);
        form.set(ws, bare);
    }
    let inferred = inferred.unwrap_or("stem");

    let mut name = inferred.to_string();
    if let Some(explicit) = explicit.map(str::trim).filter(|e| !e.is_empty()) {
        let known = ctx.lookup.find(&VocabularyKind::MorphType, explicit).is_some()
            || STANDARD_TYPES.contains(&explicit.to_lowercase().as_str());
        if known {
            name = explicit.to_string();
        } else {
            ctx.invalid_data(record, "morph-type", explicit, "unknown morph type");
        }
    }
    let morph_type = ctx.vocabulary_item(&VocabularyKind::MorphType, &name)?;
    Ok(MorphOutcome {
        morph_type,
        is_affix: is_affix_type(&name),
        name,
        form,
    })
}

fn part_of_speech(ctx: &mut RunContext<'_>, label: &str) -> MergeResult<Option<RecordId>> {
    let label = label.trim();
    if label.is_empty() {
        return Ok(None);
    }
    ctx.vocabulary_item(&VocabularyKind::PartOfSpeech, label)
        .map(Some)
}

fn affix_kind(value: &str) -> Option<AffixKind> {
    match value.trim() {
        "inflAffix" | "inflectional" => Some(AffixKind::Inflectional),
        "derivAffix" | "derivational" => Some(AffixKind::Derivational),
        "affix" | "unclassifiedAffix" | "unclassified" => Some(AffixKind::Unclassified),
        _ => None,
    }
}

/// Build the analysis a grammatical-info construct describes.
pub(crate) fn analysis_of(
    ctx: &mut RunContext<'_>,
    record: RecordId,
    info: &StagedGrammaticalInfo,
    entry_is_affix: bool,
) -> MergeResult<Analysis> {
    let pos = part_of_speech(ctx, &info.part_of_speech)?;
    let explicit_kind = info.trait_value("type").and_then(affix_kind);
    let kind = match explicit_kind {
        Some(kind) => Some(kind),
        None if entry_is_affix => Some(AffixKind::Unclassified),
        None => None,
    };

    if let Some(kind) = kind {
        let from_pos = match info.trait_value("from-part-of-speech") {
            Some(label) => part_of_speech(ctx, label)?,
            None => None,
        };
        return Ok(Analysis::Affix {
            kind,
            from_pos,
            to_pos: pos,
        });
    }

    let mut features = Vec::new();
    if let Some(expr) = info.trait_value("inflection-features") {
        let resolved = parse_feature_structure(expr)
            .and_then(|pairs| ctx.lookup.resolve_features(&pairs));
        match resolved {
            Ok(pairs) => features = pairs,
            Err(e) => ctx.invalid_data(Some(record), "inflection-features", expr, e.to_string()),
        }
    }
    Ok(Analysis::Stem { pos, features })
}

/// The entry's analysis equal to `analysis`, created when missing.
pub(crate) fn shared_msa(
    ctx: &mut RunContext<'_>,
    entry: &mut LexEntry,
    entry_id: RecordId,
    analysis: Analysis,
) -> MergeResult<RecordId> {
    for id in &entry.msas {
        if let Ok(msa) = ctx.repo.typed::<Msa>(*id) {
            if msa.analysis == analysis {
                let id = *id;
                ctx.touch(id);
                return Ok(id);
            }
        }
    }
    let id = ctx.repo.insert(Msa {
        guid: Guid::new_random(),
        owner: Some(entry_id),
        analysis,
    })?;
    entry.msas.push(id);
    ctx.touch(id);
    Ok(id)
}
