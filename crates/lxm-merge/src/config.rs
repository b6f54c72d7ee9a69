use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lxm_store::WsDescription;
use lxm_types::MergeStyle;

use crate::error::{MergeError, MergeResult};

/// Configuration of one merge run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MergeConfig {
    /// The merge policy every field merge consults.
    pub style: MergeStyle,
    /// Whether an unchanged modification time lets an entry be skipped.
    pub trust_modification_times: bool,
    /// Location of the document being merged.
    pub source_path: Option<PathBuf>,
    /// Language descriptions applied when a writing system is created,
    /// keyed by language tag.
    pub language_descriptions: BTreeMap<String, WsDescription>,
}

impl MergeConfig {
    pub fn new(style: MergeStyle) -> Self {
        Self {
            style,
            ..Default::default()
        }
    }

    /// Parse a TOML configuration file's contents.
    pub fn from_toml_str(text: &str) -> MergeResult<Self> {
        toml::from_str(text).map_err(|e| MergeError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> MergeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MergeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Directory relative media references are resolved against.
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_path
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// The language description configured for `tag`, matched
    /// case-insensitively.
    pub fn description_for(&self, tag: &str) -> Option<&WsDescription> {
        self.language_descriptions.get(tag).or_else(|| {
            self.language_descriptions
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(tag))
                .map(|(_, v)| v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_keep_old_without_trust() {
        let config = MergeConfig::default();
        assert_eq!(config.style, MergeStyle::KeepOld);
        assert!(!config.trust_modification_times);
        assert!(config.source_dir().is_none());
    }

    #[test]
    fn parses_toml() {
        let config = MergeConfig::from_toml_str(
            r#"
            style = "keep-only-new"
            trust-modification-times = true
            source-path = "/data/export/lexicon.lift"

            [language-descriptions.seh]
            name = "Sena"
            right_to_left = false
            "#,
        )
        .unwrap();
        assert_eq!(config.style, MergeStyle::KeepOnlyNew);
        assert!(config.trust_modification_times);
        assert_eq!(config.source_dir(), Some(Path::new("/data/export")));
        assert_eq!(
            config.description_for("SEH").and_then(|d| d.name.as_deref()),
            Some("Sena")
        );
    }

    #[test]
    fn rejects_unknown_style() {
        assert!(matches!(
            MergeConfig::from_toml_str("style = \"keep-everything\""),
            Err(MergeError::Config(_))
        ));
    }
}
