use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Run-wide merge policy.
///
/// Selected once before a run; every field merge in the run consults it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStyle {
    /// Only fill existing values that are empty.
    #[default]
    KeepOld,
    /// Replace existing values with incoming ones.
    KeepNew,
    /// Like `KeepOld`, but create a duplicate when incoming data disagrees.
    KeepBoth,
    /// Replace existing data and delete everything the document lacks.
    KeepOnlyNew,
}

impl MergeStyle {
    pub const ALL: [MergeStyle; 4] = [
        MergeStyle::KeepOld,
        MergeStyle::KeepNew,
        MergeStyle::KeepBoth,
        MergeStyle::KeepOnlyNew,
    ];

    /// Whether an unchanged modification time may short-circuit staging.
    ///
    /// `KeepBoth` must always see the incoming data to check for conflicts.
    pub fn honours_modification_times(&self) -> bool {
        !matches!(self, MergeStyle::KeepBoth)
    }

    /// Whether incoming values replace non-empty existing ones.
    pub fn overwrites_existing(&self) -> bool {
        matches!(self, MergeStyle::KeepNew | MergeStyle::KeepOnlyNew)
    }

    /// Whether data absent from the document is removed from existing records.
    pub fn clears_absent(&self) -> bool {
        matches!(self, MergeStyle::KeepOnlyNew)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStyle::KeepOld => "keep-old",
            MergeStyle::KeepNew => "keep-new",
            MergeStyle::KeepBoth => "keep-both",
            MergeStyle::KeepOnlyNew => "keep-only-new",
        }
    }
}

impl fmt::Display for MergeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStyle {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        MergeStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == key)
            .ok_or_else(|| TypeError::UnknownMergeStyle(s.to_string()))
    }
}
