//! Stages: named points in a workflow type's progression

use crate::{StageId, WorkflowType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stage record as seeded into the status catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Catalog-wide identifier
    pub id: StageId,
    /// The workflow type this stage belongs to
    pub workflow_type: WorkflowType,
    /// Stable machine key, e.g. `review_1`
    pub code: String,
    /// Position in the chain; the initial stage is 1
    pub sequence_number: u32,
    /// Display name per locale
    pub display_name: LocalizedName,
    pub is_terminal_approved: bool,
    pub is_terminal_rejected: bool,
    /// Catalog-table divider rows, never shown in user-facing lists
    pub is_placeholder: bool,
}

impl Stage {
    /// Create a non-terminal, non-placeholder stage
    pub fn new(
        id: StageId,
        workflow_type: WorkflowType,
        code: impl Into<String>,
        sequence_number: u32,
    ) -> Self {
        Self {
            id,
            workflow_type,
            code: code.into(),
            sequence_number,
            display_name: LocalizedName::new(),
            is_terminal_approved: false,
            is_terminal_rejected: false,
            is_placeholder: false,
        }
    }

    pub fn with_name(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.display_name.insert(locale, text);
        self
    }

    pub fn terminal_approved(mut self) -> Self {
        self.is_terminal_approved = true;
        self
    }

    pub fn terminal_rejected(mut self) -> Self {
        self.is_terminal_rejected = true;
        self
    }

    pub fn placeholder(mut self) -> Self {
        self.is_placeholder = true;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal_approved || self.is_terminal_rejected
    }

    /// Whether this stage takes part in the review chain
    pub fn is_chain_stage(&self) -> bool {
        !self.is_terminal() && !self.is_placeholder
    }
}

/// Display text keyed by locale tag.
///
/// Tags are normalized on insert and lookup: lowercase, `_` replaced by `-`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>")]
pub struct LocalizedName(BTreeMap<String, String>);

impl From<BTreeMap<String, String>> for LocalizedName {
    fn from(raw: BTreeMap<String, String>) -> Self {
        raw.into_iter().collect()
    }
}

impl LocalizedName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: impl Into<String>, text: impl Into<String>) {
        self.0.insert(normalize_locale(&locale.into()), text.into());
    }

    /// Exact tag first, then its primary language subtag (`en-us` → `en`)
    pub fn get(&self, locale: &str) -> Option<&str> {
        let tag = normalize_locale(locale);
        if let Some(text) = self.0.get(&tag) {
            return Some(text.as_str());
        }
        let primary = tag.split('-').next().unwrap_or_default();
        if primary != tag {
            return self.0.get(primary).map(String::as_str);
        }
        None
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LocalizedName {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut name = Self::new();
        for (locale, text) in iter {
            name.insert(locale, text);
        }
        name
    }
}

pub fn normalize_locale(locale: &str) -> String {
    locale.trim().replace('_', "-").to_ascii_lowercase()
}
