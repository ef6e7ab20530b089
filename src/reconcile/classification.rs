use super::Applied;
use crate::channel::EventAction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a classification was produced upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    /// Fast local guess, may be revised later.
    Heuristic,
    /// Model-produced verdict.
    Authoritative,
}

/// Agenda-alignment verdict for one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Utterance index this verdict applies to.
    pub index: u64,

    /// The classified utterance text.
    pub text: String,

    /// Display speaker label.
    pub speaker: String,

    /// Upstream-owned label, e.g. an agenda item name or "off-topic".
    pub category: String,

    /// Agenda-alignment estimate, 0 to 100.
    pub alignment: u32,

    pub method: ClassificationMethod,

    /// Set once the verdict is no longer expected to be revised.
    #[serde(default)]
    pub is_final: bool,
}

/// At most one classification per utterance index, in first-seen order.
///
/// A later event for a known index replaces the stored verdict wholesale.
/// The latest event always wins, whichever direction the revision runs
/// (heuristic to authoritative or back).
#[derive(Debug, Default)]
pub struct ClassificationLog {
    entries: Vec<Classification>,
    by_index: HashMap<u64, usize>,
}

impl ClassificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one classification event.
    ///
    /// The declared action is accepted for wire symmetry but does not steer
    /// the merge: a known index is replaced and an unknown index is
    /// inserted either way, so a dropped earlier event never strands the
    /// revision that follows it.
    pub fn apply(&mut self, _action: EventAction, classification: Classification) -> Applied {
        match self.by_index.get(&classification.index) {
            Some(&position) => {
                self.entries[position] = classification;
                Applied::Replaced
            }
            None => {
                self.by_index
                    .insert(classification.index, self.entries.len());
                self.entries.push(classification);
                Applied::Inserted
            }
        }
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[Classification] {
        &self.entries
    }

    pub fn get(&self, index: u64) -> Option<&Classification> {
        self.by_index
            .get(&index)
            .map(|&position| &self.entries[position])
    }

    /// Entries whose text passes the substantive-length gate, in order.
    pub fn substantive(&self, min_chars: usize) -> impl Iterator<Item = &Classification> {
        self.entries
            .iter()
            .filter(move |entry| is_substantive(&entry.text, min_chars))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_index.clear();
    }
}

/// Whether an utterance is long enough to count toward alert decisions.
/// Length is measured in characters after trimming, not bytes, so short
/// Japanese fillers are filtered the same way as English ones.
pub fn is_substantive(text: &str, min_chars: usize) -> bool {
    text.trim().chars().count() >= min_chars
}
