//! Element history for one (attempt, key) and diff-chain reconstruction

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LedgerError;
use crate::diff::{Patch, compose};
use crate::types::{AttemptId, ElementId};

/// One recorded fact about an attempt's runtime state
///
/// When `diff_of` is set, `value` holds an encoded [`Patch`] against the
/// materialized value of the referenced element rather than a full value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub attempt: AttemptId,
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
    pub diff_of: Option<ElementId>,
}

impl Element {
    pub fn is_diff(&self) -> bool {
        self.diff_of.is_some()
    }
}

/// All elements for one (attempt, key), in ledger order
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
}

impl Timeline {
    /// Build a timeline, sorting into `(timestamp, id)` order
    pub fn new(mut elements: Vec<Element>) -> Self {
        elements.sort_by_key(|e| (e.timestamp, e.id));
        let index = elements
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.id, pos))
            .collect();
        Self { elements, index }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.index.get(&id).map(|&pos| &self.elements[pos])
    }

    pub fn latest(&self) -> Option<&Element> {
        self.elements.last()
    }

    /// Walk `diff_of` links from `start` back to its full-value base
    pub fn chain(&self, start: ElementId) -> DiffChain<'_> {
        DiffChain {
            timeline: self,
            next: Some(start),
            steps: 0,
        }
    }

    /// Reconstruct the full value recorded by element `id`
    pub fn materialize(&self, id: ElementId) -> Result<String, LedgerError> {
        let links = self.chain(id).collect::<Result<Vec<_>, _>>()?;
        let Some((base, diffs)) = links.split_last() else {
            return Err(LedgerError::BrokenChain {
                element: id,
                reason: "element not in timeline".into(),
            });
        };

        let mut value = base.value.clone();
        for element in diffs.iter().rev() {
            value = apply_stored_diff(element, &value)?;
        }
        Ok(value)
    }

    /// Reconstruct the value of the most recent element
    pub fn current(&self) -> Result<Option<String>, LedgerError> {
        self.latest().map(|e| self.materialize(e.id)).transpose()
    }
}

/// Decode and apply the patch stored in a diff element
pub(crate) fn apply_stored_diff(element: &Element, base: &str) -> Result<String, LedgerError> {
    let to_ledger_err = |source| LedgerError::Diff {
        element: element.id,
        source,
    };
    let patch = Patch::decode(&element.value).map_err(to_ledger_err)?;
    compose(&patch, base).map_err(to_ledger_err)
}

/// Lazy walk over a diff chain, newest link first, ending at the base.
///
/// The walk is finite: a dangling reference or a cycle yields one error and
/// then ends.
pub struct DiffChain<'a> {
    timeline: &'a Timeline,
    next: Option<ElementId>,
    steps: usize,
}

impl<'a> Iterator for DiffChain<'a> {
    type Item = Result<&'a Element, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;

        let Some(element) = self.timeline.get(id) else {
            return Some(Err(LedgerError::BrokenChain {
                element: id,
                reason: "diff_of references an element outside this attempt's key history".into(),
            }));
        };
        if self.steps >= self.timeline.len() {
            return Some(Err(LedgerError::BrokenChain {
                element: id,
                reason: "diff_of references form a cycle".into(),
            }));
        }
        self.steps += 1;
        self.next = element.diff_of;
        Some(Ok(element))
    }
}
