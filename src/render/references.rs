//! Reference list assembly and formatting.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{ExternalCandidate, LocalReferences, Origin, ReferenceListEntry};

use super::renumber::RenumberingEntry;

/// Default heading for a rendered reference list.
pub const REFERENCES_HEADING: &str = "## References";

/// Builds the final reference list from renumbering entries.
pub struct ReferenceListBuilder<'a> {
    local: &'a LocalReferences,
    candidates: HashMap<u32, &'a ExternalCandidate>,
}

impl<'a> ReferenceListBuilder<'a> {
    /// Create a builder over the local map and the candidate pool.
    pub fn new(local: &'a LocalReferences, candidates: &'a [ExternalCandidate]) -> Self {
        Self {
            local,
            candidates: candidates.iter().map(|c| (c.placeholder, c)).collect(),
        }
    }

    /// Resolve every entry to metadata, ordered by new number.
    ///
    /// Fails on the first entry whose origin has no metadata; a missing entry
    /// means the inputs violated their contract and nothing should be
    /// exported.
    pub fn build(&self, entries: &[RenumberingEntry]) -> Result<Vec<ReferenceListEntry>> {
        let mut sorted: Vec<&RenumberingEntry> = entries.iter().collect();
        sorted.sort_by_key(|e| e.new_number);

        sorted
            .into_iter()
            .map(|entry| {
                let metadata = match entry.old_origin {
                    Origin::Local => self.local.get(entry.old_number),
                    Origin::External => self
                        .candidates
                        .get(&entry.old_number)
                        .map(|c| &c.metadata),
                };
                metadata
                    .map(|metadata| ReferenceListEntry {
                        number: entry.new_number,
                        metadata: metadata.clone(),
                    })
                    .ok_or(Error::UnresolvedReference {
                        new_number: entry.new_number,
                        old_number: entry.old_number,
                        origin: entry.old_origin,
                    })
            })
            .collect()
    }
}

/// Render a reference list as Markdown, one IEEE entry per paragraph.
pub fn render_reference_list(entries: &[ReferenceListEntry], heading: &str) -> String {
    let mut output = String::new();
    if !heading.is_empty() {
        output.push_str(heading);
        output.push_str("\n\n");
    }
    for entry in entries {
        output.push_str(&entry.to_ieee());
        output.push_str("\n\n");
    }
    let trimmed = output.trim_end().len();
    output.truncate(trimmed);
    output.push('\n');
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReferenceMetadata, ReferenceType};

    fn local() -> LocalReferences {
        let mut local = LocalReferences::new();
        local.insert(
            5,
            ReferenceMetadata::new("Local Paper", vec!["A. Smith".into()]).with_year(2019),
        );
        local
    }

    fn candidates() -> Vec<ExternalCandidate> {
        vec![ExternalCandidate::new(
            31,
            ReferenceMetadata::new("External Paper", vec!["B. Jones".into()]).with_year(2023),
            ReferenceType::Method,
        )]
    }

    #[test]
    fn test_build_sorted_by_new_number() {
        let local = local();
        let candidates = candidates();
        let entries = vec![
            RenumberingEntry {
                old_number: 31,
                old_origin: Origin::External,
                new_number: 2,
            },
            RenumberingEntry {
                old_number: 5,
                old_origin: Origin::Local,
                new_number: 1,
            },
        ];
        let list = ReferenceListBuilder::new(&local, &candidates)
            .build(&entries)
            .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].number, 1);
        assert_eq!(list[0].metadata.title, "Local Paper");
        assert_eq!(list[1].metadata.title, "External Paper");
    }

    #[test]
    fn test_unresolved_fails_loudly() {
        let local = local();
        let entries = vec![RenumberingEntry {
            old_number: 6,
            old_origin: Origin::Local,
            new_number: 1,
        }];
        let err = ReferenceListBuilder::new(&local, &[])
            .build(&entries)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedReference {
                new_number: 1,
                old_number: 6,
                origin: Origin::Local
            }
        ));
    }

    #[test]
    fn test_render_reference_list() {
        let list = vec![ReferenceListEntry {
            number: 1,
            metadata: ReferenceMetadata::new("Paper", vec!["A. Smith".into()]).with_year(2020),
        }];
        assert_eq!(
            render_reference_list(&list, REFERENCES_HEADING),
            "## References\n\n[1] A. Smith, \"Paper,\" 2020.\n"
        );
        assert_eq!(render_reference_list(&[], ""), "\n");
    }
}
