//! Allowlist-driven field merge with post-commit verification.

use super::allowlist::{COPIED_FIELDS, VERIFIED_FIELDS};
use super::handle::MetadataHandle;
use crate::error::Result;

/// Source and output values of one verified field after a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldComparison {
    pub field: &'static str,
    pub source: Option<String>,
    pub target: Option<String>,
}

impl FieldComparison {
    /// Exact string equality; a field absent on both sides also matches.
    pub fn matched(&self) -> bool {
        self.source == self.target
    }
}

/// What a merge copied, and whether the re-read agreed with the source.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub verified: bool,
    pub fields_copied: usize,
    pub comparisons: Vec<FieldComparison>,
}

impl VerificationResult {
    pub fn mismatches(&self) -> impl Iterator<Item = &FieldComparison> {
        self.comparisons.iter().filter(|c| !c.matched())
    }
}

/// Copies every allowlisted field present on `source` onto `target`, commits
/// in one pass, then re-reads both sides and compares the verified fields.
///
/// A verification mismatch is a signal, not a failure: it is logged and
/// carried in the result, and the output file stays. Errors out of the
/// handles (unreadable source, failed write-back) do fail the merge.
pub fn merge_and_verify(
    source: &mut impl MetadataHandle,
    target: &mut impl MetadataHandle,
) -> Result<VerificationResult> {
    let mut fields_copied = 0;
    for field in COPIED_FIELDS {
        match source.get_field(field) {
            Some(value) if !value.is_empty() => {
                target.set_field(field, &value)?;
                fields_copied += 1;
            }
            _ => {}
        }
    }
    target.commit()?;

    source.reload()?;
    target.reload()?;
    let comparisons: Vec<FieldComparison> = VERIFIED_FIELDS
        .iter()
        .map(|field| FieldComparison {
            field: field.name,
            source: source.get_field(field),
            target: target.get_field(field),
        })
        .collect();
    let verified = comparisons.iter().all(FieldComparison::matched);
    for c in comparisons.iter().filter(|c| !c.matched()) {
        log::warn!(
            "verification mismatch on {}: source {:?}, output {:?}",
            c.field,
            c.source,
            c.target
        );
    }

    Ok(VerificationResult {
        verified,
        fields_copied,
        comparisons,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::super::allowlist::{DATE_TIME_ORIGINAL, MAKE, MODEL, TagField, field_by_name};
    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct MockHandle {
        committed: HashMap<&'static str, String>,
        staged: Vec<(&'static str, String)>,
        fail_commit: bool,
        mangle_after_commit: Option<(&'static str, &'static str)>,
        commits: usize,
    }

    impl MockHandle {
        fn with(fields: &[(&TagField, &str)]) -> Self {
            let mut handle = MockHandle::default();
            for (field, value) in fields {
                handle.committed.insert(field.name, value.to_string());
            }
            handle
        }
    }

    impl MetadataHandle for MockHandle {
        fn get_field(&self, field: &TagField) -> Option<String> {
            self.committed.get(field.name).cloned()
        }

        fn set_field(&mut self, field: &TagField, value: &str) -> crate::error::Result<()> {
            self.staged.push((field.name, value.to_string()));
            Ok(())
        }

        fn commit(&mut self) -> crate::error::Result<()> {
            if self.fail_commit {
                return Err(Error::metadata_write(Path::new("mock"), "disk full"));
            }
            self.commits += 1;
            for (name, value) in self.staged.drain(..) {
                self.committed.insert(name, value);
            }
            if let Some((name, value)) = self.mangle_after_commit {
                self.committed.insert(name, value.to_string());
            }
            Ok(())
        }

        fn reload(&mut self) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn copies_present_fields_and_commits_once() {
        let mut source = MockHandle::with(&[
            (&MAKE, "Xiaomi"),
            (&MODEL, "2210132C"),
            (&DATE_TIME_ORIGINAL, "2024:01:01 10:00:00"),
            (field_by_name("FNumber").unwrap(), "179/100"),
        ]);
        let mut target = MockHandle::default();

        let result = merge_and_verify(&mut source, &mut target).unwrap();

        assert!(result.verified);
        assert_eq!(result.fields_copied, 4);
        assert_eq!(result.comparisons.len(), 3);
        assert_eq!(target.commits, 1);
        assert_eq!(
            target.committed.get("FNumber").map(String::as_str),
            Some("179/100")
        );
    }

    #[test]
    fn absent_and_empty_fields_are_skipped() {
        let mut source = MockHandle::with(&[
            (field_by_name("Software").unwrap(), ""),
            (&MODEL, "2210132C"),
        ]);
        // The target already carries values the source does not provide;
        // a merge must leave those alone.
        let mut target = MockHandle::with(&[
            (field_by_name("Software").unwrap(), "Darktable 4.6"),
            (field_by_name("Orientation").unwrap(), "1"),
        ]);

        let result = merge_and_verify(&mut source, &mut target).unwrap();

        assert_eq!(result.fields_copied, 1);
        assert_eq!(
            target.committed.get("Software").map(String::as_str),
            Some("Darktable 4.6")
        );
        assert_eq!(
            target.committed.get("Orientation").map(String::as_str),
            Some("1")
        );
        // Make and DateTimeOriginal are missing on both sides: still a match.
        assert!(result.verified);
    }

    #[test]
    fn commit_failure_propagates() {
        let mut source = MockHandle::with(&[(&MAKE, "Xiaomi")]);
        let mut target = MockHandle {
            fail_commit: true,
            ..MockHandle::default()
        };
        assert!(merge_and_verify(&mut source, &mut target).is_err());
    }

    #[test]
    fn mismatch_is_reported_not_fatal() {
        let mut source = MockHandle::with(&[(&MAKE, "Xiaomi"), (&MODEL, "2210132C")]);
        let mut target = MockHandle {
            mangle_after_commit: Some(("Make", "XIAOMI")),
            ..MockHandle::default()
        };

        let result = merge_and_verify(&mut source, &mut target).unwrap();

        assert!(!result.verified);
        let bad: Vec<_> = result.mismatches().collect();
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].field, "Make");
        assert_eq!(bad[0].source.as_deref(), Some("Xiaomi"));
        assert_eq!(bad[0].target.as_deref(), Some("XIAOMI"));
    }

    #[test]
    fn both_sides_missing_is_a_match() {
        let comparison = FieldComparison {
            field: "Make",
            source: None,
            target: None,
        };
        assert!(comparison.matched());
    }
}
