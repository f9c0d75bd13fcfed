//! Diff codec for repeatedly rewritten ledger values
//!
//! Suspend data is rewritten in full on every flush, but consecutive values
//! usually differ only in a region somewhere in the middle. A [`Patch`]
//! records how much of the base to keep at each end and what to splice in
//! between, which is enough to rebuild the next value byte for byte.
//!
//! Encoded form, as stored in the ledger:
//!
//! ```text
//! @<base_len>,<prefix>,<suffix>\n<insert>
//! ```

use thiserror::Error;

const HEADER_MARK: char = '@';

/// Errors from decoding or applying a patch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("malformed patch header: {0}")]
    Malformed(String),

    #[error("patch expects a base of {expected} bytes, got {actual}")]
    BaseLength { expected: usize, actual: usize },

    #[error("patch keeps {prefix}+{suffix} bytes of a {base_len}-byte base")]
    OutOfRange {
        base_len: usize,
        prefix: usize,
        suffix: usize,
    },

    #[error("patch splits a UTF-8 character in the base")]
    CharBoundary,
}

/// The difference between a base value and its successor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Byte length of the base the patch applies to
    pub base_len: usize,
    /// Bytes kept from the start of the base
    pub prefix: usize,
    /// Bytes kept from the end of the base
    pub suffix: usize,
    /// Text spliced in between the kept ends
    pub insert: String,
}

impl Patch {
    /// Serialize to the stored form
    pub fn encode(&self) -> String {
        format!(
            "{HEADER_MARK}{},{},{}\n{}",
            self.base_len, self.prefix, self.suffix, self.insert
        )
    }

    /// Parse the stored form
    pub fn decode(encoded: &str) -> Result<Self, DiffError> {
        let body = encoded
            .strip_prefix(HEADER_MARK)
            .ok_or_else(|| DiffError::Malformed("missing header mark".into()))?;
        let (header, insert) = body
            .split_once('\n')
            .ok_or_else(|| DiffError::Malformed("missing header terminator".into()))?;

        let mut fields = header.split(',').map(|f| {
            f.parse::<usize>()
                .map_err(|_| DiffError::Malformed(format!("bad header field {f:?}")))
        });
        let mut next = || {
            fields
                .next()
                .unwrap_or_else(|| Err(DiffError::Malformed("too few header fields".into())))
        };
        let base_len = next()?;
        let prefix = next()?;
        let suffix = next()?;
        if fields.next().is_some() {
            return Err(DiffError::Malformed("too many header fields".into()));
        }

        Ok(Self {
            base_len,
            prefix,
            suffix,
            insert: insert.to_string(),
        })
    }

    /// Size of the encoded form in bytes
    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }
}

/// Compute the patch that turns `base` into `next`
pub fn diff(base: &str, next: &str) -> Patch {
    let (b, n) = (base.as_bytes(), next.as_bytes());

    let mut prefix = b.iter().zip(n).take_while(|(x, y)| x == y).count();
    while !base.is_char_boundary(prefix) {
        prefix -= 1;
    }

    let max_suffix = b.len().min(n.len()) - prefix;
    let mut suffix = b
        .iter()
        .rev()
        .zip(n.iter().rev())
        .take(max_suffix)
        .take_while(|(x, y)| x == y)
        .count();
    while !base.is_char_boundary(b.len() - suffix) {
        suffix -= 1;
    }

    Patch {
        base_len: b.len(),
        prefix,
        suffix,
        insert: next[prefix..n.len() - suffix].to_string(),
    }
}

/// Apply `patch` to `base`, rebuilding the value it was computed from
pub fn compose(patch: &Patch, base: &str) -> Result<String, DiffError> {
    if base.len() != patch.base_len {
        return Err(DiffError::BaseLength {
            expected: patch.base_len,
            actual: base.len(),
        });
    }
    let kept = patch
        .prefix
        .checked_add(patch.suffix)
        .filter(|kept| *kept <= base.len());
    if kept.is_none() {
        return Err(DiffError::OutOfRange {
            base_len: patch.base_len,
            prefix: patch.prefix,
            suffix: patch.suffix,
        });
    }

    let tail_start = base.len() - patch.suffix;
    if !base.is_char_boundary(patch.prefix) || !base.is_char_boundary(tail_start) {
        return Err(DiffError::CharBoundary);
    }

    let mut out = String::with_capacity(patch.prefix + patch.insert.len() + patch.suffix);
    out.push_str(&base[..patch.prefix]);
    out.push_str(&patch.insert);
    out.push_str(&base[tail_start..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(base: &str, next: &str) {
        let patch = diff(base, next);
        let decoded = Patch::decode(&patch.encode()).unwrap();
        assert_eq!(decoded, patch);
        assert_eq!(compose(&decoded, base).unwrap(), next);
    }

    #[test]
    fn edit_in_the_middle_keeps_both_ends() {
        let base = r#"{"q":[1,2,3],"page":4}"#;
        let next = r#"{"q":[1,9,3],"page":4}"#;
        let patch = diff(base, next);
        assert_eq!(patch.insert, "9");
        assert_eq!(patch.prefix + patch.suffix, base.len() - 1);
        round_trip(base, next);
    }

    #[test]
    fn handles_empty_and_identical_values() {
        round_trip("", "");
        round_trip("", "abc");
        round_trip("abc", "");
        round_trip("same", "same");
        assert_eq!(diff("same", "same").insert, "");
    }

    #[test]
    fn repeated_characters_do_not_overlap_prefix_and_suffix() {
        round_trip("aaaa", "aa");
        round_trip("aa", "aaaa");
        round_trip("abab", "ab");
    }

    #[test]
    fn never_splits_multibyte_characters() {
        round_trip("naïve", "naive");
        round_trip("héllo", "hèllo");
        round_trip("日本語", "日本人語");
        round_trip("🦀x", "🦞x");
    }

    #[test]
    fn insert_may_contain_newlines_and_header_marks() {
        round_trip("line1\nline2", "line1\n@0,0,0\nline2");
    }

    #[test]
    fn compose_rejects_wrong_base() {
        let patch = diff("abcdef", "abXdef");
        assert_eq!(
            compose(&patch, "abc"),
            Err(DiffError::BaseLength {
                expected: 6,
                actual: 3
            })
        );
    }

    #[test]
    fn compose_rejects_out_of_range_patch() {
        let patch = Patch {
            base_len: 3,
            prefix: 2,
            suffix: 2,
            insert: String::new(),
        };
        assert!(matches!(
            compose(&patch, "abc"),
            Err(DiffError::OutOfRange { .. })
        ));
    }

    #[test]
    fn compose_rejects_split_character() {
        let patch = Patch {
            base_len: "é".len(),
            prefix: 1,
            suffix: 0,
            insert: String::new(),
        };
        assert_eq!(compose(&patch, "é"), Err(DiffError::CharBoundary));
    }

    #[test]
    fn decode_rejects_malformed_headers() {
        assert!(Patch::decode("plain value").is_err());
        assert!(Patch::decode("@1,2\nx").is_err());
        assert!(Patch::decode("@1,2,3,4\nx").is_err());
        assert!(Patch::decode("@1,x,3\nx").is_err());
        assert!(Patch::decode("@1,2,3").is_err());
    }
}
