//! Free-text author lists, e.g. a form field holding `"alice, @bob\ncarol"`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use xpulse_core::{classify, mentions_known_domain, ReferenceKind};

static HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorList {
    /// Distinct handles in first-seen order, without `@`.
    pub authors: Vec<String>,
    /// Tokens that were neither a handle nor a profile URL.
    pub rejected: Vec<String>,
}

/// Splits `text` on newlines and commas into distinct author handles.
///
/// Blank entries are dropped. Duplicates are removed case-insensitively,
/// keeping the first spelling. Profile URLs contribute their username.
#[must_use]
pub fn parse_author_list(text: &str) -> AuthorList {
    let mut list = AuthorList::default();
    let mut seen: HashSet<String> = HashSet::new();

    for token in text.split(['\n', ',']).map(str::trim) {
        if token.is_empty() {
            continue;
        }
        match handle_from_token(token) {
            Some(handle) => {
                if seen.insert(handle.to_ascii_lowercase()) {
                    list.authors.push(handle);
                }
            }
            None => list.rejected.push(token.to_owned()),
        }
    }

    if !list.rejected.is_empty() {
        tracing::debug!(rejected = ?list.rejected, "dropped unrecognized author tokens");
    }
    list
}

fn handle_from_token(token: &str) -> Option<String> {
    if mentions_known_domain(token) && token.contains('/') {
        return match classify(token).kind {
            ReferenceKind::Profile { username } if HANDLE_RE.is_match(&username) => Some(username),
            _ => None,
        };
    }
    let handle = token.strip_prefix('@').unwrap_or(token);
    HANDLE_RE.is_match(handle).then(|| handle.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blanks_and_duplicates_are_removed() {
        let list = parse_author_list("alice, bob,, alice");
        assert_eq!(list.authors, ["alice", "bob"]);
        assert!(list.rejected.is_empty());
    }

    #[test]
    fn newlines_at_signs_and_urls_are_understood() {
        let list = parse_author_list("@carol\nhttps://x.com/dave\ntwitter.com/erin/\n");
        assert_eq!(list.authors, ["carol", "dave", "erin"]);
    }

    #[test]
    fn dedupe_is_case_insensitive_and_keeps_first_spelling() {
        let list = parse_author_list("Alice, alice, ALICE");
        assert_eq!(list.authors, ["Alice"]);
    }

    #[test]
    fn invalid_tokens_are_rejected() {
        let list = parse_author_list("ok_name, has space, way_too_long_handle_name, x.com/a/status/1");
        assert_eq!(list.authors, ["ok_name"]);
        assert_eq!(list.rejected.len(), 3);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert_eq!(parse_author_list(" , \n ,"), AuthorList::default());
    }
}
