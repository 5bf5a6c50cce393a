//! Extract [[wikilinks]] from note content and rewrite them on rename.
//!
//! A wikilink is `[[target]]`, `[[target#anchor]]`, `[[target|alias]]` or
//! `[[target#anchor|alias]]`. The target is kept as written; resolving it to a
//! file is the reader's job.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").unwrap());

/// A reference found in a note's body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub target_name: String,
    pub anchor: Option<String>,
    pub alias: Option<String>,
}

/// Extract every wikilink in order of appearance (duplicates included)
pub fn extract_links(content: &str) -> Vec<ExtractedLink> {
    WIKILINK_RE
        .captures_iter(content)
        .filter_map(|cap| parse_link(&cap[1]))
        .collect()
}

/// Split the inside of `[[...]]` into target, anchor and alias.
/// Links without a target (e.g. `[[#heading]]`) are dropped.
fn parse_link(inner: &str) -> Option<ExtractedLink> {
    let (reference, alias) = match inner.split_once('|') {
        Some((r, a)) => (r, non_empty(a)),
        None => (inner, None),
    };
    let (target, anchor) = match reference.split_once('#') {
        Some((t, a)) => (t, non_empty(a)),
        None => (reference, None),
    };

    let target = target.trim();
    if target.is_empty() {
        return None;
    }

    Some(ExtractedLink {
        target_name: target.to_string(),
        anchor,
        alias,
    })
}

fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Rewrites every reference to one note name so it points at another.
///
/// Matches `[[old]]` optionally prefixed with `pages/`, keeping any `#anchor`
/// and `|alias` tail verbatim. Build once per rename and apply to each file.
pub struct ReferenceRewriter {
    re: Regex,
    new_name: String,
}

impl ReferenceRewriter {
    pub fn new(old_name: &str, new_name: &str) -> Result<Self, regex::Error> {
        let pattern = format!(
            r"\[\[\s*(?:pages/)?{}(?P<tail>(?:#[^\]|]*)?(?:\|[^\]]*)?)\s*\]\]",
            regex::escape(old_name)
        );
        Ok(Self {
            re: Regex::new(&pattern)?,
            new_name: new_name.to_string(),
        })
    }

    /// Returns the new text and the number of references rewritten
    pub fn rewrite(&self, content: &str) -> (String, usize) {
        let mut count = 0;
        let rewritten = self.re.replace_all(content, |caps: &Captures| {
            count += 1;
            let tail = caps.name("tail").map(|m| m.as_str()).unwrap_or("");
            format!("[[{}{}]]", self.new_name, tail)
        });
        (rewritten.into_owned(), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite_references(content: &str, old_name: &str, new_name: &str) -> (String, usize) {
        ReferenceRewriter::new(old_name, new_name).unwrap().rewrite(content)
    }

    #[test]
    fn test_extract_plain_anchor_and_alias() {
        let links = extract_links("See [[Note A]], [[Note B#Intro]] and [[Note C|the third]].");
        assert_eq!(
            links,
            vec![
                ExtractedLink {
                    target_name: "Note A".into(),
                    anchor: None,
                    alias: None
                },
                ExtractedLink {
                    target_name: "Note B".into(),
                    anchor: Some("Intro".into()),
                    alias: None
                },
                ExtractedLink {
                    target_name: "Note C".into(),
                    anchor: None,
                    alias: Some("the third".into())
                },
            ]
        );
    }

    #[test]
    fn test_extract_anchor_with_alias() {
        let links = extract_links("[[pages/Note D#Part 2|see part two]]");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target_name, "pages/Note D");
        assert_eq!(links[0].anchor.as_deref(), Some("Part 2"));
        assert_eq!(links[0].alias.as_deref(), Some("see part two"));
    }

    #[test]
    fn test_extract_keeps_duplicates_and_drops_empty_targets() {
        let links = extract_links("[[A]] [[A]] [[#local]] [[ ]]");
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.target_name == "A"));
    }

    #[test]
    fn test_rewrite_preserves_tails() {
        let text = "x [[Note A]] y [[Note A#section]] z [[Note A|display text]]";
        let (out, n) = rewrite_references(text, "Note A", "Note A Renamed");
        assert_eq!(n, 3);
        assert_eq!(
            out,
            "x [[Note A Renamed]] y [[Note A Renamed#section]] z [[Note A Renamed|display text]]"
        );
    }

    #[test]
    fn test_rewrite_handles_pages_prefix_and_whitespace() {
        let (out, n) = rewrite_references("[[ pages/Note A#h|alias ]]", "Note A", "B");
        assert_eq!(n, 1);
        assert_eq!(out, "[[B#h|alias ]]");
    }

    #[test]
    fn test_rewrite_ignores_other_names() {
        let text = "[[Note AB]] [[Note A Renamed]] [[My Note A]]";
        let (out, n) = rewrite_references(text, "Note A", "Z");
        assert_eq!(n, 0);
        assert_eq!(out, text);
    }

    #[test]
    fn test_rewrite_escapes_regex_characters() {
        let (out, n) = rewrite_references("[[C++ (draft)]]", "C++ (draft)", "C++");
        assert_eq!(n, 1);
        assert_eq!(out, "[[C++]]");
    }

    #[test]
    fn test_rewrite_does_not_expand_dollar_signs() {
        let (out, _) = rewrite_references("[[Old]]", "Old", "Cost $1");
        assert_eq!(out, "[[Cost $1]]");
    }
}
