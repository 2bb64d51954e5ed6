//! Text cleanup before synthesis.
//!
//! Spoken output should not contain markup or raw link syntax: markdown
//! emphasis markers are dropped, `[label](url)` collapses to its label,
//! and bare URLs disappear entirely. The rendered transcript keeps the
//! original text; only the synthesizer sees the cleaned form.

/// Clean `text` for synthesis.
///
/// Link stripping runs first (when enabled) so URL fragments are removed
/// intact before emphasis markers are dropped.
pub fn clean_for_speech(text: &str, strip_links: bool) -> String {
    let text = if strip_links {
        strip_link_syntax(text)
    } else {
        text.to_owned()
    };
    strip_emphasis_markers(&text)
}

/// Drop markdown emphasis and heading markers.
fn strip_emphasis_markers(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '*' | '#')).collect()
}

/// Replace `[label](url)` with `label`, then delete bare URLs.
fn strip_link_syntax(text: &str) -> String {
    remove_bare_urls(&replace_markdown_links(text))
}

fn replace_markdown_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('[') {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        match parse_markdown_link(tail) {
            Some((label, consumed)) => {
                out.push_str(label);
                rest = &tail[consumed..];
            }
            None => {
                out.push('[');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse `[label](url)` at the start of `s`, returning the label and the
/// number of bytes consumed.
fn parse_markdown_link(s: &str) -> Option<(&str, usize)> {
    let close = s.find(']')?;
    let label = &s[1..close];
    let after = &s[close + 1..];
    if !after.starts_with('(') {
        return None;
    }
    let paren = after.find(')')?;
    Some((label, close + 1 + paren + 1))
}

fn remove_bare_urls(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let start = match (rest.find("http://"), rest.find("https://")) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => break,
        };
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail
            .find(|c: char| c.is_whitespace())
            .unwrap_or(tail.len());
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── emphasis markers ──────────────────────────────────────

    #[test]
    fn strips_asterisks_and_hashes() {
        assert_eq!(
            clean_for_speech("**Bold** and ## heading", false),
            "Bold and  heading"
        );
    }

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(clean_for_speech("Just a sentence.", false), "Just a sentence.");
    }

    // ── markdown links ────────────────────────────────────────

    #[test]
    fn markdown_link_keeps_label() {
        assert_eq!(
            clean_for_speech("See [docs](http://x.io/a) for more", true),
            "See docs for more"
        );
    }

    #[test]
    fn bare_url_removed_entirely() {
        assert_eq!(clean_for_speech("Visit http://y.io today", true), "Visit  today");
    }

    #[test]
    fn spoken_link_contract() {
        assert_eq!(
            clean_for_speech("See [docs](http://x.io/a) or http://y.io", true),
            "See docs or "
        );
    }

    #[test]
    fn https_urls_also_removed() {
        assert_eq!(clean_for_speech("go to https://a.example/x", true), "go to ");
    }

    #[test]
    fn url_with_anchor_survives_marker_stripping() {
        // The '#' lives inside the URL, which is removed whole before
        // emphasis stripping runs.
        assert_eq!(
            clean_for_speech("read [guide](https://a.io/b#top)", true),
            "read guide"
        );
    }

    #[test]
    fn unmatched_bracket_kept() {
        assert_eq!(clean_for_speech("array[0] stays", true), "array[0] stays");
    }

    #[test]
    fn bracket_without_parens_kept() {
        assert_eq!(clean_for_speech("a [note] here", true), "a [note] here");
    }

    #[test]
    fn links_kept_when_stripping_disabled() {
        assert_eq!(
            clean_for_speech("see [docs](http://x.io)", false),
            "see [docs](http://x.io)"
        );
    }

    #[test]
    fn multiple_links_all_replaced() {
        assert_eq!(
            clean_for_speech("[a](http://1) and [b](http://2)", true),
            "a and b"
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_for_speech("", true), "");
    }
}
