//! Longest-match scoring of instance paths against glob patterns.
//!
//! Patterns and instance paths share one small language: `/` separates
//! nodes, `[key='value']` attaches key predicates, and `*` is a wildcard
//! that is only meaningful right after a `/` or `'` boundary. A trailing
//! `*` widens either side to a whole subtree.
//!
//! [`match_len`] returns how many structural delimiters of the pattern
//! were consumed in order against the instance path. Zero means no match;
//! callers rank candidate patterns by this score and keep the maximum.
//!
//! The score is a prefix depth, not a full-path equality test: a pattern
//! may end while the instance path continues (subtree subscription), and
//! an instance path may end while the pattern continues (ancestor of a
//! subscribed subtree). A hard character mismatch outside any wildcard
//! region scores zero — partial node names never count.

/// Characters that structure a path into nodes and key predicates.
const fn is_structural(c: u8) -> bool {
    matches!(c, b'/' | b'[' | b']')
}

/// True exactly for the root-scope paths `/` and `/*`.
///
/// Root scope bypasses matching entirely: every registered pattern is
/// interested in the whole tree.
#[must_use]
pub fn is_root_scope(xpath: &str) -> bool {
    xpath == "/" || xpath == "/*"
}

/// Scores `xpath` against `pattern`.
///
/// Returns the number of structural delimiters of `pattern` matched in
/// order, or 0 if the two disagree on any literal character outside a
/// wildcard region. Both sides may use wildcards; a `*` enters a wildcard
/// region only when preceded by `/` or `'`, and the region ends when the
/// other side produces that same boundary character.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn match_len(pattern: &str, xpath: &str) -> usize {
    let p = pattern.as_bytes();
    let x = xpath.as_bytes();
    let mut p_len = p.len();
    let mut x_len = x.len();

    // A trailing '*' means "this subtree"; it is not literal text.
    if p_len > 0 && p[p_len - 1] == b'*' {
        p_len -= 1;
    }
    if x_len > 0 && x[x_len - 1] == b'*' {
        x_len -= 1;
    }
    if p_len == 0 || x_len == 0 {
        return 0;
    }

    let mut count = 0usize;
    let mut pi = 0usize;
    let mut xi = 0usize;
    let mut p_wild = false;
    let mut x_wild = false;
    let mut in_wild = false;
    let mut wild_delim = 0u8;
    let mut delim_run = false;

    while pi < p_len && xi < x_len {
        let mut matched = p[pi] == x[xi];

        // Enter a wildcard region only from a '/' or '\'' boundary. The
        // first character of either string has no boundary before it.
        if !in_wild && !matched && (p[pi] == b'*' || x[xi] == b'*') {
            let p_prev = if pi > 0 { p[pi - 1] } else { 0 };
            let x_prev = if xi > 0 { x[xi - 1] } else { 0 };
            if p_prev == b'/' || p_prev == b'\'' || x_prev == b'/' || x_prev == b'\'' {
                in_wild = true;
                if p[pi] == b'*' {
                    p_wild = true;
                    wild_delim = p_prev;
                } else {
                    x_wild = true;
                    wild_delim = x_prev;
                }
            }
        }

        // The region ends when the non-wild side reaches the boundary
        // character the wildcard started from.
        if in_wild {
            if p_wild && x[xi] == wild_delim {
                p_wild = false;
                if pi < p_len - 1 {
                    pi += 1;
                }
                in_wild = false;
            } else if x_wild && p[pi] == wild_delim {
                x_wild = false;
                if xi < x_len - 1 {
                    xi += 1;
                }
                in_wild = false;
            }
        }

        matched = p_wild || x_wild || p[pi] == x[xi];
        if !matched {
            return 0;
        }

        // Count a simultaneous structural delimiter once per run, so that
        // "][" and "]/" sequences advance the score by one, not two.
        if is_structural(p[pi]) && p[pi] == x[xi] {
            if pi > 0 && xi > 0 && !delim_run {
                count += 1;
            }
            delim_run = true;
        } else {
            delim_run = false;
        }

        if !p_wild {
            pi += 1;
        }
        if !x_wild {
            xi += 1;
        }
    }

    // The instance path ended exactly at a node boundary of the pattern:
    // that boundary closes one more fully-matched node.
    if !delim_run && pi < p.len() && (p[pi] == b'/' || p[pi] == b']') {
        count += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATICD_PROTO_PATTERN: &str = "/frr-routing:routing/control-plane-protocols/\
         control-plane-protocol[type='frr-staticd:staticd'][name='staticd'][vrf='default']/\
         frr-staticd:staticd/*";

    #[test]
    fn deeper_pattern_scores_higher() {
        let shallow = match_len("/a/*", "/a/b/c");
        let deep = match_len("/a/b/*", "/a/b/c");
        assert!(shallow > 0);
        assert!(deep > shallow, "expected {deep} > {shallow}");
    }

    #[test]
    fn sibling_subtree_does_not_match() {
        // "/a/x" lives outside "/a/b/*"; a partial prefix must not score.
        assert!(match_len("/a/*", "/a/x") > 0);
        assert_eq!(match_len("/a/b/*", "/a/x"), 0);
    }

    #[test]
    fn pattern_matches_itself_with_subtree_marker() {
        for pattern in [
            "/frr-vrf:lib/*",
            "/frr-interface:lib/*",
            STATICD_PROTO_PATTERN,
        ] {
            let xp = format!("{pattern}*");
            assert!(
                match_len(pattern, &xp) > 0,
                "pattern {pattern:?} should match its own subtree"
            );
        }
    }

    #[test]
    fn key_predicates_count_toward_depth() {
        let xpath = "/frr-routing:routing/control-plane-protocols/\
             control-plane-protocol[type='frr-staticd:staticd'][name='staticd'][vrf='default']/\
             frr-staticd:staticd/route-list[prefix='10.0.0.0/24']";
        let len = match_len(STATICD_PROTO_PATTERN, xpath);
        assert!(len > 0);
        // Mismatching a key value outside a wildcard kills the match.
        let other_vrf = xpath.replace("[vrf='default']", "[vrf='blue']");
        assert_eq!(match_len(STATICD_PROTO_PATTERN, &other_vrf), 0);
    }

    #[test]
    fn quoted_wildcard_spans_a_key_value() {
        let pattern = "/if:lib/interface[name='*']/mtu";
        assert!(match_len(pattern, "/if:lib/interface[name='eth0']/mtu") > 0);
        assert!(match_len(pattern, "/if:lib/interface[name='lo']/mtu") > 0);
    }

    #[test]
    fn instance_side_wildcard_is_honored() {
        let pattern = "/if:lib/interface[name='eth0']/mtu";
        assert!(match_len(pattern, "/if:lib/interface[name='*']/mtu") > 0);
    }

    #[test]
    fn ancestor_of_subscription_matches() {
        // The datastore walk visits "/a" before anything under "/a/b/*".
        assert!(match_len("/a/b/*", "/a") > 0);
    }

    #[test]
    fn empty_and_bare_wildcards_score_zero() {
        assert_eq!(match_len("", "/a"), 0);
        assert_eq!(match_len("/a/*", ""), 0);
        assert_eq!(match_len("*", "/a"), 0);
        assert_eq!(match_len("/a/*", "*"), 0);
    }

    #[test]
    fn scores_are_never_negative_and_mismatch_is_zero() {
        for (p, x) in [
            ("/a/*", "/b/c"),
            ("/frr-vrf:lib/*", "/frr-interface:lib/x"),
            ("/a/b/*", "/ab"),
        ] {
            assert_eq!(match_len(p, x), 0, "{p:?} vs {x:?}");
        }
    }

    #[test]
    fn root_scope_is_exactly_slash_and_slash_star() {
        assert!(is_root_scope("/"));
        assert!(is_root_scope("/*"));
        assert!(!is_root_scope(""));
        assert!(!is_root_scope("/a"));
        assert!(!is_root_scope("//"));
        assert!(!is_root_scope("/**"));
    }
}
