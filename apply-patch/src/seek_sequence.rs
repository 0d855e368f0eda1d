//! Find a sequence of lines inside a larger line list, with progressively
//! more lenient whitespace/punctuation matching so hand-authored patches
//! still apply to files with minor formatting drift.

/// Attempt to find `pattern` within `lines` at or after `start`. Matches
/// are tried with decreasing strictness: exact, then ignoring trailing
/// whitespace, then ignoring leading+trailing whitespace, then after
/// normalizing common Unicode punctuation to ASCII. When `eof` is true
/// the search starts at the file's tail, since end-of-file chunks are
/// anchored there.
pub(crate) fn seek_sequence(lines: &[String], pattern: &[String], start: usize, eof: bool) -> Option<usize> {
    if pattern.is_empty() {
        return Some(start);
    }
    if pattern.len() > lines.len() {
        return None;
    }

    let search_start = if eof && lines.len() >= pattern.len() {
        lines.len() - pattern.len()
    } else {
        start
    };

    for i in search_start..=lines.len().saturating_sub(pattern.len()) {
        if lines[i..i + pattern.len()] == *pattern {
            return Some(i);
        }
    }
    for i in search_start..=lines.len().saturating_sub(pattern.len()) {
        if (0..pattern.len()).all(|p| lines[i + p].trim_end() == pattern[p].trim_end()) {
            return Some(i);
        }
    }
    for i in search_start..=lines.len().saturating_sub(pattern.len()) {
        if (0..pattern.len()).all(|p| lines[i + p].trim() == pattern[p].trim()) {
            return Some(i);
        }
    }
    for i in search_start..=lines.len().saturating_sub(pattern.len()) {
        if (0..pattern.len()).all(|p| normalize(&lines[i + p]) == normalize(&pattern[p])) {
            return Some(i);
        }
    }
    None
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => '-',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2004}' | '\u{2005}' | '\u{2006}' | '\u{2007}' | '\u{2008}'
            | '\u{2009}' | '\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_is_found() {
        let haystack = lines(&["a", "b", "c"]);
        let pattern = lines(&["b", "c"]);
        assert_eq!(seek_sequence(&haystack, &pattern, 0, false), Some(1));
    }

    #[test]
    fn trailing_whitespace_is_ignored() {
        let haystack = lines(&["a", "b  ", "c"]);
        let pattern = lines(&["b"]);
        assert_eq!(seek_sequence(&haystack, &pattern, 0, false), Some(1));
    }

    #[test]
    fn empty_pattern_matches_start() {
        let haystack = lines(&["a", "b"]);
        assert_eq!(seek_sequence(&haystack, &[], 1, false), Some(1));
    }

    #[test]
    fn pattern_longer_than_haystack_fails() {
        let haystack = lines(&["a"]);
        let pattern = lines(&["a", "b"]);
        assert_eq!(seek_sequence(&haystack, &pattern, 0, false), None);
    }

    #[test]
    fn eof_search_anchors_at_tail() {
        let haystack = lines(&["a", "b", "a", "b"]);
        let pattern = lines(&["a", "b"]);
        assert_eq!(seek_sequence(&haystack, &pattern, 0, true), Some(2));
    }

    #[test]
    fn unicode_punctuation_normalizes() {
        let haystack = lines(&["it\u{2019}s fine"]);
        let pattern = lines(&["it's fine"]);
        assert_eq!(seek_sequence(&haystack, &pattern, 0, false), Some(0));
    }
}
