// Find-in-page: the controller capability the find bar drives, plus a
// regex-backed implementation over plain text lines.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Matching options for a find query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
}

/// Where the find cursor is: `current` is 1-based, 0 when there are no matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindStatus {
    pub current: usize,
    pub total: usize,
}

impl FindStatus {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Searches the content hosted by one pane.
pub trait FindController: Send + Sync {
    /// Start a new search, moving the cursor to the first match.
    fn search(&self, query: &str, options: FindOptions) -> FindStatus;
    fn next(&self) -> FindStatus;
    fn previous(&self) -> FindStatus;
    /// Clear highlights and forget the query.
    fn finish(&self);
}

/// A single match in the searched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// Line index, 0-based.
    pub row: usize,
    /// Starting byte (inclusive).
    pub start: usize,
    /// Ending byte (exclusive).
    pub end: usize,
}

/// Build the regex for a literal query.
fn build_pattern(query: &str, options: FindOptions) -> Result<regex::Regex, regex::Error> {
    let mut pattern = regex::escape(query);
    if options.whole_word {
        pattern = format!(r"\b{pattern}\b");
    }
    if !options.case_sensitive {
        pattern = format!("(?i){pattern}");
    }
    regex::Regex::new(&pattern)
}

/// Find every match of `query` across `lines`. An empty query matches nothing.
pub fn find_matches(query: &str, options: FindOptions, lines: &[String]) -> Vec<SearchMatch> {
    if query.is_empty() {
        return Vec::new();
    }
    let re = match build_pattern(query, options) {
        Ok(re) => re,
        Err(e) => {
            log::warn!("find: cannot compile query {query:?}: {e}");
            return Vec::new();
        }
    };

    let mut matches = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        for m in re.find_iter(line) {
            matches.push(SearchMatch {
                row,
                start: m.start(),
                end: m.end(),
            });
        }
    }
    matches
}

#[derive(Debug, Default)]
struct SearchState {
    query: String,
    matches: Vec<SearchMatch>,
    current_index: usize,
}

impl SearchState {
    fn status(&self) -> FindStatus {
        if self.matches.is_empty() {
            return FindStatus::default();
        }
        FindStatus {
            current: self.current_index + 1,
            total: self.matches.len(),
        }
    }
}

/// Find controller over a fixed set of text lines.
#[derive(Debug, Default)]
pub struct TextFindController {
    lines: Vec<String>,
    state: Mutex<SearchState>,
}

impl TextFindController {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            state: Mutex::new(SearchState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn query(&self) -> String {
        self.state().query.clone()
    }

    /// The match the cursor is on, if any.
    pub fn current_match(&self) -> Option<SearchMatch> {
        let state = self.state();
        state.matches.get(state.current_index).cloned()
    }
}

impl FindController for TextFindController {
    fn search(&self, query: &str, options: FindOptions) -> FindStatus {
        let matches = find_matches(query, options, &self.lines);
        let mut state = self.state();
        state.query = query.to_string();
        state.matches = matches;
        state.current_index = 0;
        log::debug!("find: {query:?} -> {} matches", state.matches.len());
        state.status()
    }

    fn next(&self) -> FindStatus {
        let mut state = self.state();
        if !state.matches.is_empty() {
            state.current_index = (state.current_index + 1) % state.matches.len();
        }
        state.status()
    }

    fn previous(&self) -> FindStatus {
        let mut state = self.state();
        let len = state.matches.len();
        if len > 0 {
            state.current_index = (state.current_index + len - 1) % len;
        }
        state.status()
    }

    fn finish(&self) {
        *self.state() = SearchState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn lines(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    // ── Matching ───────────────────────────────────────────────────

    #[test]
    fn literal_search_finds_single_match() {
        let found = find_matches("world", FindOptions::default(), &lines(&["hello world"]));
        assert_eq!(found, vec![SearchMatch { row: 0, start: 6, end: 11 }]);
    }

    #[test]
    fn search_across_multiple_rows() {
        let content = lines(&["first foo", "second", "third foo and foo"]);
        let found = find_matches("foo", FindOptions::default(), &content);
        let rows: Vec<usize> = found.iter().map(|m| m.row).collect();
        assert_eq!(rows, vec![0, 2, 2]);
    }

    #[test]
    fn query_is_literal_not_regex() {
        let content = lines(&["a.c abc a.c"]);
        let found = find_matches("a.c", FindOptions::default(), &content);
        assert_eq!(found.len(), 2);
        assert!(find_matches("[invalid", FindOptions::default(), &content).is_empty());
    }

    #[test]
    fn empty_query_returns_no_matches() {
        assert!(find_matches("", FindOptions::default(), &lines(&["text"])).is_empty());
    }

    #[rstest]
    #[case::insensitive_default(false, false, 3)]
    #[case::case_sensitive(true, false, 1)]
    #[case::whole_word_insensitive(false, true, 2)]
    #[case::whole_word_sensitive(true, true, 1)]
    fn options_change_match_count(
        #[case] case_sensitive: bool,
        #[case] whole_word: bool,
        #[case] expected: usize,
    ) {
        let content = lines(&["Error ERROR errors"]);
        let options = FindOptions { case_sensitive, whole_word };
        assert_eq!(find_matches("Error", options, &content).len(), expected);
    }

    // ── Controller navigation ──────────────────────────────────────

    #[test]
    fn search_starts_at_first_match() {
        let ctl = TextFindController::new(["aa bb aa cc aa"]);
        let status = ctl.search("aa", FindOptions::default());
        assert_eq!(status, FindStatus { current: 1, total: 3 });
        assert_eq!(ctl.current_match().unwrap().start, 0);
        assert_eq!(ctl.query(), "aa");
    }

    #[test]
    fn next_wraps_to_first() {
        let ctl = TextFindController::new(["aa bb aa"]);
        ctl.search("aa", FindOptions::default());
        assert_eq!(ctl.next().current, 2);
        assert_eq!(ctl.next().current, 1);
    }

    #[test]
    fn previous_wraps_to_last() {
        let ctl = TextFindController::new(["aa bb aa cc aa"]);
        ctl.search("aa", FindOptions::default());
        assert_eq!(ctl.previous().current, 3);
        assert_eq!(ctl.previous().current, 2);
    }

    #[test]
    fn navigation_without_matches_stays_empty() {
        let ctl = TextFindController::new(["hello"]);
        assert!(ctl.search("xyz", FindOptions::default()).is_empty());
        assert_eq!(ctl.next(), FindStatus::default());
        assert_eq!(ctl.previous(), FindStatus::default());
        assert!(ctl.current_match().is_none());
    }

    #[test]
    fn new_search_resets_cursor() {
        let ctl = TextFindController::new(["aa bb aa cc aa"]);
        ctl.search("aa", FindOptions::default());
        ctl.next();
        ctl.next();
        assert_eq!(ctl.search("bb", FindOptions::default()), FindStatus { current: 1, total: 1 });
    }

    #[test]
    fn finish_forgets_query() {
        let ctl = TextFindController::new(["aa"]);
        ctl.search("aa", FindOptions::default());
        ctl.finish();
        assert_eq!(ctl.query(), "");
        assert!(ctl.current_match().is_none());
        assert_eq!(ctl.next(), FindStatus::default());
    }
}
