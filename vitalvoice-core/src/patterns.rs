//! Named regex groups used by the classifiers.
//!
//! Each group is data: a name plus a list of pattern sources. Scoring code
//! asks a group either how many of its *distinct* patterns match or how many
//! matches it finds in total, so repeats can be counted once or every time.

use regex::Regex;

#[derive(Debug, Clone)]
pub struct PatternGroup {
    name: &'static str,
    patterns: Vec<Regex>,
}

impl PatternGroup {
    /// Compile a group. Sources that fail to compile are dropped with a warning.
    pub fn compile(name: &'static str, sources: &[&str]) -> Self {
        let patterns = sources
            .iter()
            .filter_map(|src| match Regex::new(src) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(group = name, pattern = %src, error = %e, "Dropping invalid pattern");
                    None
                }
            })
            .collect();
        Self { name, patterns }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Number of distinct patterns in the group that match `text`.
    pub fn count_matches(&self, text: &str) -> usize {
        self.patterns.iter().filter(|re| re.is_match(text)).count()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }

    /// Total matches across the group, counting repeats of one pattern.
    pub fn count_occurrences(&self, text: &str) -> usize {
        self.patterns.iter().map(|re| re.find_iter(text).count()).sum()
    }

    /// Byte offset of the earliest match of any pattern.
    pub fn first_start(&self, text: &str) -> Option<usize> {
        self.patterns.iter().filter_map(|re| re.find(text)).map(|m| m.start()).min()
    }

    /// Every match of every pattern, ordered by position in `text`.
    /// Where spans overlap only the longest survives, so "9:30 pm" is one
    /// fragment rather than "9:30" plus "30 pm".
    pub fn find_all(&self, text: &str) -> Vec<String> {
        let mut spans: Vec<(usize, usize)> = self
            .patterns
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();
        spans.sort_unstable_by(|a, b| (b.1 - b.0).cmp(&(a.1 - a.0)).then(a.0.cmp(&b.0)));

        let mut kept: Vec<(usize, usize)> = Vec::new();
        for (start, end) in spans {
            if kept.iter().all(|&(s, e)| end <= s || start >= e) {
                kept.push((start, end));
            }
        }
        kept.sort_unstable();
        kept.into_iter()
            .map(|(start, end)| text[start..end].trim().to_string())
            .collect()
    }
}
