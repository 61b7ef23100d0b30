//! "Did you mean" suggestions.
//!
//! Candidates are ranked by Damerau-Levenshtein distance (optimal string
//! alignment variant) with a hard cutoff, so scoring a long candidate list on
//! every keystroke stays cheap.

/// Largest edit distance that still produces a suggestion.
pub const MAX_DISTANCE: usize = 2;

/// Most suggestions returned for one error.
pub const MAX_SUGGESTIONS: usize = 3;

/// Returns the edit distance between `a` and `b`, or `None` once it is known
/// to exceed `cutoff`.
///
/// Insertions, deletions, substitutions and transpositions of adjacent
/// characters each cost 1.
#[must_use]
pub fn bounded_distance(a: &str, b: &str, cutoff: usize) -> Option<usize> {
    Matcher::new(a).distance(b, cutoff)
}

/// Scores many candidates against one input, reusing its buffers between
/// candidates.
struct Matcher {
    input: Vec<char>,
    candidate: Vec<char>,
    before_previous: Vec<usize>,
    previous: Vec<usize>,
    current: Vec<usize>,
}

impl Matcher {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            candidate: Vec::new(),
            before_previous: Vec::new(),
            previous: Vec::new(),
            current: Vec::new(),
        }
    }

    fn distance(&mut self, candidate: &str, cutoff: usize) -> Option<usize> {
        self.candidate.clear();
        self.candidate.extend(candidate.chars());
        let (a, b) = (&self.input, &self.candidate);

        if a.len().abs_diff(b.len()) > cutoff {
            return None;
        }

        let width = b.len() + 1;
        self.before_previous.clear();
        self.before_previous.resize(width, 0);
        self.previous.clear();
        self.previous.extend(0..width);
        self.current.clear();
        self.current.resize(width, 0);

        for i in 1..=a.len() {
            self.current[0] = i;
            let mut row_min = i;

            for j in 1..=b.len() {
                let cost = usize::from(a[i - 1] != b[j - 1]);
                let mut value = (self.previous[j] + 1)
                    .min(self.current[j - 1] + 1)
                    .min(self.previous[j - 1] + cost);

                if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                    value = value.min(self.before_previous[j - 2] + 1);
                }

                self.current[j] = value;
                row_min = row_min.min(value);
            }

            if row_min > cutoff {
                return None;
            }

            std::mem::swap(&mut self.before_previous, &mut self.previous);
            std::mem::swap(&mut self.previous, &mut self.current);
        }

        let distance = self.previous[b.len()];
        (distance <= cutoff).then_some(distance)
    }
}

/// Ranks `candidates` by closeness to `input`.
///
/// Only candidates within [`MAX_DISTANCE`] are kept; ties keep candidate
/// order. At most [`MAX_SUGGESTIONS`] are returned.
///
/// # Examples
///
/// ```
/// use lql::query::suggest::suggest;
///
/// let suggestions = suggest("erors", ["errors", "crashes", "warnings"]);
/// assert_eq!(suggestions, vec!["errors"]);
/// ```
pub fn suggest<'c, I>(input: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'c str>,
{
    let mut matcher = Matcher::new(input);
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            matcher
                .distance(candidate, MAX_DISTANCE)
                .map(|d| (d, candidate))
        })
        .collect();

    scored.sort_by_key(|(distance, _)| *distance);
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}
