use std::cmp::min;

fn min3<T: Ord>(v1: T, v2: T, v3: T) -> T {
    min(v1, min(v2, v3))
}

/// Levenshtein distance between two words, counted in chars.
pub fn edit_distance(word1: &str, word2: &str) -> usize {
    let word1: Vec<char> = word1.chars().collect();
    let word2: Vec<char> = word2.chars().collect();

    // only two rows of the matrix are alive at any time
    let mut previous: Vec<usize> = (0..=word2.len()).collect();
    let mut current = vec![0; word2.len() + 1];

    for (i, c1) in word1.iter().enumerate() {
        current[0] = i + 1;
        for (j, c2) in word2.iter().enumerate() {
            current[j + 1] = if c1 == c2 {
                previous[j]
            } else {
                1 + min3(previous[j], previous[j + 1], current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[word2.len()]
}

/// Normalizes a name for fuzzy comparison: lowercase, alphanumerics only.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Returns the candidate closest to `query`, if its normalized edit distance
/// is at most `max_ratio` of the longer name.
pub fn closest_match<'a, I>(query: &str, candidates: I, max_ratio: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let query = normalize(query);
    candidates
        .into_iter()
        .map(|candidate| {
            let normalized = normalize(candidate);
            let longest = query.chars().count().max(normalized.chars().count()).max(1);
            let ratio = edit_distance(&query, &normalized) as f64 / longest as f64;
            (candidate, ratio)
        })
        .filter(|(_, ratio)| *ratio <= max_ratio)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}
