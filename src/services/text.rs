use std::collections::HashMap;

/// Case-fold, drop everything that is not alphanumeric or whitespace, and
/// collapse whitespace runs into single spaces.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count transcript words that can be matched to a reference word, each
/// reference occurrence usable once.
///
/// Returns `(correct_count, total_reference_word_count)`; empty tokens are
/// ignored on both sides.
pub fn word_correctness(reference: &str, transcript: &str) -> (usize, usize) {
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    let mut total = 0;

    for word in reference.split(' ').filter(|w| !w.is_empty()) {
        *remaining.entry(word).or_insert(0) += 1;
        total += 1;
    }

    let mut correct = 0;
    for word in transcript.split(' ').filter(|w| !w.is_empty()) {
        if let Some(count) = remaining.get_mut(word) {
            if *count > 0 {
                *count -= 1;
                correct += 1;
            }
        }
    }

    (correct, total)
}

/// Number of space-separated words in a normalized transcript.
pub fn word_count(text: &str) -> usize {
    text.split(' ').filter(|w| !w.is_empty()).count()
}
