//! Field-name resolution: matching source names to member slots.
//!
//! Stages run in order and each stage sees every source field before the next
//! stage starts, so an exact match is never taken by an earlier fuzzy one.
//! A slot is claimed by at most one source field.

/// One stage of the resolution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Exact,
    CaseInsensitive,
    /// Alphanumerics only, lowercased
    Normalized,
    /// Prefix, suffix or substring of one another (shorter side at least 3 chars)
    Resemblance,
    /// Edit distance at most 2 and smaller than the shorter name
    EditDistance,
}

const STAGES: [MatchStage; 5] = [
    MatchStage::Exact,
    MatchStage::CaseInsensitive,
    MatchStage::Normalized,
    MatchStage::Resemblance,
    MatchStage::EditDistance,
];

const MIN_RESEMBLANCE_LEN: usize = 3;
const MAX_EDIT_DISTANCE: usize = 2;

/// Resolve each source name to a slot index, or `None` when unmatched.
pub fn resolve_names<S: AsRef<str>>(slots: &[&str], sources: &[S]) -> Vec<Option<usize>> {
    let norm_slots: Vec<String> = slots.iter().map(|s| normalize(s)).collect();
    let norm_sources: Vec<String> = sources.iter().map(|s| normalize(s.as_ref())).collect();

    let mut bound: Vec<Option<usize>> = vec![None; sources.len()];
    let mut claimed = vec![false; slots.len()];

    for stage in STAGES {
        for (pos, source) in sources.iter().enumerate() {
            if bound[pos].is_some() {
                continue;
            }
            let source = source.as_ref();
            let free = |i: &usize| !claimed[*i];
            let found = match stage {
                MatchStage::Exact => (0..slots.len()).filter(free).find(|&i| slots[i] == source),
                MatchStage::CaseInsensitive => (0..slots.len())
                    .filter(free)
                    .find(|&i| slots[i].eq_ignore_ascii_case(source)),
                MatchStage::Normalized => (0..slots.len())
                    .filter(free)
                    .find(|&i| !norm_slots[i].is_empty() && norm_slots[i] == norm_sources[pos]),
                MatchStage::Resemblance => {
                    resemblance(&norm_slots, &norm_sources[pos], &claimed)
                }
                MatchStage::EditDistance => {
                    closest(&norm_slots, &norm_sources[pos], &claimed)
                }
            };
            if let Some(slot) = found {
                claimed[slot] = true;
                bound[pos] = Some(slot);
            }
        }
    }
    bound
}

pub(crate) fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Prefix matches win over suffix matches, which win over substrings.
fn resemblance(slots: &[String], source: &str, claimed: &[bool]) -> Option<usize> {
    let candidates = || {
        slots.iter().enumerate().filter(|(i, slot)| {
            !claimed[*i] && slot.chars().count().min(source.chars().count()) >= MIN_RESEMBLANCE_LEN
        })
    };
    let either = |slot: &str, f: fn(&str, &str) -> bool| f(slot, source) || f(source, slot);

    candidates()
        .find(|(_, slot)| either(slot, |a, b| a.starts_with(b)))
        .or_else(|| candidates().find(|(_, slot)| either(slot, |a, b| a.ends_with(b))))
        .or_else(|| candidates().find(|(_, slot)| either(slot, |a, b| a.contains(b))))
        .map(|(i, _)| i)
}

fn closest(slots: &[String], source: &str, claimed: &[bool]) -> Option<usize> {
    let source_len = source.chars().count();
    slots
        .iter()
        .enumerate()
        .filter(|(i, slot)| !claimed[*i] && !slot.is_empty() && source_len > 0)
        .filter_map(|(i, slot)| {
            let distance = levenshtein(slot, source);
            let shorter = slot.chars().count().min(source_len);
            (distance <= MAX_EDIT_DISTANCE && distance < shorter).then_some((distance, i))
        })
        .min()
        .map(|(_, i)| i)
}

/// Levenshtein distance over chars.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
