//! Fallback symptom bank
//!
//! Canned QA-style bug reports used when the generator supplies no symptoms.
//! Deliberately generic: symptoms describe observable behavior (action,
//! expectation, actual) and are never derived from the technical change text,
//! so they cannot leak the bug's location to the player.

/// Upper bound on synthesized symptoms per round.
const MAX_SYNTHESIZED: usize = 3;

const SYMPTOM_POOL: &[&str] = &[
    "Opened the page and scanned the main view. Expected everything to look \
     the way it did yesterday, but something about the displayed data is off. \
     No errors in sight, it just reads wrong.",
    "Went through the usual flow a few times in a row. Expected consistent \
     results on every pass, but at least one step produces output that does \
     not match what I entered. Happens every single time.",
    "Loaded the screen with a normal amount of data. Expected the full set to \
     show up, but the view seems to be missing something compared to what the \
     system should have. Refreshing does not help.",
    "Clicked through the feature like a regular user would. Expected the \
     numbers shown to add up, but a calculated value is clearly incorrect. \
     Reproduced it three times with the same input.",
    "Used the feature on a fresh session. Expected it to complete quietly, \
     but part of the screen either breaks or shows nothing at all. Same \
     behavior after a restart.",
    "Compared the on-screen ordering against what I expected from the data. \
     The arrangement is not what it should be, and it is like that on every \
     reload.",
    "Checked a detail view after making a change. Expected the text to appear \
     in full, but some of it is cut short or blank. Consistent across \
     browsers.",
    "Ran the same action twice with identical input. Expected matching \
     results, but what appears on screen disagrees with the stored data. It \
     reproduces reliably.",
];

/// Pick `min(changes, 3)` distinct symptom reports from the pool.
///
/// Returns nothing when no change happened - a symptom without a bug would
/// send the player hunting for a defect that does not exist.
pub fn synthesize(changes: &[String], rng: &mut fastrand::Rng) -> Vec<String> {
    if changes.is_empty() {
        return Vec::new();
    }

    let mut indices: Vec<usize> = (0..SYMPTOM_POOL.len()).collect();
    rng.shuffle(&mut indices);

    indices
        .into_iter()
        .take(changes.len().min(MAX_SYNTHESIZED))
        .map(|i| SYMPTOM_POOL[i].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("change {}", i)).collect()
    }

    #[test]
    fn test_count_tracks_changes_up_to_cap() {
        let mut rng = fastrand::Rng::with_seed(11);
        assert_eq!(synthesize(&changes(1), &mut rng).len(), 1);
        assert_eq!(synthesize(&changes(2), &mut rng).len(), 2);
        assert_eq!(synthesize(&changes(3), &mut rng).len(), 3);
        assert_eq!(synthesize(&changes(7), &mut rng).len(), 3);
    }

    #[test]
    fn test_no_changes_no_symptoms() {
        let mut rng = fastrand::Rng::with_seed(11);
        assert!(synthesize(&[], &mut rng).is_empty());
    }

    #[test]
    fn test_symptoms_are_distinct() {
        let mut rng = fastrand::Rng::with_seed(3);
        let picked = synthesize(&changes(3), &mut rng);
        let mut sorted = picked.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), picked.len());
    }

    #[test]
    fn test_symptoms_never_quote_change_text() {
        let mut rng = fastrand::Rng::with_seed(5);
        let technical = vec!["Flipped a boolean literal in isActive".to_string()];
        for symptom in synthesize(&technical, &mut rng) {
            assert!(!symptom.contains("isActive"));
            assert!(!symptom.contains("boolean"));
        }
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let a = synthesize(&changes(3), &mut fastrand::Rng::with_seed(42));
        let b = synthesize(&changes(3), &mut fastrand::Rng::with_seed(42));
        assert_eq!(a, b);
    }
}
