use rand::seq::IndexedRandom;
use rand::Rng;

/// Stand-in detector for deployments without a trained model artifact.
/// Manufactures a plausible basket so the serving pipeline and clients can
/// be exercised end to end.
pub struct MockDetector {
    catalog_ids: Vec<i64>,
}

impl MockDetector {
    pub fn new(catalog_ids: Vec<i64>) -> Self {
        Self { catalog_ids }
    }

    /// Picks 1-3 distinct catalog ids and repeats each 1-3 times, like a
    /// detector seeing several units of a few products. Never empty.
    pub fn detect(&self) -> Vec<i64> {
        let mut rng = rand::rng();
        let distinct = rng.random_range(1..=self.catalog_ids.len().min(3));
        let mut detected = Vec::new();
        for &id in self.catalog_ids.choose_multiple(&mut rng, distinct) {
            let quantity = rng.random_range(1..=3);
            detected.extend(std::iter::repeat(id).take(quantity));
        }
        detected
    }
}
