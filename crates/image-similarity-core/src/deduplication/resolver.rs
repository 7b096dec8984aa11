use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use super::{HeaderSizeReader, ImageSizeReader};
use crate::types::{ImageRef, PairwiseResult, PreferencePolicy};

/// Within-threshold edges between images, stored in both directions
#[derive(Debug, Clone, Default)]
pub struct DuplicateMap {
    edges: HashMap<ImageRef, BTreeMap<ImageRef, f64>>,
}

impl DuplicateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the pairs scoring at or below `threshold`
    pub fn from_results(results: &[PairwiseResult], threshold: f64) -> Self {
        let mut map = Self::new();
        for result in results.iter().filter(|r| r.is_within(threshold)) {
            map.insert(&result.left, &result.right, result.score);
        }
        map
    }

    /// Record an edge; self edges are ignored
    pub fn insert(&mut self, left: &ImageRef, right: &ImageRef, score: f64) {
        if left == right {
            return;
        }
        self.edges
            .entry(left.clone())
            .or_default()
            .insert(right.clone(), score);
        self.edges
            .entry(right.clone())
            .or_default()
            .insert(left.clone(), score);
    }

    pub fn contains(&self, image: &ImageRef) -> bool {
        self.edges.contains_key(image)
    }

    /// Partners of `image` in path order
    pub fn partners(&self, image: &ImageRef) -> Option<&BTreeMap<ImageRef, f64>> {
        self.edges.get(image)
    }

    pub fn score(&self, left: &ImageRef, right: &ImageRef) -> Option<f64> {
        self.edges.get(left)?.get(right).copied()
    }

    /// Every image with at least one partner, sorted
    pub fn duplicates(&self) -> Vec<ImageRef> {
        let mut images: Vec<ImageRef> = self.edges.keys().cloned().collect();
        images.sort();
        images
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Picks one survivor per duplicate cluster
pub struct DuplicateResolver {
    size_reader: Arc<dyn ImageSizeReader>,
}

impl DuplicateResolver {
    pub fn new(size_reader: Arc<dyn ImageSizeReader>) -> Self {
        Self { size_reader }
    }

    pub fn size_reader(&self) -> &Arc<dyn ImageSizeReader> {
        &self.size_reader
    }

    /// Reduce `images` to a duplicate-free set
    ///
    /// Duplicates are visited in input order. A duplicate that was already
    /// picked, or one with an already picked partner, is skipped; otherwise
    /// one survivor is chosen from it and its partners. Images without
    /// partners are kept as they are. The result is sorted.
    pub fn resolve(&self, images: &[ImageRef], map: &DuplicateMap, policy: PreferencePolicy) -> Vec<ImageRef> {
        let mut seen = HashSet::new();
        let mut picked: BTreeSet<ImageRef> = BTreeSet::new();
        let mut kept: BTreeSet<ImageRef> = BTreeSet::new();

        for image in images.iter().filter(|image| seen.insert((*image).clone())) {
            let Some(partners) = map.partners(image) else {
                kept.insert(image.clone());
                continue;
            };
            if picked.contains(image) || partners.keys().any(|partner| picked.contains(partner)) {
                continue;
            }

            let survivor = self.preferred_pick(image, partners, policy);
            debug!(
                "Cluster of {} around {} resolved to {}",
                partners.len() + 1,
                image,
                survivor
            );
            picked.insert(survivor);
        }

        kept.extend(picked);
        kept.into_iter().collect()
    }

    /// Choose among `origin` and its partners
    ///
    /// Candidates are partners in path order followed by `origin`, ranked by
    /// a policy key with a stable sort, so ties go to the first partner.
    /// Under the difference policies `origin` has no score of its own and
    /// ranks last. `Any` keeps `origin`.
    pub fn preferred_pick(
        &self,
        origin: &ImageRef,
        partners: &BTreeMap<ImageRef, f64>,
        policy: PreferencePolicy,
    ) -> ImageRef {
        if policy == PreferencePolicy::Any {
            return origin.clone();
        }

        let key = |candidate: &ImageRef, score: Option<f64>| -> f64 {
            match policy {
                PreferencePolicy::Any => 0.0,
                PreferencePolicy::PreferLargerImage | PreferencePolicy::PreferSmallerImage => {
                    self.size_reader.area(candidate.path()) as f64
                }
                PreferencePolicy::PreferLowerDifference => score.unwrap_or(f64::INFINITY),
                PreferencePolicy::PreferLargerDifference => score.unwrap_or(f64::NEG_INFINITY),
            }
        };

        let mut candidates: Vec<(&ImageRef, f64)> = partners
            .iter()
            .map(|(partner, &score)| (partner, key(partner, Some(score))))
            .collect();
        candidates.push((origin, key(origin, None)));

        match policy {
            PreferencePolicy::Any => {}
            PreferencePolicy::PreferSmallerImage | PreferencePolicy::PreferLowerDifference => {
                candidates.sort_by(|a, b| a.1.total_cmp(&b.1))
            }
            PreferencePolicy::PreferLargerImage | PreferencePolicy::PreferLargerDifference => {
                candidates.sort_by(|a, b| b.1.total_cmp(&a.1))
            }
        }

        candidates[0].0.clone()
    }
}

impl Default for DuplicateResolver {
    fn default() -> Self {
        Self::new(Arc::new(HeaderSizeReader::new()))
    }
}
