use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::DuplicateMap;
use crate::comparison::{cache_key, ComparisonStrategy, PixelMetricStrategy};
use crate::error::{Error, Result};
use crate::fingerprint::fingerprint;
use crate::logging::log_comparison_error;
use crate::persistence::MemoizedResultStore;
use crate::types::{ComparisonMode, ImageRef, PairwiseResult};
use crate::workspace::Workspace;

/// Counters of the work a driver has done since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Pairs aggregated across all strategies
    pub pairs_evaluated: usize,
    /// Live `calculate_difference` calls
    pub strategy_evaluations: usize,
    pub cache_hits: usize,
    /// Evaluations that failed and were scored 1.0
    pub comparison_failures: usize,
    pub persist_failures: usize,
}

#[derive(Debug, Default)]
struct StatsCounters {
    pairs_evaluated: AtomicUsize,
    strategy_evaluations: AtomicUsize,
    cache_hits: AtomicUsize,
    comparison_failures: AtomicUsize,
    persist_failures: AtomicUsize,
}

impl StatsCounters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DriverStats {
        DriverStats {
            pairs_evaluated: self.pairs_evaluated.load(Ordering::Relaxed),
            strategy_evaluations: self.strategy_evaluations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            comparison_failures: self.comparison_failures.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

/// Where pair evaluation runs
enum Parallelism {
    /// The rayon global pool
    Global,
    /// One pair at a time on the calling thread
    Sequential,
    Pool(rayon::ThreadPool),
}

/// Normalized input of one strategy for one image
#[derive(Debug)]
struct Artifact {
    path: PathBuf,
    /// Only computed when a result store is attached
    fingerprint: Option<String>,
}

/// An admitted image with one artifact slot per registered strategy
struct Prepared {
    image: ImageRef,
    artifacts: Vec<std::result::Result<Artifact, String>>,
}

/// Runs every registered strategy over the pairs of a batch
pub struct PairwiseComparisonDriver {
    strategies: Vec<Arc<dyn ComparisonStrategy>>,
    workspace: Arc<Workspace>,
    store: Option<Arc<MemoizedResultStore>>,
    chunk_size: Option<usize>,
    parallelism: Parallelism,
    show_progress: bool,
    stats: StatsCounters,
}

impl PairwiseComparisonDriver {
    /// Driver with the default pixel strategy, chunks of 8 and no result store
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            strategies: vec![Arc::new(PixelMetricStrategy::default())],
            workspace,
            store: None,
            chunk_size: Some(8),
            parallelism: Parallelism::Global,
            show_progress: false,
            stats: StatsCounters::default(),
        }
    }

    /// Replace the registered strategies; they run in the given order
    pub fn with_strategies(mut self, strategies: Vec<Arc<dyn ComparisonStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_store(mut self, store: Option<Arc<MemoizedResultStore>>) -> Self {
        self.store = store;
        self
    }

    /// `None` compares every pair of the batch
    pub fn with_chunk_size(mut self, chunk_size: Option<usize>) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// 0 uses the global rayon pool, 1 runs on the calling thread
    pub fn with_threads(mut self, threads: usize) -> Result<Self> {
        self.parallelism = match threads {
            0 => Parallelism::Global,
            1 => Parallelism::Sequential,
            n => Parallelism::Pool(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::Configuration(format!("Failed to build thread pool: {}", e)))?,
            ),
        };
        Ok(self)
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn strategies(&self) -> &[Arc<dyn ComparisonStrategy>] {
        &self.strategies
    }

    pub fn store(&self) -> Option<&Arc<MemoizedResultStore>> {
        self.store.as_ref()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn stats(&self) -> DriverStats {
        self.stats.snapshot()
    }

    /// Drop repeated references and images that do not exist, keeping input order
    ///
    /// References are compared by canonical path, so `dir/sub/../a.png` and
    /// `dir/a.png` are one image; the first spelling is kept.
    pub fn admit(&self, images: &[ImageRef]) -> Vec<ImageRef> {
        let mut seen = HashSet::new();
        images
            .iter()
            .filter(|image| seen.insert(ImageRef::resolve(image)))
            .filter(|image| {
                if image.exists() {
                    true
                } else {
                    warn!("{}", Error::InputNotFound(image.path().to_path_buf()));
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// Score the pairs of a batch
    ///
    /// Pairs are `(i, j)` with `i < j` in input order, never self pairs. When
    /// the batch is larger than the chunk size, pairs are first evaluated
    /// within each chunk; every image that took part in a within-threshold
    /// pair is then compared against every other such image. A cross-chunk
    /// duplicate neither of whose images matched inside its own chunk is not
    /// found. The returned list holds every pair evaluated in either phase.
    pub fn compare_all(&self, images: &[ImageRef], threshold: f64) -> Result<Vec<PairwiseResult>> {
        self.compare(images, threshold, self.chunk_size)
    }

    /// Score every pair of a batch, regardless of the chunk size
    pub fn compare_every_pair(&self, images: &[ImageRef], threshold: f64) -> Result<Vec<PairwiseResult>> {
        self.compare(images, threshold, None)
    }

    fn compare(&self, images: &[ImageRef], threshold: f64, chunk_size: Option<usize>) -> Result<Vec<PairwiseResult>> {
        if threshold.is_nan() || threshold < 0.0 {
            return Err(Error::Configuration(format!(
                "Threshold must be a non-negative number, got {}",
                threshold
            )));
        }

        let start = Instant::now();
        let admitted = self.admit(images);
        let prepared = self.prepare(admitted);
        let all: Vec<usize> = (0..prepared.len()).collect();

        let progress = self.progress_bar();
        let mut scores: HashMap<(usize, usize), f64> = HashMap::new();

        match chunk_size {
            Some(size) if prepared.len() > size => {
                let first_pass: Vec<(usize, usize)> = all.chunks(size.max(2)).flat_map(pairs_of).collect();
                self.evaluate_into(&first_pass, &prepared, threshold, &progress, &mut scores);

                let candidates: BTreeSet<usize> = scores
                    .iter()
                    .filter(|(_, &score)| score <= threshold)
                    .flat_map(|(&(i, j), _)| [i, j])
                    .collect();
                let candidates: Vec<usize> = candidates.into_iter().collect();
                debug!(
                    "Chunked pass found {} candidate images among {}",
                    candidates.len(),
                    prepared.len()
                );

                let second_pass: Vec<(usize, usize)> = pairs_of(&candidates)
                    .into_iter()
                    .filter(|pair| !scores.contains_key(pair))
                    .collect();
                self.evaluate_into(&second_pass, &prepared, threshold, &progress, &mut scores);
            }
            _ => {
                self.evaluate_into(&pairs_of(&all), &prepared, threshold, &progress, &mut scores);
            }
        }
        progress.finish_and_clear();

        let mut evaluated: Vec<((usize, usize), f64)> = scores.into_iter().collect();
        evaluated.sort_by_key(|(pair, _)| *pair);

        info!(
            "Compared {} pairs across {} images in {:.2?}",
            evaluated.len(),
            prepared.len(),
            start.elapsed()
        );

        Ok(evaluated
            .into_iter()
            .map(|((i, j), score)| PairwiseResult {
                left: prepared[i].image.clone(),
                right: prepared[j].image.clone(),
                score,
            })
            .collect())
    }

    /// Within-threshold pairs of a batch as a symmetric map, using the
    /// chunked pass of [`compare_all`](Self::compare_all)
    pub fn duplicate_map(&self, images: &[ImageRef], threshold: f64) -> Result<DuplicateMap> {
        let results = self.compare_all(images, threshold)?;
        Ok(DuplicateMap::from_results(&results, threshold))
    }

    /// Like [`duplicate_map`](Self::duplicate_map) but over every pair
    pub fn exhaustive_duplicate_map(&self, images: &[ImageRef], threshold: f64) -> Result<DuplicateMap> {
        let results = self.compare_every_pair(images, threshold)?;
        Ok(DuplicateMap::from_results(&results, threshold))
    }

    /// Normalize every admitted image once per strategy
    fn prepare(&self, images: Vec<ImageRef>) -> Vec<Prepared> {
        let prepare_one = |image: ImageRef| {
            let artifacts = self
                .strategies
                .iter()
                .map(|strategy| self.artifact(strategy.as_ref(), &image))
                .collect();
            Prepared { image, artifacts }
        };

        match &self.parallelism {
            Parallelism::Sequential => images.into_iter().map(prepare_one).collect(),
            Parallelism::Global => images.into_par_iter().map(prepare_one).collect(),
            Parallelism::Pool(pool) => pool.install(|| images.into_par_iter().map(prepare_one).collect()),
        }
    }

    fn artifact(&self, strategy: &dyn ComparisonStrategy, image: &ImageRef) -> std::result::Result<Artifact, String> {
        let path = strategy
            .normalizers()
            .normalize(image.path(), &self.workspace)
            .map_err(|e| e.to_string())?;
        let fingerprint = match self.store {
            Some(_) => Some(fingerprint(&path).map_err(|e| e.to_string())?),
            None => None,
        };
        Ok(Artifact { path, fingerprint })
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
        {
            progress.set_style(style.progress_chars("##-"));
        }
        progress.set_message("Comparing pairs...");
        progress
    }

    fn evaluate_into(
        &self,
        pairs: &[(usize, usize)],
        prepared: &[Prepared],
        threshold: f64,
        progress: &ProgressBar,
        scores: &mut HashMap<(usize, usize), f64>,
    ) {
        progress.inc_length(pairs.len() as u64);

        let score_pair = |&(i, j): &(usize, usize)| {
            let score = self.evaluate_pair(&prepared[i], &prepared[j], threshold);
            progress.inc(1);
            ((i, j), score)
        };

        let results: Vec<((usize, usize), f64)> = match &self.parallelism {
            Parallelism::Sequential => pairs.iter().map(score_pair).collect(),
            Parallelism::Global => pairs.par_iter().map(score_pair).collect(),
            Parallelism::Pool(pool) => pool.install(|| pairs.par_iter().map(score_pair).collect()),
        };
        scores.extend(results);
    }

    /// Aggregate every strategy's score for one pair
    fn evaluate_pair(&self, left: &Prepared, right: &Prepared, threshold: f64) -> f64 {
        StatsCounters::bump(&self.stats.pairs_evaluated);

        let mut passthrough_sum = 0.0;
        let mut passthrough_count = 0usize;

        for (slot, strategy) in self.strategies.iter().enumerate() {
            let score = match self.strategy_score(strategy.as_ref(), slot, left, right, threshold) {
                Ok(score) => score,
                Err(e) => {
                    StatsCounters::bump(&self.stats.comparison_failures);
                    log_comparison_error(strategy.identity(), left.image.path(), right.image.path(), &e);
                    1.0
                }
            };

            match strategy.mode() {
                ComparisonMode::Strict if score <= threshold => return score,
                ComparisonMode::Strict => {}
                ComparisonMode::Passthrough => {
                    passthrough_sum += score;
                    passthrough_count += 1;
                }
            }
        }

        if passthrough_count == 0 {
            0.0
        } else {
            passthrough_sum / passthrough_count as f64
        }
    }

    fn strategy_score(
        &self,
        strategy: &dyn ComparisonStrategy,
        slot: usize,
        left: &Prepared,
        right: &Prepared,
        threshold: f64,
    ) -> Result<f64> {
        let failed = |reason: &str| Error::ComparisonFailed {
            strategy: strategy.identity().to_string(),
            left: left.image.path().to_path_buf(),
            right: right.image.path().to_path_buf(),
            reason: reason.to_string(),
        };
        let left_artifact = left.artifacts[slot].as_ref().map_err(|reason| failed(reason.as_str()))?;
        let right_artifact = right.artifacts[slot].as_ref().map_err(|reason| failed(reason.as_str()))?;

        let compute = || {
            StatsCounters::bump(&self.stats.strategy_evaluations);
            strategy.calculate_difference(
                &left_artifact.path,
                &right_artifact.path,
                left.image.path(),
                right.image.path(),
                threshold,
            )
        };

        let (Some(store), Some(left_fp), Some(right_fp)) = (
            self.store.as_ref(),
            left_artifact.fingerprint.as_deref(),
            right_artifact.fingerprint.as_deref(),
        ) else {
            return compute();
        };

        let key = cache_key(strategy, left_fp, right_fp, threshold);
        let memoized = store.get_or_compute(&key, compute)?;
        if memoized.hit {
            StatsCounters::bump(&self.stats.cache_hits);
        }
        if memoized.persist_error.is_some() {
            StatsCounters::bump(&self.stats.persist_failures);
        }
        Ok(memoized.value)
    }
}

/// All `(a, b)` with `a` before `b` in `indices`
fn pairs_of(indices: &[usize]) -> Vec<(usize, usize)> {
    indices
        .iter()
        .enumerate()
        .flat_map(|(n, &i)| indices[n + 1..].iter().map(move |&j| (i, j)))
        .collect()
}
