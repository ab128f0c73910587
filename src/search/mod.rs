//! Search strategies and the coordinator that drives them.
//!
//! A search attempt picks one strategy up front:
//! - `scan`: single-threaded row-major sweep, needed for ordinal requests.
//! - `sweep`: the anchor span is tiled and each tile gets a worker.
//! - `blocks`: the target is tiled and each block of one anchor gets a worker.
//!
//! [`SearchCoordinator`] owns the worker pool and wraps attempts in a
//! capture-and-retry loop bounded by the request timeout.

pub(crate) mod blocks;
pub(crate) mod scan;
pub(crate) mod sweep;

use crate::candidate::NearMiss;
use crate::capture::RasterSource;
use crate::geometry::{Anchor, Rect, SearchRegion};
use crate::image::{PixelView, Raster, TargetImage};
use crate::kernel::{MatchParams, ToleranceBudget};
use crate::sync::{CohortState, Hit};
use crate::trace::{trace_debug, trace_event, trace_span, trace_warn};
use crate::util::{ScreenMatchError, ScreenMatchResult};
use rayon::ThreadPool;
use std::thread;
use std::time::{Duration, Instant};

/// Tunables shared by every search a coordinator runs.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Tiles per axis (`P`); sweeps use `P x P` tiles, block checks `P x P` blocks.
    pub pieces: usize,
    /// Use the parallel strategies; when false every search scans.
    pub parallel: bool,
    /// Threads in the worker pool.
    pub workers: usize,
    /// Tolerance used when a request does not set one.
    pub default_tolerance_percent: u8,
    /// Pause between failed attempts inside the timeout.
    pub retry_interval: Duration,
    /// Images with fewer pixels than this are compared as a single block.
    pub compare_block_threshold: usize,
}

impl SearchConfig {
    /// Largest accepted `pieces`; keeps `pieces x pieces` tiles well inside `usize`.
    pub const MAX_PIECES: usize = 256;
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            pieces: 4,
            parallel: true,
            workers: 16,
            default_tolerance_percent: 100,
            retry_interval: Duration::from_millis(100),
            compare_block_threshold: 100 * 100,
        }
    }
}

/// Which occurrence of the target a request asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Occurrence {
    /// The first occurrence found; parallel strategies return whichever
    /// worker reports first.
    #[default]
    First,
    /// Any occurrence, explicitly unordered.
    Any,
    /// The n-th occurrence (1-based) in row-major order.
    Nth(usize),
}

impl Occurrence {
    /// Maps the integer convention: `0` first, `-1` any, `n > 0` the n-th.
    pub fn from_index(index: i64) -> ScreenMatchResult<Self> {
        match index {
            0 => Ok(Self::First),
            -1 => Ok(Self::Any),
            n if n > 0 => usize::try_from(n)
                .map(Self::Nth)
                .map_err(|_| ScreenMatchError::InvalidInput("occurrence index too large")),
            _ => Err(ScreenMatchError::InvalidInput(
                "occurrence index must be -1, 0 or positive",
            )),
        }
    }

    fn ordinal(self) -> usize {
        match self {
            Self::First | Self::Any => 1,
            Self::Nth(n) => n.max(1),
        }
    }
}

/// Per-call search parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SearchRequest {
    /// Area to search; the whole raster when `None`.
    pub region: Option<SearchRegion>,
    pub occurrence: Occurrence,
    /// Share of target pixels that must match; the config default when `None`.
    pub tolerance_percent: Option<u8>,
    /// Rescue mismatches whose 8-neighborhood holds the exact target pixel.
    pub fuzzy: bool,
    /// How long [`SearchCoordinator::locate`] keeps re-capturing. Zero means
    /// a single attempt.
    pub timeout: Duration,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: SearchRegion) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn with_tolerance(mut self, percent: u8) -> Self {
        self.tolerance_percent = Some(percent);
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Strategy used for a search attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Single-threaded row-major scan.
    Scanner,
    /// Parallel sweep over tiles of the anchor span.
    AnchorSweep,
    /// Parallel verification over blocks of the target.
    BlockVerify,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scanner => "scanner",
            Self::AnchorSweep => "anchor_sweep",
            Self::BlockVerify => "block_verify",
        }
    }
}

/// Stages of one search attempt, as reported in logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    StrategySelected,
    CohortRunning,
    Matched,
    Exhausted,
}

impl SearchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::StrategySelected => "strategy_selected",
            Self::CohortRunning => "cohort_running",
            Self::Matched => "matched",
            Self::Exhausted => "exhausted",
        }
    }
}

fn enter_phase(phase: SearchPhase) {
    trace_debug!("search_phase", phase = phase.as_str());
}

/// Result of a search. Not finding the target is a normal outcome.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchOutcome {
    pub matched: bool,
    /// Top-left corner of the match in raster coordinates.
    pub anchor: Option<Anchor>,
    /// Mismatched pixels at the matched anchor.
    pub errors: usize,
    /// Best failed anchor, reported only when nothing matched.
    pub closest: Option<NearMiss>,
    pub strategy: Strategy,
    /// Captures made before the outcome was decided.
    pub attempts: usize,
    target_width: usize,
    target_height: usize,
}

impl MatchOutcome {
    fn from_pass(pass: Pass, strategy: Strategy, target: PixelView<'_>) -> Self {
        let mut outcome = Self::not_found(strategy, target);
        match pass.hit {
            Some(hit) => {
                outcome.matched = true;
                outcome.anchor = Some(hit.anchor);
                outcome.errors = hit.errors;
            }
            None => outcome.closest = pass.closest,
        }
        outcome
    }

    fn not_found(strategy: Strategy, target: PixelView<'_>) -> Self {
        Self {
            matched: false,
            anchor: None,
            errors: 0,
            closest: None,
            strategy,
            attempts: 1,
            target_width: target.width(),
            target_height: target.height(),
        }
    }

    /// Target-sized rectangle at the matched anchor.
    pub fn matched_rect(&self) -> Option<Rect> {
        self.anchor
            .map(|a| Rect::new(a.x, a.y, self.target_width, self.target_height))
    }
}

/// What a strategy produced for one attempt.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Pass {
    pub(crate) hit: Option<Hit>,
    pub(crate) closest: Option<NearMiss>,
    pub(crate) interrupted: bool,
}

impl Pass {
    pub(crate) fn hit(hit: Hit) -> Self {
        Self {
            hit: Some(hit),
            ..Self::default()
        }
    }

    pub(crate) fn miss(closest: Option<NearMiss>) -> Self {
        Self {
            closest,
            ..Self::default()
        }
    }

    pub(crate) fn interrupted() -> Self {
        Self {
            interrupted: true,
            ..Self::default()
        }
    }
}

/// Runs searches on a bounded worker pool.
///
/// The pool is created once and shared by every cohort, including the
/// nested sweeps of block verification.
pub struct SearchCoordinator {
    config: SearchConfig,
    pool: ThreadPool,
}

impl SearchCoordinator {
    /// Validates `config` and builds the worker pool.
    pub fn new(config: SearchConfig) -> ScreenMatchResult<Self> {
        if config.pieces == 0 {
            return Err(ScreenMatchError::InvalidInput("pieces must be at least 1"));
        }
        if config.pieces > SearchConfig::MAX_PIECES {
            return Err(ScreenMatchError::InvalidInput("pieces must be at most 256"));
        }
        if config.workers == 0 {
            return Err(ScreenMatchError::InvalidInput("workers must be at least 1"));
        }
        if config.default_tolerance_percent > 100 {
            return Err(ScreenMatchError::InvalidTolerance {
                percent: config.default_tolerance_percent,
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("screenmatch-worker-{i}"))
            .build()
            .map_err(|err| ScreenMatchError::WorkerPool {
                reason: err.to_string(),
            })?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Picks the strategy for a target of `target_pixels` in a raster of
    /// `raster_pixels`.
    pub fn select_strategy(
        &self,
        raster_pixels: usize,
        target_pixels: usize,
        occurrence: Occurrence,
    ) -> Strategy {
        if !self.config.parallel || matches!(occurrence, Occurrence::Nth(_)) {
            return Strategy::Scanner;
        }
        let tiles = self.config.pieces.saturating_mul(self.config.pieces).max(1);
        if target_pixels < raster_pixels / tiles {
            Strategy::AnchorSweep
        } else {
            Strategy::BlockVerify
        }
    }

    /// Searches one raster once.
    ///
    /// Fails only on configuration errors: a region with no area inside the
    /// raster, a target larger than the raster, or a bad tolerance. A target
    /// that does not fit the clipped region is simply not found.
    pub fn search(
        &self,
        raster: &Raster,
        target: &TargetImage,
        request: &SearchRequest,
    ) -> ScreenMatchResult<MatchOutcome> {
        let strategy = self.select_strategy(
            raster.width() * raster.height(),
            target.pixel_count(),
            request.occurrence,
        );
        self.run_strategy(strategy, raster, target, request)
    }

    /// Searches one raster once with an explicit strategy.
    ///
    /// `Occurrence::Nth` is only honored by [`Strategy::Scanner`]; the
    /// parallel strategies treat every occurrence as unordered.
    pub fn run_strategy(
        &self,
        strategy: Strategy,
        raster: &Raster,
        target: &TargetImage,
        request: &SearchRequest,
    ) -> ScreenMatchResult<MatchOutcome> {
        let _span = trace_span!("search", strategy = strategy.as_str()).entered();
        enter_phase(SearchPhase::Idle);

        let raster_view = raster.view();
        let target_view = target.view();
        if target.width() > raster.width() || target.height() > raster.height() {
            return Err(ScreenMatchError::TargetLargerThanRaster {
                target_width: target.width(),
                target_height: target.height(),
                raster_width: raster.width(),
                raster_height: raster.height(),
            });
        }
        let percent = request
            .tolerance_percent
            .unwrap_or(self.config.default_tolerance_percent);
        let budget = ToleranceBudget::from_percent(percent, target.pixel_count())?;
        trace_debug!(
            "tolerance_budget",
            percent = percent,
            budget = budget.errors(),
            pixels = target.pixel_count()
        );

        let region = request
            .region
            .unwrap_or_else(|| SearchRegion::full(raster.width(), raster.height()));
        let rect = region.clip(raster.width(), raster.height())?;
        let Some(span) = rect.anchor_span(target.width(), target.height()) else {
            trace_warn!(
                "target_exceeds_region",
                region_width = rect.width,
                region_height = rect.height,
                target_width = target.width(),
                target_height = target.height()
            );
            enter_phase(SearchPhase::Exhausted);
            return Ok(MatchOutcome::not_found(strategy, target_view));
        };

        enter_phase(SearchPhase::StrategySelected);
        trace_event!(
            "strategy_selected",
            strategy = strategy.as_str(),
            anchors = span.len()
        );

        let params = MatchParams {
            budget,
            fuzzy: request.fuzzy,
        };
        let pieces = self.config.pieces;
        let mut state = CohortState::new();
        enter_phase(SearchPhase::CohortRunning);
        let pass = match strategy {
            Strategy::Scanner => scan::scan(
                raster_view,
                target_view,
                span,
                params,
                request.occurrence.ordinal(),
            ),
            Strategy::AnchorSweep => sweep::sweep(
                &self.pool,
                &mut state,
                raster_view,
                target_view,
                span,
                params,
                pieces,
            ),
            Strategy::BlockVerify => blocks::verify_blocks(
                &self.pool,
                &mut state,
                raster_view,
                target_view,
                span,
                params,
                pieces,
            )?,
        };

        if pass.interrupted {
            trace_warn!("cohort_interrupted", strategy = strategy.as_str());
        }
        let outcome = MatchOutcome::from_pass(pass, strategy, target_view);
        if outcome.matched {
            enter_phase(SearchPhase::Matched);
        } else {
            enter_phase(SearchPhase::Exhausted);
            if let Some(near) = outcome.closest {
                trace_debug!(
                    "closest_near_miss",
                    x = near.anchor.x,
                    y = near.anchor.y,
                    percent = near.percent
                );
            }
        }
        Ok(outcome)
    }

    /// Captures and searches until the target is found or the request
    /// timeout runs out.
    ///
    /// Capture, codec and configuration errors end the loop immediately.
    pub fn locate<S>(
        &self,
        source: &mut S,
        target: &TargetImage,
        request: &SearchRequest,
    ) -> ScreenMatchResult<MatchOutcome>
    where
        S: RasterSource + ?Sized,
    {
        let deadline = Instant::now() + request.timeout;
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let raster = source.capture(request.region)?;
            let mut outcome = self.search(&raster, target, request)?;
            outcome.attempts = attempts;
            if outcome.matched || !self.pause_before_retry(deadline, attempts) {
                trace_event!(
                    "locate_done",
                    matched = outcome.matched,
                    attempts = attempts
                );
                return Ok(outcome);
            }
        }
    }

    /// Like [`locate`](Self::locate) for several candidate targets.
    ///
    /// Each capture is searched for the targets in order; the first one found
    /// wins. After the timeout, returns the unmatched outcome whose near miss
    /// came closest in the last capture, so its diagnostics survive. The index
    /// names the target the outcome belongs to.
    pub fn search_first_of<S>(
        &self,
        source: &mut S,
        targets: &[TargetImage],
        request: &SearchRequest,
    ) -> ScreenMatchResult<(usize, MatchOutcome)>
    where
        S: RasterSource + ?Sized,
    {
        if targets.is_empty() {
            return Err(ScreenMatchError::InvalidInput("no targets to search for"));
        }
        let deadline = Instant::now() + request.timeout;
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            let raster = source.capture(request.region)?;
            let mut closest: Option<(usize, MatchOutcome)> = None;
            for (index, target) in targets.iter().enumerate() {
                let mut outcome = self.search(&raster, target, request)?;
                outcome.attempts = attempts;
                if outcome.matched {
                    trace_event!("first_of_matched", index = index, attempts = attempts);
                    return Ok((index, outcome));
                }
                let replace = match &closest {
                    Some((_, best)) => closer(&outcome, best),
                    None => true,
                };
                if replace {
                    closest = Some((index, outcome));
                }
            }
            if !self.pause_before_retry(deadline, attempts) {
                return closest
                    .ok_or(ScreenMatchError::InvalidInput("no targets to search for"));
            }
        }
    }

    /// Sleeps before the next attempt; `false` once the deadline has passed.
    fn pause_before_retry(&self, deadline: Instant, attempts: usize) -> bool {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let pause = self.config.retry_interval.min(deadline - now);
        let pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX);
        trace_debug!("retry", attempts = attempts, pause_ms = pause_ms);
        thread::sleep(pause);
        true
    }

    /// Compares two equally sized images pixel by pixel.
    ///
    /// `tolerance_percent` is the share of pixels that must match. Images of
    /// different sizes never match; a tolerance of 0 always matches.
    pub fn compare_images(
        &self,
        a: PixelView<'_>,
        b: PixelView<'_>,
        tolerance_percent: u8,
    ) -> ScreenMatchResult<bool> {
        if a.width() != b.width() || a.height() != b.height() {
            return Ok(false);
        }
        let budget = ToleranceBudget::from_percent(tolerance_percent, b.pixel_count())?;
        if tolerance_percent == 0 {
            return Ok(true);
        }
        let pieces = if b.pixel_count() < self.config.compare_block_threshold {
            1
        } else {
            self.config.pieces
        };
        let plan = blocks::BlockPlan::new(b, pieces)?;
        let params = MatchParams {
            budget,
            fuzzy: false,
        };
        let mut state = CohortState::new();
        let verdict =
            blocks::verify_anchor(&self.pool, &mut state, a, &plan, Anchor::new(0, 0), params);
        match verdict {
            blocks::Verification::Accepted(_) => Ok(true),
            blocks::Verification::Rejected => Ok(false),
            blocks::Verification::Interrupted => {
                trace_warn!("compare_interrupted", pieces = pieces);
                Ok(false)
            }
        }
    }
}

/// `true` if `outcome` came strictly closer than `best`; earlier targets win ties.
fn closer(outcome: &MatchOutcome, best: &MatchOutcome) -> bool {
    match (outcome.closest, best.closest) {
        (Some(near), Some(best)) => near.percent > best.percent,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{Occurrence, SearchConfig, SearchCoordinator, Strategy};
    use crate::util::ScreenMatchError;

    fn coordinator() -> SearchCoordinator {
        SearchCoordinator::new(SearchConfig {
            workers: 4,
            ..SearchConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn occurrence_index_convention() {
        assert_eq!(Occurrence::from_index(0).unwrap(), Occurrence::First);
        assert_eq!(Occurrence::from_index(-1).unwrap(), Occurrence::Any);
        assert_eq!(Occurrence::from_index(3).unwrap(), Occurrence::Nth(3));
        assert!(Occurrence::from_index(-2).is_err());
    }

    #[test]
    fn strategy_selection_order() {
        let c = coordinator();
        // 64x64 raster with P = 4: one tile's share is 256 pixels.
        assert_eq!(c.select_strategy(4096, 255, Occurrence::First), Strategy::AnchorSweep);
        assert_eq!(c.select_strategy(4096, 256, Occurrence::Any), Strategy::BlockVerify);
        assert_eq!(c.select_strategy(4096, 16, Occurrence::Nth(2)), Strategy::Scanner);

        let serial = SearchCoordinator::new(SearchConfig {
            parallel: false,
            workers: 1,
            ..SearchConfig::default()
        })
        .unwrap();
        assert_eq!(serial.select_strategy(4096, 16, Occurrence::Any), Strategy::Scanner);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = SearchCoordinator::new(SearchConfig {
            pieces: 0,
            ..SearchConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ScreenMatchError::InvalidInput(_)));

        let err = SearchCoordinator::new(SearchConfig {
            default_tolerance_percent: 120,
            ..SearchConfig::default()
        })
        .err()
        .unwrap();
        assert_eq!(err, ScreenMatchError::InvalidTolerance { percent: 120 });
    }

    #[test]
    fn oversized_pieces_are_rejected() {
        for pieces in [SearchConfig::MAX_PIECES + 1, 1 << 20, usize::MAX] {
            let err = SearchCoordinator::new(SearchConfig {
                pieces,
                workers: 2,
                ..SearchConfig::default()
            })
            .err()
            .unwrap();
            assert!(matches!(err, ScreenMatchError::InvalidInput(_)));
        }

        let coordinator = SearchCoordinator::new(SearchConfig {
            pieces: SearchConfig::MAX_PIECES,
            workers: 2,
            ..SearchConfig::default()
        })
        .unwrap();
        assert_eq!(
            coordinator.select_strategy(4096, 16, Occurrence::First),
            Strategy::BlockVerify
        );
    }
}
