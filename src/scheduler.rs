//! Maintains the `{cached, in-flight, absent}` invariant over a set of
//! visible [`Region`]s (spec.md §3.3/§4.3/§8.3).
//!
//! A settling step cancels workers for regions that stopped being
//! visible, spawns workers for visible regions that are neither cached
//! nor already in flight, and absorbs worker completions into the
//! cache. `settle` and `drain_completions` are split so tests can
//! interleave "a worker finished" with "settle ran again" without real
//! background threads — see [`SyncSubmitter`].

use crate::region::Region;
use crate::tile_cache::{Tile, TileCache};
use hashbrown::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Floor on the derived tile size, in pixels.
pub const MIN_SIZE: u32 = 100;
/// Target tile count per viewport axis when deriving tile size.
pub const TILES_PER_AXIS: u32 = 6;
/// Hysteresis factor: tile size only changes when the target departs
/// from the current size by more than this multiple.
pub const CHANGE_THRESHOLD: f64 = 1.8;
/// Floor on the cache's pixel-area budget.
pub const MIN_BUDGET: u64 = 10_000_000;
/// Budget multiplier applied to viewport area.
pub const BUDGET_MULT: u64 = 10;

/// A cooperative cancellation flag shared between the scheduler and a
/// render worker. Cloning shares the same underlying flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Whether `self` and `other` are clones of the same underlying
    /// token — i.e. they were handed out for the same worker, not merely
    /// two distinct, never-cancelled flags.
    fn is_same_worker(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A tile-producing function. Must respect `cancel` cooperatively and
/// return `None` on cancellation or render failure — the scheduler
/// treats both identically (spec.md §7).
pub type Renderer = Arc<dyn Fn(Region, &CancelToken) -> Option<Tile> + Send + Sync>;

/// The host-provided schedule-work primitive (spec.md §6): "submit(task)
/// -> handle; handle.cancel()". `cancel` is the handle; implementations
/// that want to track or delay work can hold onto it independently of
/// running `job`.
pub trait WorkSubmitter {
    /// Runs `job` to completion, eventually, however this submitter sees
    /// fit (inline, on a thread, on a pool). `cancel` is shared with the
    /// job itself and is provided here too so a submitter can correlate
    /// tasks with their cancellation handles.
    fn submit(&self, cancel: CancelToken, job: Box<dyn FnOnce() + Send>);
}

/// Default [`WorkSubmitter`]: one OS thread per task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPoolSubmitter;

impl WorkSubmitter for ThreadPoolSubmitter {
    fn submit(&self, _cancel: CancelToken, job: Box<dyn FnOnce() + Send>) {
        std::thread::spawn(job);
    }
}

/// A [`WorkSubmitter`] that runs jobs synchronously on the calling
/// thread, for deterministic tests that drive `settle`/`drain_completions`
/// without real concurrency.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncSubmitter;

impl WorkSubmitter for SyncSubmitter {
    fn submit(&self, _cancel: CancelToken, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// The host-provided viewport/content accessor (spec.md §6).
pub trait ViewportSource {
    /// Current viewport rect `(vx, vy, vw, vh)`, in content-space pixels.
    fn viewport(&self) -> (i64, i64, u32, u32);

    /// Content size `(cw, ch)`, in pixels.
    fn content_size(&self) -> (u32, u32);
}

/// A fixed `ViewportSource`, for tests and simple hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticViewport {
    /// Viewport left edge.
    pub vx: i64,
    /// Viewport top edge.
    pub vy: i64,
    /// Viewport width.
    pub vw: u32,
    /// Viewport height.
    pub vh: u32,
    /// Content width.
    pub cw: u32,
    /// Content height.
    pub ch: u32,
}

impl ViewportSource for StaticViewport {
    fn viewport(&self) -> (i64, i64, u32, u32) {
        (self.vx, self.vy, self.vw, self.vh)
    }

    fn content_size(&self) -> (u32, u32) {
        (self.cw, self.ch)
    }
}

fn align_down(v: i64, tile: i64) -> i64 {
    v.div_euclid(tile) * tile
}

/// Tile-start coordinates along one axis, with a one-tile read-ahead
/// margin on both ends, clipped to `[0, content)`.
fn axis_starts(v: i64, span: u32, content: u32, tile: u32) -> Vec<i64> {
    if tile == 0 || content == 0 {
        return Vec::new();
    }
    let tile_i = i64::from(tile);
    let first = align_down(v, tile_i) - tile_i;
    let end = v + i64::from(span) + tile_i;

    let mut starts = Vec::new();
    let mut x = first;
    while x < end {
        if x >= 0 && x < i64::from(content) {
            starts.push(x);
        }
        x += tile_i;
    }
    starts
}

/// Enumerates the regions that cover `viewport` (plus a one-tile
/// read-ahead margin) over `content` at `tile` granularity, at `scale`.
pub fn enumerate_regions(
    scale: f64,
    viewport: (i64, i64, u32, u32),
    content: (u32, u32),
    tile: (u32, u32),
) -> Vec<Region> {
    let (vx, vy, vw, vh) = viewport;
    let (cw, ch) = content;
    let (tw, th) = tile;

    let xs = axis_starts(vx, vw, cw, tw);
    let ys = axis_starts(vy, vh, ch, th);

    let mut regions = Vec::with_capacity(xs.len() * ys.len());
    for &y in &ys {
        let height = (i64::from(ch) - y).min(i64::from(th)) as u32;
        for &x in &xs {
            let width = (i64::from(cw) - x).min(i64::from(tw)) as u32;
            let region = Region::new(scale, x, y, width, height)
                .expect("enumerated tile geometry is always well-formed");
            regions.push(region);
        }
    }
    regions
}

fn target_tile_dimension(viewport_dim: u32) -> u32 {
    MIN_SIZE.max(viewport_dim / TILES_PER_AXIS)
}

fn departs_beyond_threshold(current: u32, target: u32) -> bool {
    let current = f64::from(current);
    let target = f64::from(target);
    target > current * CHANGE_THRESHOLD || target * CHANGE_THRESHOLD < current
}

fn budget_for_viewport(vw: u32, vh: u32) -> u64 {
    let area = u64::from(vw) * u64::from(vh);
    MIN_BUDGET.max(BUDGET_MULT * area)
}

/// Coordinates a [`TileCache`] against a changing set of visible
/// regions, driving background render workers through a
/// [`WorkSubmitter`].
pub struct TileScheduler<S: WorkSubmitter> {
    cache: TileCache,
    workers: HashMap<Region, CancelToken>,
    completion_tx: crossbeam_channel::Sender<(Region, CancelToken, Option<Tile>)>,
    completion_rx: crossbeam_channel::Receiver<(Region, CancelToken, Option<Tile>)>,
    submitter: S,
    renderer: Renderer,
    tile_size: (u32, u32),
}

impl<S: WorkSubmitter> TileScheduler<S> {
    /// Creates a scheduler with no cached or in-flight tiles, deriving
    /// its initial tile size and budget from `initial_viewport_dims`
    /// (`vw`, `vh`) with no hysteresis (there is no prior tile size to
    /// compare against).
    pub fn new(submitter: S, renderer: Renderer, initial_viewport_dims: (u32, u32)) -> Self {
        let (vw, vh) = initial_viewport_dims;
        let tile_size = (target_tile_dimension(vw), target_tile_dimension(vh));
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        Self {
            cache: TileCache::new(budget_for_viewport(vw, vh)),
            workers: HashMap::new(),
            completion_tx,
            completion_rx,
            submitter,
            renderer,
            tile_size,
        }
    }

    /// The cache backing this scheduler, for inspection.
    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Number of regions currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.workers.len()
    }

    /// Whether `region` currently has an in-flight worker.
    pub fn is_in_flight(&self, region: &Region) -> bool {
        self.workers.contains_key(region)
    }

    /// Current tile size `(tw, th)`.
    pub fn tile_size(&self) -> (u32, u32) {
        self.tile_size
    }

    fn apply_viewport_policy(&mut self, vw: u32, vh: u32) {
        let target = (target_tile_dimension(vw), target_tile_dimension(vh));
        if departs_beyond_threshold(self.tile_size.0, target.0)
            || departs_beyond_threshold(self.tile_size.1, target.1)
        {
            log::debug!(
                "tile size changing from {:?} to {:?}; clearing cache",
                self.tile_size,
                target
            );
            self.tile_size = target;
            self.cache.clear();
        }
        self.cache.set_max_pixel_count(budget_for_viewport(vw, vh));
    }

    /// Absorbs any worker completions received since the last call,
    /// committing accepted tiles to the cache. Returns the number of
    /// tiles newly cached.
    ///
    /// A completion is accepted only if its region is still tracked as
    /// in-flight *for the same worker that produced it* — comparing by
    /// region alone isn't enough, since a region can leave and re-enter
    /// VisibleSet between a worker's cancellation and its (discarded)
    /// completion arriving, by which point a fresh worker may already be
    /// tracked under the same region key. A completion whose token
    /// doesn't match the currently tracked worker is stale and dropped
    /// without touching `workers`, so the real worker's later completion
    /// still gets accepted; a render failure or cancellation (`None`)
    /// from the matching worker is dropped without touching the cache
    /// either way.
    pub fn drain_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok((region, worker_token, tile)) = self.completion_rx.try_recv() {
            let is_current = self
                .workers
                .get(&region)
                .is_some_and(|tracked| tracked.is_same_worker(&worker_token));
            if !is_current {
                log::debug!("discarding stale completion for {region:?}");
                continue;
            }
            self.workers.remove(&region);
            match tile {
                Some(tile) => {
                    self.cache.put(region, tile);
                    applied += 1;
                }
                None => {
                    log::debug!("render failed or was cancelled for {region:?}");
                }
            }
        }
        applied
    }

    /// Runs one settling step: absorbs pending completions, cancels
    /// workers for regions no longer visible, and spawns workers for
    /// visible regions that are neither cached nor already in flight.
    /// Returns the desired region set for this step.
    pub fn settle(&mut self, viewport: &dyn ViewportSource, scale: f64) -> Vec<Region> {
        self.drain_completions();

        let (vx, vy, vw, vh) = viewport.viewport();
        let content = viewport.content_size();
        self.apply_viewport_policy(vw, vh);

        let desired = enumerate_regions(scale, (vx, vy, vw, vh), content, self.tile_size);
        let desired_set: HashSet<Region> = desired.iter().copied().collect();

        let stale: Vec<Region> = self
            .workers
            .keys()
            .copied()
            .filter(|r| !desired_set.contains(r))
            .collect();
        for region in stale {
            if let Some(cancel) = self.workers.remove(&region) {
                cancel.cancel();
                log::debug!("cancelled in-flight render for {region:?}");
            }
        }

        for &region in &desired {
            if self.cache.contains(&region) || self.workers.contains_key(&region) {
                continue;
            }
            let cancel = CancelToken::new();
            self.workers.insert(region, cancel.clone());

            let renderer = Arc::clone(&self.renderer);
            let sender = self.completion_tx.clone();
            let job_cancel = cancel.clone();
            let worker_token = cancel.clone();
            self.submitter.submit(
                cancel,
                Box::new(move || {
                    let tile = renderer(region, &job_cancel);
                    let _ = sender.send((region, worker_token, tile));
                }),
            );
        }

        desired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn solid_renderer() -> Renderer {
        Arc::new(|region: Region, _cancel: &CancelToken| {
            Some(Tile::new(
                Arc::from(vec![0u8; region.area() as usize]),
                region.width(),
                region.height(),
            ))
        })
    }

    #[test]
    fn axis_starts_covers_viewport_with_one_tile_margin() {
        let xs = axis_starts(100, 50, 1000, 50);
        assert_eq!(xs.first().copied(), Some(50));
        assert!(xs.contains(&100));
        assert!(xs.last().copied().unwrap() <= 1000 - 1);
    }

    #[test]
    fn axis_starts_clips_to_content_bounds() {
        let xs = axis_starts(0, 40, 60, 50);
        assert!(xs.iter().all(|&x| x >= 0 && (x as u32) < 60));
    }

    #[test]
    fn enumerate_regions_produces_min_sized_edge_tiles() {
        let regions = enumerate_regions(1.0, (0, 0, 100, 100), (150, 150), (100, 100));
        assert!(regions
            .iter()
            .any(|r| r.x() == 100 && r.width() == 50));
    }

    #[test]
    fn tile_size_hysteresis_ignores_small_changes() {
        assert!(!departs_beyond_threshold(100, 120));
        assert!(departs_beyond_threshold(100, 200));
        assert!(departs_beyond_threshold(200, 100));
    }

    #[test]
    fn budget_floors_at_min_budget() {
        assert_eq!(budget_for_viewport(10, 10), MIN_BUDGET);
        assert_eq!(budget_for_viewport(2000, 2000), BUDGET_MULT * 4_000_000);
    }

    /// P11: a settling step never leaves a region both in-flight and
    /// cached at once.
    #[test]
    fn settle_never_leaves_region_both_in_flight_and_cached() {
        let mut scheduler =
            TileScheduler::new(SyncSubmitter, solid_renderer(), (200, 200));
        let viewport = StaticViewport {
            vx: 0,
            vy: 0,
            vw: 200,
            vh: 200,
            cw: 200,
            ch: 200,
        };

        let desired = scheduler.settle(&viewport, 1.0);
        for region in &desired {
            assert!(!(scheduler.is_in_flight(region) && scheduler.cache().contains(region)));
        }

        // Next settle drains the synchronously-completed renders into
        // the cache and stops re-spawning them.
        scheduler.settle(&viewport, 1.0);
        for region in &desired {
            assert!(scheduler.cache().contains(region));
            assert!(!scheduler.is_in_flight(region));
        }
    }

    /// P12: a region leaving VisibleSet while in flight is cancelled by
    /// the next settling step.
    #[test]
    fn region_leaving_visible_set_is_cancelled() {
        let recorded: Arc<Mutex<Vec<CancelToken>>> = Arc::new(Mutex::new(Vec::new()));
        struct RecordingSubmitter {
            recorded: Arc<Mutex<Vec<CancelToken>>>,
        }
        impl WorkSubmitter for RecordingSubmitter {
            fn submit(&self, cancel: CancelToken, _job: Box<dyn FnOnce() + Send>) {
                self.recorded.lock().unwrap().push(cancel);
            }
        }

        let submitter = RecordingSubmitter {
            recorded: Arc::clone(&recorded),
        };
        let mut scheduler = TileScheduler::new(submitter, solid_renderer(), (200, 200));

        let near_viewport = StaticViewport {
            vx: 0,
            vy: 0,
            vw: 200,
            vh: 200,
            cw: 2000,
            ch: 2000,
        };
        scheduler.settle(&near_viewport, 1.0);
        assert!(!recorded.lock().unwrap().is_empty());
        assert!(recorded.lock().unwrap().iter().all(|t| !t.is_cancelled()));

        let far_viewport = StaticViewport {
            vx: 1900,
            vy: 1900,
            vw: 50,
            vh: 50,
            cw: 2000,
            ch: 2000,
        };
        scheduler.settle(&far_viewport, 1.0);
        assert!(recorded.lock().unwrap().iter().any(|t| t.is_cancelled()));
    }

    #[test]
    fn cache_hit_prevents_respawning_a_worker() {
        let mut scheduler = TileScheduler::new(SyncSubmitter, solid_renderer(), (100, 100));
        let viewport = StaticViewport {
            vx: 0,
            vy: 0,
            vw: 100,
            vh: 100,
            cw: 100,
            ch: 100,
        };
        scheduler.settle(&viewport, 1.0);
        scheduler.settle(&viewport, 1.0);
        let in_flight_after_second = scheduler.in_flight_count();
        scheduler.settle(&viewport, 1.0);
        assert_eq!(in_flight_after_second, scheduler.in_flight_count());
    }

    /// Regression test: a region leaving and re-entering VisibleSet
    /// before its cancelled worker's completion is drained must not let
    /// that stale completion be mistaken for its successor's.
    #[test]
    fn stale_completion_from_a_cancelled_worker_does_not_clobber_its_successor() {
        #[derive(Clone, Default)]
        struct DeferredSubmitter {
            jobs: Arc<Mutex<Vec<(CancelToken, Box<dyn FnOnce() + Send>)>>>,
        }
        impl WorkSubmitter for DeferredSubmitter {
            fn submit(&self, cancel: CancelToken, job: Box<dyn FnOnce() + Send>) {
                self.jobs.lock().unwrap().push((cancel, job));
            }
        }

        let jobs: Arc<Mutex<Vec<(CancelToken, Box<dyn FnOnce() + Send>)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let submitter = DeferredSubmitter {
            jobs: Arc::clone(&jobs),
        };
        let mut scheduler = TileScheduler::new(submitter, solid_renderer(), (100, 100));

        let near = StaticViewport {
            vx: 0,
            vy: 0,
            vw: 100,
            vh: 100,
            cw: 100,
            ch: 100,
        };
        let far = StaticViewport {
            vx: 500,
            vy: 500,
            vw: 100,
            vh: 100,
            cw: 1000,
            ch: 1000,
        };

        let desired = scheduler.settle(&near, 1.0);
        assert_eq!(desired.len(), 1);
        let region = desired[0];

        // W1 is spawned for `region`; pull it out without running it yet.
        let (w1_token, w1_job) = jobs.lock().unwrap().pop().unwrap();
        assert!(scheduler.is_in_flight(&region));

        // `region` leaves the visible set: W1 is cancelled and untracked.
        scheduler.settle(&far, 1.0);
        assert!(w1_token.is_cancelled());
        assert!(!scheduler.is_in_flight(&region));

        // `region` becomes visible again: a fresh worker W2 is spawned.
        scheduler.settle(&near, 1.0);
        let (w2_token, w2_job) = jobs.lock().unwrap().pop().unwrap();
        assert!(!w2_token.is_same_worker(&w1_token));
        assert!(scheduler.is_in_flight(&region));

        // W1's stale completion arrives late; it must be discarded rather
        // than mistaken for W2's, or W2 would be forgotten entirely.
        w1_job();
        scheduler.drain_completions();
        assert!(
            scheduler.is_in_flight(&region),
            "W2 must still be tracked after W1's stale completion"
        );
        assert!(!scheduler.cache().contains(&region));

        // W2's real completion now arrives and is accepted normally.
        w2_job();
        scheduler.drain_completions();
        assert!(!scheduler.is_in_flight(&region));
        assert!(scheduler.cache().contains(&region));
    }

    #[test]
    fn failed_render_leaves_region_absent() {
        let renderer: Renderer = Arc::new(|_region, _cancel| None);
        let mut scheduler = TileScheduler::new(SyncSubmitter, renderer, (100, 100));
        let viewport = StaticViewport {
            vx: 0,
            vy: 0,
            vw: 100,
            vh: 100,
            cw: 100,
            ch: 100,
        };
        let desired = scheduler.settle(&viewport, 1.0);
        scheduler.settle(&viewport, 1.0);
        for region in &desired {
            assert!(!scheduler.cache().contains(region));
        }
    }
}
