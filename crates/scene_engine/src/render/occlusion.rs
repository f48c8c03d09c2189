//! Occlusion query state
//!
//! Every drawable carries an [`Occlusion`] that its geometry stage drives
//! through a small counter:
//!
//! - `1`: ready, the next [`Occlusion::begin`] issues a query
//! - `0`: query open, waiting for [`Occlusion::end`]
//! - `-1`: query closed, waiting for [`Occlusion::fetch`]
//! - `n > 1`: result reused for `n - 1` more passes before re-querying
//!
//! A query never outlives the device that created it: [`QueryLease`]
//! destroys its handle on drop.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::device::{QueryHandle, RenderDevice};

/// Query object owned by one drawable
pub struct QueryLease {
    device: Arc<dyn RenderDevice>,
    handle: QueryHandle,
}

impl QueryLease {
    /// Create a query on `device`; `None` (logged) when creation fails
    pub fn create(device: &Arc<dyn RenderDevice>) -> Option<Self> {
        match device.create_query() {
            Ok(handle) => Some(Self {
                device: Arc::clone(device),
                handle,
            }),
            Err(e) => {
                log::error!("Failed to create occlusion query: {e}");
                None
            }
        }
    }

    /// Device handle
    pub fn handle(&self) -> QueryHandle {
        self.handle
    }
}

impl Drop for QueryLease {
    fn drop(&mut self) {
        self.device.destroy_query(self.handle);
    }
}

impl fmt::Debug for QueryLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueryLease").field(&self.handle).finish()
    }
}

/// Count of one stage's queries that were issued and not fetched yet.
///
/// Each issued query holds a claim on the budget until its drawable
/// fetches the result, resets, or is dropped, so queries left behind by
/// culled or removed drawables still count.
#[derive(Debug, Clone, Default)]
pub struct QueryBudget {
    outstanding: Arc<AtomicUsize>,
}

impl QueryBudget {
    /// Empty budget
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries issued and not fetched yet
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    fn claim(&self) -> QueryClaim {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        QueryClaim {
            outstanding: Arc::clone(&self.outstanding),
        }
    }
}

#[derive(Debug)]
struct QueryClaim {
    outstanding: Arc<AtomicUsize>,
}

impl Drop for QueryClaim {
    fn drop(&mut self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Outcome of [`Occlusion::begin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// A query was opened; draw the proxy, then call [`Occlusion::end`]
    Issued,
    /// The last result is still trusted
    Cached(bool),
    /// A previous query has not been fetched yet
    Pending,
    /// No query object could be created
    Unavailable,
}

/// Occlusion query state of one drawable
#[derive(Debug)]
pub struct Occlusion {
    query: Option<QueryLease>,
    satisfied: i32,
    fragments: Option<u64>,
    claim: Option<QueryClaim>,
}

impl Default for Occlusion {
    fn default() -> Self {
        Self {
            query: None,
            satisfied: 1,
            fragments: None,
            claim: None,
        }
    }
}

impl Occlusion {
    /// Fresh state: no query, visible, ready to issue
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw counter value
    pub fn satisfied(&self) -> i32 {
        self.satisfied
    }

    /// Samples counted by the last fetched query
    pub fn fragments(&self) -> Option<u64> {
        self.fragments
    }

    /// Visibility from the last fetched result; visible until a query says otherwise
    pub fn visible(&self) -> bool {
        self.fragments.map_or(true, |f| f > 0)
    }

    /// Whether a query object exists
    pub fn has_query(&self) -> bool {
        self.query.is_some()
    }

    /// Whether a query was issued and not fetched yet
    pub fn in_flight(&self) -> bool {
        self.satisfied <= 0
    }

    /// Whether the next `begin` opens a new query
    pub fn is_due(&self) -> bool {
        self.satisfied == 1
    }

    /// Open a query, or report why none was opened
    pub fn begin(&mut self, device: &Arc<dyn RenderDevice>) -> QueryStatus {
        if self.query.is_none() {
            self.query = QueryLease::create(device);
        }
        let Some(query) = &self.query else {
            return QueryStatus::Unavailable;
        };

        match self.satisfied {
            1 => {
                self.satisfied = 0;
                device.begin_query(query.handle());
                QueryStatus::Issued
            }
            n if n > 1 => {
                self.satisfied -= 1;
                QueryStatus::Cached(self.visible())
            }
            _ => QueryStatus::Pending,
        }
    }

    /// Close an open query; false when none was open
    pub fn end(&mut self, device: &dyn RenderDevice) -> bool {
        match (&self.query, self.satisfied) {
            (Some(query), 0) => {
                device.end_query(query.handle());
                self.satisfied = -1;
                true
            }
            _ => {
                log::warn!("Occlusion end without an open query (state {})", self.satisfied);
                false
            }
        }
    }

    /// Count the query in flight against `budget` until it is fetched
    pub fn charge(&mut self, budget: &QueryBudget) {
        if self.in_flight() {
            self.claim = Some(budget.claim());
        }
    }

    /// Read back a closed query.
    ///
    /// Returns `1` (visible) or `0` (occluded) and re-arms the counter to
    /// `1 + stall(fragments)`. Returns `-1` when the result is not ready yet
    /// or no closed query exists; the state is left unchanged.
    pub fn fetch(&mut self, device: &dyn RenderDevice, stall: impl FnOnce(u64) -> u32) -> i32 {
        if self.satisfied != -1 {
            return -1;
        }
        let Some(query) = &self.query else {
            return -1;
        };
        let Some(fragments) = device.query_result(query.handle()) else {
            return -1;
        };

        self.fragments = Some(fragments);
        self.claim = None;
        let skips = i32::try_from(stall(fragments)).unwrap_or(i32::MAX - 1);
        self.satisfied = 1 + skips;
        i32::from(fragments > 0)
    }

    /// Drop the query object and forget the last result
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDevice;

    fn devices() -> (Arc<HeadlessDevice>, Arc<dyn RenderDevice>) {
        let headless = Arc::new(HeadlessDevice::new());
        let device: Arc<dyn RenderDevice> = headless.clone();
        (headless, device)
    }

    #[test]
    fn test_full_cycle() {
        let (_headless, device) = devices();
        let mut occlusion = Occlusion::new();
        assert!(occlusion.visible());

        assert_eq!(occlusion.begin(&device), QueryStatus::Issued);
        assert_eq!(occlusion.satisfied(), 0);
        assert!(occlusion.end(device.as_ref()));
        assert_eq!(occlusion.satisfied(), -1);

        // No draws inside the query: zero samples
        assert_eq!(occlusion.fetch(device.as_ref(), |_| 2), 0);
        assert_eq!(occlusion.satisfied(), 3);
        assert!(!occlusion.visible());

        assert_eq!(occlusion.begin(&device), QueryStatus::Cached(false));
        assert_eq!(occlusion.begin(&device), QueryStatus::Cached(false));
        assert_eq!(occlusion.satisfied(), 1);
        assert_eq!(occlusion.begin(&device), QueryStatus::Issued);
    }

    #[test]
    fn test_fetch_reports_visible_samples() {
        let (_headless, device) = devices();
        let mut occlusion = Occlusion::new();

        occlusion.begin(&device);
        device.draw_proxy(&crate::spatial::Aabb::unit(), &[0.0; 16]);
        occlusion.end(device.as_ref());

        assert_eq!(occlusion.fetch(device.as_ref(), |f| u32::from(f > 50)), 1);
        assert_eq!(occlusion.fragments(), Some(100));
        assert_eq!(occlusion.satisfied(), 2);
    }

    #[test]
    fn test_fetch_not_ready_keeps_state() {
        let (headless, device) = devices();
        headless.set_deferred_results(true);
        let mut occlusion = Occlusion::new();

        occlusion.begin(&device);
        occlusion.end(device.as_ref());
        assert_eq!(occlusion.fetch(device.as_ref(), |_| 0), -1);
        assert_eq!(occlusion.satisfied(), -1);
        assert_eq!(occlusion.begin(&device), QueryStatus::Pending);

        headless.resolve_queries();
        assert_eq!(occlusion.fetch(device.as_ref(), |_| 0), 0);
        assert_eq!(occlusion.satisfied(), 1);
    }

    #[test]
    fn test_budget_counts_until_fetch_or_drop() {
        let (headless, device) = devices();
        headless.set_deferred_results(true);
        let budget = QueryBudget::new();
        let mut first = Occlusion::new();
        let mut second = Occlusion::new();

        for occlusion in [&mut first, &mut second] {
            occlusion.begin(&device);
            occlusion.end(device.as_ref());
            occlusion.charge(&budget);
        }
        assert_eq!(budget.outstanding(), 2);

        headless.resolve_queries();
        first.fetch(device.as_ref(), |_| 0);
        assert_eq!(budget.outstanding(), 1);
        drop(second);
        assert_eq!(budget.outstanding(), 0);

        first.begin(&device);
        first.charge(&budget);
        first.reset();
        assert_eq!(budget.outstanding(), 0);
    }

    #[test]
    fn test_misuse_returns_sentinel() {
        let (_headless, device) = devices();
        let mut occlusion = Occlusion::new();

        assert_eq!(occlusion.fetch(device.as_ref(), |_| 0), -1);
        assert!(!occlusion.end(device.as_ref()));
        assert_eq!(occlusion.satisfied(), 1);

        occlusion.begin(&device);
        assert_eq!(occlusion.fetch(device.as_ref(), |_| 0), -1);
        assert_eq!(occlusion.satisfied(), 0);
    }

    #[test]
    fn test_query_destroyed_with_state() {
        let (headless, device) = devices();
        let mut occlusion = Occlusion::new();
        occlusion.begin(&device);
        assert_eq!(headless.live_queries(), 1);

        occlusion.reset();
        assert_eq!(headless.live_queries(), 0);
        assert!(!occlusion.has_query());
    }

    #[test]
    fn test_unavailable_when_creation_fails() {
        let (headless, device) = devices();
        headless.fail_next(crate::render::ResourceKind::Query);
        let mut occlusion = Occlusion::new();
        assert_eq!(occlusion.begin(&device), QueryStatus::Unavailable);
        assert_eq!(occlusion.begin(&device), QueryStatus::Issued);
    }
}
