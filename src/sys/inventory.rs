//! Cached all-spaces window list for switcher reads.
//!
//! Discovery is slow, so the switcher reads whatever is cached and a refresh
//! runs on a background thread. Every refresh carries a version number and a
//! finished background result is only applied while its version is still the
//! latest one, so a slow old refresh cannot overwrite a newer synchronous one.
//! All methods run on the control thread; results come back through
//! [`WindowInventory::poll_completed`].

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, error, trace};

use crate::model::WindowRef;

pub type DiscoverFn = Arc<dyn Fn() -> Vec<WindowRef> + Send + Sync>;
pub type ClockFn = Box<dyn Fn() -> Instant>;

struct Completed {
    version: u64,
    windows: Vec<WindowRef>,
}

pub struct WindowInventory {
    stale_after: Duration,
    discover: DiscoverFn,
    now: ClockFn,
    cached: Vec<WindowRef>,
    last_refresh_at: Option<Instant>,
    async_in_flight: bool,
    version: u64,
    completed_tx: Sender<Completed>,
    completed_rx: Receiver<Completed>,
}

impl WindowInventory {
    pub fn new(stale_after: Duration, discover: DiscoverFn) -> Self {
        Self::with_clock(stale_after, discover, Box::new(Instant::now))
    }

    pub fn with_clock(stale_after: Duration, discover: DiscoverFn, now: ClockFn) -> Self {
        let (completed_tx, completed_rx) = unbounded();
        Self {
            stale_after,
            discover,
            now,
            cached: Vec::new(),
            last_refresh_at: None,
            async_in_flight: false,
            version: 0,
            completed_tx,
            completed_rx,
        }
    }

    pub fn cached(&self) -> &[WindowRef] { &self.cached }

    pub fn has_completed_refresh(&self) -> bool { self.last_refresh_at.is_some() }

    pub fn is_refreshing(&self) -> bool { self.async_in_flight }

    /// Returns the cache immediately, scheduling a background refresh when it
    /// is empty or stale.
    pub fn all_for_switcher(&mut self) -> &[WindowRef] {
        self.poll_completed();
        if self.cached.is_empty() || self.is_stale() {
            self.refresh_async();
        }
        &self.cached
    }

    /// Fills the cache on the calling thread. Without `force` this does
    /// nothing while a background refresh is running.
    pub fn refresh_sync(&mut self, force: bool) {
        if self.async_in_flight && !force {
            trace!("Skipping sync refresh, background refresh in flight");
            return;
        }
        let version = self.next_version();
        let windows = (self.discover)();
        self.apply(Completed { version, windows });
    }

    /// Starts a background refresh unless one is already running.
    pub fn refresh_async(&mut self) {
        if self.async_in_flight {
            return;
        }
        let version = self.next_version();
        let discover = Arc::clone(&self.discover);
        let tx = self.completed_tx.clone();
        match thread::Builder::new().name("window-inventory".to_string()).spawn(move || {
            let windows = discover();
            // The inventory may be gone by now.
            let _ = tx.send(Completed { version, windows });
        }) {
            Ok(_) => {
                self.async_in_flight = true;
                debug!(version, "Started background window refresh");
            }
            Err(e) => error!("Failed to spawn window inventory thread: {e}"),
        }
    }

    /// Applies any finished background refreshes. Returns true if the cache
    /// changed.
    pub fn poll_completed(&mut self) -> bool {
        let mut applied = false;
        while let Ok(done) = self.completed_rx.try_recv() {
            applied |= self.finish_async(done);
        }
        applied
    }

    /// Blocks up to `timeout` for one background refresh to finish, then
    /// handles it like [`poll_completed`](Self::poll_completed).
    pub fn wait_completed(&mut self, timeout: Duration) -> bool {
        match self.completed_rx.recv_timeout(timeout) {
            Ok(done) => self.finish_async(done) | self.poll_completed(),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    fn finish_async(&mut self, done: Completed) -> bool {
        self.async_in_flight = false;
        self.apply(done)
    }

    fn apply(&mut self, done: Completed) -> bool {
        if done.version != self.version {
            debug!(stale = done.version, current = self.version, "Dropping outdated window refresh");
            return false;
        }
        trace!(version = done.version, count = done.windows.len(), "Window inventory refreshed");
        self.cached = done.windows;
        self.last_refresh_at = Some((self.now)());
        true
    }

    fn is_stale(&self) -> bool {
        match self.last_refresh_at {
            None => true,
            Some(at) => (self.now)().saturating_duration_since(at) >= self.stale_after,
        }
    }

    fn next_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    fn window(id: u32) -> WindowRef { WindowRef::new(id, 1, "com.test", format!("W{id}"), "App") }

    fn ids(windows: &[WindowRef]) -> Vec<u32> { windows.iter().map(|w| w.id.as_u32()).collect() }

    fn counting(calls: Arc<AtomicUsize>, pick: fn(usize) -> u32) -> DiscoverFn {
        Arc::new(move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            vec![window(pick(call))]
        })
    }

    #[test]
    fn empty_cache_refreshes_in_background() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut inv = WindowInventory::new(Duration::from_secs(10), counting(calls.clone(), |_| 1));

        assert!(inv.all_for_switcher().is_empty());
        assert!(inv.is_refreshing());
        assert!(inv.wait_completed(WAIT));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ids(inv.all_for_switcher()), vec![1]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fresh_cache_is_not_refreshed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut inv = WindowInventory::new(Duration::from_secs(60), counting(calls.clone(), |_| 1));

        inv.refresh_sync(false);
        assert_eq!(ids(inv.all_for_switcher()), vec![1]);
        assert!(!inv.is_refreshing());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_cache_is_returned_while_refreshing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let offset = Rc::new(Cell::new(Duration::ZERO));
        let clock_offset = offset.clone();
        let mut inv = WindowInventory::with_clock(
            Duration::from_millis(100),
            counting(calls.clone(), |call| if call == 1 { 1 } else { 2 }),
            Box::new(move || start + clock_offset.get()),
        );

        inv.refresh_sync(false);
        assert_eq!(ids(inv.cached()), vec![1]);

        offset.set(Duration::from_secs(1));
        assert_eq!(ids(inv.all_for_switcher()), vec![1]);
        assert!(inv.wait_completed(WAIT));
        assert_eq!(ids(inv.cached()), vec![2]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn has_completed_refresh_flips() {
        let mut inv = WindowInventory::new(Duration::from_secs(60), Arc::new(|| vec![window(1)]));
        assert!(!inv.has_completed_refresh());
        inv.refresh_sync(false);
        assert!(inv.has_completed_refresh());
    }

    #[test]
    fn forced_sync_refresh_beats_older_background_result() {
        let (started_tx, started_rx) = unbounded::<()>();
        let (release_tx, release_rx) = unbounded::<()>();
        let release_rx = Mutex::new(release_rx);
        let calls = AtomicUsize::new(0);
        let discover: DiscoverFn = Arc::new(move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == 1 {
                let _ = started_tx.send(());
                let _ = release_rx.lock().unwrap().recv_timeout(WAIT);
                return vec![window(1)];
            }
            vec![window(2)]
        });
        let mut inv = WindowInventory::new(Duration::from_secs(60), discover);

        inv.refresh_async();
        started_rx.recv_timeout(WAIT).unwrap();

        inv.refresh_sync(false);
        assert!(inv.cached().is_empty());

        inv.refresh_sync(true);
        assert_eq!(ids(inv.cached()), vec![2]);

        release_tx.send(()).unwrap();
        assert!(!inv.wait_completed(WAIT));
        assert!(!inv.is_refreshing());
        assert_eq!(ids(inv.cached()), vec![2]);
    }
}
