//! Waiting for the window of a freshly launched app.
//!
//! Runs on a background thread and never touches groups; the caller hands the
//! captured window back to the control thread.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::common::collections::HashSet;
use crate::model::{WindowId, WindowRef, pid_t};

/// Where a captured window is headed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CaptureTarget {
    /// A new group on the space the user is looking at, if known.
    NewGroup { current_space: Option<u64> },
    /// An existing group on `target_space`; `0` means any space.
    AddToGroup { target_space: u64 },
}

#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub target: CaptureTarget,
    /// Windows that existed before the launch.
    pub baseline: HashSet<WindowId>,
    /// Expected owner, when the launched process is already known.
    pub pid: Option<pid_t>,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// Collaborators used while polling.
pub struct CaptureDeps<'a> {
    pub list_windows: &'a dyn Fn() -> Vec<WindowRef>,
    pub is_grouped: &'a dyn Fn(WindowId) -> bool,
    pub space_for_window: &'a dyn Fn(WindowId) -> Option<u64>,
    pub sleep: &'a dyn Fn(Duration),
    pub now: &'a dyn Fn() -> Instant,
}

impl<'a> CaptureDeps<'a> {
    /// Real sleeping and wall clock around the given lookups.
    pub fn new(
        list_windows: &'a dyn Fn() -> Vec<WindowRef>,
        is_grouped: &'a dyn Fn(WindowId) -> bool,
        space_for_window: &'a dyn Fn(WindowId) -> Option<u64>,
    ) -> Self {
        Self {
            list_windows,
            is_grouped,
            space_for_window,
            sleep: &thread::sleep,
            now: &Instant::now,
        }
    }
}

/// Ids of the windows owned by `pid`, or of every window when `pid` is unknown.
pub fn baseline_window_ids(windows: &[WindowRef], pid: Option<pid_t>) -> HashSet<WindowId> {
    windows
        .iter()
        .filter(|w| pid.is_none_or(|pid| w.owner_pid == pid))
        .map(|w| w.id)
        .collect()
}

fn passes_space_gate(window: WindowId, target: CaptureTarget, deps: &CaptureDeps<'_>) -> bool {
    let window_space = (deps.space_for_window)(window).unwrap_or(0);
    let accepted = match target {
        CaptureTarget::NewGroup { current_space: None } => true,
        CaptureTarget::NewGroup { current_space: Some(current) } => window_space == current,
        CaptureTarget::AddToGroup { target_space: 0 } => true,
        CaptureTarget::AddToGroup { target_space } => window_space == target_space,
    };
    if !accepted {
        debug!(?window, window_space, ?target, "Rejected capture candidate on another space");
    }
    accepted
}

/// Polls until a window appears that is new, owned by the expected process,
/// not already grouped and on the right space. Gives up after the timeout.
pub fn wait_for_captured_window(request: &CaptureRequest, deps: &CaptureDeps<'_>) -> Option<WindowRef> {
    let deadline = (deps.now)() + request.timeout;
    let mut polls = 0u32;
    while (deps.now)() < deadline {
        polls += 1;
        let found = (deps.list_windows)().into_iter().find(|w| {
            !request.baseline.contains(&w.id)
                && request.pid.is_none_or(|pid| w.owner_pid == pid)
                && !(deps.is_grouped)(w.id)
                && passes_space_gate(w.id, request.target, deps)
        });
        if let Some(window) = found {
            debug!(window = ?window.id, polls, "Captured launched window");
            return Some(window);
        }
        trace!(polls, "No new window yet");
        (deps.sleep)(request.poll_interval);
    }
    debug!(polls, "Timed out waiting for launched window");
    None
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use test_log::test;

    use super::*;

    fn window(id: u32, pid: pid_t) -> WindowRef { WindowRef::new(id, pid, "com.test", format!("W{id}"), "App") }

    fn request(target: CaptureTarget, baseline: &[u32], pid: Option<pid_t>) -> CaptureRequest {
        CaptureRequest {
            target,
            baseline: baseline.iter().map(|id| WindowId::new(*id)).collect(),
            pid,
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Runs a capture against a fake clock that only advances on sleep.
    /// `lister` sees the poll number starting at 1.
    fn run(
        req: &CaptureRequest,
        lister: impl Fn(u32) -> Vec<WindowRef>,
        grouped: &[u32],
        spaces: impl Fn(WindowId) -> Option<u64>,
    ) -> (Option<WindowRef>, u32) {
        let start = Instant::now();
        let elapsed = Cell::new(Duration::ZERO);
        let polls = Cell::new(0u32);
        let sleeps = RefCell::new(Vec::new());
        let list = || {
            polls.set(polls.get() + 1);
            lister(polls.get())
        };
        let is_grouped = |id: WindowId| grouped.contains(&id.as_u32());
        let sleep = |d: Duration| {
            sleeps.borrow_mut().push(d);
            elapsed.set(elapsed.get() + d);
        };
        let now = || start + elapsed.get();
        let deps = CaptureDeps {
            list_windows: &list,
            is_grouped: &is_grouped,
            space_for_window: &spaces,
            sleep: &sleep,
            now: &now,
        };
        let found = wait_for_captured_window(req, &deps);
        assert!(sleeps.borrow().iter().all(|d| *d == req.poll_interval));
        (found, polls.get())
    }

    #[test]
    fn baseline_is_scoped_to_pid() {
        let windows = vec![window(1, 10), window(2, 11), window(3, 10)];
        let mut ids: Vec<u32> = baseline_window_ids(&windows, Some(10)).iter().map(|w| w.as_u32()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(baseline_window_ids(&windows, None).len(), 3);
    }

    #[test]
    fn captures_first_new_window_of_expected_pid() {
        let req = request(CaptureTarget::NewGroup { current_space: None }, &[1], Some(10));
        let (found, polls) = run(
            &req,
            |poll| {
                if poll < 3 {
                    vec![window(1, 10)]
                } else {
                    vec![window(1, 10), window(7, 99), window(8, 10)]
                }
            },
            &[],
            |_| None,
        );
        assert_eq!(found.map(|w| w.id), Some(WindowId::new(8)));
        assert_eq!(polls, 3);
    }

    #[test]
    fn grouped_windows_are_skipped() {
        let req = request(CaptureTarget::NewGroup { current_space: None }, &[], None);
        let (found, _) = run(&req, |_| vec![window(4, 1), window(5, 1)], &[4], |_| None);
        assert_eq!(found.map(|w| w.id), Some(WindowId::new(5)));
    }

    #[test]
    fn space_gate_for_new_group_uses_current_space() {
        let req = request(CaptureTarget::NewGroup { current_space: Some(3) }, &[], None);
        let (found, _) = run(
            &req,
            |_| vec![window(4, 1), window(5, 1)],
            &[],
            |id| Some(if id.as_u32() == 4 { 2 } else { 3 }),
        );
        assert_eq!(found.map(|w| w.id), Some(WindowId::new(5)));
    }

    #[test]
    fn space_gate_for_existing_group() {
        let any = request(CaptureTarget::AddToGroup { target_space: 0 }, &[], None);
        let (found, _) = run(&any, |_| vec![window(4, 1)], &[], |_| Some(9));
        assert!(found.is_some());

        let pinned = request(CaptureTarget::AddToGroup { target_space: 2 }, &[], None);
        let (found, _) = run(&pinned, |_| vec![window(4, 1)], &[], |_| None);
        assert!(found.is_none());
    }

    #[test]
    fn times_out_after_bounded_polls() {
        let req = request(CaptureTarget::NewGroup { current_space: None }, &[1], None);
        let (found, polls) = run(&req, |_| vec![window(1, 1)], &[], |_| None);
        assert!(found.is_none());
        // 200ms timeout at 50ms intervals.
        assert_eq!(polls, 4);
    }
}
