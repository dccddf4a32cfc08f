use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::errors::Error;
use crate::request::{AuthRequest, Response};
use crate::telemetry::refresh::RefreshTelemetry;

/// A request waiting on the in-flight refresh: either one that hit a 401 while another
/// request owned the refresh, or the triggering request itself. Settled exactly once when
/// that refresh finishes.
pub struct PendingRequest {
    pub request: AuthRequest,
    responder: oneshot::Sender<Result<Response, Error>>,
}

impl PendingRequest {
    pub(crate) fn new(request: AuthRequest) -> (Self, oneshot::Receiver<Result<Response, Error>>) {
        let (responder, receiver) = oneshot::channel();
        (Self { request, responder }, receiver)
    }

    /// Hands the result to the waiting caller. A caller that went away is ignored.
    pub fn settle(self, result: Result<Response, Error>) {
        let _ = self.responder.send(result);
    }
}

#[derive(Default)]
struct RefreshState {
    is_refreshing: bool,
    queue: VecDeque<PendingRequest>,
}

/// What a request that just failed with 401 has to do next.
pub enum Admission {
    /// No refresh was running; the caller now owns it.
    Lead(RefreshLease, AuthRequest),
    /// A refresh is running; await the receiver for the replayed result.
    Queued(oneshot::Receiver<Result<Response, Error>>),
}

/// Single-flight refresh state for one client instance: an `IDLE`/`REFRESHING` flag and the
/// FIFO queue of requests waiting on the refresh.
///
/// The flag is checked and set under a synchronous lock that is never held across an
/// `.await`, so two failing requests can never both become the refresh owner.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The lease handed to a new leader keeps the coordinator alive, so it can be moved onto
    /// a task that outlives the caller.
    pub fn admit(self: &Arc<Self>, request: AuthRequest) -> Admission {
        let mut state = self.lock();
        if state.is_refreshing {
            RefreshTelemetry::emit_queued(request.descriptor.endpoint_path(), state.queue.len() + 1);
            let (pending, receiver) = PendingRequest::new(request.into_retried());
            state.queue.push_back(pending);
            return Admission::Queued(receiver);
        }
        state.is_refreshing = true;
        Admission::Lead(
            RefreshLease {
                coordinator: Arc::clone(self),
                settled: false,
            },
            request.into_retried(),
        )
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().is_refreshing
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    fn release(&self) -> VecDeque<PendingRequest> {
        let mut state = self.lock();
        state.is_refreshing = false;
        std::mem::take(&mut state.queue)
    }
}

/// Ownership of the in-flight refresh. Dropping an unsettled lease returns the coordinator
/// to `IDLE` and abandons whatever is still queued.
pub struct RefreshLease {
    coordinator: Arc<RefreshCoordinator>,
    settled: bool,
}

impl RefreshLease {
    /// Pops the oldest waiting request. Once the queue is empty the coordinator is back to
    /// `IDLE` and this returns `None`; requests that fail while replays are in flight still
    /// join the queue and are drained here.
    pub fn next_pending(&mut self) -> Option<PendingRequest> {
        let mut state = self.coordinator.lock();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.is_refreshing = false;
            self.settled = true;
        }
        next
    }

    /// Rejects every waiting request in FIFO order and returns the coordinator to `IDLE`.
    pub fn fail(mut self, make_error: impl Fn() -> Error) -> usize {
        let drained = self.coordinator.release();
        self.settled = true;
        let rejected = drained.len();
        for pending in drained {
            pending.settle(Err(make_error()));
        }
        rejected
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.settled {
            // dropped senders surface as RefreshAbandoned to the waiters
            drop(self.coordinator.release());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestDescriptor;

    fn request(path: &str) -> AuthRequest {
        AuthRequest::new(RequestDescriptor::get(path))
    }

    fn ok_response() -> Response {
        Response {
            status: reqwest::StatusCode::OK,
            headers: Default::default(),
            body: Vec::new(),
        }
    }

    #[test]
    fn first_failure_leads_and_later_ones_queue() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let Admission::Lead(mut lease, lead) = coordinator.admit(request("/a")) else {
            panic!("first admission should lead");
        };
        assert!(lead.retried);
        assert!(coordinator.is_refreshing());

        let queued = ["/b", "/c", "/d"]
            .into_iter()
            .map(|p| match coordinator.admit(request(p)) {
                Admission::Queued(rx) => rx,
                Admission::Lead(..) => panic!("second leader admitted"),
            })
            .collect::<Vec<_>>();
        assert_eq!(coordinator.pending(), 3);

        let mut order = Vec::new();
        while let Some(pending) = lease.next_pending() {
            assert!(pending.request.retried);
            order.push(pending.request.descriptor.path.clone());
            pending.settle(Ok(ok_response()));
        }
        assert_eq!(order, ["/b", "/c", "/d"]);
        assert!(!coordinator.is_refreshing());
        for mut rx in queued {
            assert!(rx.try_recv().unwrap().is_ok());
        }
    }

    #[test]
    fn fail_rejects_everything_and_resets() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let Admission::Lead(lease, _) = coordinator.admit(request("/a")) else {
            panic!("first admission should lead");
        };
        let Admission::Queued(mut rx) = coordinator.admit(request("/b")) else {
            panic!("expected queueing");
        };
        assert_eq!(lease.fail(|| Error::MissingRefreshToken), 1);
        assert!(matches!(rx.try_recv(), Ok(Err(Error::MissingRefreshToken))));
        assert!(!coordinator.is_refreshing());
        assert!(matches!(coordinator.admit(request("/c")), Admission::Lead(..)));
    }

    #[test]
    fn dropped_lease_abandons_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let Admission::Lead(lease, _) = coordinator.admit(request("/a")) else {
            panic!("first admission should lead");
        };
        let Admission::Queued(mut rx) = coordinator.admit(request("/b")) else {
            panic!("expected queueing");
        };
        drop(lease);
        assert!(rx.try_recv().is_err());
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.pending(), 0);
    }
}
