use std::future::{Future, poll_fn};
use std::sync::Arc;
use std::task::Poll;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::{
    config::Config,
    credentials::CredentialStore,
    errors::Error,
    refresh::{self, Admission, PendingRequest, RefreshCoordinator, RefreshLease},
    request::{AuthRequest, RequestDescriptor, Response},
    telemetry::refresh::{RefreshOutcome, RefreshTelemetry},
    transport::{ReqwestTransport, Transport},
};

struct ClientInner<T, S> {
    transport: T,
    credentials: S,
    config: Config,
    refresh: Arc<RefreshCoordinator>,
}

/// HTTP client for the storefront API that attaches the stored bearer token to every
/// request and transparently refreshes it when the API answers 401.
///
/// Cloning is cheap; clones share credentials and refresh state.
pub struct AuthenticatedHttpClient<T, S> {
    inner: Arc<ClientInner<T, S>>,
}

impl<T, S> Clone for AuthenticatedHttpClient<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CredentialStore> AuthenticatedHttpClient<ReqwestTransport, S> {
    /// Create a client talking to `config.base_url` over reqwest.
    /// # Arguments
    /// * `config` - Explicit configuration, typically loaded via `Config::from_file` or `Config::from_env`.
    /// * `credentials` - Store holding the access and refresh tokens.
    pub fn new(config: Config, credentials: S) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.clone())?;
        Ok(Self::with_transport(transport, credentials, config))
    }
}

impl<T: Transport, S: CredentialStore> AuthenticatedHttpClient<T, S> {
    pub fn with_transport(transport: T, credentials: S, config: Config) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                credentials,
                config,
                refresh: Arc::new(RefreshCoordinator::new()),
            }),
        }
    }

    pub fn credentials(&self) -> &S {
        &self.inner.credentials
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// Number of requests waiting on the in-flight refresh.
    pub fn pending_requests(&self) -> usize {
        self.inner.refresh.pending()
    }

    pub fn login(&self, access_token: impl Into<String>, refresh_token: Option<String>) {
        self.inner
            .credentials
            .login(access_token.into(), refresh_token);
    }

    pub fn logout(&self) {
        self.inner.credentials.logout();
    }

    /// Issue a request. Resolves with the response for a 2xx status; any other status is
    /// `Error::Http`. A 401 on an ordinary request is retried once after a token refresh.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response, Error> {
        let request = AuthRequest::new(descriptor);
        let descriptor = self.attach_auth(request.descriptor.clone());
        let response = self.inner.transport.send(descriptor.clone()).await?;
        match response.error_for_status(&descriptor) {
            Ok(response) => Ok(response),
            Err(err) => self.handle_failure(request, err).await,
        }
    }

    pub async fn get(&self, path: &str) -> Result<Response, Error> {
        self.execute(RequestDescriptor::get(path)).await
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
        self.get(path).await?.json()
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, Error> {
        self.execute(RequestDescriptor::post(path).json(body)?).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, Error> {
        self.execute(RequestDescriptor::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, Error> {
        self.execute(RequestDescriptor::delete(path)).await
    }

    /// Outbound interceptor: bearer header from the current access token, if any.
    fn attach_auth(&self, descriptor: RequestDescriptor) -> RequestDescriptor {
        match self.inner.credentials.access_token() {
            Some(token) => descriptor.with_bearer(Some(&token)),
            None => descriptor,
        }
    }

    fn is_refresh_endpoint(&self, descriptor: &RequestDescriptor) -> bool {
        descriptor.endpoint_path() == self.inner.config.refresh_path
    }

    /// Inbound interceptor.
    async fn handle_failure(&self, request: AuthRequest, err: Error) -> Result<Response, Error> {
        if !err.is_unauthorized() {
            return Err(err);
        }
        warn!(
            method = %request.descriptor.method,
            path = %request.descriptor.path,
            retried = request.retried,
            "request rejected with 401"
        );
        if request.retried || self.is_refresh_endpoint(&request.descriptor) {
            return Err(self.inner.permanent_failure(err));
        }

        match self.inner.refresh.admit(request) {
            Admission::Queued(receiver) => receiver.await.unwrap_or(Err(Error::RefreshAbandoned)),
            Admission::Lead(lease, request) => self.lead_refresh(lease, request, err).await,
        }
    }

    /// Owns the refresh for this round. The refresh and the replays run on their own task, so
    /// the queue is still drained if this caller is cancelled; the caller waits for its
    /// replayed result like any queued request.
    async fn lead_refresh(
        &self,
        lease: RefreshLease,
        request: AuthRequest,
        original: Error,
    ) -> Result<Response, Error> {
        let telemetry = RefreshTelemetry::new(request.descriptor.endpoint_path());
        let credentials = &self.inner.credentials;

        let Some(refresh_token) = credentials.refresh_token() else {
            let rejected = lease.fail(|| Error::MissingRefreshToken);
            telemetry.emit_failure(RefreshOutcome::MissingRefreshToken, &original, rejected);
            credentials.logout();
            return Err(original);
        };

        let (leader, receiver) = PendingRequest::new(request);
        tokio::spawn(Arc::clone(&self.inner).run_refresh(lease, leader, refresh_token, telemetry));
        receiver.await.unwrap_or(Err(Error::RefreshAbandoned))
    }
}

impl<T: Transport, S: CredentialStore> ClientInner<T, S> {
    async fn run_refresh(
        self: Arc<Self>,
        mut lease: RefreshLease,
        leader: PendingRequest,
        refresh_token: String,
        telemetry: RefreshTelemetry,
    ) {
        telemetry.emit_start();
        match refresh::request_new_token(&self.transport, &self.config, &refresh_token).await {
            Ok(tokens) => {
                self.credentials.set_access_token(tokens.access_token.clone());
                if let Some(rotated) = tokens.refresh_token {
                    self.credentials.set_refresh_token(rotated);
                }
                let mut replayed = 0;
                while let Some(pending) = lease.next_pending() {
                    self.issue_replay(pending, &tokens.access_token).await;
                    replayed += 1;
                }
                telemetry.emit_success(replayed);
                self.issue_replay(leader, &tokens.access_token).await;
            }
            Err(err) => {
                let shared = Arc::new(err);
                let rejected = lease.fail(|| Error::Refresh(Arc::clone(&shared)));
                telemetry.emit_failure(RefreshOutcome::Failed, &shared, rejected);
                self.credentials.logout();
                leader.settle(Err(Error::Refresh(shared)));
            }
        }
    }

    /// Starts a replay and returns once it is on its way: replays are issued in queue order
    /// but run concurrently, so the last waiter does not pay for every round-trip before it.
    async fn issue_replay(self: &Arc<Self>, pending: PendingRequest, access_token: &str) {
        let mut replay =
            Box::pin(Arc::clone(self).replay(pending.request.clone(), access_token.to_string()));
        let first_poll = poll_fn(|cx| Poll::Ready(replay.as_mut().poll(cx))).await;
        match first_poll {
            Poll::Ready(result) => pending.settle(result),
            Poll::Pending => {
                tokio::spawn(async move { pending.settle(replay.await) });
            }
        }
    }

    /// Re-issues a request with the freshly refreshed token. A replay is never refreshed again.
    async fn replay(
        self: Arc<Self>,
        request: AuthRequest,
        access_token: String,
    ) -> Result<Response, Error> {
        let descriptor = request.descriptor.with_bearer(Some(&access_token));
        let response = self.transport.send(descriptor.clone()).await?;
        response
            .error_for_status(&descriptor)
            .map_err(|err| {
                if err.is_unauthorized() {
                    self.permanent_failure(err)
                } else {
                    err
                }
            })
    }

    fn permanent_failure(&self, err: Error) -> Error {
        info!(error = %err, "auth.permanent_failure; logging out");
        self.credentials.logout();
        err
    }
}
