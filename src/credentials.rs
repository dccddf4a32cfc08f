use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::Error;

/// Access/refresh token pair as held by the client between requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub updated_at: Option<Timestamp>,
}

impl Credentials {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Source of truth for the tokens attached to outgoing requests.
pub trait CredentialStore: Send + Sync + 'static {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: String);
    fn set_refresh_token(&self, token: String);
    fn login(&self, access_token: String, refresh_token: Option<String>);
    /// Clears every stored token.
    fn logout(&self);
}

/// In-memory credential store, optionally mirrored to a JSON file on every change.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<RwLock<Credentials>>,
    persist_to: Option<PathBuf>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        let store = Self::new();
        store.update(|creds| {
            creds.access_token = access_token.map(str::to_string);
            creds.refresh_token = refresh_token.map(str::to_string);
        });
        store
    }

    /// Opens a store backed by `path`, loading existing credentials if the file is present.
    pub fn persistent(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let credentials = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Credentials::default()
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(credentials)),
            persist_to: Some(path),
        })
    }

    pub fn snapshot(&self) -> Credentials {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Credentials)) {
        let snapshot = {
            let mut guard = match self.inner.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            f(&mut guard);
            guard.updated_at = Some(Timestamp::now());
            guard.clone()
        };
        if let Some(path) = &self.persist_to
            && let Err(err) = write_snapshot(path, &snapshot)
        {
            warn!(path = %path.display(), error = %err, "credentials.persist_failed");
        }
    }
}

fn write_snapshot(path: &Path, credentials: &Credentials) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(credentials)?)?;
    Ok(())
}

impl CredentialStore for MemoryCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.snapshot().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.snapshot().refresh_token
    }

    fn set_access_token(&self, token: String) {
        self.update(|creds| creds.access_token = Some(token));
    }

    fn set_refresh_token(&self, token: String) {
        self.update(|creds| creds.refresh_token = Some(token));
    }

    fn login(&self, access_token: String, refresh_token: Option<String>) {
        info!(has_refresh_token = refresh_token.is_some(), "credentials.login");
        self.update(|creds| {
            creds.access_token = Some(access_token);
            creds.refresh_token = refresh_token;
        });
    }

    fn logout(&self) {
        info!("credentials.logout");
        self.update(|creds| {
            creds.access_token = None;
            creds.refresh_token = None;
        });
    }
}
