//! Visitor identity resolution and anonymous history reconciliation.
//!
//! # Responsibility
//! - Mint and persist an anonymous surrogate id before sign-in.
//! - On sign-in, move the surrogate's view history to the signed-in id and
//!   retire the surrogate.
//!
//! # Invariants
//! - Reconciliation is one-directional and idempotent.
//! - A retired surrogate is never returned by `resolve` again.
//! - Sign-out never un-merges history; a new surrogate is minted only when
//!   none is cached.

use crate::config::DEFAULT_STORE_RETRY_ATTEMPTS;
use crate::error::ErrorKind;
use crate::model::identity::VisitorIdentity;
use crate::repo::catalog_store::RepoError;
use crate::repo::view_log_repo::ViewLogRepository;
use crate::service::retry::with_store_retry;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug)]
pub enum IdentityError {
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },
    Encoding(serde_json::Error),
    Repo(RepoError),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Repo(err) if err.is_unavailable() => ErrorKind::StoreUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage { path, source } => {
                write!(f, "anonymous id storage `{}` failed: {source}", path.display())
            }
            Self::Encoding(err) => write!(f, "anonymous id storage is malformed: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
            Self::Encoding(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for IdentityError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Durable per-client slot for the anonymous surrogate id.
pub trait AnonymousIdStore {
    fn load(&self) -> Result<Option<String>, IdentityError>;
    fn save(&self, id: &str) -> Result<(), IdentityError>;
    fn clear(&self) -> Result<(), IdentityError>;
}

impl<S: AnonymousIdStore + ?Sized> AnonymousIdStore for &S {
    fn load(&self) -> Result<Option<String>, IdentityError> {
        (**self).load()
    }

    fn save(&self, id: &str) -> Result<(), IdentityError> {
        (**self).save(id)
    }

    fn clear(&self) -> Result<(), IdentityError> {
        (**self).clear()
    }
}

/// Opaque authentication provider.
pub trait AuthSession {
    /// Signed-in user id, or `None` when signed out.
    fn current_user_id(&self) -> Option<String>;
}

/// Fixed session state, useful for request-scoped handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAuthSession(pub Option<String>);

impl AuthSession for StaticAuthSession {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Process-local store; the id is lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryAnonymousIdStore {
    slot: RefCell<Option<String>>,
}

impl AnonymousIdStore for MemoryAnonymousIdStore {
    fn load(&self) -> Result<Option<String>, IdentityError> {
        Ok(self.slot.borrow().clone())
    }

    fn save(&self, id: &str) -> Result<(), IdentityError> {
        *self.slot.borrow_mut() = Some(id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), IdentityError> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredAnonymousId {
    anonymous_id: String,
    created_at: i64,
}

/// JSON file holding the anonymous id, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct FileAnonymousIdStore {
    path: PathBuf,
}

impl FileAnonymousIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> IdentityError {
        IdentityError::Storage {
            path: self.path.clone(),
            source,
        }
    }
}

impl AnonymousIdStore for FileAnonymousIdStore {
    fn load(&self) -> Result<Option<String>, IdentityError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };
        let stored: StoredAnonymousId =
            serde_json::from_str(&raw).map_err(IdentityError::Encoding)?;
        Ok(Some(stored.anonymous_id))
    }

    fn save(&self, id: &str) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let payload = serde_json::to_string(&StoredAnonymousId {
            anonymous_id: id.to_string(),
            created_at: crate::service::now_epoch_ms(),
        })
        .map_err(IdentityError::Encoding)?;

        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, payload).map_err(|err| self.io_error(err))?;
        std::fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))
    }

    fn clear(&self) -> Result<(), IdentityError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}

/// Produces the current visitor identity for one client.
pub struct IdentityResolver<S, A, R>
where
    S: AnonymousIdStore,
    A: AuthSession,
    R: ViewLogRepository,
{
    ids: S,
    auth: A,
    repo: R,
    store_retries: u32,
}

impl<S, A, R> IdentityResolver<S, A, R>
where
    S: AnonymousIdStore,
    A: AuthSession,
    R: ViewLogRepository,
{
    pub fn new(ids: S, auth: A, repo: R) -> Self {
        Self {
            ids,
            auth,
            repo,
            store_retries: DEFAULT_STORE_RETRY_ATTEMPTS,
        }
    }

    pub fn with_store_retries(mut self, retries: u32) -> Self {
        self.store_retries = retries;
        self
    }

    /// Returns the session's single current identity.
    ///
    /// When a signed-in user is present and a surrogate is still cached, the
    /// surrogate's history is merged first and the surrogate is then cleared.
    /// If the merge fails the surrogate stays cached so the next call retries.
    pub fn resolve(&self) -> Result<VisitorIdentity, IdentityError> {
        let signed_in = self
            .auth
            .current_user_id()
            .filter(|id| !id.trim().is_empty());

        match signed_in {
            Some(user_id) => {
                if let Some(anonymous_id) = self.cached_anonymous_id()? {
                    let moved = self.reconcile(&anonymous_id, &user_id)?;
                    self.ids.clear()?;
                    info!(
                        "event=identity_reconcile module=service status=ok moved={moved} retired=true"
                    );
                }
                Ok(VisitorIdentity::authenticated(user_id))
            }
            None => {
                if let Some(anonymous_id) = self.cached_anonymous_id()? {
                    return Ok(VisitorIdentity::anonymous(anonymous_id));
                }
                let minted = Uuid::new_v4().to_string();
                self.ids.save(&minted)?;
                info!("event=identity_mint module=service status=ok kind=anonymous");
                Ok(VisitorIdentity::anonymous(minted))
            }
        }
    }

    /// Moves every view log entry of `anonymous_id` to `user_id`.
    ///
    /// Returns the number of rows moved; `0` on repeat invocations.
    pub fn reconcile(&self, anonymous_id: &str, user_id: &str) -> Result<usize, IdentityError> {
        let moved = with_store_retry("reconcile_view_logs", self.store_retries, || {
            self.repo.reassign_view_logs(anonymous_id, user_id)
        })?;
        Ok(moved)
    }

    fn cached_anonymous_id(&self) -> Result<Option<String>, IdentityError> {
        match self.ids.load() {
            Ok(Some(id)) if Uuid::parse_str(&id).is_ok() => Ok(Some(id)),
            Ok(Some(_)) | Err(IdentityError::Encoding(_)) => {
                warn!("event=identity_load module=service status=skip reason=corrupt_anonymous_id");
                self.ids.clear()?;
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnonymousIdStore, FileAnonymousIdStore, MemoryAnonymousIdStore};

    #[test]
    fn memory_store_roundtrip_and_clear() {
        let store = MemoryAnonymousIdStore::default();
        assert_eq!(store.load().expect("load"), None);
        store.save("abc").expect("save");
        assert_eq!(store.load().expect("load").as_deref(), Some("abc"));
        store.clear().expect("clear");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("client").join("visitor.json");

        FileAnonymousIdStore::new(&path).save("visitor-1").expect("save");
        let reopened = FileAnonymousIdStore::new(&path);
        assert_eq!(reopened.load().expect("load").as_deref(), Some("visitor-1"));

        reopened.clear().expect("clear");
        reopened.clear().expect("clear is idempotent");
        assert_eq!(reopened.load().expect("load"), None);
    }
}
