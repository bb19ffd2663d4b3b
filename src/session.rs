//! Session lifecycle.
//!
//! The [`SessionManager`] owns the only mutable session cell in the client.
//! It is a leaf: it knows nothing about job orchestration.
//!
//! ```text
//!   restore() ──→ login() ──→ authorized_call() ... ──→ logout()
//!                                  │
//!                                  └─ 401/403 ──→ cleared + SessionExpired
//! ```
//!
//! **Invariants:**
//! - Credential and identity are set together and cleared together.
//! - Mutation happens through `watch::Sender::send_*`, so readers never
//!   observe a half-written session.
//! - Every change is broadcast to [`SessionManager::subscribe`] receivers;
//!   dependents such as the orchestrator use that to stop work when the
//!   session ends.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Storage key of the bearer credential.
pub const TOKEN_KEY: &str = "token";

/// Storage key of the serialized [`Identity`].
pub const USER_KEY: &str = "user";

/// Minimum password length accepted by `register`.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Role granted by the backend at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(rename = "ROLE_SCHEDULER")]
    Scheduler,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ROLE_ADMIN"),
            Role::Scheduler => write!(f, "ROLE_SCHEDULER"),
        }
    }
}

/// Who the session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

/// An authenticated session: credential plus identity.
#[derive(Debug)]
pub struct Session {
    credential: SecretString,
    identity: Identity,
    established_at: DateTime<Utc>,
}

impl Session {
    /// Create a session from a backend-issued token.
    pub fn new(token: impl Into<String>, identity: Identity) -> Self {
        Self {
            credential: SecretString::from(token.into()),
            identity,
            established_at: Utc::now(),
        }
    }

    /// The bearer credential.
    pub fn credential(&self) -> &SecretString {
        &self.credential
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }

    /// When this session was created or restored.
    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    fn same_credential(&self, token: &str) -> bool {
        self.credential.expose_secret() == token
    }
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            credential: clone_secret(&self.credential),
            identity: self.identity.clone(),
            established_at: self.established_at,
        }
    }
}

// ── Durable storage ─────────────────────────────────────────────────

/// Durable key-value storage for the session.
///
/// Only `get`/`set`/`clear` are required. Implementations must survive
/// process restarts to be useful, but the manager treats any failure as
/// "no session".
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> ClientResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;
    fn clear(&self) -> ClientResult<()>;
}

/// In-memory store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<FxHashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// JSON-file store: one object mapping keys to values.
///
/// Writes go to a sibling temp file and are renamed into place.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_entries(&self) -> ClientResult<FxHashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ClientError::Storage(format!("{} is corrupt: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FxHashMap::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &FxHashMap<String, String>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let raw = serde_json::to_string(entries)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A corrupt file is replaced rather than blocking new writes.
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }

    fn clear(&self) -> ClientResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Manager ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CredentialsBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    role: Role,
}

/// Owner of the current session.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    current: watch::Sender<Option<Session>>,
}

impl SessionManager {
    /// Create a manager and restore any session found in `store`.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn SessionStore>) -> Self {
        let restored = restore(store.as_ref());
        let (current, _) = watch::channel(restored);
        Self {
            transport,
            store,
            current,
        }
    }

    /// Log in and persist the new session.
    ///
    /// Fails with `InvalidCredentials` on a 4xx and `NetworkUnavailable`
    /// when the backend is unreachable. Never retried. If the session cannot
    /// be persisted the login fails with `Storage` and any previous session
    /// is ended as well.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Session> {
        let request = ApiRequest::post("/auth/login", &CredentialsBody { username, password })?;
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::warn!(username, status = response.status, "Login rejected");
            return Err(if response.is_client_error() {
                ClientError::InvalidCredentials(response.message())
            } else {
                response.into_backend_error()
            });
        }

        let body: LoginResponse = response.json()?;
        if body.token.is_empty() {
            return Err(ClientError::InvalidResponse(
                "login response carried an empty token".to_string(),
            ));
        }

        let session = Session::new(
            body.token,
            Identity {
                username: username.to_string(),
                role: body.role,
            },
        );
        self.persist(&session)?;
        self.current.send_replace(Some(session.clone()));
        tracing::info!(username, role = %session.role(), "Logged in");
        Ok(session)
    }

    /// Register a new account. Does not log in.
    pub async fn register(&self, username: &str, password: &str) -> ClientResult<()> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::WeakCredential(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long."
            )));
        }

        let request =
            ApiRequest::post("/auth/register", &CredentialsBody { username, password })?;
        let response = self.transport.send(request).await?;

        if response.is_success() {
            tracing::info!(username, "Registered");
            return Ok(());
        }

        tracing::warn!(username, status = response.status, "Registration rejected");
        if !response.is_client_error() {
            return Err(response.into_backend_error());
        }
        let message = response.message();
        let lowered = message.to_lowercase();
        if response.status == 409 || lowered.contains("taken") || lowered.contains("exists") {
            Err(ClientError::UsernameTaken(message))
        } else {
            Err(ClientError::WeakCredential(message))
        }
    }

    /// The current session, if any.
    pub fn current_session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_some_and(|s| s.role() == Role::Admin)
    }

    /// Observe every session change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    /// Send a request with the session credential attached.
    ///
    /// On 401/403 the session is cleared (memory and storage) before
    /// `SessionExpired` is returned. Without a session the backend is not
    /// contacted and `NotAuthenticated` is returned.
    pub async fn authorized_call(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let token = self
            .current
            .borrow()
            .as_ref()
            .map(|session| clone_secret(session.credential()));
        let Some(token) = token else {
            return Err(ClientError::NotAuthenticated);
        };
        let sent_with = token.expose_secret().to_owned();

        let response = self.transport.send(request.with_bearer(token)).await?;
        if response.is_auth_failure() {
            tracing::error!(status = response.status, "Authorization failure, ending session");
            self.expire(&sent_with);
            return Err(ClientError::SessionExpired);
        }
        Ok(response)
    }

    /// End the session. Idempotent.
    pub fn logout(&self) {
        let had_session = self.current.send_if_modified(|current| current.take().is_some());
        self.clear_store();
        if had_session {
            tracing::info!("Logged out");
        }
    }

    /// Clear the session the rejected credential belonged to. A newer
    /// session established while the request was in flight is kept.
    fn expire(&self, token: &str) {
        let cleared = self.current.send_if_modified(|current| {
            if current.as_ref().is_some_and(|s| s.same_credential(token)) {
                if let Some(session) = current.take() {
                    let age = Utc::now() - session.established_at();
                    tracing::warn!(
                        username = %session.identity().username,
                        age_secs = age.num_seconds(),
                        "Session expired"
                    );
                }
                true
            } else {
                false
            }
        });
        if cleared {
            self.clear_store();
        }
    }

    fn persist(&self, session: &Session) -> ClientResult<()> {
        let user = serde_json::to_string(session.identity())
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        let result = self
            .store
            .set(TOKEN_KEY, session.credential().expose_secret())
            .and_then(|()| self.store.set(USER_KEY, &user));
        if let Err(e) = result {
            tracing::error!("Failed to persist session: {}", e);
            // Storage no longer holds any session, so memory must not either.
            self.clear_store();
            self.current.send_if_modified(|current| current.take().is_some());
            return Err(e);
        }
        Ok(())
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to clear session storage: {}", e);
        }
    }
}

fn clone_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// Load a session from storage. Anything incomplete or unparsable is
/// discarded and the store is cleared.
fn restore(store: &dyn SessionStore) -> Option<Session> {
    let loaded = store
        .get(TOKEN_KEY)
        .and_then(|token| Ok((token, store.get(USER_KEY)?)));

    let discard = |reason: String| {
        tracing::warn!("Discarding stored session: {}", reason);
        if let Err(e) = store.clear() {
            tracing::warn!("Failed to clear session storage: {}", e);
        }
        None
    };

    match loaded {
        Ok((None, None)) => None,
        Ok((Some(token), Some(user))) if !token.is_empty() => {
            match serde_json::from_str::<Identity>(&user) {
                Ok(identity) => {
                    tracing::info!(username = %identity.username, "Restored session");
                    Some(Session::new(token, identity))
                }
                Err(e) => discard(format!("identity is unparsable: {e}")),
            }
        }
        Ok(_) => discard("credential and identity are not both present".to_string()),
        Err(e) => discard(e.to_string()),
    }
}

// ── Request gate ────────────────────────────────────────────────────

/// Outcome of a [`RequestGate`] check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted(Identity),
    Unauthenticated,
    Forbidden,
}

/// Role check in front of protected operations.
pub struct RequestGate {
    session: watch::Receiver<Option<Session>>,
}

impl RequestGate {
    pub fn new(manager: &SessionManager) -> Self {
        Self {
            session: manager.subscribe(),
        }
    }

    /// Check the current session against `allowed`. An empty list admits
    /// any authenticated role.
    pub fn check(&self, allowed: &[Role]) -> Access {
        match self.session.borrow().as_ref() {
            None => Access::Unauthenticated,
            Some(s) if allowed.is_empty() || allowed.contains(&s.role()) => {
                Access::Granted(s.identity().clone())
            }
            Some(_) => Access::Forbidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use async_trait::async_trait;
    use serde_json::json;

    /// Transport that answers every request with one canned response and
    /// records what it saw.
    struct FixedTransport {
        response: ClientResult<ApiResponse>,
        seen: Mutex<Vec<(Method, String, Option<String>)>>,
    }

    impl FixedTransport {
        fn new(response: ClientResult<ApiResponse>) -> Arc<Self> {
            Arc::new(Self {
                response,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
            self.seen.lock().unwrap().push((
                request.method,
                request.path.clone(),
                request.bearer().map(str::to_string),
            ));
            self.response.clone()
        }
    }

    /// Store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySessionStore,
        read_only: std::sync::atomic::AtomicBool,
    }

    impl SessionStore for FlakyStore {
        fn get(&self, key: &str) -> ClientResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> ClientResult<()> {
            if self.read_only.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ClientError::Storage("disk full".into()));
            }
            self.inner.set(key, value)
        }

        fn clear(&self) -> ClientResult<()> {
            self.inner.clear()
        }
    }

    fn stored(store: &MemorySessionStore, token: &str, role: Role) {
        store.set(TOKEN_KEY, token).unwrap();
        let user = serde_json::to_string(&Identity {
            username: "ana".into(),
            role,
        })
        .unwrap();
        store.set(USER_KEY, &user).unwrap();
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ROLE_ADMIN\"");
        let role: Role = serde_json::from_str("\"ROLE_SCHEDULER\"").unwrap();
        assert_eq!(role, Role::Scheduler);
    }

    #[test]
    fn test_restore_from_store() {
        let store = Arc::new(MemorySessionStore::new());
        stored(&store, "tok", Role::Admin);
        let manager = SessionManager::new(FixedTransport::new(Ok(ApiResponse::new(200, ""))), store);

        let session = manager.current_session().unwrap();
        assert_eq!(session.identity().username, "ana");
        assert!(manager.is_admin());
    }

    #[test]
    fn test_restore_discards_corrupt_identity() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(TOKEN_KEY, "tok").unwrap();
        store.set(USER_KEY, "{not json").unwrap();
        let manager = SessionManager::new(
            FixedTransport::new(Ok(ApiResponse::new(200, ""))),
            store.clone(),
        );

        assert!(manager.current_session().is_none());
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_restore_discards_half_session() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(TOKEN_KEY, "tok").unwrap();
        let manager = SessionManager::new(
            FixedTransport::new(Ok(ApiResponse::new(200, ""))),
            store.clone(),
        );

        assert!(!manager.is_authenticated());
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let transport = FixedTransport::new(Ok(ApiResponse::json_body(
            200,
            json!({ "token": "jwt-1", "role": "ROLE_SCHEDULER" }),
        )));
        let store = Arc::new(MemorySessionStore::new());
        let manager = SessionManager::new(transport.clone(), store.clone());

        let session = manager.login("ana", "secret-pass").await.unwrap();
        assert_eq!(session.role(), Role::Scheduler);
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("jwt-1"));
        assert!(store.get(USER_KEY).unwrap().unwrap().contains("ROLE_SCHEDULER"));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0], (Method::Post, "/auth/login".to_string(), None));
    }

    #[tokio::test]
    async fn test_login_storage_failure_ends_previous_session() {
        let transport = FixedTransport::new(Ok(ApiResponse::json_body(
            200,
            json!({ "token": "jwt-1", "role": "ROLE_SCHEDULER" }),
        )));
        let store = Arc::new(FlakyStore::default());
        let manager = SessionManager::new(transport, store.clone());
        manager.login("alice", "secret-pass").await.unwrap();
        let mut rx = manager.subscribe();

        store
            .read_only
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let err = manager.login("bob", "secret-pass").await.unwrap_err();

        assert_eq!(err, ClientError::Storage("disk full".into()));
        assert!(manager.current_session().is_none());
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(USER_KEY).unwrap(), None);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let transport = FixedTransport::new(Ok(ApiResponse::json_body(
            401,
            json!({ "message": "Bad credentials" }),
        )));
        let manager = SessionManager::new(transport, Arc::new(MemorySessionStore::new()));

        let err = manager.login("ana", "wrong-pass").await.unwrap_err();
        assert_eq!(err, ClientError::InvalidCredentials("Bad credentials".into()));
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_network_unavailable() {
        let transport =
            FixedTransport::new(Err(ClientError::NetworkUnavailable("refused".into())));
        let manager = SessionManager::new(transport, Arc::new(MemorySessionStore::new()));

        let err = manager.login("ana", "secret-pass").await.unwrap_err();
        assert!(matches!(err, ClientError::NetworkUnavailable(_)));
    }

    #[tokio::test]
    async fn test_register_weak_password_is_local() {
        let transport = FixedTransport::new(Ok(ApiResponse::new(200, "")));
        let manager = SessionManager::new(transport.clone(), Arc::new(MemorySessionStore::new()));

        let err = manager.register("ana", "short").await.unwrap_err();
        assert!(matches!(err, ClientError::WeakCredential(_)));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_username_taken() {
        let transport = FixedTransport::new(Ok(ApiResponse::json_body(
            400,
            json!({ "message": "Error: Username is already taken!" }),
        )));
        let manager = SessionManager::new(transport, Arc::new(MemorySessionStore::new()));

        let err = manager.register("ana", "long-enough").await.unwrap_err();
        assert!(matches!(err, ClientError::UsernameTaken(_)));
    }

    #[tokio::test]
    async fn test_authorized_call_attaches_bearer() {
        let transport = FixedTransport::new(Ok(ApiResponse::new(200, "{}")));
        let store = Arc::new(MemorySessionStore::new());
        stored(&store, "tok", Role::Scheduler);
        let manager = SessionManager::new(transport.clone(), store);

        manager
            .authorized_call(ApiRequest::get("/schedules/status/p1"))
            .await
            .unwrap();
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].2.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_authorized_call_without_session() {
        let transport = FixedTransport::new(Ok(ApiResponse::new(200, "{}")));
        let manager = SessionManager::new(transport.clone(), Arc::new(MemorySessionStore::new()));

        let err = manager
            .authorized_call(ApiRequest::get("/sections"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::NotAuthenticated);
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authorization_failure_clears_session() {
        let transport = FixedTransport::new(Ok(ApiResponse::new(403, "")));
        let store = Arc::new(MemorySessionStore::new());
        stored(&store, "tok", Role::Scheduler);
        let manager = SessionManager::new(transport, store.clone());
        let mut rx = manager.subscribe();

        let err = manager
            .authorized_call(ApiRequest::get("/sections"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::SessionExpired);
        assert!(manager.current_session().is_none());
        assert_eq!(store.get(USER_KEY).unwrap(), None);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let store = Arc::new(MemorySessionStore::new());
        stored(&store, "tok", Role::Admin);
        let manager = SessionManager::new(FixedTransport::new(Ok(ApiResponse::new(200, ""))), store);

        manager.logout();
        manager.logout();
        assert!(!manager.is_authenticated());
    }

    #[test]
    fn test_request_gate() {
        let store = Arc::new(MemorySessionStore::new());
        stored(&store, "tok", Role::Scheduler);
        let manager = SessionManager::new(FixedTransport::new(Ok(ApiResponse::new(200, ""))), store);
        let gate = RequestGate::new(&manager);

        assert!(matches!(gate.check(&[]), Access::Granted(_)));
        assert!(matches!(
            gate.check(&[Role::Admin, Role::Scheduler]),
            Access::Granted(_)
        ));
        assert_eq!(gate.check(&[Role::Admin]), Access::Forbidden);

        manager.logout();
        assert_eq!(gate.check(&[]), Access::Unauthenticated);
    }

    #[test]
    fn test_file_store_round_trip_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileSessionStore::new(&path);

        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        store.set(TOKEN_KEY, "tok").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("tok"));

        std::fs::write(&path, "garbage").unwrap();
        assert!(store.get(TOKEN_KEY).is_err());

        let manager = SessionManager::new(
            FixedTransport::new(Ok(ApiResponse::new(200, ""))),
            Arc::new(FileSessionStore::new(&path)),
        );
        assert!(manager.current_session().is_none());
        assert!(!path.exists());

        store.clear().unwrap();
        store.clear().unwrap();
    }
}
