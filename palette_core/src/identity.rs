use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::str::FromStr;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

/// How long a bearer token stays valid unless configured otherwise.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;

/// Opaque identity reference. Only ever compared for ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for IdentityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("'{0}' is not a valid e-mail address")]
    InvalidEmail(String),
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("an account for '{0}' already exists")]
    EmailTaken(String),
    #[error("wrong e-mail or password")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Anything that can check credentials and create accounts.
pub trait IdentityProvider {
    fn sign_up(&mut self, email: &str, password: &str) -> Result<Identity, AuthError>;
    fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    id: IdentityId,
    email: String,
    salt: String,
    digest: String,
}

impl AccountRecord {
    fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: BTreeMap<String, AccountRecord>,
}

#[derive(Debug, Clone, Copy)]
struct IssuedToken {
    identity: IdentityId,
    issued_at: DateTime<Utc>,
}

/// E-mail/password account registry plus the bearer tokens issued against it.
///
/// Tokens live in memory only; restarting the process signs everybody out.
/// Passwords are a single salted BLAKE3 pass, which is fast to brute-force:
/// fine for a demo registry, not for real credentials.
#[derive(Debug)]
pub struct Accounts {
    accounts: BTreeMap<String, AccountRecord>,
    tokens: HashMap<String, IssuedToken>,
    token_ttl: Duration,
    path: Option<PathBuf>,
}

impl Default for Accounts {
    fn default() -> Self {
        Self {
            accounts: BTreeMap::new(),
            tokens: HashMap::new(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            path: None,
        }
    }
}

impl Accounts {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Open (or start) a registry persisted at `path`.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read accounts file {}", path.display()))?;
            serde_json::from_str::<AccountsFile>(&text).context("parse accounts json")?
        } else {
            AccountsFile::default()
        };

        Ok(Self {
            accounts: file.accounts,
            path: Some(path),
            ..Self::default()
        })
    }

    /// Write `accounts` to disk. Callers swap it in only after this succeeds.
    fn save(&self, accounts: &BTreeMap<String, AccountRecord>) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = AccountsFile {
            accounts: accounts.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("serialize accounts to json")?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).context("create accounts directory")?;
        }
        fs::write(path, json).context("write accounts json file")?;
        Ok(())
    }

    pub fn lookup(&self, id: &IdentityId) -> Option<Identity> {
        self.accounts
            .values()
            .find(|a| a.id == *id)
            .map(AccountRecord::identity)
    }

    /// Check credentials and hand out a fresh bearer token.
    pub fn login(&mut self, email: &str, password: &str) -> Result<(Identity, String), AuthError> {
        let identity = self.sign_in(email, password)?;
        let now = Utc::now();
        self.prune_expired(now);

        let token = random_hex(32);
        self.tokens.insert(
            token.clone(),
            IssuedToken {
                identity: identity.id,
                issued_at: now,
            },
        );
        tracing::debug!(identity = %identity.id, "issued session token");
        Ok((identity, token))
    }

    /// Resolve a bearer token. Expired tokens are dropped on sight.
    pub fn identity_for_token(&mut self, token: &str) -> Option<Identity> {
        let issued = *self.tokens.get(token)?;
        if self.is_expired(&issued, Utc::now()) {
            self.tokens.remove(token);
            tracing::debug!(identity = %issued.identity, "session token expired");
            return None;
        }
        self.lookup(&issued.identity)
    }

    pub fn live_tokens(&self) -> usize {
        self.tokens.len()
    }

    fn is_expired(&self, issued: &IssuedToken, now: DateTime<Utc>) -> bool {
        now - issued.issued_at >= self.token_ttl
    }

    fn prune_expired(&mut self, now: DateTime<Utc>) {
        let ttl = self.token_ttl;
        self.tokens.retain(|_, t| now - t.issued_at < ttl);
    }

    /// Returns whether the token was live.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

impl IdentityProvider for Accounts {
    fn sign_up(&mut self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        if self.accounts.contains_key(&email) {
            return Err(AuthError::EmailTaken(email));
        }

        let salt = random_hex(16);
        let record = AccountRecord {
            id: IdentityId::new_random(),
            email: email.clone(),
            digest: digest(&salt, password).to_hex().to_string(),
            salt,
        };
        let identity = record.identity();
        let mut next = self.accounts.clone();
        next.insert(email, record);
        self.save(&next)?;
        self.accounts = next;

        tracing::info!(identity = %identity.id, "account created");
        Ok(identity)
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let record = self
            .accounts
            .get(&email)
            .ok_or(AuthError::InvalidCredentials)?;

        let stored =
            blake3::Hash::from_hex(&record.digest).map_err(|_| AuthError::InvalidCredentials)?;
        // blake3::Hash equality is constant-time.
        if digest(&record.salt, password) != stored {
            tracing::debug!(%email, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(record.identity())
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let e = email.trim().to_lowercase();
    match e.split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(e)
        }
        _ => Err(AuthError::InvalidEmail(email.to_string())),
    }
}

fn digest(salt: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

type Handler = Box<dyn FnMut(Option<&Identity>)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
    notifying: bool,
    dropped_while_notifying: Vec<u64>,
}

/// Client-side session state. Changes are pushed to subscribers.
pub struct Session<P> {
    provider: P,
    current: Option<Identity>,
    listeners: Rc<RefCell<Listeners>>,
}

impl<P: IdentityProvider> Session<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            current: None,
            listeners: Rc::new(RefCell::new(Listeners::default())),
        }
    }

    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Creating an account also signs it in.
    pub fn sign_up(&mut self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.provider.sign_up(email, password)?;
        self.set(Some(identity.clone()));
        Ok(identity)
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.provider.sign_in(email, password)?;
        self.set(Some(identity.clone()));
        Ok(identity)
    }

    pub fn sign_out(&mut self) {
        if self.current.is_some() {
            self.set(None);
        }
    }

    /// Call `handler` now with the current state, then on every login/logout
    /// until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on_session_change(
        &self,
        mut handler: impl FnMut(Option<&Identity>) + 'static,
    ) -> Subscription {
        handler(self.current.as_ref());

        let mut l = self.listeners.borrow_mut();
        let id = l.next_id;
        l.next_id += 1;
        l.handlers.push((id, Box::new(handler)));

        Subscription {
            id,
            listeners: Rc::downgrade(&self.listeners),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.borrow().handlers.len()
    }

    fn set(&mut self, next: Option<Identity>) {
        self.current = next;

        let mut running = {
            let mut l = self.listeners.borrow_mut();
            l.notifying = true;
            std::mem::take(&mut l.handlers)
        };
        for (_, h) in running.iter_mut() {
            h(self.current.as_ref());
        }

        let mut l = self.listeners.borrow_mut();
        l.notifying = false;
        let dropped = std::mem::take(&mut l.dropped_while_notifying);
        running.retain(|(id, _)| !dropped.contains(id));
        running.append(&mut l.handlers);
        l.handlers = running;
    }
}

/// Keeps a session handler registered. Dropping it unregisters the handler.
pub struct Subscription {
    id: u64,
    listeners: Weak<RefCell<Listeners>>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.listeners
            .upgrade()
            .is_some_and(|l| l.borrow().handlers.iter().any(|(id, _)| *id == self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut l = listeners.borrow_mut();
        if l.notifying {
            l.dropped_while_notifying.push(self.id);
        }
        l.handlers.retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Rc<RefCell<Vec<Option<String>>>>, impl FnMut(Option<&Identity>)) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |who: Option<&Identity>| {
            sink.borrow_mut().push(who.map(|i| i.email.clone()))
        })
    }

    #[test]
    fn sign_up_then_sign_in() -> anyhow::Result<()> {
        let mut accounts = Accounts::in_memory();
        let created = accounts.sign_up(" Ada@Example.com ", "hunter22")?;
        assert_eq!(created.email, "ada@example.com");

        let again = accounts.sign_in("ada@example.com", "hunter22")?;
        assert_eq!(again.id, created.id);

        assert!(matches!(
            accounts.sign_in("ada@example.com", "nope-nope"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.sign_in("bob@example.com", "hunter22"),
            Err(AuthError::InvalidCredentials)
        ));
        Ok(())
    }

    #[test]
    fn sign_up_validation() -> anyhow::Result<()> {
        let mut accounts = Accounts::in_memory();
        assert!(matches!(
            accounts.sign_up("not-an-email", "hunter22"),
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            accounts.sign_up("a@b.c", "short"),
            Err(AuthError::WeakPassword)
        ));
        accounts.sign_up("a@b.c", "longenough")?;
        assert!(matches!(
            accounts.sign_up("A@B.C", "longenough"),
            Err(AuthError::EmailTaken(_))
        ));
        Ok(())
    }

    #[test]
    fn tokens_resolve_until_revoked() -> anyhow::Result<()> {
        let mut accounts = Accounts::in_memory();
        let me = accounts.sign_up("me@here.io", "secret!")?;
        let (_, token) = accounts.login("me@here.io", "secret!")?;

        assert_eq!(accounts.identity_for_token(&token), Some(me));
        assert!(accounts.revoke(&token));
        assert_eq!(accounts.identity_for_token(&token), None);
        assert!(!accounts.revoke(&token));
        Ok(())
    }

    #[test]
    fn expired_tokens_stop_resolving() -> anyhow::Result<()> {
        let mut accounts = Accounts::in_memory().with_token_ttl(Duration::zero());
        accounts.sign_up("me@here.io", "secret!")?;
        let (_, token) = accounts.login("me@here.io", "secret!")?;

        assert_eq!(accounts.identity_for_token(&token), None);
        assert_eq!(accounts.live_tokens(), 0);
        Ok(())
    }

    #[test]
    fn login_prunes_stale_tokens() -> anyhow::Result<()> {
        let mut accounts = Accounts::in_memory().with_token_ttl(Duration::zero());
        accounts.sign_up("me@here.io", "secret!")?;
        for _ in 0..5 {
            accounts.login("me@here.io", "secret!")?;
        }
        // Each login clears the ones before it; only the newest is left.
        assert_eq!(accounts.live_tokens(), 1);
        Ok(())
    }

    #[test]
    fn failed_save_does_not_register_account() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("accounts.json");
        let mut accounts = Accounts::open(&path)?;

        // A directory where the file should be makes the write fail.
        fs::create_dir(&path)?;
        assert!(matches!(
            accounts.sign_up("p@q.r", "password"),
            Err(AuthError::Storage(_))
        ));
        assert!(matches!(
            accounts.sign_in("p@q.r", "password"),
            Err(AuthError::InvalidCredentials)
        ));

        fs::remove_dir(&path)?;
        accounts.sign_up("p@q.r", "password")?;
        Ok(())
    }

    #[test]
    fn accounts_persist_across_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("accounts.json");

        let id = Accounts::open(&path)?.sign_up("p@q.r", "password")?.id;
        let mut reopened = Accounts::open(&path)?;
        assert_eq!(reopened.sign_in("p@q.r", "password")?.id, id);

        let text = fs::read_to_string(&path)?;
        assert!(!text.contains("\"password\""));
        Ok(())
    }

    #[test]
    fn subscription_sees_current_state_then_changes() -> anyhow::Result<()> {
        let mut session = Session::new(Accounts::in_memory());
        let (seen, handler) = recorder();
        let sub = session.on_session_change(handler);

        session.sign_up("x@y.z", "abcdef")?;
        session.sign_out();
        session.sign_in("x@y.z", "abcdef")?;

        assert_eq!(
            *seen.borrow(),
            vec![
                None,
                Some("x@y.z".to_string()),
                None,
                Some("x@y.z".to_string())
            ]
        );
        assert!(sub.is_active());
        Ok(())
    }

    #[test]
    fn dropped_subscription_stops_receiving() -> anyhow::Result<()> {
        let mut session = Session::new(Accounts::in_memory());
        let (seen, handler) = recorder();
        let sub = session.on_session_change(handler);
        assert_eq!(session.subscriber_count(), 1);

        drop(sub);
        assert_eq!(session.subscriber_count(), 0);

        session.sign_up("x@y.z", "abcdef")?;
        assert_eq!(seen.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn sign_out_when_signed_out_is_silent() {
        let mut session = Session::new(Accounts::in_memory());
        let (seen, handler) = recorder();
        let _sub = session.on_session_change(handler);
        session.sign_out();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn failed_sign_in_keeps_session() -> anyhow::Result<()> {
        let mut session = Session::new(Accounts::in_memory());
        session.sign_up("x@y.z", "abcdef")?;
        assert!(session.sign_in("x@y.z", "wrong!!").is_err());
        assert_eq!(session.current().map(|i| i.email.as_str()), Some("x@y.z"));
        Ok(())
    }

    #[test]
    fn subscription_outliving_session_is_harmless() {
        let sub = {
            let session = Session::new(Accounts::in_memory());
            session.on_session_change(|_| {})
        };
        assert!(!sub.is_active());
        drop(sub);
    }
}
