//! Persisted client state: session tokens, the signed-in user, and the
//! patient's own record of doses taken.

use chrono::NaiveDate;
use hass_integrity::User;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::error::ClientResult;

pub const ACCESS_TOKEN_KEY: &str = "hass_access_token";
pub const REFRESH_TOKEN_KEY: &str = "hass_refresh_token";
pub const USER_KEY: &str = "hass_user";
pub const RX_TAKEN_KEY: &str = "rx_taken";

/// String key/value store the client keeps its session in.
pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;
}

/// A panic while holding the lock leaves the map intact, so keep using it.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        locked(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        locked(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        locked(&self.values).remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
            Ok(_) => BTreeMap::new(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, values: &BTreeMap<String, String>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }

    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> ClientResult<()> {
        let mut values = locked(&self.values);
        change(&mut values);
        self.write(&values)
    }
}

impl ClientStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        locked(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

/// Tokens and user of the current session
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

pub fn load_session(storage: &dyn ClientStorage) -> Option<Session> {
    let access_token = storage.get(ACCESS_TOKEN_KEY)?;
    Some(Session {
        access_token,
        refresh_token: storage.get(REFRESH_TOKEN_KEY),
        user: storage.get(USER_KEY).and_then(|text| serde_json::from_str(&text).ok()),
    })
}

pub fn save_session(storage: &dyn ClientStorage, session: &Session) -> ClientResult<()> {
    storage.set(ACCESS_TOKEN_KEY, &session.access_token)?;
    match &session.refresh_token {
        Some(token) => storage.set(REFRESH_TOKEN_KEY, token)?,
        None => storage.remove(REFRESH_TOKEN_KEY)?,
    }
    match &session.user {
        Some(user) => storage.set(USER_KEY, &serde_json::to_string(user)?)?,
        None => storage.remove(USER_KEY)?,
    }
    Ok(())
}

/// Forget the session. The dose log is the patient's own and stays.
pub fn clear_session(storage: &dyn ClientStorage) -> ClientResult<()> {
    storage.remove(ACCESS_TOKEN_KEY)?;
    storage.remove(REFRESH_TOKEN_KEY)?;
    storage.remove(USER_KEY)
}

/// Days on which the patient marked each prescription as taken.
/// Kept on the client only; the server never sees it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoseLog {
    taken: BTreeMap<Uuid, BTreeSet<NaiveDate>>,
}

impl DoseLog {
    pub fn load(storage: &dyn ClientStorage) -> Self {
        storage
            .get(RX_TAKEN_KEY)
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, storage: &dyn ClientStorage) -> ClientResult<()> {
        storage.set(RX_TAKEN_KEY, &serde_json::to_string(self)?)
    }

    /// Returns false if the dose was already marked.
    pub fn mark_taken(&mut self, prescription_id: Uuid, day: NaiveDate) -> bool {
        self.taken.entry(prescription_id).or_default().insert(day)
    }

    pub fn unmark(&mut self, prescription_id: Uuid, day: NaiveDate) {
        if let Some(days) = self.taken.get_mut(&prescription_id) {
            days.remove(&day);
            if days.is_empty() {
                self.taken.remove(&prescription_id);
            }
        }
    }

    pub fn is_taken(&self, prescription_id: Uuid, day: NaiveDate) -> bool {
        self.taken.get(&prescription_id).is_some_and(|days| days.contains(&day))
    }

    pub fn days_taken(&self, prescription_id: Uuid) -> usize {
        self.taken.get(&prescription_id).map_or(0, BTreeSet::len)
    }
}
