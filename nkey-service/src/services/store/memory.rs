use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{CredentialStore, InviteDeletion, StoreError, UniqueField};
use crate::models::{AccessOverride, App, AuditRecord, InviteCode, NKey, User};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    invite_codes: HashMap<String, InviteCode>,
    apps: BTreeMap<String, App>,
    overrides: HashMap<(Uuid, String), AccessOverride>,
    nkeys: HashMap<String, NKey>,
    audit: Vec<AuditRecord>,
}

impl State {
    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.user_id) != except)
    }
}

/// Process-local store used by tests and by development runs without a
/// `DATABASE_URL`. One mutex guards all state so every call is atomic.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable(anyhow::anyhow!(
                "in-memory store marked unavailable"
            )));
        }
        self.state
            .lock()
            .map_err(|_| StoreError::unavailable(anyhow::anyhow!("in-memory store lock poisoned")))
    }
}

fn page<T: Clone>(items: Vec<&T>, offset: i64, limit: i64) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let rows = items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect();
    (rows, total)
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .users
            .get(&user_id)
            .filter(|u| !u.is_removed())
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username && !u.is_removed())
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.username_taken(&user.username, None) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.username_taken(&user.username, Some(user.user_id)) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), StoreError> {
        let state = self.lock()?;
        let mut users: Vec<&User> = state.users.values().filter(|u| !u.is_removed()).collect();
        users.sort_by(|a, b| b.created_utc.cmp(&a.created_utc).then(a.username.cmp(&b.username)));
        Ok(page(users, offset, limit))
    }

    async fn register_with_invite(
        &self,
        user: &User,
        code: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;

        match state.invite_codes.get(code) {
            Some(invite) if !invite.is_redeemed() => {}
            _ => return Err(StoreError::InviteUnavailable),
        }
        if state.username_taken(&user.username, None) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }

        if let Some(invite) = state.invite_codes.get_mut(code) {
            invite.redeemed_by = Some(user.user_id);
            invite.redeemed_utc = Some(at);
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_invite_code(&self, code: &str) -> Result<Option<InviteCode>, StoreError> {
        Ok(self.lock()?.invite_codes.get(code).cloned())
    }

    async fn insert_invite_code(&self, invite: &InviteCode) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.invite_codes.contains_key(&invite.code) {
            return Err(StoreError::Duplicate(UniqueField::InviteCode));
        }
        state
            .invite_codes
            .insert(invite.code.clone(), invite.clone());
        Ok(())
    }

    async fn delete_unused_invite_code(&self, code: &str) -> Result<InviteDeletion, StoreError> {
        let mut state = self.lock()?;
        match state.invite_codes.get(code) {
            None => Ok(InviteDeletion::NotFound),
            Some(invite) if invite.is_redeemed() => Ok(InviteDeletion::AlreadyRedeemed),
            Some(_) => {
                state.invite_codes.remove(code);
                Ok(InviteDeletion::Deleted)
            }
        }
    }

    async fn list_invite_codes(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<InviteCode>, i64), StoreError> {
        let state = self.lock()?;
        let mut codes: Vec<&InviteCode> = state.invite_codes.values().collect();
        codes.sort_by(|a, b| b.created_utc.cmp(&a.created_utc).then(a.code.cmp(&b.code)));
        Ok(page(codes, offset, limit))
    }

    async fn find_app(&self, app_id: &str) -> Result<Option<App>, StoreError> {
        Ok(self.lock()?.apps.get(app_id).cloned())
    }

    async fn insert_app(&self, app: &App) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.apps.contains_key(&app.app_id) {
            return Err(StoreError::Duplicate(UniqueField::AppId));
        }
        state.apps.insert(app.app_id.clone(), app.clone());
        Ok(())
    }

    async fn save_app(&self, app: &App) -> Result<(), StoreError> {
        self.lock()?.apps.insert(app.app_id.clone(), app.clone());
        Ok(())
    }

    async fn list_apps(&self) -> Result<Vec<App>, StoreError> {
        Ok(self.lock()?.apps.values().cloned().collect())
    }

    async fn find_access_override(
        &self,
        user_id: Uuid,
        app_id: &str,
    ) -> Result<Option<AccessOverride>, StoreError> {
        Ok(self
            .lock()?
            .overrides
            .get(&(user_id, app_id.to_string()))
            .cloned())
    }

    async fn upsert_access_override(&self, entry: &AccessOverride) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let key = (entry.user_id, entry.app_id.clone());
        let mut entry = entry.clone();
        if let Some(existing) = state.overrides.get(&key) {
            entry.created_utc = existing.created_utc;
        }
        state.overrides.insert(key, entry);
        Ok(())
    }

    async fn list_access_overrides_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<AccessOverride>, StoreError> {
        let state = self.lock()?;
        let mut entries: Vec<AccessOverride> = state
            .overrides
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.app_id.cmp(&b.app_id));
        Ok(entries)
    }

    async fn create_nkey(&self, nkey: &NKey) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.nkeys.contains_key(&nkey.key_value) {
            return Err(StoreError::Duplicate(UniqueField::KeyValue));
        }
        state.nkeys.insert(nkey.key_value.clone(), nkey.clone());
        Ok(())
    }

    async fn find_nkey_by_value(&self, key_value: &str) -> Result<Option<NKey>, StoreError> {
        Ok(self.lock()?.nkeys.get(key_value).cloned())
    }

    async fn mark_nkey_first_use(
        &self,
        nkey_id: Uuid,
        app_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(nkey) = state.nkeys.values_mut().find(|k| k.nkey_id == nkey_id) else {
            return Ok(false);
        };
        if nkey.is_used {
            return Ok(false);
        }
        nkey.is_used = true;
        nkey.first_used_utc = Some(at);
        nkey.first_used_app = Some(app_id.to_string());
        Ok(true)
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.lock()?.audit.push(record.clone());
        Ok(())
    }

    async fn list_audit(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<AuditRecord>, i64), StoreError> {
        let state = self.lock()?;
        let mut records: Vec<&AuditRecord> = state.audit.iter().collect();
        records.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(page(records, offset, limit))
    }
}
