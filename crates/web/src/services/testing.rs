//! In-memory stand-ins for service tests.

use std::sync::Mutex;

use chrono::Utc;

use foodi_core::{AccountId, Email, PermissionTier};

use crate::broker::IdentityBroker;
use crate::db::{AccountStore, RepositoryError};
use crate::models::{Account, AccountStats, NewAccount, ProfileUpdate};

/// Account store backed by a vector.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<Vec<Account>>,
}

impl MemoryAccountStore {
    pub fn snapshot(&self) -> Vec<Account> {
        self.accounts.lock().unwrap().clone()
    }

    pub fn get(&self, id: AccountId) -> Account {
        self.snapshot().into_iter().find(|a| a.id == id).unwrap()
    }

    fn update(
        &self,
        id: AccountId,
        f: impl FnOnce(&mut Account),
    ) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound)?;
        f(account);
        Ok(account.clone())
    }
}

impl AccountStore for MemoryAccountStore {
    async fn create(&self, input: NewAccount) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.iter().any(|a| {
            a.handle.as_str().eq_ignore_ascii_case(input.handle.as_str()) || a.email == input.email
        }) {
            return Err(RepositoryError::Conflict("handle or email already exists".into()));
        }
        let id = AccountId::new(i32::try_from(accounts.len()).unwrap() + 1);
        let account = Account {
            id,
            handle: input.handle,
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            tier: input.tier,
            remote_roles: Vec::new(),
            is_active: true,
            remote_id: None,
            synced: false,
            created_at: Utc::now(),
            modified_at: None,
            deactivated_at: None,
        };
        accounts.push(account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.snapshot().into_iter().find(|a| a.id == id))
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<Account>, RepositoryError> {
        let identifier = identifier.trim();
        Ok(self.snapshot().into_iter().find(|a| {
            a.handle.as_str().eq_ignore_ascii_case(identifier)
                || a.email.as_str().eq_ignore_ascii_case(identifier)
        }))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        Ok(self.snapshot().into_iter().find(|a| &a.email == email))
    }

    async fn exists_with_handle_or_email(
        &self,
        handle: &str,
        email: &Email,
    ) -> Result<bool, RepositoryError> {
        Ok(self.snapshot().iter().any(|a| {
            a.handle.as_str().eq_ignore_ascii_case(handle.trim()) || &a.email == email
        }))
    }

    async fn email_taken_by_other(
        &self,
        email: &Email,
        except: AccountId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .snapshot()
            .iter()
            .any(|a| &a.email == email && a.id != except))
    }

    async fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
    ) -> Result<Account, RepositoryError> {
        self.update(id, |a| {
            a.email = update.email.clone();
            a.first_name.clone_from(&update.first_name);
            a.last_name.clone_from(&update.last_name);
            a.modified_at = Some(Utc::now());
        })
    }

    async fn update_password_hash(
        &self,
        id: AccountId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        self.update(id, |a| {
            a.password_hash = password_hash.to_owned();
            a.modified_at = Some(Utc::now());
        })
        .map(|_| ())
    }

    async fn set_active(&self, id: AccountId, active: bool) -> Result<Account, RepositoryError> {
        self.update(id, |a| {
            a.is_active = active;
            a.deactivated_at = if active { None } else { Some(Utc::now()) };
            a.modified_at = Some(Utc::now());
        })
    }

    async fn set_tier(
        &self,
        id: AccountId,
        tier: PermissionTier,
    ) -> Result<Account, RepositoryError> {
        self.update(id, |a| a.tier = tier)
    }

    async fn set_remote_roles(
        &self,
        id: AccountId,
        labels: &[String],
    ) -> Result<Account, RepositoryError> {
        self.update(id, |a| a.remote_roles = labels.to_vec())
    }

    async fn mark_synced(&self, id: AccountId, remote_id: &str) -> Result<Account, RepositoryError> {
        self.update(id, |a| {
            a.remote_id = Some(remote_id.to_owned());
            a.synced = true;
        })
    }

    async fn list_all(&self) -> Result<Vec<Account>, RepositoryError> {
        let mut accounts = self.snapshot();
        accounts.reverse();
        Ok(accounts)
    }

    async fn stats(&self) -> Result<AccountStats, RepositoryError> {
        let accounts = self.snapshot();
        let count = |f: fn(&Account) -> bool| {
            i64::try_from(accounts.iter().filter(|a| f(a)).count()).unwrap()
        };
        Ok(AccountStats {
            total: count(|_| true),
            active: count(|a| a.is_active),
            inactive: count(|a| !a.is_active),
            synced: count(|a| a.synced),
        })
    }
}

/// Broker double that records calls and succeeds or fails on demand.
#[derive(Default)]
pub struct RecordingBroker {
    pub fail: bool,
    pub roles: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingBroker {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_roles(roles: &[&str]) -> Self {
        Self {
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> bool {
        self.calls.lock().unwrap().push(call);
        !self.fail
    }
}

impl IdentityBroker for RecordingBroker {
    async fn create_user(&self, account: &Account, _password: &str) -> Option<String> {
        self.record(format!("create {}", account.handle))
            .then(|| format!("remote-{}", account.id))
    }

    async fn update_profile(&self, account: &Account) -> bool {
        self.record(format!("update {}", account.handle))
    }

    async fn set_enabled(&self, remote_id: &str, enabled: bool) -> bool {
        self.record(format!("enabled {remote_id} {enabled}"))
    }

    async fn reset_password(&self, remote_id: &str, password: &str) -> bool {
        self.record(format!("password {remote_id} {password}"))
    }

    async fn sync_tier(&self, remote_id: &str, tier: PermissionTier) -> bool {
        self.record(format!("tier {remote_id} {}", tier.as_str()))
    }

    async fn replace_roles(&self, remote_id: &str, labels: &[String]) -> bool {
        self.record(format!("roles {remote_id} {}", labels.join(",")))
    }

    async fn available_roles(&self) -> Vec<String> {
        if self.fail { Vec::new() } else { self.roles.clone() }
    }

    async fn invalidate_role_cache(&self) {
        self.calls.lock().unwrap().push("invalidate".to_string());
    }
}
