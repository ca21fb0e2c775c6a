mod config;
mod crypto;
mod envelope;
mod error;
mod lock;
mod master;
mod storage;
mod store;

pub use crate::config::{Config, DEFAULT_PROFILE};
pub use crate::crypto::{KdfParams, random_printable};
pub use crate::envelope::{Envelope, EnvelopeCodec};
pub use crate::error::{Result, VaultError};
pub use crate::lock::{LockGuard, remove_stale_lock};
pub use crate::master::{MasterPasswordManager, PasswordDigest};
pub use crate::storage::Storage;
pub use crate::store::{Entry, Store};

use zeroize::Zeroizing;

/// A master password that matched the store's digest.
///
/// Only [`Vault::unlock`] hands these out, so every operation that writes or
/// reads an envelope is keyed by a password the store accepted.
pub struct MasterPassword(Zeroizing<String>);

impl MasterPassword {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Field changes for [`Vault::update`]; `None` keeps the current value.
#[derive(Debug, Default, Clone)]
pub struct EntryUpdate {
    pub unique_id: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub site: Option<String>,
    pub id: Option<String>,
    pub password: Option<String>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.unique_id.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.site.is_none()
            && self.id.is_none()
            && self.password.is_none()
    }
}

/// One profile's vault: its store file plus the envelope codec.
///
/// Every operation reads the whole store, changes it in memory and writes it
/// back; nothing is cached between calls.
pub struct Vault {
    storage: Storage,
    codec: EnvelopeCodec,
}

impl Vault {
    pub fn new(storage: Storage) -> Self {
        Self::with_kdf(storage, KdfParams::STANDARD)
    }

    /// Vault with non-standard Argon2 parameters. Stores written this way
    /// cannot be opened by [`Vault::new`].
    pub fn with_kdf(storage: Storage, kdf: KdfParams) -> Self {
        Self {
            storage,
            codec: EnvelopeCodec::new(kdf),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    pub fn master_password(&self) -> MasterPasswordManager<'_> {
        MasterPasswordManager::new(&self.storage, self.codec)
    }

    /// Creates the empty store for this profile if it does not exist.
    pub fn init(&self) -> Result<()> {
        self.storage.init_if_missing()
    }

    pub fn is_master_password_set(&self) -> Result<bool> {
        self.master_password().is_set()
    }

    pub fn is_master_password_correct(&self, candidate: &str) -> Result<bool> {
        self.master_password().is_correct(candidate)
    }

    pub fn set_master_password(&self, old: &str, new: &str) -> Result<()> {
        self.master_password().set_master_password(old, new)
    }

    /// Checks `candidate` against the stored digest.
    pub fn unlock(&self, candidate: Zeroizing<String>) -> Result<MasterPassword> {
        if self.is_master_password_correct(&candidate)? {
            Ok(MasterPassword(candidate))
        } else {
            Err(VaultError::IncorrectMasterPassword)
        }
    }

    /// Adds an entry whose `id` and `password` are plaintext; they are
    /// encrypted before the store is written. An empty unique id gets a
    /// random UUID. Returns the entry's unique id.
    pub fn add(&self, master: &MasterPassword, mut entry: Entry) -> Result<String> {
        let mut store = self.storage.load()?;

        if entry.unique_id.is_empty() {
            entry.unique_id = uuid::Uuid::new_v4().to_string();
        }
        if store.contains(&entry.unique_id) {
            return Err(VaultError::AlreadyExists(entry.unique_id));
        }

        entry.id = self.codec.encrypt(master.as_str(), &entry.id)?;
        entry.password = self.codec.encrypt(master.as_str(), &entry.password)?;

        let unique_id = entry.unique_id.clone();
        store.add(entry)?;
        self.storage.save(&store)?;

        Ok(unique_id)
    }

    /// Non-sensitive fields of one entry.
    pub fn get(&self, unique_id: &str) -> Result<Entry> {
        self.storage
            .load()?
            .get(unique_id)
            .map(Entry::redacted)
            .ok_or_else(|| VaultError::NotFound(unique_id.to_string()))
    }

    /// One entry with `id` and `password` decrypted.
    pub fn get_sensitive(&self, master: &MasterPassword, unique_id: &str) -> Result<Entry> {
        let store = self.storage.load()?;
        let entry = store
            .get(unique_id)
            .ok_or_else(|| VaultError::NotFound(unique_id.to_string()))?;

        Ok(Entry {
            id: self.codec.decrypt(master.as_str(), &entry.id)?.to_string(),
            password: self.codec.decrypt(master.as_str(), &entry.password)?.to_string(),
            ..entry.clone()
        })
    }

    /// Applies `update` to an entry. Returns the entry's unique id after the
    /// update.
    pub fn update(
        &self,
        master: &MasterPassword,
        unique_id: &str,
        update: EntryUpdate,
    ) -> Result<String> {
        let mut store = self.storage.load()?;

        let current_id = match update.unique_id {
            Some(new_id) => {
                store.rename(unique_id, &new_id)?;
                new_id
            }
            None => unique_id.to_string(),
        };

        let entry = store.get_mut(&current_id)?;
        if let Some(description) = update.description {
            entry.description = description;
        }
        if let Some(tags) = update.tags {
            entry.tags = tags;
        }
        if let Some(site) = update.site {
            entry.site = site;
        }
        if let Some(id) = update.id {
            entry.id = self.codec.encrypt(master.as_str(), &id)?;
        }
        if let Some(password) = update.password {
            entry.password = self.codec.encrypt(master.as_str(), &password)?;
        }

        self.storage.save(&store)?;
        Ok(current_id)
    }

    /// Deletes an entry. Requires the unlocked master password.
    pub fn remove(&self, _master: &MasterPassword, unique_id: &str) -> Result<()> {
        let mut store = self.storage.load()?;
        store.remove(unique_id)?;
        self.storage.save(&store)
    }

    /// Non-sensitive fields of every entry, in store order.
    pub fn list(&self) -> Result<Vec<Entry>> {
        Ok(self
            .storage
            .load()?
            .entries()
            .iter()
            .map(Entry::redacted)
            .collect())
    }

    pub fn search(&self, term: &str, case_sensitive: bool) -> Result<Vec<Entry>> {
        Ok(self
            .storage
            .load()?
            .search(term, case_sensitive)
            .into_iter()
            .map(Entry::redacted)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{TempDir, tempdir};

    use super::*;

    fn fast_vault() -> (TempDir, Vault) {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("default.json"));
        let vault = Vault::with_kdf(storage, KdfParams::new(1024, 1, 1).unwrap());
        vault.init().unwrap();
        (dir, vault)
    }

    fn pw(s: &str) -> Zeroizing<String> {
        Zeroizing::new(s.to_string())
    }

    fn unlocked(vault: &Vault, password: &str) -> MasterPassword {
        vault.set_master_password("", password).unwrap();
        vault.unlock(pw(password)).unwrap()
    }

    fn entry(unique_id: &str, id: &str, password: &str) -> Entry {
        Entry {
            unique_id: unique_id.into(),
            description: "desc".into(),
            tags: vec!["t1".into(), "t2".into()],
            site: "https://example.com".into(),
            id: id.into(),
            password: password.into(),
        }
    }

    #[test]
    fn unlock_rejects_wrong_password() {
        let (_dir, vault) = fast_vault();
        vault.set_master_password("", "pw").unwrap();

        assert!(vault.unlock(pw("pw")).is_ok());
        assert!(matches!(
            vault.unlock(pw("nope")),
            Err(VaultError::IncorrectMasterPassword)
        ));
    }

    #[test]
    fn add_encrypts_sensitive_fields() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");

        vault.add(&master, entry("A", "myId", "secret")).unwrap();

        let raw = fs::read_to_string(vault.storage().path()).unwrap();
        assert!(!raw.contains("myId"));
        assert!(!raw.contains("secret"));

        let stored = vault.storage().load().unwrap();
        let e = stored.get("A").unwrap();
        assert_eq!(vault.codec().decrypt("pw", &e.id).unwrap().as_str(), "myId");
    }

    #[test]
    fn add_generates_unique_id_when_empty() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");

        let id = vault.add(&master, entry("", "i", "p")).unwrap();

        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert!(vault.get(&id).is_ok());
    }

    #[test]
    fn add_existing_unique_id_fails() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");
        vault.add(&master, entry("A", "i", "p")).unwrap();

        assert!(matches!(
            vault.add(&master, entry("A", "i", "p")),
            Err(VaultError::AlreadyExists(_))
        ));
        assert_eq!(vault.list().unwrap().len(), 1);
    }

    #[test]
    fn get_hides_and_get_sensitive_reveals() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");
        vault.add(&master, entry("A", "myId", "secret")).unwrap();

        let public = vault.get("A").unwrap();
        assert_eq!(public.id, "");
        assert_eq!(public.password, "");
        assert_eq!(public.tags, ["t1", "t2"]);

        let full = vault.get_sensitive(&master, "A").unwrap();
        assert_eq!(full.id, "myId");
        assert_eq!(full.password, "secret");

        assert!(matches!(vault.get("B"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn update_only_touches_given_fields() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");
        vault.add(&master, entry("A", "myId", "secret")).unwrap();

        let new_id = vault
            .update(
                &master,
                "A",
                EntryUpdate {
                    unique_id: Some("B".into()),
                    password: Some("changed".into()),
                    ..EntryUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(new_id, "B");
        assert!(matches!(vault.get("A"), Err(VaultError::NotFound(_))));
        let full = vault.get_sensitive(&master, "B").unwrap();
        assert_eq!(full.id, "myId");
        assert_eq!(full.password, "changed");
        assert_eq!(full.description, "desc");
        assert_eq!(full.site, "https://example.com");
    }

    #[test]
    fn update_cannot_steal_an_existing_unique_id() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");
        vault.add(&master, entry("A", "i", "p")).unwrap();
        vault.add(&master, entry("B", "i", "p")).unwrap();

        let update = EntryUpdate {
            unique_id: Some("B".into()),
            ..EntryUpdate::default()
        };
        assert!(matches!(
            vault.update(&master, "A", update),
            Err(VaultError::AlreadyExists(_))
        ));
        assert!(matches!(
            vault.update(&master, "Z", EntryUpdate::default()),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn remove_works() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");
        vault.add(&master, entry("A", "i", "p")).unwrap();

        vault.remove(&master, "A").unwrap();
        assert!(vault.list().unwrap().is_empty());
        assert!(matches!(
            vault.remove(&master, "A"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn list_and_search_are_redacted() {
        let (_dir, vault) = fast_vault();
        let master = unlocked(&vault, "pw");
        vault.add(&master, entry("github", "i", "p")).unwrap();
        vault.add(&master, entry("bank", "i", "p")).unwrap();

        let all = vault.list().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|e| e.id.is_empty() && e.password.is_empty()));

        let hits = vault.search("GIT", false).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unique_id, "github");
        assert!(hits[0].password.is_empty());
    }

    #[test]
    fn rotation_scenario_with_standard_params() {
        let dir = tempdir().unwrap();
        let vault = Vault::new(Storage::new(dir.path().join("default.json")));
        vault.init().unwrap();

        let master = unlocked(&vault, "pass");
        vault.add(&master, entry("id1", "myId", "p4$$w0rd!")).unwrap();

        vault.set_master_password("pass", "newpass").unwrap();

        let store = vault.storage().load().unwrap();
        let e = store.get("id1").unwrap();
        assert_eq!(
            vault.codec().decrypt("newpass", &e.password).unwrap().as_str(),
            "p4$$w0rd!"
        );
        assert!(vault.unlock(pw("pass")).is_err());
    }
}
