use serde::{Deserialize, Deserializer, Serialize};

use crate::error::VaultError;

/// One profile's vault document.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Store {
    #[serde(default)]
    master_password: String,
    #[serde(default, deserialize_with = "null_as_default")]
    entries: Vec<Entry>,
}

/// A credential. `id` and `password` hold envelope strings, never plaintext.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    #[serde(default)]
    pub unique_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub password: String,
}

// older stores serialize an empty tag list as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Entry {
    /// Copy without the sensitive fields.
    pub fn redacted(&self) -> Entry {
        Entry {
            id: String::new(),
            password: String::new(),
            ..self.clone()
        }
    }

    /// Case-(in)sensitive substring match on unique id, description, tags
    /// and site.
    pub fn matches(&self, term: &str, case_sensitive: bool) -> bool {
        let normalize = |s: &str| {
            if case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };
        let term = normalize(term);

        std::iter::once(&self.unique_id)
            .chain(std::iter::once(&self.description))
            .chain(self.tags.iter())
            .chain(std::iter::once(&self.site))
            .any(|field| normalize(field).contains(&term))
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn master_password_hash(&self) -> &str {
        &self.master_password
    }

    pub(crate) fn set_master_password_hash(&mut self, hash: String) {
        self.master_password = hash;
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.entries.iter().any(|e| e.unique_id == unique_id)
    }

    pub fn add(&mut self, entry: Entry) -> Result<(), VaultError> {
        if self.contains(&entry.unique_id) {
            return Err(VaultError::AlreadyExists(entry.unique_id));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, unique_id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.unique_id == unique_id)
    }

    pub fn get_mut(&mut self, unique_id: &str) -> Result<&mut Entry, VaultError> {
        self.entries
            .iter_mut()
            .find(|e| e.unique_id == unique_id)
            .ok_or_else(|| VaultError::NotFound(unique_id.to_string()))
    }

    /// Rename an entry, keeping unique ids unique.
    pub fn rename(&mut self, unique_id: &str, new_unique_id: &str) -> Result<(), VaultError> {
        if unique_id == new_unique_id {
            return Ok(());
        }
        if self.contains(new_unique_id) {
            return Err(VaultError::AlreadyExists(new_unique_id.to_string()));
        }
        self.get_mut(unique_id)?.unique_id = new_unique_id.to_string();
        Ok(())
    }

    pub fn remove(&mut self, unique_id: &str) -> Result<Entry, VaultError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.unique_id == unique_id)
            .ok_or_else(|| VaultError::NotFound(unique_id.to_string()))?;
        Ok(self.entries.remove(idx))
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(crate) fn replace_entries(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
    }

    /// Entries matching `term`, each at most once, in store order.
    pub fn search(&self, term: &str, case_sensitive: bool) -> Vec<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.matches(term, case_sensitive))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(unique_id: &str) -> Entry {
        Entry {
            unique_id: unique_id.to_string(),
            description: format!("{unique_id} account"),
            tags: vec!["Work".into(), "mail".into()],
            site: "https://example.com".into(),
            id: "id-envelope".into(),
            password: "password-envelope".into(),
        }
    }

    #[test]
    fn create_new_store_works() {
        let store = Store::new();
        assert_eq!(store.master_password_hash(), "");
        assert!(store.is_empty());
    }

    #[test]
    fn add_and_get_works() {
        let mut store = Store::new();
        store.add(entry("A")).unwrap();
        assert_eq!(store.get("A").unwrap().site, "https://example.com");
        assert!(store.get("B").is_none());
    }

    #[test]
    fn add_existing_unique_id_fails() {
        let mut store = Store::new();
        store.add(entry("A")).unwrap();
        match store.add(entry("A")) {
            Err(VaultError::AlreadyExists(k)) => assert_eq!(k, "A"),
            other => panic!("expected AlreadyExists, got: {other:?}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rename_onto_existing_fails() {
        let mut store = Store::new();
        store.add(entry("A")).unwrap();
        store.add(entry("B")).unwrap();

        assert!(matches!(
            store.rename("A", "B"),
            Err(VaultError::AlreadyExists(_))
        ));
        store.rename("A", "C").unwrap();
        assert!(store.contains("C"));
        assert!(!store.contains("A"));
    }

    #[test]
    fn remove_works_and_keeps_order() {
        let mut store = Store::new();
        for id in ["A", "B", "C"] {
            store.add(entry(id)).unwrap();
        }
        store.remove("B").unwrap();

        let ids: Vec<_> = store.entries().iter().map(|e| e.unique_id.as_str()).collect();
        assert_eq!(ids, ["A", "C"]);
    }

    #[test]
    fn remove_not_existing_fails() {
        let mut store = Store::new();
        match store.remove("A") {
            Err(VaultError::NotFound(k)) => assert_eq!(k, "A"),
            other => panic!("expected NotFound, got: {other:?}"),
        }
    }

    #[test]
    fn search_matches_each_entry_once() {
        let mut store = Store::new();
        store.add(entry("github")).unwrap();
        let mut other = entry("bank");
        other.tags = vec!["finance".into()];
        other.site = "https://bank.test".into();
        other.description = "savings".into();
        store.add(other).unwrap();

        // matches unique id, description and site of the same entry
        let hits = store.search("git", false);
        assert_eq!(hits.len(), 1);

        assert_eq!(store.search("WORK", false).len(), 1);
        assert!(store.search("WORK", true).is_empty());
        assert_eq!(store.search("Work", true).len(), 1);
        assert_eq!(store.search("", false).len(), 2);
    }

    #[test]
    fn redacted_drops_sensitive_fields() {
        let e = entry("A").redacted();
        assert_eq!(e.id, "");
        assert_eq!(e.password, "");
        assert_eq!(e.unique_id, "A");
    }

    #[test]
    fn deserializes_legacy_documents() {
        let empty: Store = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Store::new());

        let json = r#"{"master_password":"h","entries":[{"unique_id":"x","description":"","tags":null,"site":"","id":"a","password":"b"}]}"#;
        let store: Store = serde_json::from_str(json).unwrap();
        assert!(store.get("x").unwrap().tags.is_empty());
    }

    #[test]
    fn serializes_with_expected_field_names() {
        let mut store = Store::new();
        store.add(entry("A")).unwrap();
        let value = serde_json::to_value(&store).unwrap();

        assert!(value.get("master_password").is_some());
        let e = &value["entries"][0];
        for field in ["unique_id", "description", "tags", "site", "id", "password"] {
            assert!(e.get(field).is_some(), "missing {field}");
        }
    }
}
