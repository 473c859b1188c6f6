use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

pub type SliceId = String;

/// Immutable mapping of database name (e.g. "enwiki") to the slice that
/// hosts it (e.g. "s1"). Cloning is cheap and never exposes the cached copy
/// to mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, SliceId>", into = "HashMap<String, SliceId>")]
pub struct DbList {
    databases: Arc<HashMap<String, SliceId>>,
}

impl DbList {
    pub fn new(databases: HashMap<String, SliceId>) -> Self {
        DbList {
            databases: Arc::new(databases),
        }
    }

    pub fn slice(&self, database: &str) -> Option<&str> {
        self.databases.get(database).map(String::as_str)
    }

    /// Distinct slices referenced by the mapping, sorted.
    pub fn slices(&self) -> BTreeSet<&str> {
        self.databases.values().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.databases
            .iter()
            .map(|(db, slice)| (db.as_str(), slice.as_str()))
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

impl From<HashMap<String, SliceId>> for DbList {
    fn from(databases: HashMap<String, SliceId>) -> Self {
        DbList::new(databases)
    }
}

impl From<DbList> for HashMap<String, SliceId> {
    fn from(db_list: DbList) -> Self {
        Arc::unwrap_or_clone(db_list.databases)
    }
}

impl<D, S> FromIterator<(D, S)> for DbList
where
    D: Into<String>,
    S: Into<SliceId>,
{
    fn from_iter<T: IntoIterator<Item = (D, S)>>(iter: T) -> Self {
        DbList::new(
            iter.into_iter()
                .map(|(db, slice)| (db.into(), slice.into()))
                .collect(),
        )
    }
}

/// A dblist snapshot together with the moment it stops being fresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub db_list: DbList,
    pub expires_at: SystemTime,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: SystemTime) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_db_list_views() {
        let db_list: DbList = [("enwiki", "s1"), ("ptwiki", "s1"), ("dewiki", "s5")]
            .into_iter()
            .collect();

        assert_eq!(db_list.len(), 3);
        assert_eq!(db_list.slice("dewiki"), Some("s5"));
        assert_eq!(db_list.slice("frwiki"), None);
        assert_eq!(
            db_list.slices().into_iter().collect::<Vec<_>>(),
            vec!["s1", "s5"]
        );
    }

    #[test]
    fn test_cache_entry_freshness() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        let entry = CacheEntry {
            db_list: DbList::default(),
            expires_at: now + Duration::from_secs(10),
        };

        assert!(entry.is_fresh(now));
        assert!(entry.is_fresh(now + Duration::from_secs(9)));
        assert!(!entry.is_fresh(now + Duration::from_secs(10)));
    }
}
