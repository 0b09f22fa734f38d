//! LMDB-backed Acl store.
//!
//! Two sub-databases:
//! - `acls`: `[type][id]` → JSON record
//! - `children`: `[parent_type][parent_id][child_type][child_id]` → epoch millis
//!
//! Every save and delete touches both in one write transaction, so a record and
//! its child-index entry never disagree.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use heed::types::{Bytes, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use parking_lot::Mutex;

use crate::config::AclConfig;
use crate::constants::{ACLS_DB, CHILDREN_DB};
use crate::error::{storage, AclError, Result};
use crate::identity::{Hierarchy, ObjectIdentity};
use crate::keys::{acl_key, child_key, children_prefix, parse_child};
use crate::record::AclRecord;
use crate::store::AclStore;

type ChildDb = Database<Bytes, U64<byteorder::BigEndian>>;

pub struct LmdbAclStore {
    env: Env,
    acls: Database<Bytes, Bytes>,
    children: ChildDb,
    hierarchy: Hierarchy,
    // Bounds how long a writer waits behind another writer
    write_gate: Mutex<()>,
    timeout: Duration,
}

fn current_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl LmdbAclStore {
    /// Open (creating if needed) the environment at `config.path`
    pub fn open(config: &AclConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path).map_err(storage)?;
        // SAFETY: LMDB requires no other process to open this path with different flags concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_readers(config.max_readers)
                .max_dbs(2)
                .open(&config.path)
                .map_err(storage)?
        };
        let mut tx = env.write_txn().map_err(storage)?;
        let acls = env.create_database(&mut tx, Some(ACLS_DB)).map_err(storage)?;
        let children = env.create_database(&mut tx, Some(CHILDREN_DB)).map_err(storage)?;
        tx.commit().map_err(storage)?;
        tracing::debug!(path = %config.path.display(), "opened acl store");
        Ok(LmdbAclStore {
            env,
            acls,
            children,
            hierarchy: config.hierarchy.clone(),
            write_gate: Mutex::new(()),
            timeout: config.store_timeout(),
        })
    }

    fn read<T, F: FnOnce(&RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        f(&self.env.read_txn().map_err(storage)?)
    }

    fn write<T, F: FnOnce(&mut RwTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let _gate = self.write_gate.try_lock_for(self.timeout).ok_or_else(|| {
            AclError::StorageUnavailable(format!("no write slot within {:?}", self.timeout))
        })?;
        let mut tx = self.env.write_txn().map_err(storage)?;
        let r = f(&mut tx)?;
        tx.commit().map_err(storage)?;
        Ok(r)
    }

    fn get_record(&self, tx: &RoTxn, oid: &ObjectIdentity) -> Result<Option<AclRecord>> {
        match self.acls.get(tx, acl_key(oid).as_slice()).map_err(storage)? {
            Some(bytes) => AclRecord::from_bytes(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn parent_of(&self, oid: &ObjectIdentity, rec: &AclRecord) -> Result<Option<ObjectIdentity>> {
        self.hierarchy.parent_identity(oid, rec.parent_object_id.as_deref())
    }

    fn put_record(&self, tx: &mut RwTxn, oid: &ObjectIdentity, record: &AclRecord) -> Result<()> {
        let new_parent = self.parent_of(oid, record)?;
        if let Some(old) = self.get_record(tx, oid)? {
            if let Some(old_parent) = self.parent_of(oid, &old)? {
                if Some(&old_parent) != new_parent.as_ref() {
                    self.children.delete(tx, child_key(&old_parent, oid).as_slice()).map_err(storage)?;
                }
            }
        }
        self.acls
            .put(tx, acl_key(oid).as_slice(), record.to_bytes()?.as_slice())
            .map_err(storage)?;
        if let Some(p) = new_parent {
            self.children
                .put(tx, child_key(&p, oid).as_slice(), &current_epoch())
                .map_err(storage)?;
        }
        Ok(())
    }

    /// Number of stored records
    pub fn len(&self) -> Result<u64> {
        self.read(|tx| self.acls.len(tx).map_err(storage))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl AclStore for LmdbAclStore {
    fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    fn find_by_identity(&self, oid: &ObjectIdentity) -> Result<Option<AclRecord>> {
        self.read(|tx| self.get_record(tx, oid))
    }

    fn find_children(&self, oid: &ObjectIdentity) -> Result<Vec<ObjectIdentity>> {
        self.read(|tx| {
            let mut r = Vec::new();
            for item in self.children.prefix_iter(tx, children_prefix(oid).as_slice()).map_err(storage)? {
                let (k, _) = item.map_err(storage)?;
                if let Some(child) = parse_child(k) {
                    r.push(child);
                }
            }
            r.sort();
            Ok(r)
        })
    }

    fn insert(&self, record: &AclRecord) -> Result<()> {
        let oid = record.identity()?;
        self.write(|tx| {
            if self.acls.get(tx, acl_key(&oid).as_slice()).map_err(storage)?.is_some() {
                return Err(AclError::AlreadyExists(oid.clone()));
            }
            self.put_record(tx, &oid, record)
        })
    }

    fn save(&self, record: &AclRecord) -> Result<()> {
        let oid = record.identity()?;
        self.write(|tx| self.put_record(tx, &oid, record))
    }

    fn delete(&self, oid: &ObjectIdentity) -> Result<usize> {
        let n = self.write(|tx| {
            let Some(old) = self.get_record(tx, oid)? else { return Ok(0) };
            if let Some(p) = self.parent_of(oid, &old)? {
                self.children.delete(tx, child_key(&p, oid).as_slice()).map_err(storage)?;
            }
            self.acls.delete(tx, acl_key(oid).as_slice()).map_err(storage)?;
            Ok(1)
        })?;
        if n == 0 {
            tracing::warn!(acl = %oid, "delete removed no record");
        }
        Ok(n)
    }

    fn clear(&self) -> Result<()> {
        self.write(|tx| {
            self.acls.clear(tx).map_err(storage)?;
            self.children.clear(tx).map_err(storage)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SidRecord;
    use tempfile::TempDir;

    fn open() -> (TempDir, LmdbAclStore) {
        let dir = TempDir::new().unwrap();
        let store = LmdbAclStore::open(&AclConfig::new(dir.path())).unwrap();
        (dir, store)
    }

    fn record(t: &str, id: &str, parent: Option<&str>) -> AclRecord {
        AclRecord {
            object_type: t.into(),
            object_id: id.into(),
            owner_sid: SidRecord { name: "alice".into(), is_principal: true },
            parent_object_id: parent.map(Into::into),
            entries_inheriting: true,
            entries: Vec::new(),
        }
    }

    fn oid(t: &str, id: &str) -> ObjectIdentity {
        ObjectIdentity::new(t, id).unwrap()
    }

    #[test]
    fn insert_find_conflict() {
        let (_d, store) = open();
        store.insert(&record("project", "p1", None)).unwrap();
        let got = store.find_by_identity(&oid("project", "p1")).unwrap().unwrap();
        assert_eq!(got.owner_sid.name, "alice");
        assert!(matches!(
            store.insert(&record("project", "p1", None)),
            Err(AclError::AlreadyExists(_))
        ));
        assert_eq!(store.find_by_identity(&oid("project", "nope")).unwrap(), None);
    }

    #[test]
    fn child_index_follows_reparenting() {
        let (_d, store) = open();
        store.insert(&record("project", "p1", None)).unwrap();
        store.insert(&record("project", "p2", None)).unwrap();
        store.insert(&record("run", "r1", Some("p1"))).unwrap();
        assert_eq!(store.find_children(&oid("project", "p1")).unwrap(), vec![oid("run", "r1")]);

        store.save(&record("run", "r1", Some("p2"))).unwrap();
        assert!(store.find_children(&oid("project", "p1")).unwrap().is_empty());
        assert_eq!(store.find_children(&oid("project", "p2")).unwrap(), vec![oid("run", "r1")]);

        store.save(&record("run", "r1", None)).unwrap();
        assert!(store.find_children(&oid("project", "p2")).unwrap().is_empty());
    }

    #[test]
    fn delete_drops_index_entry() {
        let (_d, store) = open();
        store.insert(&record("project", "p1", None)).unwrap();
        store.insert(&record("experiment", "e1", Some("p1"))).unwrap();
        assert_eq!(store.delete(&oid("experiment", "e1")).unwrap(), 1);
        assert_eq!(store.delete(&oid("experiment", "e1")).unwrap(), 0);
        assert!(store.find_children(&oid("project", "p1")).unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn parent_on_root_type_is_rejected() {
        let (_d, store) = open();
        assert!(matches!(
            store.insert(&record("project", "p1", Some("p0"))),
            Err(AclError::Invalid(_))
        ));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = LmdbAclStore::open(&AclConfig::new(dir.path())).unwrap();
            store.insert(&record("project", "p1", None)).unwrap();
        }
        let store = LmdbAclStore::open(&AclConfig::new(dir.path())).unwrap();
        assert!(store.find_by_identity(&oid("project", "p1")).unwrap().is_some());
    }

    #[test]
    fn clear_wipes_everything() {
        let (_d, store) = open();
        store.insert(&record("project", "p1", None)).unwrap();
        store.insert(&record("run", "r1", Some("p1"))).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
        assert!(store.find_children(&oid("project", "p1")).unwrap().is_empty());
    }
}
