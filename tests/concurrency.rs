//! Checks racing against updates on one shared engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use objacl::{
    AclConfig, AclEngine, AclRecord, AclStore, Hierarchy, MemoryAclStore, ObjectIdentity, Permission, Result, Sid,
};
use tempfile::TempDir;

fn oid(t: &str, id: &str) -> ObjectIdentity {
    ObjectIdentity::new(t, id).unwrap()
}

#[test]
fn readers_never_error_while_grants_flip() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(AclEngine::open(&AclConfig::new(dir.path())).unwrap());
    let alice = Sid::principal("alice");
    engine.create_acl(&alice, &oid("project", "p")).unwrap();
    for i in 0..4 {
        engine.create_child_acl(&alice, &oid("run", &format!("r{i}")), "p").unwrap();
    }

    let writer = {
        let engine = engine.clone();
        thread::spawn(move || {
            let bob = Sid::principal("bob");
            for _ in 0..50 {
                engine.grant_permission(&oid("project", "p"), &bob, Permission::VIEWER).unwrap();
                engine.revoke_permission(&oid("project", "p"), &bob).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                let run = oid("run", &format!("r{i}"));
                for _ in 0..200 {
                    // Either answer is fine mid-flight; the owner is always in
                    engine.has_permission(&Sid::principal("bob"), &run, Permission::VIEWER).unwrap();
                    assert!(engine.has_permission(&Sid::principal("alice"), &run, Permission::OWNER).unwrap());
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    // Writer ended on a revoke
    for i in 0..4 {
        let run = oid("run", &format!("r{i}"));
        assert!(!engine.has_permission(&Sid::principal("bob"), &run, Permission::VIEWER).unwrap());
    }
}

#[test]
fn concurrent_creates_of_distinct_objects() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(AclEngine::open(&AclConfig::new(dir.path())).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            thread::spawn(move || {
                let owner = Sid::principal(format!("u{i}"));
                engine.create_acl(&owner, &oid("project", &format!("p{i}"))).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for i in 0..8 {
        let p = engine.read_acl(&oid("project", &format!("p{i}"))).unwrap();
        assert_eq!(p.owner(), &Sid::principal(format!("u{i}")));
    }
}

// ============================================================================
// Load racing an eviction
// ============================================================================

/// Memory store that, once armed, parks the next reader of `target` right after
/// it has read the record
struct PausingStore {
    inner: MemoryAclStore,
    target: ObjectIdentity,
    armed: AtomicBool,
    loaded: Mutex<Sender<()>>,
    resume: Mutex<Receiver<()>>,
}

impl AclStore for PausingStore {
    fn hierarchy(&self) -> &Hierarchy {
        self.inner.hierarchy()
    }

    fn find_by_identity(&self, oid: &ObjectIdentity) -> Result<Option<AclRecord>> {
        let rec = self.inner.find_by_identity(oid)?;
        if *oid == self.target && self.armed.swap(false, Ordering::SeqCst) {
            self.loaded.lock().unwrap().send(()).unwrap();
            self.resume.lock().unwrap().recv().unwrap();
        }
        Ok(rec)
    }

    fn find_children(&self, oid: &ObjectIdentity) -> Result<Vec<ObjectIdentity>> {
        self.inner.find_children(oid)
    }

    fn insert(&self, record: &AclRecord) -> Result<()> {
        self.inner.insert(record)
    }

    fn save(&self, record: &AclRecord) -> Result<()> {
        self.inner.save(record)
    }

    fn delete(&self, oid: &ObjectIdentity) -> Result<usize> {
        self.inner.delete(oid)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

/// A reader holding the pre-revoke record must not cache it after the revoke's
/// eviction
#[test]
fn snapshot_loaded_before_revoke_is_not_cached() {
    let (loaded_tx, loaded_rx) = channel();
    let (resume_tx, resume_rx) = channel();
    let store = Arc::new(PausingStore {
        inner: MemoryAclStore::new(Hierarchy::default()),
        target: oid("project", "p"),
        armed: AtomicBool::new(false),
        loaded: Mutex::new(loaded_tx),
        resume: Mutex::new(resume_rx),
    });
    let engine = Arc::new(AclEngine::with_store(store.clone()));
    let alice = Sid::principal("alice");
    let bob = Sid::principal("bob");
    engine.create_acl(&alice, &oid("project", "p")).unwrap();
    engine.create_child_acl(&alice, &oid("run", "r"), "p").unwrap();
    engine.grant_permission(&oid("project", "p"), &bob, Permission::VIEWER).unwrap();
    engine.cache().clear();

    store.armed.store(true, Ordering::SeqCst);
    let reader = {
        let engine = engine.clone();
        thread::spawn(move || {
            engine.has_permission(&Sid::principal("bob"), &oid("run", "r"), Permission::VIEWER).unwrap()
        })
    };

    // Reader now holds the record with bob's grant
    loaded_rx.recv().unwrap();
    assert_eq!(engine.revoke_permission(&oid("project", "p"), &bob).unwrap(), 1);
    resume_tx.send(()).unwrap();
    // Answered from its own in-flight snapshot
    assert!(reader.join().unwrap());

    for _ in 0..3 {
        assert!(!engine.has_permission(&bob, &oid("run", "r"), Permission::VIEWER).unwrap());
        assert!(!engine.has_permission(&bob, &oid("project", "p"), Permission::VIEWER).unwrap());
    }
}
