use super::*;
use adminq_core::store::{NewRequest, RequestFilter, RequestStore};
use adminq_core::{EntityId, Op};
use chrono::TimeZone;
use tempfile::TempDir;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).single().unwrap()
}

fn new_request(op: Op, target: u64) -> NewRequest {
    NewRequest {
        requester_id: EntityId(1),
        run_at: at(8),
        operation: op,
        target_id: Some(EntityId(target)),
        destination_id: None,
        state_data: Some("group:42".to_string()),
    }
}

fn temp_store() -> (TempDir, JsonStore) {
    let dir = TempDir::new().unwrap();
    let store = JsonStore::open(dir.path().join("requests.json")).unwrap();
    (dir, store)
}

#[test]
fn requests_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("requests.json");

    let id = {
        let store = JsonStore::open(&path).unwrap();
        store.insert(new_request(Op::MoveUser, 7)).unwrap()
    };

    let store = JsonStore::open(&path).unwrap();
    let rows = store.query(&RequestFilter::default(), None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].operation, Op::MoveUser);
    assert_eq!(rows[0].state_data.as_deref(), Some("group:42"));
}

#[test]
fn id_counter_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("requests.json");

    let first = {
        let store = JsonStore::open(&path).unwrap();
        let id = store.insert(new_request(Op::MoveUser, 7)).unwrap();
        store.delete(&RequestFilter::by_id(id)).unwrap();
        id
    };

    let store = JsonStore::open(&path).unwrap();
    let second = store.insert(new_request(Op::MoveUser, 7)).unwrap();
    assert!(second > first);
}

#[test]
fn update_run_at_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("requests.json");

    let id = {
        let store = JsonStore::open(&path).unwrap();
        let id = store.insert(new_request(Op::EmailQuota, 7)).unwrap();
        store.update_run_at(id, at(15)).unwrap();
        id
    };

    let store = JsonStore::open(&path).unwrap();
    let rows = store.query(&RequestFilter::by_id(id), None).unwrap();
    assert_eq!(rows[0].run_at, at(15));
}

#[test]
fn update_unknown_id_is_not_found() {
    let (_dir, store) = temp_store();
    assert!(matches!(
        store.update_run_at(RequestId(5), at(9)),
        Err(StoreError::NotFound(RequestId(5)))
    ));
}

#[test]
fn delete_matches_filter_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("requests.json");

    {
        let store = JsonStore::open(&path).unwrap();
        store.insert(new_request(Op::MoveUser, 7)).unwrap();
        store.insert(new_request(Op::MoveGive, 7)).unwrap();
        store.insert(new_request(Op::MoveUser, 8)).unwrap();
        assert_eq!(
            store.delete(&RequestFilter::by_target(EntityId(7))).unwrap(),
            2
        );
    }

    let store = JsonStore::open(&path).unwrap();
    let rows = store.query(&RequestFilter::default(), None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].target_id, Some(EntityId(8)));
}

#[test]
fn due_before_filters_like_memory_store() {
    let (_dir, store) = temp_store();
    store.insert(new_request(Op::MoveUser, 7)).unwrap();
    let mut later = new_request(Op::MoveUser, 8);
    later.run_at = at(20);
    store.insert(later).unwrap();

    let due = store.query(&RequestFilter::default(), Some(at(10))).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].target_id, Some(EntityId(7)));
}

#[test]
fn corrupt_snapshot_is_reported_not_swallowed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("requests.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
        JsonStore::open(&path),
        Err(StoreError::Corrupt(_))
    ));
}

#[test]
fn no_temp_file_left_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("requests.json");
    let store = JsonStore::open(&path).unwrap();
    store.insert(new_request(Op::MoveUser, 7)).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());
}
