use super::*;
use chrono::TimeZone;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).single().unwrap()
}

fn new_request(op: Op, target: u64, run_at: DateTime<Utc>) -> NewRequest {
    NewRequest {
        requester_id: EntityId(1),
        run_at,
        operation: op,
        target_id: Some(EntityId(target)),
        destination_id: None,
        state_data: None,
    }
}

#[test]
fn insert_allocates_monotonic_ids() {
    let store = MemoryStore::new();
    let a = store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    let b = store.insert(new_request(Op::DeleteUser, 7, at(9))).unwrap();
    let c = store.insert(new_request(Op::EmailCreate, 8, at(10))).unwrap();
    assert!(a < b && b < c);
}

#[test]
fn update_run_at_rewrites_the_row() {
    let store = MemoryStore::new();
    let id = store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    store.update_run_at(id, at(11)).unwrap();

    let rows = store.query(&RequestFilter::by_id(id), None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].run_at, at(11));
}

#[test]
fn update_run_at_unknown_id_is_not_found() {
    let store = MemoryStore::new();
    let err = store.update_run_at(RequestId(99), at(11)).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(RequestId(99))));
}

#[test]
fn filter_fields_are_anded() {
    let store = MemoryStore::new();
    store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    store.insert(new_request(Op::MoveUser, 8, at(8))).unwrap();
    store.insert(new_request(Op::DeleteUser, 7, at(8))).unwrap();

    let filter = RequestFilter {
        operation: Some(Op::MoveUser),
        target_id: Some(EntityId(7)),
        ..RequestFilter::default()
    };
    let rows = store.query(&filter, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].operation, Op::MoveUser);
    assert_eq!(rows[0].target_id, Some(EntityId(7)));
}

#[test]
fn empty_filter_matches_everything() {
    let store = MemoryStore::new();
    store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    store.insert(new_request(Op::EmailQuota, 8, at(9))).unwrap();

    let rows = store.query(&RequestFilter::default(), None).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn due_before_excludes_future_rows() {
    let store = MemoryStore::new();
    store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    store.insert(new_request(Op::MoveUser, 8, at(12))).unwrap();

    let rows = store
        .query(&RequestFilter::default(), Some(at(9)))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].target_id, Some(EntityId(7)));
}

#[test]
fn due_before_is_inclusive() {
    let store = MemoryStore::new();
    store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();

    let rows = store.query(&RequestFilter::default(), Some(at(8))).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn delete_returns_count_and_zero_matches_is_ok() {
    let store = MemoryStore::new();
    store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    store.insert(new_request(Op::DeleteUser, 7, at(8))).unwrap();
    store.insert(new_request(Op::MoveUser, 8, at(8))).unwrap();

    let deleted = store.delete(&RequestFilter::by_target(EntityId(7))).unwrap();
    assert_eq!(deleted, 2);

    let deleted = store.delete(&RequestFilter::by_target(EntityId(7))).unwrap();
    assert_eq!(deleted, 0);

    let rows = store.query(&RequestFilter::default(), None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].target_id, Some(EntityId(8)));
}

#[test]
fn ids_are_not_reused_after_delete() {
    let store = MemoryStore::new();
    let a = store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    store.delete(&RequestFilter::by_id(a)).unwrap();
    let b = store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();
    assert!(b > a);
}

#[test]
fn filter_on_destination() {
    let store = MemoryStore::new();
    let mut req = new_request(Op::MoveUser, 7, at(8));
    req.destination_id = Some(EntityId(42));
    store.insert(req).unwrap();
    store.insert(new_request(Op::MoveUser, 7, at(8))).unwrap();

    let filter = RequestFilter {
        destination_id: Some(EntityId(42)),
        ..RequestFilter::default()
    };
    assert_eq!(store.query(&filter, None).unwrap().len(), 1);
}
