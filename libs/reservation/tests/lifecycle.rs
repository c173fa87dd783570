//! Lifecycle tests following one reservation id through the registry:
//! unknown, tracked, orphaned, released, and tracked again.

use alps_reservation::{JobAttributes, JobId, ReservationError, ReservationRegistry};

fn running_job(id: i64, rsv_id: &str, exec_host: &str) -> JobAttributes {
    JobAttributes::new(JobId::new(id))
        .with_reservation_id(rsv_id)
        .with_exec_host(exec_host)
}

#[test]
fn test_tracked_orphaned_released() {
    let registry = ReservationRegistry::new();
    let job = running_job(17, "2210", "nid00100/0+nid00100/1+nid00101/0+nid00101/1");

    // Unknown
    assert!(!registry.already_recorded("2210"));
    assert_eq!(registry.is_orphaned("2210"), None);

    // Tracked
    registry.track(&job).unwrap();
    assert!(registry.already_recorded("2210"));

    // Orphaned: the job went away, the entry (and its nodes) stay put.
    registry.mark_orphaned("2210", None).unwrap();
    assert_eq!(registry.is_orphaned("2210").as_deref(), Some("17"));
    let orphan = registry.get("2210").unwrap();
    assert_eq!(orphan.node_names(), ["nid00100", "nid00101"]);

    // Released by the allocator: entry and flag go together.
    registry.remove("2210");
    registry.mark_not_orphaned("2210");
    assert!(!registry.already_recorded("2210"));
    assert_eq!(registry.is_orphaned("2210"), None);
    assert_eq!(registry.count(), 0);
}

#[test]
fn test_orphaned_then_retracked() {
    let registry = ReservationRegistry::new();
    registry.track(&running_job(17, "2210", "a/0")).unwrap();
    registry.mark_orphaned("2210", None).unwrap();

    // The job came back (for example after a restart); it re-tracks and the
    // caller clears the flag.
    registry.track(&running_job(17, "2210", "a/0+b/0")).unwrap();
    registry.mark_not_orphaned("2210");

    assert!(registry.already_recorded("2210"));
    assert_eq!(registry.is_orphaned("2210"), None);
    assert_eq!(registry.get("2210").unwrap().node_names(), ["a", "b"]);
}

#[test]
fn test_orphan_reported_by_allocator_only() {
    // Allocator lists a reservation this process never tracked.
    let registry = ReservationRegistry::new();
    registry.mark_orphaned("5150", Some(JobId::new(88))).unwrap();

    assert!(!registry.already_recorded("5150"));
    assert_eq!(registry.is_orphaned("5150").as_deref(), Some("88"));

    let orphans = registry.orphans();
    assert_eq!(orphans.len(), 1);
    assert!(orphans[0].reservation.is_none());

    assert!(registry.release("5150").is_none());
    assert_eq!(registry.orphan_count(), 0);
}

#[test]
fn test_job_without_reservation_is_not_tracked() {
    let registry = ReservationRegistry::new();
    let job = JobAttributes::new(JobId::new(3)).with_exec_host("a/0+b/0");

    let err = registry.track(&job).unwrap_err();
    assert!(matches!(err, ReservationError::NoReservation(id) if id == JobId::new(3)));
    assert_eq!(registry.count(), 0);
    assert!(registry.reservation_for_job(JobId::new(3)).is_none());
}
