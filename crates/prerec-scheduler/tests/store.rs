// Job Store behaviour through the public API, including restart durability.

use chrono::{TimeZone, Utc};
use chrono_tz::Europe::London;
use prerec_scheduler::request::{format_local, parse_local};
use prerec_scheduler::{
    CreateJobRequest, DeleteOutcome, JobStatus, JobStore, SchedulerError,
};

fn memory_store() -> JobStore {
    JobStore::new(rusqlite::Connection::open_in_memory().unwrap()).unwrap()
}

fn request(name: &str, start: &str, stop: Option<&str>) -> CreateJobRequest {
    CreateJobRequest {
        name: Some(name.to_string()),
        file_path: Some(format!("/media/{}.mp3", name.to_lowercase().replace(' ', "_"))),
        start_time: Some(start.to_string()),
        stop_time: stop.map(str::to_string),
    }
}

#[test]
fn created_job_is_listed_with_its_arguments() {
    let store = memory_store();
    let new = request("Morning Show", "2024-06-01T08:00", Some("2024-06-01T08:30"))
        .validate(London, 15)
        .unwrap();

    let created = store.create(new).unwrap();
    let listed = store.get_all().unwrap();

    assert_eq!(listed.len(), 1);
    let job = &listed[0];
    assert_eq!(job.id, created.id);
    assert_eq!(job.name, "Morning Show");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.stop_after_secs, Some(1800));
    assert_eq!(job.trigger_at, Utc.with_ymd_and_hms(2024, 6, 1, 6, 59, 45).unwrap());
    assert_eq!(
        job.args(),
        serde_json::json!(["/media/morning_show.mp3", 1800])
    );
}

#[test]
fn listed_start_time_parses_back_to_the_request() {
    let store = memory_store();
    store
        .create(request("Drive Time", "2024-11-03T17:05", None).validate(London, 15).unwrap())
        .unwrap();

    let job = &store.get_all().unwrap()[0];
    let shown = format_local(job.start_at, London);
    assert_eq!(shown, "2024-11-03T17:05");
    let reparsed = parse_local(&shown, "start_time", London).unwrap();
    assert_eq!((reparsed - job.trigger_at).num_seconds(), 15);
}

#[test]
fn rejected_request_leaves_store_unchanged() {
    let store = memory_store();
    store
        .create(request("Existing", "2024-06-01T06:00", None).validate(London, 15).unwrap())
        .unwrap();

    let result = request("Bad", "2024-06-01T08:00", Some("2024-06-01T07:00"))
        .validate(London, 15)
        .and_then(|job| store.create(job));

    assert!(matches!(result, Err(SchedulerError::Validation(_))));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn delete_then_delete_again_is_not_found() {
    let store = memory_store();
    let job = store
        .create(request("Late Show", "2024-06-01T22:00", None).validate(London, 15).unwrap())
        .unwrap();

    assert_eq!(store.delete(&job.id).unwrap(), DeleteOutcome::Removed);
    assert!(store.get_all().unwrap().is_empty());

    let err = store.delete(&job.id).unwrap_err();
    assert!(matches!(err, SchedulerError::JobNotFound { ref id } if *id == job.id));
    assert_eq!(err.code(), "JOB_NOT_FOUND");
}

#[test]
fn delete_of_firing_job_is_accepted_and_ignored() {
    let store = memory_store();
    let job = store
        .create(request("News", "2024-06-01T09:00", None).validate(London, 15).unwrap())
        .unwrap();

    let claimed = store.claim_due(job.trigger_at).unwrap();
    assert_eq!(claimed.len(), 1);

    assert_eq!(store.delete(&job.id).unwrap(), DeleteOutcome::AlreadyFiring);
    assert_eq!(store.delete(&job.id).unwrap(), DeleteOutcome::AlreadyFiring);
    assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Firing);

    store.remove_fired(&job.id).unwrap();
    assert!(matches!(
        store.delete(&job.id),
        Err(SchedulerError::JobNotFound { .. })
    ));
}

#[test]
fn claim_due_returns_jobs_in_trigger_order_exactly_once() {
    let store = memory_store();
    let late = store
        .create(request("Late", "2024-06-01T10:00", None).validate(London, 15).unwrap())
        .unwrap();
    let early = store
        .create(request("Early", "2024-06-01T09:00", None).validate(London, 15).unwrap())
        .unwrap();
    let future = store
        .create(request("Future", "2024-06-02T09:00", None).validate(London, 15).unwrap())
        .unwrap();

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let ids: Vec<_> = store.claim_due(now).unwrap().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    // A second poll at the same instant finds nothing left to claim.
    assert!(store.claim_due(now).unwrap().is_empty());
    assert_eq!(store.get(&future.id).unwrap().status, JobStatus::Pending);
}

#[test]
fn jobs_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.sqlite");

    let id = {
        let store = JobStore::open(&path).unwrap();
        store
            .create(
                request("Overnight", "2024-06-02T01:00", Some("2024-06-02T03:00"))
                    .validate(London, 15)
                    .unwrap(),
            )
            .unwrap()
            .id
    };

    let reopened = JobStore::open(&path).unwrap();
    let job = reopened.get(&id).unwrap();
    assert_eq!(job.name, "Overnight");
    assert_eq!(job.stop_after_secs, Some(7200));
    assert_eq!(job.status, JobStatus::Pending);
}

#[test]
fn interrupted_firing_is_discarded_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.sqlite");

    let (interrupted, overdue) = {
        let store = JobStore::open(&path).unwrap();
        let interrupted = store
            .create(request("Crashed", "2024-06-01T08:00", None).validate(London, 15).unwrap())
            .unwrap();
        assert_eq!(store.claim_due(interrupted.trigger_at).unwrap().len(), 1);
        let overdue = store
            .create(request("Missed", "2024-06-01T09:00", None).validate(London, 15).unwrap())
            .unwrap();
        (interrupted, overdue)
    };

    let store = JobStore::open(&path).unwrap();
    assert_eq!(store.get(&interrupted.id).unwrap().status, JobStatus::Firing);

    let discarded = store.discard_interrupted().unwrap();
    assert_eq!(discarded.len(), 1);
    assert_eq!(discarded[0].id, interrupted.id);
    assert!(matches!(
        store.get(&interrupted.id),
        Err(SchedulerError::JobNotFound { .. })
    ));

    // Only the job that never started is still due.
    let due: Vec<_> = store.claim_due(Utc::now()).unwrap().into_iter().map(|j| j.id).collect();
    assert_eq!(due, vec![overdue.id]);
}

#[test]
fn remove_fired_of_unknown_job_is_not_found() {
    let store = memory_store();
    assert!(matches!(
        store.remove_fired("no-such-id"),
        Err(SchedulerError::JobNotFound { .. })
    ));
}
