use observation_core::db::open_db_in_memory;
use observation_core::{
    Capability, ObservationId, ObservationRepository, RequestContext, SessionAction,
    SessionRepository, SessionState, SessionTable, SessionTableError, SessionTableQuery,
    SqliteObservationRepository, SqliteSessionRepository,
};

const BASE_TIME_MS: i64 = 1_700_000_000_000;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn viewer() -> RequestContext {
    RequestContext::new(5, [Capability::ViewSessions])
}

fn create_observation(conn: &rusqlite::Connection) -> ObservationId {
    SqliteObservationRepository::try_new(conn)
        .unwrap()
        .create_observation("Clinical skills")
        .unwrap()
        .uuid
}

/// Seeds one session per observee, a minute apart, oldest first.
fn seed_sessions(
    conn: &rusqlite::Connection,
    observation: ObservationId,
    observees: &[i64],
) -> Vec<observation_core::SessionId> {
    let repo = SqliteSessionRepository::try_new(conn).unwrap();
    observees
        .iter()
        .enumerate()
        .map(|(index, observee)| {
            repo.create_session(observation, 7, *observee, BASE_TIME_MS + index as i64 * 60_000)
                .unwrap()
                .uuid
        })
        .collect()
}

#[test]
fn listing_requires_view_capability() {
    let conn = setup();
    let observation = create_observation(&conn);
    let table = SessionTable::new(SqliteSessionRepository::try_new(&conn).unwrap());
    let observer = RequestContext::new(7, [Capability::PerformObservation]);

    assert!(matches!(
        table.list_sessions(&observer, &SessionTableQuery::new(observation)),
        Err(SessionTableError::PermissionDenied(_))
    ));
}

#[test]
fn rows_are_newest_first_with_display_values() {
    let conn = setup();
    let observation = create_observation(&conn);
    let ids = seed_sessions(&conn, observation, &[21, 22, 23]);
    let repo = SqliteSessionRepository::try_new(&conn).unwrap();
    repo.finish_session(ids[0], SessionState::Complete, BASE_TIME_MS + 30_000)
        .unwrap();
    repo.finish_session(ids[1], SessionState::Cancelled, BASE_TIME_MS + 90_000)
        .unwrap();

    let table = SessionTable::new(repo);
    let page = table
        .list_sessions(&viewer(), &SessionTableQuery::new(observation))
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.applied_limit, 50);
    let order = page
        .rows
        .iter()
        .map(|row| row.session_uuid)
        .collect::<Vec<_>>();
    assert_eq!(order, vec![ids[2], ids[1], ids[0]]);

    let in_progress = &page.rows[0];
    assert_eq!(in_progress.state_label, "In progress");
    assert_eq!(in_progress.observer_id, 7);
    assert_eq!(in_progress.observee_id, 23);
    assert_eq!(
        in_progress.start_time.as_deref(),
        Some("Tue, 14 Nov 2023 22:15:20 +0000")
    );
    assert_eq!(in_progress.finish_time, None);
    assert_eq!(
        in_progress.actions,
        vec![SessionAction::Resume, SessionAction::ViewSummary]
    );

    let cancelled = &page.rows[1];
    assert_eq!(cancelled.state_label, "Cancelled");
    assert!(cancelled.actions.is_empty());

    let complete = &page.rows[2];
    assert_eq!(complete.state_label, "Complete");
    assert_eq!(
        complete.finish_time.as_deref(),
        Some("Tue, 14 Nov 2023 22:13:50 +0000")
    );
    assert_eq!(complete.actions.len(), 2);
}

#[test]
fn observee_filter_narrows_rows_and_total() {
    let conn = setup();
    let observation = create_observation(&conn);
    let other_observation = create_observation(&conn);
    let ids = seed_sessions(&conn, observation, &[21, 22, 21]);
    seed_sessions(&conn, other_observation, &[21]);

    let table = SessionTable::new(SqliteSessionRepository::try_new(&conn).unwrap());
    let query = SessionTableQuery {
        observee_id: Some(21),
        ..SessionTableQuery::new(observation)
    };
    let page = table.list_sessions(&viewer(), &query).unwrap();

    assert_eq!(page.total, 2);
    let order = page
        .rows
        .iter()
        .map(|row| row.session_uuid)
        .collect::<Vec<_>>();
    assert_eq!(order, vec![ids[2], ids[0]]);
}

#[test]
fn pagination_applies_limit_and_offset() {
    let conn = setup();
    let observation = create_observation(&conn);
    let ids = seed_sessions(&conn, observation, &[1, 2, 3, 4, 5]);
    let table = SessionTable::new(SqliteSessionRepository::try_new(&conn).unwrap());

    let query = SessionTableQuery {
        limit: Some(2),
        offset: 2,
        ..SessionTableQuery::new(observation)
    };
    let page = table.list_sessions(&viewer(), &query).unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.applied_limit, 2);
    assert_eq!(page.offset, 2);
    let order = page
        .rows
        .iter()
        .map(|row| row.session_uuid)
        .collect::<Vec<_>>();
    assert_eq!(order, vec![ids[2], ids[1]]);
}

#[test]
fn limit_is_clamped_and_default_is_configurable() {
    let conn = setup();
    let observation = create_observation(&conn);
    seed_sessions(&conn, observation, &[1, 2, 3]);

    let table = SessionTable::new(SqliteSessionRepository::try_new(&conn).unwrap())
        .with_default_limit(2);
    let page = table
        .list_sessions(&viewer(), &SessionTableQuery::new(observation))
        .unwrap();
    assert_eq!(page.applied_limit, 2);
    assert_eq!(page.rows.len(), 2);

    let query = SessionTableQuery {
        limit: Some(0),
        ..SessionTableQuery::new(observation)
    };
    assert_eq!(table.list_sessions(&viewer(), &query).unwrap().applied_limit, 1);

    let query = SessionTableQuery {
        limit: Some(9_999),
        ..SessionTableQuery::new(observation)
    };
    let page = table.list_sessions(&viewer(), &query).unwrap();
    assert_eq!(page.applied_limit, 500);
    assert_eq!(page.rows.len(), 3);
}

#[test]
fn empty_observation_yields_empty_page() {
    let conn = setup();
    let observation = create_observation(&conn);
    let table = SessionTable::new(SqliteSessionRepository::try_new(&conn).unwrap());

    let page = table
        .list_sessions(&viewer(), &SessionTableQuery::new(observation))
        .unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total, 0);
}
