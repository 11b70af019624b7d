use observation_core::db::open_db_in_memory;
use observation_core::{
    instructions_preview, Capability, ObservationId, ObservationRepository, PointDraft,
    PointService, PointServiceError, ReorderDirection, ReorderOutcome, RequestContext,
    SqliteObservationRepository, SqlitePointRepository,
};
use uuid::Uuid;

type Service<'conn> = PointService<SqlitePointRepository<'conn>, SqliteObservationRepository<'conn>>;

fn setup() -> rusqlite::Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &rusqlite::Connection) -> Service<'_> {
    PointService::new(
        SqlitePointRepository::try_new(conn).unwrap(),
        SqliteObservationRepository::try_new(conn).unwrap(),
    )
}

fn create_observation(conn: &rusqlite::Connection) -> ObservationId {
    SqliteObservationRepository::try_new(conn)
        .unwrap()
        .create_observation("Clinical skills")
        .unwrap()
        .uuid
}

fn manager() -> RequestContext {
    RequestContext::new(2, [Capability::ManagePoints])
}

fn observer() -> RequestContext {
    RequestContext::new(3, [Capability::PerformObservation])
}

#[test]
fn create_trims_title_and_appends() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);

    let first = service
        .create_point(&manager(), observation, &PointDraft::new("  Hand hygiene  ", 2))
        .unwrap();
    let second = service
        .create_point(&manager(), observation, &PointDraft::new("Consent", 1))
        .unwrap();

    assert_eq!(first.payload.title, "Hand hygiene");
    assert_eq!(first.list_order, 1);
    assert_eq!(second.list_order, 2);
}

#[test]
fn create_under_missing_observation_fails() {
    let conn = setup();
    let service = service(&conn);
    let missing = Uuid::new_v4();

    let err = service
        .create_point(&manager(), missing, &PointDraft::new("Orphan", 1))
        .unwrap_err();
    assert!(matches!(err, PointServiceError::ObservationNotFound(id) if id == missing));
}

#[test]
fn invalid_drafts_are_rejected() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);

    for draft in [PointDraft::new("   ", 1), PointDraft::new("Negative", -3)] {
        let err = service
            .create_point(&manager(), observation, &draft)
            .unwrap_err();
        assert!(matches!(err, PointServiceError::InvalidPoint(_)));
    }
    assert!(service
        .list_points(&manager(), observation)
        .unwrap()
        .is_empty());
}

#[test]
fn mutations_require_manage_capability() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);
    let point = service
        .create_point(&manager(), observation, &PointDraft::new("Consent", 1))
        .unwrap();

    let denied = [
        service
            .create_point(&observer(), observation, &PointDraft::new("Nope", 1))
            .map(|_| ()),
        service.update_point(&observer(), &point).map(|_| ()),
        service
            .reorder_point(&observer(), observation, point.uuid, ReorderDirection::Up)
            .map(|_| ()),
        service.delete_point(&observer(), observation, point.uuid),
    ];
    for result in denied {
        match result.unwrap_err() {
            PointServiceError::PermissionDenied(err) => {
                assert_eq!(err.user_id, 3);
                assert_eq!(err.capability, Capability::ManagePoints);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn observers_can_read_but_others_cannot() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);
    let point = service
        .create_point(&manager(), observation, &PointDraft::new("Consent", 1))
        .unwrap();

    assert_eq!(
        service
            .read_point(&observer(), observation, point.uuid)
            .unwrap(),
        point
    );
    assert_eq!(service.list_points(&observer(), observation).unwrap().len(), 1);

    let viewer = RequestContext::new(9, [Capability::ViewSessions]);
    assert!(matches!(
        service.list_points(&viewer, observation),
        Err(PointServiceError::PermissionDenied(_))
    ));
}

#[test]
fn reorder_by_raw_delta_validates_direction() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);
    let a = service
        .create_point(&manager(), observation, &PointDraft::new("A", 1))
        .unwrap();
    let b = service
        .create_point(&manager(), observation, &PointDraft::new("B", 1))
        .unwrap();

    assert_eq!(
        service
            .reorder_point_by(&manager(), observation, a.uuid, 1)
            .unwrap(),
        ReorderOutcome::Swapped { from: 1, to: 2 }
    );
    assert_eq!(
        service
            .reorder_point_by(&manager(), observation, a.uuid, 1)
            .unwrap(),
        ReorderOutcome::AtBoundary
    );
    assert!(matches!(
        service.reorder_point_by(&manager(), observation, b.uuid, 2),
        Err(PointServiceError::InvalidDirection(2))
    ));
    assert!(matches!(
        service.reorder_point_by(&manager(), observation, b.uuid, 0),
        Err(PointServiceError::InvalidDirection(0))
    ));
}

#[test]
fn update_returns_persisted_list_order() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);
    service
        .create_point(&manager(), observation, &PointDraft::new("A", 1))
        .unwrap();
    let mut b = service
        .create_point(&manager(), observation, &PointDraft::new("B", 1))
        .unwrap();

    b.list_order = 1;
    b.payload.title = " B revised ".to_string();
    let updated = service.update_point(&manager(), &b).unwrap();

    assert_eq!(updated.list_order, 2);
    assert_eq!(updated.payload.title, "B revised");
}

#[test]
fn missing_point_maps_to_point_not_found() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);
    let point = service
        .create_point(&manager(), observation, &PointDraft::new("A", 1))
        .unwrap();
    service
        .delete_point(&manager(), observation, point.uuid)
        .unwrap();

    let err = service
        .read_point(&manager(), observation, point.uuid)
        .unwrap_err();
    assert!(matches!(err, PointServiceError::PointNotFound(id) if id == point.uuid));
    let err = service
        .delete_point(&manager(), observation, point.uuid)
        .unwrap_err();
    assert!(matches!(err, PointServiceError::PointNotFound(_)));
}

#[test]
fn preview_is_derived_from_stored_instructions() {
    let conn = setup();
    let observation = create_observation(&conn);
    let service = service(&conn);
    let draft = PointDraft::new("Consent", 1).with_instructions(
        "<p>Confirm&nbsp;verbal <em>consent</em></p>\n<p>before starting</p>",
        observation_core::InstructionsFormat::Html,
    );
    let point = service.create_point(&manager(), observation, &draft).unwrap();

    assert_eq!(
        instructions_preview(&point.payload.instructions),
        "Confirm verbal consent before starting"
    );
}
