use rusqlite::Connection;
use std::collections::BTreeSet;
use uuid::Uuid;
use wardbed_core::db::open_db_in_memory;
use wardbed_core::{
    AssignmentChange, AssignmentError, AssignmentListener, BedRegistry, CoreConfig,
    OccupancySynchronizer, PatientRepository, RegistryError, RegistryResult, SqliteBedRegistry,
    SqlitePatientRepository, WardService,
};

fn setup_with_beds(count: u32) -> Connection {
    let conn = open_db_in_memory(&CoreConfig::default()).unwrap();
    let registry = SqliteBedRegistry::try_new(&conn).unwrap();
    for _ in 0..count {
        registry.register_bed().unwrap();
    }
    conn
}

fn occupied_beds(conn: &Connection) -> BTreeSet<u32> {
    SqliteBedRegistry::try_new(conn)
        .unwrap()
        .list_beds()
        .unwrap()
        .into_iter()
        .filter(|bed| bed.occupied)
        .map(|bed| bed.number)
        .collect()
}

fn referenced_beds(conn: &Connection) -> BTreeSet<u32> {
    let mut stmt = conn
        .prepare(
            "SELECT bed_number
             FROM patients
             WHERE bed_number IS NOT NULL
               AND is_deleted = 0;",
        )
        .unwrap();
    let beds = stmt
        .query_map([], |row| row.get::<_, u32>(0))
        .unwrap()
        .map(|row| row.unwrap())
        .collect();
    beds
}

fn assert_invariant(conn: &Connection) {
    assert_eq!(occupied_beds(conn), referenced_beds(conn));
}

#[test]
fn assign_move_and_clear_scenario() {
    let conn = open_db_in_memory(&CoreConfig::default()).unwrap();
    let service = WardService::new(
        SqliteBedRegistry::try_new(&conn).unwrap(),
        SqlitePatientRepository::try_new(&conn).unwrap(),
    );
    assert_eq!(service.seed_beds(3).unwrap(), vec![1, 2, 3]);

    let p1 = Uuid::new_v4();
    service.admit(p1, 2).unwrap();
    assert!(service.occupancy(2).unwrap());
    assert!(!service.occupancy(1).unwrap());
    assert!(!service.occupancy(3).unwrap());

    let change = service.move_patient(p1, 3).unwrap();
    assert_eq!(change.affected_beds(), vec![2, 3]);
    assert!(!service.occupancy(2).unwrap());
    assert!(service.occupancy(3).unwrap());

    service.clear_assignment(p1).unwrap();
    assert!(!service.occupancy(3).unwrap());
    assert_eq!(service.assignment(p1).unwrap().unwrap().bed_number, None);
    assert_invariant(&conn);
}

#[test]
fn discharge_releases_bed_and_tombstones_patient() {
    let conn = setup_with_beds(2);
    let service = WardService::new(
        SqliteBedRegistry::try_new(&conn).unwrap(),
        SqlitePatientRepository::try_new(&conn).unwrap(),
    );

    let patient = Uuid::new_v4();
    service.admit(patient, 1).unwrap();
    let change = service.discharge(patient).unwrap();
    assert_eq!(change.old_bed, Some(1));
    assert_eq!(change.new_bed, None);

    assert!(!service.occupancy(1).unwrap());
    assert!(service.assignment(patient).unwrap().is_none());
    assert!(matches!(
        service.move_patient(patient, 2).unwrap_err(),
        AssignmentError::PatientNotFound(id) if id == patient
    ));
    assert!(matches!(
        service.admit(patient, 2).unwrap_err(),
        AssignmentError::DuplicatePatient(id) if id == patient
    ));
    assert_invariant(&conn);
}

#[test]
fn second_claimant_of_a_bed_is_rejected() {
    let conn = setup_with_beds(2);
    let patients = SqlitePatientRepository::try_new(&conn).unwrap();
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    patients.create_patient(first, Some(1)).unwrap();
    patients.create_patient(second, None).unwrap();

    let err = patients.set_bed(second, Some(1)).unwrap_err();
    assert!(matches!(err, AssignmentError::BedAlreadyAssigned(1)));
    assert!(!err.is_retryable());

    let err = patients.create_patient(Uuid::new_v4(), Some(1)).unwrap_err();
    assert!(matches!(err, AssignmentError::BedAlreadyAssigned(1)));

    // Re-assigning the holder to its own bed is allowed.
    patients.set_bed(first, Some(1)).unwrap();
    assert_invariant(&conn);
}

#[test]
fn unknown_bed_rolls_back_assignment() {
    let conn = setup_with_beds(2);
    let patients = SqlitePatientRepository::try_new(&conn).unwrap();
    let patient = Uuid::new_v4();
    patients.create_patient(patient, Some(1)).unwrap();

    let err = patients.set_bed(patient, Some(9)).unwrap_err();
    assert!(matches!(
        err,
        AssignmentError::Registry(RegistryError::UnknownBed(9))
    ));

    let assignment = patients.get_assignment(patient, false).unwrap().unwrap();
    assert_eq!(assignment.bed_number, Some(1));
    assert_eq!(occupied_beds(&conn), BTreeSet::from([1]));

    let err = patients.create_patient(Uuid::new_v4(), Some(3)).unwrap_err();
    assert!(matches!(
        err,
        AssignmentError::Registry(RegistryError::UnknownBed(3))
    ));
    assert_invariant(&conn);
}

struct RejectingListener;

impl AssignmentListener for RejectingListener {
    fn on_assignment_changed(
        &self,
        _conn: &Connection,
        _change: &AssignmentChange,
    ) -> RegistryResult<()> {
        Err(RegistryError::InvalidData("listener rejected change".to_string()))
    }
}

#[test]
fn listener_failure_aborts_the_assignment_write() {
    let conn = setup_with_beds(1);
    let patients = SqlitePatientRepository::with_listener(&conn, RejectingListener).unwrap();
    let patient = Uuid::new_v4();

    let err = patients.create_patient(patient, Some(1)).unwrap_err();
    assert!(matches!(
        err,
        AssignmentError::Registry(RegistryError::InvalidData(_))
    ));
    assert!(patients.get_assignment(patient, true).unwrap().is_none());
    assert!(referenced_beds(&conn).is_empty());
    assert!(occupied_beds(&conn).is_empty());
}

#[test]
fn sync_transition_is_idempotent_and_repairs_stale_flags() {
    let conn = setup_with_beds(3);
    let patients = SqlitePatientRepository::try_new(&conn).unwrap();
    patients.create_patient(Uuid::new_v4(), Some(2)).unwrap();
    let sync = OccupancySynchronizer::new();

    let before = occupied_beds(&conn);
    for bed in [None, Some(1), Some(2), Some(3)] {
        let outcome = sync.sync_transition(&conn, bed, bed).unwrap();
        assert!(outcome.iter().all(|entry| !entry.changed));
        assert_eq!(occupied_beds(&conn), before);
    }

    conn.execute("UPDATE beds SET occupied = 1 WHERE number = 3;", [])
        .unwrap();
    let outcome = sync.sync_transition(&conn, Some(3), None).unwrap();
    assert_eq!(outcome.len(), 1);
    assert!(outcome[0].changed);
    assert!(!outcome[0].occupied);
    assert_invariant(&conn);
}

#[test]
fn invariant_holds_after_every_mutation_in_a_long_sequence() {
    const BEDS: u32 = 5;
    let conn = setup_with_beds(BEDS);
    let patients = SqlitePatientRepository::try_new(&conn).unwrap();
    let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for id in &ids {
        patients.create_patient(*id, None).unwrap();
    }

    // Deterministic LCG so failures are reproducible.
    let mut state: u64 = 0x5eed;
    let mut next = move |bound: u64| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };

    let mut committed = 0;
    for _ in 0..300 {
        let patient = ids[next(ids.len() as u64) as usize];
        let target = match next(BEDS as u64 + 2) as u32 {
            0 => None,
            // One past the end exercises the UnknownBed rollback path.
            n => Some(n),
        };
        if patients.set_bed(patient, target).is_ok() {
            committed += 1;
        }
        assert_invariant(&conn);
    }
    assert!(committed > 0);
}
