use chrono::{DateTime, TimeZone, Utc};
use rand::{SeedableRng, rngs::StdRng};

use arcraft::{
    Accumulator, Experience, ExperienceStore, FileBackend, KvBackend, Marker, OrphanPolicy,
    acquire::demo_image,
    model::PlacementDefaults,
    share,
    store::{INDEX_KEY, record_key},
};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn make(store: &mut ExperienceStore<FileBackend>, rng: &mut StdRng, n: i64) -> Experience {
    let mut acc = Accumulator::new(&PlacementDefaults::default());
    acc.load_image(demo_image().unwrap());
    acc.set_marker(Marker::Pattern);
    acc.set_title(format!("experience {n}"));
    let (exp, outcome) = share::finalize(acc.draft(), store, at(n), rng).unwrap();
    assert!(outcome.persisted);
    assert!(outcome.warning.is_none());
    exp
}

#[test]
fn recent_puts_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let mut store =
        ExperienceStore::open(FileBackend::open(dir.path()).unwrap(), 3, OrphanPolicy::Evict)
            .unwrap();

    let made: Vec<Experience> = (0..5).map(|n| make(&mut store, &mut rng, n)).collect();
    for exp in &made[2..] {
        assert_eq!(store.get(exp.id()).unwrap().as_ref(), Some(exp));
    }
    drop(store);

    let mut reopened =
        ExperienceStore::open(FileBackend::open(dir.path()).unwrap(), 3, OrphanPolicy::Evict)
            .unwrap();
    let listed: Vec<_> = reopened.list().iter().map(|s| s.id.clone()).collect();
    let expected: Vec<_> = made[2..].iter().rev().map(|e| e.id().clone()).collect();
    assert_eq!(listed, expected);

    for exp in &made[2..] {
        assert_eq!(reopened.get(exp.id()).unwrap().as_ref(), Some(exp));
    }
    for exp in &made[..2] {
        assert_eq!(reopened.get(exp.id()).unwrap(), None);
        assert!(!dir.path().join(format!("{}.json", record_key(exp.id()))).exists());
    }
}

#[test]
fn keep_policy_leaves_orphans_reachable_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let mut store =
        ExperienceStore::open(FileBackend::open(dir.path()).unwrap(), 1, OrphanPolicy::Keep)
            .unwrap();
    let old = make(&mut store, &mut rng, 0);
    let new = make(&mut store, &mut rng, 1);
    drop(store);

    let mut reopened =
        ExperienceStore::open(FileBackend::open(dir.path()).unwrap(), 1, OrphanPolicy::Keep)
            .unwrap();
    assert_eq!(reopened.list().len(), 1);
    assert_eq!(&reopened.list()[0].id, new.id());
    assert_eq!(reopened.get(old.id()).unwrap().as_ref(), Some(&old));
}

#[test]
fn corrupt_index_file_reads_as_empty_history() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileBackend::open(dir.path()).unwrap();
    backend.set(INDEX_KEY, "{ not json").unwrap();

    let mut store = ExperienceStore::open(backend, 10, OrphanPolicy::Evict).unwrap();
    assert!(store.list().is_empty());

    let mut rng = StdRng::seed_from_u64(1);
    let exp = make(&mut store, &mut rng, 0);
    assert_eq!(store.list().len(), 1);
    assert_eq!(store.clear().unwrap(), 1);
    assert_eq!(store.get(exp.id()).unwrap(), None);
    assert_eq!(store.backend().get(INDEX_KEY).unwrap(), None);
}

#[test]
fn legacy_flat_record_is_normalized_on_read() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileBackend::open(dir.path()).unwrap();
    let image = arcraft::EncodedImage::from_bytes("image/png", &[1, 2, 3]);
    let legacy = serde_json::json!({
        "id": "legacy01",
        "image": image.as_str(),
        "marker": "barcode",
        "title": "Old one",
        "timestamp": 1_700_000_000_000i64
    });
    backend.set("ar_legacy01", &legacy.to_string()).unwrap();

    let mut store = ExperienceStore::open(backend, 10, OrphanPolicy::Evict).unwrap();
    let id = arcraft::ExperienceId::parse("legacy01").unwrap();
    let exp = store.get(&id).unwrap().unwrap();
    assert_eq!(exp.placement().marker, Marker::Barcode);
    assert_eq!(exp.placement().scale, 1.0);
    assert_eq!(exp.metadata().title, "Old one");
}
