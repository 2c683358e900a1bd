use cv_augment::{Augment, Database, Descriptor, Entry, Error, Feature, Image, KeyPointRecord};
use image::{GrayImage, Luma};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use std::fs;

fn entry(name: &str, seed: u64) -> Entry {
    let mut rng = Pcg64::seed_from_u64(seed);
    let features = (0..12)
        .map(|i| {
            let mut bytes = [0u8; 64];
            rng.fill(&mut bytes[..]);
            Feature::new(
                KeyPointRecord::at(i as f32 * 3.0, i as f32 * 2.0),
                Descriptor::new(bytes),
            )
        })
        .collect();
    let image = Image::from(GrayImage::from_pixel(24, 16, Luma([seed as u8])));
    Entry::new(name, image, features).unwrap()
}

fn descriptor_bytes(entry: &Entry) -> Vec<Vec<u8>> {
    entry
        .descriptors()
        .iter()
        .map(|descriptor| descriptor.bytes().to_vec())
        .collect()
}

#[test]
fn connect_creates_empty_database() {
    let _ = pretty_env_logger::try_init_timed();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("augments.db");

    let database = Database::connect(&path).unwrap();
    assert!(database.is_empty());
    assert!(path.exists());

    let database = Database::connect(&path).unwrap();
    assert!(database.is_empty());
    assert_eq!(database.path(), path);
}

#[test]
fn added_entries_survive_reconnect() {
    let _ = pretty_env_logger::try_init_timed();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("augments.db");

    let mut database = Database::connect(&path).unwrap();
    let first = entry("poster", 1)
        .with_group("hallway")
        .with_augments([
            Augment::Box {
                x: 2.0,
                y: 2.0,
                w: 10.0,
                h: 6.0,
            },
            Augment::Text {
                x: 1.0,
                y: 1.0,
                size: 8.0,
                text: "exit".to_owned(),
            },
        ])
        .unwrap();
    database.add_entry(first.clone()).unwrap();
    database.add_entry(entry("map", 2)).unwrap();

    let reloaded = Database::connect(&path).unwrap();
    let names: Vec<&str> = reloaded.entries().iter().map(Entry::name).collect();
    assert_eq!(names, ["poster", "map"]);

    let poster = reloaded.entry("poster").unwrap();
    assert_eq!(poster.group(), Some("hallway"));
    assert_eq!(poster.augments(), first.augments());
    assert_eq!(poster.key_points(), first.key_points());
    assert_eq!(descriptor_bytes(poster), descriptor_bytes(&first));
    assert_eq!(poster.image().dimensions(), (24, 16));
    assert_eq!(
        poster.image().grayscale().as_raw(),
        first.image().grayscale().as_raw()
    );
}

#[test]
fn duplicate_name_is_rejected() {
    let _ = pretty_env_logger::try_init_timed();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("augments.db");

    let mut database = Database::connect(&path).unwrap();
    database.add_entry(entry("poster", 1)).unwrap();
    let on_disk = fs::read(&path).unwrap();

    match database.add_entry(entry("poster", 2)) {
        Err(Error::DuplicateEntryName(name)) => assert_eq!(name, "poster"),
        other => panic!("expected a duplicate name error, got {:?}", other),
    }
    assert_eq!(database.len(), 1);
    assert_eq!(fs::read(&path).unwrap(), on_disk);
}

#[test]
fn upsert_replaces_in_place() {
    let _ = pretty_env_logger::try_init_timed();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("augments.db");

    let mut database = Database::connect(&path).unwrap();
    database.add_entry(entry("a", 1)).unwrap();
    database.add_entry(entry("b", 2)).unwrap();
    database.add_entry(entry("c", 3)).unwrap();

    let replacement = entry("b", 9);
    let previous = database.upsert_entry(replacement.clone()).unwrap().unwrap();
    assert_eq!(descriptor_bytes(&previous), descriptor_bytes(&entry("b", 2)));
    assert!(database.upsert_entry(entry("d", 4)).unwrap().is_none());

    let reloaded = Database::connect(&path).unwrap();
    let names: Vec<&str> = reloaded.entries().iter().map(Entry::name).collect();
    assert_eq!(names, ["a", "b", "c", "d"]);
    assert_eq!(
        descriptor_bytes(reloaded.entry("b").unwrap()),
        descriptor_bytes(&replacement)
    );
}

#[test]
fn failed_save_keeps_entry_in_memory() {
    let _ = pretty_env_logger::try_init_timed();
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    let path = nested.join("augments.db");

    let mut database = Database::connect(&path).unwrap();
    fs::remove_dir_all(&nested).unwrap();

    assert!(matches!(
        database.add_entry(entry("poster", 1)),
        Err(Error::Io(_))
    ));
    assert_eq!(database.len(), 1);
    assert!(database.entry("poster").is_some());
    assert!(!path.exists());
}

#[test]
fn entry_needs_enough_features() {
    let image = Image::from(GrayImage::new(8, 8));
    let features = entry("x", 5).features()[..9].to_vec();
    match Entry::new("sparse", image, features) {
        Err(Error::InsufficientFeatures { found, required }) => {
            assert_eq!((found, required), (9, 10))
        }
        other => panic!("expected insufficient features, got {:?}", other),
    }
    let features = entry("x", 5).features()[..10].to_vec();
    assert!(Entry::new("enough", Image::from(GrayImage::new(8, 8)), features).is_ok());
}

#[test]
fn invalid_augment_is_rejected() {
    let result = entry("poster", 1).with_augments([Augment::Arrow {
        x: 0.0,
        y: 0.0,
        length: 0.0,
        rotation: 45.0,
    }]);
    assert!(matches!(result, Err(Error::InvalidAugment(_))));
}
