//! Integration tests for the library index and verification.
//!
//! These tests verify:
//! - The index is created on first import and tracks every file
//! - Verify reports changed, missing and untracked files
//! - `update` brings the index back in line with the disk

mod common;

use assert_fs::prelude::*;
use common::EmbeddedTags;
use photo_management::core::library::{verify_library, LibraryIndex, INDEX_FILE};
use photo_management::core::organize::{OrganizeConfig, Organizer};
use photo_management::events::null_sender;
use predicates::prelude::*;

fn import(
    card: &assert_fs::fixture::ChildPath,
    library: &assert_fs::fixture::ChildPath,
    tags: &EmbeddedTags,
) {
    let config = OrganizeConfig::new(card.path(), library.path());
    let report = Organizer::new(config, tags).unwrap().run().unwrap();
    assert!(!report.has_failures());
}

#[test]
fn first_import_creates_index() {
    let temp = assert_fs::TempDir::new().unwrap();
    let card = temp.child("card");
    let library = temp.child("library");
    card.child("a.jpg").write_binary(b"a").unwrap();
    let tags = EmbeddedTags::new().photo(b"a", "2012:12:12 12:12:12");

    import(&card, &library, &tags);

    library.child(INDEX_FILE).assert(predicate::path::is_file());
    library
        .child("2012/12 - December/2012-12-12 12-12-12.jpg")
        .assert(predicate::path::is_file())
        .assert(b"a" as &[u8]);
    card.child("a.jpg").assert(predicate::path::exists());

    temp.close().unwrap();
}

#[test]
fn freshly_imported_library_verifies_clean() {
    let temp = assert_fs::TempDir::new().unwrap();
    let card = temp.child("card");
    let library = temp.child("library");
    card.child("a.jpg").write_binary(b"a").unwrap();
    card.child("b.jpg").write_binary(b"b").unwrap();
    let tags = EmbeddedTags::new()
        .photo(b"a", "2011:01:01 01:01:01")
        .undated(b"b");

    import(&card, &library, &tags);

    let index = LibraryIndex::open_in(library.path()).unwrap();
    let report = verify_library(library.path(), &index, false, &null_sender()).unwrap();

    assert!(!report.has_changes());
    assert_eq!(report.files_checked, 2);
}

#[test]
fn verify_reports_every_kind_of_change() {
    let temp = assert_fs::TempDir::new().unwrap();
    let card = temp.child("card");
    let library = temp.child("library");
    card.child("a.jpg").write_binary(b"a").unwrap();
    card.child("b.jpg").write_binary(b"b").unwrap();
    let tags = EmbeddedTags::new().undated(b"a").undated(b"b");

    import(&card, &library, &tags);

    library.child("Unsorted/a.jpg").write_binary(b"edited").unwrap();
    std::fs::remove_file(library.child("Unsorted/b.jpg").path()).unwrap();
    library.child("dropped-in.jpg").write_binary(b"c").unwrap();

    let index = LibraryIndex::open_in(library.path()).unwrap();
    let report = verify_library(library.path(), &index, false, &null_sender()).unwrap();

    assert_eq!(report.checksum_changed, vec!["Unsorted/a.jpg".to_string()]);
    assert_eq!(report.missing_from_disk, vec!["Unsorted/b.jpg".to_string()]);
    assert_eq!(report.untracked, vec!["dropped-in.jpg".to_string()]);
    assert!(!report.index_updated);

    // Reporting alone leaves the index as it was
    let again = verify_library(library.path(), &index, false, &null_sender()).unwrap();
    assert_eq!(again.change_count(), 3);
}

#[test]
fn verify_update_accepts_the_disk() {
    let temp = assert_fs::TempDir::new().unwrap();
    let card = temp.child("card");
    let library = temp.child("library");
    card.child("a.jpg").write_binary(b"a").unwrap();
    let tags = EmbeddedTags::new().undated(b"a");

    import(&card, &library, &tags);
    library.child("extra.jpg").write_binary(b"extra").unwrap();

    let index = LibraryIndex::open_in(library.path()).unwrap();
    let report = verify_library(library.path(), &index, true, &null_sender()).unwrap();
    assert!(report.index_updated);

    let after = verify_library(library.path(), &index, false, &null_sender()).unwrap();
    assert!(!after.has_changes());

    // The updated index now treats extra.jpg's content as imported
    card.child("same-as-extra.jpg").write_binary(b"extra").unwrap();
    let tags = tags.undated(b"extra");
    let config = OrganizeConfig::new(card.path(), library.path());
    let rerun = Organizer::new(config, &tags).unwrap().run().unwrap();
    assert_eq!(rerun.duplicates(), 2);
    library
        .child("Unsorted/same-as-extra.jpg")
        .assert(predicate::path::missing());
}

#[test]
fn existing_library_is_indexed_before_first_import() {
    let temp = assert_fs::TempDir::new().unwrap();
    let card = temp.child("card");
    let library = temp.child("library");
    library.child("old/holiday.jpg").write_binary(b"holiday").unwrap();
    card.child("holiday copy.jpg").write_binary(b"holiday").unwrap();
    let tags = EmbeddedTags::new().undated(b"holiday");

    let config = OrganizeConfig::new(card.path(), library.path());
    let report = Organizer::new(config, &tags).unwrap().run().unwrap();

    assert_eq!(report.duplicates(), 1);
    library
        .child("Unsorted")
        .assert(predicate::path::missing());
}
