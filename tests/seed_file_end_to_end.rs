use std::io::Write;

use docseed::seed_core::{InMemoryStore, StoreCall};
use docseed::{load_seed_file, seed_file, LoadError, SeedOptions, Seeder};
use serde_json::json;

const SEED: &str = r#"{
    "_dependencies": {"moment": "moment"},
    "users": {
        "_model": "User",
        "foo": {"firstName": "Foo", "lastName": "Bar", "email": "foo@bar.com",
                "fullName": "=this.firstName + ' ' + this.lastName"},
        "baz": {"firstName": "Baz", "lastName": "Qux", "email": "baz@qux.com"}
    },
    "teams": {
        "_model": "Team",
        "teamA": {"name": "A", "users": [{"user": "->users.foo"}, {"user": "->users.baz"}],
                  "founded": "=moment('2019-06-01').toDate()"}
    }
}"#;

fn write_seed(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(contents.as_bytes()).expect("write seed");
    file
}

fn store() -> InMemoryStore {
    InMemoryStore::new().with_model("User", "users").with_model("Team", "teams")
}

#[tokio::test]
async fn seeds_a_file_end_to_end() {
    let file = write_seed(SEED);
    let seeder = Seeder::new(store());
    let tree = seed_file(&seeder, file.path(), SeedOptions::default()).await.expect("seed file");

    let foo = tree.get("users", "foo").expect("foo");
    let baz = tree.get("users", "baz").expect("baz");
    assert_eq!(foo["fullName"], json!("Foo Bar"));

    let team = tree.get("teams", "teamA").expect("teamA");
    assert_eq!(team["users"], json!([{"user": foo["_id"]}, {"user": baz["_id"]}]));
    assert_eq!(team["founded"], json!("2019-06-01T00:00:00.000Z"));

    let value = tree.to_value();
    assert_eq!(value.as_object().unwrap().keys().collect::<Vec<_>>(), vec!["users", "teams"]);
    assert_eq!(seeder.store().calls().await.first(), Some(&StoreCall::DropDatabase));
}

#[test]
fn seeding_works_from_a_blocking_context() {
    let file = write_seed(r#"{"users": {"_model": "User", "foo": {"firstName": "Foo"}}}"#);
    let seeder = Seeder::new(store());
    let tree = tokio_test::block_on(seed_file(&seeder, file.path(), SeedOptions::keep_database())).expect("seed");
    assert_eq!(tree.get("users", "foo").unwrap()["firstName"], json!("Foo"));
}

#[tokio::test]
async fn seed_errors_surface_through_the_loader() {
    let file = write_seed(r#"{"teams": {"_model": "Team", "a": {"owner": "->users.foo"}}}"#);
    let seeder = Seeder::new(store());
    let err = seed_file(&seeder, file.path(), SeedOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "missing source 'users' for reference");
}

#[test]
fn invalid_json_is_reported() {
    let file = write_seed("{ not json");
    assert!(matches!(load_seed_file(file.path()), Err(LoadError::Json(_))));
}
