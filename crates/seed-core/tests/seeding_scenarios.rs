use seed_core::{InMemoryStore, SeedError, SeedOptions, Seeder, StoreCall};
use serde_json::{json, Value};

fn store() -> InMemoryStore {
    InMemoryStore::new().with_model("User", "users")
                        .with_model("Team", "teams")
                        .with_model("Post", "posts")
}

#[tokio::test]
async fn plain_document_mirrors_group_and_key_structure() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "users": {"_model": "User", "foo": {"firstName": "Foo"}, "bar": {"firstName": "Bar"}},
        "posts": {"_model": "Post", "hello": {"title": "Hello", "tags": ["a", "b"], "meta": {"draft": false}}}
    });
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("seed");

    assert_eq!(tree.group_names().collect::<Vec<_>>(), vec!["users", "posts"]);
    assert_eq!(tree.group("users").unwrap().keys().collect::<Vec<_>>(), vec!["foo", "bar"]);
    let post = tree.get("posts", "hello").unwrap();
    assert_eq!(post["title"], json!("Hello"));
    assert_eq!(post["tags"], json!(["a", "b"]));
    assert_eq!(post["meta"], json!({"draft": false}));
    assert!(post["_id"].is_string());
}

#[tokio::test]
async fn simple_create_issues_one_single_element_batch() {
    let seeder = Seeder::new(store());
    let doc = json!({"users": {"_model": "User", "foo": {"firstName": "Foo", "email": "foo@bar.com"}}});
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("seed");

    let creates = seeder.store().create_calls().await;
    assert_eq!(creates.len(), 1);
    let (collection, batch) = &creates[0];
    assert_eq!(collection, "users");
    assert_eq!(Value::Array(batch.iter().cloned().map(Value::Object).collect()),
               json!([{"firstName": "Foo", "email": "foo@bar.com"}]));

    let persisted = seeder.store().documents("users").await;
    assert_eq!(tree.into_value(), json!({"users": {"foo": Value::Object(persisted[0].clone())}}));
}

#[tokio::test]
async fn nested_array_reference_resolves_to_identifier() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "users": {"_model": "User", "foo": {"firstName": "Foo"}},
        "teams": {"_model": "Team", "teamA": {"name": "A", "users": [{"user": "->users.foo"}]}}
    });
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("seed");
    let user_id = tree.get("users", "foo").unwrap()["_id"].clone();
    assert_eq!(tree.get("teams", "teamA").unwrap()["users"][0]["user"], user_id);
}

#[tokio::test]
async fn record_and_identifier_references_are_equivalent() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "users": {"_model": "User", "foo": {"firstName": "Foo"}},
        "posts": {"_model": "Post", "p": {"a": "->users.foo", "b": "->users.foo._id", "name": "->users.foo.firstName"}}
    });
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("seed");
    let post = tree.get("posts", "p").unwrap();
    assert_eq!(post["a"], post["b"]);
    assert_eq!(post["name"], json!("Foo"));
}

#[tokio::test]
async fn forward_references_fail() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "teams": {"_model": "Team", "teamA": {"owner": "->users.foo"}},
        "users": {"_model": "User", "foo": {"firstName": "Foo"}}
    });
    let err = seeder.seed_value(doc, SeedOptions::default()).await.unwrap_err();
    assert_eq!(err, SeedError::MissingSource { group: "users".into() });
    assert!(seeder.store().documents("users").await.is_empty());
}

#[tokio::test]
async fn later_key_in_same_group_is_not_yet_visible() {
    let seeder = Seeder::new(store());
    let doc = json!({"users": {"_model": "User", "a": {"friend": "->users.b"}, "b": {"firstName": "B"}}});
    let err = seeder.seed_value(doc, SeedOptions::default()).await.unwrap_err();
    assert_eq!(err, SeedError::MissingReference { path: "users.b".into(), segment: "b".into() });
}

#[tokio::test]
async fn expressions_see_the_current_record() {
    let seeder = Seeder::new(store());
    let doc = json!({"users": {"_model": "User", "foo": {
        "firstName": "Foo",
        "lastName": "Bar",
        "fullName": "=this.firstName + ' ' + this.lastName"
    }}});
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("seed");
    assert_eq!(tree.get("users", "foo").unwrap()["fullName"], json!("Foo Bar"));
}

#[tokio::test]
async fn failing_expressions_keep_the_literal_string() {
    let seeder = Seeder::new(store());
    let doc = json!({"users": {"_model": "User", "foo": {
        "email": "a=b@example.com",
        "broken": "=this.missing.deeper",
        "unbound": "=moment()"
    }}});
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("expression errors never fail a run");
    let user = tree.get("users", "foo").unwrap();
    assert_eq!(user["email"], json!("a=b@example.com"));
    assert_eq!(user["broken"], json!("=this.missing.deeper"));
    assert_eq!(user["unbound"], json!("=moment()"));
}

#[tokio::test]
async fn drop_collections_forces_keeping_the_database() {
    let seeder = Seeder::new(store());
    seeder.store().preload("users", vec![serde_json::Map::new()]).await;
    let doc = json!({"users": {"_model": "User", "foo": {"firstName": "Foo"}}});
    seeder.seed_value(doc, SeedOptions { drop_database: true, drop_collections: true }).await.expect("seed");

    let calls = seeder.store().calls().await;
    assert!(!calls.contains(&StoreCall::DropDatabase));
    let exists = calls.iter().position(|c| *c == StoreCall::CollectionExists("users".into())).unwrap();
    let dropped = calls.iter().position(|c| *c == StoreCall::DropCollection("users".into())).unwrap();
    let created = calls.iter().position(|c| matches!(c, StoreCall::Create { .. })).unwrap();
    assert!(exists < dropped && dropped < created);
    assert_eq!(seeder.store().documents("users").await.len(), 1);
}

#[tokio::test]
async fn group_without_model_rejects_before_writing_it() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "users": {"_model": "User", "foo": {"firstName": "Foo"}},
        "teams": {"teamA": {"name": "A"}}
    });
    let err = seeder.seed_value(doc, SeedOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "group 'teams' has no _model defined");
    // lo escrito antes del grupo inválido no se revierte
    assert_eq!(seeder.store().documents("users").await.len(), 1);
    assert!(seeder.store().documents("teams").await.is_empty());
}

#[tokio::test]
async fn resolvable_dependency_is_available_to_expressions() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "_dependencies": {"moment": "moment"},
        "posts": {"_model": "Post", "p": {"publishedAt": "=moment('2020-01-01').add(1, 'days').toDate()"}}
    });
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("seed");
    assert_eq!(tree.get("posts", "p").unwrap()["publishedAt"], json!("2020-01-02T00:00:00.000Z"));
}

#[tokio::test]
async fn unresolvable_dependency_rejects_the_run() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "_dependencies": {"moment": "moment-timezone-nope"},
        "posts": {"_model": "Post", "p": {"title": "x"}}
    });
    let err = seeder.seed_value(doc, SeedOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "Cannot find module 'moment-timezone-nope'");
    assert!(seeder.store().create_calls().await.is_empty());
}

#[tokio::test]
async fn unknown_model_aborts_the_run() {
    let seeder = Seeder::new(store());
    let doc = json!({"ghosts": {"_model": "Ghost", "g": {}}});
    let err = seeder.seed_value(doc, SeedOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "model not found: Ghost");
}

#[tokio::test]
async fn persistence_errors_are_returned_unchanged() {
    let seeder = Seeder::new(store());
    seeder.store().fail_creates_on("posts", "duplicate key").await;
    let doc = json!({
        "users": {"_model": "User", "foo": {}},
        "posts": {"_model": "Post", "p": {}}
    });
    let err = seeder.seed_value(doc, SeedOptions::default()).await.unwrap_err();
    assert_eq!(err.to_string(), "document rejected: duplicate key");
    assert_eq!(seeder.store().documents("users").await.len(), 1);
}

#[tokio::test]
async fn unrepresentable_dates_are_stored_as_literals() {
    let seeder = Seeder::new(store());
    let doc = json!({
        "posts": {"_model": "Post", "old": {"at": "=new Date(-1e300)", "later": "=new Date(0).add(-1e300, 'ms')", "ok": "=new Date(0)"}}
    });
    let tree = seeder.seed_value(doc, SeedOptions::default()).await.expect("seed");

    let post = tree.get("posts", "old").unwrap();
    assert_eq!(post["at"], json!("=new Date(-1e300)"));
    assert_eq!(post["later"], json!("=new Date(0).add(-1e300, 'ms')"));
    assert_eq!(post["ok"], json!("1970-01-01T00:00:00.000Z"));
}
