//! Sharing composed queries and one store across threads.

use std::thread;

use ormq::prelude::*;
use ormq::projection::field;
use ormq::proto::{EntityRecord, MutationDescriptor, QueryDescriptor, Value, ValueType};
use ormq::{ComposedQuery, Entity};
use ormq_core::{Catalog, Database, DatabaseConfig, EntityDef, FieldDef, StorageConfig};
use pretty_assertions::assert_eq;

const WRITERS: usize = 2;
const READERS: usize = 3;
const UPDATES_PER_WRITER: i32 = 25;
const READS_PER_READER: usize = 40;

#[derive(Debug, Clone, PartialEq)]
struct Member {
    id: i64,
    username: Option<String>,
    age: i32,
}

impl Entity for Member {
    const NAME: &'static str = "Member";

    fn from_record(record: &EntityRecord) -> Result<Self, Error> {
        Ok(Self {
            id: field(record, "id")?,
            username: field(record, "username")?,
            age: field(record, "age")?,
        })
    }
}

struct QMember {
    entity: EntityPath<Member>,
    username: Path<String>,
    age: Path<i32>,
}

impl QMember {
    fn new(alias: &str) -> Self {
        let entity = EntityPath::new(alias);
        Self {
            username: entity.field("username"),
            age: entity.field("age"),
            entity,
        }
    }
}

impl EntityRef for QMember {
    type Entity = Member;

    fn entity_path(&self) -> &EntityPath<Member> {
        &self.entity
    }
}

fn catalog() -> Catalog {
    Catalog::new()
        .with_entity(
            EntityDef::new("Member", "id")
                .with_field(FieldDef::new("id", ValueType::Int64))
                .with_field(FieldDef::optional("username", ValueType::String))
                .with_field(FieldDef::new("age", ValueType::Int32)),
        )
        .unwrap()
}

fn seed(db: Database) -> Database {
    for (username, age) in [("member1", 10), ("member2", 20), ("member3", 30), ("member4", 40)] {
        db.insert(
            "Member",
            vec![
                ("username".into(), Value::from(username)),
                ("age".into(), Value::from(age)),
            ],
        )
        .unwrap();
    }
    db
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_shared_types_are_send_and_sync() {
    assert_send_sync::<Path<i32>>();
    assert_send_sync::<EntityPath<Member>>();
    assert_send_sync::<Predicate>();
    assert_send_sync::<QueryDescriptor>();
    assert_send_sync::<MutationDescriptor>();
    assert_send_sync::<ComposedQuery<Path<i32>>>();
    assert_send_sync::<ComposedQuery<EntityPath<Member>>>();
    assert_send_sync::<Database>();
}

/// Ages ordered by username, as one reader sees them.
fn ages_by_username(db: &Database) -> Vec<i32> {
    let m = QMember::new("m");
    QueryFactory::new(db)
        .select(&m.age)
        .from(&m)
        .order_by(m.username.asc())
        .fetch_list()
        .unwrap()
        .into_iter()
        .map(|age| age.unwrap())
        .collect()
}

/// Writers bump every age while readers check that no statement observes a
/// half-applied update: the gaps between members never change.
fn run_writers_against_readers(db: &Database) {
    thread::scope(|s| {
        for _ in 0..WRITERS {
            s.spawn(|| {
                let m = QMember::new("m");
                let factory = QueryFactory::new(db);
                for _ in 0..UPDATES_PER_WRITER {
                    let affected = factory.update(&m).set(&m.age, m.age.add(1)).execute().unwrap();
                    assert_eq!(affected, 4);
                }
            });
        }
        for _ in 0..READERS {
            s.spawn(|| {
                for _ in 0..READS_PER_READER {
                    let ages = ages_by_username(db);
                    assert_eq!(ages.len(), 4);
                    let base = ages[0];
                    let gaps: Vec<i32> = ages.iter().map(|age| age - base).collect();
                    assert_eq!(gaps, vec![0, 10, 20, 30]);
                    assert!((10..=10 + WRITERS as i32 * UPDATES_PER_WRITER).contains(&base));
                }
            });
        }
    });

    let bumps = WRITERS as i32 * UPDATES_PER_WRITER;
    assert_eq!(
        ages_by_username(db),
        vec![10 + bumps, 20 + bumps, 30 + bumps, 40 + bumps]
    );
}

#[test]
fn test_concurrent_updates_are_atomic_in_memory() {
    let db = seed(Database::in_memory(catalog()));
    run_writers_against_readers(&db);
}

#[test]
fn test_concurrent_updates_are_atomic_on_sled() {
    let config = DatabaseConfig::sled(StorageConfig::temporary());
    let db = seed(Database::open(catalog(), config).unwrap());
    run_writers_against_readers(&db);
}

#[test]
fn test_composed_query_is_shared_across_threads() {
    let db = seed(Database::in_memory(catalog()));
    let m = QMember::new("m");
    let adults = QueryFactory::new(&db)
        .select(&m.username)
        .from(&m)
        .where_(m.age.goe(20))
        .order_by(m.username.asc())
        .compose()
        .unwrap();

    let results: Vec<Vec<Option<String>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..READERS)
            .map(|_| s.spawn(|| QueryFactory::new(&db).executor().fetch_list(&adults).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for usernames in results {
        assert_eq!(
            usernames,
            vec![
                Some("member2".to_string()),
                Some("member3".to_string()),
                Some("member4".to_string())
            ]
        );
    }
}
