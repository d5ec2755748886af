use notification_db::{
    ColumnConstraint, ColumnDefinition, DataType, Engine, IndexDefinition, Params, Row, Schema,
    SessionError, SessionProvider, SqlQuery, TableDefinition, Value,
};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug)]
struct User {
    _id: i64, // Prefix with underscore to indicate it's intentionally unused
    name: String,
    email: String,
    age: Option<i64>,
}

impl User {
    fn from_row(row: &Row) -> Self {
        Self {
            _id: integer(row, "id").unwrap_or_default(),
            name: text(row, "name"),
            email: text(row, "email"),
            age: integer(row, "age"),
        }
    }
}

fn integer(row: &Row, column: &str) -> Option<i64> {
    match row.get(column) {
        Some(Value::Integer(i)) => Some(*i),
        _ => None,
    }
}

fn text(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::Text(s)) => s.clone(),
        other => panic!("expected text in column {column}, got {other:?}"),
    }
}

fn users_schema() -> Schema {
    Schema::new().add_table(
        TableDefinition::new("users")
            .column(
                ColumnDefinition::new("id", DataType::Integer)
                    .constraint(ColumnConstraint::PrimaryKey),
            )
            .column(
                ColumnDefinition::new("name", DataType::Text).constraint(ColumnConstraint::NotNull),
            )
            .column(
                ColumnDefinition::new("email", DataType::Text)
                    .constraint(ColumnConstraint::Unique)
                    .constraint(ColumnConstraint::NotNull),
            )
            .column(ColumnDefinition::new("age", DataType::Integer))
            .index(IndexDefinition::new("idx_users_email", &["email"])),
    )
}

// Helper function to create an in-memory engine for testing
fn create_test_engine() -> Result<Arc<Engine>, SessionError> {
    let engine = Engine::from_uri("sqlite://")?;
    engine.initialize_schema(&users_schema())?;
    Ok(engine)
}

// Helper function to create a temporary file-based engine
fn create_temp_engine() -> Result<(Arc<Engine>, TempDir), SessionError> {
    let dir = TempDir::new().unwrap();
    let uri = format!("sqlite:///{}", dir.path().join("users.db").display());
    let engine = Engine::from_uri(&uri)?;
    engine.initialize_schema(&users_schema())?;
    Ok((engine, dir))
}

fn select_user(id: i64) -> SqlQuery {
    SqlQuery::new("SELECT id, name, email, age FROM users WHERE id = :id")
        .with_params(Params::new().with_value("id", id))
}

#[tokio::test]
async fn test_basic_operations() {
    test_basic_operations_impl().unwrap();
}

fn test_basic_operations_impl() -> Result<(), SessionError> {
    let provider = SessionProvider::new(create_test_engine()?);
    let session = provider.session()?;

    // Insert a new user
    let inserted = session.execute(
        &SqlQuery::new("INSERT INTO users (name, email, age) VALUES (:name, :email, :age)")
            .with_params(
                Params::new()
                    .with_value("name", "John Doe")
                    .with_value("email", "john@example.com")
                    .with_value("age", 30),
            ),
    )?;
    assert_eq!(inserted, 1);

    // Query a user
    let user = User::from_row(&session.query_one(&select_user(1))?.unwrap());
    assert_eq!(user.name, "John Doe");
    assert_eq!(user.email, "john@example.com");
    assert_eq!(user.age, Some(30));

    // Update the user
    session.execute(
        &SqlQuery::new("UPDATE users SET age = :age WHERE id = :id")
            .with_params(Params::new().with_value("age", 31).with_value("id", 1)),
    )?;
    let updated = User::from_row(&session.query_one(&select_user(1))?.unwrap());
    assert_eq!(updated.age, Some(31));

    // Delete the user
    session.execute(
        &SqlQuery::new("DELETE FROM users WHERE id = :id")
            .with_params(Params::new().with_value("id", 1)),
    )?;
    assert!(session.query_one(&select_user(1))?.is_none());

    session.close()
}

#[test]
fn test_data_survives_across_sessions_in_file() {
    let (engine, _dir) = create_temp_engine().unwrap();
    let provider = SessionProvider::new(engine);

    provider
        .with_session(|session| {
            session.execute(
                &SqlQuery::new("INSERT INTO users (name, email) VALUES (:name, :email)")
                    .with_params(
                        Params::new()
                            .with_value("name", "Ana")
                            .with_value("email", "ana@example.com"),
                    ),
            )?;
            session.commit()
        })
        .unwrap();

    let rows = provider
        .with_session(|session| session.query(&SqlQuery::new("SELECT name, age FROM users")))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], Value::Text("Ana".to_string()));
    assert_eq!(rows[0]["age"], Value::Null);
}

#[test]
fn test_schema_initialization_is_idempotent() {
    let engine = create_test_engine().unwrap();
    engine.initialize_schema(&users_schema()).unwrap();

    let provider = SessionProvider::new(engine);
    let session = provider.session().unwrap();
    let indexes = session
        .query(&SqlQuery::new(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_users_email'",
        ))
        .unwrap();
    assert_eq!(indexes.len(), 1);
}

#[test]
fn test_constraint_violation_surfaces_as_sqlite_error() {
    let provider = SessionProvider::new(create_test_engine().unwrap());
    let session = provider.session().unwrap();
    let insert = SqlQuery::new("INSERT INTO users (name, email) VALUES ('a', 'dup@example.com')");

    session.execute(&insert).unwrap();
    let err = session.execute(&insert).unwrap_err();
    assert!(matches!(err, SessionError::Sqlite(_)));
}

#[test]
fn test_boolean_and_blob_values() {
    let provider = SessionProvider::new(Engine::from_uri("sqlite://").unwrap());
    let session = provider.session().unwrap();
    session
        .execute_batch("CREATE TABLE flags (enabled INTEGER, payload BLOB)")
        .unwrap();
    session
        .execute(
            &SqlQuery::new("INSERT INTO flags VALUES (:enabled, :payload)").with_params(
                Params::new()
                    .with_value("enabled", true)
                    .with_value("payload", vec![1u8, 2, 3]),
            ),
        )
        .unwrap();

    let row = session
        .query_one(&SqlQuery::new("SELECT enabled, payload FROM flags"))
        .unwrap()
        .unwrap();
    assert_eq!(row["enabled"], Value::Integer(1));
    assert_eq!(row["payload"], Value::Blob(vec![1, 2, 3]));
}
