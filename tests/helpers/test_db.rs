use mercachat::database::Database;

/// Connect to a uniquely named on-disk SQLite database and bring the schema
/// up. One file per test so tests can run in parallel.
#[allow(dead_code)]
pub async fn setup_test_db() -> Database {
    mercachat::observability::init_tracing();

    let temp_file = format!("test_{}.db", uuid::Uuid::new_v4());
    let db_url = format!("sqlite://{}?mode=rwc", temp_file);

    let db = Database::connect(&db_url)
        .await
        .expect("failed to connect to test database");

    db.run_migrations()
        .await
        .expect("failed to run migrations");

    db
}
