//! Integration tests for the record operations
//!
//! These tests run the repository against a pooled SQLite file and check:
//! - Pagination bounds and totals
//! - Search filtering
//! - Guarded mark insert
//! - Cascading delete and its transaction
//! - Concurrent access through the pool

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use chrono::NaiveDate;
    use std::sync::Arc;
    use student_records::backends::PooledSqliteDatabase;
    use student_records::core::{Database, DatabaseValue, PoolConfig};
    use student_records::records::{
        ensure_sqlite_schema, NewCourse, NewMark, NewStudent, PageRequest, RecordError,
        Repository, Tables,
    };
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> (Arc<dyn Database>, Repository) {
        let db = PooledSqliteDatabase::new(
            dir.path().join("integration.db"),
            PoolConfig::default().with_max_size(4),
        )
        .await
        .expect("Failed to open pool");
        ensure_sqlite_schema(&db).await.expect("Failed to create schema");

        let db: Arc<dyn Database> = Arc::new(db);
        let repo = Repository::new(Arc::clone(&db), Tables::new(None));
        (db, repo)
    }

    fn student(name: &str) -> NewStudent {
        NewStudent {
            student_name: name.to_string(),
            student_email: "a@x.com".to_string(),
            student_age: 20,
            student_parent_id: None,
            date_of_birth: NaiveDate::from_ymd_opt(2004, 1, 1).expect("valid date"),
        }
    }

    async fn seed(repo: &Repository, count: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let row = repo
                .create_student(&student(&format!("Student {:03}", i)))
                .await
                .expect("Insert failed");
            ids.push(row["student_id"].as_long().expect("student_id"));
        }
        ids
    }

    async fn count(db: &Arc<dyn Database>, table: &str) -> i64 {
        let rows = db
            .query_with_params(&format!("SELECT COUNT(*) AS count FROM {}", table), &[])
            .await
            .expect("Count failed");
        rows[0]["count"].as_long().expect("count")
    }

    async fn add_mark(repo: &Repository, student_id: i64, course_id: i64) {
        repo.create_mark(&NewMark {
            student_id,
            course_id,
            mark: 70.0,
            date_recorded: NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date"),
        })
        .await
        .expect("Mark insert failed");
    }

    async fn course(repo: &Repository) -> i64 {
        let row = repo
            .create_course(&NewCourse {
                course_name: "History".to_string(),
                course_code: "HIST200".to_string(),
            })
            .await
            .expect("Course insert failed");
        row["course_id"].as_long().expect("course_id")
    }

    #[tokio::test]
    async fn test_every_page_respects_limit_and_offset() {
        let dir = TempDir::new().expect("tempdir");
        let (_db, repo) = open(&dir).await;
        let ids = seed(&repo, 13).await;

        for limit in 1..=6i64 {
            let mut seen = Vec::new();
            let mut page = 1;
            loop {
                let result = repo
                    .list_students(&PageRequest::new(page, limit, ""))
                    .await
                    .expect("List failed");
                assert!(result.students.len() as i64 <= limit);
                assert_eq!(result.total_count, 13);
                assert_eq!(result.total_pages, (13 + limit - 1) / limit);
                if result.students.is_empty() {
                    break;
                }

                let first = result.students[0]["student_id"].as_long().expect("id");
                assert_eq!(first, ids[((page - 1) * limit) as usize]);
                seen.extend(
                    result
                        .students
                        .iter()
                        .map(|row| row["student_id"].as_long().expect("id")),
                );
                page += 1;
            }
            assert_eq!(seen, ids, "limit {} must visit every row once in order", limit);
        }
    }

    #[tokio::test]
    async fn test_empty_search_returns_everything() {
        let dir = TempDir::new().expect("tempdir");
        let (_db, repo) = open(&dir).await;
        seed(&repo, 4).await;

        let result = repo
            .list_students(&PageRequest::new(1, 100, ""))
            .await
            .expect("List failed");
        assert_eq!(result.total_count, 4);
        assert_eq!(result.students.len(), 4);
    }

    #[tokio::test]
    async fn test_search_filters_rows_and_count_together() {
        let dir = TempDir::new().expect("tempdir");
        let (_db, repo) = open(&dir).await;
        for name in ["Ana", "Banana", "Bob", "Diana", "Eve"] {
            repo.create_student(&student(name)).await.expect("Insert failed");
        }

        let result = repo
            .list_students(&PageRequest::new(1, 2, "ANA"))
            .await
            .expect("List failed");
        assert_eq!(result.total_count, 3);
        assert_eq!(result.total_pages, 2);
        let names: Vec<String> = result
            .students
            .iter()
            .map(|row| row["student_name"].as_string())
            .collect();
        assert_eq!(names, vec!["Ana", "Banana"]);

        let result = repo
            .list_students(&PageRequest::new(2, 2, "ana"))
            .await
            .expect("List failed");
        assert_eq!(result.students.len(), 1);
        assert_eq!(result.students[0]["student_name"].as_string(), "Diana");
    }

    #[tokio::test]
    async fn test_mark_for_missing_student_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let (db, repo) = open(&dir).await;
        let course_id = course(&repo).await;

        let result = repo
            .create_mark(&NewMark {
                student_id: 999_999,
                course_id,
                mark: 50.0,
                date_recorded: NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date"),
            })
            .await;
        assert!(matches!(result, Err(RecordError::NotFound(_))));
        assert_eq!(count(&db, "marks").await, 0);
    }

    #[tokio::test]
    async fn test_delete_removes_student_and_all_marks() {
        let dir = TempDir::new().expect("tempdir");
        let (db, repo) = open(&dir).await;
        let ids = seed(&repo, 2).await;
        let course_id = course(&repo).await;
        for _ in 0..3 {
            add_mark(&repo, ids[0], course_id).await;
        }
        add_mark(&repo, ids[1], course_id).await;

        repo.delete_student(ids[0]).await.expect("Delete failed");

        assert_eq!(count(&db, "students").await, 1);
        assert_eq!(count(&db, "marks").await, 1);
        assert!(matches!(
            repo.get_student(ids[0]).await,
            Err(RecordError::NotFound(_))
        ));
        assert_eq!(
            repo.get_student(ids[1]).await.expect("Get failed").marks.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_student_without_marks() {
        let dir = TempDir::new().expect("tempdir");
        let (db, repo) = open(&dir).await;
        let ids = seed(&repo, 1).await;

        repo.delete_student(ids[0]).await.expect("Delete failed");
        assert_eq!(count(&db, "students").await, 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_student_changes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let (db, repo) = open(&dir).await;
        seed(&repo, 2).await;

        let result = repo.delete_student(999_999).await;
        assert!(matches!(result, Err(RecordError::NotFound(_))));
        assert_eq!(count(&db, "students").await, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_student_changes_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let (db, repo) = open(&dir).await;
        seed(&repo, 1).await;

        let result = repo.update_student(999_999, &student("Ghost")).await;
        assert!(matches!(result, Err(RecordError::NotFound(_))));

        let rows = db
            .query_with_params(
                "SELECT COUNT(*) AS count FROM students WHERE student_name = $1",
                &["Ghost".into()],
            )
            .await
            .expect("Query failed");
        assert_eq!(rows[0]["count"], DatabaseValue::Long(0));
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let (_db, repo) = open(&dir).await;

        let created = repo.create_student(&student("Ana")).await.expect("Insert failed");
        let id = created["student_id"].as_long().expect("student_id");

        let detail = repo.get_student(id).await.expect("Get failed");
        assert_eq!(detail.student["student_name"].as_string(), "Ana");
        assert_eq!(detail.student["date_of_birth"].as_string(), "2004-01-01");
        assert!(detail.marks.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creates_share_the_pool() {
        let dir = TempDir::new().expect("tempdir");
        let (db, repo) = open(&dir).await;

        let mut handles = vec![];
        for i in 0..20 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create_student(&student(&format!("Concurrent {}", i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("Task panicked").expect("Insert failed");
        }

        assert_eq!(count(&db, "students").await, 20);
        let stats = db.stats();
        assert!(stats.size <= 4);
        assert_eq!(stats.waiting, 0);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_of_one_student() {
        let dir = TempDir::new().expect("tempdir");
        let (db, repo) = open(&dir).await;
        let ids = seed(&repo, 1).await;
        let course_id = course(&repo).await;
        add_mark(&repo, ids[0], course_id).await;

        let a = tokio::spawn({
            let repo = repo.clone();
            let id = ids[0];
            async move { repo.delete_student(id).await }
        });
        let b = tokio::spawn({
            let repo = repo.clone();
            let id = ids[0];
            async move { repo.delete_student(id).await }
        });

        let results = [
            a.await.expect("Task panicked"),
            b.await.expect("Task panicked"),
        ];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(RecordError::NotFound(_)))));
        assert_eq!(count(&db, "marks").await, 0);
    }
}

#[cfg(feature = "postgres")]
mod postgres_tests {
    use chrono::NaiveDate;
    use std::sync::Arc;
    use student_records::backends::PostgresDatabase;
    use student_records::core::{ConnectionBuilder, Database, DatabaseType, PoolConfig};
    use student_records::records::{
        NewMark, NewStudent, PageRequest, RecordError, Repository, Tables,
    };

    const SCHEMA: &str = "student_records_it";

    fn builder_from_env() -> Option<ConnectionBuilder> {
        let url = std::env::var("POSTGRES_URL").ok()?;
        let config: tokio_postgres::Config = url.parse().ok()?;

        let mut builder = ConnectionBuilder::new(DatabaseType::Postgres);
        if let Some(tokio_postgres::config::Host::Tcp(host)) = config.get_hosts().first() {
            builder = builder.host(host.clone());
        }
        if let Some(port) = config.get_ports().first() {
            builder = builder.port(*port);
        }
        if let Some(user) = config.get_user() {
            builder = builder.username(user);
        }
        if let Some(dbname) = config.get_dbname() {
            builder = builder.database(dbname);
        }
        if let Some(password) = config.get_password() {
            builder = builder.password(String::from_utf8_lossy(password).to_string());
        }
        Some(builder)
    }

    #[tokio::test]
    #[ignore] // Run with: POSTGRES_URL=... cargo test -- --ignored
    async fn test_postgres_record_flow() {
        let Some(builder) = builder_from_env() else {
            eprintln!("Skipping test: POSTGRES_URL not set");
            return;
        };

        let db = PostgresDatabase::new(&builder, PoolConfig::default().with_max_size(4))
            .expect("Failed to build pool");
        db.execute_batch(&format!(
            "DROP SCHEMA IF EXISTS {schema} CASCADE;
             CREATE SCHEMA {schema};
             CREATE TABLE {schema}.students (
                 student_id SERIAL PRIMARY KEY,
                 student_name VARCHAR(100) NOT NULL,
                 student_email VARCHAR(100) NOT NULL,
                 student_age INTEGER NOT NULL,
                 student_parent_id INTEGER REFERENCES {schema}.students(student_id),
                 date_of_birth DATE NOT NULL
             );
             CREATE TABLE {schema}.courses (
                 course_id SERIAL PRIMARY KEY,
                 course_name VARCHAR(100) NOT NULL,
                 course_code VARCHAR(20) NOT NULL
             );
             CREATE TABLE {schema}.marks (
                 mark_id SERIAL PRIMARY KEY,
                 student_id INTEGER NOT NULL REFERENCES {schema}.students(student_id),
                 course_id INTEGER NOT NULL REFERENCES {schema}.courses(course_id),
                 mark NUMERIC(5,2) NOT NULL,
                 date_recorded DATE NOT NULL
             );",
            schema = SCHEMA
        ))
        .await
        .expect("Failed to create schema");

        let db: Arc<dyn Database> = Arc::new(db);
        let repo = Repository::new(Arc::clone(&db), Tables::new(Some(SCHEMA)));

        let ana = NewStudent {
            student_name: "Ana".into(),
            student_email: "a@x.com".into(),
            student_age: 20,
            student_parent_id: None,
            date_of_birth: NaiveDate::from_ymd_opt(2004, 1, 1).expect("valid date"),
        };
        let created = repo.create_student(&ana).await.expect("Insert failed");
        let id = created["student_id"].as_long().expect("student_id");

        let page = repo
            .list_students(&PageRequest::new(1, 5, "an"))
            .await
            .expect("List failed");
        assert_eq!(page.total_count, 1);

        let missing = repo
            .create_mark(&NewMark {
                student_id: 999_999,
                course_id: 1,
                mark: 50.0,
                date_recorded: NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date"),
            })
            .await;
        assert!(matches!(missing, Err(RecordError::NotFound(_))));

        repo.delete_student(id).await.expect("Delete failed");
        assert!(matches!(
            repo.get_student(id).await,
            Err(RecordError::NotFound(_))
        ));

        db.execute_batch(&format!("DROP SCHEMA {} CASCADE", SCHEMA))
            .await
            .expect("Cleanup failed");
    }
}
