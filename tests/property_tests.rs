//! Property-based tests for pagination, the query builder and values using proptest

use proptest::prelude::*;
use student_records::core::query_builder::{InsertBuilder, SelectBuilder, UpdateBuilder};
use student_records::prelude::*;
use student_records::records::parse_leading_int;

/// Highest `$n` placeholder in `sql`
fn max_placeholder(sql: &str) -> usize {
    sql.split('$')
        .skip(1)
        .filter_map(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .max()
        .unwrap_or(0)
}

// ============================================================================
// Pagination Tests
// ============================================================================

proptest! {
    /// Normalized page and limit are always positive
    #[test]
    fn test_page_request_is_positive(page in any::<i64>(), limit in any::<i64>()) {
        let req = PageRequest::new(page, limit, "");
        prop_assert!(req.page >= 1);
        prop_assert!(req.limit >= 1);
        prop_assert!(req.offset() >= 0);
    }

    /// Offset skips exactly the rows of the earlier pages
    #[test]
    fn test_offset_formula(page in 1i64..100_000, limit in 1i64..10_000) {
        let req = PageRequest::new(page, limit, "");
        prop_assert_eq!(req.offset(), (page - 1) * limit);
    }

    /// totalPages == ceil(totalCount / limit)
    #[test]
    fn test_total_pages_is_ceiling(total in 0i64..1_000_000, limit in 1i64..1_000) {
        let req = PageRequest::new(1, limit, "");
        let pages = req.total_pages(total);
        prop_assert_eq!(pages, (total + limit - 1) / limit);
        prop_assert!(pages * limit >= total);
        prop_assert!(pages == 0 || (pages - 1) * limit < total);
    }

    /// Plain integers parse exactly
    #[test]
    fn test_parse_plain_integers(value in any::<i64>()) {
        prop_assert_eq!(parse_leading_int(&value.to_string()), Some(value));
    }

    /// Trailing garbage after the digits is ignored
    #[test]
    fn test_parse_ignores_suffix(value in 0i64..1_000_000, suffix in "[a-z.]{0,8}") {
        let raw = format!("{}{}", value, suffix);
        prop_assert_eq!(parse_leading_int(&raw), Some(value));
    }

    /// Text without a leading digit never parses
    #[test]
    fn test_parse_rejects_non_numeric(raw in "[a-zA-Z][a-zA-Z0-9]{0,10}") {
        prop_assert_eq!(parse_leading_int(&raw), None);
    }
}

// ============================================================================
// Query Builder Tests
// ============================================================================

proptest! {
    /// Search text only ever appears as a bound parameter
    #[test]
    fn test_search_is_never_interpolated(search in ".{1,40}", page in 1i64..50, limit in 1i64..50) {
        let req = PageRequest::new(page, limit, search.clone());
        let pattern = req.search_pattern().expect("non-empty search");
        let statement = SelectBuilder::new("students")
            .count_column("count")
            .where_ilike("student_name", &pattern)
            .order_by_asc("student_id")
            .limit(req.limit)
            .offset(req.offset())
            .to_statement();

        prop_assert_eq!(
            &statement.sql,
            "SELECT (SELECT COUNT(*) FROM students WHERE student_name ILIKE $1) AS count, * \
             FROM students WHERE student_name ILIKE $1 ORDER BY student_id ASC LIMIT $2 OFFSET $3"
        );
        prop_assert_eq!(statement.params.len(), 3);
        prop_assert_eq!(&statement.params[0], &DatabaseValue::String(pattern));
        prop_assert_eq!(&statement.params[1], &DatabaseValue::Long(req.limit));
        prop_assert_eq!(&statement.params[2], &DatabaseValue::Long(req.offset()));
    }

    /// Every placeholder has a parameter and every parameter a placeholder
    #[test]
    fn test_insert_placeholders_match_params(columns in prop::collection::btree_set("[a-z]{1,8}", 1..10)) {
        let builder = columns
            .iter()
            .fold(InsertBuilder::new("t"), |b, c| b.value(c, c.as_str()))
            .returning_all();
        let statement = builder.to_statement();
        prop_assert_eq!(max_placeholder(&statement.sql), statement.params.len());
        prop_assert!(statement.sql.ends_with(" RETURNING *"));
    }

    /// SET values come first, then the key
    #[test]
    fn test_update_key_is_last_placeholder(columns in prop::collection::btree_set("[a-z]{1,8}", 1..10), id in any::<i64>()) {
        let statement = columns
            .iter()
            .fold(UpdateBuilder::new("t"), |b, c| b.set(c, 1i32))
            .where_eq("id", id)
            .to_statement();
        let n = columns.len() + 1;
        let key_clause = format!("WHERE id = ${}", n);
        prop_assert!(statement.sql.contains(&key_clause));
        prop_assert_eq!(statement.params.last(), Some(&DatabaseValue::Long(id)));
    }
}

// ============================================================================
// Value Tests
// ============================================================================

proptest! {
    /// Dates survive a trip through their text form
    #[test]
    fn test_date_text_roundtrip(days in 0i64..100_000) {
        let date = chrono::NaiveDate::from_ymd_opt(1900, 1, 1).unwrap() + chrono::Duration::days(days);
        let text = DatabaseValue::from(date).as_string();
        prop_assert_eq!(DatabaseValue::String(text).as_date(), Some(date));
    }

    /// Optional values map None to Null
    #[test]
    fn test_option_conversion(value in prop::option::of(any::<i64>())) {
        let db_val = DatabaseValue::from(value);
        prop_assert_eq!(db_val.is_null(), value.is_none());
        prop_assert_eq!(db_val.as_long(), value);
    }
}

// ============================================================================
// Listing Against a Store
// ============================================================================

#[cfg(feature = "sqlite")]
mod store_properties {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn list_page(rows: usize, page: i64, limit: i64) -> (usize, i64, i64) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let dir = TempDir::new().unwrap();
            let db = PooledSqliteDatabase::new(dir.path().join("prop.db"), PoolConfig::default())
                .await
                .unwrap();
            ensure_sqlite_schema(&db).await.unwrap();
            let repo = Repository::new(Arc::new(db), Tables::new(None));

            for i in 0..rows {
                repo.create_student(&NewStudent {
                    student_name: format!("S{}", i),
                    student_email: "s@x.com".into(),
                    student_age: 18,
                    student_parent_id: None,
                    date_of_birth: chrono::NaiveDate::from_ymd_opt(2005, 6, 1).unwrap(),
                })
                .await
                .unwrap();
            }

            let result = repo
                .list_students(&PageRequest::new(page, limit, ""))
                .await
                .unwrap();
            (result.students.len(), result.total_count, result.total_pages)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Page size is min(limit, rows remaining after the offset)
        #[test]
        fn test_page_size(rows in 0usize..15, page in 1i64..6, limit in 1i64..7) {
            let (returned, total, pages) = list_page(rows, page, limit);
            let offset = ((page - 1) * limit) as usize;
            let expected = rows.saturating_sub(offset).min(limit as usize);

            prop_assert_eq!(returned, expected);
            prop_assert_eq!(total, rows as i64);
            prop_assert_eq!(pages, (rows as i64 + limit - 1) / limit);
        }
    }
}
