//! `PostgreSQL` backend.
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow` row
//! types, so the crate builds without a live database. Multi-statement
//! writes (order placement, protected deletes) run in a transaction.

mod accounts;
mod carts;
mod catalog;
mod orders;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{RepoResult, RepositoryError, Store};

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Maps constraint violations on a write to domain errors; anything else stays a database error.
fn constraint_error(e: sqlx::Error, on_foreign_key: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Invalid(on_foreign_key.to_owned());
        }
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(db_err.message().to_owned());
        }
    }
    RepositoryError::Database(e)
}

/// Maps a foreign key violation on a delete to `protected`; the row is still referenced.
fn delete_error(e: sqlx::Error, protected: impl Into<RepositoryError>) -> RepositoryError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => protected.into(),
        e => RepositoryError::Database(e),
    }
}

/// Escapes `%`, `_` and `\` so a search term matches literally inside `ILIKE`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::fmt;

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;
    use crate::domain::aggregates::CatalogError;

    #[derive(Debug)]
    struct Violation(ErrorKind);

    impl fmt::Display for Violation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "constraint violated")
        }
    }

    impl std::error::Error for Violation {}

    impl DatabaseError for Violation {
        fn message(&self) -> &str {
            "constraint violated"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            None
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.0 {
                ErrorKind::ForeignKeyViolation => ErrorKind::ForeignKeyViolation,
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn violation(kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Violation(kind)))
    }

    #[test]
    fn test_foreign_key_violation_on_delete_is_protected() {
        let err = delete_error(violation(ErrorKind::ForeignKeyViolation), CatalogError::ProductInOrders);
        assert!(matches!(err, RepositoryError::Protected(ref m) if m == "product cannot be deleted, associated with orderitem"));

        let err = delete_error(violation(ErrorKind::UniqueViolation), CatalogError::ProductInOrders);
        assert!(matches!(err, RepositoryError::Database(_)));
        assert!(matches!(delete_error(sqlx::Error::RowNotFound, CatalogError::ProductInOrders), RepositoryError::Database(_)));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("mug"), "%mug%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
