//! Constraint classification: native database error → storage outcome.

use crate::error::StorageError;
use sqlx::error::DatabaseError;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    Unique(Option<String>),
    ForeignKey(Option<String>),
}

/// Supplied by the storage adapter so the gateway never matches vendor codes itself.
pub trait ConstraintClassifier: Send + Sync {
    fn classify(&self, err: &dyn DatabaseError) -> Option<Violation>;

    /// Turn a driver error into a storage outcome; unclassified errors stay opaque.
    fn storage_error(&self, err: sqlx::Error) -> StorageError {
        match err {
            sqlx::Error::Database(db) => match self.classify(&*db) {
                Some(Violation::Unique(constraint)) => StorageError::UniqueViolation { constraint },
                Some(Violation::ForeignKey(constraint)) => StorageError::ForeignKeyViolation { constraint },
                None => StorageError::Db(sqlx::Error::Database(db)),
            },
            other => StorageError::Db(other),
        }
    }
}

/// SQLSTATE-based classifier for PostgreSQL.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostgresClassifier;

impl ConstraintClassifier for PostgresClassifier {
    fn classify(&self, err: &dyn DatabaseError) -> Option<Violation> {
        classify_sqlstate(err.code().as_deref(), err.constraint())
    }
}

pub fn classify_sqlstate(code: Option<&str>, constraint: Option<&str>) -> Option<Violation> {
    let constraint = constraint.map(str::to_string);
    match code? {
        UNIQUE_VIOLATION => Some(Violation::Unique(constraint)),
        FOREIGN_KEY_VIOLATION => Some(Violation::ForeignKey(constraint)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_postgres_codes() {
        assert_eq!(
            classify_sqlstate(Some("23505"), Some("sellers_cid_key")),
            Some(Violation::Unique(Some("sellers_cid_key".into())))
        );
        assert_eq!(
            classify_sqlstate(Some("23503"), Some("employees_warehouse_id_fkey")),
            Some(Violation::ForeignKey(Some("employees_warehouse_id_fkey".into())))
        );
        assert_eq!(classify_sqlstate(Some("23505"), None), Some(Violation::Unique(None)));
    }

    #[test]
    fn other_codes_stay_unclassified() {
        assert_eq!(classify_sqlstate(Some("23502"), Some("x")), None);
        assert_eq!(classify_sqlstate(Some("57014"), None), None);
        assert_eq!(classify_sqlstate(None, None), None);
    }

    #[test]
    fn non_database_errors_are_opaque() {
        let err = PostgresClassifier.storage_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StorageError::Db(sqlx::Error::PoolTimedOut)));
    }
}
