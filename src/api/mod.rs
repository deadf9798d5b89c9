pub mod dashboard;
pub mod notification;
pub mod organization;
pub mod project;
pub mod time_record;
pub mod timesheet;

use actix_web::HttpResponse;
use serde_json::json;

/// Logs a database failure and hides it behind a plain 500.
pub(crate) fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> actix_web::Error {
    move |e| {
        tracing::error!(error = %e, "{}", context);
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    }
}

pub(crate) fn message(mut builder: actix_web::HttpResponseBuilder, text: &str) -> HttpResponse {
    builder.json(json!({ "message": text }))
}

pub(crate) fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// A row referenced an id that does not exist.
pub(crate) fn is_missing_reference(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

/// Result of inserting one membership row (project worker, organization user).
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Membership {
    Added,
    AlreadyPresent,
    /// The user or the group it was added to does not exist.
    MissingReference,
}

pub(crate) fn membership<T>(result: Result<T, sqlx::Error>) -> Result<Membership, sqlx::Error> {
    match result {
        Ok(_) => Ok(Membership::Added),
        Err(e) if is_duplicate(&e) => Ok(Membership::AlreadyPresent),
        Err(e) if is_missing_reference(&e) => Ok(Membership::MissingReference),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::{error::Error as StdError, fmt};

    /// Constraint failure as the MySQL driver reports it.
    #[derive(Debug)]
    pub(crate) struct ConstraintError {
        unique: bool,
    }

    impl fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message())
        }
    }

    impl StdError for ConstraintError {}

    impl DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            if self.unique {
                "Duplicate entry"
            } else {
                "Cannot add or update a child row: a foreign key constraint fails"
            }
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some("23000".into())
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::ForeignKeyViolation
            }
        }
    }

    pub(crate) fn duplicate() -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintError { unique: true }))
    }

    pub(crate) fn missing_reference() -> sqlx::Error {
        sqlx::Error::Database(Box::new(ConstraintError { unique: false }))
    }

    #[test]
    fn both_constraints_share_sqlstate_but_are_told_apart() {
        assert!(is_duplicate(&duplicate()));
        assert!(!is_duplicate(&missing_reference()));
        assert!(is_missing_reference(&missing_reference()));
        assert!(!is_missing_reference(&duplicate()));
    }

    #[test]
    fn membership_outcomes() {
        assert_eq!(membership(Ok::<(), _>(())).unwrap(), Membership::Added);
        assert_eq!(
            membership::<()>(Err(duplicate())).unwrap(),
            Membership::AlreadyPresent
        );
        assert_eq!(
            membership::<()>(Err(missing_reference())).unwrap(),
            Membership::MissingReference
        );
        assert!(membership::<()>(Err(sqlx::Error::RowNotFound)).is_err());
    }
}
