//! Conversions from external infrastructure errors into domain errors.

use calsync_common::CommonError;
use calsync_domain::CalsyncError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CalsyncError);

pub type InfraResult<T> = Result<T, InfraError>;

impl From<InfraError> for CalsyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CalsyncError> for InfraError {
    fn from(value: CalsyncError) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

trait IntoCalsyncError {
    fn into_calsync(self) -> CalsyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CalsyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalsyncError for SqlError {
    fn into_calsync(self) -> CalsyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => CalsyncError::Storage("database is busy".into()),
                    ErrorCode::DatabaseLocked => CalsyncError::Storage("database is locked".into()),
                    ErrorCode::NotADatabase => {
                        CalsyncError::Storage(format!("file is not a database: {message}"))
                    }
                    _ => CalsyncError::Storage(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CalsyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CalsyncError::Storage(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CalsyncError::Storage(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => CalsyncError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CalsyncError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_calsync())
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(CalsyncError::Storage(format!("connection pool: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(value.into())
    }
}

impl From<CommonError> for InfraError {
    fn from(value: CommonError) -> Self {
        let message = value.to_string();
        Self(match value {
            CommonError::Config { .. } => CalsyncError::Config(message),
            CommonError::Validation { .. } => CalsyncError::Validation(message),
            CommonError::Crypto { .. } => CalsyncError::Security(message),
            CommonError::Serialization { .. } | CommonError::Internal { .. } => {
                CalsyncError::Internal(message)
            }
        })
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CalsyncError */
/* -------------------------------------------------------------------------- */

impl IntoCalsyncError for HttpError {
    fn into_calsync(self) -> CalsyncError {
        if self.is_timeout() {
            return CalsyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CalsyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => CalsyncError::AuthExpired(message),
                404 => CalsyncError::NotFound(message),
                400..=499 => CalsyncError::Validation(message),
                _ => CalsyncError::Network(message),
            };
        }

        if self.is_decode() {
            return CalsyncError::Internal(format!("invalid response body: {self}"));
        }

        CalsyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_calsync())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
