use connectors::{error::SourceError, sql::base::error::DbError};
use engine_core::retry::RetryDisposition;
use mysql_async::Error as MySqlError;

/// Duplicate key on insert.
const ER_DUP_ENTRY: u16 = 1062;

pub fn classify_source_error(err: &SourceError) -> RetryDisposition {
    if err.is_payload_too_large() {
        return RetryDisposition::Shrink;
    }
    if err.is_transient() {
        return RetryDisposition::Retry;
    }
    RetryDisposition::Stop
}

pub fn classify_db_error(err: &DbError) -> RetryDisposition {
    match err {
        DbError::Io(_) => RetryDisposition::Retry,
        DbError::MySql(mysql_err) => classify_mysql_error(mysql_err),
        DbError::Write(_) => RetryDisposition::Stop,
        DbError::QueryBuildError(_) => RetryDisposition::Stop,
        DbError::Unknown(_) => RetryDisposition::Stop,
    }
}

/// True for constraint violations such as a duplicate primary key.
pub fn is_duplicate_key(err: &DbError) -> bool {
    matches!(err, DbError::MySql(MySqlError::Server(server)) if server.code == ER_DUP_ENTRY)
}

fn classify_mysql_error(err: &MySqlError) -> RetryDisposition {
    match err {
        MySqlError::Io(_) | MySqlError::Other(_) => RetryDisposition::Retry,
        MySqlError::Driver(_) => RetryDisposition::Retry,
        MySqlError::Server(server_err) => {
            if is_retryable_mysql_server_error(server_err.code, server_err.state.as_str()) {
                RetryDisposition::Retry
            } else {
                RetryDisposition::Stop
            }
        }
        _ => RetryDisposition::Stop,
    }
}

fn is_retryable_mysql_server_error(code: u16, state: &str) -> bool {
    // Common MySQL server error codes that are typically transient/retryable.
    // See: https://dev.mysql.com/doc/mysql-errors/8.0/en/server-error-reference.html
    const RETRYABLE_CODES: [u16; 8] = [1205, 1213, 2002, 2003, 2006, 2013, 1040, 1042];
    if RETRYABLE_CODES.contains(&code) {
        return true;
    }

    // TiDB write conflict and server-is-busy.
    if matches!(code, 9007 | 9003) {
        return true;
    }

    matches!(state, "40001" | "HYT00" | "08S01")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::ServerError;

    fn server_error(code: u16, state: &str) -> DbError {
        DbError::MySql(MySqlError::Server(ServerError {
            code,
            message: "test".into(),
            state: state.into(),
        }))
    }

    #[test]
    fn duplicate_key_is_fatal() {
        let err = server_error(ER_DUP_ENTRY, "23000");
        assert_eq!(classify_db_error(&err), RetryDisposition::Stop);
        assert!(is_duplicate_key(&err));
    }

    #[test]
    fn deadlocks_are_retried() {
        assert_eq!(
            classify_db_error(&server_error(1213, "40001")),
            RetryDisposition::Retry
        );
        assert_eq!(
            classify_db_error(&server_error(9007, "HY000")),
            RetryDisposition::Retry
        );
    }

    #[test]
    fn oversized_pages_shrink() {
        let err = SourceError::PayloadTooLarge {
            endpoint: "/collections/c/points/scroll".into(),
            message: String::new(),
        };
        assert_eq!(classify_source_error(&err), RetryDisposition::Shrink);

        let err = SourceError::Status {
            endpoint: "/collections/c/points/scroll".into(),
            status: 503,
            body: String::new(),
        };
        assert_eq!(classify_source_error(&err), RetryDisposition::Retry);

        let err = SourceError::Decode {
            endpoint: "/collections/c".into(),
            message: "eof".into(),
        };
        assert_eq!(classify_source_error(&err), RetryDisposition::Stop);
    }
}
