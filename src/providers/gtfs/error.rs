use thiserror::Error;

#[derive(Debug, Error)]
pub enum GtfsError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Network error: {0}")]
    NetworkMessage(String),
    #[error("GTFS parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("Table not found: {0}")]
    TableNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_network_message() {
        let err = GtfsError::NetworkMessage("connection refused".into());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn error_display_parse_error() {
        let err = GtfsError::ParseError("invalid CSV".into());
        assert_eq!(err.to_string(), "GTFS parse error: invalid CSV");
    }

    #[test]
    fn error_display_table_not_found() {
        let err = GtfsError::TableNotFound("routes.txt".into());
        assert_eq!(err.to_string(), "Table not found: routes.txt");
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GtfsError = io_err.into();
        assert!(err.to_string().contains("file not found"));
        assert!(matches!(err, GtfsError::IoError(_)));
    }

    #[test]
    fn error_from_json_error() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("not valid json!!!");
        if let Err(json_err) = result {
            let err: GtfsError = json_err.into();
            assert!(matches!(err, GtfsError::JsonError(_)));
        }
    }
}
