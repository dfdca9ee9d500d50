use crate::error::AppError;
use tracing::debug;

/// Parses request headers given as `KEY=VALUE` or `KEY: VALUE`.
///
/// The pair is split at whichever separator comes first, so values may
/// themselves contain `=` or `:` (URLs, cookies).
pub fn parse_headers(headers: &[String]) -> Result<Vec<(String, String)>, AppError> {
    debug!("Parsing {} headers", headers.len());

    headers
        .iter()
        .map(|header| {
            let split_at = header.find(['=', ':']);
            split_at
                .map(|idx| (&header[..idx], &header[idx + 1..]))
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| {
                    debug!("Invalid header format: {header}");
                    AppError::InvalidInput(format!("Invalid header format: {header}"))
                })
        })
        .collect()
}
