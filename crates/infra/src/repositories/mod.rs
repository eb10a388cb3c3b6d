mod reviews;
mod tours;

pub use reviews::*;
pub use tours::*;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tourbook_domain::DomainResult;
use tourbook_domain::error::DomainError;

fn to_rfc3339(timestamp_ms: i64) -> DomainResult<String> {
    let dt = OffsetDateTime::from_unix_timestamp_nanos(timestamp_ms as i128 * 1_000_000)
        .map_err(|err| DomainError::Validation(format!("invalid timestamp: {err}")))?;
    dt.format(&Rfc3339)
        .map_err(|err| DomainError::Validation(format!("invalid timestamp: {err}")))
}

fn parse_datetime_ms(value: &str) -> DomainResult<i64> {
    let datetime = OffsetDateTime::parse(value, &Rfc3339).map_err(|err| {
        DomainError::Unavailable(format!("invalid stored datetime '{value}': {err}"))
    })?;
    Ok((datetime.unix_timestamp_nanos() / 1_000_000) as i64)
}
