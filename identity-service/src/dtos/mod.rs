pub mod auth;

use serde::Serialize;

use crate::services::catalog::MessageCatalog;
use crate::services::error::ServiceError;

/// Error payload returned to clients: numeric code plus a localized
/// description. Built at the operation boundary, after the real cause has
/// been logged server-side.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(err: &ServiceError, catalog: &dyn MessageCatalog, locale: &str) -> Self {
        Self {
            code: err.status_code(),
            error: err.describe(catalog, locale),
        }
    }
}
