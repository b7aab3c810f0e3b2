use crate::common::errors::BusinessError;
use crate::config::Config;
use sea_orm::DatabaseConnection;

#[derive(Clone)]
pub struct AppState {
    /// `None` when submission persistence is disabled
    pub db: Option<DatabaseConnection>,
    pub config: Config,
}

impl AppState {
    pub fn new(db: Option<DatabaseConnection>, config: Config) -> Self {
        Self { db, config }
    }

    /// The database connection, or the error persistence endpoints report
    /// when it is not configured
    pub fn db(&self) -> Result<&DatabaseConnection, BusinessError> {
        self.db.as_ref().ok_or_else(BusinessError::database_disabled)
    }
}
