use std::sync::{PoisonError, RwLock};

use crate::config::Settings;
use crate::database::DatabaseClient;
use crate::error::Result;

/// Process-wide state shared read-only by every call job.
#[derive(Debug)]
pub struct AppContext {
    settings: Settings,
    database: RwLock<Option<DatabaseClient>>,
}

impl AppContext {
    /// Build the context from loaded settings. Performs no I/O.
    ///
    /// # Errors
    /// Returns an error if the database client cannot be constructed.
    #[allow(clippy::result_large_err)]
    pub fn init(settings: Settings) -> Result<Self> {
        let database =
            DatabaseClient::new(&settings.supabase_url, &settings.supabase_service_role_key)?;
        if !database.is_configured() {
            tracing::warn!("SUPABASE_URL is not set; database client has no endpoint");
        }
        tracing::debug!(voice = %settings.voice, "Application context initialised");
        Ok(Self {
            settings,
            database: RwLock::new(Some(database)),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The shared database client, or `None` once the context is closed.
    #[must_use]
    pub fn database(&self) -> Option<DatabaseClient> {
        self.database
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Release shared resources at shutdown. Once the last handle to the
    /// database client is dropped its pooled connections close. Later calls
    /// do nothing.
    pub fn close(&self) {
        let released = self
            .database
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            tracing::info!("Application context closed");
        }
    }
}
