//! Runtime settings gathered from flags and the environment.

/// Environment variable pointing the client at a local emulator.
pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";

/// Database id used when none is given.
pub const DEFAULT_DATABASE_ID: &str = "(default)";

/// How the server connects to its database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Firestore database id within the project.
    pub database_id: String,
    /// `host:port` of a Firestore emulator, if any.
    pub emulator_host: Option<String>,
    /// Serve from an in-process store instead of Firestore.
    pub in_memory: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_id: DEFAULT_DATABASE_ID.to_string(),
            emulator_host: None,
            in_memory: false,
        }
    }
}

impl Settings {
    /// Defaults plus `FIRESTORE_EMULATOR_HOST` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults plus values read through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            emulator_host: lookup(EMULATOR_HOST_ENV)
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
            ..Self::default()
        }
    }

    /// Use a named database.
    pub fn with_database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    /// Toggle the in-memory store.
    pub fn with_in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }
}
