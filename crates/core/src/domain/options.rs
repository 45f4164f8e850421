// Begin Options

use serde::{Deserialize, Serialize};

use crate::domain::IsolationLevel;

/// Options passed to `UnitOfWork::begin`.
///
/// Both fields are optional; the driver picks its defaults for whatever is
/// left unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeginOptions {
    /// Logical database to open the context against.
    #[serde(default)]
    pub database: Option<String>,

    /// Requested isolation level.
    #[serde(default)]
    pub isolation_level: Option<IsolationLevel>,
}

impl BeginOptions {
    pub fn database(name: impl Into<String>) -> Self {
        Self {
            database: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn isolation(level: IsolationLevel) -> Self {
        Self {
            isolation_level: Some(level),
            ..Self::default()
        }
    }
}
