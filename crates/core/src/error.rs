use thiserror::Error;

use crate::model::{ParseIdError, SettingsError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
