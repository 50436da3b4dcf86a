use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use churn_core::{AccountIdentity, SessionCredentials};
use churn_engine::{SessionError, SessionProvider};
use engine_logging::engine_debug;
use serde::Deserialize;

/// Session dump written by the login helper.
#[derive(Deserialize)]
struct SessionFile {
    app_id: String,
    cookies: BTreeMap<String, String>,
}

/// Reads the session from a RON file when the run asks for it, so the file is
/// only touched once the run lock is held.
pub struct FileSessionProvider {
    path: PathBuf,
}

impl FileSessionProvider {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<SessionCredentials, SessionError> {
        let content = fs::read_to_string(&self.path).map_err(|err| {
            SessionError::Unavailable(format!("cannot read {:?}: {}", self.path, err))
        })?;
        let file: SessionFile = ron::from_str(&content).map_err(|err| {
            SessionError::Unavailable(format!("cannot parse {:?}: {}", self.path, err))
        })?;
        Ok(SessionCredentials::from_cookies(file.app_id, file.cookies)?)
    }
}

#[async_trait::async_trait]
impl SessionProvider for FileSessionProvider {
    async fn session(
        &self,
        account: &AccountIdentity,
    ) -> Result<SessionCredentials, SessionError> {
        engine_debug!("Loading session for {} from {:?}", account, self.path);
        self.load()
    }
}
