use std::collections::BTreeMap;

use engine_logging::Redacted;

use crate::PreconditionError;

/// Cookie names carried over from the authenticated browser session.
pub const SESSION_COOKIE_NAMES: &[&str] = &[
    "datr",
    "ig_did",
    "ps_l",
    "ps_n",
    "mid",
    "wd",
    "dpr",
    "csrftoken",
    "rur",
    "sessionid",
    "ds_user_id",
];

const SESSION_ID_COOKIE: &str = "sessionid";
const USER_ID_COOKIE: &str = "ds_user_id";
const CSRF_COOKIE: &str = "csrftoken";

/// Short-lived authenticated session produced by the login collaborator.
///
/// Lives for one capture run only. Secrets are wrapped in [`Redacted`] so the
/// `Debug` output is safe to log, although callers should not log it anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    numeric_account_id: String,
    csrf_token: Redacted<String>,
    app_id: Redacted<String>,
    cookies: Redacted<BTreeMap<String, String>>,
}

impl SessionCredentials {
    /// Builds credentials without checking them. Call [`validate`](Self::validate)
    /// before use.
    pub fn new(
        numeric_account_id: impl Into<String>,
        csrf_token: impl Into<String>,
        app_id: impl Into<String>,
        cookies: BTreeMap<String, String>,
    ) -> Self {
        Self {
            numeric_account_id: numeric_account_id.into(),
            csrf_token: Redacted::new(csrf_token.into()),
            app_id: Redacted::new(app_id.into()),
            cookies: Redacted::new(cookies),
        }
    }

    /// Derives credentials from a browser cookie dump.
    ///
    /// Only the known session cookies are kept. The user id and CSRF token are
    /// read from `ds_user_id` and `csrftoken`.
    pub fn from_cookies<I, K, V>(
        app_id: impl Into<String>,
        cookies: I,
    ) -> Result<Self, PreconditionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let cookies: BTreeMap<String, String> = cookies
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .filter(|(name, _)| SESSION_COOKIE_NAMES.contains(&name.as_str()))
            .collect();

        let user_id = cookies.get(USER_ID_COOKIE).cloned().unwrap_or_default();
        let csrf_token = cookies.get(CSRF_COOKIE).cloned().unwrap_or_default();
        let credentials = Self::new(user_id, csrf_token, app_id, cookies);
        credentials.validate()?;
        Ok(credentials)
    }

    /// Checks the fields every capture needs. Failures here are fatal.
    pub fn validate(&self) -> Result<(), PreconditionError> {
        let has_session = self
            .cookies
            .expose()
            .get(SESSION_ID_COOKIE)
            .is_some_and(|value| !value.trim().is_empty());
        if !has_session {
            return Err(PreconditionError::MissingSessionId);
        }
        if self.numeric_account_id.trim().is_empty() {
            return Err(PreconditionError::MissingUserId);
        }
        if self.app_id.expose().trim().is_empty() {
            return Err(PreconditionError::MissingAppId);
        }
        Ok(())
    }

    pub fn numeric_account_id(&self) -> &str {
        &self.numeric_account_id
    }

    pub fn csrf_token(&self) -> &str {
        self.csrf_token.expose()
    }

    pub fn app_id(&self) -> &str {
        self.app_id.expose()
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        self.cookies.expose()
    }

    /// `Cookie` header value, names in ascending order.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .expose()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_dump() -> Vec<(&'static str, &'static str)> {
        vec![
            ("sessionid", "s3cr3t"),
            ("ds_user_id", "1234"),
            ("csrftoken", "c5rfv4lue"),
            ("tracking", "drop-me"),
        ]
    }

    #[test]
    fn from_cookies_derives_ids_and_filters_unknown_cookies() {
        let session = SessionCredentials::from_cookies("936619743392459", cookie_dump()).unwrap();
        assert_eq!(session.numeric_account_id(), "1234");
        assert_eq!(session.csrf_token(), "c5rfv4lue");
        assert!(!session.cookies().contains_key("tracking"));
        assert_eq!(
            session.cookie_header(),
            "csrftoken=c5rfv4lue; ds_user_id=1234; sessionid=s3cr3t"
        );
    }

    #[test]
    fn missing_session_or_user_id_is_fatal() {
        let no_session = vec![("ds_user_id", "1234")];
        assert_eq!(
            SessionCredentials::from_cookies("app", no_session),
            Err(PreconditionError::MissingSessionId)
        );

        let no_user = vec![("sessionid", "abc")];
        assert_eq!(
            SessionCredentials::from_cookies("app", no_user),
            Err(PreconditionError::MissingUserId)
        );
    }

    #[test]
    fn debug_output_does_not_leak_secrets() {
        let session = SessionCredentials::from_cookies("app", cookie_dump()).unwrap();
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("c5rfv4lue"));
    }
}
