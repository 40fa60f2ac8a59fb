use crate::domain::value_objects::repo_type::RepoType;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Project identifier assigned by configuration storage
pub type ProjectId = i64;

/// Transport credentials for a project's source.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// SSH private key used by git over ssh and by sftp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            private_key: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none() && self.private_key.is_none()
    }

    /// Fill missing username/password from the userinfo part of `url`.
    ///
    /// Explicit credentials always win over the URL.
    pub fn merged_with_url(&self, url: &Url) -> Credentials {
        let decode = |s: &str| percent_decode_str(s).decode_utf8_lossy().into_owned();

        let username = self
            .username
            .clone()
            .or_else(|| Some(url.username()).filter(|u| !u.is_empty()).map(decode));
        let password = self
            .password
            .clone()
            .or_else(|| url.password().map(decode));

        Credentials {
            username,
            password,
            private_key: self.private_key.clone(),
        }
    }
}

/// A project as handed over by configuration storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: ProjectId,

    #[serde(rename = "type")]
    pub repo_type: RepoType,

    pub url: String,

    #[serde(default, skip_serializing_if = "Credentials::is_empty")]
    pub credentials: Credentials,
}

impl ProjectRef {
    pub fn new(id: ProjectId, repo_type: RepoType, url: impl Into<String>) -> Self {
        Self {
            id,
            repo_type,
            url: url.into(),
            credentials: Credentials::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}
