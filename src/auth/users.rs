use serde::Deserialize;
use sha2::{Digest, Sha256};
use snafu::ResultExt;
use std::collections::HashMap;

use super::CredentialStore;
use crate::error::{ParseUsersSnafu, ReadUsersSnafu, Result};

/// One account in the users file.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub name: Option<String>,
    /// Hex-encoded SHA-256 of the password.
    pub password_sha256: String,
}

/// Maps usernames to their account entry.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "admin":      { "name": "Coordinación Nacional", "password_sha256": "5e88..." },
///   "guayas_x_3": { "name": "Guayas C3",             "password_sha256": "a665..." }
/// }
/// ```
pub struct UserDirectory {
    entries: HashMap<String, UserEntry>,
}

impl UserDirectory {
    /// Loads the directory from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).context(ReadUsersSnafu { path })?;
        Self::parse(&content, path)
    }

    /// Parses a directory from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, path: &str) -> Result<Self> {
        let entries: HashMap<String, UserEntry> =
            serde_json::from_str(content).context(ParseUsersSnafu { path })?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for UserDirectory {
    fn verify(&self, username: &str, password: &str) -> bool {
        match self.entries.get(username) {
            Some(entry) => entry
                .password_sha256
                .trim()
                .eq_ignore_ascii_case(&hash_password(password)),
            None => false,
        }
    }

    fn display_name(&self, username: &str) -> Option<String> {
        self.entries.get(username).and_then(|e| e.name.clone())
    }
}

/// Hex-encoded SHA-256 digest of `password`, the format stored in the users file.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn directory() -> UserDirectory {
        let json = format!(
            r#"{{"admin": {{"name": "Nacional", "password_sha256": "{}"}},
                "guayas": {{"password_sha256": "{}"}}}}"#,
            hash_password("secret"),
            hash_password("guayas-pass").to_uppercase()
        );
        UserDirectory::from_json(&json).unwrap()
    }

    #[test]
    fn test_hash_password_known_value() {
        assert_eq!(
            hash_password("password"),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn test_verify_accepts_matching_password() {
        let dir = directory();
        assert_eq!(dir.len(), 2);
        assert!(dir.verify("admin", "secret"));
        assert!(dir.verify("guayas", "guayas-pass"));
    }

    #[test]
    fn test_verify_rejects_wrong_password_and_unknown_user() {
        let dir = directory();
        assert!(!dir.verify("admin", "Secret"));
        assert!(!dir.verify("nobody", "secret"));
    }

    #[test]
    fn test_display_name() {
        let dir = directory();
        assert_eq!(dir.display_name("admin").as_deref(), Some("Nacional"));
        assert_eq!(dir.display_name("guayas"), None);
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let path = format!("{}/delegate_semaphore_bad_users.json", env::temp_dir().display());
        fs::write(&path, "not json").unwrap();

        let err = UserDirectory::load(&path).err().unwrap();
        assert!(err.to_string().contains(&path));

        fs::remove_file(&path).unwrap();
    }
}
