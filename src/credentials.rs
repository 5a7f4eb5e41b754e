//! Credential file: a flat JSON object holding the YoLink account keys and,
//! per profile, the Postgres connection fields.
//!
//! ```json
//! {
//!   "user_id": "...",
//!   "user_key": "...",
//!   "dev_postgres_host": "localhost",
//!   "dev_postgres_port": 5432,
//!   "dev_postgres_database_name": "home",
//!   "dev_postgres_username": "yolink",
//!   "dev_postgres_password": "..."
//! }
//! ```

use std::{fmt, path::Path};

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sqlx::postgres::PgConnectOptions;

pub struct Credentials {
    values: Map<String, Value>,
}

/// Keys for the YoLink token endpoint (`client_id` / `client_secret`).
#[derive(Clone)]
pub struct AccountCredentials {
    pub user_id: String,
    pub user_key: String,
}

#[derive(Clone)]
pub struct DatabaseCredentials {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credential file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid credential file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text).context("credential file is not valid JSON")? {
            Value::Object(values) => Ok(Self { values }),
            _ => bail!("credential file must contain a JSON object"),
        }
    }

    pub fn account(&self) -> Result<AccountCredentials> {
        Ok(AccountCredentials {
            user_id: self.string("user_id")?,
            user_key: self.string("user_key")?,
        })
    }

    /// Postgres fields prefixed with `<profile>_postgres_`.
    pub fn database(&self, profile: &str) -> Result<DatabaseCredentials> {
        let key = |field: &str| format!("{profile}_postgres_{field}");
        let port_key = key("port");

        let port = match self.values.get(&port_key) {
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            None | Some(Value::Null) => bail!("credential file is missing '{port_key}'"),
            Some(_) => None,
        }
        .with_context(|| format!("'{port_key}' must be a port number"))?;

        Ok(DatabaseCredentials {
            host: self.string(&key("host"))?,
            port,
            database_name: self.string(&key("database_name"))?,
            username: self.string(&key("username"))?,
            password: self.string(&key("password"))?,
        })
    }

    fn string(&self, key: &str) -> Result<String> {
        match self.values.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            None | Some(Value::Null) => bail!("credential file is missing '{key}'"),
            Some(_) => bail!("'{key}' must be a string"),
        }
    }
}

impl DatabaseCredentials {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database_name)
            .username(&self.username)
            .password(&self.password)
    }
}

// Secrets stay out of logs.

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("user_id", &self.user_id)
            .field("user_key", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"{
        "user_id": "uid-1",
        "user_key": "secret-key",
        "dev_postgres_host": "localhost",
        "dev_postgres_port": 5432,
        "dev_postgres_database_name": "home",
        "dev_postgres_username": "yolink",
        "dev_postgres_password": "pw",
        "prod_postgres_host": "db.internal",
        "prod_postgres_port": "6543",
        "prod_postgres_database_name": "home",
        "prod_postgres_username": "yolink",
        "prod_postgres_password": "pw2"
    }"#;

    #[test]
    fn account_keys() {
        let account = Credentials::parse(SAMPLE).unwrap().account().unwrap();
        assert_eq!(account.user_id, "uid-1");
        assert_eq!(account.user_key, "secret-key");
        assert!(!format!("{account:?}").contains("secret-key"));
    }

    #[test]
    fn database_profile_with_numeric_or_string_port() {
        let creds = Credentials::parse(SAMPLE).unwrap();

        let dev = creds.database("dev").unwrap();
        assert_eq!(dev.host, "localhost");
        assert_eq!(dev.port, 5432);

        let prod = creds.database("prod").unwrap();
        assert_eq!(prod.host, "db.internal");
        assert_eq!(prod.port, 6543);
        assert_eq!(prod.password, "pw2");
        assert!(!format!("{prod:?}").contains("pw2"));
    }

    #[test]
    fn missing_profile_names_the_key() {
        let err = Credentials::parse(SAMPLE)
            .unwrap()
            .database("staging")
            .unwrap_err();
        assert!(err.to_string().contains("staging_postgres_port"));
    }

    #[test]
    fn missing_account_key_names_the_key() {
        let err = Credentials::parse(r#"{"user_id": "uid"}"#)
            .unwrap()
            .account()
            .unwrap_err();
        assert!(err.to_string().contains("user_key"));
    }

    #[test]
    fn bad_port_is_rejected() {
        let creds = Credentials::parse(
            r#"{"x_postgres_host": "h", "x_postgres_port": "http",
                "x_postgres_database_name": "d", "x_postgres_username": "u",
                "x_postgres_password": "p"}"#,
        )
        .unwrap();
        assert!(creds.database("x").is_err());
    }

    #[test]
    fn non_object_file_is_rejected() {
        assert!(Credentials::parse("[1, 2]").is_err());
        assert!(Credentials::parse("not json").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let creds = Credentials::load(file.path()).unwrap();
        assert_eq!(creds.account().unwrap().user_id, "uid-1");

        assert!(Credentials::load(Path::new("/nonexistent/credentials.json")).is_err());
    }
}
