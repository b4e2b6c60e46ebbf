//! Keychain storage for flowdoctor credentials
//!
//! Credentials live as JSON in a single keychain entry.

use keyring::Entry;
use serde::{Deserialize, Serialize};

const KEYRING_SERVICE: &str = "flowdoctor-credentials";
const KEYRING_USERNAME: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_api_key: Option<String>,
}

type KeyringResult<T> = Result<T, String>;

fn keyring_disabled() -> bool {
    if cfg!(test) {
        return true;
    }
    matches!(
        std::env::var("FLOWDOCTOR_DISABLE_KEYRING")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn keyring_entry() -> Result<Entry, keyring::Error> {
    Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)
}

fn read_credentials() -> KeyringResult<StoredCredentials> {
    if keyring_disabled() {
        return Ok(StoredCredentials::default());
    }
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    match entry.get_password() {
        Ok(json) => {
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse credentials: {}", e))
        }
        Err(keyring::Error::NoEntry) => Ok(StoredCredentials::default()),
        Err(err) => Err(err.to_string()),
    }
}

fn write_credentials(creds: &StoredCredentials) -> KeyringResult<()> {
    if keyring_disabled() {
        return Err("system keychain is disabled".to_string());
    }
    let json = serde_json::to_string(creds).map_err(|e| e.to_string())?;
    let entry = keyring_entry().map_err(|e| e.to_string())?;
    entry.set_password(&json).map_err(|e| e.to_string())
}

/// LLM API key stored in the keychain, if any
pub fn get_api_key() -> KeyringResult<Option<String>> {
    Ok(read_credentials()?.llm_api_key)
}

/// Store the LLM API key in the keychain
pub fn set_api_key(key: &str) -> KeyringResult<()> {
    let mut creds = read_credentials().unwrap_or_default();
    creds.llm_api_key = Some(key.to_string());
    write_credentials(&creds)
}
