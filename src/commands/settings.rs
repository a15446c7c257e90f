use crate::confluence::Credentials;
use crate::db::{Database, API_TOKEN_KEY, EMAIL_KEY};
use dialoguer::{Input, Password, Select};
use std::collections::BTreeMap;
use tracing::info;

pub const TOKEN_SETTINGS_URL: &str = "https://id.atlassian.com/manage-profile/security/api-tokens";

const SETTING_KEYS: &[&str] = &[
    EMAIL_KEY,
    API_TOKEN_KEY,
    "openai_api_key",
    "openai_base_url",
    "claude_api_key",
    "claude_base_url",
    "ollama_host",
];

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error("settings store error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("setup cancelled")]
    Cancelled,
}

fn is_secret(key: &str) -> bool {
    key.ends_with("_api_key") || key.ends_with("_api_token")
}

/// Mask API keys for display
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "****".to_string()
    }
}

pub fn get_settings(db: &Database) -> Result<BTreeMap<String, String>, SettingsError> {
    let mut map = BTreeMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = db.get_setting(key)? {
            if is_secret(key) {
                map.insert(key.to_string(), mask_secret(&value));
            } else {
                map.insert(key.to_string(), value);
            }
        }
    }
    Ok(map)
}

pub fn set_setting(db: &Database, key: &str, value: &str) -> Result<(), SettingsError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(SettingsError::UnknownKey(key.to_string()));
    }
    db.set_setting(key, value)?;
    Ok(())
}

pub fn delete_setting(db: &Database, key: &str) -> Result<(), SettingsError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(SettingsError::UnknownKey(key.to_string()));
    }
    db.delete_setting(key)?;
    Ok(())
}

/// Credentials from explicit flags, else the settings store, else first-time setup.
pub fn resolve_credentials(
    db: &Database,
    email: Option<&str>,
    token: Option<&str>,
) -> Result<Credentials, SettingsError> {
    if let (Some(email), Some(token)) = (email, token) {
        return Ok(Credentials {
            email: email.to_string(),
            token: token.to_string(),
        });
    }
    if let Some(stored) = db.load_credentials()? {
        info!("credentials loaded from settings store");
        return Ok(stored);
    }
    first_time_setup(db)
}

fn first_time_setup(db: &Database) -> Result<Credentials, SettingsError> {
    let options = [
        "Enter my Confluence email + API token",
        "Show me how to create an API token",
        "Exit setup",
    ];
    loop {
        println!("\nFirst-Time Confluence Setup");
        println!("---------------------------");
        let choice = Select::new()
            .with_prompt("Choose an option")
            .items(&options)
            .default(0)
            .interact()?;
        match choice {
            0 => return prompt_for_credentials(db),
            1 => show_token_creation_steps()?,
            _ => return Err(SettingsError::Cancelled),
        }
    }
}

fn prompt_for_credentials(db: &Database) -> Result<Credentials, SettingsError> {
    println!("\nConfluence Authentication Setup");
    println!("-------------------------------");
    let email: String = Input::new()
        .with_prompt("Enter your Atlassian email")
        .interact_text()?;
    let token = Password::new()
        .with_prompt("Enter your Confluence API token")
        .interact()?;

    let credentials = Credentials {
        email: email.trim().to_string(),
        token: token.trim().to_string(),
    };
    db.store_credentials(&credentials)?;
    println!("\nCredentials saved. You won't be asked again.\n");
    Ok(credentials)
}

pub fn show_token_creation_steps() -> Result<(), SettingsError> {
    println!("\nHow to Create a Confluence API Token");
    println!("------------------------------------");
    println!("1. Open this link in your browser:");
    println!("   {}\n", TOKEN_SETTINGS_URL);
    println!("2. Click the button:  Create API token");
    println!("3. Give it a label (example: chatbot-access)");
    println!("4. Click Create");
    println!("5. Copy the generated token");
    println!("6. Return here and choose the first option to enter your email + token\n");
    Input::<String>::new()
        .with_prompt("Press Enter to return to the menu")
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}

pub fn reset_credentials(db: &Database) -> Result<(), SettingsError> {
    db.clear_credentials()?;
    info!("stored Confluence credentials cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-a...ijkl");
        assert_eq!(mask_secret("short"), "****");
    }

    #[test]
    fn test_get_settings_masks_secrets() {
        let (_dir, db) = db();
        set_setting(&db, "openai_api_key", "sk-1234567890").unwrap();
        set_setting(&db, API_TOKEN_KEY, "ATATT3xFfGF0token").unwrap();
        set_setting(&db, "ollama_host", "http://localhost:11434").unwrap();

        let settings = get_settings(&db).unwrap();
        assert_eq!(settings["openai_api_key"], "sk-1...7890");
        assert_eq!(settings[API_TOKEN_KEY], "ATAT...oken");
        assert_eq!(settings["ollama_host"], "http://localhost:11434");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let (_dir, db) = db();
        let err = set_setting(&db, "theme", "dark").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownKey(ref k) if k == "theme"));
        assert!(delete_setting(&db, "theme").is_err());
    }

    #[test]
    fn test_resolve_credentials_prefers_flags_then_store() {
        let (_dir, db) = db();
        db.store_credentials(&Credentials {
            email: "stored@example.com".into(),
            token: "stored".into(),
        })
        .unwrap();

        let from_flags = resolve_credentials(&db, Some("flag@example.com"), Some("flag")).unwrap();
        assert_eq!(from_flags.email, "flag@example.com");

        let from_store = resolve_credentials(&db, Some("flag@example.com"), None).unwrap();
        assert_eq!(from_store.email, "stored@example.com");
    }

    #[test]
    fn test_reset_credentials() {
        let (_dir, db) = db();
        db.store_credentials(&Credentials {
            email: "me@example.com".into(),
            token: "tok".into(),
        })
        .unwrap();
        reset_credentials(&db).unwrap();
        assert_eq!(db.load_credentials().unwrap(), None);
    }
}
