use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

// Default configuration
pub const DEFAULT_SOCKET_URL: &str = "wss://chat.courier.example/ws";
pub const DEFAULT_API_BASE: &str = "https://chat.courier.example/api";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    pub socket_url: String,
    pub api_base: String,
    pub local_user_id: i64,
    #[serde(default)]
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            local_user_id: 0,
            theme: String::new(),
        }
    }
}

pub fn settings_path() -> Option<PathBuf> {
    if let Some(proj) = ProjectDirs::from("com", "courier", "courier-client") {
        let dir = proj.config_dir();
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Failed to create config dir: {}", e);
            return None;
        }
        return Some(dir.join("settings.json"));
    }
    None
}

pub fn load_settings() -> Option<Settings> {
    let path = settings_path()?;
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn save_settings(settings: &Settings) -> std::io::Result<()> {
    if let Some(path) = settings_path() {
        let mut file = fs::File::create(path)?;
        let data = serde_json::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        file.write_all(data.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip_through_json() {
        let settings = Settings {
            socket_url: "wss://localhost:9443/ws".into(),
            api_base: "https://localhost:9443/api".into(),
            local_user_id: 7,
            theme: "dark".into(),
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.socket_url, settings.socket_url);
        assert_eq!(back.local_user_id, 7);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let back: Settings = serde_json::from_str(
            r#"{"socket_url": "wss://x/ws", "api_base": "https://x/api", "local_user_id": 1}"#,
        )
        .unwrap();
        assert_eq!(back.theme, "");
    }
}
