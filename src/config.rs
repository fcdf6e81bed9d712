use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_INSTANCE_URL: &str = "http://localhost:8080";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub instance_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    server: Option<ServerSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    instance_url: Option<String>,
}

impl Config {
    // Resolution order: INSTANCE_URL env var (dotenv is loaded by main),
    // then ~/.config/taskdeck/config.toml, then the default.
    pub fn load() -> Config {
        if let Ok(url) = env::var("INSTANCE_URL") {
            if !url.trim().is_empty() {
                return Config { instance_url: url };
            }
        }

        if let Some(url) = config_file_path().and_then(read_instance_url) {
            return Config { instance_url: url };
        }

        Config {
            instance_url: DEFAULT_INSTANCE_URL.to_string(),
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("taskdeck").join("config.toml"))
}

fn read_instance_url(path: PathBuf) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let parsed: ConfigFile = toml::from_str(&raw).ok()?;
    parsed.server?.instance_url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_section_parses() {
        let parsed: ConfigFile = toml::from_str(
            r#"
            [server]
            instance_url = "https://todo.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(
            parsed.server.and_then(|s| s.instance_url).as_deref(),
            Some("https://todo.example.com")
        );
    }

    #[test]
    fn missing_section_is_tolerated() {
        let parsed: ConfigFile = toml::from_str("").unwrap();
        assert!(parsed.server.is_none());
    }
}
