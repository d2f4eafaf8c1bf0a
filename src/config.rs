//! Configuration management for bugdrill
//!
//! Stores settings in ~/.config/bugdrill/config.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// GitHub token used for repository reads and stressed-file writes.
    pub github_token: Option<String>,
    /// OpenRouter key for the primary generation path. Absent means every
    /// round takes the deterministic fallback.
    pub openrouter_api_key: Option<String>,
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("bugdrill"))
    }

    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        eprintln!(
                            "  Warning: Config file was corrupted ({}). A backup was saved and defaults were loaded.",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let dir = Self::config_dir()
            .ok_or_else(|| "Could not determine config directory".to_string())?;

        fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)) {
                eprintln!("  Warning: Failed to set config directory permissions: {}", e);
            }
        }

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        #[cfg(unix)]
        {
            write_config_atomic(&path, &content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
        }

        Ok(())
    }

    /// Get the GitHub token (environment variable takes precedence)
    pub fn github_token(&self) -> Option<String> {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.trim().is_empty() {
                return Some(token);
            }
        }
        self.github_token.clone()
    }

    /// Get the OpenRouter API key (environment variable takes precedence)
    pub fn openrouter_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        self.openrouter_api_key.clone()
    }

    /// Validate API key format (OpenRouter keys start with sk-)
    pub fn validate_api_key_format(key: &str) -> bool {
        key.starts_with("sk-")
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/bugdrill/config.json".to_string())
    }
}

/// Interactive prompt to store the two credentials
pub fn setup_interactive() -> Result<(), String> {
    use std::io;

    println!();
    println!("  bugdrill needs two credentials:");
    println!();
    println!("  1. A GitHub token with repo scope (for reading and writing files)");
    println!("  2. An OpenRouter API key from https://openrouter.ai/keys");
    println!("     (optional - without it every round uses the built-in mutation rules)");
    println!();

    let mut config = Config::load();

    print!("  GitHub token: ");
    io::stdout().flush().map_err(|e| e.to_string())?;
    let mut token = String::new();
    io::stdin().read_line(&mut token).map_err(|e| e.to_string())?;
    let token = token.trim();
    if !token.is_empty() {
        config.github_token = Some(token.to_string());
    }

    print!("  OpenRouter API key (enter to skip): ");
    io::stdout().flush().map_err(|e| e.to_string())?;
    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim();
    if !key.is_empty() {
        if !Config::validate_api_key_format(key) {
            println!("  Warning: Key doesn't look like an OpenRouter key (should start with sk-)");
            println!("     Saving anyway...");
        }
        config.openrouter_api_key = Some(key.to_string());
    }

    config.save()?;
    println!();
    println!("  + Saved to {}", Config::config_location());
    println!();
    Ok(())
}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(unix)]
fn write_config_atomic(path: &std::path::Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;
    use std::os::unix::fs::PermissionsExt;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
        eprintln!("  Warning: Failed to set temp config file permissions: {}", e);
    }

    file.write_all(content.as_bytes())
        .map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}
