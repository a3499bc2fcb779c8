use std::{collections::HashMap, fs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub database_url: String,
    pub platform: String,
    pub device: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001".into(),
            database_url: "sqlite://./data/funnel.db".into(),
            platform: "web".into(),
            device: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("funnel.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_overrides(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Ok(v) = std::env::var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Ok(v) = std::env::var("FUNNEL_PLATFORM") {
        settings.platform = v;
    }
    if let Ok(v) = std::env::var("FUNNEL_DEVICE") {
        settings.device = v;
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    if let Some(v) = file_cfg.get("platform") {
        settings.platform = v.clone();
    }
    if let Some(v) = file_cfg.get("device") {
        settings.device = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_poc_fallbacks() {
        let settings = Settings::default();
        assert_eq!(settings.api_base_url, "http://localhost:3001");
        assert_eq!(settings.platform, "web");
        assert!(!settings.device.is_empty());
    }

    #[test]
    fn file_overrides_replace_defaults() {
        let mut settings = Settings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("api_base_url".to_string(), "http://backend:9000".to_string());
        file_cfg.insert("device".to_string(), "kiosk-7".to_string());

        apply_file_overrides(&mut settings, &file_cfg);
        assert_eq!(settings.api_base_url, "http://backend:9000");
        assert_eq!(settings.device, "kiosk-7");
        assert_eq!(settings.platform, "web");
    }
}
