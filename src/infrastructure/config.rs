use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub octoprint: OctoPrintSettings,
    #[serde(default)]
    pub plugin: PluginSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OctoPrintSettings {
    #[serde(default = "default_octoprint_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for OctoPrintSettings {
    fn default() -> Self {
        Self {
            url: default_octoprint_url(),
            api_key: String::new(),
        }
    }
}

/// Plugin settings as the front end sees them.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PluginSettings {
    /// History retention, in minutes.
    #[serde(default = "default_temperature_cutoff")]
    pub temperature_cutoff: u32,
    /// Hotend display threshold.
    #[serde(default = "default_h_tm")]
    pub h_tm: u32,
    /// Bed display threshold.
    #[serde(default = "default_b_tm")]
    pub b_tm: u32,
    /// Fan channels known before any `M106 P<n>` is seen.
    #[serde(default = "default_fan_count")]
    pub fan_count: usize,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            temperature_cutoff: default_temperature_cutoff(),
            h_tm: default_h_tm(),
            b_tm: default_b_tm(),
            fan_count: default_fan_count(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_octoprint_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_temperature_cutoff() -> u32 {
    30
}

fn default_h_tm() -> u32 {
    284
}

fn default_b_tm() -> u32 {
    110
}

fn default_fan_count() -> usize {
    1
}

/// Load `config/pidtune.*` (optional) overlaid with `PIDTUNE__SECTION__KEY` variables.
pub fn load_settings() -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/pidtune").required(false))
        .add_source(
            config::Environment::with_prefix("PIDTUNE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_defaults() {
        let settings = PluginSettings::default();
        assert_eq!(settings.temperature_cutoff, 30);
        assert_eq!(settings.h_tm, 284);
        assert_eq!(settings.b_tm, 110);
        assert_eq!(settings.fan_count, 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                "[plugin]\ntemperature_cutoff = 5\n\n[octoprint]\napi_key = \"abc\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.plugin.temperature_cutoff, 5);
        assert_eq!(settings.plugin.fan_count, 1);
        assert_eq!(settings.octoprint.api_key, "abc");
        assert_eq!(settings.octoprint.url, "http://127.0.0.1:5000");
        assert_eq!(settings.server.bind, "0.0.0.0:8080");
    }
}
