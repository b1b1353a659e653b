//! Configuración del CLI desde variables de entorno.
//! `STEPFLOW_EXPORT_MODE` (basic|full) y `STEPFLOW_PRETTY` (true|false).

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use stepflow_core::ExportMode;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CliConfig {
    pub export_mode: ExportMode,
    pub pretty: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self { export_mode: ExportMode::Full,
               pretty: true }
    }
}

impl CliConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let defaults = Self::default();
        let export_mode = env::var("STEPFLOW_EXPORT_MODE").ok()
                                                         .and_then(|v| v.parse().ok())
                                                         .unwrap_or(defaults.export_mode);
        let pretty = env::var("STEPFLOW_PRETTY").ok().and_then(|v| parse_bool(&v)).unwrap_or(defaults.pretty);
        Self { export_mode, pretty }
    }

    /// Serializa respetando `pretty`.
    pub fn render(&self, value: &serde_json::Value) -> String {
        let rendered = if self.pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
        rendered.unwrap_or_else(|_| value.to_string())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
