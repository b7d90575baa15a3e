//! INI run configuration adapter.
//!
//! Keys are case-sensitive so `[grid]` entries match strategy constant
//! names exactly.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new_cs();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new_cs();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_bool)
            .unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const SAMPLE: &str = r#"
[portfolio]
initial_capital = 25.0
max_concurrent_positions = 4
scale_by_strength = no

[data]
source = json
path = /var/data/bars

[grid]
rsi_period = 10,14,21
oversold = 25, 30
"#;

    #[test]
    fn reads_typed_values() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_double("portfolio", "initial_capital", 0.0), 25.0);
        assert_eq!(adapter.get_int("portfolio", "max_concurrent_positions", 0), 4);
        assert!(!adapter.get_bool("portfolio", "scale_by_strength", true));
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/var/data/bars".to_string())
        );
    }

    #[test]
    fn missing_values_fall_back() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("data", "symbol"), None);
        assert_eq!(adapter.get_string("nowhere", "key"), None);
        assert_eq!(adapter.get_int("portfolio", "missing", 42), 42);
        assert_eq!(adapter.get_double("portfolio", "missing", 99.9), 99.9);
        assert!(adapter.get_bool("portfolio", "missing", true));
    }

    #[test]
    fn non_numeric_values_fall_back() {
        let adapter =
            FileConfigAdapter::from_string("[portfolio]\ninitial_capital = lots\n").unwrap();
        assert_eq!(adapter.get_double("portfolio", "initial_capital", 10.0), 10.0);
        assert_eq!(adapter.get_int("portfolio", "initial_capital", 7), 7);
    }

    #[test]
    fn bool_spellings() {
        let adapter =
            FileConfigAdapter::from_string("[s]\na = true\nb = YES\nc = 1\nd = off\ne = maybe\n")
                .unwrap();
        assert!(adapter.get_bool("s", "a", false));
        assert!(adapter.get_bool("s", "b", false));
        assert!(adapter.get_bool("s", "c", false));
        assert!(!adapter.get_bool("s", "d", true));
        assert!(adapter.get_bool("s", "e", true));
    }

    #[test]
    fn keys_are_sorted_and_case_preserved() {
        let adapter =
            FileConfigAdapter::from_string("[grid]\nfast_Len = 3\nalpha = 1\n").unwrap();
        assert_eq!(adapter.keys("grid"), vec!["alpha", "fast_Len"]);
        assert!(adapter.keys("absent").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config(SAMPLE);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("data", "source"), Some("json".to_string()));
        assert_eq!(adapter.keys("grid"), vec!["oversold", "rsi_period"]);
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        assert!(FileConfigAdapter::from_file("/nonexistent/path/config.ini").is_err());
    }
}
