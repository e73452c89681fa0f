//! INI file configuration adapter.
//!
//! Section and key names are case-insensitive.

use crate::domain::error::SigtraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SigtraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| SigtraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, SigtraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| SigtraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Set a value, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.config.set(section, key, Some(value.to_string()));
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let map = self.config.get_map_ref();
        let mut keys: Vec<String> = map
            .get(&section.to_lowercase())
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

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
symbol = XAUUSD
initial_capital = 100000.0

[strategy]
name = ma_crossover
short_period = 10
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("XAUUSD".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("ma_crossover".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn keys_lists_section_entries() {
        let adapter =
            FileConfigAdapter::from_string("[weights]\nTechnical = 1.0\nml = 2.0\n").unwrap();
        assert_eq!(adapter.keys("weights"), vec!["ml", "technical"]);
        assert!(adapter.keys("absent").is_empty());
    }

    #[test]
    fn dotted_section_names() {
        let adapter =
            FileConfigAdapter::from_string("[regime.volatile]\ntechnical = 0.5\n").unwrap();
        assert_eq!(adapter.keys("regime.volatile"), vec!["technical"]);
        assert_eq!(
            adapter.get_string("regime.volatile", "technical"),
            Some("0.5".to_string())
        );
    }

    #[test]
    fn set_overrides_value() {
        let mut adapter = FileConfigAdapter::from_string("[strategy]\nname = rsi\n").unwrap();
        adapter.set("strategy", "name", "breakout");
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("breakout".to_string())
        );
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\nsymbol = XAUUSD\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("XAUUSD".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(SigtraderError::ConfigParse { .. })));
    }
}
