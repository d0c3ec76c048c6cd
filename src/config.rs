use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Credentials and run parameters, read once from `config.yml`.
/// All keys are required; the file never changes during a run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub username: String,
    pub password: String,
    /// Last four digits of the account holder's ID card, asked for by the
    /// login page after the password step.
    pub id_card: String,
    /// Poll interval in seconds between automatic page refreshes.
    pub heart: u64,
    /// "y" confirms the student-fare dialog when it pops up.
    #[serde(rename = "isStu")]
    pub is_stu: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("配置文件格式错误 {}", path.display()))?;
        Ok(config)
    }

    pub fn is_student(&self) -> bool {
        self.is_stu == "y"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SAMPLE: &str = "\
username: \"13800138000\"
password: hunter2
id_card: \"0042\"
heart: 5
isStu: n
";

    #[test]
    fn parses_all_keys() {
        let config: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.username, "13800138000");
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.id_card, "0042");
        assert_eq!(config.heart, 5);
        assert!(!config.is_student());
    }

    #[test]
    fn student_flag_is_literal_y() {
        let config: Config = serde_yaml::from_str(&SAMPLE.replace("isStu: n", "isStu: y")).unwrap();
        assert!(config.is_student());
    }

    #[test]
    fn missing_key_is_an_error() {
        let truncated = "username: a\npassword: b\n";
        assert!(serde_yaml::from_str::<Config>(truncated).is_err());
    }
}
