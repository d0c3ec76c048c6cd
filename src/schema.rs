use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pinyin::ToPinyin;

/// Field offsets inside one pipe-delimited row of the left-ticket query
/// response. The API gives no names, only positions.
pub mod offsets {
    pub const TRAIN_NO: usize = 3;
    pub const START_TIME: usize = 8;
    pub const ARRIVE_TIME: usize = 9;
    pub const DURATION: usize = 10;
    pub const SOFT_SLEEPER: usize = 23;
    pub const NO_SEAT: usize = 26;
    pub const HARD_SLEEPER: usize = 28;
    pub const HARD_SEAT: usize = 29;
    pub const SECOND_CLASS: usize = 30;
    pub const FIRST_CLASS: usize = 31;
    pub const BUSINESS: usize = 32;

    /// A row must reach past the last offset we read.
    pub const MIN_FIELDS: usize = BUSINESS + 1;
}

/// Marker the API uses for a seat class that has not gone on sale yet.
pub static PRESALE_MARKER: &str = "*";

/// City names whose per-character pinyin default is wrong. The booking
/// page autocomplete only accepts the actual reading.
static PINYIN_OVERRIDES: [(&str, &str); 5] = [
    ("重庆", "chongqing"),
    ("长沙", "changsha"),
    ("长春", "changchun"),
    ("厦门", "xiamen"),
    ("单县", "shanxian"),
];

/// Convert a Chinese city name to the concatenated plain-pinyin string the
/// 12306 station autocomplete understands. Non-Han characters pass through.
pub fn romanize(city: &str) -> String {
    for (name, reading) in PINYIN_OVERRIDES.iter() {
        if city == *name {
            return reading.to_string();
        }
    }

    let mut out = String::new();
    for ch in city.chars() {
        match ch.to_pinyin() {
            Some(p) => out.push_str(p.plain()),
            None => out.push(ch),
        }
    }
    out
}

/// City display name -> station telecode, loaded once from a JSON file.
#[derive(Debug, Clone)]
pub struct StationMap(HashMap<String, String>);

impl StationMap {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("无法读取城市文件 {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("城市文件格式错误 {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let map: HashMap<String, String> = serde_json::from_str(raw)?;
        Ok(StationMap(map))
    }

    pub fn code(&self, city: &str) -> Option<&str> {
        self.0.get(city).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// City names in a stable order, for `--list-cities`.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.0.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
