//! Monster database
//!
//! Each record describes one monster class: the body color the classifier
//! looks for plus the facts used to rank and score targets. A record's
//! position in the database is its [`ClassId`].

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::error::ConfigError;
use crate::targeting::ClassTraits;
use crate::vision::{ClassId, ColorProfile, Palette};

/// Body color of a monster class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "default_tolerance")]
    pub tolerance: u8,
    /// Display label, e.g. "Green"
    #[serde(default)]
    pub label: String,
}

fn default_tolerance() -> u8 {
    45
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub name: String,
    pub color: MonsterColor,
    /// 1 is the most wanted, 10 the least
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub aggressive: bool,
    /// Distance from the top of the sprite to its health bar
    #[serde(default = "default_hp_bar_offset")]
    pub hp_bar_offset: i32,
    #[serde(default = "default_health")]
    pub estimated_health: u32,
    #[serde(default)]
    pub experience_reward: u32,
    /// Never scanned for
    #[serde(default)]
    pub ignore: bool,
}

fn default_priority() -> u8 {
    5
}

fn default_hp_bar_offset() -> i32 {
    50
}

fn default_health() -> u32 {
    1000
}

impl MonsterRecord {
    fn builtin(
        name: &str,
        rgb: (u8, u8, u8),
        label: &str,
        priority: u8,
        aggressive: bool,
        estimated_health: u32,
        experience_reward: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            color: MonsterColor {
                r: rgb.0,
                g: rgb.1,
                b: rgb.2,
                tolerance: default_tolerance(),
                label: label.to_string(),
            },
            priority,
            aggressive,
            hp_bar_offset: default_hp_bar_offset(),
            estimated_health,
            experience_reward,
            ignore: false,
        }
    }

    /// Parse one line of the legacy comma-separated format:
    /// `name,r,g,b,tolerance,priority,aggressive,hpOffset,exp,ignore`
    pub fn from_legacy_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 10 {
            return Err(format!("expected 10 fields, found {}", fields.len()));
        }

        fn num<T: std::str::FromStr>(field: &str, what: &str) -> Result<T, String> {
            field
                .parse()
                .map_err(|_| format!("invalid {}: {:?}", what, field))
        }

        let name = fields[0];
        if name.is_empty() {
            return Err("empty name".to_string());
        }

        Ok(Self {
            name: name.to_string(),
            color: MonsterColor {
                r: num(fields[1], "red")?,
                g: num(fields[2], "green")?,
                b: num(fields[3], "blue")?,
                tolerance: num(fields[4], "tolerance")?,
                label: name.to_string(),
            },
            priority: num(fields[5], "priority")?,
            aggressive: fields[6] == "1",
            hp_bar_offset: num(fields[7], "hp offset")?,
            estimated_health: default_health(),
            experience_reward: num(fields[8], "exp")?,
            ignore: fields[9] == "1",
        })
    }

    pub fn to_legacy_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{}",
            self.name,
            self.color.r,
            self.color.g,
            self.color.b,
            self.color.tolerance,
            self.priority,
            self.aggressive as u8,
            self.hp_bar_offset,
            self.experience_reward,
            self.ignore as u8
        )
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false)
}

#[derive(Serialize)]
struct DatabaseFile<'a> {
    monsters: &'a [MonsterRecord],
}

/// Ordered list of monster classes
#[derive(Debug, Clone, PartialEq)]
pub struct MonsterDatabase {
    records: Vec<MonsterRecord>,
}

impl Default for MonsterDatabase {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MonsterDatabase {
    pub fn new(records: Vec<MonsterRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// The stock roster of four classes
    pub fn builtin() -> Self {
        Self::new(vec![
            MonsterRecord::builtin("Bellato_Accretian", (50, 100, 200), "Blue", 5, true, 1000, 500),
            MonsterRecord::builtin("Accretian_Warrior", (200, 80, 80), "Red", 4, true, 1500, 750),
            MonsterRecord::builtin("Cora_Summoner", (150, 80, 180), "Purple", 3, false, 800, 400),
            MonsterRecord::builtin("Neutral_Monster", (100, 150, 100), "Green", 7, false, 600, 300),
        ])
    }

    /// Load from disk. `.toml` files hold `[[monsters]]` tables; anything
    /// else is read as the legacy line format.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let db = if is_toml(path) {
            Self::from_toml_str(&content)?
        } else {
            Self::from_legacy_str(&content)
        };
        log::info!("Loaded {} monsters from {}", db.len(), path.display());
        Ok(db)
    }

    /// Parse `[[monsters]]` tables. Records that fail to deserialize are
    /// skipped with a warning.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = content.parse()?;
        let Some(entries) = table.get("monsters").and_then(|v| v.as_array()) else {
            return Ok(Self::empty());
        };

        let mut db = Self::empty();
        for (i, entry) in entries.iter().enumerate() {
            match entry.clone().try_into::<MonsterRecord>() {
                Ok(record) => db.upsert(record),
                Err(e) => {
                    let err = ConfigError::InvalidRecord {
                        location: format!("monsters[{}]", i),
                        reason: e.to_string(),
                    };
                    log::warn!("Skipping monster: {}", err);
                }
            }
        }
        Ok(db)
    }

    /// Parse the legacy format. `#` starts a comment line; bad lines are
    /// skipped with a warning.
    pub fn from_legacy_str(content: &str) -> Self {
        let mut db = Self::empty();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match MonsterRecord::from_legacy_line(line) {
                Ok(record) => db.upsert(record),
                Err(reason) => {
                    let err = ConfigError::InvalidRecord {
                        location: format!("line {}", n + 1),
                        reason,
                    };
                    log::warn!("Skipping monster: {}", err);
                }
            }
        }
        db
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&DatabaseFile {
            monsters: &self.records,
        })?)
    }

    pub fn to_legacy_string(&self) -> String {
        let mut out = String::from(
            "# Monster Database Format\n# name,r,g,b,tolerance,priority,aggressive,hpOffset,exp,ignore\n",
        );
        for record in &self.records {
            let _ = writeln!(out, "{}", record.to_legacy_line());
        }
        out
    }

    /// Save in the format implied by the file extension
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = if is_toml(path) {
            self.to_toml_string()?
        } else {
            self.to_legacy_string()
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Insert a record, replacing one with the same name in place
    pub fn upsert(&mut self, record: MonsterRecord) {
        match self.records.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[MonsterRecord] {
        &self.records
    }

    pub fn record(&self, class: ClassId) -> Option<&MonsterRecord> {
        self.records.get(class.0 as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<(ClassId, &MonsterRecord)> {
        self.records
            .iter()
            .enumerate()
            .find(|(_, r)| r.name == name)
            .map(|(i, r)| (ClassId(i as u16), r))
    }

    pub fn name(&self, class: ClassId) -> &str {
        self.record(class).map(|r| r.name.as_str()).unwrap_or("unknown")
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Classifier palette for every class not marked `ignore`, in database order
    pub fn palette(&self) -> Palette {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.ignore)
            .map(|(i, r)| {
                ColorProfile::new(r.color.r, r.color.g, r.color.b, r.color.tolerance, ClassId(i as u16))
            })
            .collect()
    }

    pub fn experience(&self, class: ClassId) -> u32 {
        self.record(class).map(|r| r.experience_reward).unwrap_or(0)
    }
}

impl ClassTraits for MonsterDatabase {
    fn priority(&self, class: ClassId) -> u8 {
        self.record(class).map(|r| r.priority).unwrap_or(u8::MAX)
    }

    fn estimated_health(&self, class: ClassId) -> u32 {
        self.record(class).map(|r| r.estimated_health).unwrap_or(0)
    }

    fn is_aggressive(&self, class: ClassId) -> bool {
        self.record(class).map(|r| r.aggressive).unwrap_or(false)
    }
}
