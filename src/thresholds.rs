//! Per-pollutant severity breakpoints and the tie-break priority order.
//!
//! The defaults below are the campus deployment values; a deployment can
//! override them with a TOML table:
//!
//! ```toml
//! priority = ["co", "no2", "pm10", "pm25"]
//!
//! [thresholds.pm25]
//! moderate = 35.5
//! unhealthy = 55.5
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{Pollutant, SeverityLevel};

// ---

/// PM2.5 breakpoints, µg/m³.
pub const PM25_BREAKPOINTS: Breakpoints = Breakpoints::new(35.5, 55.5);
/// PM10 breakpoints, µg/m³.
pub const PM10_BREAKPOINTS: Breakpoints = Breakpoints::new(55.0, 155.0);
/// CO breakpoints, ppm.
pub const CO_BREAKPOINTS: Breakpoints = Breakpoints::new(700.0, 1000.0);
/// NO2 breakpoints, ppb.
pub const NO2_BREAKPOINTS: Breakpoints = Breakpoints::new(100.0, 200.0);

/// Default tie-break order: first entry wins among equally severe flags.
pub const DEFAULT_PRIORITY: [Pollutant; 4] =
    [Pollutant::Co, Pollutant::No2, Pollutant::Pm10, Pollutant::Pm25];

/// Two ascending breakpoints. A value strictly above `moderate` is
/// MODERATE, strictly above `unhealthy` is UNHEALTHY.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Breakpoints {
    pub moderate: f64,
    pub unhealthy: f64,
}

impl Breakpoints {
    pub const fn new(moderate: f64, unhealthy: f64) -> Self {
        Self { moderate, unhealthy }
    }

    pub fn classify(&self, value: f64) -> SeverityLevel {
        // ---
        if value > self.unhealthy {
            SeverityLevel::Unhealthy
        } else if value > self.moderate {
            SeverityLevel::Moderate
        } else {
            SeverityLevel::Good
        }
    }

    fn check(&self, pollutant: Pollutant) -> Result<(), ConfigError> {
        // ---
        let Breakpoints { moderate, unhealthy } = *self;
        if !moderate.is_finite() || !unhealthy.is_finite() || moderate < 0.0 {
            return Err(ConfigError::InvalidBreakpoint {
                pollutant: pollutant.key(),
                moderate,
                unhealthy,
            });
        }
        if moderate >= unhealthy {
            return Err(ConfigError::UnorderedBreakpoints {
                pollutant: pollutant.key(),
                moderate,
                unhealthy,
            });
        }
        Ok(())
    }
}

/// Declared pollutant order used to break severity ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityOrder([Pollutant; 4]);

impl PriorityOrder {
    /// Build from an explicit list; it must be a permutation of all pollutants.
    pub fn new(order: &[Pollutant]) -> Result<Self, ConfigError> {
        // ---
        let mut seen = Vec::with_capacity(order.len());
        for p in order {
            if seen.contains(p) {
                return Err(ConfigError::InvalidPriority(format!("{} listed twice", p.key())));
            }
            seen.push(*p);
        }
        let complete: [Pollutant; 4] = seen.as_slice().try_into().map_err(|_| {
            ConfigError::InvalidPriority(format!(
                "expected {} pollutants, got {}",
                Pollutant::ALL.len(),
                order.len()
            ))
        })?;
        Ok(Self(complete))
    }

    /// Position of `pollutant` in the order; lower means higher priority.
    pub fn rank(&self, pollutant: Pollutant) -> usize {
        // ---
        self.0
            .iter()
            .position(|p| *p == pollutant)
            .unwrap_or(self.0.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = Pollutant> + '_ {
        self.0.iter().copied()
    }
}

impl Default for PriorityOrder {
    fn default() -> Self {
        Self(DEFAULT_PRIORITY)
    }
}

/// Loaded threshold configuration: breakpoints per pollutant plus priority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdTable {
    // ---
    breakpoints: BTreeMap<Pollutant, Breakpoints>,
    priority: PriorityOrder,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        // ---
        let breakpoints = BTreeMap::from([
            (Pollutant::Pm25, PM25_BREAKPOINTS),
            (Pollutant::Pm10, PM10_BREAKPOINTS),
            (Pollutant::Co, CO_BREAKPOINTS),
            (Pollutant::No2, NO2_BREAKPOINTS),
        ]);
        Self {
            breakpoints,
            priority: PriorityOrder::default(),
        }
    }
}

/// On-disk shape. Keys stay strings so unknown pollutants can be reported
/// by name instead of as a generic parse failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableFile {
    #[serde(default)]
    priority: Option<Vec<String>>,
    #[serde(default)]
    thresholds: BTreeMap<String, Breakpoints>,
}

impl ThresholdTable {
    /// Build a table from explicit entries. Pollutants not listed keep their default.
    pub fn new(
        entries: impl IntoIterator<Item = (Pollutant, Breakpoints)>,
        priority: PriorityOrder,
    ) -> Result<Self, ConfigError> {
        // ---
        let mut table = Self {
            priority,
            ..Self::default()
        };
        for (pollutant, bp) in entries {
            bp.check(pollutant)?;
            table.breakpoints.insert(pollutant, bp);
        }
        Ok(table)
    }

    /// Parse a TOML table. Unknown pollutant keys are rejected.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        // ---
        let file: TableFile =
            toml::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;

        let priority = match file.priority {
            Some(keys) => {
                let parsed = keys
                    .iter()
                    .map(|k| parse_key(k))
                    .collect::<Result<Vec<_>, _>>()?;
                PriorityOrder::new(&parsed)?
            }
            None => PriorityOrder::default(),
        };

        let entries = file
            .thresholds
            .into_iter()
            .map(|(key, bp)| parse_key(&key).map(|p| (p, bp)))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(entries, priority)
    }

    /// Read and parse a TOML table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        // ---
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Malformed(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn breakpoints(&self, pollutant: Pollutant) -> Breakpoints {
        // ---
        // Every pollutant is seeded by Default and never removed.
        self.breakpoints
            .get(&pollutant)
            .copied()
            .unwrap_or_else(|| default_breakpoints(pollutant))
    }

    pub fn classify(&self, pollutant: Pollutant, value: f64) -> SeverityLevel {
        self.breakpoints(pollutant).classify(value)
    }

    pub fn priority(&self) -> &PriorityOrder {
        &self.priority
    }
}

fn parse_key(key: &str) -> Result<Pollutant, ConfigError> {
    // ---
    match key {
        "pm25" => Ok(Pollutant::Pm25),
        "pm10" => Ok(Pollutant::Pm10),
        "co" => Ok(Pollutant::Co),
        "no2" => Ok(Pollutant::No2),
        other => Err(ConfigError::UnknownPollutant(other.to_string())),
    }
}

fn default_breakpoints(pollutant: Pollutant) -> Breakpoints {
    // ---
    match pollutant {
        Pollutant::Pm25 => PM25_BREAKPOINTS,
        Pollutant::Pm10 => PM10_BREAKPOINTS,
        Pollutant::Co => CO_BREAKPOINTS,
        Pollutant::No2 => NO2_BREAKPOINTS,
    }
}
