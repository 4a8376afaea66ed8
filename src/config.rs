use crate::error::{Result, TunerError};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_APPLY_FACTOR: f64 = 0.002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RangeKind {
    Integer,
    Float,
}

impl FromStr for RangeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Integer" => Ok(RangeKind::Integer),
            "Float" => Ok(RangeKind::Float),
            other => Err(format!("unknown range kind '{}'", other)),
        }
    }
}

/// One tunable engine option: the running estimate and the spread used
/// to sample candidates around it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRange {
    pub kind: RangeKind,
    pub estimate: f64,
    pub spread: f64,
}

impl ParameterRange {
    pub fn new(kind: RangeKind, start: f64, spread: f64) -> Self {
        Self { kind, estimate: start, spread }
    }

    pub fn integer(start: f64, spread: f64) -> Self { Self::new(RangeKind::Integer, start, spread) }

    pub fn validate(&self, name: &str) -> Result<()> {
        let invalid = |reason: String| TunerError::InvalidRange { name: name.to_string(), reason };
        if !self.estimate.is_finite() {
            return Err(invalid(format!("start {} is not finite", self.estimate)));
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(invalid(format!("spread {} must be finite and >= 0", self.spread)));
        }
        Ok(())
    }
}

/// Compact form used in config files: `Integer(10, 5)`.
impl FromStr for ParameterRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let malformed = || format!("expected 'Kind(start, spread)', got '{}'", s);
        let (kind, rest) = s.split_once('(').ok_or_else(malformed)?;
        let inner = rest.trim_end().strip_suffix(')').ok_or_else(malformed)?;
        let (start, spread) = inner.split_once(',').ok_or_else(malformed)?;
        let kind: RangeKind = kind.parse()?;
        let start: f64 = start.trim().parse().map_err(|e| format!("bad start '{}': {}", start.trim(), e))?;
        let spread: f64 = spread.trim().parse().map_err(|e| format!("bad spread '{}': {}", spread.trim(), e))?;
        Ok(ParameterRange::new(kind, start, spread))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RangeRepr {
    Compact(String),
    Full {
        kind: RangeKind,
        start: f64,
        #[serde(alias = "std")]
        spread: f64,
    },
}

impl<'de> Deserialize<'de> for ParameterRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match RangeRepr::deserialize(deserializer)? {
            RangeRepr::Compact(s) => s.parse().map_err(de::Error::custom),
            RangeRepr::Full { kind, start, spread } => Ok(ParameterRange::new(kind, start, spread)),
        }
    }
}

/// Named parameter ranges in configuration order. The order is the column
/// order of the trajectory log, so it is kept exactly as written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    entries: Vec<(String, ParameterRange)>,
}

impl ParameterSet {
    pub fn new() -> Self { Self::default() }

    pub fn from_ranges<I, S>(ranges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ParameterRange)>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (name, range) in ranges {
            set.insert(name, range)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, name: impl Into<String>, range: ParameterRange) -> Result<()> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(TunerError::Config(format!("duplicate parameter '{}'", name)));
        }
        self.entries.push((name, range));
        Ok(())
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, name: &str) -> Option<&ParameterRange> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterRange)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ParameterRange)> {
        self.entries.iter_mut().map(|(n, r)| (n.as_str(), r))
    }

    pub fn names(&self) -> Vec<&str> { self.entries.iter().map(|(n, _)| n.as_str()).collect() }

    pub fn estimates(&self) -> Vec<f64> { self.entries.iter().map(|(_, r)| r.estimate).collect() }

    /// Overwrite every estimate, in column order. Used when resuming from a
    /// trajectory log.
    pub fn set_estimates(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.entries.len() {
            return Err(TunerError::Config(format!(
                "expected {} estimates, got {}", self.entries.len(), values.len()
            )));
        }
        for ((name, range), &v) in self.entries.iter_mut().zip(values) {
            if !v.is_finite() {
                return Err(TunerError::InvalidRange { name: name.clone(), reason: format!("estimate {} is not finite", v) });
            }
            range.estimate = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(TunerError::Config("parameter_ranges is empty".into()));
        }
        for (name, range) in &self.entries {
            range.validate(name)?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for ParameterSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = ParameterSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of parameter name to range")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<ParameterSet, A::Error> {
                let mut set = ParameterSet::new();
                while let Some((name, range)) = map.next_entry::<String, ParameterRange>()? {
                    set.insert(name, range).map_err(de::Error::custom)?;
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(SetVisitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub command: String,
    #[serde(default)]
    pub fixed_parameters: BTreeMap<String, Value>,
}

/// An engine that joins every round with its own fixed options.
#[derive(Debug, Clone, Deserialize)]
pub struct OpponentConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pairing {
    #[default]
    RoundRobin,
    Gauntlet,
}

impl Pairing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pairing::RoundRobin => "round-robin",
            Pairing::Gauntlet => "gauntlet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DrawAdjudication {
    pub move_number: u32,
    pub move_count: u32,
    pub score: i32,
}

impl Default for DrawAdjudication {
    fn default() -> Self { Self { move_number: 15, move_count: 10, score: 20 } }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResignAdjudication {
    pub move_count: u32,
    pub score: i32,
    pub two_sided: bool,
}

impl Default for ResignAdjudication {
    fn default() -> Self { Self { move_count: 10, score: 600, two_sided: true } }
}

/// Settings shared by every participant of a round, plus the runner binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatchRunnerConfig {
    pub command: String,
    pub protocol: String,
    pub time_control: String,
    pub time_margin_ms: u32,
    pub book_depth: u32,
    pub draw: DrawAdjudication,
    pub resign: ResignAdjudication,
    pub games: u32,
    pub rounds: u32,
    pub pairing: Pairing,
    pub extra_args: Vec<String>,
}

impl Default for MatchRunnerConfig {
    fn default() -> Self {
        Self {
            command: "cutechess-cli".to_string(),
            protocol: "uci".to_string(),
            time_control: "1+0.1".to_string(),
            time_margin_ms: 20,
            book_depth: 10,
            draw: DrawAdjudication::default(),
            resign: ResignAdjudication::default(),
            games: 1,
            rounds: 1,
            pairing: Pairing::default(),
            extra_args: Vec::new(),
        }
    }
}

fn default_apply_factor() -> f64 { DEFAULT_APPLY_FACTOR }

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub parameter_ranges: ParameterSet,
    pub log_csv_path: PathBuf,
    #[serde(default)]
    pub book_path: Option<PathBuf>,
    #[serde(default)]
    pub syzygy_path: Option<PathBuf>,
    pub concurrency: usize,
    pub n_generations: usize,
    #[serde(default = "default_apply_factor")]
    pub apply_factor: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub opponents: Vec<OpponentConfig>,
    #[serde(default)]
    pub match_runner: MatchRunnerConfig,
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| TunerError::io(path, e))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|source| TunerError::ConfigParse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.parameter_ranges.validate()?;
        if self.engine.command.trim().is_empty() {
            return Err(TunerError::Config("engine.command is empty".into()));
        }
        if self.concurrency == 0 {
            return Err(TunerError::Config("concurrency must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.apply_factor) {
            return Err(TunerError::Config(format!("apply_factor {} must lie in [0, 1]", self.apply_factor)));
        }
        if self.match_runner.command.trim().is_empty() {
            return Err(TunerError::Config("match_runner.command is empty".into()));
        }
        if self.match_runner.games == 0 || self.match_runner.rounds == 0 {
            return Err(TunerError::Config("match_runner.games and rounds must be at least 1".into()));
        }
        if let Some(name) = self.engine.fixed_parameters.keys().find(|k| self.parameter_ranges.get(k).is_some()) {
            return Err(TunerError::Config(format!("'{}' is both tuned and fixed in engine.fixed_parameters", name)));
        }
        let mut seen = HashSet::new();
        for opp in &self.opponents {
            if opp.name.trim().is_empty() || opp.command.trim().is_empty() {
                return Err(TunerError::Config("opponents need a name and a command".into()));
            }
            if !seen.insert(opp.name.as_str()) {
                return Err(TunerError::Config(format!("duplicate opponent name '{}'", opp.name)));
            }
        }
        Ok(())
    }
}
