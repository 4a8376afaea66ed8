use crate::config::{ParameterRange, ParameterSet, RangeKind};
use crate::error::{Result, TunerError};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

pub const NAME_PREFIX: &str = "Candidate-";
const NAME_HEX_LEN: usize = 8;

/// A concrete option value handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionValue {
    Integer(i64),
    Float(f64),
}

impl OptionValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            OptionValue::Integer(v) => v as f64,
            OptionValue::Float(v) => v,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Integer(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One sampled engine instance for a single generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Contestant {
    pub name: String,
    pub values: BTreeMap<String, OptionValue>,
}

impl Contestant {
    pub fn new(values: BTreeMap<String, OptionValue>) -> Self {
        let name = contestant_name(&values);
        Self { name, values }
    }

    pub fn value(&self, param: &str) -> Option<f64> { self.values.get(param).map(OptionValue::as_f64) }

    /// `option.<name>=<value>` pairs, sorted by option name.
    pub fn option_assignments(&self) -> Vec<String> {
        self.values.iter().map(|(k, v)| format!("option.{}={}", k, v)).collect()
    }
}

/// Content-derived name: identical value maps always hash to the same name,
/// so game results can be attributed by the name the match runner reports.
pub fn contestant_name(values: &BTreeMap<String, OptionValue>) -> String {
    let canonical = values
        .iter()
        .map(|(k, v)| format!("option.{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{}{}", NAME_PREFIX, &hex::encode(digest)[..NAME_HEX_LEN])
}

/// Draw one value from `Normal(estimate, spread)`, rounded for integer ranges.
pub fn sample_value<R: Rng + ?Sized>(range: &ParameterRange, rng: &mut R) -> Result<OptionValue> {
    let normal = Normal::new(range.estimate, range.spread)
        .map_err(|e| TunerError::Distribution(format!("N({}, {}): {}", range.estimate, range.spread, e)))?;
    let x = normal.sample(rng);
    Ok(match range.kind {
        RangeKind::Integer => OptionValue::Integer(x.round() as i64),
        RangeKind::Float => OptionValue::Float(x),
    })
}

/// Samples contestants around the current estimates. The random source is
/// owned here rather than pulled from thread-local state so a seeded
/// sampler replays the same campaign.
pub struct ParameterSampler<R> {
    rng: R,
}

impl ParameterSampler<SmallRng> {
    pub fn seeded(seed: u64) -> Self { Self::new(SmallRng::seed_from_u64(seed)) }

    pub fn from_entropy() -> Self { Self::new(SmallRng::from_entropy()) }
}

impl<R: Rng> ParameterSampler<R> {
    pub fn new(rng: R) -> Self { Self { rng } }

    pub fn sample(&mut self, params: &ParameterSet, count: usize) -> Result<Vec<Contestant>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let mut values = BTreeMap::new();
            for (name, range) in params.iter() {
                values.insert(name.to_string(), sample_value(range, &mut self.rng)?);
            }
            out.push(Contestant::new(values));
        }
        Ok(out)
    }
}
