use derive_more::Display;
use serde::Serialize;

/// A single scalar reading. Serializes as a bare JSON number, no envelope.
#[derive(Debug, Display, Serialize, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum Sample {
    /// Random draws and (optionally scaled) digital levels.
    #[display(fmt = "{}", _0)]
    Integer(i64),
    /// Normalized ADC readings in [0.0, 1.0].
    #[display(fmt = "{}", _0)]
    Float(f64),
}

impl Sample {
    pub fn is_finite(&self) -> bool {
        match self {
            Sample::Integer(_) => true,
            Sample::Float(value) => value.is_finite(),
        }
    }
}

impl From<i64> for Sample {
    fn from(value: i64) -> Self {
        Sample::Integer(value)
    }
}

impl From<f64> for Sample {
    fn from(value: f64) -> Self {
        Sample::Float(value)
    }
}
