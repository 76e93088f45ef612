use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};

use crate::models::sample::Sample;

use super::services::{ReadingSource, SourceError};

/// Stand-in for real hardware. Draws a uniform integer from a closed range.
pub struct RandomSource {
    rng: StdRng,
    range: Uniform<i64>,
}

impl RandomSource {
    pub fn new(min: i64, max: i64) -> Result<Self, SourceError> {
        Self::with_rng(min, max, StdRng::from_entropy())
    }

    /// Deterministic source for reproducible runs.
    pub fn seeded(min: i64, max: i64, seed: u64) -> Result<Self, SourceError> {
        Self::with_rng(min, max, StdRng::seed_from_u64(seed))
    }

    fn with_rng(min: i64, max: i64, rng: StdRng) -> Result<Self, SourceError> {
        if min > max {
            return Err(SourceError::InvalidRange { min, max });
        }
        Ok(Self {
            rng,
            range: Uniform::new_inclusive(min, max),
        })
    }
}

impl ReadingSource for RandomSource {
    fn produce_one_reading(&mut self) -> Result<Sample, SourceError> {
        Ok(Sample::Integer(self.rng.sample(self.range)))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_range() {
        assert!(matches!(
            RandomSource::new(10, 1),
            Err(SourceError::InvalidRange { min: 10, max: 1 })
        ));
    }

    #[test]
    fn test_draws_stay_in_closed_range() {
        let mut source = RandomSource::seeded(1, 10, 42).unwrap();
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..1000 {
            let Sample::Integer(value) = source.produce_one_reading().unwrap() else {
                panic!("Random source produced a non-integer sample.");
            };
            assert!((1..=10).contains(&value));
            seen_min |= value == 1;
            seen_max |= value == 10;
        }
        assert!(seen_min && seen_max, "Both range ends should be reachable.");
    }

    #[test]
    fn test_single_value_range() {
        let mut source = RandomSource::seeded(5, 5, 0).unwrap();
        assert_eq!(source.produce_one_reading().unwrap(), Sample::Integer(5));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomSource::seeded(0, 10, 7).unwrap();
        let mut b = RandomSource::seeded(0, 10, 7).unwrap();
        for _ in 0..20 {
            assert_eq!(
                a.produce_one_reading().unwrap(),
                b.produce_one_reading().unwrap()
            );
        }
    }
}
