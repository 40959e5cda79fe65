//! Bounded parameter spaces and named parameter vectors.
//!
//! A [`ParameterSpace`] is an ordered list of named, inclusive `[low, high]`
//! dimensions. Search code works on raw `&[f64]` points in dimension order;
//! [`ParameterVector`] is the named view handed to strategies and reports.

use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::error::TrendsimError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamBound {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

impl ParamBound {
    pub fn new(name: &str, low: f64, high: f64) -> Self {
        ParamBound {
            name: name.to_string(),
            low,
            high,
        }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpace {
    pub(crate) dims: Vec<ParamBound>,
}

impl ParameterSpace {
    pub fn new(dims: Vec<ParamBound>) -> Result<Self, TrendsimError> {
        if dims.is_empty() {
            return Err(TrendsimError::invalid_parameter(
                "parameter_space",
                "at least one dimension is required",
            ));
        }
        for d in &dims {
            if !d.low.is_finite() || !d.high.is_finite() || d.low > d.high {
                return Err(TrendsimError::invalid_parameter(
                    &d.name,
                    format!("invalid bounds [{}, {}]", d.low, d.high),
                ));
            }
        }
        Ok(ParameterSpace { dims })
    }

    pub fn dims(&self) -> &[ParamBound] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Replace the bounds of an existing dimension.
    pub fn with_bound(mut self, name: &str, low: f64, high: f64) -> Result<Self, TrendsimError> {
        let dim = self
            .dims
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| TrendsimError::invalid_parameter(name, "unknown parameter"))?;
        dim.low = low;
        dim.high = high;
        ParameterSpace::new(self.dims)
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dims.len()
            && self
                .dims
                .iter()
                .zip(point)
                .all(|(d, &x)| x >= d.low && x <= d.high)
    }

    pub fn clamp(&self, point: &mut [f64]) {
        for (d, x) in self.dims.iter().zip(point.iter_mut()) {
            *x = x.clamp(d.low, d.high);
        }
    }

    /// Uniform sample within the bounds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        self.dims
            .iter()
            .map(|d| {
                if d.width() > 0.0 {
                    rng.gen_range(d.low..=d.high)
                } else {
                    d.low
                }
            })
            .collect()
    }

    /// Map a point into the unit cube.
    pub fn to_unit(&self, point: &[f64]) -> Vec<f64> {
        self.dims
            .iter()
            .zip(point)
            .map(|(d, &x)| {
                if d.width() > 0.0 {
                    (x - d.low) / d.width()
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn from_unit(&self, unit: &[f64]) -> Vec<f64> {
        self.dims
            .iter()
            .zip(unit)
            .map(|(d, &u)| d.low + u.clamp(0.0, 1.0) * d.width())
            .collect()
    }

    /// Round each coordinate to an integer inside the bounds. A dimension
    /// whose bounds contain no integer keeps the clamped raw value.
    pub fn snap(&self, point: &[f64]) -> Vec<f64> {
        self.dims
            .iter()
            .zip(point)
            .map(|(d, &x)| {
                let (lo, hi) = (d.low.ceil(), d.high.floor());
                if lo <= hi {
                    x.round().clamp(lo, hi)
                } else {
                    x.clamp(d.low, d.high)
                }
            })
            .collect()
    }

    pub fn named(&self, point: &[f64]) -> ParameterVector {
        ParameterVector {
            values: self
                .dims
                .iter()
                .zip(point)
                .map(|(d, &x)| (d.name.clone(), x))
                .collect(),
        }
    }
}

/// Named parameter values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ParameterVector {
    values: BTreeMap<String, f64>,
}

impl ParameterVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value rounded to the nearest whole period.
    pub fn period(&self, name: &str) -> Option<Result<usize, TrendsimError>> {
        self.get(name).map(|v| {
            let rounded = v.round();
            if !rounded.is_finite() || rounded < 1.0 {
                Err(TrendsimError::invalid_parameter(
                    name,
                    format!("{v} does not round to a positive period"),
                ))
            } else {
                Ok(rounded as usize)
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy with every value rounded to an integer, for reporting.
    pub fn rounded(&self) -> ParameterVector {
        ParameterVector {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.round()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn macd_space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParamBound::new("fast", 8.0, 15.0),
            ParamBound::new("slow", 20.0, 30.0),
            ParamBound::new("signal", 5.0, 10.0),
        ])
        .unwrap()
    }

    #[test]
    fn samples_stay_in_bounds() {
        let space = macd_space();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let p = space.sample(&mut rng);
            assert!(space.contains(&p), "{:?} out of bounds", p);
        }
    }

    #[test]
    fn unit_round_trip() {
        let space = macd_space();
        let p = vec![10.0, 25.0, 7.5];
        let u = space.to_unit(&p);
        assert!((u[1] - 0.5).abs() < 1e-12);
        let back = space.from_unit(&u);
        for (a, b) in p.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn clamp_pulls_into_box() {
        let space = macd_space();
        let mut p = vec![2.0, 40.0, 6.0];
        space.clamp(&mut p);
        assert_eq!(p, vec![8.0, 30.0, 6.0]);
    }

    #[test]
    fn snap_rounds_within_bounds() {
        let space = ParameterSpace::new(vec![
            ParamBound::new("fast", 8.0, 15.0),
            ParamBound::new("odd", 2.4, 2.6),
            ParamBound::new("frac", 3.2, 7.7),
        ])
        .unwrap();
        assert_eq!(space.snap(&[14.6, 2.5, 7.6]), vec![15.0, 2.5, 7.0]);
        assert_eq!(space.snap(&[8.2, 2.45, 3.3]), vec![8.0, 2.45, 4.0]);
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = ParameterSpace::new(vec![ParamBound::new("fast", 15.0, 8.0)]).unwrap_err();
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn with_bound_overrides_dimension() {
        let space = macd_space().with_bound("fast", 5.0, 9.0).unwrap();
        assert_eq!(space.dims()[0].low, 5.0);
        assert!(macd_space().with_bound("nope", 1.0, 2.0).is_err());
    }

    #[test]
    fn named_vector_periods_round() {
        let v = macd_space().named(&[11.6, 20.2, 5.5]);
        assert_eq!(v.period("fast").unwrap().unwrap(), 12);
        assert_eq!(v.period("slow").unwrap().unwrap(), 20);
        assert_eq!(v.period("signal").unwrap().unwrap(), 6);
        assert!(v.period("missing").is_none());
    }

    #[test]
    fn non_positive_period_is_rejected() {
        let v = ParameterVector::new().with("period", 0.2);
        assert!(v.period("period").unwrap().is_err());
    }
}
