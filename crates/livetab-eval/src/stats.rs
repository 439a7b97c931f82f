//! Streaming statistic engines over one or two variables.
//!
//! Moments are accumulated with Welford's update so that the engines can
//! be fed cell by cell. Statistics that need the whole sample (median,
//! mode, skew) only work on an engine built with a retained dataset.

use livetab_common::{ErrorKind, EvalError};
use livetab_parse::{BivariateStatistic, Statistic};

#[derive(Debug, Clone, Default)]
pub struct UnivariateStats {
    n: usize,
    sum: f64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    values: Option<Vec<f64>>,
}

fn too_few(stat: &str, needed: usize) -> EvalError {
    EvalError::div_by_zero().with_message(format!("{stat} needs at least {needed} value(s)"))
}

fn empty_extremum() -> EvalError {
    EvalError::new(ErrorKind::NaN).with_message("no values")
}

impl UnivariateStats {
    /// An empty engine; `retain` keeps every value for dataset statistics.
    pub fn new(retain: bool) -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            values: retain.then(Vec::new),
            ..Self::default()
        }
    }

    pub fn from_values<I: IntoIterator<Item = f64>>(values: I, retain: bool) -> Self {
        let mut s = Self::new(retain);
        for v in values {
            s.push(v);
        }
        s
    }

    pub fn push(&mut self, x: f64) {
        self.n += 1;
        self.sum += x;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
        self.min = self.min.min(x);
        self.max = self.max.max(x);
        if let Some(v) = self.values.as_mut() {
            v.push(x);
        }
    }

    pub fn count(&self) -> usize {
        self.n
    }

    pub fn has_dataset(&self) -> bool {
        self.values.is_some()
    }

    pub fn mean(&self) -> Result<f64, EvalError> {
        if self.n == 0 {
            return Err(too_few("mean", 1));
        }
        Ok(self.mean)
    }

    /// Sample variance (n - 1 denominator).
    pub fn variance(&self) -> Result<f64, EvalError> {
        if self.n < 2 {
            return Err(too_few("variance", 2));
        }
        Ok(self.m2 / (self.n - 1) as f64)
    }

    pub fn variance_p(&self) -> Result<f64, EvalError> {
        if self.n == 0 {
            return Err(too_few("population variance", 1));
        }
        Ok(self.m2 / self.n as f64)
    }

    pub fn std_dev(&self) -> Result<f64, EvalError> {
        self.variance().map(f64::sqrt)
    }

    pub fn min(&self) -> Result<f64, EvalError> {
        if self.n == 0 {
            return Err(empty_extremum());
        }
        Ok(self.min)
    }

    pub fn max(&self) -> Result<f64, EvalError> {
        if self.n == 0 {
            return Err(empty_extremum());
        }
        Ok(self.max)
    }

    fn dataset(&self, stat: Statistic) -> Result<&[f64], EvalError> {
        self.values.as_deref().ok_or_else(|| {
            EvalError::new(ErrorKind::UnimplementedStatistic)
                .with_message(format!("{stat:?} needs the retained dataset"))
        })
    }

    pub fn median(&self) -> Result<f64, EvalError> {
        let data = self.dataset(Statistic::Median)?;
        if data.is_empty() {
            return Err(empty_extremum());
        }
        let mut sorted = data.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        Ok(if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        })
    }

    /// Most frequent value; ties go to the value seen first.
    pub fn mode(&self) -> Result<f64, EvalError> {
        let data = self.dataset(Statistic::Mode)?;
        let mut best: Option<(f64, usize)> = None;
        for (i, &x) in data.iter().enumerate() {
            if data[..i].contains(&x) {
                continue;
            }
            let c = data[i..].iter().filter(|&&y| y == x).count();
            if best.is_none_or(|(_, bc)| c > bc) {
                best = Some((x, c));
            }
        }
        best.map(|(x, _)| x).ok_or_else(empty_extremum)
    }

    /// Adjusted sample skewness.
    pub fn skew(&self) -> Result<f64, EvalError> {
        let data = self.dataset(Statistic::Skew)?;
        let n = data.len();
        if n < 3 {
            return Err(too_few("skew", 3));
        }
        let sd = self.std_dev()?;
        if sd == 0.0 {
            return Err(EvalError::div_by_zero().with_message("skew of constant values"));
        }
        let cubes: f64 = data.iter().map(|x| ((x - self.mean) / sd).powi(3)).sum();
        let nf = n as f64;
        Ok(nf / ((nf - 1.0) * (nf - 2.0)) * cubes)
    }

    pub fn compute(&self, stat: Statistic) -> Result<f64, EvalError> {
        match stat {
            Statistic::Sum => Ok(self.sum),
            Statistic::Count => Ok(self.n as f64),
            Statistic::Mean => self.mean(),
            Statistic::Median => self.median(),
            Statistic::Mode => self.mode(),
            Statistic::Variance => self.variance(),
            Statistic::VarianceP => self.variance_p(),
            Statistic::StdDev => self.std_dev(),
            Statistic::StdDevP => self.variance_p().map(f64::sqrt),
            Statistic::Skew => self.skew(),
            Statistic::Min => self.min(),
            Statistic::Max => self.max(),
            Statistic::Range => Ok(self.max()? - self.min()?),
        }
    }
}

/// Paired-sample statistics. `x` is the independent variable.
#[derive(Debug, Clone, Default)]
pub struct BivariateStats {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    m2x: f64,
    m2y: f64,
    cxy: f64,
}

impl BivariateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> Self {
        let mut s = Self::new();
        for (x, y) in pairs {
            s.push(x, y);
        }
        s
    }

    pub fn push(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        let dy = y - self.mean_y;
        self.mean_y += dy / n;
        self.m2x += dx * (x - self.mean_x);
        self.m2y += dy * (y - self.mean_y);
        self.cxy += dx * (y - self.mean_y);
    }

    pub fn count(&self) -> usize {
        self.n
    }

    /// Sample covariance.
    pub fn covariance(&self) -> Result<f64, EvalError> {
        if self.n < 2 {
            return Err(too_few("covariance", 2));
        }
        Ok(self.cxy / (self.n - 1) as f64)
    }

    pub fn correlation(&self) -> Result<f64, EvalError> {
        if self.n < 2 {
            return Err(too_few("correlation", 2));
        }
        let denom = (self.m2x * self.m2y).sqrt();
        if denom == 0.0 {
            return Err(EvalError::div_by_zero().with_message("zero variance"));
        }
        Ok(self.cxy / denom)
    }

    pub fn slope(&self) -> Result<f64, EvalError> {
        if self.n < 2 {
            return Err(too_few("slope", 2));
        }
        if self.m2x == 0.0 {
            return Err(EvalError::div_by_zero().with_message("zero variance in x"));
        }
        Ok(self.cxy / self.m2x)
    }

    pub fn intercept(&self) -> Result<f64, EvalError> {
        Ok(self.mean_y - self.slope()? * self.mean_x)
    }

    pub fn compute(&self, stat: BivariateStatistic) -> Result<f64, EvalError> {
        match stat {
            BivariateStatistic::Covariance => self.covariance(),
            BivariateStatistic::Correlation => self.correlation(),
            BivariateStatistic::Slope => self.slope(),
            BivariateStatistic::Intercept => self.intercept(),
            BivariateStatistic::RSquared => self.correlation().map(|r| r * r),
        }
    }
}
