//! Discrete CDF-based importance sampling distributions, used by area lights
//! and the environment map.

/// A piecewise-constant 1-D distribution represented as a cumulative sum.
#[derive(Debug, Clone, Default)]
pub struct Discrete1D {
    cdf: Vec<f32>,
}

impl Discrete1D {
    pub fn new() -> Self {
        Self { cdf: vec![0.0] }
    }

    /// Appends a bin with weight `w`, accumulating into the running sum.
    pub fn add(&mut self, w: f32) {
        let last = *self.cdf.last().unwrap();
        self.cdf.push(last + w);
    }

    pub fn len(&self) -> usize {
        self.cdf.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total(&self) -> f32 {
        *self.cdf.last().unwrap_or(&0.0)
    }

    /// Divides every entry by the total, so the distribution integrates to 1.
    pub fn normalize(&mut self) {
        let total = self.total();
        if total > 0.0 {
            for c in self.cdf.iter_mut() {
                *c /= total;
            }
        }
    }

    /// Probability mass of bin `i`; zero out of range.
    pub fn pmf(&self, i: usize) -> f32 {
        if i + 1 >= self.cdf.len() {
            0.0
        } else {
            self.cdf[i + 1] - self.cdf[i]
        }
    }

    /// Samples a bin index via upper-bound search on `u * total`, clamped
    /// into range. Assumes the distribution has already been normalized
    /// (total == 1) unless used directly with `total()` scaling.
    pub fn sample(&self, u: f32) -> usize {
        let n = self.len();
        if n == 0 {
            return 0;
        }
        let target = u * self.total();
        // upper_bound: first index `i` in cdf such that cdf[i] > target
        let idx = match self.cdf.binary_search_by(|probe| {
            if *probe <= target {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        }) {
            Ok(i) | Err(i) => i,
        };
        idx.saturating_sub(1).min(n - 1)
    }
}

/// A 2-D distribution built from a row-major weight grid: a marginal over
/// rows, and one conditional `Discrete1D` per row.
#[derive(Debug, Clone, Default)]
pub struct Discrete2D {
    rows: Vec<Discrete1D>,
    marginal: Discrete1D,
    width: usize,
    height: usize,
}

impl Discrete2D {
    pub fn init(values: &[f32], width: usize, height: usize) -> Self {
        assert_eq!(values.len(), width * height);
        let mut rows = Vec::with_capacity(height);
        let mut marginal = Discrete1D::new();
        for y in 0..height {
            let mut row = Discrete1D::new();
            for x in 0..width {
                row.add(values[y * width + x]);
            }
            marginal.add(row.total());
            row.normalize();
            rows.push(row);
        }
        marginal.normalize();
        Self {
            rows,
            marginal,
            width,
            height,
        }
    }

    /// Samples (u, v) in [0,1)^2, jittered within the chosen bin, returning
    /// also the (row, col) indices actually chosen.
    pub fn sample(&self, u1: f32, u2: f32, jitter_u: f32, jitter_v: f32) -> (f32, f32, usize, usize) {
        let y = self.marginal.sample(u1);
        let x = self.rows[y].sample(u2);
        let u = (x as f32 + jitter_u) / self.width as f32;
        let v = (y as f32 + jitter_v) / self.height as f32;
        (u, v, x, y)
    }

    /// Probability density at (u, v), integrating to 1 over [0,1)^2.
    pub fn pmf(&self, u: f32, v: f32) -> f32 {
        let y = ((v * self.height as f32) as usize).min(self.height - 1);
        let x = ((u * self.width as f32) as usize).min(self.width - 1);
        self.marginal.pmf(y) * self.rows[y].pmf(x) * (self.width * self.height) as f32
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}
