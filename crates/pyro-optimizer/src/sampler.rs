//! Initial-design sampling: uniform random or maximin Latin hypercube.
//!
//! Both methods draw a raw sample in the unit cube first; scaling onto the
//! parameter bounds is a separate pure step ([`InitialDesign::from_unit_sample`]).

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use pyro_types::{ConfigError, InitialDesign, ParameterSpace, PyroResult, SamplingMethod};

/// Candidate layouts compared by the maximin criterion.
pub const DEFAULT_MAXIMIN_ITERATIONS: usize = 5;

/// Initial-design generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampler {
    method: SamplingMethod,
    maximin_iterations: usize,
}

impl Sampler {
    pub fn new(method: SamplingMethod) -> Self {
        Self {
            method,
            maximin_iterations: DEFAULT_MAXIMIN_ITERATIONS,
        }
    }

    /// Sampler from a method name (`"rand"` or `"lhs"`).
    pub fn from_name(method: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(method.parse()?))
    }

    pub fn with_maximin_iterations(mut self, iterations: usize) -> Self {
        self.maximin_iterations = iterations.max(1);
        self
    }

    pub fn method(&self) -> SamplingMethod {
        self.method
    }

    /// Draw `num_points` candidates scaled onto `space`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        num_points: usize,
        space: &ParameterSpace,
        rng: &mut R,
    ) -> PyroResult<InitialDesign> {
        space.validate()?;
        if num_points == 0 {
            return Err(ConfigError::InvalidValue {
                field: "num_initial".to_string(),
                message: "initial design needs at least one point".to_string(),
            }
            .into());
        }

        let ndim = space.ndim();
        let unit = match self.method {
            SamplingMethod::Random => unit_random(num_points, ndim, rng),
            SamplingMethod::LatinHypercube => {
                maximin_latin_hypercube(num_points, ndim, self.maximin_iterations, rng)
            }
        };
        debug!("Sampled {} x {} initial design ({})", num_points, ndim, self.method);

        Ok(InitialDesign::from_unit_sample(&unit, space))
    }
}

/// `num_points` independent uniform points in `[0, 1)^ndim`.
pub fn unit_random<R: Rng + ?Sized>(num_points: usize, ndim: usize, rng: &mut R) -> Vec<Vec<f64>> {
    (0..num_points)
        .map(|_| (0..ndim).map(|_| rng.gen::<f64>()).collect())
        .collect()
}

/// One classic Latin hypercube: each dimension is cut into `num_points`
/// equal strata, one jittered sample per stratum, strata shuffled
/// independently per dimension.
pub fn latin_hypercube<R: Rng + ?Sized>(num_points: usize, ndim: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = num_points as f64;
    let mut points = vec![vec![0.0; ndim]; num_points];
    let mut column: Vec<f64> = Vec::with_capacity(num_points);

    for j in 0..ndim {
        column.clear();
        column.extend((0..num_points).map(|i| (i as f64 + rng.gen::<f64>()) / n));
        column.shuffle(rng);
        for (point, &value) in points.iter_mut().zip(&column) {
            point[j] = value;
        }
    }
    points
}

/// Best of `iterations` Latin hypercubes by minimum pairwise distance.
pub fn maximin_latin_hypercube<R: Rng + ?Sized>(
    num_points: usize,
    ndim: usize,
    iterations: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let mut best = latin_hypercube(num_points, ndim, rng);
    let mut best_distance = min_pairwise_distance(&best);

    for _ in 1..iterations {
        let candidate = latin_hypercube(num_points, ndim, rng);
        let distance = min_pairwise_distance(&candidate);
        if distance > best_distance {
            best = candidate;
            best_distance = distance;
        }
    }
    best
}

/// Smallest Euclidean distance between any two points; `+inf` for fewer than
/// two points.
pub fn min_pairwise_distance(points: &[Vec<f64>]) -> f64 {
    let mut min = f64::INFINITY;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
            min = min.min(d2.sqrt());
        }
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn space(ndim: usize) -> ParameterSpace {
        (0..ndim).fold(ParameterSpace::new(), |s, j| {
            s.add_float(format!("p{j}"), -1.0 - j as f64, 2.0 + 3.0 * j as f64)
        })
    }

    #[test]
    fn output_shape_and_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for method in [SamplingMethod::Random, SamplingMethod::LatinHypercube] {
            for ndim in 1..4 {
                for num_points in [1, 2, 7, 25] {
                    let space = space(ndim);
                    let design = Sampler::new(method).generate(num_points, &space, &mut rng).unwrap();

                    assert_eq!(design.len(), num_points);
                    assert!(design.fvals().is_none());
                    for point in design.points() {
                        assert_eq!(point.len(), ndim);
                        assert!(space.contains(point), "{point:?} outside bounds");
                    }
                }
            }
        }
    }

    #[test]
    fn latin_hypercube_one_sample_per_stratum() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for n in [1, 2, 5, 16, 50] {
            let unit = maximin_latin_hypercube(n, 1, DEFAULT_MAXIMIN_ITERATIONS, &mut rng);
            let mut values: Vec<f64> = unit.iter().map(|p| p[0]).collect();
            values.sort_by(f64::total_cmp);

            for (i, &v) in values.iter().enumerate() {
                let stratum = ((v * n as f64).floor() as usize).min(n - 1);
                assert_eq!(stratum, i, "value {v} misplaced for n = {n}");
            }
        }
    }

    #[test]
    fn every_dimension_is_stratified() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n = 12;
        let unit = latin_hypercube(n, 3, &mut rng);
        for j in 0..3 {
            let mut strata: Vec<usize> = unit.iter().map(|p| (p[j] * n as f64) as usize).collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn maximin_never_worse_than_single_draw() {
        let seed = 17;
        let mut single_rng = ChaCha8Rng::seed_from_u64(seed);
        let single = latin_hypercube(10, 2, &mut single_rng);

        let mut maximin_rng = ChaCha8Rng::seed_from_u64(seed);
        let best = maximin_latin_hypercube(10, 2, 5, &mut maximin_rng);

        assert!(min_pairwise_distance(&best) >= min_pairwise_distance(&single));
    }

    #[test]
    fn single_point_distance_is_infinite() {
        assert_eq!(min_pairwise_distance(&[vec![0.5, 0.5]]), f64::INFINITY);
        assert_eq!(min_pairwise_distance(&[vec![0.0, 0.0], vec![3.0, 4.0]]), 5.0);
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let space = space(2);
        let a = Sampler::new(SamplingMethod::LatinHypercube)
            .generate(6, &space, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        let b = Sampler::new(SamplingMethod::LatinHypercube)
            .generate(6, &space, &mut ChaCha8Rng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_method_and_bad_inputs_rejected() {
        assert_eq!(
            Sampler::from_name("sobol"),
            Err(ConfigError::UnknownSamplingMethod {
                method: "sobol".into()
            })
        );
        assert_eq!(
            Sampler::from_name("rand").map(|s| s.method()),
            Ok(SamplingMethod::Random)
        );

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sampler = Sampler::new(SamplingMethod::Random);
        assert!(sampler.generate(3, &ParameterSpace::new(), &mut rng).is_err());
        assert!(sampler.generate(0, &space(2), &mut rng).is_err());
    }
}
