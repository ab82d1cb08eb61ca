//! Gradient-ascent allocation over an explicit zone-to-zone traffic
//! matrix.
//!
//! Optimises a row-stochastic matrix `a`, where `a[i][j]` is the fraction
//! of zone i's traffic forwarded to zone j, by projected gradient ascent
//! on a score that rewards in-zone traffic and penalises per-zone load
//! deviation. The best-scoring matrix over all rounds is packaged into
//! fixed-capacity buckets of endpoints whose routing weights realise the
//! matrix columns.

use crate::routing::RoutingAlgorithm;
use crate::topology::{EndpointSliceGroup, RegionInfo, SliceGroups, WeightedEndpoints};
use crate::RoutingError;

/// Learning rate at round zero; decays by ×0.99 per round.
const ALPHA: f64 = 0.05;
/// Numeric precision floor.
const EPS: f64 = 1e-10;
/// Endpoints per packaged bucket.
const BUCKET_CAPACITY: i64 = 100;

/// Projected-gradient allocation on the zone traffic matrix.
#[derive(Debug, Clone, Copy)]
pub struct BackPropagationAlgorithm {
    /// Reward per unit of in-zone traffic.
    in_zone_coeff: f64,
    /// Penalty per unit of load deviation.
    dev_coeff: f64,
    /// Rounds of gradient ascent.
    max_round: usize,
    /// Use the squared deviation (L2) instead of the absolute one (L1).
    use_l2_norm: bool,
}

struct BpArgs {
    n: usize,
    /// Egress traffic ratio per zone; sums to 1.
    r: Vec<f64>,
    /// Endpoints ratio per zone; sums to 1.
    e: Vec<f64>,
    names: Vec<String>,
}

impl BackPropagationAlgorithm {
    pub fn new(in_zone_coeff: f64, dev_coeff: f64, max_round: usize, use_l2_norm: bool) -> Self {
        Self {
            in_zone_coeff,
            dev_coeff,
            max_round,
            use_l2_norm,
        }
    }

    fn init_args(&self, region: &RegionInfo) -> (BpArgs, Vec<Vec<f64>>) {
        let n = region.zones.len();
        let mut arg = BpArgs {
            n,
            r: Vec::with_capacity(n),
            e: Vec::with_capacity(n),
            names: Vec::with_capacity(n),
        };
        for (name, zone) in &region.zones {
            arg.r.push(zone.nodes_ratio);
            arg.e.push(zone.endpoints_ratio);
            arg.names.push(name.clone());
        }
        // start from the identity: all traffic stays in its zone
        let mut a = vec![vec![0.0; n]; n];
        for (i, row) in a.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        (arg, a)
    }

    fn calc_score(&self, arg: &BpArgs, a: &[Vec<f64>]) -> f64 {
        let mut in_zone_score = 0.0;
        for i in 0..arg.n {
            in_zone_score += arg.r[i] * a[i][i];
        }
        let mut dev_score = 0.0;
        for i in 0..arg.n {
            for j in 0..arg.n {
                let load = arg.r[i] / (arg.e[j] + EPS) * a[i][j] - 1.0;
                if self.use_l2_norm {
                    dev_score += load * load;
                } else {
                    dev_score += load.abs();
                }
            }
        }
        self.in_zone_coeff * in_zone_score - self.dev_coeff * dev_score
    }

    /// Analytic derivative of the score with respect to the free entries
    /// `a[i][j]`, `j < n-1`. The last column is constrained to
    /// `1 - Σ_{j<n-1} a[i][j]`, so its terms fold into every free entry of
    /// the row with opposite sign.
    fn calc_derivative(&self, arg: &BpArgs, a: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = arg.n;
        let mut d = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n.saturating_sub(1) {
                let c = arg.r[i] / (arg.e[j] + EPS);
                if self.use_l2_norm {
                    d[i][j] = -2.0 * self.dev_coeff * c * (c * a[i][j] - 1.0);
                } else if c * (a[i][j] + EPS) > 1.0 + EPS {
                    d[i][j] = -self.dev_coeff * c;
                } else if c * (a[i][j] + EPS) < 1.0 - EPS {
                    d[i][j] = self.dev_coeff * c;
                }
            }

            if n > 0 {
                let j = n - 1;
                let c = arg.r[i] / (arg.e[j] + EPS);
                if self.use_l2_norm {
                    for k in 0..j {
                        d[i][k] += 2.0 * self.dev_coeff * c * (c * a[i][j] - 1.0);
                    }
                } else if c * (a[i][j] + EPS) > 1.0 + EPS {
                    for k in 0..j {
                        d[i][k] += self.dev_coeff * c;
                    }
                } else if c * (a[i][j] + EPS) < 1.0 - EPS {
                    for k in 0..j {
                        d[i][k] -= self.dev_coeff * c;
                    }
                }
            }

            if i < n - 1 {
                d[i][i] += self.in_zone_coeff * arg.r[i];
            } else {
                for k in 0..i {
                    d[i][k] -= self.in_zone_coeff * arg.r[i];
                }
            }
        }
        d
    }

    /// One projected-gradient update of row `i` at learning rate `beta`.
    fn update_row(&self, a: &mut [Vec<f64>], d: &[Vec<f64>], i: usize, n: usize, beta: f64) {
        a[i][n - 1] = 1.0;
        for j in 0..n - 1 {
            a[i][j] += beta * d[i][j];
            a[i][n - 1] -= a[i][j];
        }

        // negative free entries: zero them and credit the last column
        for j in 0..n - 1 {
            if a[i][j] < 0.0 {
                a[i][n - 1] += a[i][j];
                a[i][j] = 0.0;
            }
        }
        // negative last column: redistribute the deficit over the still
        // positive entries, clamping to the smallest of them per pass
        if a[i][n - 1] < 0.0 {
            loop {
                let mut non_zero = 0usize;
                let mut min = f64::MAX;
                for j in 0..n - 1 {
                    if a[i][j] > EPS {
                        min = min.min(a[i][j]);
                        non_zero += 1;
                    }
                }
                if non_zero == 0 {
                    break;
                }
                let mut val = -a[i][n - 1] / non_zero as f64;
                let finished = min >= val;
                if !finished {
                    val = min;
                }
                for j in 0..n - 1 {
                    if a[i][j] > EPS {
                        a[i][j] -= val;
                        a[i][n - 1] += val;
                    }
                }
                if finished {
                    break;
                }
            }
            a[i][n - 1] = 0.0;
        }
    }
}

impl RoutingAlgorithm for BackPropagationAlgorithm {
    fn create_slice_groups(&self, region: &RegionInfo) -> Result<SliceGroups, RoutingError> {
        if region.zones.is_empty() {
            return Err(RoutingError::NilZoneDetails);
        }
        let (arg, mut a) = self.init_args(region);
        let n = arg.n;
        let mut best_a = a.clone();
        let mut best_score = self.calc_score(&arg, &a);

        let mut beta = ALPHA;
        for _ in 0..self.max_round {
            if n > 1 {
                let d = self.calc_derivative(&arg, &a);
                for i in 0..n {
                    self.update_row(&mut a, &d, i, n, beta);
                }
            }
            let score = self.calc_score(&arg, &a);
            if score > best_score {
                best_a = a.clone();
                best_score = score;
            }
            beta *= 0.99;
        }

        // Package each zone's endpoints into buckets of at most
        // BUCKET_CAPACITY. Bucket i consumes the i-th matrix column as its
        // per-zone routing weights, normalised to sum to 1.
        let mut slice_groups = SliceGroups::new();
        for (i, name) in arg.names.iter().enumerate() {
            let mut remaining = region.zones[name].endpoints;
            let mut bucket_index = 0;
            while remaining > 0 {
                let current = remaining.min(BUCKET_CAPACITY);
                remaining -= current;
                bucket_index += 1;

                let mut group = EndpointSliceGroup::new(format!("{name}-{bucket_index}"));
                group.composition.insert(
                    name.clone(),
                    WeightedEndpoints {
                        number: current,
                        weight: 1.0,
                    },
                );
                let mut sum = 0.0;
                for j in 0..n {
                    group
                        .zone_traffic_weights
                        .insert(arg.names[j].clone(), best_a[j][i]);
                    sum += best_a[j][i];
                }
                if sum.abs() > EPS {
                    for weight in group.zone_traffic_weights.values_mut() {
                        *weight /= sum;
                    }
                }
                slice_groups.insert(group.label.clone(), group);
            }
        }
        Ok(slice_groups)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
