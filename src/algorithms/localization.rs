//! Multi-beacon localization from RSSI-derived ranges.
//!
//! Positions are solved with a weighted linear least-squares trilateration:
//! each beacon's circle equation is subtracted from a reference beacon's
//! equation, which removes the quadratic terms and leaves a 2x2 normal
//! system in `(x, y)`. Equations are weighted by `1 / (d^2 + eps)` so that
//! near beacons, whose RSSI ranges are least noisy, dominate the fit.
//!
//! Every failure mode degrades instead of propagating:
//! - fewer than three valid beacons keeps the previous position with zero confidence
//! - near-singular geometry falls back to a distance-weighted centroid
//! - non-finite results are reported with zero confidence

use crate::algorithms::rssi::PathLossModel;
use crate::core::{BeaconReading, BeaconSample, RobotPosition, WorldPoint, MIN_TRILATERATION_BEACONS};
use log::{debug, trace, warn};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Offset added to distances when weighting the centroid fallback
const CENTROID_DISTANCE_OFFSET: f64 = 0.1;

/// Axis-aligned box the robot is expected to stay within (world units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Workspace {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn contains(&self, point: &WorldPoint) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }
}

/// Tuning parameters for the localizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Worst residual above which one outlier is dropped (world units)
    pub outlier_threshold: f64,
    /// Valid beacons required before an outlier may be dropped
    pub outlier_min_beacons: usize,
    /// Mean residual above which confidence is forced to zero
    pub residual_cutoff: f64,
    /// Normal-matrix determinant below which geometry is treated as singular
    pub determinant_epsilon: f64,
    /// Added to `d^2` when weighting least-squares equations
    pub weight_epsilon: f64,
    /// Confidence assigned to a centroid fallback
    pub centroid_confidence: f64,
    /// Estimates outside this box have their confidence halved
    pub workspace: Option<Workspace>,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: 1.5,
            outlier_min_beacons: 4,
            residual_cutoff: 10.0,
            determinant_epsilon: 1e-9,
            weight_epsilon: 1e-3,
            centroid_confidence: 0.5,
            workspace: None,
        }
    }
}

/// How a localization pass arrived at its estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixKind {
    /// Weighted least squares over every valid beacon
    LeastSquares,
    /// Weighted least squares after dropping the worst-fitting beacon
    OutlierRejected,
    /// Geometry was singular; distance-weighted centroid of the beacons
    Centroid,
    /// Fewer than three valid beacons; previous position retained
    Insufficient,
    /// Non-finite intermediate result; previous position retained
    Degenerate,
}

/// Outcome of one localization pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizationReport {
    pub position: RobotPosition,
    pub kind: FixKind,
    /// Beacon ids that contributed to the final estimate
    pub used_beacons: Vec<u16>,
    /// Beacon dropped by outlier rejection, if any
    pub rejected_beacon: Option<u16>,
    /// Mean absolute range residual of the final least-squares fit
    pub mean_residual: Option<f64>,
}

/// A valid beacon with its measured range
#[derive(Debug, Clone, Copy)]
struct RangedBeacon {
    id: u16,
    position: WorldPoint,
    distance: f64,
}

/// Result of a solve before confidence post-processing
struct Fix {
    point: WorldPoint,
    kind: FixKind,
    confidence: f64,
    used: Vec<u16>,
    rejected: Option<u16>,
    mean_residual: Option<f64>,
}

/// Beacon-based position estimator
pub struct BeaconLocalizer {
    config: LocalizerConfig,
    model: PathLossModel,
    beacons: BTreeMap<u16, WorldPoint>,
    samples: Vec<BeaconSample>,
    current: RobotPosition,
}

impl BeaconLocalizer {
    pub fn new(model: PathLossModel, config: LocalizerConfig) -> Self {
        Self {
            config,
            model,
            beacons: BTreeMap::new(),
            samples: Vec::new(),
            current: RobotPosition::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PathLossModel::default(), LocalizerConfig::default())
    }

    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    pub fn model(&self) -> &PathLossModel {
        &self.model
    }

    pub fn set_workspace(&mut self, workspace: Option<Workspace>) {
        self.config.workspace = workspace;
    }

    /// Register (or move) a fixed beacon
    pub fn set_beacon_position(&mut self, beacon_id: u16, x: f64, y: f64) {
        debug!("[BeaconLocalizer] beacon {} position set to ({:.2}, {:.2})", beacon_id, x, y);
        self.beacons.insert(beacon_id, WorldPoint::new(x, y));
    }

    pub fn beacon_position(&self, beacon_id: u16) -> Option<WorldPoint> {
        self.beacons.get(&beacon_id).copied()
    }

    /// Registered beacons ordered by id
    pub fn beacons(&self) -> impl Iterator<Item = (u16, WorldPoint)> + '_ {
        self.beacons.iter().map(|(id, position)| (*id, *position))
    }

    pub fn rssi_to_distance(&self, rssi: f64) -> Option<f64> {
        self.model.rssi_to_distance(rssi)
    }

    /// Replace the current samples with one scan cycle's readings.
    ///
    /// Readings from unregistered beacons are ignored. Returns the number of
    /// samples with a valid distance.
    pub fn ingest_scan(&mut self, batch: &[BeaconReading]) -> usize {
        let validator = self.model.validator();
        let (readings, _) = validator.deduplicate(batch);

        self.samples = readings
            .iter()
            .filter_map(|reading| {
                let Some(position) = self.beacons.get(&reading.beacon_id) else {
                    trace!("[BeaconLocalizer] ignoring unregistered beacon {}", reading.beacon_id);
                    return None;
                };
                let distance = self.model.rssi_to_distance(reading.rssi);
                trace!(
                    "[BeaconLocalizer] beacon {}: RSSI={:.1} distance={:?}",
                    reading.beacon_id, reading.rssi, distance
                );
                Some(BeaconSample {
                    id: reading.beacon_id,
                    fixed_x: position.x,
                    fixed_y: position.y,
                    rssi: reading.rssi,
                    distance,
                })
            })
            .collect();

        self.samples.iter().filter(|sample| sample.is_valid()).count()
    }

    /// Samples from the most recent scan cycle
    pub fn samples(&self) -> &[BeaconSample] {
        &self.samples
    }

    pub fn current_position(&self) -> RobotPosition {
        self.current
    }

    /// Estimate the robot position from the current samples
    pub fn estimate_position(&mut self) -> RobotPosition {
        self.localize().position
    }

    /// Estimate the robot position and report how the estimate was obtained
    pub fn localize(&mut self) -> LocalizationReport {
        let ranged: Vec<RangedBeacon> = self
            .samples
            .iter()
            .filter_map(|sample| {
                sample.distance.map(|distance| RangedBeacon {
                    id: sample.id,
                    position: sample.position(),
                    distance,
                })
            })
            .collect();

        if ranged.len() < MIN_TRILATERATION_BEACONS {
            debug!(
                "[BeaconLocalizer] not enough beacons for positioning: {} valid, {} required",
                ranged.len(),
                MIN_TRILATERATION_BEACONS
            );
            return self.retain(FixKind::Insufficient, &ranged);
        }

        let fix = self.solve(&ranged);
        let mut confidence = fix.confidence;

        if let Some(workspace) = &self.config.workspace {
            if !workspace.contains(&fix.point) {
                debug!(
                    "[BeaconLocalizer] estimate ({:.2}, {:.2}) outside workspace, halving confidence",
                    fix.point.x, fix.point.y
                );
                confidence *= 0.5;
            }
        }

        if !fix.point.is_finite() || !confidence.is_finite() {
            warn!("[BeaconLocalizer] non-finite estimate, treating as zero confidence");
            return self.retain(FixKind::Degenerate, &ranged);
        }

        self.current = RobotPosition::new(fix.point.x, fix.point.y, confidence);
        debug!(
            "[BeaconLocalizer] position calculated: ({:.2}, {:.2}), confidence {:.2} via {:?}",
            self.current.x, self.current.y, self.current.confidence, fix.kind
        );

        LocalizationReport {
            position: self.current,
            kind: fix.kind,
            used_beacons: fix.used,
            rejected_beacon: fix.rejected,
            mean_residual: fix.mean_residual,
        }
    }

    /// Keep the previous coordinates with zero confidence
    fn retain(&mut self, kind: FixKind, ranged: &[RangedBeacon]) -> LocalizationReport {
        self.current = self.current.distrusted();
        LocalizationReport {
            position: self.current,
            kind,
            used_beacons: ranged.iter().map(|beacon| beacon.id).collect(),
            rejected_beacon: None,
            mean_residual: None,
        }
    }

    /// Least squares with a single outlier-rejection pass
    fn solve(&self, ranged: &[RangedBeacon]) -> Fix {
        let Some(point) = self.least_squares(ranged) else {
            return self.centroid_fix(ranged, None);
        };

        let residuals = Self::residuals(&point, ranged);
        let (worst_index, worst) = residuals
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (index, residual)| {
                if residual > best.1 {
                    (index, residual)
                } else {
                    best
                }
            });

        if worst > self.config.outlier_threshold && ranged.len() >= self.config.outlier_min_beacons {
            let rejected = ranged[worst_index].id;
            debug!(
                "[BeaconLocalizer] dropping beacon {} with residual {:.2}",
                rejected, worst
            );

            let reduced: Vec<RangedBeacon> = ranged
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != worst_index)
                .map(|(_, beacon)| *beacon)
                .collect();

            return match self.least_squares(&reduced) {
                Some(point) => self.least_squares_fix(point, &reduced, FixKind::OutlierRejected, Some(rejected)),
                None => self.centroid_fix(&reduced, Some(rejected)),
            };
        }

        self.least_squares_fix(point, ranged, FixKind::LeastSquares, None)
    }

    fn least_squares_fix(
        &self,
        point: WorldPoint,
        ranged: &[RangedBeacon],
        kind: FixKind,
        rejected: Option<u16>,
    ) -> Fix {
        let residuals = Self::residuals(&point, ranged);
        let mean_residual = residuals.iter().sum::<f64>() / residuals.len() as f64;

        let confidence = if mean_residual > self.config.residual_cutoff {
            debug!(
                "[BeaconLocalizer] mean residual {:.2} exceeds cutoff {:.2}",
                mean_residual, self.config.residual_cutoff
            );
            0.0
        } else {
            (1.0 - mean_residual / 2.0).max(0.0)
        };

        Fix {
            point,
            kind,
            confidence,
            used: ranged.iter().map(|beacon| beacon.id).collect(),
            rejected,
            mean_residual: Some(mean_residual),
        }
    }

    fn centroid_fix(&self, ranged: &[RangedBeacon], rejected: Option<u16>) -> Fix {
        debug!("[BeaconLocalizer] singular beacon geometry, falling back to weighted centroid");
        Fix {
            point: weighted_centroid(ranged),
            kind: FixKind::Centroid,
            confidence: self.config.centroid_confidence,
            used: ranged.iter().map(|beacon| beacon.id).collect(),
            rejected,
            mean_residual: None,
        }
    }

    /// Solve the weighted linearized system. `None` when the geometry is singular.
    fn least_squares(&self, ranged: &[RangedBeacon]) -> Option<WorldPoint> {
        // The nearest beacon is the most reliable reference equation
        let reference = ranged
            .iter()
            .copied()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))?;

        let (xr, yr, dr) = (reference.position.x, reference.position.y, reference.distance);
        let mut normal = Matrix2::<f64>::zeros();
        let mut rhs = Vector2::<f64>::zeros();

        for beacon in ranged.iter().filter(|beacon| beacon.id != reference.id) {
            let (xi, yi, di) = (beacon.position.x, beacon.position.y, beacon.distance);
            let row = Vector2::new(2.0 * (xi - xr), 2.0 * (yi - yr));
            let b = dr * dr - di * di + xi * xi - xr * xr + yi * yi - yr * yr;
            let weight = 1.0 / (di * di + self.config.weight_epsilon);

            normal += row * row.transpose() * weight;
            rhs += row * (b * weight);
        }

        let determinant = normal.determinant();
        if !determinant.is_finite() || determinant.abs() < self.config.determinant_epsilon {
            return None;
        }

        let solution = normal.try_inverse()? * rhs;
        Some(WorldPoint::new(solution.x, solution.y))
    }

    fn residuals(point: &WorldPoint, ranged: &[RangedBeacon]) -> Vec<f64> {
        ranged
            .iter()
            .map(|beacon| (point.distance(&beacon.position) - beacon.distance).abs())
            .collect()
    }
}

/// Centroid of the beacon positions weighted by `1 / (d + 0.1)`
fn weighted_centroid(ranged: &[RangedBeacon]) -> WorldPoint {
    let (sum_x, sum_y, total) = ranged.iter().fold((0.0, 0.0, 0.0), |(sx, sy, sw), beacon| {
        let weight = 1.0 / (beacon.distance + CENTROID_DISTANCE_OFFSET);
        (sx + beacon.position.x * weight, sy + beacon.position.y * weight, sw + weight)
    });
    WorldPoint::new(sum_x / total, sum_y / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TARGET: WorldPoint = WorldPoint::new(3.0, 4.0);

    fn sample(id: u16, x: f64, y: f64, distance: f64) -> BeaconSample {
        BeaconSample {
            id,
            fixed_x: x,
            fixed_y: y,
            rssi: -60.0,
            distance: Some(distance),
        }
    }

    fn exact(id: u16, x: f64, y: f64) -> BeaconSample {
        sample(id, x, y, TARGET.distance(&WorldPoint::new(x, y)))
    }

    fn localizer_with(samples: Vec<BeaconSample>) -> BeaconLocalizer {
        let mut localizer = BeaconLocalizer::with_defaults();
        localizer.samples = samples;
        localizer
    }

    #[test]
    fn test_three_exact_beacons() {
        let mut localizer = localizer_with(vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), exact(3, 0.0, 10.0)]);

        let report = localizer.localize();
        assert_eq!(report.kind, FixKind::LeastSquares);
        assert_relative_eq!(report.position.x, TARGET.x, epsilon = 1e-9);
        assert_relative_eq!(report.position.y, TARGET.y, epsilon = 1e-9);
        assert!(report.position.confidence > 0.9);
        assert_eq!(report.used_beacons, vec![1, 2, 3]);
    }

    #[test]
    fn test_collinear_beacons_fall_back_to_centroid() {
        let mut localizer = localizer_with(vec![
            sample(1, 0.0, 0.0, 2.0),
            sample(2, 2.0, 0.0, 1.0),
            sample(3, 4.0, 0.0, 3.0),
        ]);

        let report = localizer.localize();
        let weights = [1.0 / 2.1, 1.0 / 1.1, 1.0 / 3.1];
        let expected_x = (0.0 * weights[0] + 2.0 * weights[1] + 4.0 * weights[2]) / weights.iter().sum::<f64>();

        assert_eq!(report.kind, FixKind::Centroid);
        assert_eq!(report.position.confidence, 0.5);
        assert_relative_eq!(report.position.x, expected_x, epsilon = 1e-12);
        assert_relative_eq!(report.position.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_insufficient_beacons_keep_previous_position() {
        let mut localizer = localizer_with(vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), exact(3, 0.0, 10.0)]);
        localizer.estimate_position();

        localizer.samples = vec![
            exact(1, 0.0, 0.0),
            exact(2, 10.0, 0.0),
            BeaconSample { distance: None, ..exact(3, 0.0, 10.0) },
        ];
        let report = localizer.localize();

        assert_eq!(report.kind, FixKind::Insufficient);
        assert_eq!(report.position.confidence, 0.0);
        assert_relative_eq!(report.position.x, TARGET.x, epsilon = 1e-9);
        assert_relative_eq!(report.position.y, TARGET.y, epsilon = 1e-9);
        assert_eq!(localizer.current_position(), report.position);
    }

    #[test]
    fn test_outlier_is_rejected_with_four_beacons() {
        let mut biased = exact(4, 10.0, 10.0);
        biased.distance = biased.distance.map(|d| d + 5.0);
        let mut localizer = localizer_with(vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), exact(3, 0.0, 10.0), biased]);

        let report = localizer.localize();
        assert_eq!(report.kind, FixKind::OutlierRejected);
        assert_eq!(report.rejected_beacon, Some(4));
        assert_eq!(report.used_beacons, vec![1, 2, 3]);
        assert_relative_eq!(report.position.x, TARGET.x, epsilon = 1e-9);
        assert_relative_eq!(report.position.y, TARGET.y, epsilon = 1e-9);
        assert!(report.position.confidence > 0.9);
    }

    #[test]
    fn test_three_beacons_never_drop_an_outlier() {
        let mut biased = exact(3, 0.0, 10.0);
        biased.distance = biased.distance.map(|d| d + 3.0);
        let mut localizer = localizer_with(vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), biased]);

        let report = localizer.localize();
        assert_eq!(report.kind, FixKind::LeastSquares);
        assert_eq!(report.rejected_beacon, None);
        assert!(report.position.confidence > 0.0);
        assert!(report.position.confidence < 0.9);
    }

    #[test]
    fn test_residual_cutoff_forces_zero_confidence() {
        let mut biased = exact(3, 0.0, 10.0);
        biased.distance = biased.distance.map(|d| d + 3.0);
        let mut localizer = localizer_with(vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), biased]);
        localizer.config.residual_cutoff = 0.5;

        let report = localizer.localize();
        assert_eq!(report.position.confidence, 0.0);
        assert!(report.mean_residual.unwrap() > 0.5);
    }

    #[test]
    fn test_outside_workspace_halves_confidence() {
        let mut localizer = localizer_with(vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), exact(3, 0.0, 10.0)]);
        localizer.set_workspace(Some(Workspace::new(5.0, 5.0, 10.0, 10.0)));

        let report = localizer.localize();
        assert_relative_eq!(report.position.x, TARGET.x, epsilon = 1e-9);
        assert_relative_eq!(report.position.confidence, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_geometry_is_zero_confidence() {
        let mut localizer = localizer_with(vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), exact(3, 0.0, 10.0)]);
        localizer.estimate_position();

        localizer.samples = vec![exact(1, 0.0, 0.0), exact(2, 10.0, 0.0), sample(3, f64::INFINITY, 0.0, 4.0)];
        let report = localizer.localize();

        assert_eq!(report.kind, FixKind::Degenerate);
        assert_eq!(report.position.confidence, 0.0);
        assert!(report.position.x.is_finite() && report.position.y.is_finite());
        assert_relative_eq!(report.position.x, TARGET.x, epsilon = 1e-9);
    }

    #[test]
    fn test_ingest_scan_resolves_registered_beacons() {
        let model = PathLossModel::default();
        let mut localizer = BeaconLocalizer::new(model, LocalizerConfig::default());
        localizer.set_beacon_position(1, 0.0, 0.0);
        localizer.set_beacon_position(2, 10.0, 0.0);
        localizer.set_beacon_position(3, 0.0, 10.0);

        let batch: Vec<BeaconReading> = localizer
            .beacons()
            .map(|(id, position)| BeaconReading::new(id, model.rssi_at(TARGET.distance(&position))))
            .chain([BeaconReading::new(42, -60.0), BeaconReading::new(3, -150.0)])
            .collect();

        // Beacon 3 appears twice; the stronger, plausible reading wins
        assert_eq!(localizer.ingest_scan(&batch), 3);
        assert_eq!(localizer.samples().len(), 3);

        let position = localizer.estimate_position();
        assert_relative_eq!(position.x, TARGET.x, epsilon = 1e-6);
        assert_relative_eq!(position.y, TARGET.y, epsilon = 1e-6);
    }

    #[test]
    fn test_saturated_duplicate_does_not_mask_valid_reading() {
        let model = PathLossModel::default();
        let mut localizer = BeaconLocalizer::new(model, LocalizerConfig::default());
        localizer.set_beacon_position(1, 0.0, 0.0);
        localizer.set_beacon_position(2, 10.0, 0.0);
        localizer.set_beacon_position(3, 0.0, 10.0);

        let mut batch = vec![BeaconReading::new(1, f64::NAN)];
        batch.extend(
            localizer
                .beacons()
                .map(|(id, position)| BeaconReading::new(id, model.rssi_at(TARGET.distance(&position)))),
        );
        batch.push(BeaconReading::new(3, -5.0));

        assert_eq!(localizer.ingest_scan(&batch), 3);
        let report = localizer.localize();
        assert_eq!(report.kind, FixKind::LeastSquares);
        assert_relative_eq!(report.position.x, TARGET.x, epsilon = 1e-6);
        assert_relative_eq!(report.position.y, TARGET.y, epsilon = 1e-6);
    }

    #[test]
    fn test_new_scan_replaces_old_samples() {
        let mut localizer = BeaconLocalizer::with_defaults();
        localizer.set_beacon_position(1, 0.0, 0.0);
        localizer.set_beacon_position(2, 5.0, 0.0);

        localizer.ingest_scan(&[BeaconReading::new(1, -60.0), BeaconReading::new(2, -62.0)]);
        localizer.ingest_scan(&[BeaconReading::new(2, -70.0)]);

        assert_eq!(localizer.samples().len(), 1);
        assert_eq!(localizer.samples()[0].id, 2);
        assert_eq!(localizer.samples()[0].rssi, -70.0);
    }
}
