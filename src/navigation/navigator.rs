//! The navigation core.
//!
//! Owns every piece of mutable localization state (per-beacon filters, the
//! observation aggregate, the EKF and the live route) so that the runtime can
//! serialize all producers through a single lock. Each handler returns the
//! updates it produced instead of publishing them, keeping I/O outside the
//! critical section.

use crate::config::MargaConfig;
use crate::core::WorldPoint;
use crate::error::{MargaError, Result};
use crate::estimation::{EstimatorState, PositionEkf, UpdateOutcome, WallAvoidance};
use crate::fingerprint::{BeaconId, Locator, SignalVector};
use crate::grid::OccupancyGrid;
use crate::planning::{AStarConfig, AStarPlanner, ClearanceMap, PathResult, RouteTracker};
use crate::signal::{ObservationAggregator, SignalConditioner};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::events::{DestinationTarget, NavigationUpdate, SensorEvent};

/// Without speed samples for this long, fusion is reported as fix-only
const INERTIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Counters for the session summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NavigatorStats {
    pub beacon_readings: u64,
    pub fixes_applied: u64,
    pub fixes_rejected: u64,
    pub locate_failures: u64,
    pub predictions: u64,
    pub corrections: u64,
    pub replans: u64,
    pub flushes: u64,
}

/// Serialized localization and routing state.
pub struct Navigator {
    grid: OccupancyGrid,
    clearance: ClearanceMap,
    conditioner: SignalConditioner,
    aggregator: ObservationAggregator,
    locator: Box<dyn Locator>,
    ekf: PositionEkf,
    wall_avoidance: WallAvoidance,
    route: RouteTracker,
    planner_config: AStarConfig,
    arrival_tolerance: f32,
    config: MargaConfig,
    destination: Option<WorldPoint>,
    heading_deg: f32,
    last_speed_at: Option<Instant>,
    inertial_warned: bool,
    stats: NavigatorStats,
}

impl Navigator {
    /// Build the core around a static grid and a locator strategy.
    pub fn new(config: &MargaConfig, grid: OccupancyGrid, locator: Box<dyn Locator>) -> Self {
        let clearance = ClearanceMap::build(&grid);
        info!(
            "Navigator: {}x{} grid @ {:.2}m, max clearance {} cells, locator {}",
            grid.width(),
            grid.height(),
            grid.resolution(),
            clearance.max_clearance(),
            locator.name()
        );

        Self {
            clearance,
            grid,
            conditioner: SignalConditioner::with_roster(
                config.signal.clone(),
                config.beacons.roster.iter(),
            ),
            aggregator: ObservationAggregator::new(config.fusion.min_beacons),
            locator,
            ekf: PositionEkf::new(&config.estimator),
            wall_avoidance: WallAvoidance::new(config.correction.clone()),
            route: RouteTracker::new(),
            planner_config: AStarConfig::with_penalty(config.planner.penalty_strength),
            arrival_tolerance: config.planner.arrival_tolerance,
            heading_deg: config.estimator.initial_heading_deg,
            config: config.clone(),
            destination: None,
            last_speed_at: None,
            inertial_warned: false,
            stats: NavigatorStats::default(),
        }
    }

    /// Dispatch one producer event.
    pub fn handle(&mut self, event: SensorEvent) -> Result<Vec<NavigationUpdate>> {
        match event {
            SensorEvent::Beacon { id, rssi } => Ok(self.on_beacon(&id, rssi)),
            SensorEvent::Heading { degrees } => Ok(self.on_heading(degrees)),
            SensorEvent::Speed { speed } => Ok(self.on_speed(speed)),
            SensorEvent::Destination { target } => self.set_destination(&target),
            SensorEvent::ClearDestination => {
                self.clear_destination();
                Ok(Vec::new())
            }
        }
    }

    /// Condition a raw reading and, once enough beacons are in the
    /// aggregate, locate and fuse.
    pub fn on_beacon(&mut self, id: &BeaconId, rssi: f32) -> Vec<NavigationUpdate> {
        self.stats.beacon_readings += 1;
        let smoothed = self.conditioner.filter(id, rssi);

        match self.aggregator.insert(id.clone(), smoothed) {
            Some(observation) => self.fuse(&observation),
            None => Vec::new(),
        }
    }

    /// Locate from an aggregated observation and fuse the fix.
    pub fn fuse(&mut self, observation: &SignalVector) -> Vec<NavigationUpdate> {
        let fix = match self.locator.locate(observation, self.heading_deg) {
            Ok(result) => result.position,
            Err(MargaError::InsufficientData {
                available,
                required,
            }) => {
                self.stats.locate_failures += 1;
                debug!(
                    "Locate skipped: {} usable samples, {} required",
                    available, required
                );
                return Vec::new();
            }
            Err(e) => {
                self.stats.locate_failures += 1;
                warn!("Locate failed: {}", e);
                return Vec::new();
            }
        };

        match self.ekf.update(fix) {
            UpdateOutcome::Applied => {
                self.stats.fixes_applied += 1;
                self.after_estimate_change(false)
            }
            UpdateOutcome::Rejected => {
                self.stats.fixes_rejected += 1;
                Vec::new()
            }
        }
    }

    /// Heading only changes the displayed orientation and the next prediction.
    pub fn on_heading(&mut self, degrees: f32) -> Vec<NavigationUpdate> {
        self.heading_deg = degrees;
        vec![self.pose()]
    }

    /// Dead-reckoning step with the latest heading.
    pub fn on_speed(&mut self, speed: f32) -> Vec<NavigationUpdate> {
        self.stats.predictions += 1;
        self.last_speed_at = Some(Instant::now());
        if self.inertial_warned {
            info!("Inertial stream resumed");
            self.inertial_warned = false;
        }
        self.ekf.predict(self.heading_deg, speed);
        self.after_estimate_change(false)
    }

    /// Select a destination and plan toward it.
    pub fn set_destination(&mut self, target: &DestinationTarget) -> Result<Vec<NavigationUpdate>> {
        let point = match target {
            DestinationTarget::Named { name } => self.config.destination(name)?.position(),
            DestinationTarget::Point { x, y } => WorldPoint::new(*x, *y),
        };
        info!("Destination set to ({:.2},{:.2})", point.x, point.y);

        self.destination = Some(point);
        self.route.set_goal(self.grid.world_to_grid(point));

        let mut updates = Vec::new();
        if !self.check_arrival(&mut updates) {
            self.replan(true, &mut updates);
        }
        Ok(updates)
    }

    /// Stop navigating
    pub fn clear_destination(&mut self) {
        if self.destination.take().is_some() {
            info!("Destination cleared");
        }
        self.route.clear();
    }

    /// Drop the observation aggregate (timer driven).
    pub fn flush(&mut self) -> usize {
        self.stats.flushes += 1;
        let dropped = self.aggregator.flush();
        debug!("Aggregate flushed ({} beacons)", dropped);

        let stale = self
            .last_speed_at
            .map(|t| t.elapsed() > INERTIAL_TIMEOUT)
            .unwrap_or(true);
        if stale && !self.inertial_warned && self.stats.beacon_readings > 0 {
            warn!("No inertial data; fusing position fixes only");
            self.inertial_warned = true;
        }
        dropped
    }

    /// Wall-avoidance check (timer driven).
    pub fn wall_check(&mut self) -> Vec<NavigationUpdate> {
        match self
            .wall_avoidance
            .apply(&mut self.ekf, &self.grid, &self.clearance)
        {
            Some(_) => {
                self.stats.corrections += 1;
                self.after_estimate_change(true)
            }
            None => Vec::new(),
        }
    }

    /// Publish the pose, then check arrival and the route.
    fn after_estimate_change(&mut self, force_replan: bool) -> Vec<NavigationUpdate> {
        let mut updates = vec![self.pose()];
        if !self.check_arrival(&mut updates) {
            self.replan(force_replan, &mut updates);
        }
        updates
    }

    /// Emit `Arrived` and clear the destination if within tolerance.
    fn check_arrival(&mut self, updates: &mut Vec<NavigationUpdate>) -> bool {
        let Some(destination) = self.destination else {
            return false;
        };
        if self.ekf.position().distance(&destination) > self.arrival_tolerance {
            return false;
        }
        info!(
            "Arrived at ({:.2},{:.2})",
            destination.x, destination.y
        );
        self.clear_destination();
        updates.push(NavigationUpdate::Arrived { destination });
        true
    }

    /// Re-plan if the start cell moved, or unconditionally when forced.
    fn replan(&mut self, force: bool, updates: &mut Vec<NavigationUpdate>) {
        let Some(goal) = self.route.goal() else {
            return;
        };
        let start = self.grid.world_to_grid(self.ekf.position());
        if !force && !self.route.needs_replan(start) {
            return;
        }
        if !self.grid.is_valid_coord(start) {
            warn!(
                "Estimate cell ({},{}) is off the map; keeping last route",
                start.x, start.y
            );
            return;
        }

        self.stats.replans += 1;
        let planner = AStarPlanner::new(&self.grid, &self.clearance, self.planner_config.clone());
        let result = planner.find_path(start, goal);
        self.route.record(start, &result);

        match result.failure_reason {
            None => updates.push(NavigationUpdate::Route {
                waypoints: result.path_world,
            }),
            Some(reason) => {
                debug!("No route from ({},{}): {}", start.x, start.y, reason);
                updates.push(NavigationUpdate::NoRoute { reason });
            }
        }
    }

    fn pose(&self) -> NavigationUpdate {
        NavigationUpdate::Pose {
            position: self.ekf.position(),
            heading_deg: self.heading_deg,
        }
    }

    /// Fused position as an ordered pair for external transmission
    pub fn position_pair(&self) -> (f32, f32) {
        self.ekf.position().as_pair()
    }

    /// Snapshot of the estimator
    pub fn state(&self) -> EstimatorState {
        self.ekf.state()
    }

    /// Display heading in degrees
    pub fn heading_deg(&self) -> f32 {
        self.heading_deg
    }

    pub fn destination(&self) -> Option<WorldPoint> {
        self.destination
    }

    /// Last successful route toward the current destination
    pub fn route(&self) -> Option<&PathResult> {
        self.route.last_good()
    }

    pub fn clearance(&self) -> &ClearanceMap {
        &self.clearance
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn stats(&self) -> NavigatorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::LocateResult;
    use crate::planning::PathFailure;

    /// Locator that always answers with the same point
    struct FixedLocator(Option<WorldPoint>);

    impl Locator for FixedLocator {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn locate(&self, _signals: &SignalVector, _heading_deg: f32) -> Result<LocateResult> {
            match self.0 {
                Some(p) => Ok(LocateResult {
                    position: p,
                    candidates: vec![p],
                    distances: vec![0.0],
                }),
                None => Err(MargaError::InsufficientData {
                    available: 0,
                    required: 3,
                }),
            }
        }
    }

    fn config() -> MargaConfig {
        let mut config = MargaConfig::default();
        config.fusion.min_beacons = 2;
        config.estimator.initial_position = [0.5, 0.5];
        config.planner.penalty_strength = 0.0;
        config
    }

    fn navigator(fix: Option<WorldPoint>) -> Navigator {
        let grid = OccupancyGrid::new(10, 10, 1.0, WorldPoint::ZERO);
        Navigator::new(&config(), grid, Box::new(FixedLocator(fix)))
    }

    #[test]
    fn test_heading_does_not_move_estimate() {
        let mut nav = navigator(None);
        let before = nav.position_pair();
        let updates = nav.on_heading(90.0);
        assert_eq!(nav.position_pair(), before);
        assert_eq!(
            updates,
            vec![NavigationUpdate::Pose {
                position: WorldPoint::new(0.5, 0.5),
                heading_deg: 90.0
            }]
        );
    }

    #[test]
    fn test_speed_predicts_with_latest_heading() {
        let mut nav = navigator(None);
        nav.on_heading(90.0);
        nav.on_speed(1.0);
        let (x, y) = nav.position_pair();
        assert!((x - 0.5).abs() < 1e-5);
        assert!((y - 1.5).abs() < 1e-5);
        assert_eq!(nav.stats().predictions, 1);
    }

    #[test]
    fn test_fusion_gated_on_min_beacons() {
        let mut nav = navigator(Some(WorldPoint::new(5.0, 5.0)));
        assert!(nav.on_beacon(&BeaconId::new("a"), -60.0).is_empty());
        let updates = nav.on_beacon(&BeaconId::new("b"), -70.0);
        assert!(matches!(updates[0], NavigationUpdate::Pose { .. }));
        assert_eq!(nav.stats().fixes_applied, 1);
        assert!(nav.position_pair().0 > 0.5);

        // Flushed aggregate closes the gate again
        nav.flush();
        assert!(nav.on_beacon(&BeaconId::new("a"), -60.0).is_empty());
    }

    #[test]
    fn test_locate_failure_skips_cycle() {
        let mut nav = navigator(None);
        nav.on_beacon(&BeaconId::new("a"), -60.0);
        let updates = nav.on_beacon(&BeaconId::new("b"), -70.0);
        assert!(updates.is_empty());
        assert_eq!(nav.stats().locate_failures, 1);
        assert_eq!(nav.position_pair(), (0.5, 0.5));
    }

    #[test]
    fn test_destination_plans_route() {
        let mut nav = navigator(None);
        let updates = nav
            .set_destination(&DestinationTarget::Point { x: 9.5, y: 9.5 })
            .unwrap();
        match &updates[0] {
            NavigationUpdate::Route { waypoints } => {
                assert_eq!(waypoints.len(), 19);
                assert_eq!(waypoints[0], WorldPoint::new(0.5, 0.5));
                assert_eq!(waypoints[18], WorldPoint::new(9.5, 9.5));
            }
            other => panic!("expected route, got {:?}", other),
        }
        assert_eq!(nav.route().map(|r| r.cost), Some(18.0));
    }

    #[test]
    fn test_same_cell_does_not_replan() {
        let mut nav = navigator(None);
        nav.set_destination(&DestinationTarget::Point { x: 9.5, y: 9.5 })
            .unwrap();
        // Tiny move inside the start cell
        nav.on_heading(0.0);
        let updates = nav.on_speed(0.1);
        assert_eq!(updates.len(), 1);
        assert_eq!(nav.stats().replans, 1);

        // Crossing into the next cell re-plans
        let updates = nav.on_speed(1.0);
        assert!(matches!(updates[1], NavigationUpdate::Route { .. }));
        assert_eq!(nav.stats().replans, 2);
    }

    #[test]
    fn test_blocked_goal_reports_no_route() {
        let mut grid = OccupancyGrid::new(10, 10, 1.0, WorldPoint::ZERO);
        grid.set_occupied(crate::core::GridCoord::new(9, 9), true);
        let mut nav = Navigator::new(&config(), grid, Box::new(FixedLocator(None)));

        let updates = nav
            .set_destination(&DestinationTarget::Point { x: 9.5, y: 9.5 })
            .unwrap();
        assert_eq!(
            updates,
            vec![NavigationUpdate::NoRoute {
                reason: PathFailure::GoalBlocked
            }]
        );
        assert!(nav.route().is_none());
    }

    #[test]
    fn test_arrival_clears_destination() {
        let mut nav = navigator(Some(WorldPoint::new(3.5, 0.5)));
        nav.set_destination(&DestinationTarget::Point { x: 3.5, y: 0.5 })
            .unwrap();

        nav.on_heading(0.0);
        let updates = nav.on_speed(3.0);
        assert!(
            updates.contains(&NavigationUpdate::Arrived {
                destination: WorldPoint::new(3.5, 0.5)
            }),
            "{:?}",
            updates
        );
        assert!(nav.destination().is_none());
        assert!(nav.route().is_none());
    }

    #[test]
    fn test_unknown_named_destination() {
        let mut nav = navigator(None);
        let result = nav.set_destination(&DestinationTarget::Named {
            name: "nowhere".to_string(),
        });
        assert!(matches!(result, Err(MargaError::UnknownDestination(_))));
    }

    #[test]
    fn test_wall_check_forces_replan() {
        let text = "\
##########
#........#
#........#
#........#
##########
";
        let grid = OccupancyGrid::from_ascii(text, 1.0, WorldPoint::ZERO).unwrap();
        let mut config = config();
        config.estimator.initial_position = [1.9, 1.1];
        let mut nav = Navigator::new(&config, grid, Box::new(FixedLocator(None)));

        nav.set_destination(&DestinationTarget::Point { x: 8.5, y: 2.5 })
            .unwrap();
        assert_eq!(nav.stats().replans, 1);

        let updates = nav.wall_check();
        assert!(matches!(updates[0], NavigationUpdate::Pose { .. }));
        assert!(matches!(updates[1], NavigationUpdate::Route { .. }));
        assert_eq!(nav.stats().corrections, 1);
        assert_eq!(nav.stats().replans, 2);
    }
}
