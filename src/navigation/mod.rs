//! Navigation core: one serialized owner of localization and routing state.
//!
//! Producers (beacon scanner, inertial stream, destination selection, the
//! periodic timer) never touch estimator state directly; they hand a
//! [`SensorEvent`] to the [`Navigator`], which answers with the
//! [`NavigationUpdate`]s to publish.

mod events;
mod navigator;

pub use events::{DestinationTarget, NavigationUpdate, SensorEvent};
pub use navigator::{Navigator, NavigatorStats};
