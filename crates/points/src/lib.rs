#![warn(clippy::unwrap_used)]

pub mod reconciler;

pub use reconciler::PointsReconciler;
