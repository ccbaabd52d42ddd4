//! Outbound side channels: tracker URL mapping and ad-network event delivery.
//!
//! All three destinations are independent best-effort channels. A failure on
//! one never blocks the others or the attribution write that triggered it.

pub mod appsflyer;
pub mod facebook;
pub mod tracker;

pub use appsflyer::AppsFlyerClient;
pub use facebook::{FacebookClient, FacebookEvent};
pub use tracker::{TrackerParams, build_tracker_url};
