//! Mobile-ad-attribution relay.
//!
//! Records ad-network clicks, matches them to app installs reported by the
//! iOS SDK (IP + User-Agent similarity within a trailing window), and
//! forwards conversion events to Facebook, AppsFlyer and the downstream
//! tracker.

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod middleware;
pub mod outbound;
pub mod routes;
pub mod services;
pub mod storage;
pub mod utils;
