//! Audio player core with live spectrum analysis and visualization.
//!
//! [`audio::SignalTap`] taps a media element through an explicit audio
//! graph and serves byte snapshots, [`audio::compute_band_metrics`] reduces
//! them to band loudness, the [`render`] strategies paint them, and
//! [`scheduler::FrameScheduler`] drives all of it once per display frame.

pub mod audio;
pub mod config;
pub mod error;
pub mod graphics;
pub mod render;
pub mod scheduler;
pub mod ui;
