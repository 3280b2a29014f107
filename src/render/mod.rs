pub mod bars;
pub mod particles;
pub mod radial;
pub mod surface;
pub mod waveform;

use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::SnapshotDomain;
use crate::config::RenderOptions;

pub use bars::Bars;
pub use particles::{Particle, Particles};
pub use radial::Radial;
pub use surface::{Rgba, Surface};
pub use waveform::Waveform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    Bars,
    Waveform,
    Radial,
    Particles,
}

impl VisualizationMode {
    pub const ALL: [VisualizationMode; 4] = [
        VisualizationMode::Bars,
        VisualizationMode::Waveform,
        VisualizationMode::Radial,
        VisualizationMode::Particles,
    ];

    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn strategy(self) -> &'static dyn RenderStrategy {
        match self {
            VisualizationMode::Bars => &Bars,
            VisualizationMode::Waveform => &Waveform,
            VisualizationMode::Radial => &Radial,
            VisualizationMode::Particles => &Particles,
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().name())
    }
}

/// One way of painting a snapshot.
///
/// `draw` repaints the whole surface and must not keep `data` past the
/// call: the buffer is overwritten on the next poll.
pub trait RenderStrategy {
    fn name(&self) -> &'static str;

    /// Which snapshot this strategy wants for the given options.
    fn domain(&self, _options: &RenderOptions) -> SnapshotDomain {
        SnapshotDomain::Frequency
    }

    fn draw(&self, surface: &mut Surface, data: &[u8], options: &RenderOptions, rng: &mut Pcg32);
}
