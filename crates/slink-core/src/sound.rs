//! Binaural acoustic model.
//!
//! Each agent hears the world through two side bands. An emitter contributes
//! its volume attenuated linearly by distance, panned by the bearing of the
//! source relative to the listener's heading; the band frequency is the
//! volume-weighted mean of everything audible on that side.

use slink_physics::Vec2;

/// Perceived signal on one side of the head.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideBand {
    pub frequency: f32,
    pub volume: f32,
}

/// Stereo pair delivered to perception.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SoundField {
    pub left: SideBand,
    pub right: SideBand,
}

/// One active sound source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundEmitter {
    pub position: Vec2,
    pub frequency: f32,
    pub volume: f32,
}

fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Mix every audible emitter into the listener's stereo field.
///
/// A source dead ahead lands equally in both bands; sources to the side pan
/// toward that ear. Emitters at zero volume or beyond `hearing_range` are
/// silent and contribute nothing, so an empty field stays all zeros.
#[must_use]
pub fn listen(
    listener_position: Vec2,
    listener_angle: f32,
    hearing_range: f32,
    emitters: &[SoundEmitter],
) -> SoundField {
    let forward = Vec2::forward(listener_angle);
    let mut left_volume = 0.0f32;
    let mut right_volume = 0.0f32;
    let mut left_weighted_freq = 0.0f32;
    let mut right_weighted_freq = 0.0f32;

    for emitter in emitters {
        if emitter.volume <= 0.0 {
            continue;
        }
        let offset = emitter.position - listener_position;
        let distance = offset.length();
        let attenuation = clamp01(1.0 - distance / hearing_range);
        if attenuation <= 0.0 {
            continue;
        }
        let heard = emitter.volume * attenuation;
        // sin of the bearing: positive when the source is to the left.
        let pan = if distance <= f32::EPSILON {
            0.0
        } else {
            forward.cross(offset.scale(1.0 / distance))
        };
        let left_gain = clamp01((1.0 + pan) * 0.5);
        let right_gain = clamp01((1.0 - pan) * 0.5);
        left_volume += heard * left_gain;
        right_volume += heard * right_gain;
        left_weighted_freq += emitter.frequency * heard * left_gain;
        right_weighted_freq += emitter.frequency * heard * right_gain;
    }

    let band = |volume: f32, weighted: f32| SideBand {
        frequency: if volume > 0.0 { weighted / volume } else { 0.0 },
        volume,
    };
    SoundField {
        left: band(left_volume, left_weighted_freq),
        right: band(right_volume, right_weighted_freq),
    }
}
