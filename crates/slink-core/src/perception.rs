//! Fixed-width perception vector.
//!
//! Every policy sees the world through the same flat slice of
//! [`PERCEPTION_LEN`] floats. Missing readings are zero-filled so the layout
//! never shifts; values are normalized to roughly [0, 1] against reference
//! scales.

use slink_physics::Vec2;

use crate::agent::TouchState;
use crate::sensor::{NUM_BINS, SensorBins};
use crate::sound::SoundField;

/// Entries contributed by each sensor bin.
const BIN_WIDTH: usize = 14;

/// Total length of the perception vector.
pub const PERCEPTION_LEN: usize = 4 + NUM_BINS * BIN_WIDTH + 4 + 2 + 4;

/// Everything the assembler folds into one vector.
#[derive(Debug, Clone, Copy)]
pub struct PerceptionInputs<'a> {
    pub segment_count: usize,
    pub energy: f32,
    pub head_velocity: Vec2,
    pub depth_of_vision: f32,
    pub bins: &'a SensorBins,
    pub touch: TouchState,
    pub sound: SoundField,
}

/// Convert an HSV hue (saturation and value pinned at 1) to RGB.
#[must_use]
pub fn hsv_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue.rem_euclid(1.0) * 6.0;
    let sector = h.floor() as u32 % 6;
    let f = h - h.floor();
    match sector {
        0 => [1.0, f, 0.0],
        1 => [1.0 - f, 1.0, 0.0],
        2 => [0.0, 1.0, f],
        3 => [0.0, 1.0 - f, 1.0],
        4 => [f, 0.0, 1.0],
        _ => [1.0, 0.0, 1.0 - f],
    }
}

fn closeness(distance: f32, depth: f32) -> f32 {
    if depth <= 0.0 {
        return 0.0;
    }
    (1.0 - distance / depth).clamp(0.0, 1.0)
}

/// Assemble the perception vector for one agent.
#[must_use]
pub fn assemble_perception(inputs: &PerceptionInputs<'_>) -> [f32; PERCEPTION_LEN] {
    let mut out = [0.0f32; PERCEPTION_LEN];
    let depth = inputs.depth_of_vision;

    out[0] = inputs.segment_count as f32 / 100.0;
    out[1] = inputs.energy / 1000.0;
    out[2] = inputs.head_velocity.x / 15.0;
    out[3] = inputs.head_velocity.y / 15.0;

    for (bin_index, record) in inputs.bins.iter().enumerate() {
        let base = 4 + bin_index * BIN_WIDTH;
        if let Some(snake) = record.snake {
            let rgb = hsv_to_rgb(snake.hue);
            out[base] = rgb[0];
            out[base + 1] = rgb[1];
            out[base + 2] = rgb[2];
            out[base + 3] = closeness(snake.distance, depth);
            out[base + 4] = snake.energy / 1000.0;
        }
        if let Some(mark) = record.mark {
            let rgb = hsv_to_rgb(mark.hue);
            out[base + 5] = rgb[0];
            out[base + 6] = rgb[1];
            out[base + 7] = rgb[2];
            out[base + 8] = closeness(mark.distance, depth);
            out[base + 9] = mark.size / 10.0;
        }
        if let Some(food) = record.food {
            out[base + 10] = closeness(food.distance, depth);
            out[base + 11] = food.size / 100.0;
        }
        if let Some(wall) = record.wall {
            out[base + 12] = closeness(wall.distance, depth);
            out[base + 13] = 1.0;
        }
    }

    let touch_base = 4 + NUM_BINS * BIN_WIDTH;
    if let Some(along) = inputs.touch.left {
        out[touch_base] = along;
        out[touch_base + 1] = 1.0;
    }
    if let Some(along) = inputs.touch.right {
        out[touch_base + 2] = along;
        out[touch_base + 3] = 1.0;
    }
    if inputs.touch.tail.is_some() {
        out[touch_base + 4] = 1.0;
    }
    if inputs.touch.head.is_some() {
        out[touch_base + 5] = 1.0;
    }

    let sound_base = touch_base + 6;
    out[sound_base] = inputs.sound.left.frequency / 20_000.0;
    out[sound_base + 1] = inputs.sound.left.volume;
    out[sound_base + 2] = inputs.sound.right.frequency / 20_000.0;
    out[sound_base + 3] = inputs.sound.right.volume;

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::TouchState;
    use crate::sensor::{BinRecord, FoodHit, WallHit};
    use crate::world::FoodId;
    use slotmap::KeyData;

    fn empty_inputs(bins: &SensorBins) -> PerceptionInputs<'_> {
        PerceptionInputs {
            segment_count: 31,
            energy: 1000.0,
            head_velocity: Vec2::ZERO,
            depth_of_vision: 50.0,
            bins,
            touch: TouchState::default(),
            sound: SoundField::default(),
        }
    }

    #[test]
    fn vector_length_is_constant() {
        assert_eq!(PERCEPTION_LEN, 84);
        let bins = SensorBins::default();
        let vector = assemble_perception(&empty_inputs(&bins));
        assert_eq!(vector.len(), PERCEPTION_LEN);
    }

    #[test]
    fn empty_bins_zero_fill() {
        let bins = SensorBins::default();
        let vector = assemble_perception(&empty_inputs(&bins));
        // Every bin entry stays zero when nothing was sensed.
        assert!(vector[4..4 + NUM_BINS * BIN_WIDTH].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn food_hit_lands_in_its_bin_slot() {
        let mut bins = SensorBins::default();
        bins[2] = BinRecord {
            food: Some(FoodHit {
                food: FoodId::from(KeyData::from_ffi(1)),
                distance: 25.0,
                size: 30.0,
            }),
            ..BinRecord::default()
        };
        let vector = assemble_perception(&empty_inputs(&bins));
        let base = 4 + 2 * BIN_WIDTH;
        assert!((vector[base + 10] - 0.5).abs() < 1e-5);
        assert!((vector[base + 11] - 0.3).abs() < 1e-5);
        // Neighboring bins untouched.
        assert_eq!(vector[4 + BIN_WIDTH + 10], 0.0);
    }

    #[test]
    fn wall_presence_flag_is_set() {
        let mut bins = SensorBins::default();
        bins[0] = BinRecord {
            wall: Some(WallHit { distance: 10.0 }),
            ..BinRecord::default()
        };
        let vector = assemble_perception(&empty_inputs(&bins));
        assert!((vector[4 + 12] - 0.8).abs() < 1e-5);
        assert_eq!(vector[4 + 13], 1.0);
    }

    #[test]
    fn hue_conversion_hits_primary_colors() {
        assert_eq!(hsv_to_rgb(0.0), [1.0, 0.0, 0.0]);
        let green = hsv_to_rgb(1.0 / 3.0);
        assert!(green[1] > 0.99 && green[0] < 0.01);
        let blue = hsv_to_rgb(2.0 / 3.0);
        assert!(blue[2] > 0.99 && blue[1] < 0.01);
    }
}
