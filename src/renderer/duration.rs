//! Voice duration codec.

use super::backend::VoiceTime;

/// Powers of two tried against the unit count, with the beat value each maps to.
const DIVISORS: [(u64, u32); 9] = [
    (512, 2),
    (256, 4),
    (128, 8),
    (64, 16),
    (32, 32),
    (16, 64),
    (8, 128),
    (4, 256),
    (2, 512),
];

/// Beat value used when the unit count is odd.
const FALLBACK_BEAT_VALUE: u32 = 1024;

/// Express a total length in quarter notes as a `(num_beats, beat_value)`
/// pair on a grid of `resolution` units per quarter. `resolution` is a
/// multiple of 256, as [`LayoutConfig::validate`](crate::config::LayoutConfig::validate) enforces.
///
/// With the default resolution of 256: 1.0 → 1/4, 2.0 → 1/2, 0.75 → 6/32.
pub fn voice_time(total_quarter_length: f64, resolution: u32) -> VoiceTime {
    let units = (total_quarter_length * resolution as f64).round().max(0.0) as u64;
    // 256 units stay one quarter
    let scale = u64::from(resolution / 256).max(1);
    for &(divisor, beat_value) in &DIVISORS {
        let scaled = divisor * scale;
        if units % scaled == 0 {
            return VoiceTime { num_beats: (units / scaled) as u32, beat_value };
        }
    }
    VoiceTime { num_beats: units as u32, beat_value: FALLBACK_BEAT_VALUE * scale as u32 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vt(ql: f64) -> (u32, u32) {
        let t = voice_time(ql, 256);
        (t.num_beats, t.beat_value)
    }

    #[test]
    fn common_lengths() {
        assert_eq!(vt(1.0), (1, 4));
        assert_eq!(vt(2.0), (1, 2));
        assert_eq!(vt(4.0), (2, 2));
        assert_eq!(vt(3.0), (3, 4));
        assert_eq!(vt(0.75), (6, 32));
        assert_eq!(vt(1.5), (3, 8));
    }

    #[test]
    fn odd_unit_counts_fall_back() {
        // 1/256 of a quarter is a single unit
        assert_eq!(vt(1.0 / 256.0), (1, 1024));
        assert_eq!(vt(3.0 / 256.0), (3, 1024));
    }

    #[test]
    fn empty_voice() {
        assert_eq!(vt(0.0), (0, 2));
    }

    #[test]
    fn reconstructs_dyadic_lengths() {
        for n in 0..=8u32 {
            let denom = 2f64.powi(n as i32);
            for k in 1..=16u32 {
                let ql = k as f64 / denom;
                let t = voice_time(ql, 256);
                // beat value counts beats per whole note
                let back = t.num_beats as f64 * 4.0 / t.beat_value as f64;
                assert!((back - ql).abs() <= 1.0 / 256.0, "{ql} decoded as {t:?}");
            }
        }
    }

    #[test]
    fn finer_grids_decode_the_same() {
        for ql in [0.75, 1.0, 1.5, 3.0, 4.0] {
            assert_eq!(voice_time(ql, 1024), voice_time(ql, 256));
        }
        // one unit of a 512 grid is a 2048th note
        assert_eq!(voice_time(1.0 / 512.0, 512), VoiceTime { num_beats: 1, beat_value: 2048 });
    }
}
