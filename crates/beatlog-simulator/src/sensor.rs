//! Simulated microphones

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use beatlog_core::SoundSensor;
use hound::{SampleFormat, WavReader};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::clock::SimClock;

/// Ambient level with no beat present.
const NOISE_FLOOR: u16 = 6_000;

/// Peak-to-peak spread of the ambient noise.
const NOISE_SPREAD: u16 = 1_500;

/// Level added at the instant of a strike.
const STRIKE_LEVEL: f32 = 40_000.0;

/// Decay time constant of a strike.
const STRIKE_DECAY_MS: f32 = 15.0;

/// Metronome click track: a noise floor plus a decaying strike on every beat.
pub struct ClickTrack<C> {
    clock: C,
    period: Duration,
    rng: SmallRng,
}

impl<C: SimClock> ClickTrack<C> {
    pub fn new(bpm: f32, clock: C, seed: u64) -> Result<Self> {
        ensure!(
            bpm.is_finite() && bpm > 0.0,
            "click tempo must be positive, got {}",
            bpm
        );
        let period = Duration::try_from_secs_f32(60.0 / bpm)
            .with_context(|| format!("click tempo {} BPM is too slow", bpm))?;
        Ok(Self {
            clock,
            period,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl<C: SimClock> SoundSensor for ClickTrack<C> {
    fn read_level(&mut self) -> u16 {
        let period_ns = self.period.as_nanos().max(1);
        let phase_ms = (self.clock.elapsed().as_nanos() % period_ns) as f32 / 1e6;
        let strike = STRIKE_LEVEL * (-phase_ms / STRIKE_DECAY_MS).exp();
        let noise = self.rng.gen_range(0..=NOISE_SPREAD);

        (f32::from(NOISE_FLOOR + noise) + strike).min(f32::from(u16::MAX)) as u16
    }
}

/// Replays a WAV recording, following the clock.
///
/// Each frame is reduced to its loudest channel and scaled to the 16-bit
/// level range. Past the end of the recording the sensor reads silence.
pub struct WavSensor<C> {
    clock: C,
    levels: Vec<u16>,
    sample_rate: u32,
}

impl<C: SimClock> WavSensor<C> {
    pub fn open(path: &Path, clock: C) -> Result<Self> {
        let reader = WavReader::open(path)
            .with_context(|| format!("failed to open recording {}", path.display()))?;
        let spec = reader.spec();
        ensure!(spec.channels > 0, "recording has no channels");

        let amplitudes: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(f32::abs))
                .collect::<Result<_, _>>()?,
            SampleFormat::Int => {
                let full_scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v.unsigned_abs() as f32 / full_scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let levels = amplitudes
            .chunks(usize::from(spec.channels))
            .map(|frame| {
                let loudest = frame.iter().copied().fold(0.0f32, f32::max);
                (loudest.min(1.0) * f32::from(u16::MAX)) as u16
            })
            .collect();

        Ok(Self {
            clock,
            levels,
            sample_rate: spec.sample_rate,
        })
    }

    /// Length of the recording.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.levels.len() as f64 / f64::from(self.sample_rate.max(1)))
    }
}

impl<C: SimClock> SoundSensor for WavSensor<C> {
    fn read_level(&mut self) -> u16 {
        let frame = (self.clock.elapsed().as_secs_f64() * f64::from(self.sample_rate)) as usize;
        self.levels.get(frame).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use embedded_hal::delay::DelayNs;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn test_click_track_strikes_on_the_beat() {
        let clock = VirtualClock::new(0);
        let mut delay = clock.clone();
        let mut click = ClickTrack::new(120.0, clock, 1).unwrap();
        assert_eq!(click.period(), Duration::from_millis(500));

        assert!(click.read_level() > 40_000);
        delay.delay_ms(100);
        let quiet = click.read_level();
        assert!((NOISE_FLOOR..=NOISE_FLOOR + NOISE_SPREAD + 100).contains(&quiet));
        delay.delay_ms(400);
        assert!(click.read_level() > 40_000);
    }

    #[test]
    fn test_click_track_rejects_zero_tempo() {
        assert!(ClickTrack::new(0.0, VirtualClock::new(0), 1).is_err());
    }

    #[test]
    fn test_click_track_rejects_tempo_too_slow_for_a_period() {
        let err = ClickTrack::new(1e-20, VirtualClock::new(0), 1).err().unwrap();
        assert!(err.to_string().contains("too slow"), "{}", err);
    }

    #[test]
    fn test_wav_sensor_follows_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burst.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 1_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for frame in 0..1_000 {
            // Loud only in the right channel between 500 and 520 ms
            let right: i16 = if (500..520).contains(&frame) { -32_000 } else { 100 };
            writer.write_sample(0i16).unwrap();
            writer.write_sample(right).unwrap();
        }
        writer.finalize().unwrap();

        let clock = VirtualClock::new(0);
        let mut delay = clock.clone();
        let mut sensor = WavSensor::open(&path, clock).unwrap();
        assert_eq!(sensor.duration(), Duration::from_secs(1));

        assert!(sensor.read_level() < 1_000);
        delay.delay_ms(505);
        assert!(sensor.read_level() > 60_000);
        delay.delay_ms(1_000);
        assert_eq!(sensor.read_level(), 0);
    }
}
