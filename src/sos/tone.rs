use std::{
    io::{self, Write},
    time::Duration,
};

use log::{debug, warn};

use crate::LifelineError;

/// A short fixed-pitch beep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
    /// Initial gain, decays exponentially over the tone duration
    pub volume: f32,
}

pub const ALERT_TONE: Tone = Tone {
    frequency_hz: 1000.,
    duration: Duration::from_millis(200),
    volume: 0.3,
};

/// Something able to make an audible alert.
pub trait ToneDevice {
    fn play(&mut self, tone: &Tone) -> Result<(), LifelineError>;
}

/// Creates the underlying device on first use and reuses it afterwards.
///
/// If creation fails the next call tries again, so a device that shows up later (for example
/// a headset being plugged in) is still picked up.
pub struct LazyTone<D, F> {
    device: Option<D>,
    make_device: F,
}

impl<D, F> LazyTone<D, F>
where
    D: ToneDevice,
    F: FnMut() -> Result<D, LifelineError>,
{
    pub fn new(make_device: F) -> Self {
        Self {
            device: None,
            make_device,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    fn device(&mut self) -> Result<&mut D, LifelineError> {
        if self.device.is_none() {
            debug!("Creating alert tone device");
            self.device = Some((self.make_device)()?);
        }
        self.device.as_mut().ok_or(LifelineError::NoAudioDevice)
    }
}

impl<D, F> ToneDevice for LazyTone<D, F>
where
    D: ToneDevice,
    F: FnMut() -> Result<D, LifelineError>,
{
    fn play(&mut self, tone: &Tone) -> Result<(), LifelineError> {
        self.device()?.play(tone)
    }
}

/// Plays the alert tone, logging and swallowing any failure. Never interrupts the countdown.
pub fn sound_alert(device: &mut impl ToneDevice) {
    if let Err(e) = device.play(&ALERT_TONE) {
        warn!("Error playing alert tone: {}", e);
    }
}

/// Rings the terminal bell. Pitch and duration are up to the terminal.
pub struct TerminalBell<W: Write> {
    out: W,
}

impl TerminalBell<io::Stdout> {
    pub fn stdout() -> Result<Self, LifelineError> {
        Ok(Self { out: io::stdout() })
    }
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ToneDevice for TerminalBell<W> {
    fn play(&mut self, _tone: &Tone) -> Result<(), LifelineError> {
        self.out
            .write_all(b"\x07")
            .and_then(|_| self.out.flush())
            .map_err(|e| LifelineError::TerminalBellError { source: e })
    }
}

/// A device that stays quiet, for `--silent` runs and tests.
#[derive(Debug, Default)]
pub struct SilentTone {
    pub played: usize,
}

impl ToneDevice for SilentTone {
    fn play(&mut self, _tone: &Tone) -> Result<(), LifelineError> {
        self.played += 1;
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use speaker::Speaker;

#[cfg(feature = "audio")]
mod speaker {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    use super::{Tone, ToneDevice};
    use crate::LifelineError;

    fn device_error(e: impl std::fmt::Display) -> LifelineError {
        LifelineError::AudioDeviceError {
            description: e.to_string(),
        }
    }

    /// Sine beep on the default output device.
    pub struct Speaker {
        device: cpal::Device,
        config: cpal::StreamConfig,
        // kept alive until the next beep replaces it
        stream: Option<cpal::Stream>,
    }

    impl Speaker {
        pub fn default_output() -> Result<Self, LifelineError> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(LifelineError::NoAudioDevice)?;
            let supported = device.default_output_config().map_err(device_error)?;
            if supported.sample_format() != cpal::SampleFormat::F32 {
                return Err(LifelineError::AudioDeviceError {
                    description: format!(
                        "unsupported sample format {:?}",
                        supported.sample_format()
                    ),
                });
            }
            Ok(Self {
                device,
                config: supported.into(),
                stream: None,
            })
        }
    }

    impl ToneDevice for Speaker {
        fn play(&mut self, tone: &Tone) -> Result<(), LifelineError> {
            let sample_rate = self.config.sample_rate.0 as f32;
            let channels = self.config.channels as usize;
            let total_frames = (tone.duration.as_secs_f32() * sample_rate) as usize;
            let frequency = tone.frequency_hz;
            let volume = tone.volume;
            let mut frame = 0usize;

            let stream = self
                .device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for samples in data.chunks_mut(channels) {
                            let value = if frame < total_frames {
                                let t = frame as f32 / sample_rate;
                                let progress = frame as f32 / total_frames as f32;
                                // decay from the initial gain down to 0.01 over the tone
                                let gain = volume * (0.01 / volume).powf(progress);
                                gain * (2. * std::f32::consts::PI * frequency * t).sin()
                            } else {
                                0.
                            };
                            samples.iter_mut().for_each(|s| *s = value);
                            frame += 1;
                        }
                    },
                    |e| log::error!("Audio stream error: {}", e),
                    None,
                )
                .map_err(device_error)?;
            stream.play().map_err(device_error)?;
            self.stream = Some(stream);
            Ok(())
        }
    }
}
