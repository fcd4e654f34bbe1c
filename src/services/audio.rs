//! Recording decoding and acoustic feature extraction.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Frames below this level count as silence when trimming.
const SILENCE_THRESHOLD_DBFS: f64 = -50.0;
/// Silent runs at least this long are shortened.
const MIN_SILENCE_MS: usize = 500;
/// Silence kept in place of a shortened run.
const KEEP_SILENCE_MS: usize = 500;
/// Frame length for energy analysis.
const ENERGY_FRAME_MS: usize = 10;
/// Utterance boundaries sit this far below the loudest frame.
const UTTERANCE_TOP_DB: f64 = 20.0;

const PITCH_FRAME_MS: usize = 40;
const PITCH_MIN_HZ: f64 = 50.0;
const PITCH_MAX_HZ: f64 = 300.0;
const VOICING_THRESHOLD: f64 = 0.5;

/// Mono PCM decoded from a recording.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Acoustic measurements used by the scoring library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFeatures {
    /// Duration after long silences were shortened.
    pub speech_duration_secs: f64,
    pub avg_pause_secs: f64,
    pub pitch_peak_ratio: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Failed to open recording: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported or corrupt recording: {0}")]
    Decode(#[from] SymphoniaError),

    #[error("Recording has no audio track")]
    NoTrack,

    #[error("Recording contains no samples")]
    Empty,
}

/// Decode any supported container/codec into mono `f32` samples.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AudioError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format.default_track().ok_or(AudioError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Recoverable: skip the bad packet.
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::debug!(error = %msg, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        let channels = spec.channels.count().max(1);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend(
            buffer
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(AudioError::Empty);
    }

    Ok(DecodedAudio { samples, sample_rate })
}

/// Decode a recording and extract every feature the pipeline needs.
pub fn analyze_file(path: &Path) -> Result<AudioFeatures, AudioError> {
    let audio = decode_file(path)?;
    Ok(analyze(&audio))
}

pub fn analyze(audio: &DecodedAudio) -> AudioFeatures {
    AudioFeatures {
        speech_duration_secs: trimmed_duration_secs(audio),
        avg_pause_secs: average_pause_secs(audio),
        pitch_peak_ratio: pitch_peak_ratio(audio),
    }
}

fn frame_len(sample_rate: u32, ms: usize) -> usize {
    (sample_rate as usize * ms / 1000).max(1)
}

fn rms_dbfs(frame: &[f32]) -> f64 {
    if frame.is_empty() {
        return f64::NEG_INFINITY;
    }
    let mean_sq = frame.iter().map(|s| f64::from(*s) * f64::from(*s)).sum::<f64>() / frame.len() as f64;
    if mean_sq <= 0.0 {
        f64::NEG_INFINITY
    } else {
        10.0 * mean_sq.log10()
    }
}

fn frame_levels(audio: &DecodedAudio) -> (usize, Vec<f64>) {
    let len = frame_len(audio.sample_rate, ENERGY_FRAME_MS);
    (len, audio.samples.chunks(len).map(rms_dbfs).collect())
}

/// Duration after every silent run of at least 500 ms is shortened to 500 ms.
pub fn trimmed_duration_secs(audio: &DecodedAudio) -> f64 {
    let (len, levels) = frame_levels(audio);
    let min_run = MIN_SILENCE_MS / ENERGY_FRAME_MS;
    let keep = KEEP_SILENCE_MS / ENERGY_FRAME_MS;

    let mut removed_frames = 0usize;
    let mut run = 0usize;
    for level in levels.iter().chain(std::iter::once(&0.0)) {
        if *level < SILENCE_THRESHOLD_DBFS {
            run += 1;
        } else {
            if run >= min_run {
                removed_frames += run - keep.min(run);
            }
            run = 0;
        }
    }

    let removed_samples = (removed_frames * len).min(audio.samples.len());
    (audio.samples.len() - removed_samples) as f64 / f64::from(audio.sample_rate)
}

/// Average gap in seconds between consecutive utterances, 0 when the
/// recording holds at most one.
pub fn average_pause_secs(audio: &DecodedAudio) -> f64 {
    let (len, levels) = frame_levels(audio);
    let peak = levels.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return 0.0;
    }
    let threshold = peak - UTTERANCE_TOP_DB;

    // (start_frame, end_frame) of voiced intervals
    let mut intervals: Vec<(usize, usize)> = Vec::new();
    let mut start: Option<usize> = None;
    for (i, level) in levels.iter().enumerate() {
        match (start, *level >= threshold) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                intervals.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        intervals.push((s, levels.len()));
    }

    if intervals.len() < 2 {
        return 0.0;
    }

    let frame_secs = len as f64 / f64::from(audio.sample_rate);
    let gaps: Vec<f64> = intervals
        .windows(2)
        .map(|w| (w[1].0 - w[0].1) as f64 * frame_secs)
        .collect();
    gaps.iter().sum::<f64>() / gaps.len() as f64
}

/// Autocorrelation pitch of one frame, `None` when unvoiced.
fn frame_pitch(frame: &[f32], sample_rate: u32) -> Option<f64> {
    let min_lag = (f64::from(sample_rate) / PITCH_MAX_HZ).floor() as usize;
    let max_lag = (f64::from(sample_rate) / PITCH_MIN_HZ).ceil() as usize;
    if min_lag == 0 || max_lag >= frame.len() {
        return None;
    }

    let energy: f64 = frame.iter().map(|s| f64::from(*s) * f64::from(*s)).sum();
    if energy <= f64::EPSILON {
        return None;
    }

    let mut best_lag = 0;
    let mut best_corr = 0.0;
    for lag in min_lag..=max_lag {
        let corr: f64 = frame[..frame.len() - lag]
            .iter()
            .zip(&frame[lag..])
            .map(|(a, b)| f64::from(*a) * f64::from(*b))
            .sum::<f64>()
            / energy;
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }

    (best_corr >= VOICING_THRESHOLD && best_lag > 0).then(|| f64::from(sample_rate) / best_lag as f64)
}

/// Strict local maxima of the voiced pitch track divided by the number of
/// voiced frames.
pub fn pitch_peak_ratio(audio: &DecodedAudio) -> f64 {
    let len = frame_len(audio.sample_rate, PITCH_FRAME_MS);
    let pitches: Vec<f64> = audio
        .samples
        .chunks_exact(len)
        .filter_map(|frame| frame_pitch(frame, audio.sample_rate))
        .collect();

    if pitches.is_empty() {
        return 0.0;
    }

    let peaks = pitches
        .windows(3)
        .filter(|w| w[1] > w[0] && w[1] > w[2])
        .count();
    peaks as f64 / pitches.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn tone(secs: f64, hz: f64, amplitude: f32) -> Vec<f32> {
        let n = (secs * f64::from(RATE)) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f64::consts::PI * hz * i as f64 / f64::from(RATE)).sin() as f32)
            .collect()
    }

    fn silence(secs: f64) -> Vec<f32> {
        vec![0.0; (secs * f64::from(RATE)) as usize]
    }

    fn audio(parts: Vec<Vec<f32>>) -> DecodedAudio {
        DecodedAudio {
            samples: parts.concat(),
            sample_rate: RATE,
        }
    }

    #[test]
    fn test_continuous_tone_keeps_full_duration() {
        let a = audio(vec![tone(2.0, 220.0, 0.5)]);
        assert!((trimmed_duration_secs(&a) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_silence_shortened() {
        let a = audio(vec![tone(1.0, 220.0, 0.5), silence(2.0), tone(1.0, 220.0, 0.5)]);
        // 2 s of silence shrinks to 0.5 s
        assert!((trimmed_duration_secs(&a) - 2.5).abs() < 0.02);
    }

    #[test]
    fn test_short_silence_untouched() {
        let a = audio(vec![tone(1.0, 220.0, 0.5), silence(0.3), tone(1.0, 220.0, 0.5)]);
        assert!((trimmed_duration_secs(&a) - 2.3).abs() < 0.02);
    }

    #[test]
    fn test_average_pause() {
        let a = audio(vec![
            tone(0.5, 220.0, 0.5),
            silence(0.3),
            tone(0.5, 220.0, 0.5),
            silence(0.5),
            tone(0.5, 220.0, 0.5),
        ]);
        assert!((average_pause_secs(&a) - 0.4).abs() < 0.03);
    }

    #[test]
    fn test_single_utterance_has_no_pause() {
        let a = audio(vec![tone(1.0, 220.0, 0.5)]);
        assert_eq!(average_pause_secs(&a), 0.0);
    }

    #[test]
    fn test_steady_tone_has_no_pitch_peaks() {
        let a = audio(vec![tone(1.0, 200.0, 0.5)]);
        assert!(pitch_peak_ratio(&a) < 0.1);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let a = audio(vec![silence(1.0)]);
        assert_eq!(pitch_peak_ratio(&a), 0.0);
    }

    #[test]
    fn test_frame_pitch_estimate() {
        let frame = tone(0.04, 200.0, 0.5);
        let pitch = frame_pitch(&frame, RATE).unwrap();
        assert!((pitch - 200.0).abs() < 5.0);
    }
}
