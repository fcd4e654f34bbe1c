//! Test fixtures: synthesized recordings and sample submissions

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use audio_eval_worker::models::submission::{AssessmentType, Submission, SubmissionStatus};

pub const SAMPLE_RATE: u32 = 16_000;
pub const VERSION: &str = "v2";
pub const ENVIRONMENT: &str = "PROD";

pub const SCRIPT_KEY: &str = "script-fox";
pub const SCRIPT_TEXT: &str = "The quick brown fox jumps over the lazy dog.";

pub const QUOTE_KEY: &str = "quote-stars";
pub const QUOTE_TEXT: &str = "We are all in the gutter, but some of us are looking at the stars.";

/// Write a mono 16-bit WAV holding a steady 220 Hz tone.
pub fn write_tone_wav(path: &Path, secs: f64) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");

    let samples = (secs * f64::from(SAMPLE_RATE)).round() as usize;
    for i in 0..samples {
        let t = i as f64 / f64::from(SAMPLE_RATE);
        let value = 0.5 * (2.0 * std::f64::consts::PI * 220.0 * t).sin();
        writer
            .write_sample((value * f64::from(i16::MAX)) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
    path.to_path_buf()
}

pub fn audio_url(id: &str) -> String {
    format!("https://cdn.example.com/uploads/{}.wav", id)
}

/// An unprocessed submission in this worker's scope.
pub fn submission(id: &str, assessment_type: AssessmentType) -> Submission {
    let reference_key = match assessment_type {
        AssessmentType::ScriptReading => SCRIPT_KEY,
        AssessmentType::QuoteTranslation | AssessmentType::PhotoInterpretation => QUOTE_KEY,
    };

    Submission {
        id: id.to_string(),
        name: format!("Applicant {}", id),
        user_id: Some(format!("user-{}", id)),
        email: format!("{}@applicants.example.com", id),
        audio_url: audio_url(id),
        assessment_type,
        reference_key: Some(reference_key.to_string()),
        given_transcription: None,
        status: SubmissionStatus::Unprocessed,
        no_of_retries: 0,
        version: VERSION.to_string(),
        environment: ENVIRONMENT.to_string(),
    }
}
