//! In-memory collaborators for driving the pipeline and dispatcher

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use audio_eval_worker::config::{EvaluationProfile, ScriptReadingVariant, UploadFailurePolicy};
use audio_eval_worker::db::{RecordStore, ReferenceStore, ResultStore, StoreError, SubmissionPage};
use audio_eval_worker::models::evaluation::{EvaluationResult, FileToken, GradingOutcome, RecordRef, StoredResult};
use audio_eval_worker::models::filter::Filter;
use audio_eval_worker::models::submission::{AssessmentType, Submission, SubmissionStatus};
use audio_eval_worker::services::classifier::{AudioQualityClassifier, ClassifierError, QualityAspect, QualityLabel};
use audio_eval_worker::services::grading::{Grader, GradingError, GradingPrompt};
use audio_eval_worker::services::notification::{NotificationSink, NotifyError};
use audio_eval_worker::services::pipeline::{Collaborators, EvaluationPipeline, PipelineSettings};
use audio_eval_worker::services::storage::{MediaStore, StorageError};
use audio_eval_worker::services::transcriber::{TranscribeOptions, TranscriptionError, Transcriber};
use tempfile::TempDir;
use uuid::Uuid;

use crate::fixtures::{self, QUOTE_KEY, QUOTE_TEXT, SCRIPT_KEY, SCRIPT_TEXT};

pub const CHANNEL_ID: &str = "oc_reviewers";

/// Record store over a vector, honouring the filter and paging contract.
#[derive(Default)]
pub struct InMemoryRecordStore {
    rows: Mutex<Vec<Submission>>,
    pub queries: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn with_rows(rows: Vec<Submission>) -> Self {
        Self {
            rows: Mutex::new(rows),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, submission: Submission) {
        self.rows.lock().unwrap().push(submission);
    }

    pub fn get(&self, id: &str) -> Submission {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .expect("submission exists")
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(&self, filter: &Filter, offset: i64, limit: i64) -> Result<SubmissionPage, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let matching: Vec<Submission> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();

        let start = (offset as usize).min(matching.len());
        let end = (start + limit as usize).min(matching.len());
        Ok(SubmissionPage {
            items: matching[start..end].to_vec(),
            next_offset: (end < matching.len()).then_some(end as i64),
        })
    }

    async fn update_status(&self, id: &str, status: &SubmissionStatus) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.status = status.clone();
        Ok(())
    }

    async fn increment_retry(&self, id: &str, current: i32) -> Result<i32, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.no_of_retries = current + 1;
        Ok(row.no_of_retries)
    }

    async fn find(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        Ok(self.rows.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryResultStore {
    results: Mutex<Vec<(String, EvaluationResult)>>,
    pub fail_create: AtomicBool,
}

impl InMemoryResultStore {
    pub fn all(&self) -> Vec<EvaluationResult> {
        self.results.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn create(&self, result: &EvaluationResult) -> Result<RecordRef, StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let id = Uuid::new_v4().to_string();
        self.results.lock().unwrap().push((id.clone(), result.clone()));
        Ok(RecordRef { id })
    }

    async fn find(&self, id: &str) -> Result<Option<StoredResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .find(|(rid, _)| rid == id)
            .map(|(rid, result)| StoredResult {
                id: rid.clone(),
                share_url: format!("https://results.example.com/{}", rid),
                created_at: chrono::Utc::now(),
                result: result.clone(),
            }))
    }
}

pub struct StaticReferenceStore(HashMap<String, String>);

impl Default for StaticReferenceStore {
    fn default() -> Self {
        Self(HashMap::from([
            (SCRIPT_KEY.to_string(), SCRIPT_TEXT.to_string()),
            (QUOTE_KEY.to_string(), QUOTE_TEXT.to_string()),
        ]))
    }
}

#[async_trait]
impl ReferenceStore for StaticReferenceStore {
    async fn get(&self, reference_key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.0.get(reference_key).cloned())
    }
}

/// Serves registered recordings by URL; anything else is a 404.
#[derive(Default)]
pub struct FakeMediaStore {
    recordings: Mutex<HashMap<String, PathBuf>>,
    pub fail_upload: AtomicBool,
    pub downloads: Mutex<Vec<PathBuf>>,
    pub uploads: AtomicUsize,
}

impl FakeMediaStore {
    pub fn register(&self, url: &str, source: PathBuf) {
        self.recordings.lock().unwrap().insert(url.to_string(), source);
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn download(&self, url: &str, local_path: &Path) -> Result<(), StorageError> {
        let source = self.recordings.lock().unwrap().get(url).cloned();
        let source = source.ok_or(StorageError::Status(404))?;
        tokio::fs::copy(&source, local_path).await?;
        self.downloads.lock().unwrap().push(local_path.to_path_buf());
        Ok(())
    }

    async fn upload(&self, local_path: &Path) -> Result<FileToken, StorageError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(StorageError::Status(503));
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(FileToken(format!("recordings/{}", name)))
    }
}

/// Returns `text`, failing the first `failures` calls.
pub struct FakeTranscriber {
    text: Mutex<String>,
    pub failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio_path: &Path, _options: &TranscribeOptions) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TranscriptionError::Provider {
                status: 503,
                body: "provider unavailable".to_string(),
            });
        }
        Ok(self.text.lock().unwrap().clone())
    }
}

pub struct FakeGrader {
    criteria: Mutex<BTreeMap<String, u8>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub transcripts: Mutex<Vec<String>>,
}

impl Default for FakeGrader {
    fn default() -> Self {
        Self {
            criteria: Mutex::new(BTreeMap::new()),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            transcripts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGrader {
    pub fn set_criteria(&self, pairs: &[(&str, u8)]) {
        *self.criteria.lock().unwrap() = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    }
}

#[async_trait]
impl Grader for FakeGrader {
    async fn evaluate(
        &self,
        _prompt: &GradingPrompt,
        transcript: &str,
        _reference: &str,
    ) -> Result<GradingOutcome, GradingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts.lock().unwrap().push(transcript.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(GradingError::Provider {
                status: 429,
                body: "rate limited".to_string(),
            });
        }
        Ok(GradingOutcome {
            evaluation: "Clear delivery with accurate wording.".to_string(),
            criteria: self.criteria.lock().unwrap().clone(),
        })
    }
}

/// Answers every prediction with one label, or a provider error when `fail`
/// is set for that aspect.
pub struct FixedClassifier {
    label: QualityLabel,
    pub fail: Mutex<Option<QualityAspect>>,
}

impl FixedClassifier {
    pub fn new(label: QualityLabel) -> Self {
        Self {
            label,
            fail: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AudioQualityClassifier for FixedClassifier {
    async fn predict(&self, aspect: QualityAspect, _audio_path: &Path) -> Result<QualityLabel, ClassifierError> {
        if *self.fail.lock().unwrap() == Some(aspect) {
            return Err(ClassifierError::Provider(503));
        }
        Ok(self.label)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, channel_id: &str, content: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Status(500));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(())
    }
}

/// All fakes plus a scratch directory, wired the way the worker binary wires
/// the real collaborators.
pub struct Harness {
    pub records: Arc<InMemoryRecordStore>,
    pub results: Arc<InMemoryResultStore>,
    pub references: Arc<StaticReferenceStore>,
    pub media: Arc<FakeMediaStore>,
    pub transcriber: Arc<FakeTranscriber>,
    pub grader: Arc<FakeGrader>,
    pub classifier: Arc<FixedClassifier>,
    pub notifier: Arc<RecordingNotifier>,
    pub scratch: TempDir,
    pub recordings: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            records: Arc::new(InMemoryRecordStore::default()),
            results: Arc::new(InMemoryResultStore::default()),
            references: Arc::new(StaticReferenceStore::default()),
            media: Arc::new(FakeMediaStore::default()),
            transcriber: Arc::new(FakeTranscriber::new(SCRIPT_TEXT)),
            grader: Arc::new(FakeGrader::default()),
            classifier: Arc::new(FixedClassifier::new(QualityLabel::Excellent)),
            notifier: Arc::new(RecordingNotifier::default()),
            scratch: TempDir::new().expect("scratch dir"),
            recordings: TempDir::new().expect("recordings dir"),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            records: self.records.clone(),
            results: self.results.clone(),
            references: self.references.clone(),
            media: self.media.clone(),
            transcriber: self.transcriber.clone(),
            grader: self.grader.clone(),
            classifier: self.classifier.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn pipeline(&self, profile: EvaluationProfile, policy: UploadFailurePolicy) -> EvaluationPipeline {
        EvaluationPipeline::new(
            profile,
            self.collaborators(),
            PipelineSettings {
                scratch_dir: self.scratch.path().to_path_buf(),
                notify_channel_id: CHANNEL_ID.to_string(),
                upload_failure_policy: policy,
            },
        )
    }

    /// Store `submission` and serve a tone recording of `secs` at its URL.
    pub fn add_submission(&self, submission: Submission, secs: f64) -> Submission {
        let path = self.recordings.path().join(format!("{}.wav", submission.id));
        fixtures::write_tone_wav(&path, secs);
        self.media.register(&submission.audio_url, path);
        self.records.insert(submission.clone());
        submission
    }

    /// Files left behind in the scratch directory.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut dirs = vec![self.scratch.path().to_path_buf()];
        while let Some(dir) = dirs.pop() {
            for entry in std::fs::read_dir(&dir).expect("read scratch dir") {
                let path = entry.expect("dir entry").path();
                if path.is_dir() {
                    dirs.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files
    }
}

pub fn profile(assessment_type: AssessmentType, variant: ScriptReadingVariant) -> EvaluationProfile {
    EvaluationProfile::for_assessment(
        assessment_type,
        variant,
        TranscribeOptions {
            model: "whisper-large-v3".to_string(),
            language: "en".to_string(),
        },
    )
}
