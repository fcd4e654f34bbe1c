use std::collections::VecDeque;

use crate::models::submission::{Submission, Task};

/// In-memory FIFO of submissions waiting for evaluation.
///
/// Filled by source sync and drained by the dispatcher from the same control
/// loop, so it needs no locking. Each worker builds its own queue.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Take the oldest task. Callers check `is_empty` first; an empty queue
    /// yields `None`.
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Wrap each row as a task tagged with its assessment type, keeping row
    /// order.
    pub fn enqueue_many(&mut self, rows: impl IntoIterator<Item = Submission>) -> usize {
        let before = self.tasks.len();
        self.tasks.extend(rows.into_iter().map(Task::new));
        self.tasks.len() - before
    }

    pub fn remaining(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queued tasks, oldest first.
    pub fn list_queued(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::submission::{AssessmentType, SubmissionStatus};

    fn row(id: &str, kind: AssessmentType) -> Submission {
        Submission {
            id: id.to_string(),
            name: format!("Applicant {}", id),
            user_id: None,
            email: format!("{}@example.com", id),
            audio_url: format!("https://files.example.com/{}.mp3", id),
            assessment_type: kind,
            reference_key: Some("S-1".to_string()),
            given_transcription: None,
            status: SubmissionStatus::Unprocessed,
            no_of_retries: 0,
            version: "1.0.2".to_string(),
            environment: "PROD".to_string(),
        }
    }

    #[test]
    fn test_push_and_pop_fifo() {
        let mut queue = TaskQueue::new();
        queue.push(Task::new(row("a", AssessmentType::ScriptReading)));
        queue.push(Task::new(row("b", AssessmentType::ScriptReading)));
        assert_eq!(queue.remaining(), 2);

        assert_eq!(queue.pop().unwrap().submission.id, "a");
        assert_eq!(queue.pop().unwrap().submission.id, "b");
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_enqueue_many_preserves_order_and_tags() {
        let mut queue = TaskQueue::new();
        let added = queue.enqueue_many(vec![
            row("x", AssessmentType::QuoteTranslation),
            row("y", AssessmentType::PhotoInterpretation),
        ]);
        assert_eq!(added, 2);

        let kinds: Vec<_> = queue.list_queued().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![AssessmentType::QuoteTranslation, AssessmentType::PhotoInterpretation]);

        let first = queue.pop().unwrap();
        assert_eq!(first.submission.id, "x");
        assert_eq!(first.kind, AssessmentType::QuoteTranslation);
        let second = queue.pop().unwrap();
        assert_eq!(second.submission.id, "y");
        assert_eq!(second.kind, AssessmentType::PhotoInterpretation);
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_no_deduplication() {
        let mut queue = TaskQueue::new();
        queue.enqueue_many(vec![row("a", AssessmentType::ScriptReading), row("a", AssessmentType::ScriptReading)]);
        assert_eq!(queue.remaining(), 2);
    }
}
