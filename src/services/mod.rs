pub mod audio;
pub mod classifier;
pub mod dispatcher;
pub mod grading;
pub mod notification;
pub mod pipeline;
pub mod queue;
pub mod scoring;
pub mod storage;
pub mod sync;
pub mod text;
pub mod tracker;
pub mod transcriber;
