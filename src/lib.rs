//! Audio submission evaluation worker
//!
//! Pulls eligible applicant recordings from the record store, runs each one
//! through the evaluation pipeline (fetch, validate, archive, transcribe,
//! score, grade, persist) and writes the outcome back: a stored result on
//! success, a terminal status or a retry-count increment on failure.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
