pub mod evaluation;
pub mod filter;
pub mod status;
pub mod submission;
