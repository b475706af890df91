//! Optiforge library crate
//!
//! LLM-driven generation, execution, and repair of AMPL optimization models.
//! The core loop generates amplpy code from a natural-language problem
//! statement, runs it in a sandboxed subprocess, classifies any failure into
//! a fixed taxonomy, and feeds a targeted corrective prompt back into the
//! next generation attempt until the model runs or the attempt budget is
//! spent.

pub mod config;
pub mod diagnose;
pub mod llm;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod run;
pub mod sandbox;
pub mod sanitize;
pub mod util;
