// src/core/mod.rs - Evaluation session engine

pub mod session;
pub mod testcase;

pub use session::{MetricSummary, Session, SessionSummary};
pub use testcase::{MessageData, MessageRole, TestCase, TestResult};
