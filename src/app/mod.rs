pub mod assessment;

pub use assessment::{AssessmentRunner, HostAssessment};
