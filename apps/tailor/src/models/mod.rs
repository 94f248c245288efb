pub mod source;

pub use source::{CandidateProfile, EducationEntry, ExperienceEntry, SourceData, TargetContext};
