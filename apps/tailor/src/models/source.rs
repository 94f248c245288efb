use serde::{Deserialize, Serialize};

/// The candidate's base résumé facts. Every section, generated or copied,
/// is built from this and nothing else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceData {
    pub candidate: CandidateProfile,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    pub start: String,
    /// None means "present".
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub year: Option<String>,
}

impl SourceData {
    /// True when there is nothing at all to build a document from.
    pub fn is_empty(&self) -> bool {
        self.candidate.name.trim().is_empty()
            && self.summary.as_deref().map(str::trim).unwrap_or("").is_empty()
            && self.skills.is_empty()
            && self.experience.is_empty()
            && self.education.is_empty()
    }
}

impl ExperienceEntry {
    pub fn period(&self) -> String {
        format!("{} – {}", self.start, self.end.as_deref().unwrap_or("Present"))
    }
}

/// The tailoring signal: which job the document is being generated for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetContext {
    /// Cache namespace; one job posting = one id.
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_is_empty() {
        assert!(SourceData::default().is_empty());
    }

    #[test]
    fn test_source_with_only_skills_is_not_empty() {
        let source = SourceData {
            skills: vec!["Rust".to_string()],
            ..Default::default()
        };
        assert!(!source.is_empty());
    }

    #[test]
    fn test_minimal_json_deserializes() {
        let source: SourceData = serde_json::from_str(r#"{"candidate": {"name": "Ada"}}"#).unwrap();
        assert_eq!(source.candidate.name, "Ada");
        assert!(source.experience.is_empty());
    }

    #[test]
    fn test_open_ended_role_period() {
        let entry = ExperienceEntry {
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            start: "2021".to_string(),
            end: None,
            highlights: vec![],
        };
        assert_eq!(entry.period(), "2021 – Present");
    }
}
