//! Vector similarity between a resume and a job.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::extraction::models::CanonicalResume;
use crate::llm_client::LlmClient;
use crate::matching::models::JobPosition;

/// `None` means no similarity could be computed; fusion degrades it to 0.0.
#[async_trait]
pub trait SimilaritySource: Send + Sync {
    async fn similarity(&self, resume: &CanonicalResume, job: &JobPosition) -> Option<f64>;
}

/// Used when no embedding model is configured.
pub struct NoSimilarity;

#[async_trait]
impl SimilaritySource for NoSimilarity {
    async fn similarity(&self, _resume: &CanonicalResume, _job: &JobPosition) -> Option<f64> {
        None
    }
}

/// Cosine similarity of `/embeddings` vectors.
pub struct EmbeddingSimilarity {
    client: Arc<LlmClient>,
}

impl EmbeddingSimilarity {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SimilaritySource for EmbeddingSimilarity {
    async fn similarity(&self, resume: &CanonicalResume, job: &JobPosition) -> Option<f64> {
        if self.client.embedding_model().is_none() {
            warn!("no embedding model configured; vector similarity unavailable");
            return None;
        }
        let resume_text = resume_vector_text(resume);
        let job_text = job_vector_text(job);
        if resume_text.is_empty() || job_text.is_empty() {
            return None;
        }

        let (resume_vec, job_vec) = futures::future::try_join(
            self.client.embed(&resume_text),
            self.client.embed(&job_text),
        )
        .await
        .inspect_err(|e| warn!(job_id = %job.id, error = %e, "embedding request failed"))
        .ok()?;

        let score = cosine(&resume_vec, &job_vec);
        debug!(job_id = %job.id, score, "vector similarity computed");
        Some(score)
    }
}

/// Cosine over the shared prefix of both vectors, floored at 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Work, skills, education and projects, joined with " | ".
pub fn resume_vector_text(resume: &CanonicalResume) -> String {
    let mut parts = Vec::new();
    for work in &resume.work_experiences {
        let head = format!("{} {}", work.company, work.position);
        if !head.trim().is_empty() {
            parts.push(format!("work: {}", head.trim()));
        }
        let duties = work.responsibilities.display_items();
        if !duties.is_empty() {
            parts.push(format!("responsibilities: {}", duties.join(", ")));
        }
    }
    let skills = resume.skills.technical_union();
    if !skills.is_empty() {
        parts.push(format!("skills: {}", skills.join(", ")));
    }
    for edu in &resume.education {
        let line = [
            Some(edu.school.as_str()),
            edu.major.as_deref(),
            edu.degree.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ");
        if !line.is_empty() {
            parts.push(format!("education: {line}"));
        }
    }
    for project in &resume.projects {
        let line = format!("{} {}", project.name, project.description.display_items().join(" "));
        if !line.trim().is_empty() {
            parts.push(format!("project: {}", line.trim()));
        }
    }
    parts.join(" | ")
}

pub fn job_vector_text(job: &JobPosition) -> String {
    let mut parts = Vec::new();
    if !job.title.trim().is_empty() {
        parts.push(format!("position: {}", job.title.trim()));
    }
    if let Some(d) = job.description.as_deref().filter(|d| !d.trim().is_empty()) {
        parts.push(format!("description: {d}"));
    }
    if let Some(r) = job.requirements.as_deref().filter(|r| !r.trim().is_empty()) {
        parts.push(format!("requirements: {r}"));
    }
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::models::{Descriptive, WorkExperience};
    use uuid::Uuid;

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[], &[1.0]), 0.0);
        // extra dimensions of the longer vector are ignored
        assert!((cosine(&[1.0, 1.0], &[1.0, 1.0, 5.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_resume_vector_text() {
        let mut resume = CanonicalResume::default();
        resume.work_experiences.push(WorkExperience {
            company: "Acme".into(),
            position: "Engineer".into(),
            responsibilities: Descriptive::plain(vec!["APIs".into(), "Ops".into()]),
            ..Default::default()
        });
        resume.skills.technical.explicit = vec!["Rust".into()];
        assert_eq!(
            resume_vector_text(&resume),
            "work: Acme Engineer | responsibilities: APIs, Ops | skills: Rust"
        );
        assert_eq!(resume_vector_text(&CanonicalResume::default()), "");
    }

    #[test]
    fn test_job_vector_text() {
        let job = JobPosition {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "Backend".into(),
            description: None,
            requirements: Some("Rust".into()),
        };
        assert_eq!(job_vector_text(&job), "position: Backend | requirements: Rust");
    }

    #[tokio::test]
    async fn test_no_similarity_reports_none() {
        let job = JobPosition {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "x".into(),
            description: None,
            requirements: None,
        };
        assert_eq!(NoSimilarity.similarity(&CanonicalResume::default(), &job).await, None);
    }
}
