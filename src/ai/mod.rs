//! Text-generation helpers.
//!
//! Thin prompt templates over an external completion service: summarizing a
//! patient's visit history and suggesting a billing service label from
//! recent appointments. The service is treated as a pure function from
//! prompt to text; there are no retries and no state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::db::{Appointment, Patient};

/// Seam for the completion backend, so tests can substitute a canned model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible completion endpoint.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

impl HttpTextGenerator {
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .context("ai.base_url is required when the AI helpers are enabled")?;
        let api_key = config
            .api_key
            .clone()
            .context("ai.api_key is required when the AI helpers are enabled")?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&CompletionRequest {
                model: &self.model,
                prompt,
                max_tokens: 512,
                temperature: 0.2,
            })
            .send()
            .await
            .context("Failed to reach the completion service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion service error: {} - {}", status, body);
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .context("Completion response contained no choices")?;

        Ok(text.trim().to_string())
    }
}

/// Summarize a patient's visit history into a short clinical overview.
pub async fn summarize_patient_history(
    generator: &dyn TextGenerator,
    patient: &Patient,
    appointments: &[Appointment],
) -> Result<String> {
    generator
        .generate(&summary_prompt(patient, appointments))
        .await
}

/// Suggest a billing service label from a patient's recent appointments,
/// e.g. "Cardiology Consultation".
pub async fn suggest_billing_service(
    generator: &dyn TextGenerator,
    patient_id: &str,
    recent: &[Appointment],
) -> Result<String> {
    generator.generate(&suggestion_prompt(patient_id, recent)).await
}

fn summary_prompt(patient: &Patient, appointments: &[Appointment]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a medical assistant. Write a concise summary of the patient's visit history \
         for a clinician, in two or three sentences.\n\n",
    );
    prompt.push_str(&format!("Patient: {}\n", patient.name));
    if let Some(dob) = &patient.dob {
        prompt.push_str(&format!("Date of birth: {}\n", dob));
    }
    prompt.push_str("\nVisits:\n");
    for appointment in appointments {
        prompt.push_str(&format!(
            "- {} with {} ({}), status: {}\n",
            appointment.date_time,
            appointment.doctor_name,
            appointment.doctor_specialty,
            appointment.status,
        ));
    }
    prompt
}

fn suggestion_prompt(patient_id: &str, recent: &[Appointment]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a medical billing assistant. Based on the patient's recent appointments, \
         suggest a concise and appropriate billing service description. The most recent \
         completed appointment is the most likely candidate for billing.\n\n",
    );
    prompt.push_str(&format!("Patient ID: {}\n\nRecent appointments:\n", patient_id));
    for appointment in recent {
        prompt.push_str(&format!(
            "- Specialty: {}, Date: {}, Status: {}\n",
            appointment.doctor_specialty, appointment.date_time, appointment.status,
        ));
    }
    prompt.push_str(
        "\nAnswer with a single, clear billing service description, such as \
         'Cardiology Consultation'.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedGenerator {
        reply: String,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    fn appointment(specialty: &str, status: &str) -> Appointment {
        Appointment {
            id: "a1".to_string(),
            patient_id: "p1".to_string(),
            patient_name: "Ali".to_string(),
            doctor_id: "d1".to_string(),
            doctor_name: "Dr. Hart".to_string(),
            doctor_specialty: specialty.to_string(),
            date_time: "2025-05-01T09:00:00Z".to_string(),
            status: status.to_string(),
            snapshot_at: "2025-04-01T09:00:00Z".to_string(),
            created_at: "2025-04-01T09:00:00Z".to_string(),
            updated_at: "2025-05-01T09:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_suggestion_prompt_includes_appointments() {
        let prompt = suggestion_prompt("p1", &[appointment("Cardiology", "Completed")]);
        assert!(prompt.contains("Patient ID: p1"));
        assert!(prompt.contains("Specialty: Cardiology"));
        assert!(prompt.contains("Status: Completed"));
    }

    #[test]
    fn test_summary_prompt_lists_visits() {
        let patient = Patient {
            id: "p1".to_string(),
            name: "Ali".to_string(),
            dob: Some("1980-02-03".to_string()),
            gender: "male".to_string(),
            phone: "555".to_string(),
            address: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let prompt = summary_prompt(
            &patient,
            &[
                appointment("Cardiology", "Completed"),
                appointment("Dermatology", "Scheduled"),
            ],
        );
        assert!(prompt.contains("Patient: Ali"));
        assert!(prompt.contains("Date of birth: 1980-02-03"));
        assert!(prompt.contains("(Cardiology)"));
        assert!(prompt.contains("(Dermatology)"));
    }

    #[tokio::test]
    async fn test_suggest_billing_service_returns_model_text() {
        let generator = CannedGenerator {
            reply: "Cardiology Consultation".to_string(),
        };
        let service = suggest_billing_service(
            &generator,
            "p1",
            &[appointment("Cardiology", "Completed")],
        )
        .await
        .unwrap();
        assert_eq!(service, "Cardiology Consultation");
    }
}
