use crate::error::ServiceError;
use crate::generative::{GenerateRequest, GenerativeModel};
use crate::prompt::RESUME_PROMPT;
use std::sync::Arc;

/// Turns an uploaded PDF resume into a short summary the interviewer can use.
pub struct ResumeParser {
    model: Arc<dyn GenerativeModel>,
}

impl ResumeParser {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    pub async fn summarize_pdf(&self, pdf: Vec<u8>) -> Result<String, ServiceError> {
        if pdf.is_empty() {
            return Err(ServiceError::InvalidInput("No file uploaded".into()));
        }
        tracing::info!("Parsing resume ({} bytes)", pdf.len());
        let request = GenerateRequest::text(RESUME_PROMPT).with_attachment("application/pdf", pdf);
        let text = self.model.generate(request).await?;
        Ok(text.trim().to_string())
    }
}
