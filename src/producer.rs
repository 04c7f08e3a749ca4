//! NATS message producer for return assessments

use crate::types::assessment::ReturnAssessment;
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::{debug, error};

/// Body sent back to a requester whose order could not be scored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Producer for publishing return assessments to NATS
#[derive(Clone)]
pub struct AssessmentProducer {
    client: Client,
    subject: String,
}

impl AssessmentProducer {
    /// Create a new assessment producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish an assessment on the assessment subject
    pub async fn publish(&self, assessment: &ReturnAssessment) -> Result<()> {
        let payload = serde_json::to_vec(assessment)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            assessment_id = %assessment.assessment_id,
            return_probability = assessment.return_probability,
            "Published return assessment"
        );

        Ok(())
    }

    /// Answer a request with its assessment
    pub async fn reply(&self, reply_to: Subject, assessment: &ReturnAssessment) -> Result<()> {
        let payload = serde_json::to_vec(assessment)?;
        self.client.publish(reply_to, payload.into()).await?;

        debug!(
            assessment_id = %assessment.assessment_id,
            "Replied with return assessment"
        );

        Ok(())
    }

    /// Answer a request whose order was rejected
    pub async fn reply_error(&self, reply_to: Subject, message: &str) -> Result<()> {
        let payload = serde_json::to_vec(&ErrorReply {
            error: message.to_string(),
        })?;
        self.client.publish(reply_to, payload.into()).await?;
        Ok(())
    }

    /// Deliver an assessment: to the requester when there is one,
    /// otherwise on the assessment subject.
    pub async fn deliver(
        &self,
        reply_to: Option<Subject>,
        assessment: &ReturnAssessment,
    ) -> Result<()> {
        let result = match reply_to {
            Some(reply_to) => self.reply(reply_to, assessment).await,
            None => self.publish(assessment).await,
        };

        if let Err(e) = &result {
            error!(
                assessment_id = %assessment.assessment_id,
                error = %e,
                "Failed to deliver assessment"
            );
        }

        result
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_reply_shape() {
        let reply = ErrorReply {
            error: "product_rating must be between 1 and 5, got 9".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"error":"product_rating must be between 1 and 5, got 9"}"#
        );
    }
}
