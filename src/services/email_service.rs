use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::json;

use crate::error::{Error, Result};
use crate::models::candidate::PersistedCandidate;
use crate::models::email::{DeliveryOutcome, DeliveryStatus, EmailDraft, InterviewDetails};
use crate::models::job::Job;
use crate::utils::time::{interview_date, interview_time};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// One confirmation draft per selected candidate, in input order.
/// Unselected candidates are skipped.
pub fn draft(
    job: &Job,
    interview: &InterviewDetails,
    candidates: &[PersistedCandidate],
) -> Vec<EmailDraft> {
    let date = interview_date(interview.datetime);
    let time = interview_time(interview.datetime);

    candidates
        .iter()
        .filter(|c| c.selected)
        .map(|candidate| EmailDraft {
            candidate_name: candidate.candidate_name.clone(),
            candidate_email: candidate.candidate_email.clone(),
            subject: format!("Interview Confirmation: {} at ResumeRank", job.title),
            body: format!(
                "Hi {name},\n\n\
                 Thank you for your application for the {title} position. Our team was impressed with your background and we would like to invite you to an interview.\n\n\
                 **Date:** {date}\n\
                 **Time:** {time}\n\
                 **Interviewer:** {interviewer}\n\n\
                 Please let us know if this time works for you. We look forward to speaking with you soon.\n\n\
                 Best regards,\n\
                 The Hiring Team\n\
                 ResumeRank",
                name = candidate.candidate_name,
                title = job.title,
                date = date,
                time = time,
                interviewer = interview.interviewer_name,
            ),
        })
        .collect()
}

/// Plain-text draft to HTML: escaped, blank lines split paragraphs,
/// `**text**` becomes bold.
pub fn body_to_html(body: &str) -> String {
    body.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|paragraph| {
            let escaped = escape_html(paragraph);
            format!("<p>{}</p>", bold_markers(&escaped).replace('\n', "<br>"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn bold_markers(s: &str) -> String {
    let parts: Vec<&str> = s.split("**").collect();
    // Unbalanced markers are left as typed.
    if parts.len() % 2 == 0 {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    for (i, part) in parts.iter().enumerate() {
        if i % 2 == 1 {
            out.push_str("<strong>");
            out.push_str(part);
            out.push_str("</strong>");
        } else {
            out.push_str(part);
        }
    }
    out
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct ResendMailer {
    client: Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(client: Client, api_key: String, from: String) -> Self {
        Self {
            client,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl EmailSender for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<()> {
        let res = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Delivery(format!("Resend returned {}: {}", status, text)));
        }
        Ok(())
    }
}

/// Sends every draft concurrently. One recipient failing never stops the
/// others; each gets its own outcome, in draft order.
pub async fn send_drafts(sender: &dyn EmailSender, drafts: &[EmailDraft]) -> Vec<DeliveryOutcome> {
    let attempts = drafts.iter().map(|draft| async move {
        let result = match draft.candidate_email.as_deref() {
            Some(to) => {
                let html = body_to_html(&draft.body);
                sender.send(to, &draft.subject, &html).await
            }
            None => Err(Error::Delivery(format!(
                "No email address on file for {}",
                draft.candidate_name
            ))),
        };

        match result {
            Ok(()) => DeliveryOutcome {
                candidate_name: draft.candidate_name.clone(),
                candidate_email: draft.candidate_email.clone(),
                status: DeliveryStatus::Sent,
                error: None,
            },
            Err(e) => {
                tracing::warn!(candidate = %draft.candidate_name, error = %e, "Interview email not delivered");
                DeliveryOutcome {
                    candidate_name: draft.candidate_name.clone(),
                    candidate_email: draft.candidate_email.clone(),
                    status: DeliveryStatus::Failed,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    join_all(attempts).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn job() -> Job {
        Job {
            id: Uuid::new_v4(),
            title: "Backend Engineer".into(),
            job_description: "Go, distributed systems".into(),
            created_at: Utc::now(),
            status: JobStatus::Completed,
        }
    }

    fn interview() -> InterviewDetails {
        InterviewDetails {
            datetime: Utc.with_ymd_and_hms(2025, 3, 14, 15, 30, 0).unwrap(),
            interviewer_name: "Priya Raman".into(),
        }
    }

    fn candidate(name: &str, email: Option<&str>, selected: bool) -> PersistedCandidate {
        PersistedCandidate {
            id: Uuid::new_v4(),
            job_id: Uuid::nil(),
            candidate_index: 0,
            candidate_name: name.into(),
            candidate_email: email.map(str::to_string),
            suitability_score: 0.8,
            summary: "Strong Go background".into(),
            created_at: Utc::now(),
            selected,
        }
    }

    fn draft_for(name: &str, email: Option<&str>) -> EmailDraft {
        EmailDraft {
            candidate_name: name.into(),
            candidate_email: email.map(str::to_string),
            subject: "Interview Confirmation: Backend Engineer at ResumeRank".into(),
            body: format!("Hi {},\n\n**Date:** Friday", name),
        }
    }

    #[test]
    fn drafts_only_selected_candidates_in_order() {
        let candidates = vec![
            candidate("Ana Silva", Some("ana@example.com"), true),
            candidate("Ben Okafor", Some("ben@example.com"), false),
            candidate("Cara Jones", None, true),
        ];
        let drafts = draft(&job(), &interview(), &candidates);

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].candidate_name, "Ana Silva");
        assert_eq!(drafts[1].candidate_name, "Cara Jones");
        assert_eq!(drafts[1].candidate_email, None);
    }

    #[test]
    fn body_carries_required_fields_and_no_other_candidate() {
        let candidates = vec![
            candidate("Ana Silva", Some("ana@example.com"), true),
            candidate("Ben Okafor", Some("ben@example.com"), true),
        ];
        let drafts = draft(&job(), &interview(), &candidates);

        let first = &drafts[0];
        assert!(first.subject.contains("Backend Engineer"));
        for needle in ["Ana Silva", "Backend Engineer", "Friday, March 14, 2025", "15:30 UTC", "Priya Raman"] {
            assert!(first.body.contains(needle), "missing {}", needle);
        }
        assert!(!first.body.contains("Ben Okafor"));
        assert!(!first.body.contains("ben@example.com"));
    }

    #[test]
    fn empty_selection_drafts_nothing() {
        assert!(draft(&job(), &interview(), &[]).is_empty());
        let unselected = vec![candidate("Ana Silva", None, false)];
        assert!(draft(&job(), &interview(), &unselected).is_empty());
    }

    #[test]
    fn html_is_escaped_and_bolded() {
        let html = body_to_html("Hi <Ana>,\n\n**Date:** Friday\nline two");
        assert_eq!(
            html,
            "<p>Hi &lt;Ana&gt;,</p>\n<p><strong>Date:</strong> Friday<br>line two</p>"
        );
        assert_eq!(body_to_html("a ** b"), "<p>a ** b</p>");
    }

    #[tokio::test]
    async fn one_failed_recipient_does_not_block_others() {
        let mut sender = MockEmailSender::new();
        sender
            .expect_send()
            .withf(|to, _, _| to == "ana@example.com")
            .times(1)
            .returning(|_, _, _| Err(Error::Delivery("mailbox full".into())));
        sender
            .expect_send()
            .withf(|to, _, _| to == "ben@example.com")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let drafts = vec![
            draft_for("Ana Silva", Some("ana@example.com")),
            draft_for("Ben Okafor", Some("ben@example.com")),
            draft_for("Cara Jones", None),
        ];
        let outcomes = send_drafts(&sender, &drafts).await;

        let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
        assert_eq!(statuses, [DeliveryStatus::Failed, DeliveryStatus::Sent, DeliveryStatus::Failed]);
        assert!(outcomes[0].error.as_deref().unwrap().contains("mailbox full"));
        assert!(outcomes[2].error.as_deref().unwrap().contains("No email address"));
    }

    #[tokio::test]
    async fn sent_html_contains_rendered_body() {
        let mut sender = MockEmailSender::new();
        sender
            .expect_send()
            .withf(|to, subject, html| {
                to == "ana@example.com"
                    && subject.starts_with("Interview Confirmation")
                    && html.contains("<strong>Date:</strong>")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outcomes = send_drafts(&sender, &[draft_for("Ana Silva", Some("ana@example.com"))]).await;
        assert_eq!(outcomes[0].status, DeliveryStatus::Sent);
    }
}
