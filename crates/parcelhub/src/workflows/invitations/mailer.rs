/// Outbound mail used by the invitation workflow.
pub trait InvitationMailer: Send + Sync {
    fn send_company_invitation(&self, email: &str, link: &str) -> Result<(), MailError>;
    fn send_welcome(&self, email: &str, first_name: &str) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("mail rejected for {recipient}: {reason}")]
    Rejected { recipient: String, reason: String },
}
