use serde::{Deserialize, Serialize};

/// Query string of the platform's subscription handshake.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeadListResponse {
    #[serde(default)]
    pub data: Vec<LeadRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeadRef {
    pub name: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub lead_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLead {
    pub lead_name: String,
    pub mobile_no: String,
    pub source: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCommunication {
    pub communication_type: String,
    #[serde(rename = "communication_medium")]
    pub medium: String,
    #[serde(rename = "sent_or_received")]
    pub direction: String,
    pub content: String,
    pub reference_doctype: String,
    pub reference_name: String,
    pub subject: String,
}

/// Status and raw body of a CRM call, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CrmResponse {
    pub status: u16,
    pub body: String,
}

impl CrmResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
