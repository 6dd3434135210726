use crate::parse::ParsedMessage;
use crate::types::{CrmResponse, LeadRef, NewCommunication, NewLead};
use async_trait::async_trait;
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum CrmError {
    Network(String),
    Parse(String),
}

impl std::fmt::Display for CrmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrmError::Network(msg) => write!(f, "Network error: {}", msg),
            CrmError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for CrmError {}

/// The CRM operations the connector relies on.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Exact-match lookup on the lead's mobile number. `Ok(None)` covers both an
    /// empty result and a non-success status.
    async fn find_lead_by_mobile(&self, mobile_no: &str) -> Result<Option<LeadRef>, CrmError>;

    async fn create_lead(&self, lead: &NewLead) -> Result<CrmResponse, CrmError>;

    async fn create_communication(
        &self,
        communication: &NewCommunication,
    ) -> Result<CrmResponse, CrmError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertAction {
    CreateLead,
    AppendCommunication(String),
}

/// Fixed values stamped onto newly created leads.
#[derive(Debug, Clone)]
pub struct LeadDefaults {
    pub source: String,
    pub status: String,
}

impl Default for LeadDefaults {
    fn default() -> Self {
        Self {
            source: "WhatsApp".to_string(),
            status: "Open".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct SyncReport {
    pub action: UpsertAction,
    pub response: CrmResponse,
}

/// Result of handling one delivery. Only logged; the platform always gets a 200.
#[derive(Debug)]
pub enum Delivery {
    Ignored(String),
    Planned(UpsertAction),
    Synced(SyncReport),
    Failed(CrmError),
}

impl Delivery {
    pub fn log(&self, sender: Option<&str>) {
        let sender = sender.unwrap_or("-");
        match self {
            Delivery::Ignored(reason) => info!("Ignoring event: {}", reason),
            Delivery::Planned(action) => {
                info!("[DRY RUN] Would apply {:?} for {}", action, sender)
            }
            Delivery::Synced(report) if report.response.is_success() => info!(
                "CRM {:?} for {} succeeded: {} {}",
                report.action, sender, report.response.status, report.response.body
            ),
            Delivery::Synced(report) => warn!(
                "CRM {:?} for {} returned {}: {}",
                report.action, sender, report.response.status, report.response.body
            ),
            Delivery::Failed(e) => error!("CRM sync for {} failed: {}", sender, e),
        }
    }
}

pub fn decide(existing: Option<LeadRef>) -> UpsertAction {
    match existing {
        Some(lead) => UpsertAction::AppendCommunication(lead.name),
        None => UpsertAction::CreateLead,
    }
}

pub fn new_lead(phone: &str, profile_name: Option<&str>, defaults: &LeadDefaults) -> NewLead {
    let lead_name = match profile_name {
        Some(name) => format!("{} (WhatsApp {})", name, phone),
        None => format!("WhatsApp {}", phone),
    };
    NewLead {
        lead_name,
        mobile_no: phone.to_string(),
        source: defaults.source.clone(),
        status: defaults.status.clone(),
    }
}

pub fn new_communication(lead_id: &str, phone: &str, text: &str) -> NewCommunication {
    NewCommunication {
        communication_type: "Communication".to_string(),
        medium: "Chat".to_string(),
        direction: "Received".to_string(),
        content: text.to_string(),
        reference_doctype: "Lead".to_string(),
        reference_name: lead_id.to_string(),
        subject: format!("WhatsApp message from {}", phone),
    }
}

/// Looks the sender up and decides what to write, without writing.
pub async fn plan(store: &dyn LeadStore, phone: &str) -> Result<UpsertAction, CrmError> {
    let existing = store.find_lead_by_mobile(phone).await?;
    Ok(decide(existing))
}

pub async fn apply(
    store: &dyn LeadStore,
    action: UpsertAction,
    phone: &str,
    message: &ParsedMessage,
    defaults: &LeadDefaults,
) -> Result<SyncReport, CrmError> {
    let response = match &action {
        UpsertAction::CreateLead => {
            let lead = new_lead(phone, message.profile_name.as_deref(), defaults);
            store.create_lead(&lead).await?
        }
        UpsertAction::AppendCommunication(lead_id) => {
            let communication = new_communication(lead_id, phone, &message.text);
            store.create_communication(&communication).await?
        }
    };
    Ok(SyncReport { action, response })
}

/// Creates a lead for an unknown sender, otherwise appends the message to the
/// existing lead as a Communication.
pub async fn upsert(
    store: &dyn LeadStore,
    phone: &str,
    message: &ParsedMessage,
    defaults: &LeadDefaults,
) -> Result<SyncReport, CrmError> {
    let action = plan(store, phone).await?;
    apply(store, action, phone, message, defaults).await
}

/// Runs one parsed event through the connector and reduces it to a [`Delivery`].
pub async fn deliver(
    store: &dyn LeadStore,
    message: &ParsedMessage,
    defaults: &LeadDefaults,
    dry_run: bool,
) -> Delivery {
    let Some(phone) = message.sender.as_deref() else {
        return Delivery::Ignored(message.text.clone());
    };

    if dry_run {
        return match plan(store, phone).await {
            Ok(action) => Delivery::Planned(action),
            Err(e) => Delivery::Failed(e),
        };
    }

    match upsert(store, phone, message, defaults).await {
        Ok(report) => Delivery::Synced(report),
        Err(e) => Delivery::Failed(e),
    }
}
