use crate::sync::{CrmError, LeadStore};
use crate::types::{CrmResponse, LeadListResponse, LeadRef, NewCommunication, NewLead};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

const LEAD_FIELDS: &str = r#"["name","lead_name"]"#;

/// Client for the Frappe/ERPNext REST resource API.
pub struct ErpNextClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    client: reqwest::Client,
}

impl ErpNextClient {
    pub fn new(base_url: String, api_key: String, api_secret: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            client: reqwest::Client::new(),
        }
    }

    fn auth_header(&self) -> String {
        format!("token {}:{}", self.api_key, self.api_secret)
    }

    fn resource_url(&self, doctype: &str) -> String {
        format!("{}/api/resource/{}", self.base_url, doctype)
    }

    /// Returns the user the API key authenticates as.
    pub async fn logged_user(&self) -> Result<CrmResponse, CrmError> {
        let url = format!("{}/api/method/frappe.auth.get_logged_user", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CrmError::Network(format!("Request failed: {}", e)))?;
        read_response(response).await
    }

    async fn create<T: Serialize + ?Sized>(
        &self,
        doctype: &str,
        payload: &T,
    ) -> Result<CrmResponse, CrmError> {
        let response = self
            .client
            .post(self.resource_url(doctype))
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| CrmError::Network(format!("Request failed: {}", e)))?;

        read_response(response).await
    }
}

#[async_trait]
impl LeadStore for ErpNextClient {
    async fn find_lead_by_mobile(&self, mobile_no: &str) -> Result<Option<LeadRef>, CrmError> {
        let url = format!("{}?{}", self.resource_url("Lead"), lead_lookup_query(mobile_no));

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CrmError::Network(format!("Request failed: {}", e)))?;

        let response = read_response(response).await?;
        info!(
            "ERPNext lead lookup for {}: {} {}",
            mobile_no, response.status, response.body
        );

        if !response.is_success() {
            warn!(
                "Lead lookup returned {}, treating {} as a new lead",
                response.status, mobile_no
            );
            return Ok(None);
        }

        parse_lead_list(&response.body)
    }

    async fn create_lead(&self, lead: &NewLead) -> Result<CrmResponse, CrmError> {
        self.create("Lead", lead).await
    }

    async fn create_communication(
        &self,
        communication: &NewCommunication,
    ) -> Result<CrmResponse, CrmError> {
        self.create("Communication", communication).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<CrmResponse, CrmError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| CrmError::Network(format!("Failed to read body: {}", e)))?;
    Ok(CrmResponse { status, body })
}

/// Query string selecting leads whose mobile number equals `mobile_no` exactly.
pub fn lead_lookup_query(mobile_no: &str) -> String {
    let filters = serde_json::json!([["Lead", "mobile_no", "=", mobile_no]]).to_string();
    format!(
        "fields={}&filters={}",
        urlencoding::encode(LEAD_FIELDS),
        urlencoding::encode(&filters)
    )
}

/// First lead of a `{"data": [...]}` listing, if any.
pub fn parse_lead_list(body: &str) -> Result<Option<LeadRef>, CrmError> {
    let listing: LeadListResponse = serde_json::from_str(body)
        .map_err(|e| CrmError::Parse(format!("Lead listing: {}", e)))?;
    Ok(listing.data.into_iter().next())
}
