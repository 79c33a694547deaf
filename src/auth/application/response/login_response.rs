use serde::Deserialize;

/// Body of a successful `POST /access/ticket`.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub data: TicketData,
}

#[derive(Debug, Deserialize)]
pub struct TicketData {
    pub ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_token: String,
    /// `user@realm` the ticket was issued to.
    #[serde(default)]
    pub username: Option<String>,
}
