use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
pub struct Discovery {
    pub channels: Vec<DiscoveredChannel>,
}

#[derive(Deserialize, Debug)]
pub struct DiscoveredChannel {
    pub name: String,
    #[serde(default)]
    pub contracts: Vec<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmitIdentity<'a> {
    pub label: &'a str,
    pub msp_id: &'a str,
    pub certificate: &'a str,
}

#[derive(Serialize, Debug)]
pub struct SubmitRequest<'a> {
    pub function: &'a str,
    pub args: &'a [String],
    pub identity: SubmitIdentity<'a>,
}

#[derive(Deserialize, Debug)]
pub struct GatewayResponse {
    pub result: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Deserialize, Debug)]
pub struct GatewayErrorBody {
    pub result: String,
    #[serde(default)]
    pub kind: Option<String>,
    pub error: String,
}
