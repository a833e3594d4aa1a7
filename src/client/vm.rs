//! Smart contract view queries over `/vm-values/query`

use super::{rest::HttpApiClient, ClientError, Credentials};
use crate::constants::PATH_VM_VALUES;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

const RETURN_CODE_OK: &str = "ok";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmQuery {
    pub sc_address: String,
    pub func_name: String,
    pub caller: String,
    pub value: String,
    pub args: Vec<String>,
}

impl VmQuery {
    /// Query called by the contract itself, without arguments
    pub fn new(contract: &str, func_name: &str) -> Self {
        Self {
            sc_address: contract.into(),
            func_name: func_name.into(),
            caller: contract.into(),
            ..Default::default()
        }
    }

    /// Arguments are hex encoded
    pub fn with_arg(mut self, arg: &[u8]) -> Self {
        self.args.push(hex::encode(arg));
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmOutput {
    #[serde(default)]
    pub return_data: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub return_code: String,
    #[serde(default)]
    pub return_message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct VmValuesData {
    #[serde(default)]
    data: Option<VmOutput>,
}

impl VmOutput {
    /// Base64 decoded return data
    pub fn decoded(&self) -> Result<Vec<Vec<u8>>, ClientError> {
        self.return_data
            .iter()
            .flatten()
            .map(|item| match item {
                Some(item) => STANDARD
                    .decode(item)
                    .map_err(|e| ClientError::Decode(format!("return data {item}: {e}"))),
                None => Ok(Vec::new()),
            })
            .collect()
    }
}

/// Runs a view query, returning the raw return data
pub async fn query_vm(
    client: &dyn HttpApiClient,
    query: &VmQuery,
    credentials: &Credentials,
) -> Result<Vec<Vec<u8>>, ClientError> {
    debug!(contract = %query.sc_address, func = %query.func_name, "vm query");
    let body = serde_json::to_value(query)?;
    let response: VmValuesData = client.post(PATH_VM_VALUES, &body, credentials).await?.into_data()?;

    let Some(output) = response.data else {
        return Ok(Vec::new());
    };
    if output.return_code != RETURN_CODE_OK {
        return Err(ClientError::VmReturnCode {
            func: query.func_name.clone(),
            code: output.return_code,
            message: output.return_message,
        });
    }

    output.decoded()
}
