pub const DEFAULT_TABLE_NAME: &str = "RealTimeData";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_API_BASE: &str = "https://api.powerbi.com";
pub const POWER_BI_SCOPE: &str = "https://analysis.windows.net/powerbi/api/.default";

/// Client-credential triple for the token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Forwarder settings read from the environment. Missing values disable the
/// corresponding forwarder instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwarderConfig {
    pub push_url: Option<String>,
    pub credentials: Option<ClientCredentials>,
    pub dataset_id: Option<String>,
    pub table_name: String,
    pub authority_host: String,
    pub api_base: String,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            push_url: None,
            credentials: None,
            dataset_id: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl ForwarderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (
            get("PBI_TENANT_ID"),
            get("PBI_CLIENT_ID"),
            get("PBI_CLIENT_SECRET"),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Some(ClientCredentials {
                tenant_id,
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Self {
            push_url: get("PBI_PUSH_URL"),
            credentials,
            dataset_id: get("PBI_DATASET_ID"),
            table_name: get("PBI_TABLE_NAME").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
            authority_host: get("PBI_AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            api_base: get("PBI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }
    }

    pub fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{tenant_id}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/')
        )
    }

    pub fn rows_url(&self, dataset_id: &str) -> String {
        format!(
            "{}/v1.0/myorg/datasets/{dataset_id}/tables/{}/rows",
            self.api_base.trim_end_matches('/'),
            self.table_name
        )
    }
}
