use async_trait::async_trait;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::{
    error::{ChartError, Result},
    response::{ChartDataDeletion, ChartDataRequest, ChartDataResponse, SaveChartDataRequest},
    store::ChartDataStore,
};

pub const GET_CHART_DATA: &str = "get-chart-data";
pub const DELETE_CHART_DATA: &str = "delete-chart-data";
pub const SAVE_CHART_DATA: &str = "save-chart-data";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Chart data store reached through zambda endpoints (`POST {base}/zambda/{name}/execute`)
#[derive(Clone)]
pub struct ZambdaChartDataStore {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl ZambdaChartDataStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn url(&self, zambda: &str) -> String {
        format!("{}/zambda/{}/execute", self.base_url, zambda)
    }

    async fn execute<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        zambda: &str,
        body: &B,
    ) -> Result<R> {
        let url = self.url(zambda);
        debug!("Executing zambda {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            error!("Zambda {} returned {}: {}", zambda, status, details);
            return Err(ChartError::RequestFailed(format!(
                "{} returned {}: {}",
                zambda, status, details
            )));
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl ChartDataStore for ZambdaChartDataStore {
    async fn fetch(&self, request: &ChartDataRequest) -> Result<ChartDataResponse> {
        self.execute(GET_CHART_DATA, request).await
    }

    async fn delete(&self, deletion: &ChartDataDeletion) -> Result<()> {
        let _: Value = self.execute(DELETE_CHART_DATA, deletion).await?;
        Ok(())
    }

    async fn save(&self, encounter_id: &str, data: ChartDataResponse) -> Result<ChartDataResponse> {
        let request = SaveChartDataRequest {
            encounter_id: encounter_id.to_string(),
            data,
        };
        self.execute(SAVE_CHART_DATA, &request).await
    }
}
