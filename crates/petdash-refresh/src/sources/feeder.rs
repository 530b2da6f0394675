//! Feeder cloud: today's servings and the feeding plan list.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use petdash_session::{HttpApiClient, ResilientSession};
use serde_json::Value;
use tracing::info;

use crate::config::RefreshConfig;
use crate::error::{RefreshError, Result};
use crate::model::Snapshot;
use crate::source::{DashboardCache, RefreshSource, plans_key, servings_key};

/// Endpoints of a feeder API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeederConfig {
    pub servings_path: String,
    pub plans_path: String,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            servings_path: "/feeder/servings/today".to_string(),
            plans_path: "/feeder/plans".to_string(),
        }
    }
}

/// Where plan lists live in the payloads we know about.
const PLAN_LIST_POINTERS: &[&str] = &["/rows", "/result/list", "/result", "/plans"];

/// Pull the plan list out of a plans response.
fn extract_plans(body: &Value) -> Option<Value> {
    if body.is_array() {
        return Some(body.clone());
    }
    PLAN_LIST_POINTERS
        .iter()
        .find_map(|pointer| body.pointer(pointer).filter(|v| v.is_array()))
        .cloned()
}

/// Refreshes `<source>_servings` and `<source>_plans`.
pub struct FeederSource {
    name: String,
    session: Arc<ResilientSession<HttpApiClient>>,
    config: FeederConfig,
    servings_ttl: Duration,
    plans_ttl: Duration,
}

impl FeederSource {
    pub fn new(
        name: impl Into<String>,
        session: Arc<ResilientSession<HttpApiClient>>,
        config: FeederConfig,
        refresh: &RefreshConfig,
    ) -> Self {
        Self {
            name: name.into(),
            session,
            config,
            servings_ttl: refresh.servings_ttl,
            plans_ttl: refresh.plans_ttl,
        }
    }

    async fn fetch(&self, path: &str) -> Result<Value> {
        self.session
            .call(move |api, credentials| async move { api.get_json(&credentials, path).await })
            .await
            .map_err(|e| RefreshError::remote(&self.name, e))
    }
}

#[async_trait]
impl RefreshSource for FeederSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn refresh(&self, cache: &DashboardCache) -> Result<usize> {
        let servings = self.fetch(&self.config.servings_path).await?;
        cache
            .set(
                &servings_key(&self.name),
                Snapshot::Json(servings),
                Some(self.servings_ttl),
            )
            .await;

        let body = self.fetch(&self.config.plans_path).await?;
        let plans = extract_plans(&body)
            .ok_or_else(|| RefreshError::payload(&self.name, "response contains no plan list"))?;
        let plan_count = plans.as_array().map_or(0, Vec::len);
        cache
            .set(
                &plans_key(&self.name),
                Snapshot::Json(plans),
                Some(self.plans_ttl),
            )
            .await;

        info!(source = %self.name, plans = plan_count, "Feeder refreshed");
        Ok(2)
    }
}
