use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use uuid::Uuid;

use crate::models::task::{TaskConfig, TaskRecord};
use crate::models::verification::{SubmitTaskRequest, SubmitTaskResponse};
use crate::services::source::{LookupError, StatusSource, SubmitError, TaskSubmitter};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a task registry served by this crate's API.
#[derive(Clone)]
pub struct RemoteRegistry {
    http: Client,
    base_url: String,
}

impl RemoteRegistry {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/api/v1/tasks", self.base_url)
    }
}

#[async_trait]
impl TaskSubmitter for RemoteRegistry {
    async fn submit(
        &self,
        video_url: &str,
        config: &TaskConfig,
    ) -> Result<SubmitTaskResponse, SubmitError> {
        let request = SubmitTaskRequest {
            video_url: video_url.to_string(),
            config: Some(config.clone()),
        };

        let response = self.http.post(self.tasks_url()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let accepted: SubmitTaskResponse = response.json().await?;
        tracing::debug!(task_id = %accepted.task_id, "Remote registry accepted task");
        Ok(accepted)
    }
}

#[async_trait]
impl StatusSource for RemoteRegistry {
    async fn lookup(&self, task_id: Uuid) -> Result<TaskRecord, LookupError> {
        let url = format!("{}/{}", self.tasks_url(), task_id);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(LookupError::NotFound(task_id)),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(LookupError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
