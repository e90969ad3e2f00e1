use std::future::Future;
use std::sync::Arc;

use loadr_http::{HttpClient, HttpRequest};
use tokio::time::Instant;

use crate::error::ConfigError;
use crate::outcome::{ErrorKind, IterationOutcome, RequestResult};
use crate::scenario::{IterationContext, Scenario, ThinkTime};

/// One request of an [`HttpScenario`] iteration.
#[derive(Debug, Clone)]
pub struct RequestStep {
    pub name: Option<Arc<str>>,
    pub request: HttpRequest,
}

impl RequestStep {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            name: None,
            request,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => format!("{} {}", self.request.method, self.request.url),
        }
    }
}

/// Issues its requests in order on every iteration.
///
/// A failed request does not end the iteration; later steps still run.
#[derive(Debug, Clone)]
pub struct HttpScenario {
    client: HttpClient,
    steps: Vec<RequestStep>,
    think_time: ThinkTime,
}

impl HttpScenario {
    pub fn new(client: HttpClient, steps: Vec<RequestStep>) -> Self {
        Self {
            client,
            steps,
            think_time: ThinkTime::None,
        }
    }

    pub fn get(client: HttpClient, url: impl Into<String>) -> Self {
        Self::new(client, vec![RequestStep::new(HttpRequest::get(url))])
    }

    #[must_use]
    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn steps(&self) -> &[RequestStep] {
        &self.steps
    }

    async fn run_step(&self, step: &RequestStep) -> RequestResult {
        let started = Instant::now();
        let mut result = match self.client.request(step.request.clone()).await {
            Ok(res) => RequestResult::ok(res.status, started.elapsed()),
            Err(err) => {
                tracing::trace!(url = %step.request.url, error = %err, "request failed");
                RequestResult::failed(ErrorKind::from(err.transport_error_kind()), started.elapsed())
            }
        };
        result.name = step.name.clone();
        result
    }
}

impl Scenario for HttpScenario {
    fn run(&self, _ctx: &IterationContext) -> impl Future<Output = IterationOutcome> + Send {
        async move {
            let started = Instant::now();
            let mut requests = Vec::with_capacity(self.steps.len());
            for step in &self.steps {
                requests.push(self.run_step(step).await);
            }
            IterationOutcome::from_requests(requests, started.elapsed())
        }
    }

    fn think_time(&self) -> ThinkTime {
        self.think_time
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::EmptyScenario);
        }
        for step in &self.steps {
            step.request
                .validate()
                .map_err(|err| ConfigError::InvalidRequest {
                    name: step.label(),
                    reason: err.to_string(),
                })?;
        }
        self.think_time.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_and_malformed_scenarios() {
        let empty = HttpScenario::new(HttpClient::default(), vec![]);
        assert_eq!(empty.validate(), Err(ConfigError::EmptyScenario));

        let bad = HttpScenario::get(HttpClient::default(), "ftp://example.com/");
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidRequest { name, .. }) if name == "GET ftp://example.com/"
        ));

        let ok = HttpScenario::get(HttpClient::default(), "http://localhost:3000/");
        assert_eq!(ok.validate(), Ok(()));
    }
}
