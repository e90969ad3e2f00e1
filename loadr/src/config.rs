//! YAML test files.
//!
//! ```yaml
//! vus: 50
//! duration: 30s
//! scenario:
//!   requests:
//!     - { method: GET, url: "http://localhost:3000/", timeout: 10s }
//!   thinkTime: 1s
//! checks:
//!   "status was 200": { status: 200 }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use bytes::Bytes;
use loadr_core::http::{HttpClient, HttpRequest};
use loadr_core::{
    Check, CheckRule, CheckSet, HttpScenario, ProfileOptions, RequestStep, RunConfig, Scenario as _,
    Stage, TestPlan, ThinkTime, profile_from_options,
};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct TestFile {
    #[serde(default)]
    pub vus: Option<u64>,
    #[serde(default)]
    pub duration: Option<YamlDuration>,
    #[serde(default)]
    pub stages: Option<Vec<StageYaml>>,

    #[serde(default)]
    pub tick: Option<YamlDuration>,
    #[serde(default)]
    pub grace_period: Option<YamlDuration>,

    #[serde(default)]
    pub scenario: ScenarioYaml,

    #[serde(default)]
    pub checks: BTreeMap<String, CheckYaml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ScenarioYaml {
    #[serde(default)]
    pub requests: Vec<RequestYaml>,
    #[serde(default)]
    pub think_time: Option<ThinkTimeYaml>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct RequestYaml {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    pub url: String,
    #[serde(default)]
    pub timeout: Option<YamlDuration>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub duration: YamlDuration,
    pub target: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThinkTimeYaml {
    Fixed(YamlDuration),
    Range { min: YamlDuration, max: YamlDuration },
}

/// Exactly one field must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub(crate) struct CheckYaml {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub status_in: Option<Vec<u16>>,
    #[serde(default)]
    pub no_error: Option<bool>,
    #[serde(default)]
    pub max_latency: Option<YamlDuration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s, 1m30s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|v| YamlDuration(Duration::from_secs(v)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Duration::try_from_secs_f64(v)
                    .map(YamlDuration)
                    .map_err(|_| E::custom("duration must be a non-negative, finite number"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                humantime::parse_duration(v.trim())
                    .map(YamlDuration)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_any(V)
    }
}

/// Everything needed to start a run.
#[derive(Debug)]
pub(crate) struct LoadTest {
    pub plan: TestPlan,
    pub scenario: HttpScenario,
    pub checks: CheckSet,
}

pub(crate) async fn load(path: &Path) -> anyhow::Result<TestFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read test file: {}", path.display()))?;
    parse(&bytes).with_context(|| format!("failed to parse YAML: {}", path.display()))
}

pub(crate) fn parse(bytes: &[u8]) -> anyhow::Result<TestFile> {
    Ok(serde_yaml::from_slice(bytes)?)
}

impl TestFile {
    /// Applies CLI overrides and validates the result.
    ///
    /// `url` replaces the target of every request; with no requests in the file it
    /// becomes a single `GET`.
    pub(crate) fn into_load_test(
        self,
        cfg: RunConfig,
        url: Option<&str>,
    ) -> anyhow::Result<LoadTest> {
        let opts = ProfileOptions {
            vus: self.vus,
            duration: self.duration.map(YamlDuration::into_inner),
            stages: self.stages.map(|stages| {
                stages
                    .into_iter()
                    .map(|s| Stage::new(s.duration.into_inner(), s.target))
                    .collect()
            }),
        };
        let profile = profile_from_options(opts, cfg).context("invalid traffic profile")?;

        let mut plan = TestPlan::new(profile);
        if let Some(tick) = self.tick {
            plan = plan.with_tick(tick.into_inner());
        }
        if let Some(grace) = self.grace_period {
            plan = plan.with_grace_period(grace.into_inner());
        }
        plan.validate().context("invalid test plan")?;

        let mut requests = self.scenario.requests;
        if let Some(url) = url {
            if requests.is_empty() {
                requests.push(RequestYaml {
                    name: None,
                    method: None,
                    url: url.to_string(),
                    timeout: None,
                    headers: BTreeMap::new(),
                    body: None,
                });
            }
            for r in &mut requests {
                r.url = url.to_string();
            }
        }

        let steps = requests
            .into_iter()
            .map(request_step)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let think_time = match self.scenario.think_time {
            None => ThinkTime::None,
            Some(ThinkTimeYaml::Fixed(d)) => ThinkTime::Fixed(d.into_inner()),
            Some(ThinkTimeYaml::Range { min, max }) => ThinkTime::Uniform {
                min: min.into_inner(),
                max: max.into_inner(),
            },
        };

        let scenario = HttpScenario::new(HttpClient::default(), steps).with_think_time(think_time);
        scenario.validate().context("invalid scenario")?;

        let checks = self
            .checks
            .into_iter()
            .map(|(name, c)| {
                let rule = c
                    .into_rule()
                    .with_context(|| format!("invalid check `{name}`"))?;
                Ok::<_, anyhow::Error>(Check::from_rule(name, rule))
            })
            .collect::<anyhow::Result<CheckSet>>()?;

        Ok(LoadTest {
            plan,
            scenario,
            checks,
        })
    }
}

fn request_step(r: RequestYaml) -> anyhow::Result<RequestStep> {
    let method = r.method.as_deref().unwrap_or("GET").to_ascii_uppercase();
    let method = http::Method::from_bytes(method.as_bytes())
        .with_context(|| format!("invalid HTTP method: {method}"))?;

    let mut request = HttpRequest::new(method, r.url);
    if let Some(timeout) = r.timeout {
        request = request.with_timeout(timeout.into_inner());
    }
    for (k, v) in r.headers {
        request = request.with_header(k, v);
    }
    if let Some(body) = r.body {
        request.body = Bytes::from(body);
    }

    let step = RequestStep::new(request);
    Ok(match r.name {
        Some(name) => step.with_name(name),
        None => step,
    })
}

impl CheckYaml {
    fn into_rule(self) -> anyhow::Result<CheckRule> {
        let mut rules = Vec::with_capacity(1);
        if let Some(code) = self.status {
            rules.push(CheckRule::Status(code));
        }
        if let Some(codes) = self.status_in {
            anyhow::ensure!(!codes.is_empty(), "`status_in` must not be empty");
            rules.push(CheckRule::StatusIn(codes));
        }
        match self.no_error {
            Some(true) => rules.push(CheckRule::NoError),
            Some(false) => anyhow::bail!("`no_error` only accepts `true`"),
            None => {}
        }
        if let Some(max) = self.max_latency {
            rules.push(CheckRule::MaxLatency(max.into_inner()));
        }

        match rules.len() {
            1 => Ok(rules.remove(0)),
            0 => anyhow::bail!(
                "expected one of `status`, `status_in`, `no_error`, `max_latency`"
            ),
            _ => anyhow::bail!("a check takes exactly one rule"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadr_core::{ConfigError, TrafficProfile};

    fn parse_ok(yaml: &str) -> TestFile {
        match parse(yaml.as_bytes()) {
            Ok(v) => v,
            Err(err) => panic!("parse failed: {err:#}"),
        }
    }

    fn load_ok(yaml: &str, cfg: RunConfig, url: Option<&str>) -> LoadTest {
        match parse_ok(yaml).into_load_test(cfg, url) {
            Ok(v) => v,
            Err(err) => panic!("into_load_test failed: {err:#}"),
        }
    }

    fn config_error(err: &anyhow::Error) -> Option<&ConfigError> {
        err.chain().find_map(|e| e.downcast_ref::<ConfigError>())
    }

    const SMOKE: &str = r#"
vus: 1
duration: 10s
scenario:
  requests:
    - url: "http://localhost:3000/"
  thinkTime: 1s
checks:
  "status was 200": { status: 200 }
"#;

    #[test]
    fn flat_file_becomes_flat_plan() {
        let t = load_ok(SMOKE, RunConfig::default(), None);
        assert_eq!(
            t.plan.profile,
            TrafficProfile::flat(1, Duration::from_secs(10))
        );
        assert_eq!(t.scenario.steps().len(), 1);
        assert_eq!(t.checks.len(), 1);
    }

    #[test]
    fn stages_and_optional_timings_are_parsed() {
        let yaml = r#"
stages:
  - { duration: 30s, target: 20 }
  - { duration: 1m, target: 50 }
  - { duration: 30, target: 100 }
  - { duration: 1.5, target: 0 }
tick: 250ms
gracePeriod: 5s
scenario:
  requests:
    - { method: post, url: "http://localhost:3000/echo", body: "hi", headers: { x-test: "1" } }
  thinkTime: { min: 500ms, max: 1500ms }
"#;
        let t = load_ok(yaml, RunConfig::default(), None);
        assert_eq!(
            t.plan.profile,
            TrafficProfile::staged(vec![
                Stage::new(Duration::from_secs(30), 20),
                Stage::new(Duration::from_secs(60), 50),
                Stage::new(Duration::from_secs(30), 100),
                Stage::new(Duration::from_millis(1500), 0),
            ])
        );
        assert_eq!(t.plan.tick, Duration::from_millis(250));
        assert_eq!(t.plan.grace_period, Duration::from_secs(5));

        let req = &t.scenario.steps()[0].request;
        assert_eq!(req.method, http::Method::POST);
        assert_eq!(&req.body[..], b"hi");
        assert_eq!(req.headers, vec![("x-test".to_string(), "1".to_string())]);
    }

    #[test]
    fn cli_overrides_force_a_flat_profile_and_replace_urls() {
        let yaml = r#"
stages: [{ duration: 10s, target: 5 }]
scenario:
  requests:
    - url: "http://a.invalid/"
    - url: "http://b.invalid/"
"#;
        let cfg = RunConfig {
            vus: Some(3),
            duration: Some(Duration::from_secs(2)),
        };
        let t = load_ok(yaml, cfg, Some("http://127.0.0.1:1/"));
        assert_eq!(t.plan.profile, TrafficProfile::flat(3, Duration::from_secs(2)));
        assert!(
            t.scenario
                .steps()
                .iter()
                .all(|s| s.request.url == "http://127.0.0.1:1/")
        );
    }

    #[test]
    fn url_override_fills_an_empty_scenario() {
        let t = load_ok("vus: 2\nduration: 1s\n", RunConfig::default(), Some("http://x.invalid/"));
        assert_eq!(t.scenario.steps().len(), 1);
        assert_eq!(t.scenario.steps()[0].request.method, http::Method::GET);
    }

    #[test]
    fn ambiguous_and_missing_profiles_are_rejected() {
        let ambiguous = "vus: 1\nduration: 1s\nstages: [{ duration: 1s, target: 1 }]\nscenario: { requests: [{ url: \"http://x/\" }] }\n";
        let err = match parse_ok(ambiguous).into_load_test(RunConfig::default(), None) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert_eq!(config_error(&err), Some(&ConfigError::AmbiguousProfile));

        let missing = "scenario: { requests: [{ url: \"http://x/\" }] }\n";
        let err = match parse_ok(missing).into_load_test(RunConfig::default(), None) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert_eq!(config_error(&err), Some(&ConfigError::MissingProfile));
    }

    #[test]
    fn bad_requests_are_rejected_before_running() {
        let empty = "vus: 1\nduration: 1s\n";
        let err = match parse_ok(empty).into_load_test(RunConfig::default(), None) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert_eq!(config_error(&err), Some(&ConfigError::EmptyScenario));

        let ftp = "vus: 1\nduration: 1s\nscenario: { requests: [{ url: \"ftp://x/\" }] }\n";
        let err = match parse_ok(ftp).into_load_test(RunConfig::default(), None) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(
            config_error(&err),
            Some(ConfigError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn durations_reject_garbage_and_negatives() {
        assert!(parse(b"duration: -1\n").is_err());
        assert!(parse(b"duration: 10x\n").is_err());
        assert!(parse(b"duration: -0.5\n").is_err());
        assert!(parse(b"durations: 10s\n").is_err());
    }

    #[test]
    fn checks_take_exactly_one_rule() {
        let rule = |yaml: &str| match serde_yaml::from_str::<CheckYaml>(yaml) {
            Ok(c) => c.into_rule(),
            Err(err) => panic!("parse failed: {err}"),
        };

        assert_eq!(
            rule("{ status_in: [200, 204] }").ok(),
            Some(CheckRule::StatusIn(vec![200, 204]))
        );
        assert_eq!(rule("{ no_error: true }").ok(), Some(CheckRule::NoError));
        assert_eq!(
            rule("{ max_latency: 250ms }").ok(),
            Some(CheckRule::MaxLatency(Duration::from_millis(250)))
        );
        assert!(rule("{}").is_err());
        assert!(rule("{ status: 200, no_error: true }").is_err());
        assert!(rule("{ no_error: false }").is_err());
    }
}
