use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use crate::outcome::{IterationOutcome, RequestResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: Arc<str>,
    pub passed: bool,
}

pub type RequestPredicate = Arc<dyn Fn(&RequestResult) -> bool + Send + Sync>;
pub type IterationPredicate = Arc<dyn Fn(&IterationOutcome) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum Predicate {
    /// Evaluated once per request of the iteration.
    Request(RequestPredicate),
    /// Evaluated once per iteration.
    Iteration(IterationPredicate),
}

/// Declarative request checks, as written in config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckRule {
    Status(u16),
    StatusIn(Vec<u16>),
    NoError,
    MaxLatency(Duration),
}

impl CheckRule {
    pub fn matches(&self, req: &RequestResult) -> bool {
        match self {
            Self::Status(code) => req.status == Some(*code),
            Self::StatusIn(codes) => req.status.is_some_and(|s| codes.contains(&s)),
            Self::NoError => req.error.is_none(),
            Self::MaxLatency(max) => req.error.is_none() && req.latency <= *max,
        }
    }
}

/// Named pass/fail assertion. Failing checks are counted; they never stop the run.
#[derive(Clone)]
pub struct Check {
    name: Arc<str>,
    predicate: Predicate,
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = match self.predicate {
            Predicate::Request(_) => "request",
            Predicate::Iteration(_) => "iteration",
        };
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("scope", &scope)
            .finish()
    }
}

impl Check {
    pub fn request<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&RequestResult) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Predicate::Request(Arc::new(f)),
        }
    }

    pub fn iteration<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&IterationOutcome) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Predicate::Iteration(Arc::new(f)),
        }
    }

    pub fn from_rule(name: impl Into<Arc<str>>, rule: CheckRule) -> Self {
        Self::request(name, move |req| rule.matches(req))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn evaluate_into(&self, outcome: &IterationOutcome, out: &mut Vec<CheckResult>) {
        match &self.predicate {
            Predicate::Request(f) => {
                for req in &outcome.requests {
                    out.push(evaluate(&self.name, f.as_ref(), req));
                }
            }
            Predicate::Iteration(f) => out.push(evaluate(&self.name, f.as_ref(), outcome)),
        }
    }
}

/// Runs one predicate. A panicking predicate counts as a failed check.
pub fn evaluate<T: ?Sized>(
    name: &Arc<str>,
    predicate: &(dyn Fn(&T) -> bool + Send + Sync),
    target: &T,
) -> CheckResult {
    let passed = catch_unwind(AssertUnwindSafe(|| predicate(target))).unwrap_or_default();
    CheckResult {
        name: Arc::clone(name),
        passed,
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckSet {
    checks: Vec<Check>,
}

impl CheckSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter()
    }

    /// Evaluates every check independently against one iteration.
    pub fn evaluate(&self, outcome: &IterationOutcome) -> Vec<CheckResult> {
        let mut out = Vec::with_capacity(self.checks.len() * outcome.requests.len().max(1));
        for check in &self.checks {
            check.evaluate_into(outcome, &mut out);
        }
        out
    }
}

impl FromIterator<Check> for CheckSet {
    fn from_iter<I: IntoIterator<Item = Check>>(iter: I) -> Self {
        Self {
            checks: iter.into_iter().collect(),
        }
    }
}
