//! Step Flow Controller
//!
//! Linear checkout steps with unrestricted back navigation:
//!
//! ```text
//! ┌──────────┐     ┌──────────┐     ┌──────────┐
//! │ shipping │────▶│  addons  │────▶│ payment  │
//! └──────────┘◀────└──────────┘◀────└──────────┘
//! ```
//!
//! The controller itself accepts any valid step; only the UI limits forward
//! moves to the next neighbour. Every transition is timed from the previous
//! transition and reported to the analytics sink, and the `step` query
//! parameter is rewritten with history-replace semantics.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::{AnalyticsSink, CheckoutEvent};
use crate::error::{CheckoutError, Result};
use crate::model::DealId;

/// Checkout step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Shipping,
    Addons,
    Payment,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Shipping, Step::Addons, Step::Payment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Addons => "addons",
            Self::Payment => "payment",
        }
    }

    /// Step exposed by the "continue" action
    pub fn next(&self) -> Option<Step> {
        match self {
            Self::Shipping => Some(Self::Addons),
            Self::Addons => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    /// Step exposed by the "back" action
    pub fn previous(&self) -> Option<Step> {
        match self {
            Self::Shipping => None,
            Self::Addons => Some(Self::Shipping),
            Self::Payment => Some(Self::Addons),
        }
    }

    /// Initial step from the `step` query parameter
    pub fn from_query(value: Option<&str>) -> Step {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Step {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "shipping" => Ok(Self::Shipping),
            "addons" => Ok(Self::Addons),
            "payment" => Ok(Self::Payment),
            _ => Err(CheckoutError::UnknownStep(s.to_string())),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Wall-clock source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the current step is reflected (the page URL)
pub trait StepLocation: Send + Sync {
    /// Rewrite the step in place; never adds a history entry
    fn replace_step(&mut self, step: Step);
}

/// Query string holder that rewrites only its `step` pair
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryStepLocation {
    pairs: Vec<(String, String)>,
}

impl QueryStepLocation {
    /// Parse `a=1&step=addons`; a leading `?` is ignored
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();
        Self { pairs }
    }

    pub fn step_param(&self) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == "step")
            .map(|(_, v)| v.as_str())
    }

    pub fn query(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl StepLocation for QueryStepLocation {
    fn replace_step(&mut self, step: Step) {
        match self.pairs.iter_mut().find(|(k, _)| k == "step") {
            Some((_, value)) => *value = step.as_str().to_string(),
            None => self.pairs.push(("step".into(), step.as_str().to_string())),
        }
    }
}

/// Record of one completed transition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTransition {
    pub from_step: Step,
    pub to_step: Step,
    pub time_spent_ms: i64,
}

/// Step state machine for one checkout session
pub struct StepFlowController<L: StepLocation> {
    deal_id: DealId,
    current: Step,
    entered_at: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    analytics: Arc<dyn AnalyticsSink>,
    location: L,
}

impl<L: StepLocation + std::fmt::Debug> std::fmt::Debug for StepFlowController<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepFlowController")
            .field("deal_id", &self.deal_id)
            .field("current", &self.current)
            .field("entered_at", &self.entered_at)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl StepFlowController<QueryStepLocation> {
    /// Mount from a page query string; the initial step comes from `step`
    pub fn from_query(
        deal_id: DealId,
        query: &str,
        clock: Arc<dyn Clock>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        let location = QueryStepLocation::parse(query);
        let initial = Step::from_query(location.step_param());
        Self::mount(deal_id, initial, clock, analytics, location)
    }
}

impl<L: StepLocation> StepFlowController<L> {
    pub fn mount(
        deal_id: DealId,
        initial: Step,
        clock: Arc<dyn Clock>,
        analytics: Arc<dyn AnalyticsSink>,
        mut location: L,
    ) -> Self {
        location.replace_step(initial);
        let entered_at = clock.now();
        Self {
            deal_id,
            current: initial,
            entered_at,
            clock,
            analytics,
            location,
        }
    }

    pub fn current(&self) -> Step {
        self.current
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    /// Milliseconds spent in the current step so far
    pub fn time_in_step_ms(&self) -> i64 {
        (self.clock.now() - self.entered_at).num_milliseconds().max(0)
    }

    /// Move to a named step; unknown names leave the state unchanged
    pub fn go_to_step(&mut self, next: &str) -> Result<StepTransition> {
        let next = next.parse::<Step>()?;
        Ok(self.transition(next))
    }

    /// Move to `next`, report the time spent, rewrite the URL
    pub fn transition(&mut self, next: Step) -> StepTransition {
        let now = self.clock.now();
        let record = StepTransition {
            from_step: self.current,
            to_step: next,
            time_spent_ms: (now - self.entered_at).num_milliseconds().max(0),
        };

        self.analytics.capture(CheckoutEvent::StepTransition {
            deal_id: self.deal_id.clone(),
            from_step: record.from_step,
            to_step: record.to_step,
            time_spent_ms: record.time_spent_ms,
        });

        tracing::debug!(
            deal_id = %self.deal_id,
            from = %record.from_step,
            to = %record.to_step,
            time_spent_ms = record.time_spent_ms,
            "Checkout step transition"
        );

        self.current = next;
        self.entered_at = now;
        self.location.replace_step(next);
        record
    }

    pub fn advance(&mut self) -> Option<StepTransition> {
        self.current.next().map(|next| self.transition(next))
    }

    pub fn back(&mut self) -> Option<StepTransition> {
        self.current.previous().map(|previous| self.transition(previous))
    }

    /// Unload beacon: report time spent in the current step
    pub fn drop_off(&self) {
        self.analytics.capture(CheckoutEvent::DropOff {
            deal_id: self.deal_id.clone(),
            step: self.current,
            time_spent_ms: self.time_in_step_ms(),
        });
    }
}
