//! Planning session state machine and the `tgt plan` driver.
//!
//! A [`PlanningSession`] is an explicit context object that a driver loop
//! (CLI, HTTP handler, chat front-end) passes around instead of keeping
//! global session state. It moves through:
//!
//! ```text
//!            submit                proceed
//!  Input ───────────▶ Confirm ─────────────▶ Discovery ──┐
//!    ▲                 ▲   │                              │ run_step
//!    │ reset           │   │ proceed                      │
//!    │                 │   ▼                              │
//!    │                 └─ Segmentation ◀──────────────────┘
//!    │                        │ run_step → Confirm
//!    └──────── End ◀──────────┘ proceed (features + segments present)
//! ```
//!
//! Submitting a new request from any state discards earlier results.

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};

use crate::config::Config;
use crate::engine::Engine;
use crate::models::{CampaignRequest, RankedFeatureResult};
use crate::retrieval::print_features;
use crate::segmentation::{print_segments, SegmentationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Waiting for a campaign request.
    Input,
    /// A result (or request summary) is on display; awaiting the next action.
    Confirm,
    /// Feature retrieval is due.
    Discovery,
    /// Segmentation is due.
    Segmentation,
    /// Session closed.
    End,
}

#[derive(Debug, Clone)]
pub struct PlanningSession {
    step: Step,
    request: Option<CampaignRequest>,
    features: Option<Vec<RankedFeatureResult>>,
    segmentation: Option<SegmentationReport>,
}

impl Default for PlanningSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanningSession {
    pub fn new() -> Self {
        Self {
            step: Step::Input,
            request: None,
            features: None,
            segmentation: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn request(&self) -> Option<&CampaignRequest> {
        self.request.as_ref()
    }

    pub fn features(&self) -> Option<&[RankedFeatureResult]> {
        self.features.as_deref()
    }

    pub fn segmentation(&self) -> Option<&SegmentationReport> {
        self.segmentation.as_ref()
    }

    /// Accept a new request, discarding any earlier results.
    pub fn submit(&mut self, request: CampaignRequest) {
        self.request = Some(request);
        self.features = None;
        self.segmentation = None;
        self.step = Step::Confirm;
    }

    /// The step [`proceed`](Self::proceed) would move to.
    pub fn next_action(&self) -> Step {
        match (&self.features, &self.segmentation) {
            (None, _) => Step::Discovery,
            (Some(_), None) => Step::Segmentation,
            (Some(_), Some(_)) => Step::End,
        }
    }

    /// Advance from `Confirm` to the next pending action.
    pub fn proceed(&mut self) -> Result<Step> {
        if self.step != Step::Confirm {
            bail!("cannot proceed from {:?}; expected Confirm", self.step);
        }
        self.step = self.next_action();
        Ok(self.step)
    }

    /// Execute the pending `Discovery` or `Segmentation` step, then return
    /// to `Confirm`.
    pub async fn run_step(&mut self, engine: &Engine, today: NaiveDate) -> Result<()> {
        let Some(request) = self.request.as_ref() else {
            bail!("no campaign request submitted");
        };

        match self.step {
            Step::Discovery => {
                let ranked = engine.rank(request).await?;
                self.features = Some(ranked);
            }
            Step::Segmentation => {
                let ranked = self.features.as_deref().unwrap_or_default();
                let report = engine
                    .segmenter()
                    .process_segmentation_at(request, ranked, today)
                    .await;
                self.segmentation = Some(report);
            }
            other => bail!("nothing to run in {:?}", other),
        }

        self.step = Step::Confirm;
        Ok(())
    }

    /// Clear everything and wait for a new request.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn finish(&mut self) {
        self.step = Step::End;
    }

    /// Human-readable campaign requirements, shown at `Confirm` after submit.
    pub fn summary(&self, today: NaiveDate) -> Option<String> {
        let request = self.request.as_ref()?;
        let metric = if request.metric_defaulted() {
            format!("{} (default, none given)", request.metric())
        } else {
            request.metric().to_string()
        };
        Some(format!(
            "schedule:   {}\nproduct:    {}\nfrequency:  {}\naudience:   {}\nmetric:     {}",
            request.window(today),
            request.product(),
            request.frequency(),
            request.target_count(),
            metric
        ))
    }
}

/// Drive a session end to end for one request (`tgt plan`).
pub async fn run_plan(config: &Config, request: CampaignRequest, json: bool) -> Result<()> {
    let engine = Engine::bootstrap(config).await?;
    let today = Local::now().date_naive();

    let mut session = PlanningSession::new();
    session.submit(request);

    if !json {
        if let Some(summary) = session.summary(today) {
            println!("{}\n", summary);
        }
    }

    while session.proceed()? != Step::End {
        session.run_step(&engine, today).await?;
    }

    let features = session.features().unwrap_or_default();
    let Some(report) = session.segmentation() else {
        bail!("session ended without segmentation");
    };

    if json {
        let out = serde_json::json!({
            "features": features
                .iter()
                .map(crate::models::FeatureRow::from)
                .collect::<Vec<_>>(),
            "segmentation": report,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_features(features);
        println!();
        print_segments(report);
    }

    Ok(())
}
