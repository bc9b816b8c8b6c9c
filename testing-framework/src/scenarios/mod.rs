//! Ordered scenario pipelines.
//!
//! A suite is a [`Pipeline`]: an optional setup step, an optional hook run
//! before every other step, and the steps themselves. Steps depend on what
//! earlier steps left on the ledger, so they always run in declaration
//! order and share one [`TestEnvironment`].
//!
//! # Example
//!
//! ```rust,ignore
//! use multinode_testing_framework::scenarios::{malicious_client, NoGate, ScenarioExecutor};
//!
//! let pipeline = malicious_client::pipeline();
//! let report = ScenarioExecutor::new(Box::new(NoGate)).execute(&pipeline, &env).await;
//! assert!(report.success);
//! ```

pub mod malicious_client;
pub mod network;

use std::io::Write;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::environment::TestEnvironment;

pub type StepFn = for<'a> fn(&'a TestEnvironment) -> BoxFuture<'a, Result<()>>;

/// One named action of a pipeline.
#[derive(Clone)]
pub struct Step {
    pub name: &'static str,
    /// Shown to the operator before the step runs interactively
    pub prompt: &'static str,
    pub run: StepFn,
}

impl Step {
    pub fn new(name: &'static str, prompt: &'static str, run: StepFn) -> Self {
        Self { name, prompt, run }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

#[derive(Clone)]
pub struct Pipeline {
    pub name: &'static str,
    /// Must succeed for anything else to run
    pub setup: Option<Step>,
    pub before_each: Option<StepFn>,
    pub steps: Vec<Step>,
}

/// Invoked around every step.
#[async_trait]
pub trait StepGate: Send + Sync {
    async fn before_step(&self, step: &Step) -> Result<()>;

    async fn after_step(&self, _step: &Step) {}
}

/// Runs steps back to back.
pub struct NoGate;

#[async_trait]
impl StepGate for NoGate {
    async fn before_step(&self, _step: &Step) -> Result<()> {
        Ok(())
    }
}

/// Shows each step's prompt and waits for the operator to press enter.
pub struct InteractiveGate;

const GREEN: &str = "\x1b[92m";
const RESET: &str = "\x1b[0m";

#[async_trait]
impl StepGate for InteractiveGate {
    async fn before_step(&self, step: &Step) -> Result<()> {
        print!("{}{}{}", GREEN, step.prompt, RESET);
        std::io::stdout().flush()?;
        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(())
    }

    async fn after_step(&self, _step: &Step) {
        println!("{}\n\n", "-".repeat(80));
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub name: String,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs a pipeline step by step
pub struct ScenarioExecutor {
    gate: Box<dyn StepGate>,

    /// Execution log
    log: Vec<String>,
}

impl ScenarioExecutor {
    pub fn new(gate: Box<dyn StepGate>) -> Self {
        Self {
            gate,
            log: Vec::new(),
        }
    }

    /// Run every step of `pipeline` against `env`.
    ///
    /// A failing setup ends the run. A failing step, including a failing
    /// before-each hook, is recorded and the next step still runs.
    pub async fn execute(&mut self, pipeline: &Pipeline, env: &TestEnvironment) -> ExecutionReport {
        self.log.clear();
        self.log(format!("Starting pipeline: {}", pipeline.name));

        let mut outcomes = Vec::new();

        if let Some(setup) = &pipeline.setup {
            let outcome = self.run_step(setup, None, env).await;
            let passed = outcome.passed();
            outcomes.push(outcome);
            if !passed {
                self.log("\n=== Setup failed, aborting ===".to_string());
                return self.report(pipeline, outcomes, true);
            }
        }

        for (idx, step) in pipeline.steps.iter().enumerate() {
            self.log(format!("\n--- Step {}: {} ---", idx + 1, step.name));
            let outcome = self.run_step(step, pipeline.before_each, env).await;
            outcomes.push(outcome);
        }

        self.report(pipeline, outcomes, false)
    }

    async fn run_step(
        &mut self,
        step: &Step,
        before: Option<StepFn>,
        env: &TestEnvironment,
    ) -> StepOutcome {
        let result = async {
            self.gate.before_step(step).await?;
            if let Some(hook) = before {
                hook(env).await?;
            }
            (step.run)(env).await
        }
        .await;
        self.gate.after_step(step).await;

        let error = match result {
            Ok(()) => {
                info!("{}: passed", step.name);
                self.log(format!("{}: passed", step.name));
                None
            }
            Err(e) => {
                error!("{}: {:#}", step.name, e);
                self.log(format!("{}: FAILED: {:#}", step.name, e));
                Some(format!("{:#}", e))
            }
        };

        StepOutcome {
            name: step.name.to_string(),
            error,
        }
    }

    fn report(
        &self,
        pipeline: &Pipeline,
        outcomes: Vec<StepOutcome>,
        aborted: bool,
    ) -> ExecutionReport {
        let success = outcomes.iter().all(StepOutcome::passed);
        ExecutionReport {
            name: pipeline.name.to_string(),
            outcomes,
            success,
            aborted,
            log: self.log.clone(),
        }
    }

    fn log(&mut self, message: String) {
        self.log.push(message);
    }
}

/// Pipeline execution report
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub name: String,
    pub outcomes: Vec<StepOutcome>,
    pub success: bool,
    /// Setup failed and no step ran
    pub aborted: bool,
    pub log: Vec<String>,
}

impl ExecutionReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed())
    }

    /// Turn failed steps into an error naming them.
    pub fn ensure_passed(&self) -> Result<()> {
        let failed: Vec<&str> = self.failures().map(|outcome| outcome.name.as_str()).collect();
        if !failed.is_empty() {
            bail!(
                "{} of {} step(s) of {} failed: {}",
                failed.len(),
                self.outcomes.len(),
                self.name,
                failed.join(", ")
            );
        }
        Ok(())
    }

    /// Print report to stdout
    pub fn print(&self) {
        let failed = self.failures().count();
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  Pipeline Execution Report                                 ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Name: {:<51} ║", self.name);
        println!("║  Steps: {:<50} ║", self.outcomes.len());
        println!("║  Failed: {:<49} ║", failed);
        println!(
            "║  Status: {:<49} ║",
            if self.success { "SUCCESS ✓" } else { "FAILED ✗" }
        );
        println!("╚════════════════════════════════════════════════════════════╝\n");

        for outcome in &self.outcomes {
            match &outcome.error {
                None => println!("  ✓ {}", outcome.name),
                Some(e) => println!("  ✗ {}: {}", outcome.name, e),
            }
        }

        println!("\nExecution Log:");
        println!("═════════════");
        for entry in &self.log {
            println!("{}", entry);
        }
    }
}
