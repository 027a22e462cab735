//! JSON plan files.
//!
//! A plan describes an optional countdown, a set of timed events and a set
//! of independent tasks. Durations are signed milliseconds so that bad input
//! is reported as a configuration error rather than a parse error.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tempo_core::{
    non_negative_millis, Action, ActionError, EngineError, Milestone, TaskError, TimedEvent,
};
use tempo_execution::{Countdown, CountdownBuilder, EngineConfig, NamedTask};

/// A complete plan.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default)]
    pub countdown: Option<CountdownPlan>,
    #[serde(default)]
    pub events: Vec<EventPlan>,
    #[serde(default)]
    pub tasks: Vec<TaskPlan>,
    /// Deadline applied to each dispatch
    #[serde(default)]
    pub timeout_ms: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CountdownPlan {
    pub start: i64,
    pub tick_ms: i64,
    #[serde(default)]
    pub milestones: Vec<MilestonePlan>,
    #[serde(default)]
    pub unique_triggers: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MilestonePlan {
    pub at: i64,
    pub label: String,
    /// Make the milestone's action fail with this message
    #[serde(default)]
    pub fail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventPlan {
    pub label: String,
    pub delay_ms: i64,
    #[serde(default)]
    pub fail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskPlan {
    pub label: String,
    pub steps: Vec<StepPlan>,
}

/// One step of a plan task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPlan {
    /// Print a line
    Say(String),
    /// Cancellable wait
    WaitMs(i64),
    /// Fail the task
    Fail(String),
}

/// Step after validation.
#[derive(Debug, Clone)]
enum Step {
    Say(String),
    Wait(Duration),
    Fail(String),
}

impl Plan {
    /// Parse a plan from JSON text.
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Invalid plan JSON")
    }

    /// Read and parse a plan file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan {}", path.display()))?;
        Self::parse(&text)
    }

    /// Engine configuration derived from the plan.
    pub fn config(&self) -> Result<EngineConfig, EngineError> {
        let mut config = EngineConfig::new();
        if let Some(timeout) = self.timeout_ms {
            config = config.with_deadline(non_negative_millis("timeout", timeout)?);
        }
        Ok(config)
    }

    /// Countdown builder, if the plan has a countdown.
    pub fn countdown(&self) -> Result<Option<CountdownBuilder>, EngineError> {
        let Some(plan) = &self.countdown else {
            return Ok(None);
        };

        let start = u64::try_from(plan.start).map_err(|_| {
            EngineError::InvalidConfiguration(format!(
                "countdown start must not be negative (got {})",
                plan.start
            ))
        })?;
        let tick = non_negative_millis("tick interval", plan.tick_ms)?;

        let mut config = self.config()?;
        config.unique_triggers = plan.unique_triggers;

        let mut builder = Countdown::builder(start, tick).config(config);
        for milestone in &plan.milestones {
            let at = u64::try_from(milestone.at).map_err(|_| {
                EngineError::InvalidConfiguration(format!(
                    "milestone '{}' triggers at negative value {}",
                    milestone.label, milestone.at
                ))
            })?;
            builder = builder.milestone(Milestone::new(
                at,
                milestone.label.clone(),
                failing_or_noop(milestone.fail.clone()),
            ));
        }
        Ok(Some(builder))
    }

    /// Timed events of the plan.
    pub fn events(&self) -> Result<Vec<TimedEvent>, EngineError> {
        self.events
            .iter()
            .map(|event| {
                TimedEvent::from_millis(
                    event.label.clone(),
                    event.delay_ms,
                    failing_or_noop(event.fail.clone()),
                )
            })
            .collect()
    }

    /// Independent tasks of the plan; `say` renders `Say` steps.
    pub fn tasks<S>(&self, say: S) -> Result<Vec<NamedTask>, EngineError>
    where
        S: Fn(&str, &str) + Clone + Send + Sync + 'static,
    {
        self.tasks
            .iter()
            .map(|task| {
                let steps = task
                    .steps
                    .iter()
                    .map(|step| match step {
                        StepPlan::Say(line) => Ok(Step::Say(line.clone())),
                        StepPlan::WaitMs(ms) => Ok(Step::Wait(non_negative_millis(
                            &format!("wait in task '{}'", task.label),
                            *ms,
                        )?)),
                        StepPlan::Fail(message) => Ok(Step::Fail(message.clone())),
                    })
                    .collect::<Result<Vec<_>, EngineError>>()?;

                let say = say.clone();
                Ok(NamedTask::from_fn(task.label.clone(), move |ctx| {
                    let steps = steps.clone();
                    let say = say.clone();
                    async move {
                        for step in steps {
                            match step {
                                Step::Say(line) => say(ctx.label(), &line),
                                Step::Wait(duration) => ctx.wait(duration).await?,
                                Step::Fail(message) => {
                                    return Err(TaskError::Failed(ActionError::new(message)))
                                }
                            }
                        }
                        Ok::<(), TaskError>(())
                    }
                }))
            })
            .collect()
    }
}

fn failing_or_noop(fail: Option<String>) -> Action {
    match fail {
        Some(message) => Action::new(move || Err(ActionError::new(message.clone()))),
        None => Action::noop(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempo_execution::{TaskGroup, VirtualClock};

    const COFFEE_PLAN: &str = r#"{
        "countdown": {
            "start": 3,
            "tick_ms": 0,
            "milestones": [{ "at": 2, "label": "Adding coffee" }],
            "unique_triggers": true
        },
        "events": [
            { "label": "Heating water", "delay_ms": 20 },
            { "label": "Broken grinder", "delay_ms": 10, "fail": "jammed" }
        ],
        "tasks": [
            { "label": "Customer 1", "steps": [
                { "say": "Ordering Espresso..." },
                { "wait_ms": 0 },
                { "say": "Espresso ready!" }
            ] }
        ],
        "timeout_ms": 5000
    }"#;

    #[test]
    fn test_parse_full_plan() {
        let plan = Plan::parse(COFFEE_PLAN).unwrap();
        assert_eq!(plan.events.len(), 2);
        assert_eq!(plan.tasks[0].steps[1], StepPlan::WaitMs(0));
        assert_eq!(plan.config().unwrap().deadline, Some(Duration::from_secs(5)));

        let countdown = plan.countdown().unwrap().unwrap().build().unwrap();
        assert_eq!(countdown.start_value(), 3);
        assert_eq!(countdown.milestones()[0].label(), "Adding coffee");

        let events = plan.events().unwrap();
        assert_eq!(events[1].delay(), Duration::from_millis(10));
        assert!(events[1].fire().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Plan::parse(r#"{ "evnts": [] }"#).is_err());
    }

    #[test]
    fn test_negative_values_are_invalid_configuration() {
        let plan = Plan::parse(r#"{ "countdown": { "start": -1, "tick_ms": 10 } }"#).unwrap();
        assert!(matches!(
            plan.countdown(),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let plan = Plan::parse(r#"{ "events": [{ "label": "x", "delay_ms": -5 }] }"#).unwrap();
        assert!(matches!(
            plan.events(),
            Err(EngineError::InvalidConfiguration(_))
        ));

        let plan = Plan::parse(r#"{ "timeout_ms": -1 }"#).unwrap();
        assert!(plan.config().is_err());

        let plan = Plan::parse(
            r#"{ "tasks": [{ "label": "t", "steps": [{ "wait_ms": -3 }] }] }"#,
        )
        .unwrap();
        assert!(plan.tasks(|_: &str, _: &str| {}).is_err());
    }

    #[test]
    fn test_duplicate_triggers_rejected_when_unique() {
        let plan = Plan::parse(
            r#"{ "countdown": { "start": 5, "tick_ms": 0, "unique_triggers": true,
                 "milestones": [{ "at": 1, "label": "a" }, { "at": 1, "label": "b" }] } }"#,
        )
        .unwrap();
        let builder = plan.countdown().unwrap().unwrap();
        assert!(matches!(
            builder.build(),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(COFFEE_PLAN.as_bytes()).unwrap();

        let plan = Plan::load(file.path()).unwrap();
        assert!(plan.countdown.is_some());
        assert!(Plan::load(Path::new("/definitely/not/here.json")).is_err());
    }

    #[tokio::test]
    async fn test_plan_tasks_run_steps() {
        let plan = Plan::parse(COFFEE_PLAN).unwrap();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let tasks = plan
            .tasks(move |who: &str, line: &str| {
                sink.lock().unwrap().push(format!("{}: {}", who, line))
            })
            .unwrap();

        let report = TaskGroup::new(tasks)
            .unwrap()
            .with_clock(Arc::new(VirtualClock::new()))
            .run_independent()
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(
            *lines.lock().unwrap(),
            vec![
                "Customer 1: Ordering Espresso...",
                "Customer 1: Espresso ready!"
            ]
        );
    }

    #[tokio::test]
    async fn test_plan_task_failure_step() {
        let plan = Plan::parse(
            r#"{ "tasks": [{ "label": "t", "steps": [
                { "fail": "no milk" },
                { "say": "unreachable" }
            ] }] }"#,
        )
        .unwrap();
        let report = TaskGroup::new(plan.tasks(|_: &str, _: &str| {}).unwrap())
            .unwrap()
            .run_independent()
            .await
            .unwrap();
        assert_eq!(report.failed()[0].1.message, "no milk");
    }
}
