// crates/stagecli/src/plan.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stagecore::{GraphError, TaskError};
use stageruntime::{RuntimeConfig, TaskBody, TaskGraph, TaskId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A plan file: named tasks with dependencies and a built-in action each
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<RuntimeConfig>,
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub action: Action,
}

/// Built-in task actions; results are JSON values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Return a constant
    Value { value: Value },
    /// Read a key from the plan inputs
    Input { key: String },
    /// Sleep, then return `value` or the dependency results. Fails when
    /// `timeout_ms` is shorter than the sleep.
    Delay {
        ms: u64,
        #[serde(default)]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Parse a string input as JSON
    Parse { key: String },
    /// Add up numeric dependency results
    Sum,
    /// Array of dependency results in declared order
    Collect,
    Fail { message: String },
}

/// Shared context of a plan run
#[derive(Debug, Default)]
pub struct PlanContext {
    pub inputs: Map<String, Value>,
}

struct ActionTask(Action);

#[async_trait]
impl TaskBody<PlanContext, Value> for ActionTask {
    async fn run(&self, ctx: Arc<PlanContext>, dependencies: Vec<Arc<Value>>) -> Result<Value, TaskError> {
        match &self.0 {
            Action::Value { value } => Ok(value.clone()),
            Action::Input { key } => ctx
                .inputs
                .get(key)
                .cloned()
                .ok_or_else(|| TaskError::InvalidInput(format!("missing input '{}'", key))),
            Action::Delay { ms, value, timeout_ms } => {
                let nap = sleep(Duration::from_millis(*ms));
                match timeout_ms {
                    Some(millis) => timeout(Duration::from_millis(*millis), nap)
                        .await
                        .map_err(|_| TaskError::Timeout { millis: *millis })?,
                    None => nap.await,
                }
                Ok(match value {
                    Some(value) => value.clone(),
                    None => collect(&dependencies),
                })
            }
            Action::Parse { key } => {
                let text = ctx
                    .inputs
                    .get(key)
                    .and_then(Value::as_str)
                    .ok_or_else(|| TaskError::InvalidInput(format!("input '{}' is not a string", key)))?;
                serde_json::from_str(text).map_err(TaskError::custom)
            }
            Action::Sum => {
                let mut total = 0.0;
                for (index, dependency) in dependencies.iter().enumerate() {
                    total += dependency.as_f64().ok_or_else(|| {
                        TaskError::InvalidInput(format!("dependency {} is not a number: {}", index, dependency))
                    })?;
                }
                Ok(Value::from(total))
            }
            Action::Collect => Ok(collect(&dependencies)),
            Action::Fail { message } => Err(TaskError::ExecutionFailed(message.clone())),
        }
    }
}

fn collect(dependencies: &[Arc<Value>]) -> Value {
    Value::Array(dependencies.iter().map(|d| d.as_ref().clone()).collect())
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Build the task graph. Dependencies may refer to tasks declared later.
    pub fn build(&self) -> Result<TaskGraph<PlanContext, Value>, PlanError> {
        let edges: usize = self.tasks.iter().map(|task| task.depends_on.len()).sum();
        let mut graph = TaskGraph::with_capacity(self.tasks.len(), edges);
        let mut ids: HashMap<&str, TaskId> = HashMap::new();

        for task_spec in &self.tasks {
            if ids.contains_key(task_spec.name.as_str()) {
                return Err(PlanError::DuplicateTask(task_spec.name.clone()));
            }
            let id = graph.add_task(task_spec.name.clone(), &[], ActionTask(task_spec.action.clone()))?;
            ids.insert(task_spec.name.as_str(), id);
        }

        for task_spec in &self.tasks {
            let task = ids[task_spec.name.as_str()];
            for dependency in &task_spec.depends_on {
                let dep = ids
                    .get(dependency.as_str())
                    .ok_or_else(|| PlanError::UnknownDependency {
                        task: task_spec.name.clone(),
                        dependency: dependency.clone(),
                    })?;
                graph.add_dependency(task, *dep)?;
            }
        }

        Ok(graph)
    }

    /// Small plan used by `stage init`
    pub fn example() -> Self {
        let task = |name: &str, depends_on: &[&str], action: Action| TaskSpec {
            name: name.to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            action,
        };

        Plan {
            name: "Example plan".to_string(),
            description: Some("Two parallel branches joined by a sum".to_string()),
            inputs: Map::from_iter([("base".to_string(), Value::from(40))]),
            settings: None,
            tasks: vec![
                task("base", &[], Action::Input { key: "base".to_string() }),
                task(
                    "left",
                    &["base"],
                    Action::Delay {
                        ms: 200,
                        value: Some(Value::from(1)),
                        timeout_ms: None,
                    },
                ),
                task(
                    "right",
                    &["base"],
                    Action::Delay {
                        ms: 100,
                        value: Some(Value::from(1)),
                        timeout_ms: None,
                    },
                ),
                task("total", &["base", "left", "right"], Action::Sum),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stagecore::StageError;
    use stageruntime::StageRuntime;

    fn plan(value: Value) -> Plan {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_and_group() {
        let plan = plan(json!({
            "name": "p",
            "tasks": [
                { "name": "d", "depends_on": ["b", "c"], "action": { "type": "collect" } },
                { "name": "b", "depends_on": ["a"], "action": { "type": "value", "value": 2 } },
                { "name": "c", "depends_on": ["a"], "action": { "type": "value", "value": 3 } },
                { "name": "a", "action": { "type": "value", "value": 1 } }
            ]
        }));

        let graph = plan.build().unwrap();
        let grouping = graph.build_schedule().unwrap();
        let names: Vec<Vec<&str>> = grouping
            .iter()
            .map(|group| group.iter().map(|id| graph.name(*id)).collect())
            .collect();

        assert_eq!(names, vec![vec!["a"], vec!["b", "c"], vec!["d"]]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let plan = plan(json!({
            "name": "p",
            "tasks": [
                { "name": "a", "action": { "type": "sum" } },
                { "name": "a", "action": { "type": "sum" } }
            ]
        }));

        assert!(matches!(plan.build(), Err(PlanError::DuplicateTask(ref n)) if n == "a"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let plan = plan(json!({
            "name": "p",
            "tasks": [ { "name": "a", "depends_on": ["ghost"], "action": { "type": "sum" } } ]
        }));

        match plan.build() {
            Err(PlanError::UnknownDependency { task, dependency }) => {
                assert_eq!(task, "a");
                assert_eq!(dependency, "ghost");
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("plan should be rejected"),
        }
    }

    #[test]
    fn test_cyclic_plan_reports_names() {
        let plan = plan(json!({
            "name": "p",
            "tasks": [
                { "name": "x", "depends_on": ["y"], "action": { "type": "sum" } },
                { "name": "y", "depends_on": ["x"], "action": { "type": "sum" } }
            ]
        }));

        let err = plan.build().unwrap().build_schedule().unwrap_err();
        assert_eq!(err.to_string(), "Cyclic dependency detected:\nx -> y -> x");
    }

    #[tokio::test]
    async fn test_example_plan_runs() {
        let plan = Plan::example();
        let graph = plan.build().unwrap();
        let ctx = Arc::new(PlanContext {
            inputs: plan.inputs.clone(),
        });

        let execution = StageRuntime::new().execute(&graph, ctx).await.unwrap();

        let total = graph.find("total").unwrap();
        assert_eq!(*execution.results.require(total), json!(42.0));
        assert_eq!(execution.groups, 3);
    }

    #[tokio::test]
    async fn test_missing_input_fails_task() {
        let plan = plan(json!({
            "name": "p",
            "tasks": [ { "name": "read", "action": { "type": "input", "key": "absent" } } ]
        }));
        let graph = plan.build().unwrap();

        let err = StageRuntime::new()
            .execute(&graph, Arc::new(PlanContext::default()))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Task 'read' failed: Invalid input: missing input 'absent'"
        );
    }

    #[tokio::test]
    async fn test_delay_past_timeout_fails() {
        let plan = plan(json!({
            "name": "p",
            "tasks": [
                { "name": "quick", "action": { "type": "delay", "ms": 10, "value": 1, "timeout_ms": 1000 } },
                { "name": "slow", "depends_on": ["quick"], "action": { "type": "delay", "ms": 500, "timeout_ms": 20 } }
            ]
        }));
        let graph = plan.build().unwrap();

        let err = StageRuntime::new()
            .execute(&graph, Arc::new(PlanContext::default()))
            .await
            .unwrap_err();

        match err {
            StageError::TaskFailed { task, source: TaskError::Timeout { millis } } => {
                assert_eq!(task, "slow");
                assert_eq!(millis, 20);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_parse_input() {
        let plan = plan(json!({
            "name": "p",
            "inputs": { "good": "[1, 2]", "bad": "[1," },
            "tasks": [
                { "name": "good", "action": { "type": "parse", "key": "good" } },
                { "name": "bad", "action": { "type": "parse", "key": "bad" } }
            ]
        }));
        let ctx = Arc::new(PlanContext {
            inputs: plan.inputs.clone(),
        });
        let good = ActionTask(plan.tasks[0].action.clone());
        let bad = ActionTask(plan.tasks[1].action.clone());

        assert_eq!(good.run(Arc::clone(&ctx), Vec::new()).await.unwrap(), json!([1, 2]));

        let err = bad.run(ctx, Vec::new()).await.unwrap_err();
        match err {
            TaskError::Custom(source) => assert!(source.is::<serde_json::Error>()),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_settings_are_optional_and_partial() {
        let plan = plan(json!({
            "name": "p",
            "settings": { "max_parallel_tasks": 3 },
            "tasks": []
        }));

        let settings = plan.settings.unwrap();
        assert_eq!(settings.max_parallel_tasks, Some(3));
        assert_eq!(settings.event_buffer_size, 1000);
    }
}
