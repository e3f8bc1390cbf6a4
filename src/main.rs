use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde_json::{json, Map, Value};

use agent_hive::core::{topics, REQUIRED_CAPABILITIES_KEY};
use agent_hive::llm::{EchoProvider, LlmConfig, ProviderClient};
use agent_hive::{logging, AgentConfig, AgentRuntime, AgentStatus, AiAgent, CoordinatorAgent, Task, TaskError, WorkerAgent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging system
    let (_guard, log_dir) = logging::init_logging()?;

    tracing::info!("=== Agent Hive Demo Starting ===");
    println!("{} logs in {}", "agent-hive".bold().cyan(), log_dir.display());

    let runtime = AgentRuntime::new();

    let coordinator = Arc::new(CoordinatorAgent::new());
    runtime
        .spawn(AgentConfig::new("Coordinator").with_id("coordinator"), coordinator.clone())
        .await?;

    runtime
        .spawn(AgentConfig::new("Worker-1").with_id("worker-1"), Arc::new(WorkerAgent::new()))
        .await?;

    let reporter = WorkerAgent::new()
        .with_capabilities(["reporting"])
        .with_work(|task, agent| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, TaskError>(json!({ "report": task.name, "by": agent.agent_id() }))
        });
    runtime
        .spawn(AgentConfig::new("Worker-2").with_id("worker-2"), Arc::new(reporter))
        .await?;

    // LLM_* environment variables override the demo defaults.
    let llm_config = LlmConfig::from_env()?;
    let client = ProviderClient::new(Arc::new(EchoProvider::new()), llm_config);
    runtime
        .spawn(AgentConfig::new("Analyst").with_id("analyst"), Arc::new(AiAgent::analyst(client)))
        .await?;

    runtime.set_entry_agent("coordinator").await?;
    runtime.start_all().await?;

    // Workers announce themselves on start; give the coordinator a moment.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut task_ids = Vec::new();
    for (name, capability, priority) in [
        ("ingest", "data_processing", 1),
        ("quarterly-report", "reporting", 5),
        ("render-video", "video", 3),
    ] {
        let mut payload = Map::new();
        payload.insert(REQUIRED_CAPABILITIES_KEY.into(), json!([capability]));
        task_ids.push(runtime.create_task(name, payload, priority).await?);
    }

    let analysis = Task::new("sales-trend")
        .with_field("prompt_template", "trend_analysis")
        .with_field("data", "monthly revenue")
        .with_field("time_period", "2024")
        .with_field("metrics", "growth");
    task_ids.push(runtime.create_task_for("analyst", analysis).await?);

    runtime
        .broker()
        .publish(agent_hive::Message::direct(
            "demo",
            "analyst",
            topics::PROMPT_UPDATE,
            json!({ "llm_config": { "temperature": 0.2 } }),
        ))
        .await?;

    for task_id in &task_ids {
        let report = wait_for_task(&runtime, task_id).await;
        match report {
            Some(report) => {
                let status = match report.status.as_str() {
                    "completed" => report.status.as_str().green(),
                    _ => report.status.as_str().red(),
                };
                let detail = report
                    .result
                    .map(|v| v.to_string())
                    .or_else(|| report.error.map(|e| e.to_string()))
                    .unwrap_or_default();
                println!("{} {} on {}: {}", "task".bold(), status, report.agent_id.yellow(), detail);
            }
            None => println!("{} {} did not finish", "task".bold(), task_id.red()),
        }
    }

    runtime.stop_all().await;

    println!();
    for status in runtime.snapshots().await {
        print_status(&status);
    }

    tracing::info!("=== Agent Hive Demo Shutting Down ===");
    Ok(())
}

async fn wait_for_task(runtime: &AgentRuntime, task_id: &str) -> Option<agent_hive::runtime::TaskReport> {
    for _ in 0..200 {
        if let Some(report) = runtime.task_status(task_id).await {
            if report.status.is_terminal() {
                return Some(report);
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    None
}

fn print_status(status: &AgentStatus) {
    let extended = status
        .extended
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();
    println!(
        "{:<12} {:<12} {:<8} completed={} failed={} delegated={} queued={} {}",
        status.name.bold(),
        status.agent_type.cyan(),
        status.state.label(),
        status.completed_tasks.to_string().green(),
        status.failed_tasks.to_string().red(),
        status.delegated_tasks,
        status.queue_depth,
        extended.dimmed()
    );
}
