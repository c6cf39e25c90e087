use anyhow::Result;
use app::app::workflow::seed::seed_default_workflow;
use app::app::workflow::UseWorkflowApp;
use app::module::{AppConfigModule, AppModule};
use clap::{Parser, Subcommand};
use flowdesk_base::error::FlowdeskError;
use model::data::WorkflowId;
use model::identity::Identity;
use serde_json::Value;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "flowdesk")]
#[command(about = "Manage workflow definitions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the "Social Media" workflow and make it the default if there is none
    Seed,
    /// List workflows
    List {
        /// include inactive workflows
        #[arg(long)]
        all: bool,
    },
    /// Show one workflow
    Show {
        #[arg(long)]
        id: i64,
    },
    /// Make a workflow the default (runs as admin)
    SetDefault {
        #[arg(long)]
        id: i64,
    },
    Deactivate {
        #[arg(long)]
        id: i64,
        /// fail if the stored version differs
        #[arg(long)]
        expected_version: Option<i64>,
    },
    Activate {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        expected_version: Option<i64>,
    },
}

pub async fn boot(command: Command) -> Result<Value> {
    let config_module = Arc::new(AppConfigModule::new_by_env());
    let app_module = AppModule::new_by_env(config_module).await?;
    run(&app_module, command).await
}

/// Execute one command and return its JSON output.
pub async fn run(app_module: &AppModule, command: Command) -> Result<Value> {
    let workflow_app = app_module.workflow_app().clone();
    tracing::debug!("run command: {:?}", command);
    let value = match command {
        Command::Seed => {
            let id = seed_default_workflow(workflow_app.as_ref()).await?;
            let workflow = workflow_app
                .find_workflow(&id)
                .await?
                .ok_or_else(|| FlowdeskError::NotFound(format!("workflow not found: id = {}", id.value)))?;
            serde_json::to_value(workflow)?
        }
        Command::List { all } => serde_json::to_value(workflow_app.find_workflow_list(all).await?)?,
        Command::Show { id } => {
            let workflow = workflow_app
                .find_workflow(&WorkflowId { value: id })
                .await?
                .ok_or_else(|| FlowdeskError::NotFound(format!("workflow not found: id = {id}")))?;
            serde_json::to_value(workflow)?
        }
        Command::SetDefault { id } => serde_json::to_value(
            workflow_app
                .set_default(&WorkflowId { value: id }, &Identity::admin())
                .await?,
        )?,
        Command::Deactivate {
            id,
            expected_version,
        } => serde_json::to_value(
            workflow_app
                .deactivate_workflow(&WorkflowId { value: id }, expected_version)
                .await?,
        )?,
        Command::Activate {
            id,
            expected_version,
        } => serde_json::to_value(
            workflow_app
                .activate_workflow(&WorkflowId { value: id }, expected_version)
                .await?,
        )?,
    };
    Ok(value)
}
