use super::WorkflowApp;
use anyhow::Result;
use model::data::{StepData, StepSettings, WorkflowId};
use model::identity::Identity;

pub const SOCIAL_MEDIA_WORKFLOW_NAME: &str = "Social Media";

fn step(name: &str, color: &str, icon: &str, settings: StepSettings) -> StepData {
    StepData {
        name: name.to_string(),
        description: None,
        order: 0,
        color: color.to_string(),
        icon: icon.to_string(),
        settings,
    }
}

/// Steps of the built-in social media production workflow.
pub fn social_media_steps() -> Vec<StepData> {
    let multiple_files = StepSettings {
        allow_multiple_files: true,
        ..Default::default()
    };
    let client_visible = StepSettings {
        allow_client_access: true,
        ..Default::default()
    };
    vec![
        step("Briefing", "#6B7280", "clipboard", multiple_files),
        step("Criação", "#3B82F6", "pencil", multiple_files),
        step(
            "Revisão Interna",
            "#F59E0B",
            "eye",
            StepSettings {
                requires_approval: true,
                ..Default::default()
            },
        ),
        step("Ajustes", "#8B5CF6", "wrench", multiple_files),
        step(
            "Aprovação do Cliente",
            "#EC4899",
            "check-circle",
            StepSettings {
                allow_client_access: true,
                requires_approval: true,
                allow_multiple_files: false,
                is_client_approval_step: true,
            },
        ),
        step("Agendamento", "#10B981", "calendar", client_visible),
        step("Publicação", "#14B8A6", "send", client_visible),
        step(
            "Relatório",
            "#22C55E",
            "bar-chart",
            StepSettings {
                allow_client_access: true,
                allow_multiple_files: true,
                ..Default::default()
            },
        ),
    ]
}

/// Create the social media workflow unless an active one with that name exists,
/// and make it the default when there is none. Safe to run repeatedly.
pub async fn seed_default_workflow(app: &dyn WorkflowApp) -> Result<WorkflowId> {
    let workflow = match app.find_active_by_name(SOCIAL_MEDIA_WORKFLOW_NAME).await? {
        Some(w) => {
            tracing::debug!("seed workflow already exists: id = {}", w.id.value);
            w
        }
        None => {
            app.create_workflow(
                SOCIAL_MEDIA_WORKFLOW_NAME,
                Some("Produção de conteúdo para redes sociais".to_string()),
                social_media_steps(),
            )
            .await?
        }
    };
    if app.find_default_workflow().await?.is_none() {
        app.set_default(&workflow.id, &Identity::admin()).await?;
    }
    Ok(workflow.id)
}
