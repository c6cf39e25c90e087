//! Validation and structural editing of workflow step lists.
//!
//! Every function here is pure: it works on an in-memory step list and reports
//! which task positions have to move so that tasks stay at the same step.

use flowdesk_base::error::FlowdeskError;
use model::data::{Step, StepData, StepId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap());

/// Result of a structural edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionEdit {
    /// (old order, new order) for every step whose order changed
    pub task_moves: Vec<(u32, u32)>,
    /// order (before the edit) of a removed step
    pub removed_step: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepViolation {
    pub field: &'static str,
    pub message: String,
}

pub fn validate_workflow_name(name: &str) -> Result<String, FlowdeskError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FlowdeskError::validation(
            "name",
            "workflow name must not be empty",
        ));
    }
    Ok(name.to_string())
}

pub fn is_hex_color(color: &str) -> bool {
    HEX_COLOR.is_match(color)
}

pub fn check_step(step: &StepData) -> Result<(), StepViolation> {
    if step.name.trim().is_empty() {
        return Err(StepViolation {
            field: "name",
            message: "step name must not be empty".to_string(),
        });
    }
    if !is_hex_color(&step.color) {
        return Err(StepViolation {
            field: "color",
            message: format!("'{}' is not a #RRGGBB color", step.color),
        });
    }
    if step.icon.trim().is_empty() {
        return Err(StepViolation {
            field: "icon",
            message: "step icon must not be empty".to_string(),
        });
    }
    if step.settings.is_client_approval_step && !step.settings.allow_client_access {
        return Err(StepViolation {
            field: "settings.allowClientAccess",
            message: format!(
                "client approval step '{}' must allow client access",
                step.name
            ),
        });
    }
    Ok(())
}

// step edits report violations as InvalidStep
pub fn validate_step(step: &StepData) -> Result<(), FlowdeskError> {
    check_step(step).map_err(|v| FlowdeskError::invalid_step(v.field, v.message))
}

/// Build the steps of a new workflow: order is the 1-based input position,
/// whatever the caller put in `order`.
pub fn build_steps(inputs: Vec<StepData>, ids: Vec<StepId>) -> Result<Vec<Step>, FlowdeskError> {
    if inputs.is_empty() {
        return Err(FlowdeskError::validation(
            "steps",
            "a workflow needs at least one step",
        ));
    }
    if inputs.len() != ids.len() {
        return Err(FlowdeskError::RuntimeError(format!(
            "step ids do not match steps: {} ids for {} steps",
            ids.len(),
            inputs.len()
        )));
    }
    inputs
        .into_iter()
        .zip(ids)
        .enumerate()
        .map(|(i, (mut data, id))| {
            check_step(&data).map_err(|v| {
                FlowdeskError::validation(format!("steps[{}].{}", i, v.field), v.message)
            })?;
            data.order = i as u32 + 1;
            Ok(Step { id, data })
        })
        .collect()
}

pub fn renumber(steps: &mut [Step]) {
    for (i, step) in steps.iter_mut().enumerate() {
        step.data.order = i as u32 + 1;
    }
}

pub fn is_contiguous(steps: &[Step]) -> bool {
    steps
        .iter()
        .enumerate()
        .all(|(i, s)| s.data.order == i as u32 + 1)
}

/// Insert at 1-based `position` clamped to [1, len + 1]. Returns the position used.
pub fn insert_step(
    steps: &mut Vec<Step>,
    position: u32,
    step: Step,
) -> Result<(u32, DefinitionEdit), FlowdeskError> {
    validate_step(&step.data)?;
    if steps.iter().any(|s| s.id == step.id) {
        return Err(FlowdeskError::invalid_step(
            "id",
            format!("step id {} already exists", step.id.value),
        ));
    }
    let len = steps.len() as u32;
    let position = position.clamp(1, len + 1);
    steps.insert(position as usize - 1, step);
    renumber(steps);
    let task_moves = (position..=len).rev().map(|o| (o, o + 1)).collect();
    Ok((
        position,
        DefinitionEdit {
            task_moves,
            removed_step: None,
        },
    ))
}

pub fn remove_step(
    workflow_id: i64,
    steps: &mut Vec<Step>,
    order: u32,
) -> Result<(Step, DefinitionEdit), FlowdeskError> {
    let index = steps
        .iter()
        .position(|s| s.data.order == order)
        .ok_or_else(|| {
            FlowdeskError::NotFound(format!(
                "step not found: workflow_id = {workflow_id}, order = {order}"
            ))
        })?;
    if steps.len() <= 1 {
        return Err(FlowdeskError::LastStep(workflow_id));
    }
    let len = steps.len() as u32;
    let removed = steps.remove(index);
    renumber(steps);
    let task_moves = ((order + 1)..=len).map(|o| (o, o - 1)).collect();
    Ok((
        removed,
        DefinitionEdit {
            task_moves,
            removed_step: Some(order),
        },
    ))
}

/// `new_order` must be a permutation of the current step ids.
pub fn reorder_steps(
    steps: &mut Vec<Step>,
    new_order: &[StepId],
) -> Result<DefinitionEdit, FlowdeskError> {
    if new_order.len() != steps.len() {
        return Err(FlowdeskError::InvalidPermutation(format!(
            "expected {} step ids, got {}",
            steps.len(),
            new_order.len()
        )));
    }
    let mut seen = HashSet::with_capacity(new_order.len());
    if let Some(dup) = new_order.iter().find(|id| !seen.insert(**id)) {
        return Err(FlowdeskError::InvalidPermutation(format!(
            "duplicated step id: {}",
            dup.value
        )));
    }
    let mut by_id: HashMap<StepId, Step> = steps.drain(..).map(|s| (s.id, s)).collect();
    let mut reordered = Vec::with_capacity(new_order.len());
    for id in new_order {
        match by_id.remove(id) {
            Some(s) => reordered.push(s),
            None => {
                // restore in the original order before reporting
                reordered.extend(by_id.into_values());
                reordered.sort_by_key(|s| s.data.order);
                *steps = reordered;
                return Err(FlowdeskError::InvalidPermutation(format!(
                    "unknown step id: {}",
                    id.value
                )));
            }
        }
    }
    let task_moves = reordered
        .iter()
        .enumerate()
        .map(|(i, s)| (s.data.order, i as u32 + 1))
        .filter(|(old, new)| old != new)
        .collect();
    renumber(&mut reordered);
    *steps = reordered;
    Ok(DefinitionEdit {
        task_moves,
        removed_step: None,
    })
}

/// Replace the content of the step at `order` keeping its id and order.
pub fn replace_step(
    workflow_id: i64,
    steps: &mut [Step],
    order: u32,
    data: StepData,
) -> Result<(), FlowdeskError> {
    validate_step(&data)?;
    let step = steps
        .iter_mut()
        .find(|s| s.data.order == order)
        .ok_or_else(|| {
            FlowdeskError::NotFound(format!(
                "step not found: workflow_id = {workflow_id}, order = {order}"
            ))
        })?;
    step.data = StepData { order, ..data };
    Ok(())
}
