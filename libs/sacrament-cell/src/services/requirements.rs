// libs/sacrament-cell/src/services/requirements.rs
use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Requirement, SacramentError, ServiceChecklist, SubService, SubServiceAssignment,
    SubServiceSchedule, SubmissionKind,
};

/// Evaluates and updates the nested requirement / sub-service checklist.
///
/// Updates never mutate in place: each returns a new checklist with exactly
/// one leaf changed, addressed by id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubServiceRequirementTracker;

impl SubServiceRequirementTracker {
    pub fn new() -> Self {
        Self
    }

    pub fn all_required_submitted(&self, checklist: &ServiceChecklist) -> bool {
        self.outstanding_requirements(checklist).is_empty()
    }

    pub fn all_sub_services_completed(&self, checklist: &ServiceChecklist) -> bool {
        checklist.sub_services.iter().all(|s| s.is_completed)
    }

    /// Needed but unsubmitted requirements, top-level first.
    pub fn outstanding_requirements(&self, checklist: &ServiceChecklist) -> Vec<String> {
        let top_level = checklist
            .requirements
            .iter()
            .filter(|r| is_outstanding(r))
            .map(|r| format!("requirement {} not submitted", describe(r.id, &r.name)));

        let nested = checklist.sub_services.iter().flat_map(|sub| {
            sub.requirements.iter().filter(|r| is_outstanding(r)).map(move |r| {
                format!(
                    "sub-service {} requirement {} not submitted",
                    describe(sub.id, &sub.name),
                    describe(r.id, &r.name)
                )
            })
        });

        top_level.chain(nested).collect()
    }

    pub fn incomplete_sub_services(&self, checklist: &ServiceChecklist) -> Vec<String> {
        checklist
            .sub_services
            .iter()
            .filter(|s| !s.is_completed)
            .map(|s| format!("sub-service {} not completed", describe(s.id, &s.name)))
            .collect()
    }

    pub fn unscheduled_sub_services(&self, checklist: &ServiceChecklist) -> Vec<String> {
        checklist
            .sub_services
            .iter()
            .filter(|s| s.schedule.is_none())
            .map(|s| format!("sub-service {} has no schedule assignment", describe(s.id, &s.name)))
            .collect()
    }

    /// Which kind of leaf `item_id` addresses, if any.
    pub fn locate(&self, checklist: &ServiceChecklist, item_id: Uuid) -> Option<SubmissionKind> {
        if checklist.requirements.iter().any(|r| r.id == item_id) {
            return Some(SubmissionKind::Requirement);
        }
        if checklist.sub_services.iter().any(|s| s.id == item_id) {
            return Some(SubmissionKind::SubServiceCompletion);
        }
        checklist
            .sub_services
            .iter()
            .any(|s| s.requirements.iter().any(|r| r.id == item_id))
            .then_some(SubmissionKind::SubServiceRequirement)
    }

    pub fn set_submission(
        &self,
        checklist: &ServiceChecklist,
        item_id: Uuid,
        kind: SubmissionKind,
        value: bool,
    ) -> Result<ServiceChecklist, SacramentError> {
        debug!("Setting {:?} {} to {}", kind, item_id, value);

        let mut found = false;
        let updated = match kind {
            SubmissionKind::Requirement => ServiceChecklist {
                requirements: toggle_requirements(&checklist.requirements, item_id, value, &mut found),
                sub_services: checklist.sub_services.clone(),
            },
            SubmissionKind::SubServiceRequirement => ServiceChecklist {
                requirements: checklist.requirements.clone(),
                sub_services: checklist
                    .sub_services
                    .iter()
                    .map(|sub| SubService {
                        requirements: toggle_requirements(&sub.requirements, item_id, value, &mut found),
                        ..sub.clone()
                    })
                    .collect(),
            },
            SubmissionKind::SubServiceCompletion => ServiceChecklist {
                requirements: checklist.requirements.clone(),
                sub_services: checklist
                    .sub_services
                    .iter()
                    .map(|sub| {
                        if sub.id == item_id {
                            found = true;
                            SubService { is_completed: value, ..sub.clone() }
                        } else {
                            sub.clone()
                        }
                    })
                    .collect(),
            },
        };

        if !found {
            return Err(SacramentError::ChecklistItemNotFound(item_id));
        }
        Ok(updated)
    }

    /// Applies per-sub-service schedule assignments. Every assignment must
    /// address a sub-service of this checklist.
    pub fn assign_sub_service_schedules(
        &self,
        checklist: &ServiceChecklist,
        assignments: &[SubServiceAssignment],
    ) -> Result<ServiceChecklist, SacramentError> {
        if let Some(unknown) = assignments
            .iter()
            .find(|a| !checklist.sub_services.iter().any(|s| s.id == a.sub_service_id))
        {
            return Err(SacramentError::ChecklistItemNotFound(unknown.sub_service_id));
        }

        let sub_services = checklist
            .sub_services
            .iter()
            .map(|sub| {
                match assignments.iter().rev().find(|a| a.sub_service_id == sub.id) {
                    Some(a) => SubService {
                        schedule: Some(SubServiceSchedule { date: a.date, time: a.time }),
                        ..sub.clone()
                    },
                    None => sub.clone(),
                }
            })
            .collect();

        Ok(ServiceChecklist {
            requirements: checklist.requirements.clone(),
            sub_services,
        })
    }

    /// Ids must be unique across the whole tree so updates stay unambiguous.
    pub fn validate_ids(&self, checklist: &ServiceChecklist) -> Result<(), SacramentError> {
        let mut seen = HashSet::new();
        let ids = checklist
            .requirements
            .iter()
            .map(|r| r.id)
            .chain(checklist.sub_services.iter().flat_map(|s| {
                std::iter::once(s.id).chain(s.requirements.iter().map(|r| r.id))
            }));

        for id in ids {
            if !seen.insert(id) {
                return Err(SacramentError::ValidationError(format!(
                    "Checklist id {} is used more than once",
                    id
                )));
            }
        }
        Ok(())
    }

    /// The checklist a new booking starts with: nothing submitted, nothing
    /// completed, nothing scheduled.
    pub fn fresh_snapshot(&self, template: &ServiceChecklist) -> ServiceChecklist {
        let reset = |r: &Requirement| Requirement { is_submitted: false, ..r.clone() };

        ServiceChecklist {
            requirements: template.requirements.iter().map(reset).collect(),
            sub_services: template
                .sub_services
                .iter()
                .map(|s| SubService {
                    id: s.id,
                    name: s.name.clone(),
                    is_completed: false,
                    requirements: s.requirements.iter().map(reset).collect(),
                    schedule: None,
                })
                .collect(),
        }
    }
}

fn is_outstanding(requirement: &Requirement) -> bool {
    requirement.needed && !requirement.is_submitted
}

fn describe(id: Uuid, name: &str) -> String {
    if name.is_empty() {
        id.to_string()
    } else {
        format!("{} ({})", id, name)
    }
}

fn toggle_requirements(
    requirements: &[Requirement],
    item_id: Uuid,
    value: bool,
    found: &mut bool,
) -> Vec<Requirement> {
    requirements
        .iter()
        .map(|r| {
            if r.id == item_id {
                *found = true;
                Requirement { is_submitted: value, ..r.clone() }
            } else {
                r.clone()
            }
        })
        .collect()
}
