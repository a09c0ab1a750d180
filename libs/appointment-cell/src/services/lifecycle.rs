use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{ListQuery, SupabaseClient};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, LifecycleAction, APPOINTMENT_SELECT};
use crate::services::appointment::find_appointment;
use crate::services::booking::slot_race;

/// Outcome of a permitted lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: AppointmentStatus,
    /// `confirmed_at` is stamped on the first confirmation only.
    pub stamp_confirmed_at: bool,
}

impl Transition {
    pub fn write_into(&self, changes: &mut Map<String, Value>, now: DateTime<Utc>) {
        changes.insert("status".to_string(), json!(self.to));
        if self.stamp_confirmed_at {
            changes.insert("confirmed_at".to_string(), json!(now));
        }
    }
}

/// Decides whether `action` may run against an appointment currently in `status`.
pub fn plan_transition(
    status: AppointmentStatus,
    has_confirmed_at: bool,
    action: LifecycleAction,
) -> Result<Transition, AppointmentError> {
    use AppointmentStatus::*;

    let refuse = |msg: &str| -> Result<Transition, AppointmentError> {
        Err(AppointmentError::InvalidTransition(msg.to_string()))
    };

    let to = match (action, status) {
        (LifecycleAction::Approve, Confirmed) => return refuse("Appointment is already confirmed"),
        (LifecycleAction::Approve, _) => Confirmed,

        (LifecycleAction::Cancel, Cancelled) => return refuse("Appointment is already cancelled"),
        (LifecycleAction::Cancel, Completed) => return refuse("Cannot cancel a completed appointment"),
        (LifecycleAction::Cancel, Rejected) => return refuse("Cannot cancel a rejected appointment"),
        (LifecycleAction::Cancel, _) => Cancelled,

        (LifecycleAction::Reject, Rejected) => return refuse("Appointment is already rejected"),
        (LifecycleAction::Reject, _) => Rejected,

        (LifecycleAction::Complete, Completed) => return refuse("Appointment is already completed"),
        (LifecycleAction::Complete, Confirmed) => Completed,
        (LifecycleAction::Complete, _) => {
            return refuse("Only confirmed appointments can be marked as completed")
        }
    };

    Ok(Transition {
        to,
        stamp_confirmed_at: to == Confirmed && !has_confirmed_at,
    })
}

pub struct AppointmentLifecycleService {
    supabase: SupabaseClient,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Runs `action` and, when supplied, overwrites `admin_notes` in the same write.
    pub async fn apply(
        &self,
        appointment_id: Uuid,
        action: LifecycleAction,
        admin_notes: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Applying {} to appointment {}", action, appointment_id);

        let current = find_appointment(&self.supabase, appointment_id).await?;
        let transition = plan_transition(current.status, current.confirmed_at.is_some(), action)
            .inspect_err(|e| warn!("Refused {} on appointment {}: {}", action, appointment_id, e))?;

        let mut changes = Map::new();
        transition.write_into(&mut changes, Utc::now());
        if let Some(notes) = admin_notes {
            changes.insert("admin_notes".to_string(), json!(notes));
        }

        let updated = guarded_update(&self.supabase, &current, changes).await?;
        info!(
            "Appointment {} moved {} -> {}",
            appointment_id, current.status, updated.status
        );
        Ok(updated)
    }
}

/// Writes `changes` only if the row still carries the status it was read with.
///
/// Zero matched rows means another request changed the appointment in between.
pub(crate) async fn guarded_update(
    client: &SupabaseClient,
    current: &Appointment,
    mut changes: Map<String, Value>,
) -> Result<Appointment, AppointmentError> {
    changes.insert("updated_at".to_string(), json!(Utc::now()));

    let path = ListQuery::table("appointments")
        .select(APPOINTMENT_SELECT)
        .eq("id", current.id)
        .eq("status", current.status)
        .to_path();

    let rows: Vec<Appointment> = client
        .update(&path, Value::Object(changes))
        .await
        .map_err(slot_race)?;

    rows.into_iter()
        .next()
        .ok_or(AppointmentError::ConcurrentModification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    fn refusal(status: AppointmentStatus, action: LifecycleAction) -> String {
        match plan_transition(status, false, action) {
            Err(AppointmentError::InvalidTransition(msg)) => msg,
            other => panic!("expected refusal, got {:?}", other),
        }
    }

    #[test]
    fn approve_stamps_confirmation_once() {
        let first = plan_transition(Pending, false, LifecycleAction::Approve).unwrap();
        assert_eq!(first.to, Confirmed);
        assert!(first.stamp_confirmed_at);

        let again = plan_transition(Cancelled, true, LifecycleAction::Approve).unwrap();
        assert_eq!(again.to, Confirmed);
        assert!(!again.stamp_confirmed_at);

        assert_eq!(refusal(Confirmed, LifecycleAction::Approve), "Appointment is already confirmed");
    }

    #[test]
    fn cancel_only_from_active() {
        assert_eq!(plan_transition(Pending, false, LifecycleAction::Cancel).unwrap().to, Cancelled);
        assert_eq!(plan_transition(Confirmed, true, LifecycleAction::Cancel).unwrap().to, Cancelled);
        assert_eq!(refusal(Cancelled, LifecycleAction::Cancel), "Appointment is already cancelled");
        assert_eq!(refusal(Completed, LifecycleAction::Cancel), "Cannot cancel a completed appointment");
        assert_eq!(refusal(Rejected, LifecycleAction::Cancel), "Cannot cancel a rejected appointment");
    }

    #[test]
    fn reject_from_anything_but_rejected() {
        for status in [Pending, Confirmed, Completed, Cancelled] {
            assert_eq!(plan_transition(status, false, LifecycleAction::Reject).unwrap().to, Rejected);
        }
        assert_eq!(refusal(Rejected, LifecycleAction::Reject), "Appointment is already rejected");
    }

    #[test]
    fn complete_requires_confirmation() {
        assert_eq!(plan_transition(Confirmed, true, LifecycleAction::Complete).unwrap().to, Completed);
        assert_eq!(
            refusal(Pending, LifecycleAction::Complete),
            "Only confirmed appointments can be marked as completed"
        );
        assert_eq!(refusal(Completed, LifecycleAction::Complete), "Appointment is already completed");
    }

    #[test]
    fn transition_writes_status_and_timestamp() {
        let now = Utc::now();
        let mut changes = Map::new();
        plan_transition(Pending, false, LifecycleAction::Approve)
            .unwrap()
            .write_into(&mut changes, now);
        assert_eq!(changes["status"], "confirmed");
        assert!(changes.contains_key("confirmed_at"));

        let mut changes = Map::new();
        plan_transition(Confirmed, true, LifecycleAction::Complete)
            .unwrap()
            .write_into(&mut changes, now);
        assert_eq!(changes["status"], "completed");
        assert!(!changes.contains_key("confirmed_at"));
    }
}
