use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::survey::SurveyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    Open,
    Targeted,
    Link,
}

/// Who is submitting. Either field may identify the respondent against a
/// targeted allow-list or a completion record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondentIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl RespondentIdentity {
    pub fn from_email(email: impl Into<String>) -> Self {
        Self {
            user_id: None,
            email: Some(email.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub identity: RespondentIdentity,
    pub accessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub identity: RespondentIdentity,
    pub completed_at: DateTime<Utc>,
}

/// Distribution/validity record for a survey. The completion counter is the
/// one piece of shared mutable state in the system; the gate updates it
/// under a single guarded check-and-increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub code: String,
    pub survey_id: SurveyId,
    pub distribution_mode: DistributionMode,
    #[serde(default)]
    pub target_users: Vec<String>,
    #[serde(default)]
    pub target_emails: Vec<String>,
    /// None means unlimited.
    #[serde(default)]
    pub max_responses: Option<u32>,
    #[serde(default)]
    pub current_responses: u32,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub access_log: Vec<AccessEntry>,
    #[serde(default)]
    pub completed_by: Vec<CompletionEntry>,
}

fn default_active() -> bool {
    true
}

impl Invitation {
    pub fn new(code: impl Into<String>, survey_id: SurveyId, mode: DistributionMode) -> Self {
        Self {
            code: code.into(),
            survey_id,
            distribution_mode: mode,
            target_users: Vec::new(),
            target_emails: Vec::new(),
            max_responses: None,
            current_responses: 0,
            expires_at: None,
            is_active: true,
            access_log: Vec::new(),
            completed_by: Vec::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry < now)
    }

    pub fn quota_exhausted(&self) -> bool {
        self.max_responses
            .is_some_and(|max| self.current_responses >= max)
    }

    pub fn can_access(&self, identity: &RespondentIdentity) -> bool {
        match self.distribution_mode {
            DistributionMode::Open | DistributionMode::Link => true,
            DistributionMode::Targeted => {
                let user_match = identity
                    .user_id
                    .as_ref()
                    .is_some_and(|id| self.target_users.contains(id));
                let email_match = identity
                    .email
                    .as_ref()
                    .is_some_and(|email| self.target_emails.contains(email));
                user_match || email_match
            }
        }
    }

    pub fn has_completed(&self, identity: &RespondentIdentity) -> bool {
        self.completed_by.iter().any(|entry| {
            let user_match = identity.user_id.is_some()
                && entry.identity.user_id == identity.user_id;
            let email_match =
                identity.email.is_some() && entry.identity.email == identity.email;
            user_match || email_match
        })
    }
}

/// Why a submission was refused before the scoring pipeline ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("invitation not found")]
    NotFound,
    #[error("invitation has expired")]
    Expired,
    #[error("invitation response quota exhausted")]
    QuotaExceeded,
    #[error("respondent is not on the invitation's target list")]
    NotTargeted,
    #[error("respondent has already completed this invitation")]
    AlreadyCompleted,
}

/// The authorization collaborator consumed by the submission service.
///
/// `mark_completed` must perform its quota check and increment atomically;
/// two racing submissions against `max_responses = 1` yield exactly one
/// success.
pub trait InvitationGate: Send + Sync {
    /// `survey_id` is the survey the submission targets; a code issued for
    /// a different survey is rejected as `NotFound`.
    fn authorize(
        &self,
        code: &str,
        survey_id: &SurveyId,
        identity: &RespondentIdentity,
    ) -> Result<(), GateRejection>;
    /// `survey_id` is `None` on the standalone completion path, where the
    /// caller holds only the code.
    fn mark_completed(
        &self,
        code: &str,
        survey_id: Option<&SurveyId>,
        identity: &RespondentIdentity,
    ) -> Result<(), GateRejection>;
    /// Access-log entries recorded for a survey, the completion-rate
    /// denominator. Zero means the survey has no invitation tracking.
    fn access_count(&self, survey_id: &SurveyId) -> usize;
}

/// Mutex-backed gate. The lock spans the whole validate-and-increment
/// sequence, which is what makes the quota check atomic.
#[derive(Default, Clone)]
pub struct InMemoryInvitationGate {
    invitations: Arc<Mutex<HashMap<String, Invitation>>>,
}

impl InMemoryInvitationGate {
    pub fn with_invitations(invitations: Vec<Invitation>) -> Self {
        let map = invitations
            .into_iter()
            .map(|invitation| (invitation.code.clone(), invitation))
            .collect();
        Self {
            invitations: Arc::new(Mutex::new(map)),
        }
    }

    pub fn invitation(&self, code: &str) -> Option<Invitation> {
        let guard = self.invitations.lock().expect("invitation mutex poisoned");
        guard.get(code).cloned()
    }

    fn validate(
        invitation: &Invitation,
        survey_id: Option<&SurveyId>,
        identity: &RespondentIdentity,
    ) -> Result<(), GateRejection> {
        // A code bound to another survey reveals nothing about itself.
        if survey_id.is_some_and(|id| invitation.survey_id != *id) {
            return Err(GateRejection::NotFound);
        }
        if invitation.is_expired(Utc::now()) {
            return Err(GateRejection::Expired);
        }
        if invitation.has_completed(identity) {
            return Err(GateRejection::AlreadyCompleted);
        }
        if !invitation.is_active || invitation.quota_exhausted() {
            return Err(GateRejection::QuotaExceeded);
        }
        if !invitation.can_access(identity) {
            return Err(GateRejection::NotTargeted);
        }
        Ok(())
    }
}

impl InvitationGate for InMemoryInvitationGate {
    fn authorize(
        &self,
        code: &str,
        survey_id: &SurveyId,
        identity: &RespondentIdentity,
    ) -> Result<(), GateRejection> {
        let mut guard = self.invitations.lock().expect("invitation mutex poisoned");
        let invitation = guard.get_mut(code).ok_or(GateRejection::NotFound)?;
        Self::validate(invitation, Some(survey_id), identity)?;
        invitation.access_log.push(AccessEntry {
            identity: identity.clone(),
            accessed_at: Utc::now(),
        });
        Ok(())
    }

    fn mark_completed(
        &self,
        code: &str,
        survey_id: Option<&SurveyId>,
        identity: &RespondentIdentity,
    ) -> Result<(), GateRejection> {
        let mut guard = self.invitations.lock().expect("invitation mutex poisoned");
        let invitation = guard.get_mut(code).ok_or(GateRejection::NotFound)?;
        Self::validate(invitation, survey_id, identity)?;

        invitation.current_responses += 1;
        invitation.completed_by.push(CompletionEntry {
            identity: identity.clone(),
            completed_at: Utc::now(),
        });
        if invitation.quota_exhausted() {
            invitation.is_active = false;
        }
        Ok(())
    }

    fn access_count(&self, survey_id: &SurveyId) -> usize {
        let guard = self.invitations.lock().expect("invitation mutex poisoned");
        guard
            .values()
            .filter(|invitation| invitation.survey_id == *survey_id)
            .map(|invitation| invitation.access_log.len())
            .sum()
    }
}
