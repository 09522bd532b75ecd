// defense-core/src/model/defense_file.rs
// ============================================================================
// Module: DefenseFile
// Description: The append-only audit trail produced for one project.
// Purpose: Aggregate every recorded agent decision into the durable artifact
//          a company presents under audit.
// Dependencies: serde, crate::identifiers, crate::model::decision
// ============================================================================

//! ## Overview
//! A [`DefenseFile`] is append-only: `record_decision` is the only mutator,
//! and it always pushes, never edits or removes. `compliance_checklist` is
//! always derived from `decisions`, never set directly, so the checklist
//! can never silently drift from the decisions that justify it.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::CompanyId;
use crate::identifiers::CompliancePillar;
use crate::identifiers::DecisionLabel;
use crate::identifiers::ProjectId;
use crate::identifiers::StageId;
use crate::interfaces::artifact_port::ArtifactPointer;
use crate::model::decision::AgentDecision;
use crate::model::project::Project;
use crate::time::Timestamp;

/// A record of one outbound notification raised while a project was
/// deliberated, kept alongside the decisions that justify audit-readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Stage the run was at when this notification was raised.
    pub stage: StageId,
    /// Human-readable summary of what was communicated.
    pub summary: String,
    /// When the notification was recorded.
    pub recorded_at: Timestamp,
}

/// Derived checklist of the four compliance pillars, each `true` once its
/// supporting text has actually been recorded, per spec.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceChecklist {
    /// `razon_de_negocios`: documented business rationale.
    pub razon_de_negocios: bool,
    /// `beneficio_economico`: measurable economic benefit.
    pub beneficio_economico: bool,
    /// `materialidad`: proportionate amount for the service received.
    pub materialidad: bool,
    /// `trazabilidad`: traceable deliverables, invoices and payments.
    pub trazabilidad: bool,
}

/// Substrings whose case-insensitive presence in a decision's rationale
/// satisfies `razon_de_negocios`, matching both the accented and
/// unaccented spellings spec.md §4.3 calls out.
const RAZON_DE_NEGOCIOS_NEEDLES: [&str; 2] = ["razón de negocios", "razon de negocios"];

/// Substrings whose case-insensitive presence satisfies
/// `beneficio_economico`.
const BENEFICIO_ECONOMICO_NEEDLES: [&str; 2] = ["beneficio económico", "beneficio economico"];

/// Substring whose case-insensitive presence satisfies `materialidad`.
const MATERIALIDAD_NEEDLE: &str = "materialidad";

fn rationale_contains_any(rationale: &str, needles: &[&str]) -> bool {
    let lowered = rationale.to_lowercase();
    needles.iter().any(|needle| lowered.contains(needle))
}

impl ComplianceChecklist {
    /// Derives the checklist from the decisions and notifications recorded
    /// so far.
    ///
    /// Each pillar but `trazabilidad` is satisfied by a literal,
    /// case-insensitive substring search over every decision's free-text
    /// `rationale`, per spec.md §4.3: `razon_de_negocios` on "razón de
    /// negocios" (or the unaccented spelling), `beneficio_economico` on
    /// "beneficio económico" (or unaccented), and `materialidad` on
    /// "materialidad" or on any notification having been recorded.
    /// `trazabilidad` becomes `true` once the decisions list reaches a
    /// length of two. This mirrors `_update_compliance_checklist` in the
    /// system this crate replaces, which scans free-text analysis the same
    /// way rather than any closed per-decision tag.
    #[must_use]
    pub fn derive(decisions: &[AgentDecision], notifications: &[NotificationRecord]) -> Self {
        let razon_de_negocios =
            decisions.iter().any(|d| rationale_contains_any(&d.rationale, &RAZON_DE_NEGOCIOS_NEEDLES));
        let beneficio_economico =
            decisions.iter().any(|d| rationale_contains_any(&d.rationale, &BENEFICIO_ECONOMICO_NEEDLES));
        let materialidad = !notifications.is_empty()
            || decisions.iter().any(|d| d.rationale.to_lowercase().contains(MATERIALIDAD_NEEDLE));
        let trazabilidad = decisions.len() >= 2;
        Self { razon_de_negocios, beneficio_economico, materialidad, trazabilidad }
    }

    /// Returns whether all four pillars are satisfied.
    #[must_use]
    pub const fn is_fully_compliant(self) -> bool {
        self.razon_de_negocios && self.beneficio_economico && self.materialidad && self.trazabilidad
    }

    /// Returns the value recorded for a single pillar.
    #[must_use]
    pub const fn get(self, pillar: CompliancePillar) -> bool {
        match pillar {
            CompliancePillar::RazonDeNegocios => self.razon_de_negocios,
            CompliancePillar::BeneficioEconomico => self.beneficio_economico,
            CompliancePillar::Materialidad => self.materialidad,
            CompliancePillar::Trazabilidad => self.trazabilidad,
        }
    }

}

/// One line of the audit-of-mutations trail, recording that some field of
/// the Defense File changed and when, independent of the decisions and
/// notifications lists themselves (which are their own audit trails).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Human-readable description of what changed.
    pub summary: String,
    /// When the change was recorded.
    pub recorded_at: Timestamp,
}

/// The append-only audit trail for a single project's deliberation.
///
/// # Invariants
/// - `decisions` only ever grows; `record_decision` appends.
/// - `compliance_checklist` is always
///   `ComplianceChecklist::derive(&decisions, &notifications)`.
/// - `final_decision`/`final_rationale` are set at most once, and only by
///   `set_final`, which no-ops on a second call.
/// - `project`/`created_at` are set at most once, together, by
///   `record_project`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseFile {
    /// Company that owns this file.
    pub company_id: CompanyId,
    /// Project this file documents.
    pub project_id: ProjectId,
    /// When the project snapshot was first recorded, i.e. when this file
    /// stopped being an empty placeholder. `None` until the first
    /// `record_project` call.
    pub created_at: Option<Timestamp>,
    /// Snapshot of the submitted project, copied in at intake per spec.md
    /// §3's "the Project value is owned by the caller and copied into the
    /// DefenseFile at intake".
    pub project: Option<Project>,
    /// Append-only sequence of recorded agent decisions, oldest first.
    pub decisions: Vec<AgentDecision>,
    /// Outbound notifications raised over the life of this deliberation.
    pub notifications: Vec<NotificationRecord>,
    /// Pointers to artifacts (uploads, rendered PDFs) associated with this
    /// project, stored outside the Defense File itself.
    pub artifact_refs: Vec<ArtifactPointer>,
    /// Audit-of-mutations trail: one entry per call that changed this file,
    /// oldest first.
    pub version_entries: Vec<VersionEntry>,
    /// The terminal decision label, set once the deliberation reaches a
    /// terminal stage.
    pub final_decision: Option<DecisionLabel>,
    /// The rationale recorded for `final_decision`.
    pub final_rationale: Option<String>,
    /// Checklist derived from `decisions` and `notifications`.
    pub compliance_checklist: ComplianceChecklist,
}

impl DefenseFile {
    /// Creates an empty Defense File for a project.
    #[must_use]
    pub fn new(company_id: CompanyId, project_id: ProjectId) -> Self {
        Self {
            company_id,
            project_id,
            created_at: None,
            project: None,
            decisions: Vec::new(),
            notifications: Vec::new(),
            artifact_refs: Vec::new(),
            version_entries: Vec::new(),
            final_decision: None,
            final_rationale: None,
            compliance_checklist: ComplianceChecklist::derive(&[], &[]),
        }
    }

    /// Records the project snapshot and the file's creation time, once. A
    /// second call is a no-op, matching spec.md §3's "the core treats a
    /// project as an immutable value once submitted".
    pub fn record_project(&mut self, project: Project, recorded_at: Timestamp) {
        if self.project.is_none() {
            self.project = Some(project);
            self.created_at = Some(recorded_at);
            self.version_entries.push(VersionEntry { summary: "project recorded".to_string(), recorded_at });
        }
    }

    /// Appends a decision and re-derives the compliance checklist.
    pub fn record_decision(&mut self, decision: AgentDecision) {
        self.version_entries.push(VersionEntry {
            summary: format!("decision recorded for stage {}", decision.stage),
            recorded_at: decision.recorded_at,
        });
        self.decisions.push(decision);
        self.compliance_checklist = ComplianceChecklist::derive(&self.decisions, &self.notifications);
    }

    /// Appends an outbound-notification record and re-derives the
    /// compliance checklist.
    pub fn record_notification(&mut self, notification: NotificationRecord) {
        self.version_entries.push(VersionEntry {
            summary: format!("notification recorded at stage {}", notification.stage),
            recorded_at: notification.recorded_at,
        });
        self.notifications.push(notification);
        self.compliance_checklist = ComplianceChecklist::derive(&self.decisions, &self.notifications);
    }

    /// Records a pointer to an artifact stored outside this file.
    pub fn record_artifact(&mut self, artifact: ArtifactPointer, recorded_at: Timestamp) {
        self.version_entries
            .push(VersionEntry { summary: format!("artifact recorded: {}", artifact.artifact_id), recorded_at });
        self.artifact_refs.push(artifact);
    }

    /// Sets the terminal decision and its rationale, once. A second call is
    /// a no-op, preserving the "set at most once" invariant from spec.md
    /// §3 even if the orchestrator were to call it twice for the same
    /// project.
    pub fn set_final(&mut self, decision: DecisionLabel, rationale: String, recorded_at: Timestamp) {
        if self.final_decision.is_none() {
            self.final_decision = Some(decision);
            self.final_rationale = Some(rationale);
            self.version_entries.push(VersionEntry { summary: "final decision recorded".to_string(), recorded_at });
        }
    }
}
