//! Phase descriptors
//!
//! The pipeline is a list of descriptors iterated in order, so every phase
//! goes through the same state machine.

use contracts::StageKind;

/// Which external operation a phase wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
    /// `validate(source)`
    Validate,
    /// `restore(source, target)`
    Restore,
    /// `configure(target)`
    Configure,
}

/// Static description of one pipeline phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDescriptor {
    pub kind: StageKind,
    pub label: &'static str,
    pub description: &'static str,
    /// Message of the `in_progress` step
    pub start_message: &'static str,
    /// Message of the `complete` step
    pub success_message: &'static str,
    /// Used when the operation gives no error text
    pub failure_message: &'static str,
    pub action: PhaseAction,
}

impl PhaseDescriptor {
    pub const VALIDATION: PhaseDescriptor = PhaseDescriptor {
        kind: StageKind::Validation,
        label: "Validation",
        description: "Checking backup file format and structure",
        start_message: "Validating backup file",
        success_message: "Backup file validated",
        failure_message: "Backup file validation failed",
        action: PhaseAction::Validate,
    };

    pub const RESTORE: PhaseDescriptor = PhaseDescriptor {
        kind: StageKind::Restore,
        label: "Restore",
        description: "Restoring database from backup",
        start_message: "Starting database restore",
        success_message: "Database restore finished",
        failure_message: "Database restore failed",
        action: PhaseAction::Restore,
    };

    pub const FINALIZE: PhaseDescriptor = PhaseDescriptor {
        kind: StageKind::Finalize,
        label: "Finalize",
        description: "Configuring and registering the restored database",
        start_message: "Configuring restored database",
        success_message: "Database configured",
        failure_message: "Database configuration failed",
        action: PhaseAction::Configure,
    };

    /// validate -> restore -> finalize
    pub fn restore_pipeline() -> Vec<PhaseDescriptor> {
        vec![Self::VALIDATION, Self::RESTORE, Self::FINALIZE]
    }

    /// Descriptor for a stage kind
    pub fn for_kind(kind: StageKind) -> PhaseDescriptor {
        match kind {
            StageKind::Validation => Self::VALIDATION,
            StageKind::Restore => Self::RESTORE,
            StageKind::Finalize => Self::FINALIZE,
        }
    }
}
