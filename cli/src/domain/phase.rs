//! Provisioning phases and branch selection.
//!
//! Pure data only: which phases exist, in which order each branch runs them,
//! and which checkpoint each one records.

use std::fmt;

use gantry_common::SetupStage;
use serde::{Deserialize, Serialize};

/// One remote step executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BaseInstall,
    Update,
    KeyInstall,
    FlavourInstall,
    WrapperInstall,
    PortMigration,
}

impl Phase {
    /// Gerund used in timeout diagnostics ("took too long <activity>").
    #[must_use]
    pub fn activity(self) -> &'static str {
        match self {
            Self::BaseInstall => "doing base setup",
            Self::Update => "updating",
            Self::KeyInstall => "adding SSH keys",
            Self::FlavourInstall => "installing Minecraft",
            Self::WrapperInstall => "installing the Minecraft server wrapper",
            Self::PortMigration => "changing SSH port",
        }
    }

    /// Checkpoint persisted right before the phase starts on the
    /// first-time branch. The refresh branch records no intermediate stage.
    #[must_use]
    pub fn checkpoint(self) -> Option<SetupStage> {
        match self {
            Self::BaseInstall => Some(SetupStage::BaseInstall),
            Self::KeyInstall => Some(SetupStage::SshKeys),
            Self::FlavourInstall => Some(SetupStage::ApplicationInstall),
            Self::PortMigration => Some(SetupStage::PortMigration),
            Self::Update | Self::WrapperInstall => None,
        }
    }

    /// Stage recorded while this phase is in flight. A persisted stage
    /// strictly above it means the phase returned without error.
    #[must_use]
    pub fn in_flight_stage(self) -> SetupStage {
        match self {
            Self::BaseInstall => SetupStage::BaseInstall,
            Self::KeyInstall => SetupStage::SshKeys,
            Self::FlavourInstall | Self::WrapperInstall => SetupStage::ApplicationInstall,
            Self::PortMigration => SetupStage::PortMigration,
            Self::Update => SetupStage::Complete,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BaseInstall => "base-install",
            Self::Update => "update",
            Self::KeyInstall => "key-install",
            Self::FlavourInstall => "flavour-install",
            Self::WrapperInstall => "wrapper-install",
            Self::PortMigration => "port-migration",
        };
        f.write_str(name)
    }
}

/// Which sequence of phases a run executes, chosen once at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupBranch {
    /// The server has never completed an install.
    FirstTimeInstall,
    /// The owner asked to refresh an already-provisioned server.
    Refresh,
}

impl SetupBranch {
    #[must_use]
    pub fn select(done_setup: bool) -> Self {
        if done_setup {
            Self::Refresh
        } else {
            Self::FirstTimeInstall
        }
    }

    #[must_use]
    pub fn phases(self) -> &'static [Phase] {
        match self {
            Self::FirstTimeInstall => &[
                Phase::BaseInstall,
                Phase::KeyInstall,
                Phase::FlavourInstall,
                Phase::WrapperInstall,
                Phase::PortMigration,
            ],
            Self::Refresh => &[Phase::Update, Phase::KeyInstall],
        }
    }
}

/// How a re-invoked first-time install treats the persisted stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagePolicy {
    /// Every invocation runs the whole branch; the stage is a diagnostic
    /// checkpoint only.
    #[default]
    Restart,
    /// Skip first-time phases the persisted stage shows as finished.
    /// Key installation always runs, bounded by its own pending list.
    Resume,
}

impl StagePolicy {
    /// Whether `phase` should run given the stage persisted before this run.
    #[must_use]
    pub fn should_run(self, branch: SetupBranch, phase: Phase, persisted: SetupStage) -> bool {
        match (self, branch) {
            (Self::Restart, _) | (Self::Resume, SetupBranch::Refresh) => true,
            (Self::Resume, SetupBranch::FirstTimeInstall) => {
                phase == Phase::KeyInstall || persisted <= phase.in_flight_stage()
            }
        }
    }

    /// Whether to persist `checkpoint` before its phase, given the furthest
    /// stage recorded so far. `Restart` rewrites every checkpoint so the
    /// stage always names the phase in flight; `Resume` never lowers it.
    #[must_use]
    pub fn records(self, checkpoint: SetupStage, reached: SetupStage) -> bool {
        match self {
            Self::Restart => true,
            Self::Resume => checkpoint > reached,
        }
    }
}
