//! Domain types for provisioning configuration.
//!
//! Pure types and lookups only — no I/O, no async, no filesystem access.
//! Every field has a default so an empty YAML document is a valid config.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::phase::StagePolicy;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.gantry/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub ssh: SshConfig,
    pub retry: RetryPolicy,
    pub budgets: PhaseBudgets,
    pub system: SystemConfig,
    pub wrapper: WrapperConfig,
    pub flavours: FlavourConfig,
    pub provider: ProviderConfig,
    /// Seconds to wait before asking the scheduler to start the application.
    pub start_delay_secs: u64,
    pub stage_policy: StagePolicy,
}

/// Credential used to reach freshly created VMs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    pub private_key_path: PathBuf,
    #[serde(skip_serializing)]
    pub private_key_passphrase: Option<String>,
}

/// Linear reschedule policy for the initial connectivity probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    pub probe_timeout_secs: u64,
    pub reschedule_delay_secs: u64,
    /// Attempt number at which the controller gives up.
    pub max_attempt: u32,
}

/// Per-phase time budgets in seconds. The flavour budget is derived from
/// the flavour's estimated install time instead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PhaseBudgets {
    pub base_install_secs: u64,
    pub update_secs: u64,
    pub wrapper_install_secs: u64,
    pub port_migration_secs: u64,
    pub key_install_secs: u64,
}

/// Operating-system level setup performed by the base install.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Unprivileged account the game server runs as.
    pub service_user: String,
    pub service_group: String,
    pub swap_file: String,
    pub swap_size: String,
    pub packages: Vec<String>,
    pub python_packages: Vec<String>,
    pub app_port: u16,
    pub game_port: u16,
    pub scratch_dir: String,
}

/// The management wrapper installed next to the game server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    pub git_url: String,
    pub install_dir: String,
    pub service_name: String,
    pub auth_file: String,
    pub username: String,
}

/// Flavour install scripts and their catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlavourConfig {
    pub git_url: String,
    /// Ordered catalogue; the first entry is the fallback default.
    pub catalogue: Vec<FlavourInfo>,
}

/// One installable flavour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlavourInfo {
    /// `"<script>/<version>"`.
    pub id: String,
    pub name: String,
    pub estimated_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_url: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            ssh: SshConfig::default(),
            retry: RetryPolicy::default(),
            budgets: PhaseBudgets::default(),
            system: SystemConfig::default(),
            wrapper: WrapperConfig::default(),
            flavours: FlavourConfig::default(),
            provider: ProviderConfig::default(),
            start_delay_secs: 4,
            stage_policy: StagePolicy::default(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            private_key_path: PathBuf::from("/etc/gantry/id_rsa"),
            private_key_passphrase: None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 4,
            reschedule_delay_secs: 16,
            max_attempt: 11,
        }
    }
}

impl Default for PhaseBudgets {
    fn default() -> Self {
        Self {
            base_install_secs: 512,
            update_secs: 16,
            wrapper_install_secs: 16,
            port_migration_secs: 8,
            key_install_secs: 32,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            service_user: "mcuser".to_string(),
            service_group: "wheel".to_string(),
            swap_file: "/swapfile".to_string(),
            swap_size: "1G".to_string(),
            packages: [
                "yum-plugin-security",
                "firewalld",
                "java-1.7.0-openjdk-headless",
                "python3",
                "python3-devel",
                "python3-pip",
                "git",
                "tmux",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            python_packages: vec!["flask".to_string()],
            app_port: 5000,
            game_port: 25565,
            scratch_dir: "/tmp".to_string(),
        }
    }
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            git_url: "https://github.com/Gamocosm/minecraft-server_wrapper.git".to_string(),
            install_dir: "/opt/gamocosm".to_string(),
            service_name: "mcsw".to_string(),
            auth_file: "mcsw-auth.txt".to_string(),
            username: "gamocosm".to_string(),
        }
    }
}

impl Default for FlavourConfig {
    fn default() -> Self {
        Self {
            git_url: "https://github.com/Gamocosm/gamocosm-minecraft-flavours.git".to_string(),
            catalogue: vec![
                FlavourInfo {
                    id: "vanilla/1.8.1".to_string(),
                    name: "Vanilla 1.8.1".to_string(),
                    estimated_minutes: 1,
                },
                FlavourInfo {
                    id: "forge/1.7.10".to_string(),
                    name: "Forge 1.7.10".to_string(),
                    estimated_minutes: 2,
                },
            ],
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.digitalocean.com".to_string(),
        }
    }
}

// ── Lookups ──────────────────────────────────────────────────────────────────

impl ProvisionConfig {
    #[must_use]
    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    #[must_use]
    pub fn reschedule_delay(&self) -> Duration {
        Duration::from_secs(self.reschedule_delay_secs)
    }
}

impl FlavourConfig {
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&FlavourInfo> {
        self.catalogue.iter().find(|f| f.id == id)
    }

    #[must_use]
    pub fn default_flavour(&self) -> Option<&FlavourInfo> {
        self.catalogue.first()
    }
}

impl FlavourInfo {
    /// Estimated minutes, doubled, in seconds.
    #[must_use]
    pub fn install_budget(&self) -> Duration {
        Duration::from_secs(self.estimated_minutes.saturating_mul(60 * 2))
    }

    /// Split the id into `(script, version)`; version is empty when absent.
    #[must_use]
    pub fn script_and_version(&self) -> (&str, &str) {
        self.id.split_once('/').unwrap_or((self.id.as_str(), ""))
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
