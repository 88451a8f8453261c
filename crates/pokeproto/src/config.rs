//! # Peer Configuration
//!
//! One TOML file per peer, loaded once at startup and passed down by value.
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! ```toml
//! name = "Red"
//! verbose = true
//!
//! [discovery]
//! port_base = 50000
//! targets = ["192.168.1.255"]
//!
//! [battle]
//! pokemon = "Charizard"
//! special_attack_uses = 6
//! special_defense_uses = 4
//! mode = "B"
//!
//! [stickers]
//! "/wave" = "~o~"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use pokeproto_core::{BoostAllocation, Roster, RosterEntry};
use pokeproto_networking::{
    ChannelConfig, CommunicationMode, DiscoveryConfig, HandshakeConfig, DEFAULT_DISCOVERY_PORT, DISCOVERY_PORT_SPAN,
};
use serde::Deserialize;

use crate::chat::{default_sticker_map, StickerTable};
use crate::error::{BattleError, BattleResult};

/// Discovery section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// First well-known port.
    pub port_base: u16,
    /// Extra ports after `port_base`.
    pub port_span: u16,
    /// How long a joiner collects replies.
    pub listen_window_ms: u64,
    /// Broadcast or unicast addresses probed.
    pub targets: Vec<IpAddr>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            port_base: DEFAULT_DISCOVERY_PORT,
            port_span: DISCOVERY_PORT_SPAN,
            listen_window_ms: 3000,
            targets: vec![IpAddr::V4(Ipv4Addr::BROADCAST)],
        }
    }
}

/// ARQ section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReliabilitySettings {
    /// Age before a pending send is retransmitted.
    pub timeout_ms: u64,
    /// Retransmissions before a send is reported failed.
    pub max_retries: u32,
    /// Sweeper cadence.
    pub sweep_interval_ms: u64,
}

impl Default for ReliabilitySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            max_retries: 3,
            sweep_interval_ms: 100,
        }
    }
}

/// Handshake section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HandshakeSettings {
    /// Wait per attempt.
    pub timeout_ms: u64,
    /// Attempts before giving up.
    pub attempts: u32,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            attempts: 5,
        }
    }
}

/// Battle section: the local combatant and, for hosts, the fan-out mode.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BattleSettings {
    /// Roster name of the combatant to bring.
    pub pokemon: String,
    /// Special-attack boosts.
    pub special_attack_uses: u8,
    /// Special-defense boosts.
    pub special_defense_uses: u8,
    /// `P` (peer-to-peer) or `B` (broadcast). Hosts only.
    pub mode: String,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            pokemon: "Pikachu".to_string(),
            special_attack_uses: 5,
            special_defense_uses: 5,
            mode: CommunicationMode::PeerToPeer.as_token().to_string(),
        }
    }
}

/// Complete peer configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Trainer display name.
    pub name: String,
    /// Local address to bind.
    pub bind_ip: IpAddr,
    /// Local port. 0 lets the OS pick; hosts use `discovery.port_base`.
    pub port: u16,
    /// Debug-level logging.
    pub verbose: bool,
    /// Discovery settings.
    pub discovery: DiscoverySettings,
    /// ARQ settings.
    pub reliability: ReliabilitySettings,
    /// Handshake settings.
    pub handshake: HandshakeSettings,
    /// Combatant settings.
    pub battle: BattleSettings,
    /// Sticker token to glyph table.
    pub stickers: BTreeMap<String, String>,
    /// Extra species, added to (or replacing) the built-in roster.
    pub roster: Vec<RosterEntry>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: "trainer".to_string(),
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            verbose: false,
            discovery: DiscoverySettings::default(),
            reliability: ReliabilitySettings::default(),
            handshake: HandshakeSettings::default(),
            battle: BattleSettings::default(),
            stickers: default_sticker_map(),
            roster: Vec::new(),
        }
    }
}

impl PeerConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`BattleError::Config`] on syntax errors or invalid values.
    pub fn from_toml_str(text: &str) -> BattleResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| BattleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`BattleError::Config`] when the file is unreadable or invalid.
    pub fn load(path: &Path) -> BattleResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| BattleError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks cross-field rules.
    ///
    /// # Errors
    ///
    /// [`BattleError::Config`] describing the first invalid value.
    pub fn validate(&self) -> BattleResult<()> {
        if self.name.trim().is_empty() {
            return Err(BattleError::Config("name must not be empty".into()));
        }
        if self.reliability.timeout_ms == 0 || self.reliability.sweep_interval_ms == 0 {
            return Err(BattleError::Config("reliability intervals must be positive".into()));
        }
        if self.discovery.targets.is_empty() {
            return Err(BattleError::Config("discovery.targets must not be empty".into()));
        }
        self.communication_mode()?;
        self.boosts()?;
        Ok(())
    }

    /// Fan-out mode from `battle.mode`.
    ///
    /// # Errors
    ///
    /// [`BattleError::Config`] for anything but `P`/`B` and their spellings.
    pub fn communication_mode(&self) -> BattleResult<CommunicationMode> {
        CommunicationMode::from_token(&self.battle.mode)
            .ok_or_else(|| BattleError::Config(format!("unknown communication mode {:?}", self.battle.mode)))
    }

    /// Boost allocation from the battle section.
    ///
    /// # Errors
    ///
    /// Wraps [`pokeproto_core::CoreError::InvalidBoostAllocation`].
    pub fn boosts(&self) -> BattleResult<BoostAllocation> {
        Ok(BoostAllocation::new(
            self.battle.special_attack_uses,
            self.battle.special_defense_uses,
        )?)
    }

    /// Built-in roster plus the configured extra species.
    #[must_use]
    pub fn roster(&self) -> Roster {
        let mut roster = Roster::builtin();
        for entry in &self.roster {
            roster.insert(entry.clone());
        }
        roster
    }

    /// Sticker table.
    #[must_use]
    pub fn sticker_table(&self) -> StickerTable {
        StickerTable::from_map(self.stickers.clone())
    }

    /// Reliable channel view.
    #[must_use]
    pub const fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            timeout: Duration::from_millis(self.reliability.timeout_ms),
            max_retries: self.reliability.max_retries,
        }
    }

    /// Sweeper cadence.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.reliability.sweep_interval_ms)
    }

    /// Discovery view.
    #[must_use]
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            port_base: self.discovery.port_base,
            port_span: self.discovery.port_span,
            listen_window: Duration::from_millis(self.discovery.listen_window_ms),
            targets: self.discovery.targets.clone(),
        }
    }

    /// Handshake view.
    #[must_use]
    pub const fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            timeout: Duration::from_millis(self.handshake.timeout_ms),
            attempts: self.handshake.attempts,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Display name.
    pub name: Option<String>,
    /// Local port.
    pub port: Option<u16>,
    /// Debug logging.
    pub verbose: bool,
    /// Combatant.
    pub pokemon: Option<String>,
    /// Special-attack boosts.
    pub attack_boosts: Option<u8>,
    /// Special-defense boosts.
    pub defense_boosts: Option<u8>,
    /// Fan-out mode token (host only).
    pub mode: Option<String>,
}

impl PeerConfig {
    /// Loads `path`, or the defaults when no file is given.
    ///
    /// # Errors
    ///
    /// See [`PeerConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> BattleResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Applies flags over the file values and validates the result.
    ///
    /// # Errors
    ///
    /// [`BattleError::Config`] or a boost error when the merged values are
    /// invalid.
    pub fn with_overrides(mut self, overrides: Overrides) -> BattleResult<Self> {
        if let Some(name) = overrides.name {
            self.name = name;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        self.verbose |= overrides.verbose;
        if let Some(pokemon) = overrides.pokemon {
            self.battle.pokemon = pokemon;
        }
        if let Some(uses) = overrides.attack_boosts {
            self.battle.special_attack_uses = uses;
        }
        if let Some(uses) = overrides.defense_boosts {
            self.battle.special_defense_uses = uses;
        }
        if let Some(mode) = overrides.mode {
            self.battle.mode = mode;
        }
        self.validate()?;
        Ok(self)
    }
}
