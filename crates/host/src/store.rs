//! The persistent mod store, reached through a narrow command interface.
//!
//! The install core never mutates shared structures directly; every write
//! is an awaited command against this trait.

use async_trait::async_trait;
use std::collections::BTreeMap;

use modforge_errors::Result;
use modforge_types::{ModEntry, ModRule, ModState, Profile};

#[async_trait]
pub trait ModStore: Send + Sync {
    /// All catalogued mods for a game, keyed by mod id.
    async fn mods(&self, game_id: &str) -> Result<BTreeMap<String, ModEntry>>;

    async fn get_mod(&self, game_id: &str, mod_id: &str) -> Result<Option<ModEntry>>;

    /// Insert or replace a mod entry.
    async fn upsert_mod(&self, game_id: &str, entry: ModEntry) -> Result<()>;

    async fn set_mod_state(&self, game_id: &str, mod_id: &str, state: ModState) -> Result<()>;

    /// Remove a mod from the catalogue. Awaited: the mod is gone when
    /// this returns.
    async fn remove_mod(&self, game_id: &str, mod_id: &str) -> Result<()>;

    async fn set_attribute(
        &self,
        game_id: &str,
        mod_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()>;

    async fn set_mod_type(&self, game_id: &str, mod_id: &str, mod_type: &str) -> Result<()>;

    async fn add_rule(&self, game_id: &str, mod_id: &str, rule: ModRule) -> Result<()>;

    async fn remove_rule(&self, game_id: &str, mod_id: &str, rule: &ModRule) -> Result<()>;

    async fn set_file_overrides(
        &self,
        game_id: &str,
        mod_id: &str,
        files: Vec<String>,
    ) -> Result<()>;

    async fn profile(&self, profile_id: &str) -> Result<Option<Profile>>;

    /// The profile currently active for a game, if any.
    async fn active_profile(&self, game_id: &str) -> Result<Option<Profile>>;

    async fn set_enabled(&self, profile_id: &str, mod_id: &str, enabled: bool) -> Result<()>;
}
