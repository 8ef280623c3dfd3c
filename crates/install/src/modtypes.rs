//! Game-specific mod-type classification.
//!
//! A mod-type selects deployment behavior downstream. Each game registers
//! testers; after the installer ran, the highest-priority tester that
//! recognises the instruction list names the type.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use modforge_errors::Result;
use modforge_types::Instruction;

#[async_trait]
pub trait ModTypeTest: Send + Sync {
    fn type_id(&self) -> &str;

    fn priority(&self) -> i32;

    /// Does this instruction list look like a mod of this type?
    async fn test(&self, instructions: &[Instruction]) -> Result<bool>;
}

/// Mod-type testers per game, kept sorted by descending priority.
#[derive(Default)]
pub struct ModTypeRegistry {
    by_game: HashMap<String, Vec<Arc<dyn ModTypeTest>>>,
}

impl ModTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, game_id: &str, mod_type: Arc<dyn ModTypeTest>) {
        let testers = self.by_game.entry(game_id.to_string()).or_default();
        let pos = testers
            .iter()
            .position(|t| t.priority() < mod_type.priority())
            .unwrap_or(testers.len());
        testers.insert(pos, mod_type);
    }

    #[must_use]
    pub fn snapshot(&self, game_id: &str) -> Vec<Arc<dyn ModTypeTest>> {
        self.by_game.get(game_id).cloned().unwrap_or_default()
    }

    /// First matching tester names the type; none matching means the
    /// default (empty) type.
    ///
    /// # Errors
    ///
    /// Propagates a failing tester.
    pub async fn determine(
        testers: &[Arc<dyn ModTypeTest>],
        instructions: &[Instruction],
    ) -> Result<String> {
        for tester in testers {
            if tester.test(instructions).await? {
                return Ok(tester.type_id().to_string());
            }
        }
        Ok(String::new())
    }
}
