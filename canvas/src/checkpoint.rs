//! Last-run state: batch order plus the account being processed.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub order: Vec<String>,
    pub account_hash: String,
}

impl Checkpoint {
    pub fn new(order: Vec<String>) -> Self {
        let account_hash = order.first().cloned().unwrap_or_default();
        Checkpoint { order, account_hash }
    }

    /// `Ok(None)` when no checkpoint was written yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Where a resumed run would start: the checkpoint order rotated so the
    /// recorded account comes first, followed by everything after it.
    /// `None` unless `ids` is exactly the checkpointed batch.
    pub fn resume_plan(&self, ids: &[String]) -> Option<Vec<String>> {
        let mut saved = self.order.clone();
        let mut current = ids.to_vec();
        saved.sort();
        current.sort();
        if saved != current {
            return None;
        }
        let start = self.order.iter().position(|id| *id == self.account_hash)?;
        Some(self.order[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resumes_only_the_same_batch() {
        let cp = Checkpoint {
            order: ids(&["c", "a", "b"]),
            account_hash: "a".to_string(),
        };
        assert_eq!(cp.resume_plan(&ids(&["a", "b", "c"])), Some(ids(&["a", "b"])));
        assert_eq!(cp.resume_plan(&ids(&["a", "b"])), None);
        assert_eq!(cp.resume_plan(&ids(&["a", "b", "c", "d"])), None);
        assert_eq!(cp.resume_plan(&ids(&["a", "b", "b"])), None);

        let lost = Checkpoint {
            account_hash: "z".to_string(),
            ..cp
        };
        assert_eq!(lost.resume_plan(&ids(&["a", "b", "c"])), None);
    }

    #[test]
    fn file_round_trip_uses_the_json_layout() {
        let path = std::env::temp_dir().join(format!("{}.json", uuid::Uuid::new_v4().simple()));
        assert_eq!(Checkpoint::load(&path).unwrap(), None);

        let mut cp = Checkpoint::new(ids(&["0x01", "0x02"]));
        assert_eq!(cp.account_hash, "0x01");
        cp.account_hash = "0x02".to_string();
        cp.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["order"][1], "0x02");
        assert_eq!(raw["account_hash"], "0x02");
        assert_eq!(Checkpoint::load(&path).unwrap(), Some(cp));
        std::fs::remove_file(&path).unwrap();
    }
}
