//! Cross-crate integration test helpers.
//!
//! [`ModelHarness`] runs operations against a storage instance and a plain
//! map side by side, so any driver can be checked against the same model.

use crate::generators::StoreOperation;
use forage_codec::Value;
use forage_core::{ForageResult, LocalForage};
use std::collections::BTreeMap;

/// A storage instance paired with the map it should behave like.
pub struct ModelHarness {
    /// The instance under test.
    pub forage: LocalForage,
    model: BTreeMap<String, Value>,
}

impl ModelHarness {
    /// Wraps `forage`, which must start out empty.
    pub fn new(forage: LocalForage) -> Self {
        Self {
            forage,
            model: BTreeMap::new(),
        }
    }

    /// Applies one operation to both sides.
    ///
    /// Reads are checked against the model as they happen.
    pub async fn apply(&mut self, op: &StoreOperation) -> ForageResult<()> {
        match op {
            StoreOperation::Set { key, value } => {
                let stored = self.forage.set_item(key, value.clone()).await?;
                assert_eq!(&stored, value, "setItem must yield the stored value");
                self.model.insert(key.clone(), value.clone());
            }
            StoreOperation::Remove { key } => {
                self.forage.remove_item(key).await?;
                self.model.remove(key);
            }
            StoreOperation::Get { key } => {
                let actual = self.forage.get_item(key).await?;
                assert_eq!(actual.as_ref(), self.model.get(key), "getItem({key}) mismatch");
            }
            StoreOperation::Clear => {
                self.forage.clear().await?;
                self.model.clear();
            }
        }
        Ok(())
    }

    /// Applies every operation in order.
    pub async fn apply_all(&mut self, ops: &[StoreOperation]) -> ForageResult<()> {
        for op in ops {
            self.apply(op).await?;
        }
        Ok(())
    }

    /// Checks that length, keys and every value match the model.
    ///
    /// Key order is backend-defined, so keys are compared as sets.
    pub async fn verify(&self) -> ForageResult<()> {
        assert_eq!(self.forage.length().await?, self.model.len());

        let mut keys = self.forage.keys().await?;
        keys.sort();
        assert_eq!(keys, self.model.keys().cloned().collect::<Vec<_>>());

        for (key, expected) in &self.model {
            let actual = self.forage.get_item(key).await?;
            assert_eq!(actual.as_ref(), Some(expected), "value mismatch for {key}");
        }
        Ok(())
    }

    /// Number of entries the model holds.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::instance_for;
    use forage_core::MEMORY;

    #[tokio::test]
    async fn harness_tracks_the_model() {
        let mut harness = ModelHarness::new(instance_for(MEMORY));
        harness
            .apply_all(&[
                StoreOperation::Set {
                    key: "a".into(),
                    value: Value::from(1),
                },
                StoreOperation::Set {
                    key: "b".into(),
                    value: Value::from("two"),
                },
                StoreOperation::Remove { key: "a".into() },
                StoreOperation::Get { key: "a".into() },
            ])
            .await
            .unwrap();

        assert_eq!(harness.tracked_count(), 1);
        harness.verify().await.unwrap();
    }
}
