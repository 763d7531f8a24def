//! Partial updates: apply the fields present in a payload onto an existing value
//!
//! Gateway update events carry only the fields that changed (or a full object
//! that may be older than what is cached). Decoding such a payload "onto" an
//! existing entity overwrites exactly the keys present in the payload and
//! keeps everything else.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};

/// Recursively overlay `patch` onto `target`
///
/// Objects merge key by key, every other value (arrays included) replaces
/// the target value wholesale. `null` replaces too, clearing the field.
pub fn merge_json(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value);
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Types that can absorb a partial JSON payload
pub trait Patch {
    /// Overwrite the fields present in `raw`, keep the rest
    fn patch(&mut self, raw: &Value) -> ModelResult<()>;

    /// Same as [`Patch::patch`] for an undecoded payload
    fn patch_bytes(&mut self, raw: &[u8]) -> ModelResult<()> {
        let value: Value = serde_json::from_slice(raw)?;
        self.patch(&value)
    }
}

impl<T> Patch for T
where
    T: Serialize + DeserializeOwned,
{
    fn patch(&mut self, raw: &Value) -> ModelResult<()> {
        if !raw.is_object() {
            return Err(ModelError::NotAnObject);
        }
        let mut current = serde_json::to_value(&*self)?;
        merge_json(&mut current, raw);
        *self = serde_json::from_value(current)?;
        Ok(())
    }
}
