use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::{EnvError, EnvOptions, Environment};
use crate::session::SessionError;

pub type EnvConstructor =
    Box<dyn Fn(&EnvOptions) -> Result<Box<dyn Environment>, EnvError> + Send + Sync>;

/// Maps environment identifiers to constructors for local sessions.
#[derive(Default)]
pub struct EnvRegistry {
    constructors: BTreeMap<String, EnvConstructor>,
}

impl fmt::Debug for EnvRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl EnvRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `constructor` under `id`, replacing any earlier registration.
    pub fn register<F, E>(&mut self, id: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&EnvOptions) -> Result<E, EnvError> + Send + Sync + 'static,
        E: Environment + 'static,
    {
        self.constructors.insert(
            id.into(),
            Box::new(move |options| {
                constructor(options).map(|env| Box::new(env) as Box<dyn Environment>)
            }),
        );
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct `id` and check that its spaces are well formed.
    pub fn make(&self, id: &str, options: &EnvOptions) -> Result<Box<dyn Environment>, SessionError> {
        let constructor = self.constructors.get(id).ok_or_else(|| {
            SessionError::Configuration(format!(
                "unknown environment '{id}' (registered: {})",
                if self.constructors.is_empty() {
                    "none".to_string()
                } else {
                    self.ids().join(", ")
                }
            ))
        })?;

        let env = constructor(options).map_err(|e| {
            SessionError::Configuration(format!("failed to construct '{id}': {e}"))
        })?;

        for (label, space) in [
            ("observation space", env.observation_space()),
            ("action space", env.action_space()),
        ] {
            space.validate().map_err(|e| {
                SessionError::Configuration(format!("'{id}' has an invalid {label}: {e}"))
            })?;
        }

        debug!(target: "agentring::env", env_id = id, "constructed local environment");
        Ok(env)
    }
}
