use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::{
    ConfigChange, ConfigKind, DistributionConfig, FieldViolation, PrioritizationConfig,
    StoredConfig, WeightingProfile,
};
use crate::workflows::allocation::domain::UserId;
use crate::workflows::allocation::repository::{ConfigurationRepository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum WeightingError {
    #[error("configuration rejected: {}", summarize(.0))]
    Validation(Vec<FieldViolation>),
    #[error("no active {0} configuration")]
    NotFound(ConfigKind),
    #[error("{kind} configuration was changed concurrently (expected active version {expected:?})")]
    StaleVersion {
        kind: ConfigKind,
        expected: Option<u32>,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validating front for the configuration repository.
pub struct ConfigurationStore<R> {
    repository: Arc<R>,
}

impl<R> Clone for ConfigurationStore<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<R> ConfigurationStore<R>
where
    R: ConfigurationRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Activate the built-in defaults for every kind that has no active configuration yet.
    pub fn bootstrap(&self) -> Result<Vec<StoredConfig>, WeightingError> {
        let mut seeded = Vec::new();
        for kind in [ConfigKind::Distribution, ConfigKind::Prioritization] {
            if self.repository.active_config(kind)?.is_some() {
                continue;
            }
            match self.propose(WeightingProfile::default_for(kind), &UserId::system()) {
                Ok(stored) => seeded.push(stored),
                // Someone else seeded it first.
                Err(WeightingError::StaleVersion { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(seeded)
    }

    pub fn active(&self, kind: ConfigKind) -> Result<StoredConfig, WeightingError> {
        self.repository
            .active_config(kind)?
            .ok_or(WeightingError::NotFound(kind))
    }

    pub fn active_distribution(&self) -> Result<(u32, DistributionConfig), WeightingError> {
        let stored = self.active(ConfigKind::Distribution)?;
        match stored.profile {
            WeightingProfile::Distribution(config) => Ok((stored.version, config)),
            WeightingProfile::Prioritization(_) => {
                Err(WeightingError::NotFound(ConfigKind::Distribution))
            }
        }
    }

    pub fn active_prioritization(&self) -> Result<(u32, PrioritizationConfig), WeightingError> {
        let stored = self.active(ConfigKind::Prioritization)?;
        match stored.profile {
            WeightingProfile::Prioritization(config) => Ok((stored.version, config)),
            WeightingProfile::Distribution(_) => {
                Err(WeightingError::NotFound(ConfigKind::Prioritization))
            }
        }
    }

    /// Validate and activate a new version, recording one history entry per changed field.
    pub fn propose(
        &self,
        profile: WeightingProfile,
        actor: &UserId,
    ) -> Result<StoredConfig, WeightingError> {
        let violations = profile.violations();
        if !violations.is_empty() {
            return Err(WeightingError::Validation(violations));
        }

        let kind = profile.kind();
        let current = self.repository.active_config(kind)?;
        let expected = current.as_ref().map(|stored| stored.version);
        let version = expected.unwrap_or(0) + 1;
        let now = Utc::now();

        let previous: BTreeMap<&'static str, String> = current
            .as_ref()
            .map(|stored| stored.profile.fields().into_iter().collect())
            .unwrap_or_default();

        let changes: Vec<ConfigChange> = profile
            .fields()
            .into_iter()
            .filter(|(field, value)| previous.get(*field) != Some(value))
            .map(|(field, value)| ConfigChange {
                kind,
                version,
                field: field.to_string(),
                old_value: previous.get(field).cloned(),
                new_value: value,
                changed_by: actor.clone(),
                changed_at: now,
            })
            .collect();
        let changed_fields = changes.len();

        let config = StoredConfig {
            version,
            active: true,
            profile,
            created_by: actor.clone(),
            created_at: now,
        };

        let stored = self
            .repository
            .activate_config(expected, config, changes)
            .map_err(|err| match err {
                RepositoryError::Conflict => WeightingError::StaleVersion { kind, expected },
                other => WeightingError::Repository(other),
            })?;

        info!(
            %kind,
            version = stored.version,
            changed_fields,
            actor = %actor,
            "weighting configuration activated"
        );
        Ok(stored)
    }

    pub fn history(
        &self,
        kind: ConfigKind,
        limit: usize,
    ) -> Result<Vec<ConfigChange>, WeightingError> {
        Ok(self.repository.config_history(kind, limit)?)
    }

    pub fn versions(&self, kind: ConfigKind) -> Result<Vec<StoredConfig>, WeightingError> {
        Ok(self.repository.config_versions(kind)?)
    }
}
