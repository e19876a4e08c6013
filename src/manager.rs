//! Registry of framework detectors and their per-framework policy.
//!
//! The manager is built explicitly and shared by `Arc`. Every change
//! (enable, disable, config update, reload) is visible to the very next turn
//! because the orchestrator snapshots [`FrameworkManager::get_enabled`] once
//! per turn.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{FrameworkConfig, FrameworksFile};
use crate::error::{Error, FrameworkError};
use crate::frameworks::{FrameworkDefinition, FrameworkDetector, FrameworkKind, all_detectors};

struct Registration {
    kind: FrameworkKind,
    /// `None` when the pattern library failed to compile.
    definition: Option<FrameworkDefinition>,
    config: FrameworkConfig,
    compile_error: Option<String>,
}

impl Registration {
    fn is_enabled(&self) -> bool {
        self.definition.is_some() && self.config.enabled
    }
}

/// A framework that takes part in the current turn.
#[derive(Debug, Clone)]
pub struct EnabledFramework {
    pub definition: FrameworkDefinition,
    pub config: FrameworkConfig,
}

impl EnabledFramework {
    pub fn kind(&self) -> FrameworkKind {
        self.definition.kind()
    }
}

/// Registry of frameworks in registration order.
#[derive(Default)]
pub struct FrameworkManager {
    registrations: RwLock<Vec<Registration>>,
}

impl FrameworkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all five built-in frameworks with policy from `file`.
    pub async fn with_builtin(file: &FrameworksFile) -> Result<Self, Error> {
        let resolved = file.resolve()?;
        let manager = Self::new();
        for detector in all_detectors() {
            let config = resolved.get(&detector.kind()).cloned().unwrap_or_default();
            manager.register(detector, config).await?;
        }
        Ok(manager)
    }

    /// Register a detector. Fails if the framework is already registered.
    ///
    /// A detector whose patterns do not compile is still registered, but
    /// disabled, with the compilation error as its reason.
    pub async fn register(
        &self,
        detector: Arc<dyn FrameworkDetector>,
        config: FrameworkConfig,
    ) -> Result<(), Error> {
        self.insert(detector, config, false).await
    }

    /// Register a detector, replacing any existing registration in place.
    pub async fn register_with_override(
        &self,
        detector: Arc<dyn FrameworkDetector>,
        config: FrameworkConfig,
    ) -> Result<(), Error> {
        self.insert(detector, config, true).await
    }

    async fn insert(
        &self,
        detector: Arc<dyn FrameworkDetector>,
        config: FrameworkConfig,
        replace: bool,
    ) -> Result<(), Error> {
        let kind = detector.kind();
        config.validate(kind)?;

        let (definition, compile_error) = match FrameworkDefinition::compile(detector) {
            Ok(definition) => (Some(definition), None),
            Err(e) => {
                tracing::error!(framework = %kind, error = %e, "Framework registered disabled");
                (None, Some(e.to_string()))
            }
        };
        let registration = Registration {
            kind,
            definition,
            config,
            compile_error,
        };

        let mut registrations = self.registrations.write().await;
        match registrations.iter().position(|r| r.kind == kind) {
            Some(_) if !replace => Err(FrameworkError::Registration(kind).into()),
            Some(index) => {
                tracing::info!(framework = %kind, "Framework registration replaced");
                registrations[index] = registration;
                Ok(())
            }
            None => {
                tracing::debug!(framework = %kind, "Framework registered");
                registrations.push(registration);
                Ok(())
            }
        }
    }

    pub async fn enable(&self, kind: FrameworkKind) -> Result<(), FrameworkError> {
        let mut registrations = self.registrations.write().await;
        let registration = registrations
            .iter_mut()
            .find(|r| r.kind == kind)
            .ok_or(FrameworkError::NotRegistered(kind))?;
        if let Some(reason) = &registration.compile_error {
            return Err(FrameworkError::Unavailable {
                framework: kind,
                reason: reason.clone(),
            });
        }
        registration.config.enabled = true;
        Ok(())
    }

    pub async fn disable(&self, kind: FrameworkKind) -> Result<(), FrameworkError> {
        let mut registrations = self.registrations.write().await;
        let registration = registrations
            .iter_mut()
            .find(|r| r.kind == kind)
            .ok_or(FrameworkError::NotRegistered(kind))?;
        registration.config.enabled = false;
        Ok(())
    }

    /// Enabled frameworks in registration order.
    pub async fn get_enabled(&self) -> Vec<EnabledFramework> {
        self.registrations
            .read()
            .await
            .iter()
            .filter(|r| r.is_enabled())
            .filter_map(|r| {
                r.definition.clone().map(|definition| EnabledFramework {
                    definition,
                    config: r.config.clone(),
                })
            })
            .collect()
    }

    pub async fn get_config(&self, kind: FrameworkKind) -> Option<FrameworkConfig> {
        self.registrations
            .read()
            .await
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.config.clone())
    }

    pub async fn set_config(&self, kind: FrameworkKind, config: FrameworkConfig) -> Result<(), Error> {
        config.validate(kind)?;
        let mut registrations = self.registrations.write().await;
        let registration = registrations
            .iter_mut()
            .find(|r| r.kind == kind)
            .ok_or(FrameworkError::NotRegistered(kind))?;
        registration.config = config;
        Ok(())
    }

    /// Replace every registered framework's policy from `file`.
    ///
    /// The file is validated as a whole first; on error nothing changes.
    /// Registered frameworks absent from the file return to defaults.
    pub async fn reload(&self, file: &FrameworksFile) -> Result<(), Error> {
        let mut resolved = file.resolve()?;
        let mut registrations = self.registrations.write().await;
        for registration in registrations.iter_mut() {
            registration.config = resolved.remove(&registration.kind).unwrap_or_default();
        }
        for kind in resolved.keys() {
            tracing::debug!(framework = %kind, "Ignoring policy for unregistered framework");
        }
        tracing::info!(frameworks = registrations.len(), "Framework policy reloaded");
        Ok(())
    }

    pub async fn reload_from_path(&self, path: &Path) -> Result<(), Error> {
        let file = FrameworksFile::load_from_path(path)?;
        self.reload(&file).await
    }

    /// Why a framework is not taking part, or `None` if it is enabled.
    pub async fn disabled_reason(&self, kind: FrameworkKind) -> Option<String> {
        let registrations = self.registrations.read().await;
        let Some(registration) = registrations.iter().find(|r| r.kind == kind) else {
            return Some("not registered".to_string());
        };
        if let Some(reason) = &registration.compile_error {
            return Some(reason.clone());
        }
        (!registration.config.enabled).then(|| "disabled by configuration".to_string())
    }

    /// Registered frameworks in registration order.
    pub async fn registered(&self) -> Vec<FrameworkKind> {
        self.registrations.read().await.iter().map(|r| r.kind).collect()
    }
}
