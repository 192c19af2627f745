//! Configuration applicative (fichier JSON).
//!
//! Tous les champs ont une valeur par défaut ; un fichier partiel complète
//! la configuration par défaut.

use crate::forecast::ForecastOptions;
use crate::notification::TextSchedule;
use crate::policy::StaffingPolicy;
use crate::scheduler::{GenerateOptions, ScheduleGenerator};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Expéditeur affiché dans les messages.
    pub sender: String,
    pub subject_prefix: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender: "No Reply <noreply@example.com>".to_string(),
            subject_prefix: TextSchedule::default().subject_prefix,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub policy: StaffingPolicy,
    pub forecast: ForecastOptions,
    pub notification: NotificationConfig,
    pub forecast_buffer_days: u32,
    /// Interdit d'affecter un employé à deux shifts qui se chevauchent.
    pub prevent_overlap: bool,
    /// Heures maximales par employé et par semaine ; aucune limite si absent.
    pub weekly_hour_limit: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            policy: StaffingPolicy::restaurant(),
            forecast: ForecastOptions::default(),
            notification: NotificationConfig::default(),
            forecast_buffer_days: GenerateOptions::default().forecast_buffer_days,
            prevent_overlap: false,
            weekly_hour_limit: None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.policy.validate().context("invalid staffing policy")?;
        self.forecast.validate().context("invalid forecast options")?;
        if !self.notification.sender.contains('@') {
            bail!("notification sender must contain an email address");
        }
        Ok(())
    }

    pub fn generator(&self) -> ScheduleGenerator {
        ScheduleGenerator::new(self.policy.clone())
            .with_forecast_options(self.forecast)
            .with_options(GenerateOptions {
                forecast_buffer_days: self.forecast_buffer_days,
                prevent_overlap: self.prevent_overlap,
                weekly_hour_limit: self.weekly_hour_limit,
            })
    }

    pub fn renderer(&self) -> TextSchedule {
        TextSchedule {
            subject_prefix: self.notification.subject_prefix.clone(),
        }
    }
}

/// Charge et valide une configuration ; une erreur ici est fatale au démarrage.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: AppConfig = serde_json::from_slice(&data)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
