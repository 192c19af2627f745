use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Options du modèle de prévision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastOptions {
    /// Quantile normal de l'intervalle (1.2816 ≈ 80 %).
    pub interval_z: f64,
    /// Étendue minimale de l'historique (jours) pour la saisonnalité hebdomadaire.
    pub weekly_min_days: u32,
    /// Étendue minimale de l'historique (jours) pour la saisonnalité annuelle.
    pub yearly_min_days: u32,
    /// Borne la prévision et l'intervalle à 0.
    pub floor_at_zero: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            interval_z: 1.2816,
            weekly_min_days: 14,
            yearly_min_days: 730,
            floor_at_zero: false,
        }
    }
}

impl ForecastOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.interval_z.is_finite() || self.interval_z < 0.0 {
            anyhow::bail!("interval_z must be a finite, non-negative number");
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("need at least 2 data points for forecasting, got {found}")]
    InsufficientData { found: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("data source unavailable: {}", path.display())]
    DataSourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ForecastError {
    /// Code stable pour les sorties structurées.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InsufficientData { .. } => "insufficient_data",
            ForecastError::InvalidInput(_) => "invalid_input",
            ForecastError::DataSourceUnavailable { .. } => "data_source_unavailable",
        }
    }
}
