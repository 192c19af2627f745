//! Prévision de la demande journalière.
//!
//! Décomposition additive : tendance linéaire + saisonnalité hebdomadaire
//! (moyenne par jour de semaine) + saisonnalité annuelle (moyenne par mois).
//! L'intervalle est celui de la prédiction OLS, qui s'élargit avec la distance
//! à la dernière observation. Aucun cache : un modèle neuf par appel.

mod seasonal;
mod trend;
mod types;

pub use types::{ForecastError, ForecastOptions};

use crate::calendar::days_between;
use crate::model::{ForecastPoint, HistoricalObservation};
use chrono::{Duration, NaiveDate};
use seasonal::{month_bucket, weekday_bucket, SeasonalEffects};
use trend::LinearTrend;
use tracing::debug;

/// Modèle ajusté sur un historique.
#[derive(Debug, Clone)]
pub struct DemandModel {
    origin: NaiveDate,
    last: NaiveDate,
    trend: LinearTrend,
    weekly: SeasonalEffects<7>,
    yearly: SeasonalEffects<12>,
    sigma: f64,
    opts: ForecastOptions,
}

impl DemandModel {
    /// Ajuste le modèle ; l'historique doit être strictement chronologique.
    pub fn fit(
        history: &[HistoricalObservation],
        opts: ForecastOptions,
    ) -> Result<Self, ForecastError> {
        validate_history(history)?;

        let origin = history[0].date;
        let last = history[history.len() - 1].date;
        let span = days_between(origin, last);

        let dates: Vec<NaiveDate> = history.iter().map(|o| o.date).collect();
        let ts: Vec<f64> = dates.iter().map(|d| days_between(origin, *d) as f64).collect();
        let ys: Vec<f64> = history.iter().map(|o| o.value).collect();

        let trend = LinearTrend::fit(&ts, &ys);
        let mut residuals: Vec<f64> = ts.iter().zip(&ys).map(|(t, y)| y - trend.at(*t)).collect();

        let weekly = if span >= i64::from(opts.weekly_min_days) {
            SeasonalEffects::fit(&dates, &residuals, weekday_bucket)
        } else {
            SeasonalEffects::none()
        };
        for (date, r) in dates.iter().zip(residuals.iter_mut()) {
            *r -= weekly.effect(weekday_bucket(*date));
        }

        let yearly = if span >= i64::from(opts.yearly_min_days) {
            SeasonalEffects::fit(&dates, &residuals, month_bucket)
        } else {
            SeasonalEffects::none()
        };
        for (date, r) in dates.iter().zip(residuals.iter_mut()) {
            *r -= yearly.effect(month_bucket(*date));
        }

        let dof = history.len().saturating_sub(2).max(1) as f64;
        let sse: f64 = residuals.iter().map(|r| r * r).sum();
        let sigma = (sse / dof).sqrt();
        if !trend.is_finite() || !sigma.is_finite() {
            return Err(ForecastError::InvalidInput(
                "values too large to fit a trend".to_string(),
            ));
        }

        debug!(
            observations = history.len(),
            slope = trend.slope,
            sigma,
            "demand model fitted"
        );

        Ok(Self {
            origin,
            last,
            trend,
            weekly,
            yearly,
            sigma,
            opts,
        })
    }

    pub fn last_observed(&self) -> NaiveDate {
        self.last
    }

    pub fn residual_sigma(&self) -> f64 {
        self.sigma
    }

    /// Point de prévision pour une date quelconque.
    pub fn predict(&self, date: NaiveDate) -> ForecastPoint {
        let t = days_between(self.origin, date) as f64;
        let mut predicted = self.trend.at(t)
            + self.weekly.effect(weekday_bucket(date))
            + self.yearly.effect(month_bucket(date));
        let half = self.opts.interval_z * self.sigma * self.trend.spread(t);
        let mut lower = predicted - half;
        let mut upper = predicted + half;

        // la largeur reste au moins 2 * half une fois bornée à 0
        if self.opts.floor_at_zero {
            predicted = predicted.max(0.0);
            lower = lower.max(0.0);
            upper = upper.max(lower + 2.0 * half);
        }

        ForecastPoint {
            date,
            predicted,
            lower,
            upper,
        }
    }

    /// Un point par jour de `[dernière date, dernière date + horizon]`.
    pub fn project(&self, horizon_days: u32) -> Vec<ForecastPoint> {
        (0..=i64::from(horizon_days))
            .map(|offset| self.predict(self.last + Duration::days(offset)))
            .collect()
    }
}

/// Prévision de `horizon_days` jours au-delà de la dernière observation.
///
/// Le résultat commence par la dernière date observée (valeur ajustée).
pub fn forecast(
    history: &[HistoricalObservation],
    horizon_days: u32,
    opts: &ForecastOptions,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    if horizon_days == 0 {
        return Err(ForecastError::InvalidInput(
            "periods to predict must be a positive integer".to_string(),
        ));
    }
    let model = DemandModel::fit(history, *opts)?;
    let points = model.project(horizon_days);
    if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
        return Err(ForecastError::InvalidInput(format!(
            "forecast overflows on {}",
            bad.date
        )));
    }
    Ok(points)
}

fn validate_history(history: &[HistoricalObservation]) -> Result<(), ForecastError> {
    if history.len() < 2 {
        return Err(ForecastError::InsufficientData {
            found: history.len(),
        });
    }
    if let Some(bad) = history.iter().find(|o| !o.value.is_finite()) {
        return Err(ForecastError::InvalidInput(format!(
            "non-numeric value on {}",
            bad.date
        )));
    }
    if let Some(pair) = history.windows(2).find(|w| w[1].date <= w[0].date) {
        return Err(ForecastError::InvalidInput(format!(
            "dates must be unique and chronological ({} then {})",
            pair[0].date, pair[1].date
        )));
    }
    Ok(())
}
