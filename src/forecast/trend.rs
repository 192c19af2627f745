/// Tendance linéaire ajustée par moindres carrés ordinaires sur `t` (jours).
#[derive(Debug, Clone, Copy)]
pub(super) struct LinearTrend {
    pub intercept: f64,
    pub slope: f64,
    pub mean_t: f64,
    /// Somme des carrés des écarts de `t`.
    pub sxx: f64,
    pub n: usize,
}

impl LinearTrend {
    /// `ts` doit contenir au moins deux valeurs distinctes.
    pub fn fit(ts: &[f64], ys: &[f64]) -> Self {
        let n = ts.len();
        let nf = n as f64;
        let mean_t = ts.iter().map(|t| t / nf).sum::<f64>();
        let mean_y = ys.iter().map(|y| y / nf).sum::<f64>();

        let (sxx, sxy) = ts
            .iter()
            .zip(ys)
            .fold((0.0, 0.0), |(sxx, sxy), (t, y)| {
                let dt = t - mean_t;
                (sxx + dt * dt, sxy + dt * (y - mean_y))
            });

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        Self {
            intercept: mean_y - slope * mean_t,
            slope,
            mean_t,
            sxx,
            n,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.slope.is_finite() && self.sxx.is_finite()
    }

    pub fn at(&self, t: f64) -> f64 {
        self.intercept + self.slope * t
    }

    /// Facteur d'élargissement de l'intervalle de prédiction OLS au point `t`.
    pub fn spread(&self, t: f64) -> f64 {
        let leverage = if self.sxx > 0.0 {
            (t - self.mean_t).powi(2) / self.sxx
        } else {
            0.0
        };
        (1.0 + 1.0 / self.n as f64 + leverage).sqrt()
    }
}
