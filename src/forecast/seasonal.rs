use chrono::{Datelike, NaiveDate};

/// Effets saisonniers additifs, centrés sur zéro.
///
/// Un bucket sans observation vaut 0.
#[derive(Debug, Clone)]
pub(super) struct SeasonalEffects<const N: usize> {
    effects: [f64; N],
}

impl<const N: usize> SeasonalEffects<N> {
    pub fn none() -> Self {
        Self { effects: [0.0; N] }
    }

    /// Moyenne des résidus par bucket, puis recentrage sur les buckets observés.
    pub fn fit<F>(dates: &[NaiveDate], residuals: &[f64], bucket: F) -> Self
    where
        F: Fn(NaiveDate) -> usize,
    {
        let mut sums = [0.0; N];
        let mut counts = [0usize; N];
        for (date, r) in dates.iter().zip(residuals) {
            let b = bucket(*date);
            sums[b] += r;
            counts[b] += 1;
        }

        let mut effects = [0.0; N];
        let mut observed = 0usize;
        for b in 0..N {
            if counts[b] > 0 {
                effects[b] = sums[b] / counts[b] as f64;
                observed += 1;
            }
        }
        if observed > 0 {
            let mean = effects.iter().sum::<f64>() / observed as f64;
            for b in 0..N {
                if counts[b] > 0 {
                    effects[b] -= mean;
                }
            }
        }
        Self { effects }
    }

    pub fn effect(&self, bucket: usize) -> f64 {
        self.effects[bucket]
    }
}

pub(super) fn weekday_bucket(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

pub(super) fn month_bucket(date: NaiveDate) -> usize {
    date.month0() as usize
}
