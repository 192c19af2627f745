use crate::model::StaffingRequirement;
use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Table `type de shift → poste → effectif`.
pub type NeedsTable = BTreeMap<String, BTreeMap<String, u32>>;

/// Fenêtre horaire nominale d'un type de shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftType {
    pub name: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ShiftType {
    pub fn new<N: Into<String>>(name: N, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            name: name.into(),
            start_time,
            end_time,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("shift type name cannot be empty");
        }
        if self.start_time == self.end_time {
            bail!(
                "shift type {}: start_time and end_time cannot be equal",
                self.name
            );
        }
        Ok(())
    }
}

/// Politique d'effectifs : table de base + renfort au-delà d'un seuil de demande.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingPolicy {
    pub demand_threshold: f64,
    pub shift_types: Vec<ShiftType>,
    pub base_needs: NeedsTable,
    #[serde(default)]
    pub high_demand_extra: NeedsTable,
}

impl Default for StaffingPolicy {
    fn default() -> Self {
        Self::restaurant()
    }
}

impl StaffingPolicy {
    /// Politique par défaut d'un restaurant : service de jour et service du soir.
    pub fn restaurant() -> Self {
        let day = needs(&[
            ("Manager", 1),
            ("Host/Hostess", 1),
            ("Server", 1),
            ("Bartender", 1),
            ("Chef de Partie", 1),
            ("Cook", 2),
            ("Dishwasher", 1),
            ("Chef", 1),
        ]);
        let eve = needs(&[
            ("Manager", 1),
            ("Host/Hostess", 1),
            ("Server", 3),
            ("Bartender", 1),
            ("Chef de Partie", 2),
            ("Cook", 4),
            ("Dishwasher", 2),
            ("Sous Chef", 1),
        ]);

        let mut base_needs = NeedsTable::new();
        base_needs.insert("Day".to_string(), day);
        base_needs.insert("Eve".to_string(), eve);

        let mut high_demand_extra = NeedsTable::new();
        high_demand_extra.insert("Eve".to_string(), needs(&[("Server", 2), ("Cook", 2)]));

        Self {
            demand_threshold: 175.0,
            shift_types: vec![
                ShiftType::new("Day", hm(10, 0), hm(18, 0)),
                ShiftType::new("Eve", hm(16, 0), hm(0, 0)),
            ],
            base_needs,
            high_demand_extra,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.demand_threshold.is_finite() {
            bail!("demand_threshold must be a finite number");
        }
        if self.shift_types.is_empty() {
            bail!("policy must declare at least one shift type");
        }
        let mut names = HashSet::new();
        for shift_type in &self.shift_types {
            shift_type.validate()?;
            if !names.insert(shift_type.name.as_str()) {
                bail!("duplicate shift type: {}", shift_type.name);
            }
        }
        validate_table("base_needs", &self.base_needs, &names)?;
        validate_table("high_demand_extra", &self.high_demand_extra, &names)?;
        Ok(())
    }

    pub fn shift_type(&self, name: &str) -> Option<&ShiftType> {
        self.shift_types.iter().find(|s| s.name == name)
    }

    pub fn is_high_demand(&self, predicted_demand: f64) -> bool {
        predicted_demand >= self.demand_threshold
    }

    /// Effectif requis par poste pour un type de shift et une demande prévue.
    ///
    /// Au-delà du seuil (inclus), le renfort s'ajoute poste par poste, y compris
    /// pour les postes absents de la table de base.
    pub fn required_positions(
        &self,
        shift_type: &str,
        predicted_demand: f64,
    ) -> BTreeMap<String, u32> {
        let mut out = self.base_needs.get(shift_type).cloned().unwrap_or_default();
        if self.is_high_demand(predicted_demand) {
            if let Some(extra) = self.high_demand_extra.get(shift_type) {
                for (position, count) in extra {
                    *out.entry(position.clone()).or_insert(0) += count;
                }
            }
        }
        out
    }

    /// Besoins non nuls, dans l'ordre des postes.
    pub fn requirements(&self, shift_type: &str, predicted_demand: f64) -> Vec<StaffingRequirement> {
        self.required_positions(shift_type, predicted_demand)
            .into_iter()
            .filter(|(_, headcount)| *headcount > 0)
            .map(|(position, headcount)| StaffingRequirement {
                shift_type: shift_type.to_string(),
                position,
                headcount,
            })
            .collect()
    }
}

pub fn load_policy_from_file<P: AsRef<Path>>(path: P) -> Result<StaffingPolicy> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading policy {}", path.display()))?;
    let policy: StaffingPolicy = serde_json::from_slice(&data)
        .with_context(|| format!("parsing policy {}", path.display()))?;
    policy.validate()?;
    Ok(policy)
}

pub fn export_policy_json<P: AsRef<Path>>(path: P, policy: &StaffingPolicy) -> Result<()> {
    let json = serde_json::to_string_pretty(policy)?;
    fs::write(path, json)?;
    Ok(())
}

fn validate_table(label: &str, table: &NeedsTable, shift_names: &HashSet<&str>) -> Result<()> {
    for (shift_type, positions) in table {
        if !shift_names.contains(shift_type.as_str()) {
            bail!("{label} references undeclared shift type {shift_type}");
        }
        if positions.keys().any(|p| p.trim().is_empty()) {
            bail!("{label} for {shift_type} contains an empty position name");
        }
    }
    Ok(())
}

fn needs(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries
        .iter()
        .map(|(position, count)| (position.to_string(), *count))
        .collect()
}

fn hm(hour: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, min, 0).unwrap_or(NaiveTime::MIN)
}
