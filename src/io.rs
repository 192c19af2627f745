use crate::forecast::ForecastError;
use crate::model::{Employee, EmployeeId, ForecastPoint, HistoricalObservation, ShiftSlot};
use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Historique depuis CSV : colonnes `ds` (date) et `y` (valeur), dans n'importe
/// quel ordre ; les autres colonnes sont ignorées. Le résultat est trié par date.
pub fn read_history_csv<P: AsRef<Path>>(path: P) -> Result<Vec<HistoricalObservation>, ForecastError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ForecastError::DataSourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(file);

    let headers = rdr
        .headers()
        .map_err(|e| ForecastError::InvalidInput(format!("error reading CSV header: {e}")))?
        .clone();
    let ds = headers.iter().position(|h| h == "ds");
    let y = headers.iter().position(|h| h == "y");
    let (Some(ds), Some(y)) = (ds, y) else {
        return Err(ForecastError::InvalidInput(
            "CSV input must contain 'ds' and 'y' columns".to_string(),
        ));
    };

    let mut out = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let row = idx + 2;
        let rec = rec.map_err(|e| ForecastError::InvalidInput(format!("row {row}: {e}")))?;
        let raw_date = rec.get(ds).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| {
            ForecastError::InvalidInput(format!("row {row}: invalid date in 'ds': {raw_date:?}"))
        })?;
        let raw_value = rec.get(y).unwrap_or("");
        let value = raw_value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                ForecastError::InvalidInput(format!("row {row}: non-numeric value in 'y': {raw_value:?}"))
            })?;
        out.push(HistoricalObservation::new(date, value));
    }
    out.sort_by_key(|o| o.date);
    Ok(out)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = raw.parse::<DateTime<Utc>>() {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Import d'employés depuis CSV: header `id,name,position,email,hourly_rate`.
///
/// Un `id` vide est généré ; poste, email et taux peuvent être vides.
pub fn import_employees_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Employee>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = rec.get(0).unwrap_or("");
        let name = rec.get(1).context("missing name")?;
        if name.is_empty() {
            bail!("invalid employee row (empty name)");
        }
        let id = if id.is_empty() {
            EmployeeId::random()
        } else {
            EmployeeId::new(id)
        };
        if !seen.insert(id.clone()) {
            bail!("duplicate employee id: {}", id.as_str());
        }

        let mut employee = Employee::new(name);
        employee.id = id;
        employee.position = non_empty(rec.get(2));
        employee.email = non_empty(rec.get(3));
        if let Some(email) = &employee.email {
            if !email.contains('@') {
                bail!("invalid email for {name}: {email}");
            }
        }
        if let Some(rate) = non_empty(rec.get(4)) {
            let rate: f64 = rate
                .parse()
                .with_context(|| format!("invalid hourly_rate for {name}"))?;
            if !rate.is_finite() || rate < 0.0 {
                bail!("hourly_rate cannot be negative for {name}");
            }
            employee.hourly_rate = Some(rate);
        }
        out.push(employee);
    }
    Ok(out)
}

fn non_empty(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Export CSV des slots: header `id,shift_type,position,start,end,employee_id,employee_name`
pub fn export_shifts_csv<P: AsRef<Path>>(
    path: P,
    slots: &[ShiftSlot],
    employees: &[Employee],
) -> anyhow::Result<()> {
    let names: HashMap<&EmployeeId, &str> =
        employees.iter().map(|e| (&e.id, e.name.as_str())).collect();
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record([
        "id",
        "shift_type",
        "position",
        "start",
        "end",
        "employee_id",
        "employee_name",
    ])?;
    for s in slots {
        let employee_id = s.employee.as_ref().map(EmployeeId::as_str).unwrap_or("");
        let employee_name = s
            .employee
            .as_ref()
            .and_then(|id| names.get(id).copied())
            .unwrap_or("");
        let start = s.start.to_rfc3339();
        let end = s.end.to_rfc3339();
        w.write_record([
            s.id.as_str(),
            s.shift_type.as_str(),
            s.position.as_str(),
            start.as_str(),
            end.as_str(),
            employee_id,
            employee_name,
        ])?;
    }
    w.flush()?;
    Ok(())
}

/// Écrit la prévision en JSON (tableau de `{ds, yhat, yhat_lower, yhat_upper}`).
pub fn write_forecast_json<W: Write>(mut writer: W, points: &[ForecastPoint]) -> anyhow::Result<()> {
    serde_json::to_writer(&mut writer, points)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Export JSON de la prévision (jolie mise en forme)
pub fn export_forecast_json<P: AsRef<Path>>(path: P, points: &[ForecastPoint]) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(points)?;
    fs::write(path, s)?;
    Ok(())
}
