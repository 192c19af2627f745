use super::types::{MonthPlan, SchedError};
use crate::storage::{ShiftStore, StorageError};
use tracing::{error, info};

/// Remplace atomiquement les shifts du mois par ceux du plan.
///
/// Renvoie le nombre de shifts préexistants supprimés. En cas d'échec, la
/// transaction est annulée et l'état persisté reste celui d'avant le run.
pub(super) fn commit_plan<S: ShiftStore + ?Sized>(
    store: &mut S,
    plan: &MonthPlan,
) -> Result<usize, SchedError> {
    let (start, end) = plan.month.range();

    store.begin()?;
    let outcome = (|| -> Result<usize, StorageError> {
        let cleared = store.delete_range(start, end)?;
        info!(month = %plan.month, cleared, "existing shifts cleared (pending commit)");
        store.insert(&plan.slots)?;
        store.commit()?;
        Ok(cleared)
    })();

    match outcome {
        Ok(cleared) => {
            info!(month = %plan.month, created = plan.slots.len(), "shifts committed");
            Ok(cleared)
        }
        Err(err) => {
            store.rollback();
            error!(month = %plan.month, error = %err, "commit failed, transaction rolled back");
            Err(SchedError::Persistence(err))
        }
    }
}
