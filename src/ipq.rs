//! Failure-artifact export (§6, §7): on an unrecoverable engine error, the
//! driver writes out the current query — live bounds included, since by then
//! they've drifted far from the ingested originals — so the run can be
//! replayed and debugged offline. Thin atop [`crate::query::InputQuery::save_query`];
//! the only addition here is folding the live [`crate::bounds::BoundManager`]
//! back into the query before writing, which `save_query` alone doesn't do.

use std::path::Path;

use crate::bounds::BoundManager;
use crate::error::EngineError;
use crate::query::InputQuery;

/// Writes `<query_id>.ipq`: `query`'s static shape with its bounds
/// overwritten by the live values from `bounds` at the moment of failure.
pub fn export_failed_query(query: &InputQuery, bounds: &BoundManager, path: &Path) -> Result<(), EngineError> {
    let mut snapshot = query.clone();
    for variable in 0..snapshot.get_number_of_variables() {
        snapshot.set_lower_bound(variable, bounds.get_lower_bound(variable));
        snapshot.set_upper_bound(variable, bounds.get_upper_bound(variable));
    }
    snapshot.save_query(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_writes_live_bounds_not_original_ones() {
        let mut query = InputQuery::new(2);
        query.set_lower_bound(0, -1.0);
        query.set_upper_bound(0, 1.0);
        query.set_lower_bound(1, -1.0);
        query.set_upper_bound(1, 1.0);

        let mut bounds = BoundManager::new(2);
        bounds.initialize_bounds(0, 0.25, 0.75);
        bounds.initialize_bounds(1, -1.0, 1.0);

        let dir = std::env::temp_dir();
        let path = dir.join(format!("ipq_export_test_{:?}.ipq", std::thread::current().id()));

        export_failed_query(&query, &bounds, &path).unwrap();
        let reloaded = InputQuery::load_query(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(reloaded.get_lower_bound(0), 0.25);
        assert_eq!(reloaded.get_upper_bound(0), 0.75);
    }
}
