use crate::error::{Result, TedanaError};
use crate::manual::{parse_manual_list, ManualInput};
use crate::metrics::MetricsTable;
use crate::types::ComponentSet;

/// Tag added to every manually reclassified component
pub const MANUAL_TAG: &str = "Manual reclassify";
/// Rationale code recorded for manual decisions
pub const MANUAL_RATIONALE: &str = "manual";

/// User-supplied accept/reject sets. The two sets never intersect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManualOverrides {
    accept: ComponentSet,
    reject: ComponentSet,
}

impl ManualOverrides {
    pub fn new(accept: ComponentSet, reject: ComponentSet) -> Result<Self> {
        let both: Vec<usize> = accept.intersection(&reject).copied().collect();
        if !both.is_empty() {
            return Err(TedanaError::ConflictingOverrides(both));
        }
        Ok(Self { accept, reject })
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_inputs(accept: &ManualInput, reject: &ManualInput) -> Result<Self> {
        let accept = parse_manual_list(accept)?;
        let reject = parse_manual_list(reject)?;
        Self::new(accept, reject)
    }

    pub fn accept(&self) -> &ComponentSet {
        &self.accept
    }

    pub fn reject(&self) -> &ComponentSet {
        &self.reject
    }

    pub fn is_empty(&self) -> bool {
        self.accept.is_empty() && self.reject.is_empty()
    }

    /// Every component touched by a manual decision
    pub fn locked(&self) -> ComponentSet {
        self.accept.union(&self.reject).copied().collect()
    }

    /// Fail if any override names a component the table does not have.
    pub fn check_against(&self, table: &MetricsTable) -> Result<()> {
        let locked = self.locked();
        let missing = table.missing_indices(locked.iter());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TedanaError::ComponentsOutOfRange {
                indices: missing,
                n_components: table.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Component;

    fn set(values: &[usize]) -> ComponentSet {
        values.iter().copied().collect()
    }

    #[test]
    fn test_intersection_is_error() {
        let err = ManualOverrides::new(set(&[1, 2, 3]), set(&[3, 2, 9])).unwrap_err();
        match &err {
            TedanaError::ConflictingOverrides(both) => assert_eq!(both, &vec![2, 3]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err
            .to_string()
            .contains("The following components were both accepted and rejected"));
    }

    #[test]
    fn test_from_inputs() {
        let overrides =
            ManualOverrides::from_inputs(&"1,2,3".into(), &ManualInput::Indices(vec![4, 5, 6]))
                .unwrap();
        assert_eq!(overrides.accept(), &set(&[1, 2, 3]));
        assert_eq!(overrides.reject(), &set(&[4, 5, 6]));
        assert_eq!(overrides.locked(), set(&[1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_out_of_range() {
        let mut table = MetricsTable::new(vec!["kappa".to_string()]);
        for i in 0..3 {
            table.insert(Component::new(i, format!("ICA_{:02}", i))).unwrap();
        }
        let overrides = ManualOverrides::new(set(&[0, 7]), set(&[12])).unwrap();
        let err = overrides.check_against(&table).unwrap_err();
        match err {
            TedanaError::ComponentsOutOfRange {
                indices,
                n_components,
            } => {
                assert_eq!(indices, vec![7, 12]);
                assert_eq!(n_components, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
