//! ICA decomposition seam
//!
//! The classification core does not run ICA itself. A `Decomposer` is handed
//! a [timepoints × voxels] data matrix and returns the mixing matrix and
//! component maps; the result is checked here before anything downstream
//! sees it.

use crate::config::DecompositionConfig;
use crate::error::{Result, TedanaError};
use crate::mixing::MixingMatrix;
use nalgebra::DMatrix;

#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// [timepoints × components]
    pub mixing: DMatrix<f64>,
    /// [components × voxels]
    pub maps: DMatrix<f64>,
}

pub trait Decomposer {
    /// Settings fixed at construction
    fn config(&self) -> &DecompositionConfig;

    fn decompose(&self, data: &DMatrix<f64>, n_components: usize) -> Result<Decomposition>;
}

/// Check shapes and finiteness against the input data.
pub fn validate_decomposition(
    decomposition: &Decomposition,
    data: &DMatrix<f64>,
    n_components: usize,
) -> Result<MixingMatrix> {
    let (n_time, n_voxels) = data.shape();
    if decomposition.mixing.shape() != (n_time, n_components) {
        return Err(TedanaError::Decomposition(format!(
            "mixing matrix is {:?}, expected ({}, {})",
            decomposition.mixing.shape(),
            n_time,
            n_components
        )));
    }
    if decomposition.maps.shape() != (n_components, n_voxels) {
        return Err(TedanaError::Decomposition(format!(
            "component maps are {:?}, expected ({}, {})",
            decomposition.maps.shape(),
            n_components,
            n_voxels
        )));
    }
    if decomposition.mixing.iter().any(|v| !v.is_finite()) {
        return Err(TedanaError::Decomposition(
            "mixing matrix contains non-finite values".to_string(),
        ));
    }
    Ok(MixingMatrix::from_matrix(decomposition.mixing.clone()))
}

/// Run a decomposer and validate what it returns.
pub fn run_decomposition(
    decomposer: &dyn Decomposer,
    data: &DMatrix<f64>,
    n_components: usize,
) -> Result<(Decomposition, MixingMatrix)> {
    decomposer.config().validate()?;
    if n_components == 0 || n_components > data.nrows().min(data.ncols()) {
        return Err(TedanaError::InvalidParameter(format!(
            "cannot extract {} components from a {}×{} matrix",
            n_components,
            data.nrows(),
            data.ncols()
        )));
    }

    log::info!(
        "Decomposing {}×{} data into {} components with {:?} (seed {})",
        data.nrows(),
        data.ncols(),
        n_components,
        decomposer.config().method,
        decomposer.config().seed
    );
    let decomposition = decomposer.decompose(data, n_components)?;
    let mixing = validate_decomposition(&decomposition, data, n_components)?;
    Ok((decomposition, mixing))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Truncated SVD standing in for ICA
    struct SvdDecomposer {
        config: DecompositionConfig,
    }

    impl Decomposer for SvdDecomposer {
        fn config(&self) -> &DecompositionConfig {
            &self.config
        }

        fn decompose(&self, data: &DMatrix<f64>, n_components: usize) -> Result<Decomposition> {
            let svd = data.clone().svd(true, true);
            let u = svd.u.ok_or_else(|| TedanaError::Decomposition("no U".to_string()))?;
            let v_t = svd
                .v_t
                .ok_or_else(|| TedanaError::Decomposition("no V^T".to_string()))?;
            let mut mixing = u.columns(0, n_components).clone_owned();
            for j in 0..n_components {
                let s = svd.singular_values[j];
                mixing.column_mut(j).scale_mut(s);
            }
            Ok(Decomposition {
                mixing,
                maps: v_t.rows(0, n_components).clone_owned(),
            })
        }
    }

    struct BrokenDecomposer {
        config: DecompositionConfig,
    }

    impl Decomposer for BrokenDecomposer {
        fn config(&self) -> &DecompositionConfig {
            &self.config
        }

        fn decompose(&self, data: &DMatrix<f64>, n_components: usize) -> Result<Decomposition> {
            Ok(Decomposition {
                mixing: DMatrix::from_element(data.nrows(), n_components, f64::NAN),
                maps: DMatrix::zeros(n_components, data.ncols()),
            })
        }
    }

    fn data() -> DMatrix<f64> {
        DMatrix::from_fn(6, 4, |i, j| ((i + 1) * (j + 2)) as f64 + (i as f64 * 0.3).sin())
    }

    #[test]
    fn test_run_decomposition_shapes() {
        let decomposer = SvdDecomposer {
            config: DecompositionConfig::default(),
        };
        let (decomposition, mixing) = run_decomposition(&decomposer, &data(), 2).unwrap();
        assert_eq!(mixing.n_timepoints(), 6);
        assert_eq!(mixing.n_components(), 2);
        assert_eq!(mixing.labels(), &["ICA_00", "ICA_01"]);
        assert_eq!(decomposition.maps.shape(), (2, 4));
    }

    #[test]
    fn test_non_finite_mixing_rejected() {
        let decomposer = BrokenDecomposer {
            config: DecompositionConfig::default(),
        };
        let err = run_decomposition(&decomposer, &data(), 2).unwrap_err();
        assert!(matches!(err, TedanaError::Decomposition(_)));
    }

    #[test]
    fn test_too_many_components() {
        let decomposer = SvdDecomposer {
            config: DecompositionConfig::default(),
        };
        assert!(matches!(
            run_decomposition(&decomposer, &data(), 5),
            Err(TedanaError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let decomposition = Decomposition {
            mixing: DMatrix::zeros(6, 3),
            maps: DMatrix::zeros(3, 4),
        };
        let err = validate_decomposition(&decomposition, &data(), 2).unwrap_err();
        assert!(err.to_string().contains("expected (6, 2)"));
    }
}
