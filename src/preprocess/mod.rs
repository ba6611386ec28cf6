//! Feature preprocessing: imputation, standardization and PCA
//!
//! A [`Preprocessor`] is fitted on training data and then applied unchanged
//! to held-out data. Fitted transforms can be written next to the models
//! (`<prefix>.Imputer.json`, `<prefix>.<Method>.scaler.json`,
//! `<prefix>.PCA.json`) and restored later for prediction.

pub mod imputer;
pub mod pca;
pub mod scaler;

pub use self::imputer::*;
pub use self::pca::*;
pub use self::scaler::*;

use crate::core::{Result, SVMError};
use crate::utils::{read_json, with_suffix, write_json};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A fitted, data-independent mapping of feature rows
pub trait Transform {
    fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

/// Which preprocessing steps run after imputation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub scaling: Option<ScalingMethod>,
    pub pca: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            scaling: Some(ScalingMethod::StandardScaler),
            pca: false,
        }
    }
}

impl PreprocessingConfig {
    /// Method names for reports, e.g. `["StandardScaler", "PCA"]`
    pub fn methods(&self) -> Vec<String> {
        let mut methods = Vec::new();
        if let Some(scaling) = self.scaling {
            methods.push(scaling.name().to_string());
        }
        if self.pca {
            methods.push("PCA".to_string());
        }
        methods
    }
}

pub fn imputer_path<P: AsRef<Path>>(prefix: P) -> PathBuf {
    with_suffix(prefix, ".Imputer.json")
}

pub fn scaler_path<P: AsRef<Path>>(prefix: P, method: ScalingMethod) -> PathBuf {
    with_suffix(prefix, &format!(".{}.scaler.json", method.name()))
}

pub fn pca_path<P: AsRef<Path>>(prefix: P) -> PathBuf {
    with_suffix(prefix, ".PCA.json")
}

/// Imputer, scaler and PCA chained in that order
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessingConfig,
    /// `None` refits the medians on every call (restored without imputer file)
    imputer: Option<Imputer>,
    scaler: Option<Scaler>,
    pca: Option<Pca>,
}

impl Preprocessor {
    /// Fit every configured step on `x`, persisting the fitted steps under
    /// `persist_prefix` when one is given
    pub fn fit(
        x: &[Vec<f64>],
        config: PreprocessingConfig,
        persist_prefix: Option<&Path>,
    ) -> Result<Self> {
        let (preprocessor, _) = Self::fit_transform(x, config, persist_prefix)?;
        Ok(preprocessor)
    }

    /// Like [`fit`](Self::fit), also returning the transformed training data
    pub fn fit_transform(
        x: &[Vec<f64>],
        config: PreprocessingConfig,
        persist_prefix: Option<&Path>,
    ) -> Result<(Self, Vec<Vec<f64>>)> {
        let imputer = Imputer::fit(x)?;
        let mut data = imputer.transform(x)?;
        if let Some(prefix) = persist_prefix {
            write_json(&imputer, imputer_path(prefix))?;
        }

        let scaler = match config.scaling {
            Some(method) => {
                info!("    Standardizing data by {} method...", method.name());
                let scaler = Scaler::fit(method, &data)?;
                data = scaler.transform(&data)?;
                if method.is_stateful() {
                    if let Some(prefix) = persist_prefix {
                        write_json(&scaler, scaler_path(prefix, method))?;
                    }
                    Some(scaler)
                } else {
                    None
                }
            }
            None => None,
        };

        let pca = if config.pca {
            info!("    Performing PCA to reduce feature space...");
            let pca = Pca::fit(&data)?;
            data = pca.transform(&data)?;
            let kept: f64 = pca.explained_variance_ratio().iter().sum();
            info!(
                "    PCA kept {} components ({:.1}% of variance)",
                pca.n_components(),
                kept * 100.0
            );
            if let Some(prefix) = persist_prefix {
                write_json(&pca, pca_path(prefix))?;
            }
            Some(pca)
        } else {
            None
        };

        Ok((
            Self {
                config,
                imputer: Some(imputer),
                scaler,
                pca,
            },
            data,
        ))
    }

    /// Restore fitted steps from files
    ///
    /// Stateful scaling needs `scaler`, PCA needs `pca`. Without `imputer`
    /// the medians are taken from the data being transformed.
    pub fn load(
        config: PreprocessingConfig,
        imputer: Option<&Path>,
        scaler: Option<&Path>,
        pca: Option<&Path>,
    ) -> Result<Self> {
        let imputer = imputer.map(read_json::<Imputer, _>).transpose()?;

        let scaler = match config.scaling {
            Some(method) if method.is_stateful() => {
                let path = scaler.ok_or_else(|| {
                    SVMError::InvalidParameter(format!(
                        "{} requires a pre-computed scaler file",
                        method.name()
                    ))
                })?;
                info!("    Standardizing data by pre-computed {}...", method.name());
                let scaler: Scaler = read_json(path)?;
                if scaler.method != method {
                    return Err(SVMError::InvalidParameter(format!(
                        "Scaler file {} holds {}, expected {}",
                        path.display(),
                        scaler.method,
                        method
                    )));
                }
                Some(scaler)
            }
            _ => None,
        };

        let pca = if config.pca {
            let path = pca.ok_or_else(|| {
                SVMError::InvalidParameter("PCA requires a pre-computed PCA file".to_string())
            })?;
            info!("    Performing PCA by pre-computed PCA transformer...");
            Some(read_json::<Pca, _>(path)?)
        } else {
            None
        };

        Ok(Self {
            config,
            imputer,
            scaler,
            pca,
        })
    }

    /// Restore the steps written by `fit` under `prefix`
    pub fn load_from_prefix<P: AsRef<Path>>(config: PreprocessingConfig, prefix: P) -> Result<Self> {
        let prefix = prefix.as_ref();
        let scaler = config
            .scaling
            .filter(ScalingMethod::is_stateful)
            .map(|method| scaler_path(prefix, method));
        let pca = config.pca.then(|| pca_path(prefix));
        let imputer = imputer_path(prefix);
        Self::load(
            config,
            Some(imputer.as_path()),
            scaler.as_deref(),
            pca.as_deref(),
        )
    }

    /// Apply the fitted steps to new data
    pub fn transform(&self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let mut data = match &self.imputer {
            Some(imputer) => imputer.transform(x)?,
            None => Imputer::fit(x)?.transform(x)?,
        };

        if let Some(method) = self.config.scaling {
            data = match &self.scaler {
                Some(scaler) => scaler.transform(&data)?,
                None => Scaler::fit(method, &data)?.transform(&data)?,
            };
        }

        if let Some(pca) = &self.pca {
            data = pca.transform(&data)?;
        }

        Ok(data)
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn imputer(&self) -> Option<&Imputer> {
        self.imputer.as_ref()
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    pub fn pca(&self) -> Option<&Pca> {
        self.pca.as_ref()
    }

    /// Dimension of the transformed rows
    pub fn output_dim(&self, input_dim: usize) -> usize {
        self.pca
            .as_ref()
            .map(Pca::n_components)
            .unwrap_or(input_dim)
    }
}
