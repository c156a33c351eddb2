//! Difficulty adjustment algorithms
//!
//! Each supported chain retargets with its own rules: Bitcoin adjusts
//! once per 2016-block period, Bitcoin Cash every block over a
//! median-filtered day, Dash over a rolling 24-block target average,
//! Monero over an outlier-trimmed 720-block window, and Zcash over a
//! dampened median-of-medians span. They share nothing but a signature,
//! so the family is a closed sum type with one parameter record per
//! variant.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::block::ChainView;

pub mod bch;
pub mod btc;
pub mod dash;
pub mod xmr;
pub mod zec;

pub use bch::BchParams;
pub use btc::BtcParams;
pub use dash::DashParams;
pub use xmr::XmrParams;
pub use zec::ZecParams;

/// Floor below which a computed difficulty is treated as a fatal
/// retargeting failure.
pub const MIN_DIFFICULTY: f64 = 0.1;

/// Name of a supported difficulty adjustment algorithm.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Btc,
    Bch,
    Dash,
    Xmr,
    Zec,
}

impl Algorithm {
    /// Target seconds between blocks on the chain this algorithm
    /// retargets.
    pub fn default_block_time(&self) -> i64 {
        match self {
            Self::Btc | Self::Bch => 600,
            Self::Dash | Self::Zec => 150,
            Self::Xmr => 120,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Btc => "btc",
            Self::Bch => "bch",
            Self::Dash => "dash",
            Self::Xmr => "xmr",
            Self::Zec => "zec",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown difficulty algorithm `{0}`")]
pub struct UnknownAlgorithm(pub String);

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "btc" => Ok(Self::Btc),
            "bch" => Ok(Self::Bch),
            "dash" => Ok(Self::Dash),
            "xmr" => Ok(Self::Xmr),
            "zec" => Ok(Self::Zec),
            other => Err(UnknownAlgorithm(other.into())),
        }
    }
}

/// A difficulty adjustment algorithm with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algo", rename_all = "lowercase")]
pub enum Daa {
    Btc(BtcParams),
    Bch(BchParams),
    Dash(DashParams),
    Xmr(XmrParams),
    Zec(ZecParams),
}

#[derive(Debug, thiserror::Error)]
pub enum DaaError {
    #[error(
        "next difficulty {value} at height {height} fell below the \
         {MIN_DIFFICULTY} floor"
    )]
    CollapsedDifficulty { height: usize, value: f64 },
    #[error("chain view of {len} blocks is too short for a lookback of {needed}")]
    ViewTooShort { len: usize, needed: usize },
    #[error("outlier trim of {trim} blocks per side exceeds the {len}-block window")]
    TrimTooWide { len: usize, trim: usize },
}

/// Failure to load a parameter file.
#[derive(Debug, thiserror::Error)]
pub enum ParamFileError {
    #[error("could not read parameter file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse parameter file {path}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Daa {
    /// The algorithm with its reference parameters.
    pub fn defaults(algo: Algorithm) -> Self {
        match algo {
            Algorithm::Btc => Self::Btc(BtcParams::default()),
            Algorithm::Bch => Self::Bch(BchParams::default()),
            Algorithm::Dash => Self::Dash(DashParams::default()),
            Algorithm::Xmr => Self::Xmr(XmrParams::default()),
            Algorithm::Zec => Self::Zec(ZecParams::default()),
        }
    }

    /// Loads `<dir>/<algo>.yaml` over the in-code defaults. A missing
    /// file is not an error; a present but unreadable one is.
    pub fn load(algo: Algorithm, dir: &Path) -> Result<Self, ParamFileError> {
        let path = dir.join(format!("{}.yaml", algo));
        if !path.exists() {
            return Ok(Self::defaults(algo));
        }

        let text = std::fs::read_to_string(&path).map_err(|source| {
            ParamFileError::Io { path: path.clone(), source }
        })?;

        let parse = |source| ParamFileError::Yaml { path: path.clone(), source };
        let daa = match algo {
            Algorithm::Btc => {
                Self::Btc(serde_yaml::from_str(&text).map_err(parse)?)
            }
            Algorithm::Bch => {
                Self::Bch(serde_yaml::from_str(&text).map_err(parse)?)
            }
            Algorithm::Dash => {
                Self::Dash(serde_yaml::from_str(&text).map_err(parse)?)
            }
            Algorithm::Xmr => {
                Self::Xmr(serde_yaml::from_str(&text).map_err(parse)?)
            }
            Algorithm::Zec => {
                Self::Zec(serde_yaml::from_str(&text).map_err(parse)?)
            }
        };
        Ok(daa)
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Btc(_) => Algorithm::Btc,
            Self::Bch(_) => Algorithm::Bch,
            Self::Dash(_) => Algorithm::Dash,
            Self::Xmr(_) => Algorithm::Xmr,
            Self::Zec(_) => Algorithm::Zec,
        }
    }

    /// Difficulty the next block minted on `view` would carry.
    ///
    /// Values below [`MIN_DIFFICULTY`] mean the retarget arithmetic has
    /// broken down and are reported as errors for every algorithm.
    pub fn next_difficulty(
        &self,
        view: ChainView<'_>,
        expected_block_time: i64,
    ) -> Result<f64, DaaError> {
        let next = match self {
            Self::Btc(params) => {
                btc::next_difficulty(params, view, expected_block_time)
            }
            Self::Bch(params) => {
                bch::next_difficulty(params, view, expected_block_time)
            }
            Self::Dash(params) => {
                dash::next_difficulty(params, view, expected_block_time)
            }
            Self::Xmr(params) => {
                xmr::next_difficulty(params, view, expected_block_time)
            }
            Self::Zec(params) => {
                zec::next_difficulty(params, view, expected_block_time)
            }
        }?;

        if next < MIN_DIFFICULTY {
            return Err(DaaError::CollapsedDifficulty {
                height: view.tip().height,
                value: next,
            });
        }
        Ok(next)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::block::Block;

    /// A chain of `len` baseline blocks spaced `step` seconds apart.
    pub fn baseline_chain(len: usize, step: i64) -> Vec<Block> {
        (0..len).map(|i| Block::new(i, 1.0, i as i64 * step, true)).collect()
    }
}
