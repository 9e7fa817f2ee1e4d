use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub mod display;
pub mod magnet;
pub mod proton;
pub mod recon_config;
pub mod response;
pub mod spectral;

use magnet::MagnetType;
use mr_data::fid::FidError;
use mr_data::procpar::ProcparError;

#[derive(Debug,Error)]
pub enum ReconError {
    #[error(transparent)]
    Procpar(#[from] ProcparError),
    #[error(transparent)]
    Fid(#[from] FidError),
    #[error("centric reordering requires 12 views, acquisition has {nv}")]
    CentricViewCount {
        nv:usize,
    },
    #[error("raw trace matrix {found:?} cannot supply {nv} views x {ne} echoes x {points} readout points")]
    AcquisitionShape {
        found:(usize,usize),
        nv:usize,
        ne:usize,
        points:usize,
    },
    #[error("display grid {rows}x{columns} exceeds spectral cube {nv}x{points}")]
    GridMismatch {
        rows:usize,
        columns:usize,
        nv:usize,
        points:usize,
    },
    #[error("moving average window must be at least 1")]
    InvalidWindow,
    #[error("display payload carries exactly one repetition, settings request {repetitions}")]
    RepetitionCount {
        repetitions:usize,
    },
    #[error("no processing backend for magnet type {0:?}")]
    UnsupportedMagnet(MagnetType),
    #[error("reconstruction cancelled")]
    Cancelled,
}

/// cooperative cancellation for an in-flight reconstruction. Cloned into the
/// pipeline and checked between stages; a cancelled token aborts the request
/// with ReconError::Cancelled.
#[derive(Clone,Default)]
pub struct CancelToken {
    flag:Arc<AtomicBool>,
}

impl CancelToken {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true,Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(),ReconError> {
        match self.is_cancelled() {
            true => Err(ReconError::Cancelled),
            false => Ok(()),
        }
    }

}
