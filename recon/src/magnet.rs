use log::info;
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use crate::display;
use crate::recon_config::{DataPaths, EpsiSettings, ScaleMode};
use crate::response::HpMriData;
use crate::spectral;
use crate::{CancelToken, ReconError};

/// closed set of supported instrument backends, selected once at request entry
#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize,clap::ValueEnum)]
pub enum MagnetType {
    Hupc,
    Clinical,
    MrSolutions,
}

/// one EPSI reconstruction request; all knobs are explicit and request-local
#[derive(Clone,Debug)]
pub struct EpsiRequest {
    pub dataset:usize,
    pub threshold:f32,
    pub scale_mode:ScaleMode,
    pub moving_average_window:usize,
    pub magnet:MagnetType,
}

impl EpsiRequest {

    pub fn new(dataset:usize) -> Self {
        let defaults = EpsiSettings::default();
        Self {
            dataset,
            threshold:defaults.threshold,
            scale_mode:defaults.scale_mode,
            moving_average_window:defaults.moving_average_window,
            magnet:MagnetType::Hupc,
        }
    }

}

/// run the full reconstruction for a request. Backends other than HUPC exist
/// in the instrument fleet but have no processing chain here; they fail
/// explicitly rather than returning a placeholder.
pub fn process_epsi(request:&EpsiRequest,paths:&DataPaths,settings:&EpsiSettings,cancel:&CancelToken)
    -> Result<HpMriData,ReconError> {
    match request.magnet {
        MagnetType::Hupc => hupc_epsi(request,paths,settings,cancel),
        other => Err(ReconError::UnsupportedMagnet(other)),
    }
}

fn hupc_epsi(request:&EpsiRequest,paths:&DataPaths,settings:&EpsiSettings,cancel:&CancelToken)
    -> Result<HpMriData,ReconError> {
    let mut settings = settings.clone();
    settings.threshold = request.threshold;
    settings.scale_mode = request.scale_mode;
    settings.moving_average_window = request.moving_average_window;

    // the payload has no repetition axis; refuse rather than drop extra reps
    if settings.repetitions != 1 {
        return Err(ReconError::RepetitionCount {
            repetitions:settings.repetitions,
        });
    }

    let epsi_base = paths.epsi_base(request.dataset);
    info!("reconstructing EPSI dataset {:?}",epsi_base);

    let cube = spectral::reconstruct(&epsi_base,&settings,cancel)?;
    cancel.check()?;
    // repetitions == 1 past the check above; drop the trailing axis
    let first_rep = cube.index_axis(Axis(3),0).to_owned();
    let plot = display::assemble(first_rep,&settings)?;
    let geometry = display::plot_geometry(&paths.fid_base,&epsi_base)?;
    Ok(HpMriData::new(plot,geometry))
}
