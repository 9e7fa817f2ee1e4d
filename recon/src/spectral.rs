use std::path::Path;
use log::debug;
use ndarray::{s, Array, Array3, Array4, Axis};
use num_complex::Complex;
use rustfft::FftPlanner;
use mr_data::fid::FidFile;
use mr_data::procpar::Procpar;
use crate::recon_config::EpsiSettings;
use crate::{CancelToken, ReconError};

// centric acquisitions interleave views around the k-space center
const CENTRIC_ZIGZAG:[i32;12] = [0,-1,1,-2,2,-3,3,-4,4,-5,5,-6];

/// 1-based physical position of each acquired view. Identity when the
/// acquisition is sequential; the fixed 12-view zig-zag permutation when centric.
pub fn echo_order(nv:usize,centric:bool) -> Result<Vec<usize>,ReconError> {
    match centric {
        true => {
            if nv != CENTRIC_ZIGZAG.len() {
                return Err(ReconError::CentricViewCount {
                    nv,
                });
            }
            Ok(CENTRIC_ZIGZAG.iter().map(|offset| (offset + 7) as usize).collect())
        }
        false => Ok((1..=nv).collect()),
    }
}

/// scalar acquisition parameters needed by the reconstruction
#[derive(Debug,Clone)]
pub struct SpectralParams {
    pub ne:usize,
    pub points:usize,
    pub nv:usize,
    pub et:f32,
}

impl SpectralParams {

    pub fn from_procpar(pp:&Procpar) -> Result<Self,ReconError> {
        let ne = pp.scalar("ne")? as usize;
        let points = pp.scalar("np")? as usize / 2;
        let nv = pp.scalar("nv 1")? as usize;
        let te2 = pp.scalar("te2")?;
        // echo-train rate; te2 = 0 degenerates to inf and propagates downstream
        let et = 1.0 / te2;
        Ok(Self {
            ne,
            points,
            nv,
            et,
        })
    }

}

/// reconstruct the magnitude spectral cube [views, readout, frequency bins, repetitions]
/// for one EPSI acquisition. The frequency axis is zero-padded to twice the echo count
/// before the transform.
pub fn reconstruct(acquisition_base:&Path,settings:&EpsiSettings,cancel:&CancelToken)
    -> Result<Array4<f32>,ReconError> {
    let pp = Procpar::open(acquisition_base)?;
    let p = SpectralParams::from_procpar(&pp)?;
    debug!("spectral params for {:?}: {:?}",acquisition_base,p);

    let proton_quarter = settings.proton_reference / 4.0;
    let order = echo_order(p.nv,settings.centric)?;
    let bins = 2 * p.ne;
    let mut out = Array4::<f32>::zeros((p.nv,p.points,bins,settings.repetitions));
    let fid = FidFile::new(acquisition_base);

    for rep in 0..settings.repetitions {
        cancel.check()?;
        // re-read per repetition; nothing is cached between requests
        let raw = fid.read()?;
        let found = raw.real.dim();
        if found.0 != p.points || found.1 < p.nv * p.ne {
            return Err(ReconError::AcquisitionShape {
                found,
                nv:p.nv,
                ne:p.ne,
                points:p.points,
            });
        }

        // conjugate assembly: echo j takes the strided columns j, j+ne, j+2ne, ...
        let mut cube = Array3::<Complex<f32>>::zeros((p.nv,p.points,p.ne));
        for j in 0..p.ne {
            for v in 0..p.nv {
                let col = j + v * p.ne;
                for k in 0..p.points {
                    cube[[v,k,j]] = Complex::new(raw.real[[k,col]],-raw.imag[[k,col]]);
                }
            }
        }

        // un-scramble the acquisition view order
        let mut ordered = Array3::<Complex<f32>>::zeros(cube.raw_dim());
        for v in 0..p.nv {
            ordered.index_axis_mut(Axis(0),order[v] - 1).assign(&cube.index_axis(Axis(0),v));
        }

        // signal decay accumulated across the echo train within one excitation
        for j in 0..p.ne {
            let w = (-(j as f32) * proton_quarter / p.et).exp();
            ordered.index_axis_mut(Axis(2),j).mapv_inplace(|c| c * w);
        }

        // pad the echo axis to avoid spectral wraparound from the short train
        let mut padded = Array3::<Complex<f32>>::zeros((p.nv,p.points,bins));
        padded.slice_mut(s![..,..,..p.ne]).assign(&ordered);

        cancel.check()?;
        let shifted = fftn_shift(padded);

        // the transform's intrinsic ordering is reversed relative to physical
        // frequency/space ordering on the readout and frequency axes
        for v in 0..p.nv {
            for k in 0..p.points {
                for e in 0..bins {
                    out[[v,k,e,rep]] = shifted[[v,p.points - 1 - k,bins - 1 - e]].norm();
                }
            }
        }
    }
    Ok(out)
}

/// unnormalized forward DFT along every axis, each followed by a centering
/// shift that puts zero-frequency at the array midpoint
pub fn fftn_shift(mut cube:Array3<Complex<f32>>) -> Array3<Complex<f32>> {
    let mut fft_planner = FftPlanner::<f32>::new();
    for axis in 0..3 {
        let n = cube.shape()[axis];
        let fft = fft_planner.plan_fft_forward(n);
        for mut lane in cube.lanes_mut(Axis(axis)) {
            let mut temp = lane.to_vec();
            fft.process(&mut temp);
            temp.rotate_right(n / 2);
            lane.assign(&Array::from_vec(temp));
        }
    }
    cube
}
