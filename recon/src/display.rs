use std::path::Path;
use ndarray::{s, Array3, Axis};
use mr_data::procpar::Procpar;
use crate::recon_config::{EpsiSettings, ScaleMode};
use crate::ReconError;

// plot-alignment factor applied to the procpar field-of-view values; units undocumented
pub const GEOMETRY_SCALE:f32 = 10.0;

// fixed subplot shift expected by the plotting client
pub const PLOT_SHIFT:[f32;2] = [-0.3,-0.4];

/// field-of-view scalars for aligning the waterfall over the proton image
#[derive(Debug,Clone,PartialEq)]
pub struct PlotGeometry {
    pub lro_fid:f32,
    pub lpe_fid:f32,
    pub lro_epsi:f32,
    pub lpe_epsi:f32,
}

pub fn plot_geometry(fid_base:&Path,epsi_base:&Path) -> Result<PlotGeometry,ReconError> {
    let fid_pp = Procpar::open(fid_base)?;
    let epsi_pp = Procpar::open(epsi_base)?;
    Ok(PlotGeometry {
        lro_fid:fid_pp.scalar("lro")? * GEOMETRY_SCALE,
        lpe_fid:fid_pp.scalar("lpe 1")? * GEOMETRY_SCALE,
        lro_epsi:epsi_pp.scalar("lro")? * GEOMETRY_SCALE,
        lpe_epsi:epsi_pp.scalar("lpe 1")? * GEOMETRY_SCALE,
    })
}

/// a waterfall display sequence with its axis and the processed cube it came from.
/// NaN is the in-process "no data" marker throughout; conversion to a transport
/// sentinel happens only at the response boundary.
pub struct EpsiPlot {
    pub epsi:Vec<f32>,
    pub x_epsi:Vec<f32>,
    pub spectral:Array3<f32>,
    pub rows:usize,
    pub columns:usize,
}

/// turn a magnitude cube [views, readout, bins] into the flat waterfall sequence:
/// orientation flip, normalization, per-voxel thresholding, row flattening with
/// vertical offsets, row separators, moving-average smoothing, un-bias.
pub fn assemble(cube:Array3<f32>,settings:&EpsiSettings) -> Result<EpsiPlot,ReconError> {
    let (nv,points,bins) = cube.dim();
    let rows = settings.rows;
    let columns = settings.columns;
    if rows > nv || columns > points {
        return Err(ReconError::GridMismatch {
            rows,
            columns,
            nv,
            points,
        });
    }
    if settings.moving_average_window < 1 {
        return Err(ReconError::InvalidWindow);
    }

    // display convention: first two axes are drawn flipped
    let mut spectral = cube;
    spectral.invert_axis(Axis(0));
    spectral.invert_axis(Axis(1));

    match settings.scale_mode {
        ScaleMode::Global => {
            let max = spectral.fold(f32::NEG_INFINITY,|a,&v| a.max(v));
            // a zero maximum degenerates to NaN/Inf and propagates by design
            spectral.mapv_inplace(|v| v / max);
        }
        ScaleMode::PerVoxel => {
            for i in 0..nv {
                for j in 0..points {
                    let max = spectral.slice(s![i,j,..]).fold(f32::NEG_INFINITY,|a,&v| a.max(v));
                    spectral.slice_mut(s![i,j,..]).mapv_inplace(|v| v / max);
                }
            }
        }
    }

    // threshold-mask dim voxels and flatten row by row with the waterfall offset
    let mut epsi = Vec::<f32>::with_capacity(rows * columns * bins);
    for i in 0..rows {
        let offset = (rows - i) as f32;
        for j in 0..columns {
            let max = spectral.slice(s![i,j,..]).fold(f32::NEG_INFINITY,|a,&v| a.max(v));
            if max < settings.threshold {
                spectral.slice_mut(s![i,j,..]).fill(f32::NAN);
            }
            for k in 0..bins {
                epsi.push(spectral[[i,j,k]] + offset);
            }
        }
    }

    // break the plotted line at every row boundary except the last
    let span = bins * columns;
    for r in 0..rows.saturating_sub(1) {
        epsi[r * span] = f32::NAN;
    }

    let mut epsi = convolve_same(&epsi,settings.moving_average_window);
    for v in epsi.iter_mut() {
        if !v.is_nan() {
            *v -= 1.0;
        }
    }

    let x_epsi:Vec<f32> = (0..rows).flat_map(|_| (0..span).map(|x| x as f32)).collect();

    Ok(EpsiPlot {
        epsi,
        x_epsi,
        spectral,
        rows,
        columns,
    })
}

/// "same"-mode convolution with a uniform window; window = 1 is the identity.
/// NaN samples poison every window position they touch, widening sentinels.
fn convolve_same(signal:&[f32],window:usize) -> Vec<f32> {
    if window == 1 {
        return signal.to_vec();
    }
    let n = signal.len();
    let mut full = vec![0.0f32;n + window - 1];
    for (i,v) in signal.iter().enumerate() {
        for k in 0..window {
            full[i + k] += v;
        }
    }
    let start = (window - 1) / 2;
    full[start..start + n].iter().map(|v| v / window as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon_config::EpsiSettings;

    fn settings(rows:usize,columns:usize) -> EpsiSettings {
        EpsiSettings {
            rows,
            columns,
            ..EpsiSettings::default()
        }
    }

    #[test]
    fn all_ones_cube_normalizes_to_itself(){
        let cube = Array3::<f32>::ones((2,2,4));
        let plot = assemble(cube,&settings(2,2)).unwrap();
        // every retained sample is 1.0 normalized, offset added then un-biased by 1
        for (idx,v) in plot.epsi.iter().enumerate() {
            let row = idx / 8;
            if idx == 0 {
                assert!(v.is_nan());
            } else {
                let expected = 1.0 + (2 - row) as f32 - 1.0;
                assert!((v - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn window_one_smoothing_is_identity(){
        let signal = vec![1.0,2.0,f32::NAN,4.0];
        let out = convolve_same(&signal,1);
        assert_eq!(out.len(),signal.len());
        // NaN compares unequal to itself, so check it positionally
        for (got,want) in out.iter().zip(signal.iter()) {
            match want.is_nan() {
                true => assert!(got.is_nan()),
                false => assert_eq!(got,want),
            }
        }
    }

    #[test]
    fn uniform_window_averages_neighbors(){
        let signal = vec![0.0,3.0,0.0,0.0];
        let smoothed = convolve_same(&signal,3);
        assert_eq!(smoothed.len(),4);
        assert!((smoothed[0] - 1.0).abs() < 1e-6);
        assert!((smoothed[1] - 1.0).abs() < 1e-6);
        assert!((smoothed[2] - 1.0).abs() < 1e-6);
        assert!((smoothed[3] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn voxel_below_threshold_is_fully_masked(){
        let mut cube = Array3::<f32>::zeros((2,2,4));
        // after the double flip, input (1,1) lands at display (0,0)
        cube.slice_mut(s![1,1,..]).fill(0.19);
        cube.slice_mut(s![1,0,..]).fill(1.0);
        cube.slice_mut(s![0,1,..]).fill(1.0);
        cube.slice_mut(s![0,0,..]).fill(1.0);
        let mut st = settings(2,2);
        st.threshold = 0.2;
        let plot = assemble(cube,&st).unwrap();
        for k in 0..4 {
            assert!(plot.spectral[[0,0,k]].is_nan());
            assert!((plot.spectral[[0,1,k]] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn voxel_above_threshold_is_retained(){
        let mut cube = Array3::<f32>::zeros((2,2,4));
        cube.slice_mut(s![1,1,..]).fill(0.21);
        cube.slice_mut(s![0,0,..]).fill(1.0);
        cube.slice_mut(s![0,1,..]).fill(1.0);
        cube.slice_mut(s![1,0,..]).fill(1.0);
        let mut st = settings(2,2);
        st.threshold = 0.2;
        let plot = assemble(cube,&st).unwrap();
        for k in 0..4 {
            assert!((plot.spectral[[0,0,k]] - 0.21).abs() < 1e-6);
        }
    }

    #[test]
    fn per_voxel_scaling_normalizes_each_cell(){
        let mut cube = Array3::<f32>::zeros((1,2,2));
        cube.slice_mut(s![0,0,..]).assign(&ndarray::arr1(&[1.0,2.0]));
        cube.slice_mut(s![0,1,..]).assign(&ndarray::arr1(&[2.0,4.0]));
        let mut st = settings(1,2);
        st.scale_mode = ScaleMode::PerVoxel;
        let plot = assemble(cube,&st).unwrap();
        // each cell's own maximum becomes 1 after scaling
        assert!((plot.spectral[[0,0,1]] - 1.0).abs() < 1e-6);
        assert!((plot.spectral[[0,0,0]] - 0.5).abs() < 1e-6);
        assert!((plot.spectral[[0,1,1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn flat_buffer_length_and_separator_positions(){
        let cube = Array3::<f32>::ones((2,3,4));
        let plot = assemble(cube,&settings(2,3)).unwrap();
        assert_eq!(plot.epsi.len(),2 * 3 * 4);
        assert_eq!(plot.x_epsi.len(),2 * 3 * 4);
        // rows - 1 sentinels at multiples of bins * columns
        assert!(plot.epsi[0].is_nan());
        assert_eq!(plot.epsi.iter().filter(|v| v.is_nan()).count(),1);
        // x axis restarts every row
        assert_eq!(plot.x_epsi[0],0.0);
        assert_eq!(plot.x_epsi[11],11.0);
        assert_eq!(plot.x_epsi[12],0.0);
    }

    #[test]
    fn grid_larger_than_cube_is_rejected(){
        let cube = Array3::<f32>::ones((2,2,4));
        assert!(matches!(assemble(cube,&settings(3,2)),Err(ReconError::GridMismatch{..})));
    }
}
