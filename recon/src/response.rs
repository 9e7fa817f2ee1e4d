use serde::{Deserialize, Serialize};
use crate::display::{EpsiPlot, PlotGeometry, PLOT_SHIFT};

/// NaN and infinities are not universally transportable; they become this
/// sentinel at the serialization boundary and nowhere else
pub const TRANSPORT_SENTINEL:f32 = -1.0;

/// the JSON payload consumed by the plotting client
#[derive(Debug,Serialize,Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HpMriData {
    pub x_values:Vec<f32>,
    pub data:Vec<f32>,
    pub columns:usize,
    pub rows:usize,
    pub spectral_data:Vec<Vec<Vec<f32>>>,
    pub longitudinal_scale:f32,
    pub perpendicular_scale:f32,
    pub longitudinal_measurement:f32,
    pub perpendicular_measurement:f32,
    pub plot_shift:[f32;2],
}

impl HpMriData {

    pub fn new(plot:EpsiPlot,geometry:PlotGeometry) -> Self {
        let spectral_data = plot.spectral
            .outer_iter()
            .map(|slice| slice.outer_iter().map(|lane| sanitize(lane.to_vec())).collect())
            .collect();
        Self {
            x_values:plot.x_epsi,
            data:sanitize(plot.epsi),
            columns:plot.columns,
            rows:plot.rows,
            spectral_data,
            longitudinal_scale:geometry.lro_fid,
            perpendicular_scale:geometry.lpe_fid,
            longitudinal_measurement:geometry.lro_epsi,
            perpendicular_measurement:geometry.lpe_epsi,
            plot_shift:PLOT_SHIFT,
        }
    }

}

pub fn sanitize(mut values:Vec<f32>) -> Vec<f32> {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = TRANSPORT_SENTINEL;
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn sanitize_replaces_only_non_finite(){
        let out = sanitize(vec![1.0,f32::NAN,0.0,-2.5,f32::INFINITY,f32::NEG_INFINITY]);
        assert_eq!(out,vec![1.0,TRANSPORT_SENTINEL,0.0,-2.5,TRANSPORT_SENTINEL,TRANSPORT_SENTINEL]);
    }

    #[test]
    fn payload_keys_are_camel_case(){
        let mut spectral = Array3::<f32>::ones((1,1,2));
        spectral[[0,0,1]] = f32::NAN;
        let plot = EpsiPlot {
            epsi:vec![f32::NAN,2.0],
            x_epsi:vec![0.0,1.0],
            spectral,
            rows:1,
            columns:1,
        };
        let geometry = PlotGeometry {
            lro_fid:60.0,
            lpe_fid:45.0,
            lro_epsi:20.0,
            lpe_epsi:15.0,
        };
        let payload = HpMriData::new(plot,geometry);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["data"][0],-1.0);
        assert_eq!(json["spectralData"][0][0][1],-1.0);
        assert_eq!(json["longitudinalScale"],60.0);
        // f32 widens through serde_json's f64 storage; compare with a tolerance
        assert!((json["plotShift"][0].as_f64().unwrap() + 0.3).abs() < 1e-6);
        assert_eq!(json["xValues"][1],1.0);
        assert_eq!(json["rows"],1);
    }
}
