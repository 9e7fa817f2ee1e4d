use std::io::Cursor;
use std::path::{Path, PathBuf};
use ndarray::Array2;
use thiserror::Error;

#[derive(Debug,Error)]
pub enum ProtonError {
    #[error("proton slice image not found at {path:?}")]
    SliceNotFound {
        path:PathBuf,
    },
    #[error("cannot decode proton slice {path:?}: {reason}")]
    Decode {
        path:PathBuf,
        reason:String,
    },
    #[error("proton slice has no pixels")]
    EmptySlice,
    #[error("png encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// pixel decode for the on-disk dicom slices; implemented by an external collaborator
pub trait SliceDecoder {
    fn decode(&self,path:&Path) -> Result<Array2<u16>,ProtonError>;
}

/// local contrast enhancement (CLAHE) applied between the two normalization
/// passes; implemented by an external collaborator
pub trait ContrastEnhancer {
    fn enhance(&self,image:&Array2<u8>,clip_limit:f32) -> Array2<u8>;
}

/// identity enhancer for pipelines running without a contrast backend
pub struct NullEnhancer;

impl ContrastEnhancer for NullEnhancer {
    fn enhance(&self,image:&Array2<u8>,_clip_limit:f32) -> Array2<u8> {
        image.clone()
    }
}

const RAW_FLOOR:u16 = 5;
const NORMALIZED_FLOOR:f32 = 0.05;

/// file name convention of the anatomical dicom series
pub fn slice_filename(slice_index:usize) -> String {
    format!("slice{:03}image001echo001.dcm",slice_index)
}

pub fn slice_path(dicom_dir:&Path,slice_index:usize) -> PathBuf {
    dicom_dir.join(slice_filename(slice_index))
}

pub fn load_slice(dicom_dir:&Path,slice_index:usize,decoder:&dyn SliceDecoder)
    -> Result<Array2<u16>,ProtonError> {
    let path = slice_path(dicom_dir,slice_index);
    if !path.exists() {
        return Err(ProtonError::SliceNotFound {
            path,
        });
    }
    decoder.decode(&path)
}

/// grayscale display pipeline for one proton slice: intensity floor, min-max
/// normalization, floor again, contrast enhancement, floor, rescale, floor.
/// A flat slice degenerates to NaN during normalization and clamps to zero
/// on the final u8 cast.
pub fn process_slice(pixels:&Array2<u16>,contrast:f32,enhancer:&dyn ContrastEnhancer) -> Array2<u8> {
    let floored = pixels.mapv(|v| if v < RAW_FLOOR {0} else {v});
    let min = floored.fold(u16::MAX,|a,&v| a.min(v)) as f32;
    let max = floored.fold(u16::MIN,|a,&v| a.max(v)) as f32;
    let mut normalized = floored.mapv(|v| (v as f32 - min) / (max - min));
    normalized.mapv_inplace(|v| if v < NORMALIZED_FLOOR {0.0} else {v});

    let eight_bit = normalized.mapv(|v| (v * 255.0) as u8);
    let mut enhanced = enhancer.enhance(&eight_bit,contrast);
    enhanced.mapv_inplace(|v| if (v as u16) < RAW_FLOOR {0} else {v});

    let mut rescaled = enhanced.mapv(|v| v as f32 / 255.0);
    rescaled.mapv_inplace(|v| if v < NORMALIZED_FLOOR {0.0} else {v});
    rescaled.mapv(|v| (v * 255.0) as u8)
}

/// encode a processed slice as a grayscale png
pub fn encode_png(gray:&Array2<u8>) -> Result<Vec<u8>,ProtonError> {
    let (height,width) = gray.dim();
    let img = image::GrayImage::from_raw(width as u32,height as u32,gray.iter().copied().collect())
        .ok_or(ProtonError::EmptySlice)?;
    let mut buffer = Cursor::new(Vec::<u8>::new());
    img.write_to(&mut buffer,image::ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
