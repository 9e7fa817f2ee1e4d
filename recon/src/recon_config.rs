use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug,Error)]
pub enum ConfigError {
    #[error("cannot read settings file {path:?}: {source}")]
    Io {
        path:PathBuf,
        source:std::io::Error,
    },
    #[error("cannot parse settings file {path:?}: {source}")]
    Parse {
        path:PathBuf,
        source:toml::de::Error,
    },
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,Serialize,Deserialize,clap::ValueEnum)]
pub enum ScaleMode {
    /// divide the whole cube by its single global maximum
    Global,
    /// divide each (row,column) cell by its own maximum along the frequency axis
    PerVoxel,
}

/// explicit pipeline configuration. Replaces the fixed module-level constants
/// of the legacy processing chain; every request carries its own copy.
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct EpsiSettings {
    pub rows:usize,
    pub columns:usize,
    pub scale_mode:ScaleMode,
    pub threshold:f32,
    pub moving_average_window:usize,
    /// proton reference frequency; one quarter of this drives the echo decay correction
    pub proton_reference:f32,
    /// centric k-space view ordering (zig-zag around the center)
    pub centric:bool,
    /// number of repetitions to read from the fid file
    pub repetitions:usize,
}

impl Default for EpsiSettings {
    fn default() -> Self {
        Self {
            rows:12,
            columns:16,
            scale_mode:ScaleMode::Global,
            threshold:0.2,
            moving_average_window:1,
            proton_reference:60.0,
            centric:true,
            repetitions:1,
        }
    }
}

impl EpsiSettings {

    pub fn from_file(file_path:&Path) -> Result<Self,ConfigError> {
        let mut s = String::new();
        let mut f = File::open(file_path).map_err(|e| ConfigError::Io {
            path:file_path.to_owned(),
            source:e,
        })?;
        f.read_to_string(&mut s).map_err(|e| ConfigError::Io {
            path:file_path.to_owned(),
            source:e,
        })?;
        toml::from_str(&s).map_err(|e| ConfigError::Parse {
            path:file_path.to_owned(),
            source:e,
        })
    }

    pub fn to_file(&self,file_path:&Path) -> Result<(),ConfigError> {
        let s = toml::to_string(&self).expect("settings are always serializable");
        let mut f = File::create(file_path).map_err(|e| ConfigError::Io {
            path:file_path.to_owned(),
            source:e,
        })?;
        f.write_all(s.as_bytes()).map_err(|e| ConfigError::Io {
            path:file_path.to_owned(),
            source:e,
        })
    }

}

/// where a study's acquisitions live on disk
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct DataPaths {
    /// prefix for the 13c EPSI acquisitions; the dataset index is appended as two digits
    pub epsi_prefix:PathBuf,
    /// acquisition base for the companion proton (fsems) scan
    pub fid_base:PathBuf,
    /// directory holding the proton dicom slices, when present
    pub dicom_dir:Option<PathBuf>,
}

impl DataPaths {

    pub fn epsi_base(&self,dataset:usize) -> PathBuf {
        PathBuf::from(format!("{}{:02}",self.epsi_prefix.display(),dataset))
    }

}
