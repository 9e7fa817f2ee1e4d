use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug,Error)]
pub enum ProcparError {
    #[error("parameter '{name}' not found in {path:?}")]
    ParameterNotFound {
        name:String,
        path:PathBuf,
    },
    #[error("cannot read parameter file {path:?}: {source}")]
    Unreadable {
        path:PathBuf,
        source:std::io::Error,
    },
    #[error("malformed value line for parameter '{name}' in {path:?}")]
    Malformed {
        name:String,
        path:PathBuf,
    },
    #[error("parameter '{name}' has an empty value list in {path:?}")]
    EmptyValueList {
        name:String,
        path:PathBuf,
    },
}

/// resolve the acquisition directory for a base path (varian convention: <base>.fid)
pub fn fid_dir(acquisition_base:&Path) -> PathBuf {
    acquisition_base.with_extension("fid")
}

/// in-memory copy of a varian procpar file. Re-read per request by design;
/// the files are small and staleness across requests is not acceptable.
pub struct Procpar {
    path:PathBuf,
    lines:Vec<String>,
}

impl Procpar {

    /// read <acquisition_base>.fid/procpar into memory
    pub fn open(acquisition_base:&Path) -> Result<Self,ProcparError> {
        let path = fid_dir(acquisition_base).join("procpar");
        let mut s = String::new();
        let mut f = File::open(&path).map_err(|e| ProcparError::Unreadable {
            path:path.clone(),
            source:e,
        })?;
        f.read_to_string(&mut s).map_err(|e| ProcparError::Unreadable {
            path:path.clone(),
            source:e,
        })?;
        Ok(Self {
            path,
            lines:s.lines().map(|l| l.to_string()).collect(),
        })
    }

    /// find the value list for a parameter. The header line is the first line whose
    /// trimmed text starts with `name` (literal prefix, so "nv 1" selects the indexed
    /// parameter and is distinct from "nv"). Values sit on the following line; its
    /// first token is a count/type tag and is skipped.
    pub fn lookup(&self,name:&str) -> Result<Vec<f32>,ProcparError> {
        for (i,line) in self.lines.iter().enumerate() {
            if line.trim().starts_with(name) {
                let value_line = self.lines.get(i + 1).ok_or(ProcparError::Malformed {
                    name:name.to_string(),
                    path:self.path.clone(),
                })?;
                let mut values = Vec::<f32>::new();
                for token in value_line.trim().split_whitespace().skip(1) {
                    let v = token.parse().map_err(|_| ProcparError::Malformed {
                        name:name.to_string(),
                        path:self.path.clone(),
                    })?;
                    values.push(v);
                }
                return Ok(values);
            }
        }
        Err(ProcparError::ParameterNotFound {
            name:name.to_string(),
            path:self.path.clone(),
        })
    }

    /// first value of a parameter, erroring if the value list is empty
    pub fn scalar(&self,name:&str) -> Result<f32,ProcparError> {
        let values = self.lookup(name)?;
        values.first().copied().ok_or(ProcparError::EmptyValueList {
            name:name.to_string(),
            path:self.path.clone(),
        })
    }

}
