use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use byteorder::{BigEndian, ReadBytesExt};
use ndarray::Array2;
use thiserror::Error;
use crate::procpar::fid_dir;

pub const FILE_HEADER_BYTES:usize = 32;
pub const BLOCK_HEADER_BYTES:usize = 28;

#[derive(Debug,Error)]
pub enum FidError {
    #[error("acquisition file missing at {path:?}: {source}")]
    Missing {
        path:PathBuf,
        source:std::io::Error,
    },
    #[error("malformed acquisition file {path:?} (failed reading {context}): {source}")]
    Malformed {
        path:PathBuf,
        context:&'static str,
        source:std::io::Error,
    },
    #[error("selection indices must be ascending and within {limit} for {what}")]
    BadSelection {
        what:&'static str,
        limit:usize,
    },
}

/// element width encoded in the file header status word
#[derive(Debug,Clone,Copy,PartialEq)]
pub enum ElementType {
    Int16,
    Int32,
    Float32,
}

impl ElementType {
    // status bit 3 => float, bit 2 => 32-bit int, neither => 16-bit int
    fn from_status(status:i16) -> Self {
        if status & 8 != 0 {
            ElementType::Float32
        } else if status & 4 != 0 {
            ElementType::Int32
        } else {
            ElementType::Int16
        }
    }
}

/// fixed 32-byte global header at the start of every fid file (big-endian)
#[derive(Debug,Clone)]
pub struct FidHeader {
    pub nblocks:i32,
    pub ntraces:i32,
    pub np:i32,
    pub ebytes:i32,
    pub tbytes:i32,
    pub bbytes:i32,
    pub vers_id:i16,
    pub status:i16,
    pub nbheaders:i32,
}

impl FidHeader {

    fn read<R:Read>(r:&mut R,path:&Path) -> Result<Self,FidError> {
        let m = |source| FidError::Malformed {
            path:path.to_owned(),
            context:"file header",
            source,
        };
        let h = Self {
            nblocks:r.read_i32::<BigEndian>().map_err(m)?,
            ntraces:r.read_i32::<BigEndian>().map_err(m)?,
            np:r.read_i32::<BigEndian>().map_err(m)?,
            ebytes:r.read_i32::<BigEndian>().map_err(m)?,
            tbytes:r.read_i32::<BigEndian>().map_err(m)?,
            bbytes:r.read_i32::<BigEndian>().map_err(m)?,
            vers_id:r.read_i16::<BigEndian>().map_err(m)?,
            status:r.read_i16::<BigEndian>().map_err(m)?,
            nbheaders:r.read_i32::<BigEndian>().map_err(m)?,
        };
        // the counts are signed on disk; reject anything that cannot index data
        if h.nblocks <= 0 || h.ntraces <= 0 || h.np <= 0 || h.np % 2 != 0 {
            return Err(FidError::Malformed {
                path:path.to_owned(),
                context:"header counts",
                source:std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("nblocks {} ntraces {} np {}",h.nblocks,h.ntraces,h.np),
                ),
            });
        }
        Ok(h)
    }

    pub fn element_type(&self) -> ElementType {
        ElementType::from_status(self.status)
    }

    /// complex sample count per trace (np is interleaved real/imag, always even)
    pub fn points(&self) -> usize {
        self.np as usize / 2
    }

}

/// per-block sub-header, read immediately before that block's trace data.
/// Only consumed for stream position; the scale/status words are exposed
/// for diagnostics.
#[derive(Debug,Clone)]
pub struct BlockHeader {
    pub scale:i16,
    pub status:i16,
    pub index:i16,
    pub mode:i16,
    pub ct:i32,
    pub lpval:f32,
    pub rpval:f32,
    pub lvl:f32,
    pub tlt:f32,
}

impl BlockHeader {

    fn read<R:Read>(r:&mut R,path:&Path) -> Result<Self,FidError> {
        let m = |source| FidError::Malformed {
            path:path.to_owned(),
            context:"block header",
            source,
        };
        Ok(Self {
            scale:r.read_i16::<BigEndian>().map_err(m)?,
            status:r.read_i16::<BigEndian>().map_err(m)?,
            index:r.read_i16::<BigEndian>().map_err(m)?,
            mode:r.read_i16::<BigEndian>().map_err(m)?,
            ct:r.read_i32::<BigEndian>().map_err(m)?,
            lpval:r.read_f32::<BigEndian>().map_err(m)?,
            rpval:r.read_f32::<BigEndian>().map_err(m)?,
            lvl:r.read_f32::<BigEndian>().map_err(m)?,
            tlt:r.read_f32::<BigEndian>().map_err(m)?,
        })
    }

}

/// ascending 0-based block/trace retention lists. The default is the identity
/// (keep everything); partial selection follows the instrument convention of
/// advancing the block pointer only after a block yields a selected trace.
#[derive(Debug,Clone)]
pub struct Selection {
    blocks:Vec<usize>,
    traces:Vec<usize>,
}

impl Selection {

    pub fn new(blocks:Vec<usize>,traces:Vec<usize>,header:&FidHeader) -> Result<Self,FidError> {
        Self::check(&blocks,header.nblocks as usize,"blocks")?;
        Self::check(&traces,header.ntraces as usize,"traces")?;
        Ok(Self {
            blocks,
            traces,
        })
    }

    pub fn all(header:&FidHeader) -> Self {
        Self {
            blocks:(0..header.nblocks as usize).collect(),
            traces:(0..header.ntraces as usize).collect(),
        }
    }

    fn check(indices:&[usize],limit:usize,what:&'static str) -> Result<(),FidError> {
        let ascending = indices.windows(2).all(|w| w[0] < w[1]);
        let in_range = indices.iter().all(|i| *i < limit);
        match ascending && in_range {
            true => Ok(()),
            false => Err(FidError::BadSelection {
                what,
                limit,
            }),
        }
    }

}

/// real/imaginary sample matrices for the retained traces,
/// shape [np/2, kept blocks x kept traces] in selection order
pub struct RawTraceMatrix {
    pub real:Array2<f32>,
    pub imag:Array2<f32>,
    pub header:FidHeader,
}

pub struct FidFile {
    path:PathBuf,
}

impl FidFile {

    /// data file for an acquisition base path (varian convention: <base>.fid/fid)
    pub fn new(acquisition_base:&Path) -> Self {
        Self {
            path:fid_dir(acquisition_base).join("fid"),
        }
    }

    fn open(&self) -> Result<BufReader<File>,FidError> {
        let f = File::open(&self.path).map_err(|e| FidError::Missing {
            path:self.path.clone(),
            source:e,
        })?;
        Ok(BufReader::new(f))
    }

    pub fn header(&self) -> Result<FidHeader,FidError> {
        let mut r = self.open()?;
        FidHeader::read(&mut r,&self.path)
    }

    /// read every block and trace
    pub fn read(&self) -> Result<RawTraceMatrix,FidError> {
        let mut r = self.open()?;
        let header = FidHeader::read(&mut r,&self.path)?;
        let selection = Selection::all(&header);
        self.read_body(&mut r,header,&selection)
    }

    /// read a subset of blocks/traces
    pub fn read_selection(&self,selection:&Selection) -> Result<RawTraceMatrix,FidError> {
        let mut r = self.open()?;
        let header = FidHeader::read(&mut r,&self.path)?;
        self.read_body(&mut r,header,selection)
    }

    fn read_body(&self,r:&mut BufReader<File>,header:FidHeader,selection:&Selection)
        -> Result<RawTraceMatrix,FidError> {
        let np = header.np as usize;
        let points = header.points();
        let etype = header.element_type();
        let ob = selection.blocks.len();
        let ot = selection.traces.len();

        let mut kept_real = Vec::<Vec<f32>>::with_capacity(ob * ot);
        let mut kept_imag = Vec::<Vec<f32>>::with_capacity(ob * ot);
        let mut trace_buf = vec![0.0f32;np];

        // block selection pointer advances only after a block yields a kept trace
        let mut j = 0;
        for k in 0..header.nblocks as usize {
            let _block_header = BlockHeader::read(r,&self.path)?;
            let mut a = 0;
            let mut block_yielded = false;
            for c in 0..header.ntraces as usize {
                self.read_trace(r,etype,&mut trace_buf)?;
                if j < ob && selection.blocks[j] == k && a < ot && selection.traces[a] == c {
                    kept_real.push(trace_buf.iter().step_by(2).copied().collect());
                    kept_imag.push(trace_buf.iter().skip(1).step_by(2).copied().collect());
                    a += 1;
                    block_yielded = true;
                }
            }
            if block_yielded {
                j += 1;
            }
            if j >= ob {
                break;
            }
        }

        let n_kept = kept_real.len();
        let mut real = Array2::<f32>::zeros((points,n_kept));
        let mut imag = Array2::<f32>::zeros((points,n_kept));
        for (col,(re,im)) in kept_real.iter().zip(kept_imag.iter()).enumerate() {
            for row in 0..points {
                real[[row,col]] = re[row];
                imag[[row,col]] = im[row];
            }
        }
        Ok(RawTraceMatrix {
            real,
            imag,
            header,
        })
    }

    fn read_trace(&self,r:&mut BufReader<File>,etype:ElementType,out:&mut [f32])
        -> Result<(),FidError> {
        let m = |source| FidError::Malformed {
            path:self.path.clone(),
            context:"trace data",
            source,
        };
        for sample in out.iter_mut() {
            *sample = match etype {
                ElementType::Float32 => r.read_f32::<BigEndian>().map_err(m)?,
                ElementType::Int32 => r.read_i32::<BigEndian>().map_err(m)? as f32,
                ElementType::Int16 => r.read_i16::<BigEndian>().map_err(m)? as f32,
            };
        }
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    // deterministic sample value for block b, trace t, element e
    fn sample(b:usize,t:usize,e:usize) -> f32 {
        (1000 * b + 100 * t + e) as f32
    }

    fn write_fid(dir:&Path,nblocks:usize,ntraces:usize,np:usize,status:i16) -> PathBuf {
        let base = dir.join("epsi_16x12_13c_01");
        std::fs::create_dir_all(fid_dir(&base)).unwrap();
        let etype = ElementType::from_status(status);
        let ebytes = match etype {
            ElementType::Int16 => 2,
            _ => 4,
        };
        let mut bytes = Vec::<u8>::new();
        bytes.write_i32::<BigEndian>(nblocks as i32).unwrap();
        bytes.write_i32::<BigEndian>(ntraces as i32).unwrap();
        bytes.write_i32::<BigEndian>(np as i32).unwrap();
        bytes.write_i32::<BigEndian>(ebytes).unwrap();
        bytes.write_i32::<BigEndian>(ebytes * np as i32).unwrap();
        bytes.write_i32::<BigEndian>(28 + ebytes * (np * ntraces) as i32).unwrap();
        bytes.write_i16::<BigEndian>(0).unwrap();
        bytes.write_i16::<BigEndian>(status).unwrap();
        bytes.write_i32::<BigEndian>(1).unwrap();
        for b in 0..nblocks {
            // block header
            bytes.write_i16::<BigEndian>(1).unwrap();
            bytes.write_i16::<BigEndian>(status).unwrap();
            bytes.write_i16::<BigEndian>(b as i16).unwrap();
            bytes.write_i16::<BigEndian>(0).unwrap();
            bytes.write_i32::<BigEndian>(1).unwrap();
            for _ in 0..4 {
                bytes.write_f32::<BigEndian>(0.0).unwrap();
            }
            for t in 0..ntraces {
                for e in 0..np {
                    match etype {
                        ElementType::Float32 => bytes.write_f32::<BigEndian>(sample(b,t,e)).unwrap(),
                        ElementType::Int32 => bytes.write_i32::<BigEndian>(sample(b,t,e) as i32).unwrap(),
                        ElementType::Int16 => bytes.write_i16::<BigEndian>(sample(b,t,e) as i16).unwrap(),
                    }
                }
            }
        }
        let mut f = File::create(fid_dir(&base).join("fid")).unwrap();
        f.write_all(&bytes).unwrap();
        base
    }

    #[test]
    fn float_fid_dimensions_and_channels(){
        let tmp = tempfile::tempdir().unwrap();
        let base = write_fid(tmp.path(),2,3,8,8);
        let m = FidFile::new(&base).read().unwrap();
        assert_eq!(m.real.dim(),(4,6));
        assert_eq!(m.imag.dim(),(4,6));
        assert_eq!(m.header.element_type(),ElementType::Float32);
        // column order is block-major trace order; even elements real, odd imaginary
        assert_eq!(m.real[[0,0]],sample(0,0,0));
        assert_eq!(m.imag[[0,0]],sample(0,0,1));
        assert_eq!(m.real[[3,5]],sample(1,2,6));
        assert_eq!(m.imag[[3,5]],sample(1,2,7));
    }

    #[test]
    fn re_reading_is_idempotent(){
        let tmp = tempfile::tempdir().unwrap();
        let base = write_fid(tmp.path(),2,2,4,8);
        let fid = FidFile::new(&base);
        let first = fid.read().unwrap();
        let second = fid.read().unwrap();
        assert_eq!(first.real,second.real);
        assert_eq!(first.imag,second.imag);
    }

    #[test]
    fn short_int_elements_decode(){
        let tmp = tempfile::tempdir().unwrap();
        let base = write_fid(tmp.path(),1,2,4,0);
        let m = FidFile::new(&base).read().unwrap();
        assert_eq!(m.header.element_type(),ElementType::Int16);
        assert_eq!(m.real[[1,1]],sample(0,1,2));
    }

    #[test]
    fn int32_elements_decode(){
        let tmp = tempfile::tempdir().unwrap();
        let base = write_fid(tmp.path(),1,1,4,4);
        let m = FidFile::new(&base).read().unwrap();
        assert_eq!(m.header.element_type(),ElementType::Int32);
        assert_eq!(m.imag[[1,0]],sample(0,0,3));
    }

    #[test]
    fn partial_selection(){
        let tmp = tempfile::tempdir().unwrap();
        let base = write_fid(tmp.path(),3,4,4,8);
        let fid = FidFile::new(&base);
        let header = fid.header().unwrap();
        let s = Selection::new(vec![1],vec![0,2],&header).unwrap();
        let m = fid.read_selection(&s).unwrap();
        assert_eq!(m.real.dim(),(2,2));
        assert_eq!(m.real[[0,0]],sample(1,0,0));
        assert_eq!(m.real[[0,1]],sample(1,2,0));
    }

    #[test]
    fn non_ascending_selection_is_rejected(){
        let tmp = tempfile::tempdir().unwrap();
        let base = write_fid(tmp.path(),2,2,4,8);
        let fid = FidFile::new(&base);
        let header = fid.header().unwrap();
        assert!(Selection::new(vec![1,0],vec![0],&header).is_err());
        assert!(Selection::new(vec![0],vec![5],&header).is_err());
    }

    fn write_bare_header(dir:&Path,nblocks:i32,ntraces:i32,np:i32) -> PathBuf {
        let base = dir.join("epsi_16x12_13c_01");
        std::fs::create_dir_all(fid_dir(&base)).unwrap();
        let mut bytes = Vec::<u8>::new();
        bytes.write_i32::<BigEndian>(nblocks).unwrap();
        bytes.write_i32::<BigEndian>(ntraces).unwrap();
        bytes.write_i32::<BigEndian>(np).unwrap();
        bytes.write_i32::<BigEndian>(4).unwrap();
        bytes.write_i32::<BigEndian>(0).unwrap();
        bytes.write_i32::<BigEndian>(0).unwrap();
        bytes.write_i16::<BigEndian>(0).unwrap();
        bytes.write_i16::<BigEndian>(8).unwrap();
        bytes.write_i32::<BigEndian>(1).unwrap();
        std::fs::write(fid_dir(&base).join("fid"),&bytes).unwrap();
        base
    }

    #[test]
    fn implausible_header_counts_are_malformed(){
        for (nblocks,ntraces,np) in [(1,1,-2),(-1,1,4),(1,-3,4),(0,1,4),(1,1,5)] {
            let tmp = tempfile::tempdir().unwrap();
            let base = write_bare_header(tmp.path(),nblocks,ntraces,np);
            match FidFile::new(&base).read() {
                Err(FidError::Malformed{context,..}) => assert_eq!(context,"header counts"),
                other => panic!("expected Malformed for np {}, got {:?}",np,other.err()),
            }
        }
    }

    #[test]
    fn truncated_file_is_malformed(){
        let tmp = tempfile::tempdir().unwrap();
        let base = write_fid(tmp.path(),2,2,4,8);
        let path = fid_dir(&base).join("fid");
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path,&bytes[..bytes.len() - 10]).unwrap();
        match FidFile::new(&base).read() {
            Err(FidError::Malformed{context,..}) => assert_eq!(context,"trace data"),
            _ => panic!("expected Malformed"),
        }
    }

    #[test]
    fn missing_file(){
        let tmp = tempfile::tempdir().unwrap();
        match FidFile::new(&tmp.path().join("nope")).read() {
            Err(FidError::Missing{..}) => {},
            _ => panic!("expected Missing"),
        }
    }
}
