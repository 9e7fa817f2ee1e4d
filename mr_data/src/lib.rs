pub mod fid;
pub mod procpar;
