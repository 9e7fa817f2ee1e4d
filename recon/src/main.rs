use std::error::Error;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use clap::Parser;
use log::{error, info};
use recon::magnet::{process_epsi, EpsiRequest, MagnetType};
use recon::recon_config::{DataPaths, EpsiSettings, ScaleMode};
use recon::CancelToken;
use mr_data::procpar::Procpar;

#[derive(clap::Parser,Debug)]
pub struct HpMriArgs {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand,Debug)]
pub enum Action {
    /// reconstruct an EPSI dataset and emit the display payload as json
    Epsi(EpsiArgs),
    /// look up a procpar parameter for an acquisition
    Param(ParamArgs),
    /// write a default settings file to edit
    NewSettings(NewSettingsArgs),
}

#[derive(clap::Args,Debug)]
pub struct EpsiArgs {
    /// prefix for the 13c EPSI acquisitions; the dataset index is appended as two digits
    epsi_prefix:PathBuf,
    /// acquisition base for the companion proton (fsems) scan
    fid_base:PathBuf,
    /// dataset index
    dataset:usize,
    /// visibility cutoff for voxel maxima
    #[clap(long)]
    threshold:Option<f32>,
    #[clap(long,value_enum)]
    scale_mode:Option<ScaleMode>,
    /// smoothing width for the flattened sequence
    #[clap(long)]
    moving_average_window:Option<usize>,
    #[clap(long,value_enum)]
    magnet:Option<MagnetType>,
    /// settings file (toml); compiled defaults are used otherwise
    #[clap(long)]
    settings:Option<PathBuf>,
    /// write the json payload here instead of stdout
    #[clap(long,short)]
    output:Option<PathBuf>,
}

#[derive(clap::Args,Debug)]
pub struct ParamArgs {
    /// acquisition base path (the .fid directory minus its extension)
    acquisition_base:PathBuf,
    /// parameter name, including any index token ("nv 1")
    name:String,
}

#[derive(clap::Args,Debug)]
pub struct NewSettingsArgs {
    output:PathBuf,
}

fn main() {
    env_logger::init();
    let args = HpMriArgs::parse();
    if let Err(e) = run(args) {
        error!("{}",e);
        std::process::exit(1);
    }
}

fn run(args:HpMriArgs) -> Result<(),Box<dyn Error>> {
    match args.action {
        Action::Epsi(args) => run_epsi(args),
        Action::Param(args) => {
            let pp = Procpar::open(&args.acquisition_base)?;
            let values = pp.lookup(&args.name)?;
            let strings:Vec<String> = values.iter().map(|v| v.to_string()).collect();
            println!("{}",strings.join(" "));
            Ok(())
        }
        Action::NewSettings(args) => {
            EpsiSettings::default().to_file(&args.output)?;
            info!("wrote default settings to {:?}",args.output);
            Ok(())
        }
    }
}

fn run_epsi(args:EpsiArgs) -> Result<(),Box<dyn Error>> {
    let settings = match &args.settings {
        Some(path) => EpsiSettings::from_file(path)?,
        None => EpsiSettings::default(),
    };
    let paths = DataPaths {
        epsi_prefix:args.epsi_prefix,
        fid_base:args.fid_base,
        dicom_dir:None,
    };
    let request = EpsiRequest {
        dataset:args.dataset,
        threshold:args.threshold.unwrap_or(settings.threshold),
        scale_mode:args.scale_mode.unwrap_or(settings.scale_mode),
        moving_average_window:args.moving_average_window.unwrap_or(settings.moving_average_window),
        magnet:args.magnet.unwrap_or(MagnetType::Hupc),
    };
    let payload = process_epsi(&request,&paths,&settings,&CancelToken::new())?;
    let json = serde_json::to_string_pretty(&payload)?;
    match &args.output {
        Some(path) => {
            let mut f = File::create(path)?;
            f.write_all(json.as_bytes())?;
            info!("wrote payload to {:?}",path);
        }
        None => println!("{}",json),
    }
    Ok(())
}
