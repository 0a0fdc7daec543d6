// ----------------------------------- CLI -----------------------------------

#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "fixel2fixel",
       about = "Map quantitative data from one fixel dataset to another, e.g. from subject to template fixels")]
pub struct Cli {

    /// The source fixel data file to be mapped
    pub data_in: PathBuf,

    /// The directory containing the fixel correspondence mapping
    pub correspondence: PathBuf,

    /// The metric to calculate when mapping multiple input fixels to an output fixel
    #[clap(value_enum)]
    pub metric: Metric,

    /// The source fixel dataset directory the input data belongs to
    pub source_dir: PathBuf,

    /// The target fixel dataset directory, in which the output file will be placed
    pub target_dir: PathBuf,

    /// The name of the output fixel data file
    pub data_out: String,

    /// Fixel data file with weights modulating each source fixel's
    /// contribution when aggregating multiple source fixels
    #[clap(long)]
    pub weighted: Option<PathBuf>,

    /// Value for output fixels to which no input fixels are mapped
    #[clap(long, default_value_t = 0.0)]
    pub fill: f32,

    /// Insert NaN where multiple input fixels map to the same output fixel
    #[clap(long)]
    pub nan_many2one: bool,

    /// Insert NaN where one input fixel maps to multiple output fixels
    #[clap(long)]
    pub nan_one2many: bool,

    /// Maximum number of rayon threads (0: let rayon decide)
    #[clap(short = 'j', long, default_value_t = 0)]
    pub n_threads: usize,
}

// --------------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use fixelcorr::{FixelError, FixelDataset, Mapping};
use fixelcorr::dataset::{read_data_file, write_data_file};
use fixelcorr::projector::{FillSettings, Metric, Projector};
use fixelcorr::utils::group_digits;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    if args.n_threads > 0 {
        rayon::ThreadPoolBuilder::new().num_threads(args.n_threads).build_global()?;
    }

    let mapping = Mapping::load(&args.correspondence, false)?;
    let source = FixelDataset::load(&args.source_dir)?;
    let target = FixelDataset::load(&args.target_dir)?;

    let values = read_data_file(&args.data_in, mapping.source_fixels() as usize)?;
    let weights = args.weighted.as_deref()
        .map(|path| read_data_file(path, mapping.source_fixels() as usize))
        .transpose()?;

    if source.len() as u32 != mapping.source_fixels() {
        return Err(FixelError::InvalidParameter(format!(
            "source dataset has {} fixels but the correspondence was computed for {}",
            source.len(), mapping.source_fixels())).into());
    }

    let fill = FillSettings {
        value: args.fill,
        nan_many2one: args.nan_many2one,
        nan_one2many: args.nan_one2many,
    };
    let projector = Projector::new(&mapping, &values,
                                   source.directions(), target.directions(),
                                   args.metric, fill, weights.as_deref())?;
    let output = projector.project();

    write_data_file(&args.target_dir.join(&args.data_out), &output)?;

    let unmapped = (0..mapping.len()).filter(|&t| mapping[t].is_empty()).count();
    if unmapped > 0 {
        eprintln!("WARNING: {} of {} output fixels had no corresponding input fixel; \
                   filled with {}",
                  group_digits(unmapped), group_digits(mapping.len()), args.fill);
    }
    if fill.nan_many2one || fill.nan_one2many {
        let flagged = output.iter().zip(0..mapping.len())
            .filter(|(v, t)| v.is_nan() && !mapping[*t].is_empty())
            .count();
        if flagged > 0 {
            eprintln!("WARNING: {} output fixels flagged as ambiguous (NaN)",
                      group_digits(flagged));
        }
    }
    Ok(())
}
