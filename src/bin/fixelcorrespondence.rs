// ----------------------------------- CLI -----------------------------------

#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "fixelcorrespondence", about = "Establish correspondence between two fixel datasets")]
pub struct Cli {

    /// The source fixel dataset directory (spatially normalised onto the target grid)
    pub source: PathBuf,

    /// The target fixel dataset directory
    pub target: PathBuf,

    /// The output directory encoding the fixel correspondence
    pub output: PathBuf,

    /// The algorithm to use when establishing fixel correspondence
    #[clap(long, value_enum, default_value_t = Algorithm::Ni2022)]
    pub algorithm: Algorithm,

    /// Maximum angle within which a corresponding fixel may be selected, in
    /// degrees (algorithm "nearest" only)
    #[clap(long)]
    pub angle: Option<f32>,

    /// The two constants modulating the influence of the cost function
    /// terms (algorithm "ni2022" only)
    #[clap(long, num_args = 2, value_names = ["ALPHA", "BETA"])]
    pub constants: Option<Vec<f32>>,

    /// Maximal number of origin source fixels for an individual target fixel
    #[clap(long, default_value_t = combinatorial::DEFAULT_MAX_ORIGINS)]
    pub max_origins: usize,

    /// Maximal number of objective target fixels for an individual source fixel
    #[clap(long, default_value_t = combinatorial::DEFAULT_MAX_OBJECTIVES)]
    pub max_objectives: usize,

    /// Export a 3D image containing the optimal value of the cost function
    /// in each voxel
    #[clap(long)]
    pub cost: Option<PathBuf>,

    /// Export the remapped source fixels to a new fixel directory
    #[clap(long)]
    pub remapped: Option<PathBuf>,

    /// Also save the inverse (source to target) mapping alongside
    #[clap(long)]
    pub inverse: bool,

    /// Maximum number of rayon threads (0: let rayon decide)
    #[clap(short = 'j', long, default_value_t = 0)]
    pub n_threads: usize,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Threshold-gated nearest neighbour (legacy one-to-one behaviour)
    Nearest,
    /// Combinatorial search, Smith & Connelly ISMRM 2018 cost function
    Ismrm2018,
    /// Combinatorial search, alternative cost function with tunable constants
    Ni2022,
}

// --------------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use fixelcorr::{FixelDataset, FixelError};
use fixelcorr::algorithms::{self, Correspondence, CombinatorialParams, Nearest, Ni2022,
                            combinatorial, nearest};
use fixelcorr::matcher::Matcher;
use fixelcorr::io;
use fixelcorr::utils::group_digits;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // All configuration problems must surface before any per-voxel work
    if args.output.exists() {
        return Err(FixelError::OutputExists(args.output).into());
    }
    if args.angle.is_some() && args.algorithm != Algorithm::Nearest {
        return Err(FixelError::InvalidParameter(
            "option --angle only applies to algorithm \"nearest\"".into()).into());
    }
    if args.constants.is_some() && args.algorithm != Algorithm::Ni2022 {
        return Err(FixelError::InvalidParameter(
            "option --constants only applies to algorithm \"ni2022\"".into()).into());
    }
    let algorithm = build_algorithm(&args)?;

    if args.n_threads > 0 {
        rayon::ThreadPoolBuilder::new().num_threads(args.n_threads).build_global()?;
    }

    let source = FixelDataset::load(&args.source)?;
    let target = FixelDataset::load(&args.target)?;
    println!("source: {} fixels on grid {:?}; target: {} fixels",
             group_digits(source.len()), source.grid().n, group_digits(target.len()));

    let matcher = Matcher::new(&source, &target, algorithm.as_ref())?;
    let output = matcher.run(args.remapped.is_some(), true);

    if args.inverse {
        output.mapping.save_with_inverse(&args.output)?;
    } else {
        output.mapping.save(&args.output)?;
    }

    if let (Some(path), Some(cost)) = (&args.cost, &output.cost) {
        io::save_volume(path, cost)?;
    }
    if let (Some(path), Some(directions)) = (&args.remapped, output.remapped) {
        source.with_directions(directions)?.save(path)?;
    }

    let unmapped = (0..output.mapping.len()).filter(|&t| output.mapping[t].is_empty()).count();
    if unmapped > 0 {
        eprintln!("WARNING: {} of {} target fixels received no corresponding source fixel",
                  group_digits(unmapped), group_digits(output.mapping.len()));
    }
    Ok(())
}

fn build_algorithm(args: &Cli) -> Result<Box<dyn Correspondence>, FixelError> {
    Ok(match args.algorithm {
        Algorithm::Nearest => {
            let angle = args.angle.unwrap_or(nearest::DEFAULT_MAX_ANGLE_DEG);
            Box::new(Nearest::new(angle)?)
        }
        Algorithm::Ismrm2018 => {
            Box::new(algorithms::Ismrm2018::new(combinatorial_params(args)?))
        }
        Algorithm::Ni2022 => {
            let mut algorithm = Ni2022::new(combinatorial_params(args)?);
            if let Some(c) = &args.constants {
                algorithm.set_constants(c[0], c[1]);
            }
            Box::new(algorithm)
        }
    })
}

fn combinatorial_params(args: &Cli) -> Result<CombinatorialParams, FixelError> {
    Ok(CombinatorialParams::new(args.max_origins, args.max_objectives)?
       .export_cost(args.cost.is_some()))
}
