use cv_augment::{
    select_features, Augment, AugmentRenderer, Database, Entry, Error, Image, Matcher,
    MatcherSettings, Region,
};
use image::ImageOutputFormat;
use log::*;
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "augdb",
    about = "A tool to build augment databases and recognize images against them"
)]
struct Opt {
    /// The database snapshot file.
    ///
    /// If this file doesn't exist, an empty database is created there.
    #[structopt(short, long, default_value = "augdb.db", parse(from_os_str))]
    database: PathBuf,
    /// The file where settings are specified.
    ///
    /// This is in the format of `cv_augment::MatcherSettings`. Defaults are used if it is missing.
    #[structopt(short, long, default_value = "augdb-settings.json", parse(from_os_str))]
    settings: PathBuf,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Extract the features of an image and commit it as a new entry.
    Add {
        /// The reference image.
        #[structopt(parse(from_os_str))]
        image: PathBuf,
        /// The unique name of the entry.
        #[structopt(short, long)]
        name: String,
        /// An optional group label.
        #[structopt(short, long)]
        group: Option<String>,
        /// A JSON file holding a list of augments in entry image coordinates.
        #[structopt(short, long, parse(from_os_str))]
        augments: Option<PathBuf>,
        /// Only keep the features inside this `x,y,width,height` rectangle.
        #[structopt(short, long)]
        region: Option<RegionArg>,
        /// Replace an existing entry with the same name instead of failing.
        #[structopt(long)]
        replace: bool,
    },
    /// List the entries of the database in scan order.
    List,
    /// Draw the features that would be extracted from an image.
    Features {
        #[structopt(parse(from_os_str))]
        image: PathBuf,
        /// The output path to write to (autodetects image type from extension).
        ///
        /// If this is not provided, then the output goes to stdout as a PNG.
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Recognize an image and draw the augments of the matched entry onto it.
    Recognize {
        #[structopt(parse(from_os_str))]
        image: PathBuf,
        /// The output path to write to (autodetects image type from extension).
        ///
        /// If this is not provided, then the output goes to stdout as a PNG.
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
        /// Also write the correspondences with the matched entry side by side to this path.
        #[structopt(short, long, parse(from_os_str))]
        matches: Option<PathBuf>,
        /// A TrueType font used to draw text augments.
        #[structopt(short, long, parse(from_os_str))]
        font: Option<PathBuf>,
    },
}

#[derive(Debug)]
struct RegionArg(Region);

impl FromStr for RegionArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|e| format!("invalid region {:?}: {}", s, e))?;
        match values[..] {
            [x, y, width, height] if width > 0.0 && height > 0.0 => Ok(RegionArg(Region {
                x,
                y,
                width,
                height,
            })),
            _ => Err(format!(
                "expected a region as x,y,width,height with a positive extent, found {:?}",
                s
            )),
        }
    }
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(opt) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let matcher = Matcher::new(load_settings(&opt.settings));
    let mut database = Database::connect(&opt.database)?;

    match opt.command {
        Command::Add {
            image,
            name,
            group,
            augments,
            region,
            replace,
        } => {
            let image = Image::from_file(image)?;
            let mut features = matcher.features(&image);
            if let Some(RegionArg(region)) = region {
                features = select_features(&features, &region);
                info!("Selected {} features inside {:?}", features.len(), region);
            }
            let mut entry = Entry::new(name, image, features)?;
            if let Some(group) = group {
                entry = entry.with_group(group);
            }
            if let Some(path) = augments {
                let augments: Vec<Augment> = serde_json::from_reader(File::open(path)?)?;
                entry = entry.with_augments(augments)?;
            }
            let name = entry.name().to_owned();
            if replace {
                if database.upsert_entry(entry)?.is_some() {
                    info!("Replaced entry {:?}", name);
                }
            } else {
                database.add_entry(entry)?;
            }
            info!("Database now holds {} entries", database.len());
        }
        Command::List => {
            for entry in database.entries() {
                println!(
                    "{}\t{}\t{}x{}\t{} features\t{} augments",
                    entry.name(),
                    entry.group().unwrap_or("-"),
                    entry.image().width(),
                    entry.image().height(),
                    entry.features().len(),
                    entry.augments().len()
                );
            }
        }
        Command::Features { image, output } => {
            let image = Image::from_file(image)?;
            let features = matcher.features(&image);
            let rendered = augdb::render_keypoints(&image, &features);
            write_image(&rendered, output.as_deref())?;
        }
        Command::Recognize {
            image,
            output,
            matches,
            font,
        } => {
            let query = Image::from_file(image)?;
            let mut renderer = AugmentRenderer::default();
            if let Some(path) = font {
                renderer = renderer.with_font_file(path)?;
            }
            let recognition = match matcher.recognize(&database, &query, &renderer) {
                Err(Error::HomographyEstimationFailed { correspondences }) => {
                    info!(
                        "No usable registration from {} correspondences",
                        correspondences
                    );
                    None
                }
                Err(Error::DegenerateHomography(reason)) => {
                    info!("Registration cannot be warped with: {}", reason);
                    None
                }
                result => result?,
            };
            match recognition {
                Some(recognition) => {
                    // Stdout may be carrying the composite image.
                    if output.is_some() {
                        println!("{}", recognition.entry.name());
                    } else {
                        info!("Recognized {:?}", recognition.entry.name());
                    }
                    if let Some(path) = matches {
                        augdb::render_correspondences(
                            recognition.entry.image(),
                            recognition.entry.features(),
                            &query,
                            &recognition.features,
                            &recognition.correspondences,
                            Some(recognition.registration.inliers.as_slice()),
                        )
                        .save(path)?;
                    }
                    let composite = image::DynamicImage::ImageRgba8(recognition.composite(&query));
                    write_image(&composite, output.as_deref())?;
                }
                None => {
                    info!("No entry matched");
                    process::exit(2);
                }
            }
        }
    }
    Ok(())
}

fn load_settings(path: &Path) -> MatcherSettings {
    let settings = File::open(path)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    settings.unwrap_or_default()
}

fn write_image(
    image: &image::DynamicImage,
    path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(path) => image.save(path)?,
        None => {
            // PNG encoding needs a seekable writer, which stdout is not.
            let mut png = Cursor::new(Vec::new());
            image.write_to(&mut png, ImageOutputFormat::Png)?;
            std::io::stdout().lock().write_all(png.get_ref())?;
        }
    }
    Ok(())
}
