use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use vigil_core::{FaceCatalog, FrameClassifier, FrameMatch, OnnxAnalyzer, DEFAULT_MATCH_TOLERANCE};
use vigil_hw::{Camera, FrameSource};

#[derive(Parser)]
#[command(name = "vigil", about = "Vigil presence monitor diagnostics")]
struct Cli {
    /// Directory containing the ONNX models
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the known-people directory and report what it contains
    Catalog {
        /// One subdirectory of images per person
        #[arg(short, long, default_value = "./known_people")]
        dir: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices,
    /// Show the lock action for this system
    Lock {
        /// Lock the workstation now
        #[arg(long)]
        now: bool,
    },
    /// Capture one frame and classify the faces in it
    Snapshot {
        #[arg(short, long, default_value = "./known_people")]
        dir: PathBuf,
        #[arg(long, default_value = "/dev/video0")]
        camera: String,
        /// Requested capture width; the driver may pick the nearest size
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
        #[arg(long, default_value_t = 4)]
        warmup: usize,
        #[arg(long, default_value_t = DEFAULT_MATCH_TOLERANCE)]
        tolerance: f32,
        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let model_dir = cli.model_dir.unwrap_or_else(vigil_core::default_model_dir);

    match cli.command {
        Commands::Catalog { dir, json } => {
            let mut analyzer = load_analyzer(&model_dir)?;
            let catalog = FaceCatalog::load(&dir, &mut analyzer);
            tracing::debug!(faces = catalog.len(), skipped = catalog.skipped().len(), "catalog loaded");
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog_report(&catalog))?);
            } else {
                print_catalog(&dir, &catalog);
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
        Commands::Lock { now } => {
            let actuator = vigil_hw::detect_actuator();
            println!("Lock action: {}", actuator.describe());
            if now {
                tracing::info!(actuator = %actuator.describe(), "locking on request");
                actuator.lock()?;
                println!("Locked");
            }
        }
        Commands::Snapshot {
            dir,
            camera,
            width,
            height,
            warmup,
            tolerance,
            json,
        } => {
            let mut classifier = FrameClassifier::new(load_analyzer(&model_dir)?, tolerance);
            let catalog = FaceCatalog::load(&dir, classifier.analyzer_mut());

            let cam = Camera::open(&camera, width, height)?;
            if (cam.width, cam.height) != (width, height) {
                tracing::warn!(
                    requested = %format!("{width}x{height}"),
                    negotiated = %format!("{}x{}", cam.width, cam.height),
                    "camera picked a different frame size"
                );
            }
            let frame = cam.stream(warmup)?.next_frame()?;
            println!(
                "Captured {}x{} {:?} frame (brightness {:.1})",
                frame.width,
                frame.height,
                cam.fourcc,
                frame.avg_brightness()
            );

            let matches = classifier.classify(&frame.data, frame.width, frame.height, &catalog)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                print_matches(&matches);
            }
        }
    }

    Ok(())
}

fn load_analyzer(model_dir: &Path) -> Result<OnnxAnalyzer> {
    OnnxAnalyzer::load(model_dir)
        .with_context(|| format!("failed to load models from {}", model_dir.display()))
}

fn catalog_report(catalog: &FaceCatalog) -> serde_json::Value {
    let identities: Vec<_> = catalog
        .identities()
        .into_iter()
        .map(|name| {
            let images = catalog.entries().iter().filter(|f| f.name == name).count();
            serde_json::json!({ "name": name, "images": images })
        })
        .collect();
    let skipped: Vec<_> = catalog
        .skipped()
        .iter()
        .map(|s| {
            serde_json::json!({
                "identity": s.identity,
                "path": s.path.display().to_string(),
                "reason": s.reason.to_string(),
            })
        })
        .collect();

    serde_json::json!({
        "faces": catalog.len(),
        "dimension": catalog.dimension(),
        "identities": identities,
        "skipped": skipped,
    })
}

fn print_catalog(dir: &Path, catalog: &FaceCatalog) {
    println!("Catalog {}: {} face(s)", dir.display(), catalog.len());
    for name in catalog.identities() {
        let images = catalog.entries().iter().filter(|f| f.name == name).count();
        println!("  {name:<24} {images} image(s)");
    }
    if !catalog.skipped().is_empty() {
        println!("Skipped:");
        for s in catalog.skipped() {
            println!("  {} ({}): {}", s.path.display(), s.identity, s.reason);
        }
    }
}

fn print_matches(matches: &[FrameMatch]) {
    if matches.is_empty() {
        println!("No faces");
        return;
    }
    for m in matches {
        let l = m.location;
        println!(
            "{:<24} top={} right={} bottom={} left={}",
            m.label(),
            l.top,
            l.right,
            l.bottom,
            l.left
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{Embedding, KnownFace};

    fn face(name: &str) -> KnownFace {
        KnownFace {
            name: name.into(),
            embedding: Embedding::new(vec![0.0, 1.0, 0.0]),
        }
    }

    #[test]
    fn test_catalog_report_counts_images_per_identity() {
        let catalog = FaceCatalog::from_faces(vec![face("bob"), face("alice"), face("bob")]).unwrap();
        let report = catalog_report(&catalog);

        assert_eq!(report["faces"], 3);
        assert_eq!(report["dimension"], 3);
        assert_eq!(report["identities"][0]["name"], "alice");
        assert_eq!(report["identities"][0]["images"], 1);
        assert_eq!(report["identities"][1]["name"], "bob");
        assert_eq!(report["identities"][1]["images"], 2);
        assert!(report["skipped"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_frame_size_flags() {
        let cli = Cli::try_parse_from(["vigil", "snapshot", "--width", "1280", "--height", "720"]).unwrap();
        let Commands::Snapshot { width, height, warmup, .. } = cli.command else {
            panic!("expected snapshot subcommand");
        };
        assert_eq!((width, height), (1280, 720));
        assert_eq!(warmup, 4);

        let cli = Cli::try_parse_from(["vigil", "snapshot"]).unwrap();
        let Commands::Snapshot { width, height, .. } = cli.command else {
            panic!("expected snapshot subcommand");
        };
        assert_eq!((width, height), (640, 480));
    }

    #[test]
    fn test_catalog_report_empty() {
        let report = catalog_report(&FaceCatalog::default());
        assert_eq!(report["faces"], 0);
        assert!(report["dimension"].is_null());
    }
}
