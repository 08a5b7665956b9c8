//! Plane extraction from the command line
//!
//! Usage:
//!     plane-extract cloud.ply --action find_convex_hull_with_normals --html-dir out/
//!     plane-extract cloud.xyz --min-points 300 --threshold 0.02 --normals --store db.json

use anyhow::{Context, bail};
use clap::Parser;
use math_plane_extraction::{
    Action, ExtractionOutput, ExtractionParams, FileLoader, HtmlSink, JsonStore, MemoryStore,
    NullSink, PipelineConfig, Session, SharedGateway, SharedSink,
};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "plane-extract",
    about = "Extract planar regions, their convex hulls and facet normals from a point cloud"
)]
struct Cli {
    /// Point cloud file (.ply, .xyz, .txt, .pts)
    input: Option<PathBuf>,

    /// Named action (use --list-actions to see available options); the
    /// generic extraction runs when absent
    #[arg(long)]
    action: Option<String>,

    /// JSON configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum number of inliers for an accepted region
    #[arg(long)]
    min_points: Option<usize>,

    /// Maximum point-to-plane distance of an inlier
    #[arg(long)]
    threshold: Option<f64>,

    /// Points drawn per RANSAC trial
    #[arg(long)]
    sample_size: Option<usize>,

    /// RANSAC trials per plane
    #[arg(long)]
    iterations: Option<usize>,

    /// Stop after this many regions
    #[arg(long)]
    max_planes: Option<usize>,

    /// Build a convex hull per region
    #[arg(long)]
    hull: bool,

    /// Compute facet normals per region (implies --hull)
    #[arg(long)]
    normals: bool,

    /// Optional random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Disable parallel evaluation of RANSAC trials
    #[arg(long)]
    no_parallel: bool,

    /// Number of threads for parallel evaluation (0 = use all available cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// JSON file used as persistent store
    #[arg(long)]
    store: Option<PathBuf>,

    /// Directory receiving one HTML scene per run
    #[arg(long)]
    html_dir: Option<PathBuf>,

    /// Write the full result as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// List the named actions and exit
    #[arg(long)]
    list_actions: bool,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        let p = &mut config.params;
        if let Some(v) = self.min_points {
            p.min_points_per_plane = v;
        }
        if let Some(v) = self.threshold {
            p.distance_threshold = v;
        }
        if let Some(v) = self.sample_size {
            p.sample_size = v;
        }
        if let Some(v) = self.iterations {
            p.max_iterations = v;
        }
        if self.max_planes.is_some() {
            p.max_planes = self.max_planes;
        }
        if self.seed.is_some() {
            p.seed = self.seed;
        }
        p.compute_hull |= self.hull;
        p.compute_normals |= self.normals;
        p.parallel &= !self.no_parallel;

        if self.store.is_some() {
            config.store_path = self.store.clone();
        }
        if self.html_dir.is_some() {
            config.html_dir = self.html_dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn action(&self, params: ExtractionParams) -> anyhow::Result<Action> {
        match &self.action {
            Some(name) => Ok(name.parse()?),
            None => Ok(Action::Extract(params)),
        }
    }
}

fn print_summary(output: &ExtractionOutput, seconds: f64) {
    println!(
        "{}: {} points, {} regions, {} unclaimed ({:.3}s)",
        output.operation,
        output.point_count,
        output.regions.len(),
        output.residual_points,
        seconds
    );
    for region in &output.regions {
        let hull = match &region.hull {
            Some(h) => format!("hull {} vertices / {} faces", h.num_vertices(), h.num_faces()),
            None => "no hull".to_string(),
        };
        println!(
            "  region {:>2}: {:>7} inliers  plane {}  {}  {} normals",
            region.index,
            region.inliers.len(),
            region.plane,
            hull,
            region.facets.len()
        );
    }
    for diagnostic in &output.diagnostics {
        println!("  ! {}", diagnostic);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Cli::parse();

    if args.list_actions {
        println!("Available actions:");
        for name in Action::NAMES {
            println!("  {}", name);
        }
        return Ok(());
    }

    let Some(input) = args.input.clone() else {
        bail!("an input point cloud is required (see --help)");
    };

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .context("failed to configure the thread pool")?;
    }

    let config = args.pipeline_config()?;
    let action = args.action(config.params)?;

    let gateway: SharedGateway = match &config.store_path {
        Some(path) => Arc::new(Mutex::new(
            JsonStore::open(path).with_context(|| format!("opening store {}", path.display()))?,
        )),
        None => Arc::new(Mutex::new(MemoryStore::new())),
    };
    let sink: SharedSink = match &config.html_dir {
        Some(dir) => Arc::new(Mutex::new(HtmlSink::new(dir, action.name()))),
        None => Arc::new(Mutex::new(NullSink::default())),
    };

    let session = Session::new(config, gateway, sink);
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let file_id = session
        .open_file(&name, &input, &FileLoader)
        .with_context(|| format!("opening {}", input.display()))?;
    println!("Opened {} as file {}", input.display(), file_id);

    let start = Instant::now();
    let output = session.spawn(action)?.wait()?;
    print_summary(&output, start.elapsed().as_secs_f64());

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&*output)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Result written to {}", path.display());
    }

    Ok(())
}
