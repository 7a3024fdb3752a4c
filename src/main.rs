use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use postermap::config::EditorConfig;
use postermap::coords::LngLat;
use postermap::editor::{Admission, Editor};
use postermap::geotag::{KamadakExif, PlaceSelection};
use postermap::layout::{AnchorMarker, ConnectingLine, ImageCrateDecoder, ImageMarker, PhotoId};
use postermap::map::OfflineMap;
use postermap::svg::SvgRenderer;
use postermap::text::NominatimGeocoder;
use postermap::transmit::{HttpImageStore, HttpTransmitter, Notice, ProjectPayload};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Svg,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Lays out geotagged photos on a map poster.", long_about = None)]
struct Cli {
    /// Photos to place, in upload order
    #[arg(required = true)]
    photos: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with editor settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<f64>,

    #[arg(long)]
    height: Option<f64>,

    /// Location for a photo without GPS data, by its position on the command line
    #[arg(long = "at", value_name = "INDEX=LNG,LAT", value_parser = parse_location)]
    locations: Vec<(usize, LngLat)>,

    /// Fill the poster text from the first photo's location
    #[arg(long)]
    geocode: bool,

    /// Post the finished layout to this endpoint
    #[arg(long, value_name = "URL", requires = "upload")]
    transmit: Option<String>,

    /// Image upload endpoint used before transmitting
    #[arg(long, value_name = "URL")]
    upload: Option<String>,
}

fn parse_location(s: &str) -> Result<(usize, LngLat), String> {
    let (index, coords) = s.split_once('=').ok_or("expected INDEX=LNG,LAT")?;
    let (lng, lat) = coords.split_once(',').ok_or("expected LNG,LAT after '='")?;
    let index = index.trim().parse::<usize>().map_err(|e| e.to_string())?;
    let lng = lng.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let lat = lat.trim().parse::<f64>().map_err(|e| e.to_string())?;
    if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("coordinate out of range: {},{}", lng, lat));
    }
    Ok((index, LngLat::new(lng, lat)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    admission: &'a Admission,
    markers: Vec<&'a ImageMarker>,
    anchors: Vec<&'a AnchorMarker>,
    lines: Vec<&'a ConnectingLine>,
    payload: ProjectPayload,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => {
            let source = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            EditorConfig::from_toml_str(&source)?
        }
        None => EditorConfig::default(),
    };
    if let Some(width) = cli.width {
        config.container.width = width;
    }
    if let Some(height) = cli.height {
        config.container.height = height;
    }
    config.validate()?;

    let map = OfflineMap::new(config.container, config.tile_size);
    let mut editor = Editor::with_map(config, map);

    let mut photos = Vec::with_capacity(cli.photos.len());
    for path in &cli.photos {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        photos.push(editor.new_photo(path.display().to_string(), data));
    }
    let ids: Vec<PhotoId> = photos.iter().map(|p| p.id).collect();

    let mut admission = editor.ingest(&KamadakExif, &ImageCrateDecoder, photos).await;

    for (index, at) in &cli.locations {
        let Some(&id) = ids.get(*index) else {
            warn!(index = *index, "no photo at this position");
            continue;
        };
        let place = PlaceSelection {
            lat: at.lat,
            lng: at.lng,
            formatted_address: String::new(),
        };
        match editor.resolve_location(id, &place) {
            Ok(more) => {
                admission.placed.extend(more.placed);
                admission.plan = admission.plan.or(more.plan);
            }
            Err(e) => warn!("{}: {}", cli.photos[*index].display(), e),
        }
    }

    admission
        .awaiting_location
        .retain(|id| editor.pending().iter().any(|p| p.id == *id));
    for photo in editor.pending().iter() {
        let index = ids.iter().position(|id| *id == photo.id).unwrap_or_default();
        warn!("skipped {}: no GPS position, pass --at {}=LNG,LAT", photo.image_ref, index);
    }
    editor.discard_pending();

    if cli.geocode {
        editor.refresh_text(&NominatimGeocoder::new()).await;
    }

    if let (Some(endpoint), Some(upload)) = (&cli.transmit, &cli.upload) {
        let notice = editor
            .transmit(&HttpImageStore::new(upload.as_str()), &HttpTransmitter::new(endpoint.as_str()))
            .await;
        match notice {
            Notice::Success(message) => info!("{}", message),
            Notice::Error(message) => bail!(message),
        }
    }

    let output = match cli.format {
        Format::Svg => {
            let frame = editor.frame().context("Map is not ready")?;
            SvgRenderer::default().render(&frame, editor.text())
        }
        Format::Json => {
            let graph = editor.graph();
            let snapshot = Snapshot {
                admission: &admission,
                markers: graph.markers().collect(),
                anchors: graph.anchors().collect(),
                lines: graph.lines().collect(),
                payload: editor.project_payload().context("Map is not ready")?,
            };
            serde_json::to_string_pretty(&snapshot)?
        }
    };

    match cli.output {
        Some(path) => fs::write(&path, &output).with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", output),
    }
    Ok(())
}
