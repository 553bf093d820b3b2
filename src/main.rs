use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use urbanviz::color::{CategoryColors, ColorRamp};
use urbanviz::config::{MetricMode, VisualizationConfig};
use urbanviz::data::filter::ALL_SENTINEL;
use urbanviz::data::loader::load_source;
use urbanviz::isochrone::{parse_response, IsochroneClient, TravelMode};
use urbanviz::scale::ScaleMode;
use urbanviz::state::MapState;
use urbanviz::surface::{ChartDocument, StyleDocument};

#[derive(Parser)]
#[command(name = "urbanviz", version, about = "Visual encodings and isochrone tallies for urban map layers")]
struct Cli {
    /// Built-in visualization preset (buildings, traffic, boardings, isochrone)
    #[arg(long, global = true)]
    preset: Option<String>,

    /// JSON config file; takes precedence over --preset
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute the paint and filter expressions for a metric
    Scale {
        /// Dataset path or URL (defaults to the config's dataset)
        #[arg(long)]
        data: Option<String>,
        /// Metric driving the visual channel
        #[arg(long)]
        attribute: Option<String>,
        /// Override the configured scale mode
        #[arg(long)]
        mode: Option<ScaleMode>,
        /// Override the configured output maximum
        #[arg(long)]
        max: Option<f64>,
        /// Category to show, or "all"
        #[arg(long, default_value = ALL_SENTINEL)]
        category: String,
        /// Encode as colour instead: `low,high` hex colours
        #[arg(long, value_delimiter = ',')]
        color_ramp: Option<Vec<String>>,
    },
    /// Tally points inside a polygon read from a GeoJSON file
    Tally {
        /// GeoJSON whose first feature is the polygon
        #[arg(long)]
        polygon: PathBuf,
        #[command(flatten)]
        points: PointArgs,
    },
    /// Query the isochrone service and tally points inside the result
    Isochrone {
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Travel mode profile, e.g. foot-walking
        #[arg(long)]
        mode: Option<TravelMode>,
        /// Time budget in minutes
        #[arg(long)]
        minutes: Option<u32>,
        #[command(flatten)]
        points: PointArgs,
    },
    /// Print the yearly series of one feature
    Series {
        #[arg(long)]
        data: Option<String>,
        /// Feature index in the dataset
        #[arg(long)]
        index: usize,
        /// Attribute prefix, e.g. `traffic_amount_`
        #[arg(long)]
        prefix: Option<String>,
        /// Years as `2018-2022` or `2018,2020`
        #[arg(long)]
        years: Option<String>,
    },
}

#[derive(clap::Args)]
struct PointArgs {
    /// Point dataset path or URL (defaults to the config's dataset)
    #[arg(long)]
    points: Option<String>,
    /// Categorical attribute to tally
    #[arg(long)]
    attribute: Option<String>,
    /// Declared category labels, comma separated
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let default_preset = match cli.command {
        Command::Scale { .. } => "buildings",
        Command::Series { .. } => "traffic",
        Command::Tally { .. } | Command::Isochrone { .. } => "isochrone",
    };
    let config = match &cli.config {
        Some(path) => VisualizationConfig::load(path)?,
        None => VisualizationConfig::preset(cli.preset.as_deref().unwrap_or(default_preset))?,
    };

    match cli.command {
        Command::Scale {
            data,
            attribute,
            mode,
            max,
            category,
            color_ramp,
        } => run_scale(config, data, attribute, mode, max, &category, color_ramp),
        Command::Tally { polygon, points } => {
            let text = std::fs::read_to_string(&polygon)
                .with_context(|| format!("reading {}", polygon.display()))?;
            let mut state = points_state(config, points)?;
            let ticket = state.begin_isochrone();
            run_tally(&mut state, ticket, parse_response(200, "OK", &text))
        }
        Command::Isochrone {
            lon,
            lat,
            mode,
            minutes,
            points,
        } => {
            let service = config
                .isochrone
                .clone()
                .context("this configuration has no isochrone service")?;
            let mode = mode.unwrap_or(service.travel_mode);
            let minutes = minutes.unwrap_or(service.minutes);
            let client = IsochroneClient::new(service)?;
            let mut state = points_state(config, points)?;
            let ticket = state.begin_isochrone();
            let result = client.fetch(lon, lat, mode, minutes);
            run_tally(&mut state, ticket, result)
        }
        Command::Series {
            data,
            index,
            prefix,
            years,
        } => {
            let mut config = config;
            if prefix.is_some() {
                config.series_prefix = prefix;
            }
            if let Some(years) = years {
                config.series_years = parse_years(&years)?;
            }
            let mut state = MapState::new(config);
            let source = data.unwrap_or_else(|| state.config.dataset.clone());
            state.set_dataset(load_source(&source)?);
            let mut charts = ChartDocument::new();
            state.show_feature_series(index, &mut charts)?;
            println!("{}", serde_json::to_string_pretty(&charts)?);
            Ok(())
        }
    }
}

fn parse_years(text: &str) -> Result<Vec<u16>> {
    if let Some((first, last)) = text.split_once('-') {
        let first: u16 = first.trim().parse().context("invalid first year")?;
        let last: u16 = last.trim().parse().context("invalid last year")?;
        if last < first {
            bail!("year range {first}-{last} is reversed");
        }
        return Ok((first..=last).collect());
    }
    text.split(',')
        .map(|year| {
            year.trim()
                .parse()
                .with_context(|| format!("invalid year {year:?}"))
        })
        .collect()
}

fn run_scale(
    mut config: VisualizationConfig,
    data: Option<String>,
    attribute: Option<String>,
    mode: Option<ScaleMode>,
    max: Option<f64>,
    category: &str,
    color_ramp: Option<Vec<String>>,
) -> Result<()> {
    let metric = attribute
        .or_else(|| config.metric.clone())
        .context("no metric given and the configuration has no default")?;
    if let Some(mode) = mode {
        config.metric_modes.insert(
            0,
            MetricMode {
                attribute_prefix: metric.clone(),
                mode,
            },
        );
        config.fixed_stops = None;
    }
    if let Some(max) = max {
        config.output_max = max;
    }

    let mut style = StyleDocument::new();
    if let Some(colors) = color_ramp {
        if colors.len() != 2 {
            bail!("--color-ramp expects two colours, e.g. #000000,#fe4a49");
        }
        let ramp = ColorRamp::from_hex(&colors[0], &colors[1])?;
        style = style.with_color_ramp(&config.channel, ramp, config.output_max);
    }

    let mut state = MapState::new(config);
    let source = data.unwrap_or_else(|| state.config.dataset.clone());
    state.set_dataset(load_source(&source)?);
    state.apply_controls(category, &metric, &mut style)?;

    let categories = match (&state.dataset, &state.config.category_attribute) {
        (Some(ds), Some(attribute)) => ds.categories(attribute),
        _ => Vec::new(),
    };
    let output = json!({
        "style": style,
        "categories": categories,
        "visible": state.visible_indices.len(),
        "total": state.dataset.as_ref().map_or(0, |ds| ds.len()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn points_state(mut config: VisualizationConfig, args: PointArgs) -> Result<MapState> {
    if let Some(attribute) = args.attribute {
        config.category_attribute = Some(attribute);
    }
    if let Some(labels) = args.labels {
        config.declared_labels = labels;
    }
    let mut state = MapState::new(config);
    let source = args.points.unwrap_or_else(|| state.config.dataset.clone());
    state.set_dataset(load_source(&source)?);
    Ok(state)
}

fn run_tally(
    state: &mut MapState,
    ticket: urbanviz::isochrone::RequestTicket,
    polygon: urbanviz::VizResult<geo::Geometry<f64>>,
) -> Result<()> {
    let colors = CategoryColors::new(&state.config.declared_labels);
    let legend = colors.legend_entries();
    let mut charts = ChartDocument::new().with_colors(colors);
    if let Err(e) = state.complete_isochrone(ticket, polygon, &mut charts) {
        if let Some(notice) = &state.status_message {
            eprintln!("{notice}");
        }
        return Err(e.into());
    }

    let tally = state.tally.as_ref().context("no tally produced")?;
    let output = json!({
        "charts": charts,
        "legend": legend,
        "total": tally.total(),
        "simpson_diversity": tally.simpson_diversity(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
