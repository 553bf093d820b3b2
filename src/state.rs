use geo::Geometry;

use crate::aggregate::{tally_within, CategoryTally};
use crate::config::VisualizationConfig;
use crate::data::filter::{filtered_indices, visibility_predicate, CategorySelection, Predicate};
use crate::data::model::FeatureCollection;
use crate::error::{VizError, VizResult};
use crate::isochrone::{RequestGenerations, RequestTicket};
use crate::scale::{normalize, ScaleRule};
use crate::series::{tally_series, year_series};
use crate::surface::{ChartSurface, RenderSurface};

/// Chart container receiving the isochrone category tally.
pub const TALLY_CHART: &str = "barChart1";
/// Chart container receiving a clicked feature's time series.
pub const SERIES_CHART: &str = "line-chart";

// ---------------------------------------------------------------------------
// Layer encoding
// ---------------------------------------------------------------------------

/// What a layer currently shows. Rule and filter always change together.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEncoding {
    pub metric: String,
    pub category: CategorySelection,
    pub rule: ScaleRule,
    pub filter: Predicate,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full view state of one map, independent of rendering.
pub struct MapState {
    pub config: VisualizationConfig,

    /// Loaded dataset (None until loaded).
    pub dataset: Option<FeatureCollection>,

    /// Encoding last handed to the render surface.
    pub encoding: Option<LayerEncoding>,

    /// Indices of features passing the current filter (cached).
    pub visible_indices: Vec<usize>,

    /// Tally last handed to the chart surface.
    pub tally: Option<CategoryTally>,

    /// User-visible notice (alert) from the last failed action.
    pub status_message: Option<String>,

    generations: RequestGenerations,
}

impl MapState {
    pub fn new(config: VisualizationConfig) -> Self {
        Self {
            config,
            dataset: None,
            encoding: None,
            visible_indices: Vec::new(),
            tally: None,
            status_message: None,
            generations: RequestGenerations::default(),
        }
    }

    /// Ingest a newly loaded dataset; everything is visible until the first
    /// encoding is applied.
    pub fn set_dataset(&mut self, dataset: FeatureCollection) {
        self.visible_indices = (0..dataset.len()).collect();
        self.encoding = None;
        self.tally = None;
        self.dataset = Some(dataset);
        self.status_message = None;
    }

    /// Recompute rule and filter for the selected category and metric and
    /// hand both to the surface.
    ///
    /// On failure nothing is applied: the previous encoding stays on screen
    /// and `status_message` explains why.
    pub fn apply_controls(
        &mut self,
        category: &str,
        metric: &str,
        surface: &mut dyn RenderSurface,
    ) -> VizResult<()> {
        let encoding = match self.build_encoding(category, metric) {
            Ok(encoding) => encoding,
            Err(e) => return Err(self.report(e)),
        };

        surface.set_visual_property(&self.config.layer_id, &self.config.channel, &encoding.rule);
        surface.set_visibility_predicate(&self.config.layer_id, &encoding.filter);

        if let Some(ds) = &self.dataset {
            self.visible_indices = filtered_indices(ds, &encoding.filter);
        }
        log::info!(
            "{}: {} by {metric}, {} features visible",
            self.config.layer_id,
            self.config.channel,
            self.visible_indices.len()
        );
        self.encoding = Some(encoding);
        self.status_message = None;
        Ok(())
    }

    fn build_encoding(&self, category: &str, metric: &str) -> VizResult<LayerEncoding> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| VizError::Config("no dataset loaded".into()))?;

        let rule = match self.config.fixed_rule(metric)? {
            Some(rule) => rule,
            None => normalize(
                dataset,
                metric,
                self.config.mode_for(metric),
                self.config.output_max,
            )?,
        };

        let selection = CategorySelection::from_control(category);
        let filter = match &self.config.category_attribute {
            Some(attribute) => visibility_predicate(&selection, attribute, metric),
            None => Predicate::HasNumber {
                attribute: metric.to_string(),
            },
        };

        Ok(LayerEncoding {
            metric: metric.to_string(),
            category: selection,
            rule,
            filter,
        })
    }

    /// Start an isochrone request; only the ticket issued last can update
    /// the display.
    pub fn begin_isochrone(&mut self) -> RequestTicket {
        self.generations.issue()
    }

    /// Finish an isochrone request with the service result.
    ///
    /// Returns `Ok(false)` for a superseded ticket (result discarded). On an
    /// error the previous tally stays displayed.
    pub fn complete_isochrone(
        &mut self,
        ticket: RequestTicket,
        result: VizResult<Geometry<f64>>,
        chart: &mut dyn ChartSurface,
    ) -> VizResult<bool> {
        if !self.generations.is_current(ticket) {
            log::warn!("Discarding isochrone response for a superseded request");
            return Ok(false);
        }
        let tally = match result.and_then(|polygon| self.tally_for(&polygon)) {
            Ok(tally) => tally,
            Err(e) => return Err(self.report(e)),
        };

        chart.render_series(TALLY_CHART, &tally_series(&tally));
        log::info!(
            "Isochrone contains {} places, diversity {:.3}",
            tally.total(),
            tally.simpson_diversity()
        );
        self.tally = Some(tally);
        self.status_message = None;
        Ok(true)
    }

    fn tally_for(&self, polygon: &Geometry<f64>) -> VizResult<CategoryTally> {
        let dataset = self
            .dataset
            .as_ref()
            .ok_or_else(|| VizError::Config("no dataset loaded".into()))?;
        let attribute = self
            .config
            .category_attribute
            .as_deref()
            .ok_or_else(|| VizError::Config("no category attribute configured".into()))?;
        tally_within(polygon, dataset, attribute, &self.config.declared_labels)
    }

    /// Send the time series of one feature (e.g. a clicked road) to the chart.
    pub fn show_feature_series(&mut self, index: usize, chart: &mut dyn ChartSurface) -> VizResult<()> {
        let prefix = self
            .config
            .series_prefix
            .as_deref()
            .ok_or_else(|| VizError::Config("no series configured".into()))?;
        let feature = self
            .dataset
            .as_ref()
            .and_then(|ds| ds.features.get(index))
            .ok_or_else(|| VizError::Config(format!("no feature at index {index}")))?;
        chart.render_series(
            SERIES_CHART,
            &year_series(feature, prefix, &self.config.series_years),
        );
        Ok(())
    }

    /// Log the failure and keep it as the user-visible notice.
    fn report(&mut self, error: VizError) -> VizError {
        log::error!("{error}");
        self.status_message = Some(error.to_string());
        error
    }
}
