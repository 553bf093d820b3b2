//! Ordered labeled values handed to the chart surface.

use serde::Serialize;

use crate::aggregate::CategoryTally;
use crate::data::model::Feature;

/// One bar / point of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValue {
    pub label: String,
    /// `None` when the feature has no value for this label (gap in a line).
    pub value: Option<f64>,
}

impl LabeledValue {
    pub fn new(label: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Values of `<prefix><year>` for each year, in the given order.
///
/// e.g. `traffic_amount_2018 … traffic_amount_2022` of a clicked road.
pub fn year_series(feature: &Feature, prefix: &str, years: &[u16]) -> Vec<LabeledValue> {
    years
        .iter()
        .map(|year| {
            let attribute = format!("{prefix}{year}");
            LabeledValue::new(year.to_string(), feature.number(&attribute))
        })
        .collect()
}

/// Bar series of a tally, in declared label order (not count order).
pub fn tally_series(tally: &CategoryTally) -> Vec<LabeledValue> {
    tally
        .entries()
        .iter()
        .map(|(label, count)| LabeledValue::new(label.clone(), Some(*count as f64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_series_in_year_order_with_gaps() {
        let road = Feature::new(None)
            .with("traffic_amount_2018", 12000.0)
            .with("traffic_amount_2019", 12500.0)
            .with("traffic_amount_2021", 11000.0);
        let series = year_series(&road, "traffic_amount_", &[2018, 2019, 2020, 2021]);
        assert_eq!(
            series,
            vec![
                LabeledValue::new("2018", Some(12000.0)),
                LabeledValue::new("2019", Some(12500.0)),
                LabeledValue::new("2020", None),
                LabeledValue::new("2021", Some(11000.0)),
            ]
        );
    }

    #[test]
    fn test_tally_series_keeps_declared_order() {
        let tally = CategoryTally::zeroed(&["social", "necessary"]);
        let series = tally_series(&tally);
        assert_eq!(series[0], LabeledValue::new("social", Some(0.0)));
        assert_eq!(series[1].label, "necessary");
    }
}
