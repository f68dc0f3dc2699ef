use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;

pub mod align;
pub mod consumption;

/// Portlet behind the consumption graphs.
const PORTLET_ID: &str = "lincspartdisplaycdc_WAR_lincspartcdcportlet";

/// Resource path answering the data queries, relative to the data base URL.
pub(crate) const DATA_ENDPOINT: &str = "/suivi-de-consommation";

/// Unit the portal reports every measurement in.
pub const ENERGY_METRIC: &str = "kW";

pub trait FormatToPortalFmt {
    fn to_portal_format(&self) -> String;
}

impl FormatToPortalFmt for NaiveDate {
    fn to_portal_format(&self) -> String {
        // The portal only understands French day-first dates
        self.format("%d/%m/%Y").to_string()
    }
}

/// The four time resolutions the portal can serve.
///
/// Each maps to a fixed portlet resource token and a fixed raw-array shape:
/// 48 half-hour slots per day, up to 31 day slots per month, 12 month slots
/// per year, and one slot per year of contract history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hourly,
    Daily,
    Monthly,
    Annual,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Granularity::Hourly => "urlCdcHeure",
            Granularity::Daily => "urlCdcJour",
            Granularity::Monthly => "urlCdcMois",
            Granularity::Annual => "urlCdcAn",
        };
        write!(f, "{}", token)
    }
}

/// One data query to the portlet endpoint.
///
/// Annual requests never carry a date range; the portal computes its own
/// window for those. All other granularities send both bounds or none.
#[derive(Debug)]
pub(crate) struct DataRequest {
    pub kind: Granularity,
    pub range: Option<(NaiveDate, NaiveDate)>,
}

impl DataRequest {
    /// Fixed query parameters the portlet requires verbatim; anything else
    /// gets an empty answer out of the Liferay machinery.
    pub fn query_params(&self) -> Vec<(String, String)> {
        vec![
            ("p_p_id".to_string(), PORTLET_ID.to_string()),
            ("p_p_lifecycle".to_string(), "2".to_string()),
            ("p_p_mode".to_string(), "view".to_string()),
            ("p_p_resource_id".to_string(), self.kind.to_string()),
            ("p_p_cacheability".to_string(), "cacheLevelPage".to_string()),
            ("p_p_col_id".to_string(), "column-1".to_string()),
            ("p_p_col_count".to_string(), "2".to_string()),
        ]
    }

    pub fn form_fields(&self) -> Vec<(String, String)> {
        match self.range {
            Some((start, end)) if self.kind != Granularity::Annual => vec![
                (
                    format!("_{}_dateDebut", PORTLET_ID),
                    start.to_portal_format(),
                ),
                (format!("_{}_dateFin", PORTLET_ID), end.to_portal_format()),
            ],
            _ => vec![],
        }
    }
}

/// Raw payload of a data query: `{"graphe": {"decalage": .., "data": [..]}}`.
#[derive(Deserialize, Debug)]
pub(crate) struct GraphPayload {
    pub graphe: Graph,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Graph {
    /// Number of leading slots in `data` that are padding, not calendar
    /// positions.
    pub decalage: i64,
    pub data: Vec<RawPoint>,
}

/// One slot of the raw array, straight off the wire.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawPoint {
    pub ordre: i64,
    pub valeur: f64,
}

/// `valeur` for a slot the provider never recorded.
pub(crate) const VALUE_MISSING: f64 = -1.0;
/// `valeur` for a slot that is not yet available.
pub(crate) const VALUE_NOT_YET_AVAILABLE: f64 = -2.0;

impl RawPoint {
    pub fn is_sentinel(&self) -> bool {
        self.valeur == VALUE_MISSING || self.valeur == VALUE_NOT_YET_AVAILABLE
    }

    pub fn is_recorded(&self) -> bool {
        self.valeur != VALUE_MISSING
    }
}

/// One normalized consumption point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Whether the calendar slot lies fully in the past. A completed slot
    /// can still carry no value if the meter never reported one.
    pub completed: bool,
    pub metric: &'static str,
    pub value: Option<f64>,
}
