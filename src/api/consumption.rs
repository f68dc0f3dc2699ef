use chrono::{Datelike, Days, Local, Months, NaiveDate};
use polars::prelude::*;

use crate::error::LinkyError;
use crate::SessionClient;

use super::{align, DataRequest, Granularity, GraphPayload, Measurement, DATA_ENDPOINT};

/// Consumption history queries, one per granularity.
///
/// Borrows the authenticated session; every call validates its arguments,
/// fetches one graph payload and aligns it onto calendar labels.
pub struct ConsumptionHistory<'a> {
    client: &'a dyn SessionClient,
}

/// Ordered label → measurement mapping produced by one query.
///
/// Labels are granularity-specific: `YYYY`, `MM/YYYY`, `DD/MM/YYYY` or
/// `HH:MM`. Order follows the calendar.
#[derive(Debug, Default)]
pub struct ConsumptionSeries {
    points: Vec<(String, Measurement)>,
}

impl ConsumptionSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&Measurement> {
        self.points
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, m)| m)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Measurement)> {
        self.points.iter()
    }

    pub fn as_polars_df(&self) -> Result<DataFrame, anyhow::Error> {
        let mut labels: Vec<String> = vec![];
        let mut completed: Vec<bool> = vec![];
        let mut values: Vec<Option<f64>> = vec![];

        for (label, measurement) in &self.points {
            labels.push(label.clone());
            completed.push(measurement.completed);
            values.push(measurement.value);
        }

        let labels_series = Series::new("label".into(), labels);
        let completed_series = Series::new("completed".into(), completed);
        let values_series = Series::new("value".into(), values);

        let df = DataFrame::new(vec![labels_series, completed_series, values_series])?;

        Ok(df)
    }
}

impl From<Vec<(String, Measurement)>> for ConsumptionSeries {
    fn from(points: Vec<(String, Measurement)>) -> Self {
        ConsumptionSeries { points }
    }
}

impl IntoIterator for ConsumptionSeries {
    type Item = (String, Measurement);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a> ConsumptionHistory<'a> {
    pub fn new(client: &'a dyn SessionClient) -> Self {
        Self { client }
    }

    /// Yearly consumption over the portal's own window, ending at the
    /// current year.
    pub fn per_year(&self) -> Result<ConsumptionSeries, LinkyError> {
        self.per_year_at(Local::now().date_naive())
    }

    /// Monthly consumption for one calendar year.
    pub fn per_month(&self, year: i32) -> Result<ConsumptionSeries, LinkyError> {
        self.per_month_at(year, Local::now().date_naive())
    }

    /// Daily consumption for one calendar month.
    pub fn per_day(&self, month: u32, year: i32) -> Result<ConsumptionSeries, LinkyError> {
        self.per_day_at(month, year, Local::now().date_naive())
    }

    /// Half-hourly consumption for one day. The portal publishes hourly
    /// data with a one-day lag, so the latest queryable day is yesterday.
    pub fn per_hour(&self, day: u32, month: u32, year: i32) -> Result<ConsumptionSeries, LinkyError> {
        self.per_hour_at(day, month, year, Local::now().date_naive())
    }

    fn per_year_at(&self, today: NaiveDate) -> Result<ConsumptionSeries, LinkyError> {
        let payload = self.fetch(Granularity::Annual, None)?;
        Ok(align::per_year(&payload.graphe, today).into())
    }

    fn per_month_at(&self, year: i32, today: NaiveDate) -> Result<ConsumptionSeries, LinkyError> {
        if year > today.year() {
            return Err(LinkyError::Validation(format!(
                "the year {} is invalid, it must be less than or equal to {}",
                year,
                today.year()
            )));
        }
        let start = ymd(year, 1, 1)?;
        let end = ymd(year, 12, 31)?;

        let payload = self.fetch(Granularity::Monthly, Some((start, end)))?;
        Ok(align::per_month(&payload.graphe, start, end, today).into())
    }

    fn per_day_at(
        &self,
        month: u32,
        year: i32,
        today: NaiveDate,
    ) -> Result<ConsumptionSeries, LinkyError> {
        // Same validity probe the portal's original clients used: day 30 of
        // the candidate month. February is therefore never queryable by
        // day.
        if NaiveDate::from_ymd_opt(year, month, 30).is_none() {
            return Err(LinkyError::Validation(
                "the month or year filled in is invalid".to_string(),
            ));
        }
        if year > today.year() {
            return Err(LinkyError::Validation(format!(
                "the year {} is invalid, it must be less than or equal to {}",
                year,
                today.year()
            )));
        }
        let start = ymd(year, month, 1)?;
        if start > today {
            return Err(LinkyError::Validation(format!(
                "the month {:02}/{} is in the future",
                month, year
            )));
        }
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| {
                LinkyError::Validation("the month or year filled in is invalid".to_string())
            })?;

        let payload = self.fetch(Granularity::Daily, Some((start, end)))?;
        Ok(align::per_day(&payload.graphe, start).into())
    }

    fn per_hour_at(
        &self,
        day: u32,
        month: u32,
        year: i32,
        today: NaiveDate,
    ) -> Result<ConsumptionSeries, LinkyError> {
        let start = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            LinkyError::Validation("the date filled in is invalid".to_string())
        })?;
        if year > today.year() {
            return Err(LinkyError::Validation(format!(
                "the year {} is invalid, it must be less than or equal to {}",
                year,
                today.year()
            )));
        }
        let yesterday = today.pred_opt().ok_or_else(|| {
            LinkyError::Validation("the date filled in is invalid".to_string())
        })?;
        if start > yesterday {
            return Err(LinkyError::Validation(format!(
                "hourly data for {} is not available yet, it lags one day behind",
                start.format("%d/%m/%Y")
            )));
        }
        let end = start.checked_add_days(Days::new(1)).ok_or_else(|| {
            LinkyError::Validation("the date filled in is invalid".to_string())
        })?;

        let payload = self.fetch(Granularity::Hourly, Some((start, end)))?;
        Ok(align::per_hour(&payload.graphe).into())
    }

    fn fetch(
        &self,
        kind: Granularity,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<GraphPayload, LinkyError> {
        let request = DataRequest { kind, range };
        let body = self
            .client
            .send(DATA_ENDPOINT, &request.query_params(), &request.form_fields())?;
        let payload: GraphPayload = serde_json::from_str(&body)?;
        Ok(payload)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, LinkyError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        LinkyError::Validation(format!("{:04}-{:02}-{:02} is not a valid date", year, month, day))
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use serde_json::json;

    /// Canned transport: hands out queued bodies and records every request.
    #[derive(Default)]
    struct FakeSession {
        responses: RefCell<Vec<String>>,
        requests: RefCell<Vec<(String, Vec<(String, String)>, Vec<(String, String)>)>>,
    }

    impl FakeSession {
        fn with_graph(decalage: i64, values: &[f64]) -> Self {
            let data: Vec<_> = values
                .iter()
                .enumerate()
                .map(|(i, v)| json!({"ordre": i, "valeur": v}))
                .collect();
            let body = json!({"graphe": {"decalage": decalage, "data": data}}).to_string();
            let fake = FakeSession::default();
            fake.responses.borrow_mut().push(body);
            fake
        }

        fn request_count(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl SessionClient for FakeSession {
        fn send(
            &self,
            path: &str,
            query: &[(String, String)],
            form: &[(String, String)],
        ) -> Result<String, LinkyError> {
            self.requests
                .borrow_mut()
                .push((path.to_string(), query.to_vec(), form.to_vec()));
            self.responses
                .borrow_mut()
                .pop()
                .ok_or_else(|| LinkyError::Transport("no canned response".to_string()))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn future_year_is_rejected_before_any_network_call() {
        let fake = FakeSession::default();
        let history = ConsumptionHistory::new(&fake);

        let err = history
            .per_month_at(2999, date(2019, 6, 15))
            .unwrap_err();
        assert!(matches!(err, LinkyError::Validation(_)));
        assert_eq!(fake.request_count(), 0);
    }

    #[test]
    fn february_is_rejected_by_the_day_30_probe() {
        let fake = FakeSession::default();
        let history = ConsumptionHistory::new(&fake);

        let err = history.per_day_at(2, 2019, date(2019, 6, 15)).unwrap_err();
        assert!(matches!(err, LinkyError::Validation(_)));
        assert_eq!(fake.request_count(), 0);
    }

    #[test]
    fn future_month_is_rejected_for_daily_queries() {
        let fake = FakeSession::default();
        let history = ConsumptionHistory::new(&fake);

        let err = history.per_day_at(8, 2019, date(2019, 6, 15)).unwrap_err();
        assert!(matches!(err, LinkyError::Validation(_)));
        assert_eq!(fake.request_count(), 0);
    }

    #[test]
    fn hourly_queries_lag_one_day_behind() {
        let fake = FakeSession::default();
        let history = ConsumptionHistory::new(&fake);
        let today = date(2019, 6, 15);

        // Today and tomorrow are both too recent; yesterday is fine to ask.
        for day in [15, 16] {
            let err = history.per_hour_at(day, 6, 2019, today).unwrap_err();
            assert!(matches!(err, LinkyError::Validation(_)));
        }
        assert_eq!(fake.request_count(), 0);

        let err = history.per_hour_at(31, 6, 2019, today).unwrap_err();
        assert!(matches!(err, LinkyError::Validation(_)));
    }

    #[test]
    fn monthly_query_sends_full_year_bounds_and_aligns_labels() {
        // 2019 queried on 2019-06-15: one padding slot then ordre 1..=12.
        let values: Vec<f64> = (0..13).map(|i| if i <= 6 { i as f64 } else { -2.0 }).collect();
        let fake = FakeSession::with_graph(1, &values);
        let history = ConsumptionHistory::new(&fake);

        let series = history.per_month_at(2019, date(2019, 6, 15)).unwrap();

        let requests = fake.requests.borrow();
        let (path, query, form) = &requests[0];
        assert_eq!(path, "/suivi-de-consommation");
        assert!(query.contains(&("p_p_resource_id".to_string(), "urlCdcMois".to_string())));
        assert!(form.iter().any(|(_, v)| v == "01/01/2019"));
        assert!(form.iter().any(|(_, v)| v == "31/12/2019"));

        assert_eq!(series.len(), 6);
        assert!(series.get("05/2019").unwrap().completed);
        assert!(!series.get("06/2019").unwrap().completed);
        assert!(series.get("07/2019").is_none());
    }

    #[test]
    fn annual_query_sends_no_date_fields() {
        let fake = FakeSession::with_graph(0, &[100.0, 200.0, -1.0, 400.0, 500.0]);
        let history = ConsumptionHistory::new(&fake);

        let series = history.per_year_at(date(2019, 6, 15)).unwrap();

        let requests = fake.requests.borrow();
        let (_, query, form) = &requests[0];
        assert!(query.contains(&("p_p_resource_id".to_string(), "urlCdcAn".to_string())));
        assert!(form.is_empty());

        let labels: Vec<_> = series.iter().map(|(l, _)| l.clone()).collect();
        assert_eq!(labels, vec!["2015", "2016", "2017", "2018", "2019"]);
        assert_eq!(series.get("2017").unwrap().value, None);
    }

    #[test]
    fn daily_query_covers_first_to_last_day_of_month() {
        let fake = FakeSession::with_graph(0, &vec![1.5; 31]);
        let history = ConsumptionHistory::new(&fake);

        let series = history.per_day_at(8, 2019, date(2019, 9, 15)).unwrap();

        let requests = fake.requests.borrow();
        let (_, _, form) = &requests[0];
        assert!(form.iter().any(|(_, v)| v == "01/08/2019"));
        assert!(form.iter().any(|(_, v)| v == "31/08/2019"));

        // The 31st never survives the raw index cap.
        assert_eq!(series.len(), 30);
        assert!(series.get("31/08/2019").is_none());
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let fake = FakeSession::default();
        fake.responses
            .borrow_mut()
            .push("<html>session expired</html>".to_string());
        let history = ConsumptionHistory::new(&fake);

        let err = history.per_year_at(date(2019, 6, 15)).unwrap_err();
        assert!(matches!(err, LinkyError::Decode(_)));
    }

    #[test]
    fn payload_missing_the_graph_is_a_decode_error() {
        let fake = FakeSession::default();
        fake.responses
            .borrow_mut()
            .push(json!({"status": "ok"}).to_string());
        let history = ConsumptionHistory::new(&fake);

        let err = history.per_year_at(date(2019, 6, 15)).unwrap_err();
        assert!(matches!(err, LinkyError::Decode(_)));
    }

    #[test]
    fn series_converts_to_a_polars_dataframe() {
        let fake = FakeSession::with_graph(0, &[0.5, -1.0]);
        let history = ConsumptionHistory::new(&fake);

        let series = history.per_hour_at(14, 6, 2019, date(2019, 6, 15)).unwrap();
        let df = series.as_polars_df().unwrap();

        assert_eq!(df.shape(), (2, 3));
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["label", "completed", "value"]);
    }
}
