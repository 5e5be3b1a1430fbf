// src/pipeline/air_quality.rs

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};

use super::Enricher;
use crate::error::FetchError;
use crate::fetch::openweather::{AirPollutionClient, AirReading};
use crate::merge::{merge, MergeReport, MergeTarget};
use crate::normalize::{monthly_mean, PeriodSet};
use crate::store::{Coordinates, Record};

/// Monthly mean of one pollutant for a calendar year, written to
/// `monthly_weather[Month].air_quality`. Records need both a country code
/// under `id_field` and coordinates.
pub struct AirQualityEnricher {
    client: AirPollutionClient,
    id_field: String,
    pollutant: String,
    periods: PeriodSet,
    start: i64,
    end: i64,
    target: MergeTarget,
}

impl AirQualityEnricher {
    pub fn new(
        client: AirPollutionClient,
        id_field: &str,
        year: i32,
        pollutant: &str,
    ) -> Result<Self> {
        let (start, end) =
            year_bounds(year).with_context(|| format!("year {} is out of range", year))?;
        Ok(Self {
            client,
            id_field: id_field.to_string(),
            pollutant: pollutant.to_string(),
            periods: PeriodSet::months_of(year),
            start,
            end,
            target: MergeTarget::monthly("monthly_weather", "air_quality"),
        })
    }
}

/// First and last Unix second of `year` in UTC.
pub fn year_bounds(year: i32) -> Option<(i64, i64)> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let next = NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?.and_hms_opt(0, 0, 0)?;
    Some((
        Utc.from_utc_datetime(&first).timestamp(),
        Utc.from_utc_datetime(&next).timestamp() - 1,
    ))
}

impl Enricher for AirQualityEnricher {
    type Key = Coordinates;
    type Raw = Vec<AirReading>;

    fn name(&self) -> &str {
        "air_quality"
    }

    fn key(&self, record: &Record) -> Option<Coordinates> {
        record.identifier(&self.id_field)?;
        record.coordinates()
    }

    fn fetch(&self, key: &Coordinates) -> Result<Vec<AirReading>, FetchError> {
        self.client.history(*key, self.start, self.end)
    }

    fn apply(&self, record: &mut Record, raw: Vec<AirReading>) -> MergeReport {
        let series = monthly_mean(&raw, &self.pollutant, &self.periods);
        merge(record, &series, &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::build_client;
    use crate::fetch::test_support::blocking;
    use crate::pipeline::enrich_all;
    use crate::store::RecordStore;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn bounds_cover_the_whole_utc_year() {
        assert_eq!(year_bounds(2024), Some((1_704_067_200, 1_735_689_599)));
        assert_eq!(year_bounds(1970), Some((0, 31_535_999)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writes_monthly_air_quality() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/air_pollution/history"))
            .and(query_param("start", "1704067200"))
            .and(query_param("end", "1735689599"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [
                    { "dt": 1705276800, "components": { "pm2_5": 10.0 } },
                    { "dt": 1705276800, "components": { "pm2_5": 20.0 } },
                    { "dt": 1710028800, "components": { "pm2_5": 5.0 } }
                ]
            })))
            .mount(&server)
            .await;

        let base = server.uri();
        let (store, report) = blocking(move || {
            let client =
                AirPollutionClient::new(build_client(Duration::from_secs(5)).unwrap(), &base, "k")
                    .unwrap();
            let enricher = AirQualityEnricher::new(client, "code", 2024, "pm2_5").unwrap();
            let mut store = RecordStore::new(
                serde_json::from_value(json!([
                    {
                        "name": "Seoul",
                        "code": "KR",
                        "coordinates": { "lat": 37.5665, "lng": 126.978 },
                        "monthly_weather": {
                            "January": { "temp": -2.4 },
                            "February": { "temp": 0.4 },
                            "March": { "temp": 5.7 }
                        }
                    },
                    { "name": "Atlantis", "monthly_weather": {} },
                    {
                        "name": "NoCode",
                        "coordinates": { "lat": 1, "lng": 2 },
                        "monthly_weather": { "January": {} }
                    }
                ]))
                .unwrap(),
            );
            let report = enrich_all(&mut store, &enricher);
            (store, report)
        })
        .await;

        assert_eq!(report.enriched, 1);
        assert_eq!(report.skipped, 2);
        assert!(report.failed.is_empty());
        assert_eq!(
            store.records()[0].get("monthly_weather").unwrap(),
            &json!({
                "January": { "temp": -2.4, "air_quality": 15.0 },
                "February": { "temp": 0.4, "air_quality": null },
                "March": { "temp": 5.7, "air_quality": 5.0 }
            })
        );
        assert_eq!(
            store.records()[1].get("monthly_weather").unwrap(),
            &json!({})
        );
        // coordinates alone are not enough without a country code
        assert_eq!(
            serde_json::to_value(&store.records()[2]).unwrap(),
            json!({
                "name": "NoCode",
                "coordinates": { "lat": 1, "lng": 2 },
                "monthly_weather": { "January": {} }
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_without_code_is_never_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/air_pollution/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [{ "dt": 1705276800, "components": { "pm2_5": 10.0 } }]
            })))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let (store, report) = blocking(move || {
            let client =
                AirPollutionClient::new(build_client(Duration::from_secs(5)).unwrap(), &base, "k")
                    .unwrap();
            let enricher = AirQualityEnricher::new(client, "code", 2024, "pm2_5").unwrap();
            let mut store = RecordStore::new(
                serde_json::from_value(json!([{
                    "name": "NoCode",
                    "code": "  ",
                    "coordinates": { "lat": 1, "lng": 2 },
                    "monthly_weather": { "January": {} }
                }]))
                .unwrap(),
            );
            let report = enrich_all(&mut store, &enricher);
            (store, report)
        })
        .await;

        assert_eq!(report.enriched, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            store.records()[0].get("monthly_weather").unwrap(),
            &json!({ "January": {} })
        );
        server.verify().await;
    }
}
