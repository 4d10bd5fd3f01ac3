// InfluxDB repository implementation
use crate::application::telemetry_repository::{
    DataUnavailable, TelemetryConnection, TelemetryRepository,
};
use crate::domain::record::{RawRecord, TimeRange};
use crate::infrastructure::config::{InfluxSettings, prepare_query};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct InfluxRepository {
    settings: Arc<InfluxSettings>,
}

/// One HTTP client per session; dropping it closes its pooled connections.
pub struct InfluxConnection {
    client: reqwest::Client,
    settings: Arc<InfluxSettings>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    values: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    tags: Option<HashMap<String, String>>,
}

impl InfluxRepository {
    pub fn new(mut settings: InfluxSettings) -> Self {
        settings.host = settings.host.trim_end_matches('/').to_string();
        Self {
            settings: Arc::new(settings),
        }
    }

    async fn open(&self) -> Result<InfluxConnection> {
        let client = reqwest::Client::builder()
            .timeout(QUERY_TIMEOUT)
            .build()
            .context("Failed to build InfluxDB client")?;

        let response = client
            .get(format!("{}/ping", self.settings.host))
            .header("Authorization", format!("Token {}", self.settings.token))
            .send()
            .await
            .context("Failed to reach InfluxDB")?;
        if !response.status().is_success() {
            anyhow::bail!("InfluxDB ping failed with status {}", response.status());
        }

        Ok(InfluxConnection {
            client,
            settings: self.settings.clone(),
        })
    }
}

#[async_trait]
impl TelemetryRepository for InfluxRepository {
    async fn connect(&self) -> Result<Box<dyn TelemetryConnection>, DataUnavailable> {
        let connection = self.open().await?;
        tracing::debug!("Opened InfluxDB session on {}", self.settings.host);
        Ok(Box::new(connection))
    }
}

impl InfluxConnection {
    fn build_query(&self, range: &TimeRange) -> String {
        let mut vars = HashMap::new();
        vars.insert("measurement".to_string(), self.settings.measurement.clone());
        vars.insert(
            "start".to_string(),
            range.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        vars.insert(
            "end".to_string(),
            range.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        prepare_query(&self.settings.query, &vars)
    }

    fn build_query_url(&self, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        format!(
            "{}/query?db={}&rp={}&q={}",
            self.settings.host, self.settings.database, self.settings.retention_policy, encoded_query
        )
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.settings.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        // Check for errors in the response
        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("InfluxDB query error: {}", error);
            }
        }

        Ok(data)
    }
}

#[async_trait]
impl TelemetryConnection for InfluxConnection {
    async fn records_between(
        &mut self,
        range: &TimeRange,
    ) -> Result<Vec<RawRecord>, DataUnavailable> {
        let query = self.build_query(range);
        tracing::debug!("Executing range query: {}", query);

        let response = self.execute_query(&query).await?;
        let records = records_from_response(response, &self.settings);

        tracing::debug!("Fetched {} records", records.len());
        Ok(records)
    }
}

/// Turn InfluxQL rows into records. Every numeric column that is not time,
/// entity or position becomes a sensor reading; nulls are left out.
fn records_from_response(response: InfluxQLResponse, settings: &InfluxSettings) -> Vec<RawRecord> {
    let mut records = Vec::new();
    let mut series_count = 0;

    for result in response.results {
        for series in result.series.unwrap_or_default() {
            series_count += 1;
            let tagged_entity = series
                .tags
                .as_ref()
                .and_then(|tags| tags.get(&settings.entity_column))
                .cloned();

            for row in &series.values {
                let mut record = RawRecord {
                    entity_id: tagged_entity.clone(),
                    ..Default::default()
                };

                for (column, value) in series.columns.iter().zip(row) {
                    if column == "time" {
                        record.timestamp = value.as_str().and_then(parse_time);
                    } else if *column == settings.entity_column {
                        record.entity_id = entity_value(value).or(record.entity_id.take());
                    } else if *column == settings.latitude_column {
                        record.latitude = value.as_f64();
                    } else if *column == settings.longitude_column {
                        record.longitude = value.as_f64();
                    } else if let Some(v) = value.as_f64() {
                        record.sensors.insert(column.clone(), v);
                    }
                }

                records.push(record);
            }
        }
    }

    // Grouped queries return one ascending series per tag value
    if series_count > 1 {
        records.sort_by_key(|r| r.timestamp);
    }

    records
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn entity_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::DEFAULT_INFLUX_QUERY;
    use chrono::TimeZone;

    fn settings() -> InfluxSettings {
        InfluxSettings {
            host: "http://influx:8086/".to_string(),
            token: "secret".to_string(),
            database: "fleet".to_string(),
            retention_policy: "autogen".to_string(),
            measurement: "vehicle_data".to_string(),
            entity_column: "mapped_veh_id".to_string(),
            latitude_column: "lat".to_string(),
            longitude_column: "lon".to_string(),
            query: DEFAULT_INFLUX_QUERY.to_string(),
        }
    }

    fn parse(body: &str) -> Vec<RawRecord> {
        let response: InfluxQLResponse = serde_json::from_str(body).unwrap();
        records_from_response(response, &settings())
    }

    #[test]
    fn test_rows_become_records() {
        let records = parse(
            r#"{"results":[{"series":[{"name":"vehicle_data",
                "columns":["time","lat","lon","mapped_veh_id","rs_e_inairtemp_pc1","rs_e_oilpress_pc1"],
                "values":[
                    ["2023-01-01T00:00:05Z",50.85,4.35,101,21.5,null],
                    ["2023-01-01T00:00:06Z",null,null,"102",22.0,3.1]
                ]}]}]}"#,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_id.as_deref(), Some("101"));
        assert_eq!(
            records[0].timestamp,
            Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 5).unwrap())
        );
        assert_eq!(records[0].latitude, Some(50.85));
        assert_eq!(records[0].sensors.get("rs_e_inairtemp_pc1"), Some(&21.5));
        assert!(!records[0].sensors.contains_key("rs_e_oilpress_pc1"));

        assert_eq!(records[1].entity_id.as_deref(), Some("102"));
        assert_eq!(records[1].latitude, None);
        assert_eq!(records[1].sensors.get("rs_e_oilpress_pc1"), Some(&3.1));
    }

    #[test]
    fn test_grouped_series_are_merged_by_time() {
        let records = parse(
            r#"{"results":[{"series":[
                {"name":"vehicle_data","tags":{"mapped_veh_id":"101"},
                 "columns":["time","rs_e_inairtemp_pc1"],
                 "values":[["2023-01-01T00:00:01Z",1.0],["2023-01-01T00:00:03Z",3.0]]},
                {"name":"vehicle_data","tags":{"mapped_veh_id":"102"},
                 "columns":["time","rs_e_inairtemp_pc1"],
                 "values":[["2023-01-01T00:00:02Z",2.0]]}
            ]}]}"#,
        );

        let ids: Vec<&str> = records.iter().filter_map(|r| r.entity_id.as_deref()).collect();
        assert_eq!(ids, vec!["101", "102", "101"]);
    }

    #[test]
    fn test_empty_result_has_no_records() {
        assert!(parse(r#"{"results":[{}]}"#).is_empty());
    }

    #[test]
    fn test_query_url_covers_window() {
        let repo = InfluxRepository::new(settings());
        let connection = InfluxConnection {
            client: reqwest::Client::new(),
            settings: repo.settings.clone(),
        };
        let range = TimeRange {
            start: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2023, 1, 30, 23, 59, 59).unwrap(),
        };

        let query = connection.build_query(&range);
        assert!(query.contains("FROM \"vehicle_data\""));
        assert!(query.contains("time >= '2023-01-01T00:00:00Z'"));
        assert!(query.contains("time <= '2023-01-30T23:59:59Z'"));

        let url = connection.build_query_url(&query);
        assert!(url.starts_with("http://influx:8086/query?db=fleet&rp=autogen&q=SELECT"));
    }
}
