//! CVE connector (NVD-style vulnerabilities API).
//!
//! Extraction issues a single bounded publication-window request (last
//! `window_days` days) with a retry-once rate-limit policy. Transformation
//! selects the English description, the first CVSS v3.1 metric, and the
//! English-locale CWE identifiers, caps stored reference URLs at ten, and
//! derives a severity level and a recency flag.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::config::NvdConfig;
use crate::connector::Connector;
use crate::extract::{fetch_window_once, ApiTransport};
use crate::models::{CanonicalDocument, EtlMetadata, TransformOutcome, SCHEMA_VERSION};
use crate::quality;

pub const SOURCE: &str = "nvd";

/// At most this many reference URLs are stored per CVE; the full count is
/// retained separately.
const MAX_STORED_REFERENCES: usize = 10;

/// Severity-to-integer mapping with a fixed total order:
/// none/unknown=0 < LOW=1 < MEDIUM=2 < HIGH=3 < CRITICAL=4.
///
/// Matching is case-sensitive against the canonical upstream labels; any
/// other string, including other casings, maps to 0.
pub fn severity_level(severity: Option<&str>) -> i64 {
    match severity {
        Some("LOW") => 1,
        Some("MEDIUM") => 2,
        Some("HIGH") => 3,
        Some("CRITICAL") => 4,
        _ => 0,
    }
}

/// Whether a published timestamp falls within the recency window. Absent or
/// malformed timestamps are never recent and never fail.
pub fn is_recent(published: Option<&str>, now: DateTime<Utc>, window_days: i64) -> bool {
    let Some(raw) = published else {
        return false;
    };
    let Some(ts) = parse_nvd_timestamp(raw) else {
        return false;
    };
    now.signed_duration_since(ts) <= ChronoDuration::days(window_days)
}

/// NVD timestamps come without a zone (`2024-01-01T00:00:00.000`); full
/// RFC 3339 is accepted as well.
fn parse_nvd_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub struct NvdConnector {
    config: NvdConfig,
}

// Typed view of the NVD record shape, decoded once at the boundary.

#[derive(Debug, Deserialize)]
struct CveEnvelope {
    cve: Option<CveItem>,
}

#[derive(Debug, Deserialize)]
struct CveItem {
    id: Option<String>,
    #[serde(default)]
    descriptions: Vec<LangText>,
    metrics: Option<CveMetrics>,
    #[serde(default)]
    references: Vec<CveReference>,
    #[serde(default)]
    weaknesses: Vec<CveWeakness>,
    published: Option<String>,
    #[serde(rename = "lastModified")]
    last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LangText {
    lang: Option<String>,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CveMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    cvss_metric_v31: Vec<CvssMetric>,
}

#[derive(Debug, Deserialize)]
struct CvssMetric {
    #[serde(rename = "cvssData")]
    cvss_data: Option<CvssData>,
}

#[derive(Debug, Deserialize)]
struct CvssData {
    #[serde(rename = "baseScore")]
    base_score: Option<f64>,
    #[serde(rename = "baseSeverity")]
    base_severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CveReference {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CveWeakness {
    #[serde(default)]
    description: Vec<LangText>,
}

fn first_english(texts: &[LangText]) -> Option<&str> {
    texts
        .iter()
        .find(|t| t.lang.as_deref() == Some("en"))
        .and_then(|t| t.value.as_deref())
}

impl NvdConnector {
    pub fn new(config: NvdConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for NvdConnector {
    fn name(&self) -> &str {
        SOURCE
    }

    fn description(&self) -> &str {
        "CVEs from an NVD-style vulnerabilities API"
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn extract(&self, transport: &dyn ApiTransport) -> Vec<Value> {
        let now = Utc::now();
        let start = now - ChronoDuration::days(self.config.window_days);
        let format = "%Y-%m-%dT%H:%M:%S%.3f";

        let params = [
            ("pubStartDate", start.format(format).to_string()),
            ("pubEndDate", now.format(format).to_string()),
            (
                "resultsPerPage",
                self.config.results_per_page.to_string(),
            ),
        ];

        let Some(body) = fetch_window_once(
            transport,
            "",
            &params,
            Duration::from_millis(self.config.rate_limit_delay_ms),
        )
        .await
        else {
            return Vec::new();
        };

        match body.get("vulnerabilities") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    fn transform(&self, raw: &Value, ingested_at: DateTime<Utc>) -> TransformOutcome {
        let envelope: CveEnvelope = match serde_json::from_value(raw.clone()) {
            Ok(envelope) => envelope,
            Err(e) => {
                return TransformOutcome::Skip {
                    reason: format!("record is not a vulnerability object: {}", e),
                }
            }
        };
        let Some(cve) = envelope.cve else {
            return TransformOutcome::Skip {
                reason: "record has no 'cve' object".to_string(),
            };
        };

        let description = first_english(&cve.descriptions).unwrap_or("").to_string();

        let first_metric = cve
            .metrics
            .as_ref()
            .and_then(|m| m.cvss_metric_v31.first())
            .and_then(|m| m.cvss_data.as_ref());
        let cvss_score = first_metric.and_then(|d| d.base_score);
        let cvss_severity = first_metric.and_then(|d| d.base_severity.clone());
        let level = severity_level(cvss_severity.as_deref());

        let cwe_ids: Vec<String> = cve
            .weaknesses
            .iter()
            .filter_map(|w| first_english(&w.description))
            .map(|s| s.to_string())
            .collect();

        let all_urls: Vec<&str> = cve
            .references
            .iter()
            .filter_map(|r| r.url.as_deref())
            .collect();
        let reference_count = all_urls.len();
        let reference_urls: Vec<&str> = all_urls
            .into_iter()
            .take(MAX_STORED_REFERENCES)
            .collect();

        let recent = is_recent(cve.published.as_deref(), ingested_at, self.config.window_days);

        let has_metrics = cve
            .metrics
            .as_ref()
            .is_some_and(|m| !m.cvss_metric_v31.is_empty());
        let quality_score = quality::score(&[
            cve.id.as_deref().is_some_and(|id| !id.is_empty()),
            !description.is_empty(),
            has_metrics,
            !cve.references.is_empty(),
        ]);

        let natural_id = match cve.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => format!("unknown-{}", Uuid::new_v4()),
        };

        let fields = serde_json::json!({
            "cve_id": cve.id,
            "description": description,
            "cvss_score": cvss_score,
            "cvss_severity": cvss_severity,
            "severity_level": level,
            "has_cvss_score": cvss_score.is_some(),
            "cwe_ids": cwe_ids,
            "reference_urls": reference_urls,
            "reference_count": reference_count,
            "published": cve.published,
            "last_modified": cve.last_modified,
            "is_recent": recent,
        });

        TransformOutcome::Document(Box::new(CanonicalDocument {
            natural_id: natural_id.clone(),
            source: SOURCE.to_string(),
            group_key: Some(
                cvss_severity
                    .as_deref()
                    .unwrap_or("UNKNOWN")
                    .to_ascii_uppercase(),
            ),
            metric: cvss_score,
            fields,
            metadata: EtlMetadata {
                ingested_at,
                source: SOURCE.to_string(),
                schema_version: SCHEMA_VERSION.to_string(),
                record_id: natural_id,
                quality_score,
            },
            original: raw.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> NvdConnector {
        NvdConnector::new(NvdConfig::default())
    }

    fn transform(raw: Value) -> CanonicalDocument {
        match connector().transform(&raw, Utc::now()) {
            TransformOutcome::Document(doc) => *doc,
            TransformOutcome::Skip { reason } => panic!("unexpected skip: {}", reason),
        }
    }

    fn full_cve() -> Value {
        serde_json::json!({
            "cve": {
                "id": "CVE-2024-0001",
                "descriptions": [
                    { "lang": "es", "value": "una vulnerabilidad" },
                    { "lang": "en", "value": "A heap overflow." }
                ],
                "metrics": {
                    "cvssMetricV31": [
                        { "cvssData": { "baseScore": 9.8, "baseSeverity": "CRITICAL" } },
                        { "cvssData": { "baseScore": 7.5, "baseSeverity": "HIGH" } }
                    ]
                },
                "references": [
                    { "url": "https://example.com/advisory" }
                ],
                "weaknesses": [
                    { "description": [ { "lang": "en", "value": "CWE-787" } ] },
                    { "description": [ { "lang": "es", "value": "CWE-000" } ] }
                ],
                "published": "2024-01-01T00:00:00.000",
                "lastModified": "2024-01-02T00:00:00.000"
            }
        })
    }

    #[test]
    fn test_full_cve() {
        let doc = transform(full_cve());
        assert_eq!(doc.natural_id, "CVE-2024-0001");
        assert_eq!(doc.fields["description"], "A heap overflow.");
        assert_eq!(doc.fields["cvss_score"], 9.8);
        assert_eq!(doc.fields["cvss_severity"], "CRITICAL");
        assert_eq!(doc.fields["severity_level"], 4);
        assert_eq!(doc.fields["has_cvss_score"], true);
        assert_eq!(doc.fields["cwe_ids"], serde_json::json!(["CWE-787"]));
        assert_eq!(doc.metadata.quality_score, 1.0);
        assert_eq!(doc.group_key.as_deref(), Some("CRITICAL"));
        assert_eq!(doc.metric, Some(9.8));
    }

    #[test]
    fn test_cve_without_description_or_metrics() {
        // id and references present, nothing else: score is exactly 0.5
        let doc = transform(serde_json::json!({
            "cve": {
                "id": "CVE-2024-0002",
                "descriptions": [ { "lang": "fr", "value": "une faille" } ],
                "references": [ { "url": "https://example.com/a" } ]
            }
        }));
        assert_eq!(doc.fields["description"], "");
        assert_eq!(doc.fields["cvss_score"], Value::Null);
        assert_eq!(doc.fields["has_cvss_score"], false);
        assert_eq!(doc.fields["severity_level"], 0);
        assert_eq!(doc.metadata.quality_score, 0.5);
        assert_eq!(doc.group_key.as_deref(), Some("UNKNOWN"));
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity_level(Some("LOW")), 1);
        assert_eq!(severity_level(Some("MEDIUM")), 2);
        assert_eq!(severity_level(Some("HIGH")), 3);
        assert_eq!(severity_level(Some("CRITICAL")), 4);
        assert_eq!(severity_level(Some("low")), 0);
        assert_eq!(severity_level(Some("Critical")), 0);
        assert_eq!(severity_level(Some("NONE")), 0);
        assert_eq!(severity_level(Some("garbage")), 0);
        assert_eq!(severity_level(None), 0);
        // strict increasing order
        let levels = ["LOW", "MEDIUM", "HIGH", "CRITICAL"];
        for pair in levels.windows(2) {
            assert!(severity_level(Some(pair[0])) < severity_level(Some(pair[1])));
        }
    }

    #[test]
    fn test_recency_window_boundaries() {
        let now = Utc::now();
        let fmt = "%Y-%m-%dT%H:%M:%S%.3f";
        let days_29 = (now - ChronoDuration::days(29)).format(fmt).to_string();
        let days_31 = (now - ChronoDuration::days(31)).format(fmt).to_string();

        assert!(is_recent(Some(&days_29), now, 30));
        assert!(!is_recent(Some(&days_31), now, 30));
        assert!(!is_recent(None, now, 30));
        assert!(!is_recent(Some("not-a-timestamp"), now, 30));
        assert!(!is_recent(Some(""), now, 30));
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_nvd_timestamp("2024-01-01T00:00:00.000").is_some());
        assert!(parse_nvd_timestamp("2024-01-01T00:00:00").is_some());
        assert!(parse_nvd_timestamp("2024-01-01T00:00:00Z").is_some());
        assert!(parse_nvd_timestamp("2024-01-01T00:00:00+02:00").is_some());
        assert!(parse_nvd_timestamp("01/01/2024").is_none());
    }

    #[test]
    fn test_reference_urls_capped_at_ten() {
        let refs: Vec<Value> = (0..25)
            .map(|i| serde_json::json!({ "url": format!("https://example.com/{}", i) }))
            .collect();
        let doc = transform(serde_json::json!({
            "cve": { "id": "CVE-2024-0003", "references": refs }
        }));
        assert_eq!(doc.fields["reference_urls"].as_array().unwrap().len(), 10);
        assert_eq!(doc.fields["reference_count"], 25);
    }

    #[test]
    fn test_missing_cve_object_is_skipped() {
        let outcome = connector().transform(&serde_json::json!({}), Utc::now());
        assert!(matches!(outcome, TransformOutcome::Skip { .. }));
    }

    #[test]
    fn test_missing_id_gets_synthetic_unique_key() {
        let doc = transform(serde_json::json!({ "cve": { "id": "" } }));
        assert!(doc.natural_id.starts_with("unknown-"));
    }
}
