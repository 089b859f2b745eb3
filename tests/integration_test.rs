use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::tempdir;

use dinesafe::apis::ckan::CkanClient;
use dinesafe::app::ports::{HttpClientPort, HttpGetResult};
use dinesafe::constants::COLUMNS;
use dinesafe::error::DineSafeError;
use dinesafe::pipeline::processing::filter::DateRange;
use dinesafe::pipeline::{aggregate_by_location, filter, normalize, InspectionFilter, Pipeline};
use dinesafe::storage::{CachedSnapshotLoader, SnapshotStore};
use dinesafe::types::RawTable;

const BASE: &str = "http://portal.test";

/// Canned CKAN portal serving one package split across two resources.
struct FakePortal {
    responses: HashMap<String, (u16, String)>,
}

#[async_trait]
impl HttpClientPort for FakePortal {
    async fn get(&self, url: &str) -> dinesafe::error::Result<HttpGetResult> {
        let (status, body) = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(HttpGetResult {
            status,
            bytes: body.into_bytes(),
            content_type: "text/csv".to_string(),
        })
    }
}

fn csv(rows: &[&str]) -> String {
    let mut out = COLUMNS.join(",");
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out
}

const CURRENT: &[&str] = &[
    "1,100,9001,PIZZA PLACE,Restaurant,1 KING ST W,Pass,O1,Improper storage,2023-01-05,S - Significant,Notice to Comply,,\"$1,250.00\",43.6481,-79.3781,u1",
    "2,100,9002,PIZZA PLACE,Restaurant,1 KING ST W,Pass,O1,Dirty surfaces,2023-01-20,M - Minor,Notice to Comply,,,43.6481,-79.3781,u2",
    "3,200,9003,NOODLE BAR,Restaurant,2 QUEEN ST E,Conditional Pass,2,Pests,2023-02-14,S - Significant,Ticket,Conviction,$300.00,43.6525,-79.3710,u3",
];

const ARCHIVE: &[&str] = &[
    "4,300,9004,CORNER STORE,Food Store (Convenience / Variety),3 BAY ST,Pass,1,,2022-12-30,,,,,,,u4",
    "5,200,9005,NOODLE BAR,Restaurant,2 QUEEN ST E,Conditional Pass,2,Handwashing,2023-01-31,S - Significant,Notice to Comply,,,43.6525,-79.3710,u5",
];

fn portal() -> Arc<FakePortal> {
    let package = serde_json::json!({
        "success": true,
        "result": {
            "name": "dinesafe",
            "resources": [
                { "id": "current", "name": "Dinesafe", "format": "CSV", "datastore_active": true },
                { "id": "notes", "name": "Readme", "format": "TXT", "datastore_active": false },
                { "id": "archive", "name": "Dinesafe archive", "format": "CSV", "datastore_active": true }
            ]
        }
    });

    let mut responses = HashMap::new();
    responses.insert(
        format!("{BASE}/api/3/action/package_show?id=dinesafe"),
        (200, package.to_string()),
    );
    responses.insert(format!("{BASE}/datastore/dump/current"), (200, csv(CURRENT)));
    responses.insert(format!("{BASE}/datastore/dump/archive"), (200, csv(ARCHIVE)));
    Arc::new(FakePortal { responses })
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_refresh_then_query_end_to_end() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = SnapshotStore::new(temp_dir.path().join("data"));
    let client = CkanClient::new(BASE, portal());

    let result = Pipeline::refresh(&client, &store, "dinesafe").await?;
    assert_eq!(result.rows, 5);
    assert_eq!(result.metadata.shape, (5, COLUMNS.len()));
    assert_eq!(result.metadata.unique_establishments, 3);
    assert_eq!(result.metadata.date_range.min, Some(date(2022, 12, 30)));
    assert_eq!(result.metadata.date_range.max, Some(date(2023, 2, 14)));

    // Snapshot round trip matches a direct normalize of the same download
    let raw = client.fetch_package("dinesafe").await?;
    let expected = normalize(&raw)?;
    let loaded = store.load_latest()?;
    assert_eq!(loaded, expected);

    let first = &loaded.records()[0];
    assert_eq!(first.min_inspections_per_year, Some(1));
    assert_eq!(first.amount_fined, Some(1250.0));
    assert_eq!(loaded.records()[1].amount_fined, None);

    // Significant inspections in January 2023
    let criteria = InspectionFilter::new()
        .severities(["S - Significant"])
        .date_range(DateRange::new(date(2023, 1, 1), date(2023, 1, 31)));
    let january = filter(&loaded, &criteria);
    let ids: Vec<i64> = january.iter().map(|r| r.record_id).collect();
    assert_eq!(ids, vec![1, 5]);
    assert!(january.len() <= loaded.len());

    // Rollup covers every row that has coordinates
    let locations = aggregate_by_location(&loaded);
    let with_coords = loaded.iter().filter(|r| r.has_coordinates()).count();
    assert_eq!(locations.iter().map(|l| l.inspection_count).sum::<usize>(), with_coords);

    let pizza = locations
        .iter()
        .find(|l| l.establishment_name.as_deref() == Some("PIZZA PLACE"))
        .unwrap();
    assert_eq!(pizza.inspection_count, 2);
    assert_eq!(pizza.severity_counts.len(), 2);
    assert_eq!(pizza.severity_counts["S - Significant"], 1);
    assert_eq!(pizza.severity_counts["M - Minor"], 1);

    Ok(())
}

#[tokio::test]
async fn test_cached_loader_serves_latest_snapshot() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = SnapshotStore::new(temp_dir.path());
    let client = CkanClient::new(BASE, portal());
    Pipeline::refresh(&client, &store, "dinesafe").await?;

    let mut loader = CachedSnapshotLoader::new(store, std::time::Duration::from_secs(60));
    let a = loader.load()?;
    let b = loader.load()?;
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_query_before_any_refresh_is_not_found() {
    let temp_dir = tempdir().unwrap();
    let store = SnapshotStore::new(temp_dir.path().join("never-created"));

    let err = store.load_latest().unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, DineSafeError::NotFound(_)));
}

#[test]
fn test_renormalizing_a_loaded_snapshot_changes_nothing() -> Result<()> {
    let raw = RawTable::from_csv_reader(csv(CURRENT).as_bytes())?;
    let once = normalize(&raw)?;
    let twice = normalize(&once.to_raw())?;
    assert_eq!(once, twice);
    Ok(())
}
