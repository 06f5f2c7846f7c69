use delegate_semaphore::analyzers::aggregate::aggregate_groups;
use delegate_semaphore::analyzers::analyzer::analyze;
use delegate_semaphore::analyzers::scope::{GroupLevel, ScopeSelection, Specificity, apply_filters};
use delegate_semaphore::analyzers::types::{Notice, Status};
use delegate_semaphore::auth::{UserDirectory, UserScope, hash_password, login};
use delegate_semaphore::error::DashboardError;
use delegate_semaphore::fetch::ExportCountSource;
use delegate_semaphore::output::DashboardReport;
use delegate_semaphore::parser::read_locations;
use delegate_semaphore::table::{LocationTable, TableLoader, Tracking};
use std::time::Duration;

const GEOGRAPHY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/recintos.csv");
const GEOGRAPHY_XLSX: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/recintos.xlsx");
const EXPORTS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/exports");

fn static_table() -> LocationTable {
    let rows = read_locations(GEOGRAPHY).expect("fixture should parse");
    LocationTable::from_parts(rows, None, Tracking::ElectoralControl)
}

fn export_loader() -> TableLoader {
    TableLoader {
        geography_path: GEOGRAPHY.to_string(),
        queries_dir: "unused".to_string(),
        timeout: Duration::from_secs(5),
        source: Some(Box::new(ExportCountSource::new(EXPORTS))),
    }
}

#[test]
fn test_province_scenario_end_to_end() {
    let table = static_table();
    let user = UserScope::from_identity("x").unwrap();
    let view = apply_filters(&table.rows, &user, &ScopeSelection::all()).unwrap();

    let names: Vec<_> = view.rows.iter().map(|r| r.location_name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);

    let by_province = aggregate_groups(&view.rows, GroupLevel::Province);
    assert_eq!(by_province.series.len(), 1);
    assert_eq!(by_province.series[0].label, "X");
    assert_eq!(by_province.series[0].ratio, 73.33);

    let dashboard = analyze(&table, &user, &ScopeSelection::all()).unwrap();
    let summary = dashboard.summary.unwrap();
    assert_eq!(summary.status_counts.green, 1);
    assert_eq!(summary.status_counts.yellow, 0);
    assert_eq!(summary.status_counts.red, 1);
    assert_eq!(summary.remaining, 40);
    assert_eq!(summary.completion_pct, 73.33);

    // a province is narrowed, so the chart breaks it down by canton
    let aggregation = dashboard.aggregation.unwrap();
    assert_eq!(aggregation.level, GroupLevel::Canton);
    assert_eq!(aggregation.series[0].label, "XC");
    assert_eq!(aggregation.series[0].ratio, 73.33);
}

#[test]
fn test_workbook_geography_is_read_like_the_csv_export() {
    let rows = read_locations(GEOGRAPHY_XLSX).unwrap();

    // the repeated 1001 row is dropped
    let codes: Vec<_> = rows.iter().map(|r| r.location_code.as_str()).collect();
    assert_eq!(codes, vec!["1001", "1002"]);
    assert_eq!(rows[0].location_name, "ESCUELA A");
    assert_eq!(rows[0].canton, "CUENCA");

    // numeric parish cell 1.0 reads as "1"
    assert_eq!(rows[0].parish, "1");
    assert_eq!(rows[1].parish, "BELLAVISTA");

    // blank optional cells are absent, not empty strings
    assert_eq!(rows[0].sub_division, None);
    assert_eq!(rows[0].zone.as_deref(), Some("ZONA 1"));
    assert_eq!(rows[1].zone, None);

    assert_eq!(rows[0].total_units, 4);
    assert_eq!(rows[1].total_units, 6);
    assert_eq!(rows[0].coordinates(), Some((-2.9, -79.0)));
}

#[test]
fn test_admin_sees_every_province() {
    let table = static_table();
    let dashboard = analyze(&table, &UserScope::Unrestricted, &ScopeSelection::all()).unwrap();

    let provinces = &dashboard.options[0];
    assert!(provinces.allow_all);
    assert_eq!(provinces.values, vec!["GUAYAS", "X", "Y"]);
    assert_eq!(dashboard.specificity, Specificity::AllProvinces);
    assert_eq!(dashboard.summary.unwrap().locations, 6);
}

#[test]
fn test_sub_division_user_is_clamped() {
    let table = static_table();
    let user = UserScope::from_identity("guayas_x_3").unwrap();

    let dashboard = analyze(&table, &user, &ScopeSelection::all()).unwrap();
    assert_eq!(dashboard.options[0].values, vec!["GUAYAS"]);
    assert!(!dashboard.options[0].allow_all);
    assert_eq!(dashboard.options[1].values, vec!["CIRCUNSCRIPCIÓN 3"]);
    assert!(!dashboard.options[1].allow_all);
    assert_eq!(dashboard.specificity, Specificity::SubDivision);

    let aggregation = dashboard.aggregation.unwrap();
    let series: Vec<_> = aggregation
        .series
        .iter()
        .map(|p| (p.label.as_str(), p.ratio))
        .collect();
    assert_eq!(series, vec![("GUAYAQUIL", 60.0), ("DAULE", 0.0)]);

    let map = dashboard.map.unwrap();
    assert_eq!(map.markers.len(), 1);
    assert_eq!(map.unmapped, 1);
    assert_eq!(map.markers[0].color, "yellow");

    let other = ScopeSelection::all().with_province("Y");
    assert!(matches!(
        analyze(&table, &user, &other),
        Err(DashboardError::InvalidSelection { .. })
    ));
}

#[tokio::test]
async fn test_export_merge_preserves_geography() {
    let table = export_loader()
        .load(Tracking::ElectoralControl)
        .await
        .unwrap();

    assert!(table.notices.is_empty());
    assert_eq!(table.rows.len(), 6);

    let zero_filled = table
        .rows
        .iter()
        .filter(|r| r.total_units == 0 && r.assigned_count == 0)
        .count();
    assert_eq!(zero_filled, 4);

    let a = &table.rows[0];
    assert_eq!((a.assigned_count, a.total_units), (95, 100));
    assert_eq!(a.status, Status::Green);
    let d = table.rows.iter().find(|r| r.location_code == "3001").unwrap();
    assert_eq!(d.assigned_count, 20);
}

#[tokio::test]
async fn test_quick_count_keeps_only_reported_locations() {
    let table = export_loader().load(Tracking::QuickCount).await.unwrap();

    let codes: Vec<_> = table.rows.iter().map(|r| r.location_code.as_str()).collect();
    assert_eq!(codes, vec!["1001", "3001"]);
}

#[tokio::test]
async fn test_unavailable_source_keeps_static_counts() {
    let loader = TableLoader {
        source: Some(Box::new(ExportCountSource::new("/no/such/exports"))),
        ..export_loader()
    };
    let table = loader.load(Tracking::ElectoralControl).await.unwrap();

    assert!(matches!(
        table.notices.as_slice(),
        [Notice::SourceUnavailable { .. }]
    ));
    assert_eq!(table.rows[0].assigned_count, 90);
}

#[tokio::test]
async fn test_export_with_wrong_header_keeps_static_counts() {
    let dir = std::env::temp_dir().join("delegate_semaphore_bad_export");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("control_electoral.csv"), "codigo,asignados\n1001,5\n").unwrap();

    let loader = TableLoader {
        source: Some(Box::new(ExportCountSource::new(&dir))),
        ..export_loader()
    };
    let table = loader.load(Tracking::ElectoralControl).await.unwrap();

    match table.notices.as_slice() {
        [Notice::SourceUnavailable { message, .. }] => {
            assert!(message.contains("cod_recinto"));
            assert!(message.contains("export"));
        }
        other => panic!("unexpected notices: {other:?}"),
    }
    assert_eq!(table.live_rows, None);
    assert_eq!(table.rows.len(), 6);
    assert_eq!(table.rows[0].assigned_count, 90);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_login_then_report() {
    let users = UserDirectory::from_json(&format!(
        r#"{{ "x": {{ "name": "Provincia X", "password_sha256": "{}" }} }}"#,
        hash_password("clave")
    ))
    .unwrap();

    assert!(matches!(
        login(&users, "x", "wrong"),
        Err(DashboardError::AccessDenied { .. })
    ));
    let user = login(&users, "x", "clave").unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Provincia X"));

    let table = static_table();
    let dashboard = analyze(&table, &user.scope, &ScopeSelection::all()).unwrap();
    let report = DashboardReport::new(user, Tracking::ElectoralControl, dashboard);

    let json: serde_json::Value = serde_json::from_slice(&report.encode(false).unwrap()).unwrap();
    assert_eq!(json["summary"]["remaining"], 40);
    assert_eq!(json["charts"]["assignment"]["series"][0]["data"][1]["value"], 40);

    let record = report.summary_record().unwrap();
    assert_eq!(record.province.as_deref(), Some("X"));
    assert_eq!((record.green, record.red), (1, 1));
    assert_eq!(record.completion_pct, 73.33);
}
