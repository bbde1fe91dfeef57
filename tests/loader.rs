mod common;

use std::{collections::BTreeMap, time::Duration};

use httpmock::prelude::*;
use store_lookup::{
    data::Value,
    error::LoadError,
    io_utils,
    reconcile::{AggregateSummary, reconcile},
    source::{LoadOutcome, Loader, SourceDescriptor, SourceFormat, SourceKind},
};

use common::{TestWorkspace, multi_sheet_workbook_bytes, workbook_bytes};

fn loader() -> Loader {
    let encoding = io_utils::resolve_encoding(None).expect("utf-8");
    Loader::new(Duration::from_secs(5), encoding).expect("http client")
}

fn descriptor(location: &str) -> SourceDescriptor {
    location.parse().expect("descriptor")
}

#[test]
fn loads_remote_csv_export() {
    let server = MockServer::start();
    let export = server.mock(|when, then| {
        when.method(GET).path("/export").query_param("format", "csv");
        then.status(200)
            .header("content-type", "text/csv; charset=utf-8")
            .body("No. Tienda,Ventas\n1001,500\n1002,\n");
    });

    let table = loader().load(&descriptor(&server.url("/export?format=csv")));

    export.assert();
    assert_eq!(table.columns(), ["No. Tienda", "Ventas"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, "Ventas"), Some(&Value::from("500")));
    assert_eq!(table.cell(1, "Ventas"), None);
}

#[test]
fn http_error_status_becomes_empty_table() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing.csv");
        then.status(404).body("not found");
    });

    let d = descriptor(&server.url("/missing.csv"));
    let outcome = loader().load_outcome(&d);

    assert!(matches!(
        outcome,
        LoadOutcome::Failed(LoadError::Http { status: 404, .. })
    ));
    assert!(loader().load(&d).is_empty());
}

#[test]
fn html_response_is_not_tabular() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/login");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body("<html><body>Sign in</body></html>");
    });

    let outcome = loader().load_outcome(&descriptor(&server.url("/login")));

    assert!(matches!(
        outcome,
        LoadOutcome::Failed(LoadError::NotTabular { .. })
    ));
}

#[test]
fn unreachable_url_yields_empty_table_and_zero_summary() {
    let loader = Loader::new(
        Duration::from_secs(2),
        io_utils::resolve_encoding(None).expect("utf-8"),
    )
    .expect("http client");
    let d = descriptor("http://127.0.0.1:9/ventas.csv");

    assert!(loader.load_outcome(&d).is_failed());
    let table = loader.load(&d);
    assert!(table.is_empty());

    let result = reconcile(&BTreeMap::from([(SourceKind::Sales, table)]));
    assert!(result.unified.is_empty());
    assert_eq!(result.summary, AggregateSummary::default());
}

#[test]
fn remote_workbook_with_sheet_selector() {
    let server = MockServer::start();
    let bytes = workbook_bytes(
        "Tiendas",
        &[&["NOTIENDA", "NOMBRE"], &["1001", "Centro"], &["1002", "Norte"]],
    );
    server.mock(|when, then| {
        when.method(GET).path("/tiendas.xlsx");
        then.status(200)
            .header(
                "content-type",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )
            .body(&bytes);
    });

    let d = descriptor(&format!("{}#Tiendas", server.url("/tiendas.xlsx")));
    assert_eq!(d.sheet.as_deref(), Some("Tiendas"));
    assert_eq!(d.resolved_format(), SourceFormat::Workbook);

    let table = loader().load(&d);
    assert_eq!(table.columns(), ["NOTIENDA", "NOMBRE"]);
    assert_eq!(table.cell(0, "NOTIENDA"), Some(&Value::Number(1001.0)));
    assert_eq!(table.cell(1, "NOMBRE"), Some(&Value::from("Norte")));
}

#[test]
fn sheets_xlsx_export_downloads_workbook_and_picks_sheet() {
    let server = MockServer::start();
    let ventas: &[&[&str]] = &[&["no_tienda", "ventas"], &["1", "10"]];
    let promos: &[&[&str]] = &[&["No Tienda", "Promo"], &["1001", "2x1"], &["1002", "3x2"]];
    let bytes = multi_sheet_workbook_bytes(&[("Ventas", ventas), ("Promos", promos)]);
    let export = server.mock(|when, then| {
        when.method(GET)
            .path("/spreadsheets/d/ABC/export")
            .query_param("format", "xlsx");
        then.status(200)
            .header(
                "content-type",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )
            .body(&bytes);
    });

    let d = descriptor(&format!(
        "{}#Promos",
        server.url("/spreadsheets/d/ABC/export?format=xlsx")
    ));
    let table = loader().load(&d);

    export.assert();
    assert_eq!(table.columns(), ["No Tienda", "Promo"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(1, "Promo"), Some(&Value::from("3x2")));
}

#[test]
fn sheets_csv_with_selector_goes_through_gviz() {
    let server = MockServer::start();
    let gviz = server.mock(|when, then| {
        when.method(GET)
            .path("/spreadsheets/d/ABC/gviz/tq")
            .query_param("tqx", "out:csv")
            .query_param("sheet", "Vales & más");
        then.status(200)
            .header("content-type", "text/csv; charset=utf-8")
            .body("no_tienda,vales\n1001,4\n");
    });

    let d = descriptor(&format!(
        "{}#Vales & más",
        server.url("/spreadsheets/d/ABC/edit")
    ));
    let table = loader().load(&d);

    gviz.assert();
    assert_eq!(table.cell(0, "vales"), Some(&Value::from("4")));
}

#[test]
fn local_workbook_defaults_to_first_sheet() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_workbook(
        "promos.xlsx",
        "Promociones",
        &[&["No Tienda", "Promo"], &["7", "2x1"]],
    );

    let table = loader().load(&SourceDescriptor::new(path.display().to_string().into()));

    assert_eq!(table.columns(), ["No Tienda", "Promo"]);
    assert_eq!(table.row_count(), 1);
}

#[test]
fn missing_sheet_is_a_load_failure() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_workbook("promos.xlsx", "Promociones", &[&["a"], &["1"]]);

    let d = descriptor(&format!("{}#Ventas", path.display()));
    let outcome = loader().load_outcome(&d);

    assert!(matches!(
        outcome,
        LoadOutcome::Failed(LoadError::MissingSheet(ref sheet)) if sheet == "Ventas"
    ));
    assert!(loader().load(&d).is_empty());
}

#[test]
fn local_tsv_and_missing_file() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("vales.tsv", "no_tienda\tvales\n1001\t3\n");

    let table = loader().load(&descriptor(&path.display().to_string()));
    assert_eq!(table.cell(0, "vales"), Some(&Value::from("3")));

    let missing = workspace.path().join("nope.csv");
    let outcome = loader().load_outcome(&descriptor(&missing.display().to_string()));
    assert!(matches!(outcome, LoadOutcome::Failed(LoadError::Io { .. })));
}

#[test]
fn explicit_format_overrides_extension() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("ventas.dat", "no_tienda\tventas\n1\t2\n");

    let d = SourceDescriptor::new(path.display().to_string().into())
        .with_format(SourceFormat::Tsv);
    let table = loader().load(&d);

    assert_eq!(table.columns(), ["no_tienda", "ventas"]);
    assert_eq!(table.cell(0, "ventas"), Some(&Value::from("2")));
}
