#[path = "../common/mod.rs"]
mod common;

use common::{keys_table, retail_cube, FactCube, ScriptedExecutor};
use narrator::dax::SortDir;
use narrator::drill::{
    single_level, DimensionList, DrillError, DrillIterator, DrillRequest, FailurePolicy,
    LevelOutcome,
};
use narrator::executor::{QueryFailure, Scalar, Table};

fn keys_of(report: &narrator::drill::DrillReport, level: usize) -> Vec<String> {
    report.entries()[level].result.keys.as_slice().to_vec()
}

#[tokio::test]
async fn test_directional_top_n_per_region() {
    let cube = retail_cube();
    let request = DrillRequest::new(DimensionList::new(["Region", "Store"]), "[Sales]", 2)
        .with_direction(SortDir::Desc);

    let report = DrillIterator::new(&cube).run(&request).await.unwrap();

    assert_eq!(report.labels(), vec!["Region by Store"]);
    assert_eq!(
        keys_of(&report, 0),
        vec!["EastE1", "EastE2", "WestW3", "WestW2"]
    );
    // Key bootstrap + one ranking query.
    assert_eq!(cube.query_count(), 2);
}

#[tokio::test]
async fn test_dynamic_ranks_losing_parent_ascending() {
    let cube = retail_cube();
    let request = DrillRequest::new(DimensionList::new(["Region", "Store"]), "[Sales]", 2);

    let report = DrillIterator::new(&cube).run(&request).await.unwrap();

    // East is positive (largest first), West is negative (largest loss first).
    assert_eq!(
        keys_of(&report, 0),
        vec!["EastE1", "EastE2", "WestW1", "WestW2"]
    );
    let west_rows: Vec<f64> = report.entries()[0]
        .result
        .table
        .rows()
        .iter()
        .filter(|row| row[0] == Scalar::from("West"))
        .filter_map(|row| row[2].as_f64())
        .collect();
    assert_eq!(west_rows, vec![-10.0, -8.0]);
}

#[tokio::test]
async fn test_three_level_drill_threads_keys() {
    let cube = retail_cube();
    let request = DrillRequest::new(DimensionList::new(["Region", "Store", "Aisle"]), "[Sales]", 1);

    let report = DrillIterator::new(&cube).run(&request).await.unwrap();

    assert_eq!(report.labels(), vec!["Region by Store", "Store by Aisle"]);
    assert_eq!(keys_of(&report, 0), vec!["EastE1", "WestW1"]);
    assert_eq!(keys_of(&report, 1), vec!["EastE1A", "WestW1A"]);

    let queries = cube.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 3);
    assert!(queries[2].contains(r#"VAR t_keys = {"EastE1", "WestW1"}"#));
}

#[tokio::test]
async fn test_every_level_has_at_most_n_dense_ranks() {
    let cube = FactCube::new(&["Region", "Store"])
        .fact(&["North", "a"], 10.0)
        .fact(&["North", "b"], 10.0)
        .fact(&["North", "c"], 5.0)
        .fact(&["North", "d"], 1.0);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store"]), "[Sales]", 2)
        .with_direction(SortDir::Desc);

    let report = DrillIterator::new(&cube).run(&request).await.unwrap();

    // a and b tie at rank 1, c is rank 2; d falls outside.
    assert_eq!(keys_of(&report, 0), vec!["Northa", "Northb", "Northc"]);
}

#[tokio::test]
async fn test_rerun_is_identical() {
    let cube = retail_cube();
    let request = DrillRequest::new(DimensionList::new(["Region", "Store", "Aisle"]), "[Sales]", 2);
    let iterator = DrillIterator::new(&cube);

    let first = iterator.run(&request).await.unwrap();
    let second = iterator.run(&request).await.unwrap();

    assert_eq!(first, second);
    let queries = cube.queries.lock().unwrap().clone();
    assert_eq!(queries[..3], queries[3..]);
}

#[tokio::test]
async fn test_failed_level_degrades_and_starves_the_rest() {
    // Call 0 is the bootstrap, call 1 the first ranking query.
    let cube = retail_cube().failing_on(1);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store", "Aisle"]), "[Sales]", 2);

    let report = DrillIterator::new(&cube).run(&request).await.unwrap();

    assert_eq!(report.len(), 2);
    assert!(report.has_failures());
    assert!(matches!(
        &report.entries()[0].result.outcome,
        LevelOutcome::Failed(QueryFailure::Service { code, .. }) if code == "DatasetExecuteQueriesError"
    ));
    assert!(report.entries()[0].result.table.is_empty());
    assert_eq!(report.entries()[1].result.outcome, LevelOutcome::Starved);
    assert_eq!(cube.query_count(), 2);
}

#[tokio::test]
async fn test_failed_level_aborts_under_abort_policy() {
    let cube = retail_cube().failing_on(1);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store", "Aisle"]), "[Sales]", 2);

    let err = DrillIterator::new(&cube)
        .with_policy(FailurePolicy::Abort)
        .run(&request)
        .await
        .unwrap_err();

    match err {
        DrillError::Query { level, label, source } => {
            assert_eq!(level, 0);
            assert_eq!(label, "Region by Store");
            assert_eq!(source, QueryFailure::service("DatasetExecuteQueriesError", "boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(cube.query_count(), 2);
}

#[tokio::test]
async fn test_failed_bootstrap_is_recorded_on_first_level() {
    let cube = retail_cube().failing_on(0);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store"]), "[Sales]", 2);

    let report = DrillIterator::new(&cube).run(&request).await.unwrap();

    assert_eq!(report.len(), 1);
    assert!(report.entries()[0].result.is_failed());
    assert_eq!(cube.query_count(), 1);
}

#[tokio::test]
async fn test_empty_level_starves_following_levels() {
    let exec = ScriptedExecutor::new(vec![
        Ok(keys_table(&["East"])),
        Ok(Table::empty()),
    ]);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store", "Aisle"]), "[Sales]", 3);

    let report = DrillIterator::new(&exec).run(&request).await.unwrap();

    assert_eq!(report.entries()[0].result.outcome, LevelOutcome::Ranked);
    assert!(report.entries()[0].result.keys.is_empty());
    assert_eq!(report.entries()[1].result.outcome, LevelOutcome::Starved);
    assert!(!report.has_failures());
    assert_eq!(exec.queries().len(), 2);
}

#[tokio::test]
async fn test_next_level_binds_returned_keys() {
    let exec = ScriptedExecutor::new(vec![
        Ok(keys_table(&["East", "West"])),
        Ok(keys_table(&["EastE1", "EastE2", "EastE1"])),
        Ok(keys_table(&["EastE1A"])),
    ]);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store", "Aisle"]), "[Sales]", 3)
        .with_direction(SortDir::Asc);

    let report = DrillIterator::new(&exec).run(&request).await.unwrap();

    let queries = exec.queries();
    assert_eq!(queries.len(), 3);
    assert!(queries[1].contains(r#"VAR t_keys = {"East", "West"}"#));
    assert!(queries[2].contains(r#"VAR t_keys = {"EastE1", "EastE2"}"#));
    assert_eq!(keys_of(&report, 1), vec!["EastE1A"]);
}

#[tokio::test]
async fn test_short_hierarchies_issue_no_queries() {
    let exec = ScriptedExecutor::new(vec![]);

    for dims in [vec![], vec!["Region"]] {
        let request = DrillRequest::new(DimensionList::new(dims), "[Sales]", 3);
        let report = DrillIterator::new(&exec).run(&request).await.unwrap();
        assert!(report.is_empty());
    }
    assert!(exec.queries().is_empty());
}

#[tokio::test]
async fn test_entry_rendering_feeds_narratives() {
    let cube = retail_cube();
    let request = DrillRequest::new(DimensionList::new(["Region", "Store"]), "[Sales]", 1)
        .with_direction(SortDir::Desc);

    let report = DrillIterator::new(&cube).run(&request).await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(
        report.entries()[0].render(),
        "Region by Store\n\n\
         [{\"Region\":\"East\",\"Store\":\"E1\",\"[Sales]\":40.0,\"[Key]\":\"EastE1\"},\
         {\"Region\":\"West\",\"Store\":\"W3\",\"[Sales]\":3.0,\"[Key]\":\"WestW3\"}]"
    );
}

#[tokio::test]
async fn test_single_level_runs_one_query() {
    let exec = ScriptedExecutor::new(vec![Ok(keys_table(&["EastE1"]))]);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store"]), "[Sales]", 3)
        .with_metric("\"Sales\", [Sales]");

    let table = single_level(&exec, &request).await.unwrap();

    assert_eq!(table.key_values(), vec!["EastE1"]);
    let queries = exec.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].starts_with("EVALUATE\nSUMMARIZECOLUMNS(Region, Store, \"Sales\", [Sales]"));
}

#[tokio::test]
async fn test_scripted_region_store_scenario() {
    let mut regions = Table::new(["Geo[Region]", "[Key]"]);
    regions.push_row(vec![Scalar::from("East"), Scalar::from("East")]);
    regions.push_row(vec![Scalar::from("West"), Scalar::from("West")]);

    let mut stores = Table::new(["Geo[Region]", "Geo[Store]", "[Sales]", "[Key]"]);
    for (region, store, sales) in [
        ("East", "E1", 40.0),
        ("East", "E2", 15.0),
        ("West", "W3", 3.0),
        ("West", "W2", -8.0),
    ] {
        stores.push_row(vec![
            Scalar::from(region),
            Scalar::from(store),
            Scalar::from(sales),
            Scalar::from(format!("{}{}", region, store).as_str()),
        ]);
    }

    let exec = ScriptedExecutor::new(vec![Ok(regions), Ok(stores)]);
    let request = DrillRequest::new(DimensionList::new(["Geo[Region]", "Geo[Store]"]), "[Sales]", 2)
        .with_direction(SortDir::Desc);

    let report = DrillIterator::new(&exec).run(&request).await.unwrap();

    assert_eq!(report.labels(), vec!["Geo[Region] by Geo[Store]"]);
    let table = &report.entries()[0].result.table;
    for region in ["East", "West"] {
        let per_region = table
            .column_values("Region")
            .unwrap()
            .into_iter()
            .filter(|v| v.as_str() == Some(region))
            .count();
        assert!(per_region <= 2);
    }
    assert_eq!(keys_of(&report, 0), vec!["EastE1", "EastE2", "WestW3", "WestW2"]);

    let queries = exec.queries();
    assert!(queries[1].contains(r#"VAR t_keys = {"East", "West"}"#));
    assert!(queries[1].contains("[RankM] <= 2 && [Key] IN t_keys"));
    assert!(queries[1].contains(
        "\"Key\", CALCULATE(CONCATENATE(CALCULATE(MAX(Geo[Region])), MAX(Geo[Store])))"
    ));
}

#[tokio::test]
async fn test_failed_ranking_query_leaves_explicit_empty_entry() {
    let exec = ScriptedExecutor::new(vec![
        Ok(keys_table(&["East", "West"])),
        Err(QueryFailure::Status {
            status: 500,
            body: "internal".into(),
        }),
    ]);
    let request = DrillRequest::new(DimensionList::new(["Region", "Store"]), "[Sales]", 2)
        .with_direction(SortDir::Desc);

    let report = DrillIterator::new(&exec).run(&request).await.unwrap();

    assert_eq!(report.len(), 1);
    let entry = &report.entries()[0];
    assert_eq!(entry.label, "Region by Store");
    assert!(entry.result.table.is_empty());
    assert!(matches!(
        entry.result.outcome,
        LevelOutcome::Failed(QueryFailure::Status { status: 500, .. })
    ));
    assert_eq!(exec.queries().len(), 2);
}
