use narrator::dax::SortDir;
use narrator::drill::{
    build_directional_ranking, build_dynamic_ranking, build_key_bootstrap, build_single_level,
    compose_key, DimensionList, DrillError, DrillRequest, KeySet, RankDirection, RankSpec,
};

fn region_store(direction: RankDirection) -> RankSpec {
    RankSpec {
        dimensions: vec!["Region".into()],
        ranked_dimension: "Store".into(),
        rank_depth: 3,
        drill_metric: "[Sales]".into(),
        direction,
        filters: None,
        metrics: vec!["\"Sales\", [Sales]".into()],
    }
}

#[test]
fn test_directional_query_full_text() {
    let spec = region_store(RankDirection::Explicit(SortDir::Desc));
    let query = build_directional_ranking(&spec, &KeySet::new(["East", "West"]), SortDir::Desc)
        .unwrap();

    insta::assert_snapshot!(query.to_dax(), @r#"
    EVALUATE
    VAR t_keys = {"East", "West"}
    VAR topXtable = SUMMARIZECOLUMNS(Region, Store, "Drill Metric", [Sales], "Key", CALCULATE(MAX(Region)))
    VAR rankingTable = FILTER(ADDCOLUMNS(topXtable, "RankM", RANKX(FILTER(topXtable, [Key] = EARLIER([Key])), [Sales], , DESC, DENSE)), [RankM] <= 3 && [Key] IN t_keys)
    RETURN
    CALCULATETABLE(SUMMARIZE(rankingTable, Region, Store, "Sales", [Sales], "Key", CALCULATE(CONCATENATE(CALCULATE(MAX(Region)), MAX(Store)))))
    "#);
}

#[test]
fn test_dynamic_direction_table_uses_metric_sign() {
    let spec = region_store(RankDirection::Infer);
    let query = build_dynamic_ranking(&spec, &KeySet::new(["East"])).unwrap();

    let top = query.var("toptable").expect("direction table bound");
    assert_eq!(
        top.to_dax(),
        "SUMMARIZECOLUMNS(Region, \"Direction\", IF([Sales] >= 0, \"DESC\", \"ASC\"), \
         \"Key\", CALCULATE(MAX(Region)))"
    );
}

#[test]
fn test_bootstrap_matches_direction_table() {
    // Both modes learn their first keys from the same grouping.
    let spec = region_store(RankDirection::Infer);
    let ranking = build_dynamic_ranking(&spec, &KeySet::new(["East"])).unwrap();
    let bootstrap = build_key_bootstrap(&spec.dimensions, &spec.drill_metric, None).unwrap();

    assert_eq!(Some(&bootstrap.body), ranking.var("toptable"));
}

#[test]
fn test_rank_spec_dispatches_on_direction() {
    let keys = KeySet::new(["East"]);

    let dynamic = region_store(RankDirection::Infer).build(&keys).unwrap();
    assert!(dynamic.var("toptable").is_some());

    let directional = region_store(RankDirection::Explicit(SortDir::Asc))
        .build(&keys)
        .unwrap();
    assert!(directional.var("toptable").is_none());
    assert!(directional.to_dax().contains(", ASC, DENSE)"));
}

#[test]
fn test_parent_key_spans_every_parent_dimension() {
    let mut spec = region_store(RankDirection::Explicit(SortDir::Desc));
    spec.dimensions = vec!["Region".into(), "Store".into()];
    spec.ranked_dimension = "Aisle".into();

    let text = spec.build(&KeySet::new(["EastE1"])).unwrap().to_dax();
    let parent = "CONCATENATE(CALCULATE(MAX(Region)), CALCULATE(MAX(Store)))";
    assert!(text.contains(&format!("\"Key\", {})", parent)));
    assert!(text.contains(&format!(
        "\"Key\", CALCULATE(CONCATENATE({}, MAX(Aisle)))",
        parent
    )));
}

#[test]
fn test_child_key_extends_parent_key() {
    let parent = compose_key(&["Region".into()]).unwrap();
    let child = compose_key(&["Region".into(), "Store".into()]).unwrap();

    assert_eq!(parent.depth(), 1);
    assert_eq!(child.depth(), 2);
    assert_eq!(
        parent.child_key("Store").to_dax(),
        "CALCULATE(CONCATENATE(CALCULATE(MAX(Region)), MAX(Store)))"
    );
}

#[test]
fn test_key_values_are_escaped() {
    let spec = region_store(RankDirection::Explicit(SortDir::Desc));
    let text = spec
        .build(&KeySet::new(["Bob's \"Best\""]))
        .unwrap()
        .to_dax();
    assert!(text.contains(r#"VAR t_keys = {"Bob's ""Best"""}"#));
}

#[test]
fn test_whitespace_filters_omitted_everywhere() {
    let mut spec = region_store(RankDirection::Infer);
    spec.filters = Some("   ".into());
    let with_blank = spec.build(&KeySet::new(["East"])).unwrap();

    spec.filters = None;
    let without = spec.build(&KeySet::new(["East"])).unwrap();

    assert_eq!(with_blank, without);
}

#[test]
fn test_rank_spec_from_request_transition() {
    let request = DrillRequest::new(DimensionList::new(["Region", "Store", "Aisle"]), "[Sales]", 2)
        .with_direction(SortDir::Asc)
        .with_filters("'Date'[Year] = 2024");
    let transition = request.dimensions.transitions().nth(1).unwrap();
    let spec = request.rank_spec(&transition);

    assert_eq!(spec.dimensions, vec!["Region", "Store"]);
    assert_eq!(spec.ranked_dimension, "Aisle");
    assert_eq!(spec.rank_depth, 2);
    assert_eq!(spec.direction, RankDirection::Explicit(SortDir::Asc));
    assert_eq!(spec.filters.as_deref(), Some("'Date'[Year] = 2024"));
}

#[test]
fn test_single_level_with_filters() {
    let query = build_single_level(
        &["Region".into()],
        Some("'Date'[Year] = 2024"),
        &["\"Sales\", [Sales]".into(), "\"Units\", [Units]".into()],
    )
    .unwrap();

    assert_eq!(
        query.to_dax(),
        "EVALUATE\nSUMMARIZECOLUMNS(Region, 'Date'[Year] = 2024, \"Sales\", [Sales], \
         \"Units\", [Units], \"Key\", CALCULATE(MAX(Region)))"
    );
}

#[test]
fn test_builders_reject_empty_dimensions() {
    assert!(matches!(
        build_key_bootstrap(&[], "[Sales]", None),
        Err(DrillError::EmptyDimensionList)
    ));
    assert!(matches!(
        build_single_level(&[], None, &[]),
        Err(DrillError::EmptyDimensionList)
    ));
}
