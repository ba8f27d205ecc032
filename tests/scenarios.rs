use geo::{point, polygon, Geometry};
use polars::prelude::*;
use vtlivability::{
    census::{self, VariableDictionary},
    choropleth::Legend,
    largest_intersection, read_bytes, CascadingFilter, ChoroplethConfig, Cleaner, Dataset, Format, GeoTable,
    LevelSpec, PromoteConfig, WGS84,
};

fn sel(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn texts(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    df.column(name).unwrap().cast(&DataType::String).unwrap()
        .str().unwrap().into_iter().map(|v| v.map(str::to_string)).collect()
}

#[test]
fn csv_types_are_inferred_from_names_and_values() {
    let csv = b"id,date,active,count\n1,2020-01-02,yes,3\n2,,no,4\n3,2020-03-01,yes,\n";
    let Dataset::Table(df) = read_bytes(csv, Format::Csv, "sample.csv").unwrap() else {
        panic!("csv should read as a plain table");
    };
    let df = Cleaner::default().clean(&df).unwrap();

    let date = df.column("date").unwrap();
    assert!(matches!(date.dtype(), DataType::Datetime(_, _)));
    assert_eq!(date.null_count(), 1);
    assert!(date.get(1).unwrap().is_null());

    let active: Vec<Option<bool>> = df.column("active").unwrap().bool().unwrap().into_iter().collect();
    assert_eq!(active, vec![Some(true), Some(false), Some(true)]);

    let count = df.column("count").unwrap();
    assert!(count.dtype().is_integer());
    assert_eq!(count.i64().unwrap().into_iter().collect::<Vec<_>>(), vec![Some(3), Some(4), None]);
}

#[test]
fn coordinate_columns_become_points() {
    let csv = b"Name,Latitude,Longitude,Value\nBurlington,44.4759,-73.2121,10\nMontpelier,44.2601,-72.5754,20\n";
    let dataset = read_bytes(csv, Format::Csv, "towns.csv").unwrap();
    let promotion = PromoteConfig::default().promote_dataset(dataset).unwrap();
    assert!(promotion.warning.is_none());

    let geo = promotion.dataset.as_geo().expect("promoted to a geospatial table");
    assert_eq!(geo.epsg(), WGS84);
    assert_eq!(geo.geometry(), &[
        Some(Geometry::Point(point!(x: -73.2121, y: 44.4759))),
        Some(Geometry::Point(point!(x: -72.5754, y: 44.2601))),
    ]);
    assert_eq!(texts(geo.data(), "Name"), vec![Some("Burlington".into()), Some("Montpelier".into())]);
}

#[test]
fn census_names_split_into_jurisdiction_and_county() {
    let df = df!(
        "GEOID" => ["0600000US5000710675"],
        "NAME" => ["Burlington city, Chittenden County, Vermont"],
    ).unwrap();
    let split = census::split_name(&df).unwrap();
    assert_eq!(texts(&split, census::JURISDICTION), vec![Some("Burlington city".into())]);
    assert_eq!(texts(&split, census::COUNTY), vec![Some("Chittenden".into())]);
    assert!(split.column(census::NAME).is_err());
}

#[test]
fn cascading_filter_narrows_options_and_rows() {
    let df = df!(
        "Category" => ["A", "A", "B"],
        "Subcategory" => ["x", "y", "x"],
        "Value" => [1.0, 2.0, 3.0],
    ).unwrap();
    let filter = CascadingFilter::new(&df, vec![
        LevelSpec::new("Category").with_all(),
        LevelSpec::new("Subcategory").with_all(),
    ]).unwrap();

    let state = filter.resolve(&[sel(&["A"])]);
    assert_eq!(state.levels()[1].options, sel(&["All", "x", "y"]));

    let state = filter.resolve(&[sel(&["A"]), sel(&["y"])]);
    let out = filter.apply(&state, &df).unwrap();
    assert_eq!(texts(&out, "Category"), vec![Some("A".into())]);
    assert_eq!(texts(&out, "Subcategory"), vec![Some("y".into())]);
}

#[test]
fn jenks_colouring_isolates_the_outlier() {
    let values = [Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(3.0), Some(100.0), None];
    let geometry = (0..values.len()).map(|i| Some(Geometry::Point(point!(x: -72.0 - i as f64 * 0.01, y: 44.0)))).collect();
    let table = GeoTable::new(df!("V" => values).unwrap(), geometry, WGS84).unwrap();

    let config = ChoroplethConfig { classes: 3, colormap: "Reds".into(), ..ChoroplethConfig::default() };
    let colouring = config.colorize(&table, "V").unwrap();

    let Some(Legend::Swatches(swatches)) = &colouring.legend else {
        panic!("jenks colouring has a swatch legend");
    };
    let top = swatches.last().unwrap();
    assert_eq!(top.upper, 100.0);
    assert!(values.iter().flatten().filter(|&&v| v > top.lower).eq([100.0].iter()));

    assert_eq!(colouring.colors[5], top.color);
    assert_eq!(colouring.colors[6].to_array(), [0, 0, 0, 0]);
    assert!(colouring.colors[..5].iter().all(|c| *c != top.color));
}

#[test]
fn enrichment_takes_the_largest_overlap() {
    let donor = GeoTable::new(
        df!("County" => ["Alpha", "Beta"]).unwrap(),
        vec![
            Some(Geometry::Polygon(polygon![
                (x: -73.0, y: 44.0), (x: -72.7, y: 44.0), (x: -72.7, y: 44.3), (x: -73.0, y: 44.3),
            ])),
            Some(Geometry::Polygon(polygon![
                (x: -72.7, y: 44.0), (x: -72.4, y: 44.0), (x: -72.4, y: 44.3), (x: -72.7, y: 44.3),
            ])),
        ],
        WGS84,
    ).unwrap();
    // 70% of P lies west of the shared edge.
    let target = GeoTable::new(
        df!("Town" => ["P"]).unwrap(),
        vec![Some(Geometry::Polygon(polygon![
            (x: -72.91, y: 44.1), (x: -72.61, y: 44.1), (x: -72.61, y: 44.2), (x: -72.91, y: 44.2),
        ]))],
        WGS84,
    ).unwrap();

    let enriched = largest_intersection(&target, &donor, &["County"]).unwrap();
    assert_eq!(texts(enriched.data(), "County"), vec![Some("Alpha".into())]);
    assert_eq!(texts(enriched.data(), "Town"), vec![Some("P".into())]);
}

#[test]
fn wide_tidy_wide_round_trip() {
    let dict = VariableDictionary::from_pairs([
        ("DP04_0001E", "Estimate!!HOUSING OCCUPANCY!!Total housing units"),
        ("DP04_0002E", "Estimate!!HOUSING OCCUPANCY!!Total housing units!!Occupied housing units"),
        ("DP04_0003E", "Estimate!!HOUSING OCCUPANCY!!Total housing units!!Vacant housing units"),
    ]);
    let wide = df!(
        "GEOID" => ["0600000US5000710675", "0600000US5002345550"],
        "NAME" => ["Burlington city, Chittenden County, Vermont", "Montpelier city, Washington County, Vermont"],
        "DP04_0001E" => [19_000.0, 4_100.0],
        "DP04_0002E" => [18_200.0, 3_800.0],
        "DP04_0003E" => [800.0, 300.0],
    ).unwrap();

    let tidy = census::tidy(&wide, &dict).unwrap();
    assert_eq!(tidy.height(), 6);

    let back = census::widen(&tidy, &dict).unwrap();
    assert_eq!(texts(&back, census::GEOID), texts(&wide, census::GEOID));
    assert_eq!(texts(&back, census::COUNTY), vec![Some("Chittenden".into()), Some("Washington".into())]);
    for code in ["DP04_0001E", "DP04_0002E", "DP04_0003E"] {
        assert_eq!(
            back.column(code).unwrap().f64().unwrap().into_iter().collect::<Vec<_>>(),
            wide.column(code).unwrap().f64().unwrap().into_iter().collect::<Vec<_>>(),
            "{code}",
        );
    }
}
