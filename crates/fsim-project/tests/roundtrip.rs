use fsim_project::schema::*;
use fsim_project::{load_json, load_yaml, save_json, save_yaml, validate_project};
use fsim_sim::{ConvergenceMethod, RunOptions};

fn brine_point(time_s: f64, mass_flow_kg_s: f64) -> FeedPointDef {
    FeedPointDef {
        time_s,
        mass_flow_kg_s,
        temperature_k: 300.0,
        pressure_pa: 101_325.0,
        phases: [(
            "liquid".to_string(),
            PhaseDef {
                fraction: 1.0,
                compounds: [("H2O".to_string(), 0.97), ("NaCl".to_string(), 0.03)]
                    .into_iter()
                    .collect(),
            },
        )]
        .into_iter()
        .collect(),
    }
}

fn feed_product() -> Project {
    Project {
        version: 2,
        name: "Feed to product".to_string(),
        materials: MaterialsDef {
            compounds: vec!["H2O".to_string(), "NaCl".to_string()],
            phases: vec!["liquid".to_string()],
            classes: 1,
        },
        units: vec![
            UnitDef {
                id: "feed".to_string(),
                name: "Feed".to_string(),
                kind: UnitKind::Feed {
                    points: vec![brine_point(0.0, 1.0), brine_point(5.0, 1.5)],
                },
                ports: [("Out".to_string(), "s1".to_string())].into_iter().collect(),
            },
            UnitDef {
                id: "prod".to_string(),
                name: "Product".to_string(),
                kind: UnitKind::Product,
                ports: [("In".to_string(), "s1".to_string())].into_iter().collect(),
            },
        ],
        streams: vec![StreamDef {
            id: "s1".to_string(),
            name: "Brine".to_string(),
        }],
        sequence: Some(SequenceDef {
            partitions: vec![
                PartitionDef {
                    units: vec!["feed".to_string()],
                    tears: vec![],
                },
                PartitionDef {
                    units: vec!["prod".to_string()],
                    tears: vec![],
                },
            ],
        }),
        options: RunOptions {
            end_time: 10.0,
            convergence: ConvergenceMethod::Steffensen,
            save_time_step: 0.5,
            ..RunOptions::default()
        },
    }
}

#[test]
fn roundtrip_yaml_empty_project() {
    let project = Project {
        version: 2,
        name: "Empty Project".to_string(),
        materials: MaterialsDef {
            compounds: vec![],
            phases: vec![],
            classes: 1,
        },
        units: vec![],
        streams: vec![],
        sequence: None,
        options: RunOptions::default(),
    };

    validate_project(&project).unwrap();

    let path = std::env::temp_dir().join("fsim_project_roundtrip_empty.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_yaml_feed_product() {
    let project = feed_product();

    let path = std::env::temp_dir().join("fsim_project_roundtrip_feed_product.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_json_feed_product() {
    let project = feed_product();

    let path = std::env::temp_dir().join("fsim_project_roundtrip_feed_product.json");
    save_json(&path, &project).unwrap();
    let loaded = load_json(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn save_rejects_invalid_project() {
    let mut project = feed_product();
    project.units[1].ports = [("In".to_string(), "missing".to_string())]
        .into_iter()
        .collect();

    let path = std::env::temp_dir().join("fsim_project_invalid.yaml");
    assert!(save_yaml(&path, &project).is_err());
}

#[test]
fn omitted_options_take_defaults() {
    let yaml = r#"
version: 2
name: Minimal
materials:
  compounds: [H2O]
  phases: [liquid]
options:
  end_time: 5.0
"#;
    let path = std::env::temp_dir().join("fsim_project_minimal.yaml");
    std::fs::write(&path, yaml).unwrap();
    let project = load_yaml(&path).unwrap();

    assert_eq!(project.materials.classes, 1);
    assert_eq!(project.options.end_time, 5.0);
    assert_eq!(project.options.max_iterations, RunOptions::default().max_iterations);
    assert!(project.sequence.is_none());
}
