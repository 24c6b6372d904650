//! End-to-end runs of the study application.

use ormq_study::{App, Command, OutputFormat, StudyConfig};

fn sled_config(dir: &tempfile::TempDir) -> StudyConfig {
    StudyConfig::new().with_data_path(dir.path().join("study"))
}

#[test]
fn test_members_table() {
    let app = App::open(&StudyConfig::new()).unwrap();
    let output = app.run(&Command::Members).unwrap();
    for name in ["member1", "member4", "teamA", "teamB"] {
        assert!(output.contains(name), "missing {name} in\n{output}");
    }
}

#[test]
fn test_search_json() {
    let config = StudyConfig::new().with_format(OutputFormat::Json);
    let app = App::open(&config).unwrap();

    let output = app
        .run(&Command::Search {
            username: None,
            team: Some("teamB".into()),
            age_goe: Some(35),
            age_loe: None,
        })
        .unwrap();
    let rows: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(rows.as_array().map(Vec::len), Some(1));
    assert_eq!(rows[0]["username"], "member4");
    assert_eq!(rows[0]["team_name"], "teamB");
}

#[test]
fn test_page_json() {
    let config = StudyConfig::new().with_format(OutputFormat::Json);
    let app = App::open(&config).unwrap();

    let output = app.run(&Command::Page { offset: 1, limit: 2 }).unwrap();
    let page: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(page["total"], 4);
    assert_eq!(page["offset"], 1);
    assert_eq!(page["limit"], 2);
    assert_eq!(page["results"][0]["username"], "member2");
}

#[test]
fn test_negative_page_is_rejected() {
    let app = App::open(&StudyConfig::new()).unwrap();
    let result = app.run(&Command::Page { offset: -1, limit: 2 });
    assert!(result.is_err());
}

#[test]
fn test_bump_ages_persists_without_reseeding() {
    let dir = tempfile::tempdir().unwrap();
    {
        let app = App::open(&sled_config(&dir)).unwrap();
        let output = app
            .run(&Command::BumpAges {
                by: 5,
                below: Some(25),
            })
            .unwrap();
        assert_eq!(output, "2 row(s) affected");
    }

    let app = App::open(&sled_config(&dir)).unwrap();
    let repository = app.repository();
    assert_eq!(repository.count().unwrap(), 4);
    let ages: Vec<i32> = repository
        .find_all()
        .unwrap()
        .into_iter()
        .map(|m| m.age)
        .collect();
    assert_eq!(ages, vec![15, 25, 30, 40]);
}

#[test]
fn test_stats_table() {
    let app = App::open(&StudyConfig::new()).unwrap();
    let output = app.run(&Command::Stats).unwrap();
    assert!(output.contains("15.0"));
    assert!(output.contains("35.0"));
}
