use std::fs;
use std::path::{Path, PathBuf};

use onepager_core::{
    MappingRule, Record, RecordSet, TEMPLATE_EXTENSION, TemplateSet, default_rules,
    scan_templates,
};
use onepager_plan::{GenerationRequest, PlanError, PlanOptions, plan_jobs};

fn temp_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("onepager_plan_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn template_root(label: &str, files: &[&str]) -> (PathBuf, TemplateSet) {
    let root = temp_dir(label);
    for file in files {
        let path = root.join(file);
        fs::create_dir_all(path.parent().expect("parent")).expect("create language dir");
        fs::write(&path, b"stub").expect("write template");
    }
    let set = scan_templates(&root, TEMPLATE_EXTENSION);
    (root, set)
}

fn row(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn records(columns: &[&str], rows: Vec<Record>) -> RecordSet {
    RecordSet::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

fn request(
    records: RecordSet,
    previous_year: Option<RecordSet>,
    root: &Path,
    languages: &[&str],
    options: PlanOptions,
) -> GenerationRequest {
    let languages: Vec<String> = languages.iter().map(|l| l.to_string()).collect();
    GenerationRequest::new(
        records,
        previous_year,
        root.to_path_buf(),
        root.join("out"),
        &languages,
        &default_rules(),
        &[],
        options,
    )
    .expect("build request")
}

fn acme() -> RecordSet {
    records(
        &["Nom du client", "JJ/MM/AAAA"],
        vec![row(&[("Nom du client", "Acme"), ("JJ/MM/AAAA", "01/01/2026")])],
    )
}

#[test]
fn one_record_two_languages_yields_two_jobs() {
    let (root, templates) = template_root("two_languages", &["FR/deck.pptx", "EN/deck.pptx"]);
    let request = request(acme(), None, &root, &["FR", "EN"], PlanOptions::default());

    let plan = plan_jobs(&request, &templates).expect("plan");

    assert_eq!(plan.len(), 2);
    assert_eq!(plan.jobs[0].language, "FR");
    assert_eq!(plan.jobs[1].language, "EN");
    assert_eq!(request.mapping.tag_for("Nom du client"), Some("<<NOM CLIENT>>"));
    assert_eq!(request.mapping.tag_for("JJ/MM/AAAA"), Some("<<[JJ/MM/AAAA]>>"));
    assert_ne!(plan.jobs[0].destination, plan.jobs[1].destination);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn absent_language_contributes_no_jobs() {
    let (root, templates) = template_root("absent", &["FR/deck.pptx"]);
    let request = request(acme(), None, &root, &["DE", "FR"], PlanOptions::default());

    let plan = plan_jobs(&request, &templates).expect("plan");

    assert_eq!(plan.len(), 1);
    assert_eq!(plan.languages, vec!["FR"]);
    assert_eq!(plan.missing_languages, vec!["DE"]);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn no_available_language_is_a_configuration_error() {
    let (root, templates) = template_root("no_language", &["FR/deck.pptx"]);
    let request = request(acme(), None, &root, &["IT"], PlanOptions::default());

    assert!(matches!(
        plan_jobs(&request, &templates),
        Err(PlanError::NoLanguages { .. })
    ));

    fs::remove_dir_all(&root).ok();
}

#[test]
fn order_follows_language_template_record() {
    let (root, templates) = template_root(
        "ordering",
        &["FR/a.pptx", "FR/b.pptx", "EN/a.pptx"],
    );
    let set = records(
        &["Nom du client"],
        vec![row(&[("Nom du client", "One")]), row(&[("Nom du client", "Two")])],
    );
    let request = request(set, None, &root, &["EN", "FR"], PlanOptions::default());

    let first = plan_jobs(&request, &templates).expect("plan");
    let order: Vec<(String, String, String)> = first
        .jobs
        .iter()
        .map(|job| {
            (
                job.language.clone(),
                job.template_name(),
                job.record["Nom du client"].clone(),
            )
        })
        .collect();

    let expected = [
        ("EN", "a.pptx", "One"),
        ("EN", "a.pptx", "Two"),
        ("FR", "a.pptx", "One"),
        ("FR", "a.pptx", "Two"),
        ("FR", "b.pptx", "One"),
        ("FR", "b.pptx", "Two"),
    ];
    let expected: Vec<(String, String, String)> = expected
        .iter()
        .map(|(l, t, r)| (l.to_string(), t.to_string(), r.to_string()))
        .collect();
    assert_eq!(order, expected);
    for (position, job) in first.jobs.iter().enumerate() {
        assert_eq!(job.index, position);
    }

    let second = plan_jobs(&request, &templates).expect("replan");
    let destinations = |plan: &onepager_plan::JobPlan| -> Vec<PathBuf> {
        plan.jobs.iter().map(|job| job.destination.clone()).collect()
    };
    assert_eq!(destinations(&first), destinations(&second));

    fs::remove_dir_all(&root).ok();
}

#[test]
fn previous_year_record_is_attached_without_extra_jobs() {
    let (root, templates) = template_root("previous_year", &["FR/deck.pptx"]);
    let current = records(
        &["Nom du client", "Score"],
        vec![
            row(&[("Nom du client", "Acme"), ("Score", "9")]),
            row(&[("Nom du client", "Globex"), ("Score", "7")]),
        ],
    );
    let previous = records(
        &["Nom du client", "Score"],
        vec![row(&[("Nom du client", "Acme"), ("Score", "5")])],
    );
    let request = request(current, Some(previous), &root, &["FR"], PlanOptions::default());

    let plan = plan_jobs(&request, &templates).expect("plan");

    assert_eq!(plan.len(), 2);
    let acme_previous = plan.jobs[0].previous_year.as_ref().expect("acme matched");
    assert_eq!(acme_previous["Score"], "5");
    assert!(plan.jobs[1].previous_year.is_none());
    assert_eq!(
        request.mapping.tag_for("previous_year.Score"),
        Some("<<PY Score>>")
    );

    fs::remove_dir_all(&root).ok();
}

#[test]
fn duplicate_records_get_distinct_destinations() {
    let (root, templates) = template_root("duplicates", &["FR/deck.pptx"]);
    let set = records(
        &["Nom du client"],
        vec![row(&[("Nom du client", "Acme")]), row(&[("Nom du client", "Acme")])],
    );
    let request = request(set, None, &root, &["FR"], PlanOptions::default());

    let plan = plan_jobs(&request, &templates).expect("plan");

    assert_eq!(plan.len(), 2);
    assert_ne!(plan.jobs[0].destination, plan.jobs[1].destination);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn row_filters_apply_only_when_enabled() {
    let (root, templates) = template_root(
        "filters",
        &["FR/OP_PM_Q.pptx", "FR/OP_PM_RM_Q.pptx"],
    );
    let set = records(
        &["Nom du client", "PM only or PM-RM"],
        vec![
            row(&[("Nom du client", "Acme"), ("PM only or PM-RM", "PM only")]),
            row(&[("Nom du client", "Globex"), ("PM only or PM-RM", "PM-RM")]),
            row(&[("Nom du client", "Initech"), ("PM only or PM-RM", "Do not generate OP")]),
        ],
    );

    let unfiltered = request(set.clone(), None, &root, &["FR"], PlanOptions::default());
    assert_eq!(plan_jobs(&unfiltered, &templates).expect("plan").len(), 6);

    let options = PlanOptions {
        apply_row_filters: true,
        ..PlanOptions::default()
    };
    let filtered = request(set, None, &root, &["FR"], options);
    let plan = plan_jobs(&filtered, &templates).expect("plan");
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.filtered, 4);
    assert_eq!(plan.jobs[0].record["Nom du client"], "Acme");
    assert_eq!(plan.jobs[1].record["Nom du client"], "Globex");

    fs::remove_dir_all(&root).ok();
}

#[test]
fn fully_filtered_plan_is_a_configuration_error() {
    let (root, templates) = template_root("all_filtered", &["FR/deck.pptx"]);
    let set = records(
        &["PM only or PM-RM"],
        vec![row(&[("PM only or PM-RM", "Do not generate OP")])],
    );
    let options = PlanOptions {
        apply_row_filters: true,
        ..PlanOptions::default()
    };
    let request = request(set, None, &root, &["FR"], options);

    assert!(matches!(plan_jobs(&request, &templates), Err(PlanError::NoJobs)));

    fs::remove_dir_all(&root).ok();
}

#[test]
fn user_rules_flow_into_the_request_mapping() {
    let root = temp_dir("user_rules");
    let languages = vec!["FR".to_string()];
    let user = vec![MappingRule::new("", "<<X>>")];

    let result = GenerationRequest::new(
        acme(),
        None,
        root.clone(),
        root.join("out"),
        &languages,
        &default_rules(),
        &user,
        PlanOptions::default(),
    );
    assert!(matches!(result, Err(PlanError::Mapping(_))));

    fs::remove_dir_all(&root).ok();
}
