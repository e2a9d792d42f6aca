//! End-to-end tests for choice validation and part resolution
//!
//! Exercises the public API the way a project loader does: build a catalog,
//! validate raw answers, resolve part effects.

use std::collections::BTreeSet;

use stepcvt::{
    raw_answers, resolve, CadSource, Catalog, CatalogError, Choice, ChoiceValue, Effect,
    Expression, ParseError, PartDefaults, PartInfo, PartState, Project, RawAnswer, StepcvtError,
    ValidationError,
};

// =============================================================================
// Fixtures
// =============================================================================

fn expr(text: &str) -> Expression {
    Expression::parse(text).expect("fixture expression should parse")
}

fn nevermore_catalog() -> Catalog {
    Catalog::new(vec![
        Choice::single(
            "Nevermore model",
            "NevermoreModel",
            vec![ChoiceValue::id("V4"), ChoiceValue::id("V6")],
        ),
        Choice::multi(
            "Optional Printer Features",
            "PrinterOptions",
            vec![
                ChoiceValue::new("HEPA Filter", "Filter"),
                ChoiceValue::id("Lights"),
                ChoiceValue::new("Light controller", "LightsCtrl")
                    .with_precondition(expr("Lights in PrinterOptions")),
            ],
        ),
    ])
    .expect("catalog should build")
}

fn zero_defaults() -> PartDefaults {
    PartDefaults {
        selected: false,
        count: 0,
        scale: 1.0,
    }
}

fn duct_effects() -> Vec<Effect> {
    vec![
        Effect::selection(expr("Lights in PrinterOptions")),
        Effect::relative_count(expr("Filter in PrinterOptions"), 2),
        Effect::absolute_count(expr("NevermoreModel == 'V4'"), 5),
    ]
}

// =============================================================================
// Expression
// =============================================================================

#[test]
fn free_variables_of_compound_expression() {
    let e = expr("NevermoreModel == 'V6' and 'Filter' in PrinterOptions");
    let expected: BTreeSet<String> = ["NevermoreModel", "PrinterOptions"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(e.free_variables(), expected);
}

#[test]
fn bare_and_quoted_membership_agree() {
    let catalog = nevermore_catalog();
    let answers = catalog
        .validate(&raw_answers([
            ("NevermoreModel", RawAnswer::from("V4")),
            ("PrinterOptions", ["Filter"].into()),
        ]))
        .unwrap();
    for (bare, quoted) in [
        ("Filter in PrinterOptions", "'Filter' in PrinterOptions"),
        ("Lights in PrinterOptions", "\"Lights\" in PrinterOptions"),
        ("PrinterOptions contains Filter", "PrinterOptions contains 'Filter'"),
    ] {
        assert_eq!(
            expr(bare).evaluate(&answers).unwrap(),
            expr(quoted).evaluate(&answers).unwrap(),
            "{bare}"
        );
        assert_eq!(expr(bare).free_variables(), expr(quoted).free_variables());
    }
}

#[test]
fn injection_attempts_are_parse_errors() {
    let attempts = [
        "__import__('os').system('rm -rf /')",
        "exec('print(1)')",
        "NevermoreModel == 'V6'; import os",
        "lambda: True",
        "[x for x in PrinterOptions]",
        "NevermoreModel.__class__",
        "open('/etc/passwd').read()",
        "NevermoreModel == 'V6' or eval(\"1\")",
        "",
    ];
    for text in attempts {
        let result: Result<Expression, ParseError> = Expression::parse(text);
        assert!(result.is_err(), "accepted {text:?}");
    }
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn validation_accepts_lights_without_controller() {
    let catalog = nevermore_catalog();
    let raw = raw_answers([
        ("NevermoreModel", RawAnswer::from("V4")),
        ("PrinterOptions", ["Lights"].into()),
    ]);
    let answers = catalog.validate(&raw).unwrap();
    assert_eq!(answers.len(), 2);
    assert!(answers.get("PrinterOptions").unwrap().contains("Lights"));
}

#[test]
fn validation_rejects_controller_without_lights() {
    let catalog = nevermore_catalog();
    let raw = raw_answers([("PrinterOptions", ["LightsCtrl"])]);
    let err = catalog.validate(&raw).unwrap_err();
    match err {
        ValidationError::PreconditionFailed {
            varname, value_id, ..
        } => {
            assert_eq!(varname, "PrinterOptions");
            assert_eq!(value_id, "LightsCtrl");
        }
        other => panic!("expected PreconditionFailed, got {other:?}"),
    }
}

#[test]
fn cyclic_preconditions_fail_at_construction() {
    let result = Catalog::new(vec![
        Choice::single(
            "A",
            "A",
            vec![ChoiceValue::id("a").with_precondition(expr("B == 'b'"))],
        ),
        Choice::single(
            "B",
            "B",
            vec![ChoiceValue::id("b").with_precondition(expr("A == 'a'"))],
        ),
    ]);
    assert_eq!(
        result.unwrap_err(),
        CatalogError::CyclicDependency {
            varnames: vec!["A".to_string(), "B".to_string()]
        }
    );
}

#[test]
fn undeclared_variable_commits_nothing() {
    let mut project = Project::new("nevermore")
        .with_catalog(nevermore_catalog())
        .with_source(
            CadSource::new("body", "body.step")
                .with_part(PartInfo::new("duct", zero_defaults()).with_effect(Effect::selection(expr("True")))),
        );
    let before = project.clone();

    let raw = raw_answers([("NevermoreModel", RawAnswer::from("V4")), ("Color", "Red".into())]);
    let err = project.apply_choices(&raw).unwrap_err();
    assert!(matches!(
        err,
        StepcvtError::Validation(ValidationError::UnknownVariable { ref varname }) if varname == "Color"
    ));
    assert_eq!(project, before);
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn absolute_count_overrides_relative() {
    let catalog = nevermore_catalog();
    let answers = catalog
        .validate(&raw_answers([
            ("NevermoreModel", RawAnswer::from("V4")),
            ("PrinterOptions", ["Filter", "Lights"].into()),
        ]))
        .unwrap();

    let state = resolve(&zero_defaults(), &duct_effects(), &answers).unwrap();
    assert_eq!(
        state,
        PartState {
            selected: true,
            count: 5,
            scale: 1.0
        }
    );
}

#[test]
fn repeated_application_does_not_drift() {
    let catalog = nevermore_catalog();
    let mut project = Project::new("nevermore").with_catalog(catalog).with_source(
        CadSource::new("body", "body.step").with_part(
            PartInfo::new("duct", zero_defaults())
                .with_effect(Effect::relative_count(expr("'Filter' in PrinterOptions"), 2)),
        ),
    );
    let v6 = raw_answers([
        ("NevermoreModel", RawAnswer::from("V6")),
        ("PrinterOptions", ["Filter"].into()),
    ]);
    let v4 = raw_answers([
        ("NevermoreModel", RawAnswer::from("V4")),
        ("PrinterOptions", Vec::<String>::new().into()),
    ]);

    for _ in 0..3 {
        project.apply_choices(&v6).unwrap();
    }
    assert_eq!(project.parts().next().unwrap().1.count, 2);

    project.apply_choices(&v4).unwrap();
    assert_eq!(project.parts().next().unwrap().1.count, 0);

    project.apply_choices(&v6).unwrap();
    assert_eq!(project.parts().next().unwrap().1.count, 2);
}

#[test]
fn project_loaded_from_json_resolves() {
    let json = r#"{
        "type": "Project",
        "name": "nevermore",
        "available_choices": [
            {"type": "SingleChoice", "text": "Model", "varname": "NevermoreModel",
             "values": [{"type": "ChoiceValue", "display_text": "V4", "value_id": "V4"},
                        {"type": "ChoiceValue", "display_text": "V6", "value_id": "V6"}]}
        ],
        "sources": [
            {"type": "CADSource", "name": "body", "path": "body.step",
             "partinfo": [
                {"type": "PartInfo", "part_id": "v6_lid",
                 "defaults": {"selected": false, "count": 1, "scale": 1.0},
                 "effects": [{"type": "SelectionEffect", "cond": "NevermoreModel == 'V6'"}],
                 "info": [{"type": "TextInfo", "text": "print in ABS"}]}
             ]}
        ]
    }"#;
    let mut project: Project = serde_json::from_str(json).unwrap();
    project
        .apply_choices(&raw_answers([("NevermoreModel", "V6")]))
        .unwrap();

    let (source, lid) = project.parts().next().unwrap();
    assert_eq!(source, "body");
    assert!(lid.selected);
    assert_eq!(lid.count, 1);
}
