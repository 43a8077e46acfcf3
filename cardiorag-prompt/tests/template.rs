use std::collections::HashMap;

use cardiorag_core::{CardioError, Value};
use cardiorag_prompt::PromptTemplate;

#[test]
fn renders_template_with_vars() {
    let tmpl = PromptTemplate::new("Question: {{ question }}");
    let mut vars = HashMap::new();
    vars.insert("question".to_string(), Value::from("Which accounts post about statins?"));
    let rendered = tmpl.render(&vars).expect("render");
    assert_eq!(rendered, "Question: Which accounts post about statins?");
}

#[test]
fn does_not_confuse_overlapping_keys() {
    let tmpl = PromptTemplate::new("{{name}} {{fullname}}");
    let mut vars = HashMap::new();
    vars.insert("name".to_string(), Value::from("X"));
    vars.insert("fullname".to_string(), Value::from("Y"));
    let rendered = tmpl.render(&vars).expect("render");
    assert_eq!(rendered, "X Y");
}

#[test]
fn missing_variable_is_an_error() {
    let tmpl = PromptTemplate::new("Schema:\n{{schema}}\nQuestion: {{question}}");
    let mut vars = HashMap::new();
    vars.insert("question".to_string(), Value::from("q"));
    let err = tmpl.render(&vars).unwrap_err();
    assert!(matches!(err, CardioError::InvalidInput(msg) if msg.contains("schema")));
}

#[test]
fn single_braces_are_left_alone() {
    let tmpl = PromptTemplate::new("MATCH (a:Author {name: 'x'}) RETURN a -- {{note}}");
    let mut vars = HashMap::new();
    vars.insert("note".to_string(), Value::from(3));
    let rendered = tmpl.render(&vars).expect("render");
    assert_eq!(rendered, "MATCH (a:Author {name: 'x'}) RETURN a -- 3");
    assert_eq!(tmpl.variables().into_iter().collect::<Vec<_>>(), vec!["note"]);
}
