use fieldsearch_core::{FieldValue, SitePrefix};
use fieldsearch_dom::{Document, MarkupError, NodeKind, NodeRef};
use fieldsearch_engine::{
    DateFormatter, FieldSearchError, Interpreter, MarkupImporter, Opcode, Operand, Program,
    ResultSlot, RunOutcome, SearchMode,
};
use fieldsearch_store_memory::MemoryStore;
use rstest::{fixture, rstest};
use std::sync::Arc;

const SITE: &str = "http://example.com/";

struct Output {
    document: Document,
    root: NodeRef,
}

#[fixture]
fn output() -> Output {
    let document = Document::new();
    let root = document.root().append_element("snap");
    Output { document, root }
}

#[fixture]
fn store() -> MemoryStore {
    MemoryStore::new(SITE)
        .with_field("page", "title", "Hello & welcome")
        .with_field("page", "modified", 1_700_000_000_000_000_i64)
        .with_field("page", "count", "  12 ")
        .with_field("page", "body", "<p>Some <b>bold</b> text</p>")
        .with_field("page", "broken", "<p>never closed")
        .with_field("page", "plain", "just words")
        .with_field("page", "escape", "a</fieldsearch-fragment><b>x</b><fieldsearch-fragment>")
}

fn program(steps: Vec<(Opcode, Operand)>) -> Program {
    let mut program = Program::new();
    for (opcode, operand) in steps {
        program.append(opcode, operand).unwrap();
    }
    program
}

fn interpreter(store: &MemoryStore) -> Interpreter {
    let store = Arc::new(store.clone());
    Interpreter::new(store.clone(), store)
}

fn run(
    store: &MemoryStore,
    output: &Output,
    steps: Vec<(Opcode, Operand)>,
) -> Result<RunOutcome, FieldSearchError> {
    interpreter(store).run(&program(steps), &SitePrefix::new(SITE), Some(output.root.clone()))
}

fn save(opcode: Opcode, field: &str, child: &str) -> Vec<(Opcode, Operand)> {
    vec![
        (Opcode::Mode, SearchMode::Each.into()),
        (Opcode::FieldName, field.into()),
        (Opcode::Path, "page".into()),
        (opcode, child.into()),
    ]
}

#[rstest]
fn save_writes_the_first_result_as_text(store: MemoryStore, output: Output) {
    let outcome = run(&store, &output, save(Opcode::Save, "title", "title")).unwrap();
    assert!(outcome.result.is_empty());
    assert_eq!(output.document.to_xml().unwrap(), "<snap><title>Hello &amp; welcome</title></snap>");
}

#[rstest]
fn save_creates_nested_elements_with_attributes(store: MemoryStore, output: Output) {
    run(&store, &output, save(Opcode::Save, "title", "desc[type=name][lang=en]/data")).unwrap();
    assert_eq!(
        output.document.to_xml().unwrap(),
        r#"<snap><desc type="name" lang="en"><data>Hello &amp; welcome</data></desc></snap>"#
    );
}

#[rstest]
fn save_rejects_unterminated_attribute_groups(store: MemoryStore, output: Output) {
    let error = run(&store, &output, save(Opcode::Save, "title", "desc[type=name/data")).unwrap_err();
    assert!(matches!(error, FieldSearchError::InvalidSequence(_)));
    assert_eq!(output.document.to_xml().unwrap(), "<snap/>");
}

#[rstest]
#[case("modified", "<snap><n>1700000000000000</n></snap>")]
#[case("count", "<snap><n>12</n></snap>")]
fn save_int64_writes_decimal_integers(
    store: MemoryStore,
    output: Output,
    #[case] field: &str,
    #[case] expected: &str,
) {
    run(&store, &output, save(Opcode::SaveInt64, field, "n")).unwrap();
    assert_eq!(output.document.to_xml().unwrap(), expected);
}

#[rstest]
fn save_int64_rejects_non_numeric_values(store: MemoryStore, output: Output) {
    let error = run(&store, &output, save(Opcode::SaveInt64, "title", "n")).unwrap_err();
    assert!(matches!(error, FieldSearchError::ValueConversion { target: "int64", .. }));
}

#[rstest]
fn save_int64_date_uses_the_date_formatter(store: MemoryStore, output: Output) {
    run(&store, &output, save(Opcode::SaveInt64Date, "modified", "modified")).unwrap();
    assert_eq!(output.document.to_xml().unwrap(), "<snap><modified>2023-11-14</modified></snap>");
}

#[rstest]
fn custom_date_formatter(store: MemoryStore, output: Output) {
    struct Seconds;
    impl DateFormatter for Seconds {
        fn format_date(&self, microseconds: i64) -> Option<String> {
            Some(format!("{}s", microseconds / 1_000_000))
        }
    }
    interpreter(&store)
        .with_date_formatter(Arc::new(Seconds))
        .run(
            &program(save(Opcode::SaveInt64Date, "modified", "at")),
            &SitePrefix::new(SITE),
            Some(output.root.clone()),
        )
        .unwrap();
    assert_eq!(output.document.to_xml().unwrap(), "<snap><at>1700000000s</at></snap>");
}

#[rstest]
fn save_xml_imports_markup(store: MemoryStore, output: Output) {
    run(&store, &output, save(Opcode::SaveXml, "body", "body")).unwrap();
    assert_eq!(
        output.document.to_xml().unwrap(),
        "<snap><body><p>Some <b>bold</b> text</p></body></snap>"
    );
    let body = output.root.child_element("body").unwrap();
    assert_eq!(body.text_content(), "Some bold text");
}

#[rstest]
fn save_xml_without_markup_is_a_single_text_node(store: MemoryStore, output: Output) {
    run(&store, &output, save(Opcode::SaveXml, "plain", "plain")).unwrap();
    let children = output.root.child_element("plain").unwrap().children();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].kind(), NodeKind::Text("just words".to_owned()));
}

#[rstest]
fn save_xml_falls_back_to_text_on_malformed_markup(store: MemoryStore, output: Output) {
    let outcome = run(&store, &output, save(Opcode::SaveXml, "broken", "body")).unwrap();
    assert_eq!(
        output.document.to_xml().unwrap(),
        "<snap><body>&lt;p&gt;never closed</body></snap>"
    );
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].message.starts_with("body: saved as text"));
}

#[rstest]
fn save_xml_keeps_markup_that_closes_the_fragment_as_text(store: MemoryStore, output: Output) {
    let outcome = run(&store, &output, save(Opcode::SaveXml, "escape", "body")).unwrap();
    let body = output.root.child_element("body").unwrap();
    assert_eq!(body.text_content(), "a</fieldsearch-fragment><b>x</b><fieldsearch-fragment>");
    assert!(body.child_element("b").is_none());
    assert_eq!(outcome.warnings.len(), 1);
}

#[rstest]
fn custom_markup_importer(store: MemoryStore, output: Output) {
    struct Shouting;
    impl MarkupImporter for Shouting {
        fn import_fragment(&self, parent: &NodeRef, markup: &str) -> Result<(), MarkupError> {
            parent.append_text(&markup.to_uppercase());
            Ok(())
        }
    }
    interpreter(&store)
        .with_markup_importer(Arc::new(Shouting))
        .run(
            &program(save(Opcode::SaveXml, "plain", "p")),
            &SitePrefix::new(SITE),
            Some(output.root.clone()),
        )
        .unwrap();
    assert_eq!(output.document.to_xml().unwrap(), "<snap><p>JUST WORDS</p></snap>");
}

#[rstest]
#[case(Opcode::Save)]
#[case(Opcode::SaveInt64)]
#[case(Opcode::SaveInt64Date)]
#[case(Opcode::SaveXml)]
fn saves_without_result_or_cursor_do_nothing(store: MemoryStore, #[case] opcode: Opcode) {
    let empty = Output { document: Document::new(), root: Document::new().root() };
    let outcome = run(&store, &empty, save(opcode, "missing", "x")).unwrap();
    assert!(outcome.result.is_empty());
    assert_eq!(empty.root.children().len(), 0);

    let outcome = interpreter(&store)
        .run(&program(save(opcode, "modified", "x")), &SitePrefix::new(SITE), None)
        .unwrap();
    assert_eq!(outcome.result, vec![FieldValue::Integer(1_700_000_000_000_000)]);
}

#[rstest]
fn cursor_moves_and_sets_attributes(store: MemoryStore, output: Output) {
    run(
        &store,
        &output,
        vec![
            (Opcode::ChildElement, "page".into()),
            (Opcode::ElementAttr, "lang=fr".into()),
            (Opcode::ElementAttr, "checked".into()),
            (Opcode::ChildElement, "inner".into()),
            (Opcode::ParentElement, Operand::None),
            (Opcode::ChildElement, "sibling".into()),
            (Opcode::ParentElement, Operand::None),
            (Opcode::ParentElement, Operand::None),
            (Opcode::ChildElement, "last".into()),
        ],
    )
    .unwrap();
    assert_eq!(
        output.document.to_xml().unwrap(),
        r#"<snap><page lang="fr" checked="checked"><inner/><sibling/></page><last/></snap>"#
    );
}

#[rstest]
fn empty_element_and_attribute_names_are_skipped(store: MemoryStore, output: Output) {
    let outcome = run(
        &store,
        &output,
        vec![
            (Opcode::ChildElement, "".into()),
            (Opcode::ElementAttr, "=v".into()),
            (Opcode::ElementAttr, "".into()),
            (Opcode::ChildElement, "x".into()),
            (Opcode::ElementAttr, "k=v".into()),
        ],
    )
    .unwrap();
    assert_eq!(output.document.to_xml().unwrap(), r#"<snap><x k="v"/></snap>"#);
    let messages: Vec<_> = outcome.warnings.iter().map(|w| w.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "CHILD_ELEMENT ignored: empty element name",
            "ELEMENT_ATTR \"=v\" ignored: empty attribute name",
            "ELEMENT_ATTR \"\" ignored: empty attribute name",
        ]
    );
}

#[rstest]
fn leaving_the_document_element_drops_the_cursor(store: MemoryStore, output: Output) {
    run(
        &store,
        &output,
        vec![
            (Opcode::ParentElement, Operand::None),
            (Opcode::ChildElement, "lost".into()),
            (Opcode::ElementAttr, "a=b".into()),
            (Opcode::Element, output.root.clone().into()),
            (Opcode::ChildElement, "found".into()),
        ],
    )
    .unwrap();
    assert_eq!(output.document.to_xml().unwrap(), "<snap><found/></snap>");
}

#[rstest]
fn result_copies_matches_into_the_slot(store: MemoryStore, output: Output) {
    let slot = ResultSlot::new();
    run(
        &store,
        &output,
        vec![
            (Opcode::Mode, SearchMode::Paths.into()),
            (Opcode::FieldName, "title".into()),
            (Opcode::Path, "page".into()),
            (Opcode::SelfNode, Operand::None),
            (Opcode::Result, slot.clone().into()),
            (Opcode::Reset, Operand::None),
        ],
    )
    .unwrap();
    let expected = FieldValue::from(format!("{SITE}page"));
    assert_eq!(slot.values(), vec![expected.clone(), expected]);
}

#[rstest]
fn variables_feed_field_names(store: MemoryStore, output: Output) {
    let store = store.with_field("settings", "lang", "fr").with_field("page", "title::fr", "Bonjour");
    let outcome = run(
        &store,
        &output,
        vec![
            (Opcode::Mode, SearchMode::Each.into()),
            (Opcode::FieldName, "lang".into()),
            (Opcode::Path, "settings".into()),
            (Opcode::LastResultToVar, "lang".into()),
            (Opcode::FieldNameWithVars, "title::${lang}".into()),
            (Opcode::Path, "page".into()),
        ],
    )
    .unwrap();
    assert_eq!(outcome.result, vec![FieldValue::from("Bonjour")]);
}

#[rstest]
fn last_result_to_var_needs_a_result(store: MemoryStore, output: Output) {
    let error = run(&store, &output, vec![(Opcode::LastResultToVar, "x".into())]).unwrap_err();
    assert!(matches!(error, FieldSearchError::InvalidSequence(_)));
}
