//! End-to-end behaviour of the validator on small documents
use html_validate::core::Severity;
use html_validate::parser::{self, Event, EventKind};
use html_validate::rules::{Rule, RuleContext, RuleRegistry};
use html_validate::{Config, DocumentReport, HtmlValidate, MetaTable};

/// Reports every element carrying `class="foo"`
#[derive(Debug, Clone)]
struct FooRule;

impl Rule for FooRule {
    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Attr]
    }

    fn handle(&mut self, event: &Event, cx: &mut RuleContext<'_>) {
        let Event::Attr { target, key, value, .. } = event else {
            return;
        };
        if key.eq_ignore_ascii_case("class") && value.as_deref() == Some("foo") {
            cx.report(Some(*target), "foo is not allowed");
        }
    }
}

fn foo_engine() -> HtmlValidate {
    let mut registry = RuleRegistry::with_builtin_rules();
    registry.register("foo", |_, _| Ok(Box::new(FooRule)));
    let config = Config::empty()
        .with_rule("foo", Severity::Error)
        .with_rule("no-unused-disable", Severity::Error);
    HtmlValidate::with_registry(&config, &registry).expect("valid configuration")
}

fn validate_with(rules: &[&str], source: &str) -> DocumentReport {
    let config = rules
        .iter()
        .fold(Config::empty(), |config, rule| config.with_rule(rule, Severity::Error));
    HtmlValidate::new(&config)
        .expect("valid configuration")
        .validate_string(source, "inline.html")
}

fn messages(report: &DocumentReport) -> Vec<&str> {
    report.messages.iter().map(|m| m.message.as_str()).collect()
}

#[test]
fn test_unclosed_element() {
    let report = validate_with(&["close-order"], "<div>");
    assert_eq!(messages(&report), vec!["Unclosed element '<div>'"]);
    let message = &report.messages[0];
    assert_eq!(message.rule_id.as_deref(), Some("close-order"));
    assert_eq!((message.line, message.column, message.offset), (1, 1, 0));
    assert_eq!(message.selector.as_deref(), Some("div"));
}

#[test]
fn test_stray_end_tag() {
    let report = validate_with(&["close-order"], "</div>");
    assert_eq!(messages(&report), vec!["Stray end tag '</div>'"]);

    let meta = MetaTable::html5().unwrap();
    let (document, _) = parser::parse("</div>", "inline.html", &meta).unwrap();
    assert_eq!(document.elements().count(), 0);
}

#[test]
fn test_mismatched_close_and_unclosed() {
    let report = validate_with(&["close-order"], "<h1></div>");
    assert_eq!(
        messages(&report),
        vec![
            "Unclosed element '<h1>'",
            "Mismatched close-tag, expected '</h1>' but found '</div>'",
        ]
    );
    assert_eq!(report.messages[1].offset, 4);
}

#[test]
fn test_table_order_violation() {
    let report = validate_with(
        &["element-permitted-order"],
        "<table><thead></thead><caption></caption></table>",
    );
    assert_eq!(
        messages(&report),
        vec!["Element <caption> must be used before <thead> in this context"]
    );
    assert_eq!(report.messages[0].offset, 22);
    assert_eq!(report.messages[0].selector.as_deref(), Some("table > caption"));
}

#[test]
fn test_unknown_elements_skip_content_model() {
    let rules = [
        "element-permitted-content",
        "element-permitted-parent",
        "element-permitted-order",
        "element-permitted-occurrences",
        "element-required-content",
        "element-required-ancestor",
        "element-required-attributes",
    ];
    let report = validate_with(&rules, "<foo-bar><baz><li></li></baz></foo-bar>");
    assert!(messages(&report).is_empty(), "{:?}", report.messages);
}

#[test]
fn test_open_and_close_events_balance() {
    let meta = MetaTable::html5().unwrap();
    let sources = [
        "<div><p>text<span></div>",
        "<ul><li>a<li>b</ul></ol>",
        "<svg><circle/></svg><br><img/>",
        "<table><tr><td>1<td>2</table>",
    ];
    for source in sources {
        let (document, events) = parser::parse(source, "inline.html", &meta).unwrap();
        let count = |kind| events.iter().filter(|e| e.kind() == kind).count();
        assert_eq!(count(EventKind::TagOpen), count(EventKind::TagClose), "{}", source);
        for node in document.nodes().filter(|n| !n.is_root()) {
            let parent = node.parent.expect("every node has a parent");
            assert_eq!(
                document[parent].children.iter().filter(|&&c| c == node.id).count(),
                1
            );
        }
    }
}

#[test]
fn test_disable_next_without_violation() {
    let source = "<!-- [html-validate-disable-next foo] --><p></p>";
    let report = foo_engine().validate_string(source, "inline.html");

    assert_eq!(
        messages(&report),
        vec!["\"foo\" rule is disabled but no error was reported"]
    );
    let message = &report.messages[0];
    assert_eq!(message.rule_id.as_deref(), Some("no-unused-disable"));
    assert_eq!(message.offset, source.find("foo").unwrap());
    assert_eq!(message.size, 3);
}

#[test]
fn test_disable_next_with_violation() {
    let source = "<!-- [html-validate-disable-next foo] --><p class=\"foo\"></p>";
    let report = foo_engine().validate_string(source, "inline.html");
    assert!(report.messages.is_empty(), "{:?}", report.messages);
    assert!(report.valid);
}

#[test]
fn test_disable_next_only_covers_one_element() {
    let source = "<div><!-- [html-validate-disable-next foo] --><p class=\"foo\"></p><p class=\"foo\"></p></div>";
    let report = foo_engine().validate_string(source, "inline.html");
    assert_eq!(messages(&report), vec!["foo is not allowed"]);
    assert_eq!(report.messages[0].selector.as_deref(), Some("div > p:nth-child(2)"));
}

#[test]
fn test_custom_rule_severity() {
    let mut registry = RuleRegistry::new();
    registry.register("foo", |_, _| Ok(Box::new(FooRule)));
    let config = Config::empty().with_rule("foo", Severity::Warn);
    let engine = HtmlValidate::with_registry(&config, &registry).unwrap();

    let report = engine.validate_string("<b class=\"foo\"></b>", "inline.html");
    assert!(report.valid);
    assert_eq!(report.warning_count, 1);
    assert_eq!(report.messages[0].severity, Severity::Warn);
}

#[test]
fn test_same_input_twice_is_identical() {
    let engine = HtmlValidate::new(&Config::recommended()).unwrap();
    let source = std::fs::read_to_string("tests/fixtures/broken.html").unwrap();
    let first = engine.validate_string(&source, "broken.html");
    let second = engine.validate_string(&source, "broken.html");
    assert_eq!(first, second);
}

#[test]
fn test_sample_fixture_is_valid() {
    let engine = HtmlValidate::new(&Config::recommended()).unwrap();
    let report = engine
        .validate_file(std::path::Path::new("tests/fixtures/sample.html"))
        .unwrap();
    assert!(report.messages.is_empty(), "{:?}", report.messages);
}

#[test]
fn test_broken_fixture_rules() {
    let engine = HtmlValidate::new(&Config::recommended()).unwrap();
    let report = engine
        .validate_file(std::path::Path::new("tests/fixtures/broken.html"))
        .unwrap();

    let mut rules: Vec<&str> = report
        .messages
        .iter()
        .filter_map(|m| m.rule_id.as_deref())
        .collect();
    rules.sort_unstable();
    rules.dedup();
    for expected in [
        "close-order",
        "deprecated",
        "element-permitted-content",
        "element-permitted-parent",
        "no-dup-attr",
        "no-inline-style",
        "no-unused-disable",
    ] {
        assert!(rules.contains(&expected), "missing {} in {:?}", expected, rules);
    }
    assert!(!report.valid);

    let offsets: Vec<usize> = report.messages.iter().map(|m| m.offset).collect();
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    assert_eq!(offsets, sorted);
}
