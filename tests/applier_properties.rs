//! End-to-end properties of the patch engine: wire text in, document out.

use artifact_patcher::{
    parse_edits, ApplyOptions, Document, Edit, EditOutcome, FailureKind, MatchOptions, Matcher,
    PatchApplier, StrategyKind,
};
use proptest::prelude::*;

const TASKS_APP: &str = r#"import React, { useState } from "react";

function TodoItem({ todo, onToggle }) {
  return (
    <li onClick={() => onToggle(todo.id)}>
      {todo.done ? "[x]" : "[ ]"} {todo.title}
    </li>
  );
}

function TodoList({ todos, onToggle }) {
  return (
    <ul>
      {todos.map((todo) => (
        <TodoItem key={todo.id} todo={todo} onToggle={onToggle} />
      ))}
    </ul>
  );
}

export default function App() {
  const [todos, setTodos] = useState([]);
  const toggle = (id) =>
    setTodos(todos.map((t) => (t.id === id ? { ...t, done: !t.done } : t)));
  return (
    <div className="app">
      <h1>Todos</h1>
      <TodoList todos={todos} onToggle={toggle} />
    </div>
  );
}
"#;

#[test]
fn wire_text_applies_end_to_end() {
    let reply = r#"Here is the change:

<<<<<<< SEARCH
      <h1>Todos</h1>
=======
      <h1>My Todos</h1>
>>>>>>> REPLACE

<<<<<<< SEARCH
    <ul>
=======
    <ul className="todo-list">
>>>>>>> REPLACE
"#;
    let edits = parse_edits(reply).unwrap();
    let mut document = Document::new(TASKS_APP);
    let stats = PatchApplier::default().apply(&mut document, &edits, &ApplyOptions::default());

    assert_eq!((stats.total, stats.succeeded, stats.failed), (2, 2, 0));
    assert!(document.text().contains("<h1>My Todos</h1>"));
    assert!(document.text().contains("<ul className=\"todo-list\">"));
    assert_eq!(document.original(), TASKS_APP);
}

#[test]
fn exact_copy_is_located_with_full_score() {
    let span = Matcher::default()
        .locate(TASKS_APP, "const [todos, setTodos] = useState([]);", &MatchOptions::default())
        .unwrap();
    assert_eq!(span.strategy, StrategyKind::Exact);
    assert_eq!(span.score, 1.0);
    assert_eq!(
        &TASKS_APP[span.byte_range()],
        "const [todos, setTodos] = useState([]);"
    );
}

#[test]
fn removing_a_used_component_is_rejected() {
    let reply = "<<<<<<< DEFINITION TodoItem\n\n>>>>>>> END\n";
    let edits = parse_edits(reply).unwrap();
    let mut document = Document::new(TASKS_APP);
    let stats = PatchApplier::default().apply(&mut document, &edits, &ApplyOptions::default());

    assert_eq!(stats.succeeded, 0);
    assert_eq!(stats.failures[0].kind, FailureKind::ValidationRejected);
    assert_eq!(document.text(), TASKS_APP);
    assert!(!document.is_modified());
}

#[test]
fn partial_success_counts_each_edit() {
    let edits = vec![
        Edit::new("<h1>Todos</h1>", "<h1>Tasks</h1>"),
        Edit::new("function Sidebar() { return <aside />; }", "function Sidebar() { return null; }"),
        Edit::new("className=\"app\"", "className=\"app dark\""),
    ];
    let (text, stats) = PatchApplier::default().apply_text(TASKS_APP, &edits, &ApplyOptions::default());

    assert_eq!((stats.total, stats.succeeded, stats.failed), (3, 2, 1));
    assert_eq!(stats.failures[0].edit_index, Some(1));
    assert_eq!(stats.failures[0].kind, FailureKind::MatchNotFound);
    assert!(text.contains("<h1>Tasks</h1>"));
    assert!(text.contains("className=\"app dark\""));
    assert!(!text.contains("Sidebar"));
}

#[test]
fn boundary_duplicate_appears_once() {
    let (text, stats) = PatchApplier::default().apply_text(
        "A\nEND\nrest",
        &[Edit::new("A", "A2\nEND")],
        &ApplyOptions::default(),
    );
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.warnings.len(), 1);
    assert_eq!(text, "A2\nEND\nrest");
    assert_eq!(text.matches("END").count(), 1);
}

#[test]
fn relaxed_mode_accepts_weaker_alignment() {
    let words = [
        "apple", "banana", "cherry", "damson", "elder", "fig", "grape", "hazel", "ilama",
        "jujube", "kiwi", "lemon", "mango", "nectar", "olive", "papaya", "quince", "raisin",
        "satsuma", "tomato",
    ];
    let mut drifted = words.to_vec();
    for (slot, other) in [1, 3, 5, 8, 11, 14, 17]
        .into_iter()
        .zip(["zx1", "zx2", "zx3", "zx4", "zx5", "zx6", "zx7"])
    {
        drifted[slot] = other;
    }
    let source = format!("before stuff\n{}\nafter stuff\n", drifted.join(" "));
    let search = words.join(" ");
    let matcher = Matcher::default();

    assert!(matcher.locate(&source, &search, &MatchOptions::default()).is_err());

    let relaxed = MatchOptions {
        relaxed: true,
        ..MatchOptions::default()
    };
    let span = matcher.locate(&source, &search, &relaxed).unwrap();
    assert_eq!(span.strategy, StrategyKind::AnchoredFuzzy);
    assert!((span.score - 0.65).abs() < 1e-9);
}

#[test]
fn scope_targets_pick_the_named_declaration() {
    let source = "function Header() {\n  const label = \"Home\";\n  return label;\n}\n\nfunction Footer() {\n  const label = \"Home\";\n  return label;\n}\n";
    let edit = Edit::new("const label = \"Home\";", "const label = \"Contact\";");
    let (text, stats) =
        PatchApplier::default().apply_text(source, &[edit], &ApplyOptions::scoped(["Footer"]));

    assert_eq!(stats.succeeded, 1);
    let footer = text.find("function Footer").unwrap();
    assert!(text[..footer].contains("\"Home\""));
    assert!(text[footer..].contains("\"Contact\""));
}

#[test]
fn scope_wins_over_a_better_copy_elsewhere() {
    let source = "function Bar({ items }) {\n  const total = items.reduce((sum, item) => sum + item.price, 0);\n  return total;\n}\n\nfunction Foo({ items }) {\n  const total = items.reduce((sum, item) => sum + item.cost, 0);\n  return total;\n}\n";
    let edit = Edit::new(
        "const total = items.reduce((sum, item) => sum + item.price, 0);",
        "const total = items.reduce((sum, item) => sum + item.amount, 0);",
    );
    let (text, stats) =
        PatchApplier::default().apply_text(source, &[edit], &ApplyOptions::scoped(["Foo"]));

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.reports[0].strategy, Some(StrategyKind::AnchoredFuzzy));
    let foo = text.find("function Foo").unwrap();
    assert!(text[..foo].contains("item.price"));
    assert!(text[foo..].contains("item.amount"));
    assert!(!text[foo..].contains("item.cost"));
}

#[test]
fn partial_hint_does_not_override_exact_copy() {
    let source = "a();\nb();\nc();\nd();\nlet filler = 1;\nlet more = 2;\na();\nb();\nc();\nx9();\n";
    let edit = Edit::new("a();\nb();\nc();\nx9();", "a();\nb();\nc();\ny9();")
        .with_line_hint(artifact_patcher::LineHint::new(1, Some(4)));
    let (text, stats) = PatchApplier::default().apply_text(source, &[edit], &ApplyOptions::default());

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.reports[0].strategy, Some(StrategyKind::Exact));
    assert!(text.starts_with("a();\nb();\nc();\nd();\n"));
    assert!(text.contains("y9();"));
    assert!(!text.contains("x9();"));
}

#[test]
fn line_hint_resolves_repeated_snippets() {
    let source = "let a = 0;\nreset();\nlet b = 0;\nreset();\n";
    let edit = Edit::new("reset();", "resetAll();").with_line_hint(artifact_patcher::LineHint::new(4, None));
    let (text, stats) = PatchApplier::default().apply_text(source, &[edit], &ApplyOptions::default());

    assert_eq!(stats.reports[0].strategy, Some(StrategyKind::LineHint));
    assert_eq!(text, "let a = 0;\nreset();\nlet b = 0;\nresetAll();\n");
}

const STATEMENTS: &[&str] = &[
    "const a = 1;",
    "let total = a + 2;",
    "function Card() { return null; }",
    "console.log(total);",
    "export const LIMIT = 10;",
    "if (total > LIMIT) { total = LIMIT; }",
    "// a comment line",
    "const items = [1, 2, 3].map((n) => n * 2);",
];

proptest! {
    #[test]
    fn noop_edits_leave_document_identical(
        lines in prop::collection::vec(prop::sample::select(STATEMENTS), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let text = lines.join("\n") + "\n";
        let search = pick.get(&lines).to_string();
        let mut document = Document::new(text.clone());

        let stats = PatchApplier::default().apply(
            &mut document,
            &[Edit::new(search.clone(), search)],
            &ApplyOptions::default(),
        );

        prop_assert_eq!(stats.succeeded, 1);
        prop_assert_eq!(stats.reports[0].outcome, EditOutcome::Unchanged);
        prop_assert_eq!(document.text(), text.as_str());
    }
}
