use zahouse_core::prompt::{
    assemble, estimate_tokens, fit_history, format_search_results, truncate_chars, PromptBudget,
    PromptInputs, AUDIT_INSTRUCTIONS, DEFAULT_AUDIT_MESSAGE, PERSONA,
};
use zahouse_core::{ChatTurn, Mode, Role, SearchResult};

fn roomy() -> PromptBudget {
    PromptBudget {
        total_chars: 1_000_000,
        doc_chars: 20_000,
        kb_chars: 12_000,
        search_chars: 4_000,
    }
}

fn inputs<'a>(
    mode: Mode,
    knowledge: &'a str,
    search: &'a str,
    document: Option<&'a str>,
    message: Option<&'a str>,
) -> PromptInputs<'a> {
    PromptInputs {
        mode,
        persona: PERSONA,
        knowledge,
        search,
        document,
        message,
        history: &[],
    }
}

fn exchange(user: &str, assistant: &str) -> [ChatTurn; 2] {
    [ChatTurn::user(user), ChatTurn::assistant(assistant)]
}

fn total_chars(p: &zahouse_core::prompt::AssembledPrompt) -> usize {
    p.messages()
        .iter()
        .map(|t| t.content.chars().count())
        .sum::<usize>()
        + p.system.chars().count()
}

// ── truncate_chars ────────────────────────────────────────────────────────

#[test]
fn short_text_is_untouched() {
    assert_eq!(truncate_chars("hello", 10), "hello");
}

#[test]
fn truncation_stays_within_limit_and_is_marked() {
    let text = "x".repeat(200);
    let out = truncate_chars(&text, 50);
    assert_eq!(out.chars().count(), 50);
    assert!(out.ends_with("[...truncated]"));
}

#[test]
fn truncation_is_char_boundary_safe() {
    let text = "é".repeat(100);
    let out = truncate_chars(&text, 40);
    assert_eq!(out.chars().count(), 40);
}

#[test]
fn tiny_limit_cuts_without_marker() {
    assert_eq!(truncate_chars("abcdefghijklmnopqrstuvwxyz", 3), "abc");
    assert_eq!(truncate_chars("abc", 0), "");
}

// ── assemble ──────────────────────────────────────────────────────────────

#[test]
fn audit_prompt_has_instructions_default_message_and_contract() {
    let p = assemble(inputs(Mode::Audit, "", "", Some("Clause 1: 360 rights."), None), roomy());
    assert!(p.system.starts_with(PERSONA));
    assert!(p.system.contains(AUDIT_INSTRUCTIONS.trim()));
    assert!(p.user.starts_with(DEFAULT_AUDIT_MESSAGE));
    assert!(p.user.contains("CONTRACT TEXT:\nClause 1: 360 rights."));
}

#[test]
fn chat_prompt_is_persona_and_message_only() {
    let p = assemble(inputs(Mode::Chat, "", "", None, Some("  what is a split sheet? ")), roomy());
    assert_eq!(p.system, PERSONA);
    assert_eq!(p.user, "what is a split sheet?");
    assert_eq!((p.kb_chars, p.search_chars, p.doc_chars), (0, 0, 0));
}

#[test]
fn knowledge_and_search_go_into_system_prompt() {
    let p = assemble(
        inputs(Mode::Chat, "KB FACT", "SEARCH FACT", None, Some("hi")),
        roomy(),
    );
    assert!(p.system.contains("KNOWLEDGE BASE"));
    assert!(p.system.contains("KB FACT"));
    assert!(p.system.contains("LIVE WEB RESULTS"));
    assert!(p.system.contains("SEARCH FACT"));
    assert!(!p.user.contains("KB FACT"));
}

#[test]
fn sections_respect_their_own_caps() {
    let kb = "k".repeat(50_000);
    let doc = "d".repeat(50_000);
    let p = assemble(inputs(Mode::Audit, &kb, "", Some(&doc), None), roomy());
    assert_eq!(p.kb_chars, 12_000);
    assert_eq!(p.doc_chars, 20_000);
}

#[test]
fn overflow_shrinks_knowledge_base_first() {
    let kb = "k".repeat(3_000);
    let search = "s".repeat(1_000);
    let doc = "d".repeat(2_000);
    let fixed = PERSONA.len() + AUDIT_INSTRUCTIONS.len() + DEFAULT_AUDIT_MESSAGE.len() + 200;
    let budget = PromptBudget {
        total_chars: fixed + 3_500,
        ..roomy()
    };
    let p = assemble(inputs(Mode::Audit, &kb, &search, Some(&doc), None), budget);
    assert_eq!(p.doc_chars, 2_000, "document must survive intact");
    assert_eq!(p.search_chars, 1_000, "search is cut only after the KB is gone");
    assert!(p.kb_chars < 3_000);
}

#[test]
fn heavy_overflow_drops_kb_then_search_then_trims_document() {
    let kb = "k".repeat(3_000);
    let search = "s".repeat(1_000);
    let doc = "d".repeat(5_000);
    let budget = PromptBudget {
        total_chars: PERSONA.len() + AUDIT_INSTRUCTIONS.len() + 1_500,
        ..roomy()
    };
    let p = assemble(inputs(Mode::Audit, &kb, &search, Some(&doc), None), budget);
    assert_eq!(p.kb_chars, 0);
    assert_eq!(p.search_chars, 0);
    assert!(p.doc_chars > 0 && p.doc_chars < 5_000);
    assert!(!p.system.contains("KNOWLEDGE BASE"));
    assert!(!p.system.contains("LIVE WEB RESULTS"));
    let total = p.system.chars().count() + p.user.chars().count();
    assert!(total <= budget.total_chars, "{total} > {}", budget.total_chars);
}

#[test]
fn persona_and_message_are_never_cut() {
    let message = "m".repeat(500);
    let budget = PromptBudget {
        total_chars: 10,
        ..roomy()
    };
    let p = assemble(inputs(Mode::Chat, "kb", "search", None, Some(&message)), budget);
    assert_eq!(p.system, PERSONA);
    assert_eq!(p.user, message);
}

#[test]
fn token_estimate_counts_both_halves() {
    let p = assemble(inputs(Mode::Chat, "", "", None, Some("hello there")), roomy());
    assert_eq!(
        p.estimated_tokens(),
        estimate_tokens(&p.system) + estimate_tokens(&p.user)
    );
    assert_eq!(estimate_tokens(""), 1);
    assert_eq!(estimate_tokens("abcdefgh"), 3);
}

// ── history ───────────────────────────────────────────────────────────────

#[test]
fn fit_history_drops_oldest_exchanges_whole() {
    let history: Vec<ChatTurn> = [exchange("aaaa", "bbbb"), exchange("cc", "dd")].concat();
    assert_eq!(fit_history(&history, 100), history);
    let kept = fit_history(&history, 6);
    assert_eq!(kept, exchange("cc", "dd").to_vec());
    assert!(fit_history(&history, 3).is_empty());
}

#[test]
fn fit_history_never_starts_with_assistant() {
    let history = vec![
        ChatTurn::assistant("orphan"),
        ChatTurn::user("q"),
        ChatTurn::assistant("a"),
    ];
    let kept = fit_history(&history, 100);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].role, Role::User);
}

#[test]
fn history_is_replayed_before_the_new_turn() {
    let history = exchange("earlier question", "earlier answer");
    let p = assemble(
        PromptInputs {
            history: &history,
            ..inputs(Mode::Chat, "", "", None, Some("follow up"))
        },
        roomy(),
    );
    let messages = p.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "earlier question");
    assert_eq!(messages[2], ChatTurn::user("follow up"));
    assert_eq!(p.history_chars, "earlier questionearlier answer".len());
}

#[test]
fn history_counts_toward_the_total_budget() {
    let contract = "c".repeat(3_000);
    let history: Vec<ChatTurn> = (0..4)
        .flat_map(|i| exchange(&format!("{i}{contract}"), "verdict"))
        .collect();
    let kb = "k".repeat(2_000);
    let budget = PromptBudget {
        total_chars: PERSONA.len() + AUDIT_INSTRUCTIONS.len() + 8_000,
        ..roomy()
    };
    let p = assemble(
        PromptInputs {
            history: &history,
            ..inputs(Mode::Audit, &kb, "", Some(&contract), None)
        },
        budget,
    );
    assert_eq!(p.doc_chars, 3_000, "the new contract outranks old turns");
    assert!(p.kb_chars < 2_000, "KB shrinks before history");
    assert!(!p.history.is_empty() && p.history.len() < history.len());
    assert!(p.history[0].content.starts_with('3'), "newest exchange kept");
    let total = total_chars(&p);
    assert!(total <= budget.total_chars, "{total} > {}", budget.total_chars);
}

// ── search formatting ─────────────────────────────────────────────────────

#[test]
fn search_results_are_numbered_with_sources() {
    let results = vec![
        SearchResult {
            title: "Streaming payouts".into(),
            url: "https://example.com/a".into(),
            content: " per-stream rates fell ".into(),
            score: 0.9,
        },
        SearchResult {
            title: "Label news".into(),
            url: "https://example.com/b".into(),
            content: "merger".into(),
            score: 0.5,
        },
    ];
    let out = format_search_results(&results);
    assert_eq!(
        out,
        "[1] Streaming payouts (https://example.com/a)\nper-stream rates fell\n\n\
         [2] Label news (https://example.com/b)\nmerger"
    );
    assert_eq!(format_search_results(&[]), "");
}
