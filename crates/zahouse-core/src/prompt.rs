use crate::{
    config::Config,
    types::{ChatTurn, Mode, Role, SearchResult},
};

pub const PERSONA: &str = "\
ROLE: ZaHouse Music Law Strategist. \
TONE: 'Suits meets The Streets'. Professional, swagger, metaphors. \
GOAL: Protect the artist. Call out 360 deals, bad royalties, and ownership traps. \
You are not the artist's lawyer; recommend a licensed attorney before anything gets signed.";

pub const AUDIT_INSTRUCTIONS: &str = "\n\n\
You are auditing a music contract. Analyze it clause by clause. For each red flag, provide:
1. The exact text.
2. Why it is dangerous for the artist.
3. The specific \"Artist-Friendly\" revision text.
Finish with an overall verdict and the three points to negotiate first.";

pub const DEFAULT_AUDIT_MESSAGE: &str = "Analyze this contract.";

const KB_HEADER: &str = "\n\n=== KNOWLEDGE BASE (reference material) ===\n";
const SEARCH_HEADER: &str = "\n\n=== LIVE WEB RESULTS ===\n";
const DOC_HEADER: &str = "\n\nCONTRACT TEXT:\n";
const TRUNCATION_MARKER: &str = "\n[...truncated]";

/// Character allowances for each prompt section.
#[derive(Debug, Clone, Copy)]
pub struct PromptBudget {
    pub total_chars: usize,
    pub doc_chars: usize,
    pub kb_chars: usize,
    pub search_chars: usize,
}

impl PromptBudget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            total_chars: config.max_prompt_tokens.saturating_mul(4),
            doc_chars: config.doc_char_limit,
            kb_chars: config.kb_char_limit,
            search_chars: config.search_char_limit,
        }
    }
}

/// Everything that may go into one completion request.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub mode: Mode,
    pub persona: &'a str,
    pub knowledge: &'a str,
    pub search: &'a str,
    pub document: Option<&'a str>,
    pub message: Option<&'a str>,
    /// Earlier exchanges in the thread, oldest first.
    pub history: &'a [ChatTurn],
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub system: String,
    pub user: String,
    /// History turns that fit, oldest first. The current user turn is not included.
    pub history: Vec<ChatTurn>,
    /// Characters kept per section after budgeting.
    pub kb_chars: usize,
    pub search_chars: usize,
    pub doc_chars: usize,
    pub history_chars: usize,
}

impl AssembledPrompt {
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.system)
            + estimate_tokens(&self.user)
            + self.history.iter().map(|t| estimate_tokens(&t.content)).sum::<usize>()
    }

    /// History followed by the current user turn, ready for a completion request.
    pub fn messages(&self) -> Vec<ChatTurn> {
        let mut messages = self.history.clone();
        messages.push(ChatTurn::user(self.user.clone()));
        messages
    }
}

pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
///
/// The marker counts toward `max_chars`; when there is no room for it the
/// text is cut bare.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

pub fn format_search_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {} ({})\n{}", i + 1, r.title, r.url, r.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn header_len(section_len: usize, header: &str) -> usize {
    if section_len == 0 {
        0
    } else {
        header.chars().count()
    }
}

fn turns_chars(turns: &[ChatTurn]) -> usize {
    turns.iter().map(|t| t.content.chars().count()).sum()
}

/// Drop the oldest turns until `history` fits in `room` characters.
///
/// Whole exchanges go together and the result never starts with an
/// assistant turn.
pub fn fit_history(history: &[ChatTurn], room: usize) -> Vec<ChatTurn> {
    let mut start = 0;
    let mut chars = turns_chars(history);
    while start < history.len() && (chars > room || history[start].role != Role::User) {
        chars -= history[start].content.chars().count();
        start += 1;
    }
    history[start..].to_vec()
}

/// Build the system and user prompts within `budget`.
///
/// Each section is first capped on its own. If the whole prompt is still
/// over `total_chars`, the knowledge base shrinks first, then search
/// results, then the oldest history, then the document. Persona and message
/// are never cut.
pub fn assemble(inputs: PromptInputs<'_>, budget: PromptBudget) -> AssembledPrompt {
    let mut persona = inputs.persona.to_string();
    if inputs.mode == Mode::Audit {
        persona.push_str(AUDIT_INSTRUCTIONS);
    }

    let message = match (inputs.message.map(str::trim).filter(|m| !m.is_empty()), inputs.mode) {
        (Some(m), _) => m.to_string(),
        (None, Mode::Audit) => DEFAULT_AUDIT_MESSAGE.to_string(),
        (None, Mode::Chat) => String::new(),
    };

    let knowledge = inputs.knowledge.trim();
    let search = inputs.search.trim();
    let document = inputs.document.map(str::trim).unwrap_or("");

    let mut kb_len = knowledge.chars().count().min(budget.kb_chars);
    let mut search_len = search.chars().count().min(budget.search_chars);
    let mut doc_len = document.chars().count().min(budget.doc_chars);

    let fixed = persona.chars().count()
        + message.chars().count()
        + header_len(kb_len, KB_HEADER)
        + header_len(search_len, SEARCH_HEADER)
        + header_len(doc_len, DOC_HEADER);
    let available = budget.total_chars.saturating_sub(fixed);

    let history = fit_history(inputs.history, available.saturating_sub(doc_len));
    let history_len = turns_chars(&history);
    let available = available - history_len;

    let mut overflow = (kb_len + search_len + doc_len).saturating_sub(available);
    for len in [&mut kb_len, &mut search_len, &mut doc_len] {
        let cut = overflow.min(*len);
        *len -= cut;
        overflow -= cut;
    }

    let mut system = persona;
    if kb_len > 0 {
        system.push_str(KB_HEADER);
        system.push_str(&truncate_chars(knowledge, kb_len));
    }
    if search_len > 0 {
        system.push_str(SEARCH_HEADER);
        system.push_str(&truncate_chars(search, search_len));
    }

    let mut user = message;
    if doc_len > 0 {
        user.push_str(DOC_HEADER);
        user.push_str(&truncate_chars(document, doc_len));
    }

    AssembledPrompt {
        system,
        user,
        history,
        kb_chars: kb_len,
        search_chars: search_len,
        doc_chars: doc_len,
        history_chars: history_len,
    }
}
