//! Keyword-driven signature generation.

use std::collections::BTreeSet;

use super::{
    ComplexityLevel, ContentDomain, DocumentType, Intent, LengthCategory, ProgramSignature,
    QueryContext, SignatureError,
};

/// Characters of each document's text considered for domain detection.
const DOC_TEXT_SCAN_CHARS: usize = 2000;

/// Intent keywords. Order breaks score ties: earlier, more specific intents win.
///
/// Single words match as token prefixes (`"summar"` hits "summary" and
/// "summarize"); multi-word entries match as whole phrases.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Summarization,
        &["summar", "tldr", "overview", "recap", "key points", "brief", "condense", "gist"],
    ),
    (
        Intent::Comparison,
        &["compar", "differen", "versus", "vs", "contrast", "similarit", "better than", "pros and cons"],
    ),
    (
        Intent::Analysis,
        &["analy", "evaluat", "assess", "review", "examin", "insight", "trend", "break down", "breakdown"],
    ),
    (
        Intent::Troubleshooting,
        &["error", "fix", "debug", "fail", "broken", "crash", "not working", "troubleshoot", "exception", "issue"],
    ),
    (
        Intent::CodeAssistance,
        &["code", "function", "implement", "script", "refactor", "compile", "syntax", "api", "program"],
    ),
    (
        Intent::Research,
        &["research", "find", "search", "sources", "literature", "investigat", "look up", "latest"],
    ),
    (
        Intent::Explanation,
        &["explain", "why", "how does", "how do", "what is", "what are", "meaning", "understand", "clarify", "describe"],
    ),
    (
        Intent::Creative,
        &["write", "draft", "compose", "story", "poem", "brainstorm", "creative", "imagine"],
    ),
    (
        Intent::QuestionAnswering,
        &["who", "when", "where", "which", "how many", "how much", "what"],
    ),
];

const DOMAIN_KEYWORDS: &[(ContentDomain, &[&str])] = &[
    (
        ContentDomain::Technical,
        &["software", "code", "api", "server", "database", "network", "algorithm", "deploy", "compile", "programming", "kubernetes", "cloud"],
    ),
    (
        ContentDomain::Financial,
        &["financ", "revenue", "profit", "budget", "invest", "stock", "earning", "tax", "accounting", "invoice", "cash flow"],
    ),
    (
        ContentDomain::Legal,
        &["legal", "contract", "law", "clause", "liabil", "complian", "regulat", "court", "agreement", "lease"],
    ),
    (
        ContentDomain::Medical,
        &["medic", "health", "patient", "clinic", "diagnos", "symptom", "treatment", "disease", "doctor"],
    ),
    (
        ContentDomain::Scientific,
        &["scientif", "experiment", "hypothes", "physic", "chemi", "biolog", "molecul", "quantum", "laborator"],
    ),
    (
        ContentDomain::Business,
        &["business", "market", "customer", "strategy", "sales", "product", "company", "startup", "stakeholder"],
    ),
    (
        ContentDomain::Academic,
        &["academ", "thesis", "paper", "journal", "citation", "universit", "lecture", "course", "essay"],
    ),
    (
        ContentDomain::Personal,
        &["personal", "family", "travel", "recipe", "hobby", "vacation", "diary", "birthday", "friend"],
    ),
    (
        ContentDomain::Security,
        &["secur", "vulnerab", "exploit", "encrypt", "password", "authenticat", "malware", "phishing", "firewall", "cve"],
    ),
];

const COMPLEXITY_MARKERS: &[&str] = &[
    "step by step",
    "in detail",
    "detailed",
    "comprehensive",
    "thorough",
    "in depth",
    "why",
    "implications",
    "trade off",
    "tradeoff",
    "multiple",
];

/// Lowercased, punctuation-stripped text for keyword matching.
struct Normalized {
    tokens: Vec<String>,
    /// Tokens joined by single spaces, padded with a space on both ends.
    padded: String,
}

impl Normalized {
    fn new(text: &str) -> Self {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        let padded = format!(" {} ", tokens.join(" "));
        Self { tokens, padded }
    }

    fn matches(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            self.padded.contains(&format!(" {keyword} "))
        } else {
            self.tokens.iter().any(|t| t.starts_with(keyword))
        }
    }

    fn hits(&self, keywords: &[&str]) -> usize {
        keywords.iter().filter(|k| self.matches(k)).count()
    }
}

/// Derive a signature from a query, its context, and an optional user profile.
pub fn generate_signature(
    query: &str,
    context: &QueryContext,
    user_profile: Option<&str>,
) -> Result<ProgramSignature, SignatureError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SignatureError::EmptyQuery);
    }

    let normalized = Normalized::new(query);
    let (primary_intent, secondary_intents) = detect_intents(&normalized, query.ends_with('?'));
    let document_types = detect_document_types(context);
    let content_domains = detect_domains(query, context);
    let word_count = query.split_whitespace().count();
    let length_category = LengthCategory::from_word_count(word_count);
    let complexity = assess_complexity(
        &normalized,
        word_count,
        secondary_intents.len(),
        context.documents.len(),
        content_domains.len(),
    );
    let user_profile = user_profile
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty());

    let mut signature = ProgramSignature {
        primary_intent,
        secondary_intents,
        document_types,
        content_domains,
        length_category,
        complexity,
        user_profile,
        tpv_enabled: context.tpv_enabled,
        signature_hash: String::new(),
    };
    signature.rehash();

    tracing::debug!(
        intent = %signature.primary_intent,
        complexity = %signature.complexity,
        hash = %signature.signature_hash,
        "signature generated"
    );
    Ok(signature)
}

fn detect_intents(text: &Normalized, is_question: bool) -> (Intent, BTreeSet<Intent>) {
    let mut scored: Vec<(Intent, usize)> = INTENT_KEYWORDS
        .iter()
        .map(|(intent, keywords)| {
            let mut hits = text.hits(keywords);
            if is_question && *intent == Intent::QuestionAnswering {
                hits += 1;
            }
            (*intent, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();

    // Stable sort keeps table order among equal scores.
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let mut iter = scored.into_iter().map(|(intent, _)| intent);
    match iter.next() {
        Some(primary) => (primary, iter.collect()),
        None => (Intent::General, BTreeSet::new()),
    }
}

fn detect_document_types(context: &QueryContext) -> BTreeSet<DocumentType> {
    context
        .documents
        .iter()
        .map(|doc| DocumentType::classify(doc.content_type.as_deref(), &doc.name))
        .collect()
}

fn detect_domains(query: &str, context: &QueryContext) -> BTreeSet<ContentDomain> {
    let mut corpus = String::from(query);
    for doc in &context.documents {
        corpus.push(' ');
        corpus.push_str(&doc.name);
        if let Some(text) = &doc.text {
            corpus.push(' ');
            corpus.extend(text.chars().take(DOC_TEXT_SCAN_CHARS));
        }
    }

    let normalized = Normalized::new(&corpus);
    DOMAIN_KEYWORDS
        .iter()
        .filter(|(_, keywords)| normalized.hits(keywords) > 0)
        .map(|(domain, _)| *domain)
        .collect()
}

fn assess_complexity(
    text: &Normalized,
    word_count: usize,
    secondary_intents: usize,
    documents: usize,
    domains: usize,
) -> ComplexityLevel {
    let mut score = 0usize;

    score += match word_count {
        0..=30 => 0,
        31..=80 => 1,
        _ => 2,
    };
    score += secondary_intents.min(2);
    score += match documents {
        0..=1 => 0,
        2..=3 => 1,
        _ => 2,
    };
    if domains > 1 {
        score += 1;
    }
    score += text.hits(COMPLEXITY_MARKERS).min(2);

    match score {
        0..=1 => ComplexityLevel::Simple,
        2..=3 => ComplexityLevel::Moderate,
        _ => ComplexityLevel::Complex,
    }
}

impl DocumentType {
    /// Classify a document by declared content type, falling back to its name.
    pub fn classify(content_type: Option<&str>, name: &str) -> Self {
        content_type
            .and_then(Self::from_content_type)
            .unwrap_or_else(|| Self::from_name(name))
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.trim().to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| ct.contains(n));

        let doc_type = if ct.starts_with("image/") || ct == "image" {
            Self::Image
        } else if has(&["pdf"]) {
            Self::Pdf
        } else if has(&["word"]) || ct == "doc" || ct == "docx" {
            Self::Word
        } else if has(&["sheet", "excel", "xls"]) {
            Self::Spreadsheet
        } else if has(&["presentation", "powerpoint", "ppt"]) {
            Self::Presentation
        } else if has(&["markdown"]) || ct == "md" {
            Self::Markdown
        } else if has(&["html", "web"]) || ct == "url" {
            Self::Web
        } else if has(&["json", "xml", "yaml", "csv", "data"]) {
            Self::Data
        } else if has(&["python", "rust", "javascript", "typescript", "java", "source", "code"]) {
            Self::Code
        } else if has(&["text", "plain", "txt"]) {
            Self::Text
        } else {
            return None;
        };
        Some(doc_type)
    }

    fn from_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        if name.starts_with("http://") || name.starts_with("https://") {
            return Self::Web;
        }
        let Some((_, ext)) = name.rsplit_once('.') else {
            return Self::Other;
        };
        match ext {
            "pdf" => Self::Pdf,
            "doc" | "docx" | "odt" | "rtf" => Self::Word,
            "xls" | "xlsx" | "ods" => Self::Spreadsheet,
            "ppt" | "pptx" | "odp" | "key" => Self::Presentation,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Web,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => Self::Image,
            "json" | "xml" | "yaml" | "yml" | "csv" | "tsv" | "parquet" => Self::Data,
            "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" | "rb" | "sh" | "sql" => {
                Self::Code
            }
            "txt" | "log" => Self::Text,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::ContextDocument;

    fn doc(name: &str, content_type: Option<&str>) -> ContextDocument {
        ContextDocument {
            name: name.into(),
            content_type: content_type.map(String::from),
            text: None,
        }
    }

    #[test]
    fn empty_query_is_rejected() {
        let err = generate_signature("   ", &QueryContext::default(), None).unwrap_err();
        assert_eq!(err, SignatureError::EmptyQuery);
    }

    #[test]
    fn summarization_intent() {
        let sig = generate_signature(
            "Please summarize the key points of this report",
            &QueryContext::default(),
            None,
        )
        .unwrap();
        assert_eq!(sig.primary_intent, Intent::Summarization);
        assert_eq!(sig.length_category, LengthCategory::Short);
    }

    #[test]
    fn comparison_beats_question_words() {
        let sig = generate_signature(
            "What are the differences between these two contracts? Compare them.",
            &QueryContext::default(),
            None,
        )
        .unwrap();
        assert_eq!(sig.primary_intent, Intent::Comparison);
        assert!(sig.secondary_intents.contains(&Intent::QuestionAnswering));
        assert!(!sig.secondary_intents.contains(&Intent::Comparison));
        assert!(sig.content_domains.contains(&ContentDomain::Legal));
    }

    #[test]
    fn no_keywords_falls_back_to_general() {
        let sig = generate_signature("hello there", &QueryContext::default(), None).unwrap();
        assert_eq!(sig.primary_intent, Intent::General);
        assert!(sig.secondary_intents.is_empty());
        assert_eq!(sig.complexity, ComplexityLevel::Simple);
    }

    #[test]
    fn trailing_question_mark_counts_as_question() {
        let sig = generate_signature("Is the store open today?", &QueryContext::default(), None)
            .unwrap();
        assert_eq!(sig.primary_intent, Intent::QuestionAnswering);
    }

    #[test]
    fn document_types_from_context() {
        let context = QueryContext {
            documents: vec![
                doc("report.pdf", None),
                doc("notes", Some("text/markdown")),
                doc("main.rs", None),
                doc("data", Some("application/json")),
                doc("https://example.com/page", None),
                doc("mystery", None),
            ],
            tpv_enabled: false,
        };
        let sig = generate_signature("Analyze these files", &context, None).unwrap();
        let expected: BTreeSet<DocumentType> = [
            DocumentType::Pdf,
            DocumentType::Markdown,
            DocumentType::Code,
            DocumentType::Data,
            DocumentType::Web,
            DocumentType::Other,
        ]
        .into_iter()
        .collect();
        assert_eq!(sig.document_types, expected);
    }

    #[test]
    fn content_type_wins_over_extension() {
        assert_eq!(
            DocumentType::classify(Some("application/pdf"), "download.bin"),
            DocumentType::Pdf
        );
        assert_eq!(
            DocumentType::classify(
                Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
                "q3"
            ),
            DocumentType::Spreadsheet
        );
        assert_eq!(DocumentType::classify(Some("text/x-python"), "x"), DocumentType::Code);
        assert_eq!(DocumentType::classify(Some("text/plain"), "x.pdf"), DocumentType::Text);
        // Unknown content types fall back to the name
        assert_eq!(
            DocumentType::classify(Some("application/octet-stream"), "deck.pptx"),
            DocumentType::Presentation
        );
    }

    #[test]
    fn domains_from_document_text() {
        let context = QueryContext {
            documents: vec![ContextDocument {
                name: "q3.txt".into(),
                content_type: None,
                text: Some("Revenue grew 12% while patient intake fell".into()),
            }],
            tpv_enabled: false,
        };
        let sig = generate_signature("Give me an overview", &context, None).unwrap();
        assert!(sig.content_domains.contains(&ContentDomain::Financial));
        assert!(sig.content_domains.contains(&ContentDomain::Medical));
    }

    #[test]
    fn complexity_grows_with_documents_and_markers() {
        let docs: Vec<ContextDocument> = (0..4).map(|i| doc(&format!("f{i}.pdf"), None)).collect();
        let context = QueryContext {
            documents: docs,
            tpv_enabled: true,
        };
        let sig = generate_signature(
            "Explain step by step and in detail why revenue in these contracts differs",
            &context,
            None,
        )
        .unwrap();
        assert_eq!(sig.complexity, ComplexityLevel::Complex);
        assert!(sig.tpv_enabled);
    }

    #[test]
    fn user_profile_is_normalized() {
        let a = generate_signature("summarize", &QueryContext::default(), Some("  Researcher "))
            .unwrap();
        let b = generate_signature("summarize", &QueryContext::default(), Some("researcher"))
            .unwrap();
        let none = generate_signature("summarize", &QueryContext::default(), Some("  ")).unwrap();
        assert_eq!(a.user_profile.as_deref(), Some("researcher"));
        assert_eq!(a.signature_hash, b.signature_hash);
        assert!(none.user_profile.is_none());
    }

    #[test]
    fn same_shape_queries_share_a_hash() {
        let a = generate_signature("Summarize this PDF", &QueryContext::default(), None).unwrap();
        let b = generate_signature("summarize the pdf", &QueryContext::default(), None).unwrap();
        assert_eq!(a.signature_hash, b.signature_hash);
    }

    #[test]
    fn keyword_matching_uses_prefixes_and_phrases() {
        let text = Normalized::new("How does the summary compare?");
        assert!(text.matches("summar"));
        assert!(text.matches("how does"));
        assert!(!text.matches("does the summary compare now"));
        assert!(!text.matches("ummar"));
    }
}
